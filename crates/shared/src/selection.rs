//! Bulk document selection: which companies and which services to render.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BulkDocumentRequest, CompanySummary};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkSelection {
    #[serde(default)]
    companies: Vec<CompanySummary>,
    #[serde(default)]
    service_ids: Vec<Uuid>,
}

impl BulkSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the company if absent, deselect it if present.
    /// Returns whether it is selected afterwards.
    pub fn toggle_company(&mut self, company: CompanySummary) -> bool {
        if let Some(idx) = self
            .companies
            .iter()
            .position(|c| c.company_number == company.company_number)
        {
            self.companies.remove(idx);
            false
        } else {
            self.companies.push(company);
            true
        }
    }

    pub fn toggle_service(&mut self, service_id: Uuid) -> bool {
        if let Some(idx) = self.service_ids.iter().position(|id| *id == service_id) {
            self.service_ids.remove(idx);
            false
        } else {
            self.service_ids.push(service_id);
            true
        }
    }

    /// Add every company not already selected
    pub fn select_all(&mut self, companies: impl IntoIterator<Item = CompanySummary>) {
        for company in companies {
            if !self.is_company_selected(&company.company_number) {
                self.companies.push(company);
            }
        }
    }

    pub fn clear(&mut self) {
        self.companies.clear();
        self.service_ids.clear();
    }

    pub fn is_company_selected(&self, company_number: &str) -> bool {
        self.companies
            .iter()
            .any(|c| c.company_number == company_number)
    }

    pub fn companies(&self) -> &[CompanySummary] {
        &self.companies
    }

    pub fn service_ids(&self) -> &[Uuid] {
        &self.service_ids
    }

    /// At least one company and one service
    pub fn is_ready(&self) -> bool {
        !self.companies.is_empty() && !self.service_ids.is_empty()
    }

    pub fn to_request(&self) -> BulkDocumentRequest {
        BulkDocumentRequest {
            companies: self.companies.clone(),
            service_ids: self.service_ids.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(number: &str) -> CompanySummary {
        CompanySummary {
            company_number: number.to_string(),
            company_name: format!("COMPANY {}", number),
            ..Default::default()
        }
    }

    #[test]
    fn test_toggle_company() {
        let mut selection = BulkSelection::new();
        assert!(selection.toggle_company(company("01")));
        assert!(selection.is_company_selected("01"));
        assert!(!selection.toggle_company(company("01")));
        assert!(!selection.is_company_selected("01"));
    }

    #[test]
    fn test_ready_requires_both_sides() {
        let mut selection = BulkSelection::new();
        selection.toggle_company(company("01"));
        assert!(!selection.is_ready());

        let service_id = Uuid::new_v4();
        selection.toggle_service(service_id);
        assert!(selection.is_ready());

        selection.toggle_service(service_id);
        assert!(!selection.is_ready());
    }

    #[test]
    fn test_select_all_skips_selected() {
        let mut selection = BulkSelection::new();
        selection.toggle_company(company("01"));
        selection.select_all(vec![company("01"), company("02"), company("03")]);
        assert_eq!(selection.companies().len(), 3);

        selection.clear();
        assert!(selection.companies().is_empty());
        assert!(selection.service_ids().is_empty());
    }

    #[test]
    fn test_to_request() {
        let mut selection = BulkSelection::new();
        let service_id = Uuid::new_v4();
        selection.select_all(vec![company("01"), company("02")]);
        selection.toggle_service(service_id);

        let req = selection.to_request();
        assert_eq!(req.companies.len(), 2);
        assert_eq!(req.service_ids, vec![service_id]);
    }
}
