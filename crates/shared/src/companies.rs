use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registry record for a company, enriched with filing due dates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub company_number: String,
    pub company_name: String,
    #[serde(default)]
    pub company_status: Option<String>,
    #[serde(default)]
    pub date_of_creation: Option<String>,
    #[serde(default)]
    pub address_snippet: Option<String>,
    #[serde(default)]
    pub confirmation_statement_due: Option<String>,
    #[serde(default)]
    pub accounts_due: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub items: Vec<CompanySummary>,
    pub total_results: u64,
    pub start_index: u64,
    pub items_per_page: u64,
}

/// A company saved to a customer's account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCompany {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_number: String,
    pub company_name: String,
    pub status: Option<String>,
    pub confirmation_statement_due: Option<String>,
    pub accounts_due: Option<String>,
    pub is_favorite: bool,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveCompanyRequest {
    pub company_number: String,
    pub company_name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub confirmation_statement_due: Option<String>,
    #[serde(default)]
    pub accounts_due: Option<String>,
}

impl From<CompanySummary> for SaveCompanyRequest {
    fn from(company: CompanySummary) -> Self {
        Self {
            company_number: company.company_number,
            company_name: company.company_name,
            status: company.company_status,
            confirmation_statement_due: company.confirmation_statement_due,
            accounts_due: company.accounts_due,
        }
    }
}

/// Admin-side shared registry cache row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCompany {
    pub company_number: String,
    pub company_name: String,
    pub company_status: Option<String>,
    pub confirmation_statement_due: Option<String>,
    pub accounts_due: Option<String>,
    pub updated_at: Option<String>,
}

/// Request for a ZIP of one PDF per company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDocumentRequest {
    pub companies: Vec<CompanySummary>,
    pub service_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_summary_missing_dates() {
        let json = r#"{"company_number":"01234567","company_name":"ACME LTD"}"#;
        let company: CompanySummary = serde_json::from_str(json).unwrap();
        assert_eq!(company.company_number, "01234567");
        assert!(company.confirmation_statement_due.is_none());
        assert!(company.accounts_due.is_none());
    }

    #[test]
    fn test_save_request_from_summary() {
        let company = CompanySummary {
            company_number: "SC123456".to_string(),
            company_name: "HIGHLAND TRADING LIMITED".to_string(),
            company_status: Some("active".to_string()),
            accounts_due: Some("2026-09-30".to_string()),
            ..Default::default()
        };
        let req = SaveCompanyRequest::from(company);
        assert_eq!(req.company_number, "SC123456");
        assert_eq!(req.status.as_deref(), Some("active"));
        assert_eq!(req.accounts_due.as_deref(), Some("2026-09-30"));
    }
}
