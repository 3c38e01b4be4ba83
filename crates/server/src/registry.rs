//! Companies House client: search plus per-company profile enrichment.

use anyhow::Result;
use futures::future::join_all;
use reqwest::StatusCode;
use serde::Deserialize;
use shared::{CompanySummary, SearchResults};

use crate::config::RegistryConfig;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(default)]
    total_results: u64,
    #[serde(default)]
    start_index: u64,
    #[serde(default)]
    items_per_page: u64,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    company_number: String,
    #[serde(default)]
    title: String,
    company_status: Option<String>,
    date_of_creation: Option<String>,
    address_snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DueDate {
    next_due: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompanyProfile {
    company_number: String,
    #[serde(default)]
    company_name: String,
    company_status: Option<String>,
    date_of_creation: Option<String>,
    confirmation_statement: Option<DueDate>,
    accounts: Option<DueDate>,
}

impl From<SearchItem> for CompanySummary {
    fn from(item: SearchItem) -> Self {
        CompanySummary {
            company_number: item.company_number,
            company_name: item.title,
            company_status: item.company_status,
            date_of_creation: item.date_of_creation,
            address_snippet: item.address_snippet,
            confirmation_statement_due: None,
            accounts_due: None,
        }
    }
}

impl From<CompanyProfile> for CompanySummary {
    fn from(profile: CompanyProfile) -> Self {
        CompanySummary {
            company_number: profile.company_number,
            company_name: profile.company_name,
            company_status: profile.company_status,
            date_of_creation: profile.date_of_creation,
            address_snippet: None,
            confirmation_statement_due: profile.confirmation_statement.and_then(|d| d.next_due),
            accounts_due: profile.accounts.and_then(|d| d.next_due),
        }
    }
}

fn apply_due_dates(company: &mut CompanySummary, profile: CompanyProfile) {
    company.confirmation_statement_due = profile.confirmation_statement.and_then(|d| d.next_due);
    company.accounts_due = profile.accounts.and_then(|d| d.next_due);
    if company.company_status.is_none() {
        company.company_status = profile.company_status;
    }
}

/// Trim and reject blank queries before anything goes over the network
pub fn normalize_query(query: &str) -> Result<String, AppError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Search query is required".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Registry numbers are up to ten ASCII letters and digits, e.g. `01234567` or `SC000123`
pub fn validate_company_number(number: &str) -> Result<&str, AppError> {
    let trimmed = number.trim();
    if trimmed.is_empty()
        || trimmed.len() > 10
        || !trimmed.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(AppError::BadRequest("Invalid company number".to_string()));
    }
    Ok(trimmed)
}

#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    config: RegistryConfig,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn ensure_configured(&self) -> Result<(), AppError> {
        if self.config.api_key.is_empty() {
            return Err(AppError::Internal(
                "Company registry API key is not configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Search the registry and enrich every hit with its filing due dates.
    /// Enrichment calls run concurrently; a failed one leaves that item's dates empty.
    pub async fn search(&self, query: &str, start_index: u64) -> Result<SearchResults, AppError> {
        let query = normalize_query(query)?;
        self.ensure_configured()?;

        let url = format!("{}/search/companies", self.config.base_url);
        let items_per_page = self.config.items_per_page.to_string();
        let start_index = start_index.to_string();
        let resp = self
            .http
            .get(&url)
            .basic_auth(&self.config.api_key, Some(""))
            .query(&[
                ("q", query.as_str()),
                ("items_per_page", items_per_page.as_str()),
                ("start_index", start_index.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Registry search failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Company registry returned {}",
                resp.status()
            )));
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Invalid registry response: {}", e)))?;

        let mut items: Vec<CompanySummary> = body.items.into_iter().map(Into::into).collect();

        let profiles = join_all(
            items
                .iter()
                .map(|item| self.fetch_profile(&item.company_number)),
        )
        .await;

        for (item, profile) in items.iter_mut().zip(profiles) {
            match profile {
                Ok(Some(profile)) => apply_due_dates(item, profile),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Failed to enrich company {}: {}", item.company_number, e);
                }
            }
        }

        tracing::debug!("Registry search '{}' returned {} items", query, items.len());

        Ok(SearchResults {
            items,
            total_results: body.total_results,
            start_index: body.start_index,
            items_per_page: body.items_per_page,
        })
    }

    /// Single company profile; `None` when the registry has no such company
    pub async fn company(&self, company_number: &str) -> Result<Option<CompanySummary>, AppError> {
        let company_number = validate_company_number(company_number)?;
        self.ensure_configured()?;
        let profile = self
            .fetch_profile(company_number)
            .await
            .map_err(|e| AppError::Internal(format!("Registry lookup failed: {}", e)))?;
        Ok(profile.map(Into::into))
    }

    async fn fetch_profile(&self, company_number: &str) -> Result<Option<CompanyProfile>> {
        let company_number = validate_company_number(company_number)?;
        let url = format!("{}/company/{}", self.config.base_url, company_number);
        let resp = self
            .http
            .get(&url)
            .basic_auth(&self.config.api_key, Some(""))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            anyhow::bail!("registry returned {} for {}", resp.status(), company_number);
        }

        Ok(Some(resp.json().await?))
    }
}
