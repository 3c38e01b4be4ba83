use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the customer site, used in emails and payment links
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
    /// Accounts with these emails are granted admin on register/login
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

impl AuthConfig {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email.trim()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub enabled: bool,
    /// Use local sendmail binary instead of SMTP server
    #[serde(default = "default_true")]
    pub use_sendmail: bool,
    /// SMTP server host (only used if use_sendmail is false)
    #[serde(default)]
    pub host: String,
    /// SMTP server port (only used if use_sendmail is false)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// SMTP username (only used if use_sendmail is false)
    #[serde(default)]
    pub username: String,
    /// SMTP password (only used if use_sendmail is false)
    #[serde(default)]
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    /// Where new customer messages are announced; unset disables the notice
    #[serde(default)]
    pub support_email: Option<String>,
}

/// Companies House public data API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default = "default_payments_url")]
    pub base_url: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for uploaded attachments
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: u64,
}

fn default_true() -> bool { true }
fn default_smtp_port() -> u16 { 587 }
fn default_public_url() -> String { "http://localhost:3000".to_string() }
fn default_registry_url() -> String { "https://api.company-information.service.gov.uk".to_string() }
fn default_items_per_page() -> u32 { 20 }
fn default_payments_url() -> String { "https://api.stripe.com".to_string() }
fn default_currency() -> String { "gbp".to_string() }
fn default_storage_path() -> String { "./data/uploads".to_string() }
fn default_max_upload() -> u64 { 10 * 1024 * 1024 }

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_sendmail: true,
            host: "".to_string(),
            port: 587,
            username: "".to_string(),
            password: "".to_string(),
            from_email: "noreply@filings.local".to_string(),
            from_name: "Company Filings".to_string(),
            support_email: None,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_url(),
            api_key: String::new(),
            items_per_page: default_items_per_page(),
        }
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            base_url: default_payments_url(),
            secret_key: String::new(),
            currency: default_currency(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                public_url: default_public_url(),
            },
            database: DatabaseConfig {
                path: "./data/filings.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_expiry_hours: 24,
                admin_emails: Vec::new(),
            },
            smtp: SmtpConfig::default(),
            registry: RegistryConfig::default(),
            payments: PaymentsConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("FILINGS_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("filings-server.toml"),
            PathBuf::from("config/filings-server.toml"),
            PathBuf::from("/etc/filings/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // Return default config if no file found
        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Secrets and service URLs come from the environment when set
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FILINGS_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = lookup("FILINGS_ADMIN_EMAILS") {
            self.auth.admin_emails = v
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }
        if let Some(v) = lookup("FILINGS_DATABASE_PATH") {
            self.database.path = v;
        }
        if let Some(v) = lookup("FILINGS_PUBLIC_URL") {
            self.server.public_url = v;
        }
        if let Some(v) = lookup("COMPANIES_HOUSE_API_KEY") {
            self.registry.api_key = v;
        }
        if let Some(v) = lookup("COMPANIES_HOUSE_BASE_URL") {
            self.registry.base_url = v;
        }
        if let Some(v) = lookup("STRIPE_SECRET_KEY") {
            self.payments.secret_key = v;
        }
        if let Some(v) = lookup("STRIPE_BASE_URL") {
            self.payments.base_url = v;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
    }
}
