use crate::{
    config::Config, db::Database, mailer::Mailer, payments::PaymentsClient,
    realtime::MessageHub, registry::RegistryClient, storage::FileStorage,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Pending password reset, keyed by token
#[derive(Debug, Clone)]
pub struct PasswordResetState {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub storage: FileStorage,
    pub registry: RegistryClient,
    pub payments: PaymentsClient,
    pub mailer: Mailer,
    pub hub: Arc<MessageHub>,
    pub password_reset_tokens: Arc<DashMap<String, PasswordResetState>>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            storage: FileStorage::new(&config.storage.path),
            registry: RegistryClient::new(config.registry.clone()),
            payments: PaymentsClient::new(config.payments.clone()),
            mailer: Mailer::new(config.smtp.clone()),
            hub: Arc::new(MessageHub::new()),
            password_reset_tokens: Arc::new(DashMap::new()),
            config,
        }
    }
}
