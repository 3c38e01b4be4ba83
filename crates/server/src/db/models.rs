use anyhow::{Context, Result};
use shared::{
    Attachment, CachedCompany, MessageInfo, OrderInfo, OrderMetadata, ProfileInfo, SavedCompany,
    ServiceInfo, ThreadSummary,
};
use sqlx::FromRow;
use uuid::Uuid;

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid id in database: {}", raw))
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: String,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
}

impl Profile {
    pub fn to_info(&self) -> Result<ProfileInfo> {
        Ok(ProfileInfo {
            id: parse_id(&self.id)?,
            full_name: self.full_name.clone(),
            company_name: self.company_name.clone(),
            phone_number: self.phone_number.clone(),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Company {
    pub id: String,
    pub user_id: String,
    pub company_number: String,
    pub company_name: String,
    pub status: Option<String>,
    pub confirmation_statement_due: Option<String>,
    pub accounts_due: Option<String>,
    pub is_favorite: bool,
    pub created_at: Option<String>,
}

impl Company {
    pub fn to_info(&self) -> Result<SavedCompany> {
        Ok(SavedCompany {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            company_number: self.company_number.clone(),
            company_name: self.company_name.clone(),
            status: self.status.clone(),
            confirmation_statement_due: self.confirmation_statement_due.clone(),
            accounts_due: self.accounts_due.clone(),
            is_favorite: self.is_favorite,
            created_at: self.created_at.clone(),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CompanyCacheEntry {
    pub company_number: String,
    pub company_name: String,
    pub company_status: Option<String>,
    pub confirmation_statement_due: Option<String>,
    pub accounts_due: Option<String>,
    pub updated_at: Option<String>,
}

impl From<CompanyCacheEntry> for CachedCompany {
    fn from(entry: CompanyCacheEntry) -> Self {
        CachedCompany {
            company_number: entry.company_number,
            company_name: entry.company_name,
            company_status: entry.company_status,
            confirmation_statement_due: entry.confirmation_statement_due,
            accounts_due: entry.accounts_due,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Service {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub base_price: i64,
    pub is_active: bool,
    pub category: Option<String>,
}

impl Service {
    pub fn to_info(&self) -> Result<ServiceInfo> {
        Ok(ServiceInfo {
            id: parse_id(&self.id)?,
            title: self.title.clone(),
            slug: self.slug.clone(),
            base_price: self.base_price,
            is_active: self.is_active,
            category: self.category.clone(),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub stripe_payment_intent_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub payment_status: String,
    pub service_type: String,
    /// JSON-encoded `OrderMetadata`
    pub metadata: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Order {
    pub fn to_info(&self) -> Result<OrderInfo> {
        let metadata = match self.metadata.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str::<OrderMetadata>(raw)
                .with_context(|| format!("invalid metadata on order {}", self.id))?,
            _ => OrderMetadata::default(),
        };

        Ok(OrderInfo {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            stripe_payment_intent_id: self.stripe_payment_intent_id.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            status: self.status.parse()?,
            payment_status: self.payment_status.parse()?,
            service_type: self.service_type.clone(),
            metadata,
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: String,
    pub order_id: String,
    pub sender_id: String,
    pub is_admin: bool,
    pub message_text: String,
    /// JSON array of `Attachment`
    pub attachments: Option<String>,
    pub read_by_user: bool,
    pub read_by_admin: bool,
    pub created_at: Option<String>,
}

impl Message {
    pub fn to_info(&self) -> Result<MessageInfo> {
        let attachments = match self.attachments.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str::<Vec<Attachment>>(raw)
                .with_context(|| format!("invalid attachments on message {}", self.id))?,
            _ => Vec::new(),
        };

        Ok(MessageInfo {
            id: parse_id(&self.id)?,
            order_id: parse_id(&self.order_id)?,
            sender_id: parse_id(&self.sender_id)?,
            is_admin: self.is_admin,
            message_text: self.message_text.clone(),
            attachments,
            read_by_user: self.read_by_user,
            read_by_admin: self.read_by_admin,
            created_at: self.created_at.clone(),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ThreadRow {
    pub order_id: String,
    pub user_id: String,
    pub last_message: String,
    pub last_message_at: Option<String>,
    pub message_count: i64,
    pub unread_by_admin: i64,
}

impl ThreadRow {
    pub fn to_info(&self) -> Result<ThreadSummary> {
        Ok(ThreadSummary {
            order_id: parse_id(&self.order_id)?,
            user_id: parse_id(&self.user_id)?,
            last_message: self.last_message.clone(),
            last_message_at: self.last_message_at.clone(),
            message_count: self.message_count,
            unread_by_admin: self.unread_by_admin,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AdminUser {
    pub id: String,
    pub user_id: String,
    pub role: String,
    pub is_active: bool,
    /// JSON object, stored as given
    pub permissions: Option<String>,
}
