use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Envelopes
// ============================================================================

/// Successful response body: `{ "data": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiData<T> {
    pub data: T,
}

impl<T> ApiData<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Failed response body: `{ "error": "..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Generic `{ success, message }` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoAmI {
    pub user_id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

// ============================================================================
// Service catalog
// ============================================================================

/// Catalog entry. `base_price` is in minor units (pence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub base_price: i64,
    pub is_active: bool,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub base_price: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub base_price: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_envelope_serialization() {
        let body = ApiData::new(vec![1, 2, 3]);
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"data":[1,2,3]}"#);
    }

    #[test]
    fn test_error_envelope_deserialization() {
        let err: ApiError = serde_json::from_str(r#"{"error":"Order not found"}"#).unwrap();
        assert_eq!(err.error, "Order not found");
    }

    #[test]
    fn test_register_request_optional_fields() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@b.com","password":"secret1"}"#).unwrap();
        assert_eq!(req.email, "a@b.com");
        assert!(req.full_name.is_none());
        assert!(req.phone_number.is_none());
    }

    #[test]
    fn test_create_service_defaults_to_active() {
        let req: CreateServiceRequest =
            serde_json::from_str(r#"{"title":"Dormant Accounts","base_price":4999}"#).unwrap();
        assert!(req.is_active);
        assert!(req.slug.is_none());
    }
}
