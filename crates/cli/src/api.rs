//! Thin JSON client for the filings server: `{data}` on success, `{error}` otherwise.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{ApiData, ApiError, Attachment};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not logged in. Run 'filings login' first.")]
    NotLoggedIn,

    #[error("Session rejected ({0}). Run 'filings login' again.")]
    Unauthorized(String),

    #[error("{message} ({status})")]
    Api { status: StatusCode, message: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not read {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },
}

/// Best-effort error text from a failed response body
pub fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) => err.error,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string(),
    }
}

/// MIME type for an attachment, by extension
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Result<&str, ClientError> {
        self.token.as_deref().ok_or(ClientError::NotLoggedIn)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        tracing::debug!("Server returned {}: {}", status, message);

        if status == StatusCode::UNAUTHORIZED {
            return Err(match self.token {
                Some(_) => ClientError::Unauthorized(message),
                None => ClientError::NotLoggedIn,
            });
        }
        Err(ClientError::Api { status, message })
    }

    async fn decode<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, ClientError> {
        let resp = self.check(resp).await?;
        let body: ApiData<T> = resp.json().await?;
        Ok(body.data)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, path).send().await?;
        self.decode(resp).await
    }

    pub async fn get_query<Q: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, path).query(query).send().await?;
        self.decode(resp).await
    }

    pub async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.request(method, path).json(body).send().await?;
        self.decode(resp).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.send(Method::POST, path, body).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.request(Method::DELETE, path).send().await?;
        self.decode(resp).await
    }

    /// POST returning a raw body (e.g. a ZIP archive)
    pub async fn post_bytes<B: Serialize>(&self, path: &str, body: &B) -> Result<Vec<u8>, ClientError> {
        let resp = self.request(Method::POST, path).json(body).send().await?;
        let resp = self.check(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Upload a file for an order thread; returns the attachment to reference in a message
    pub async fn upload(&self, order_id: Uuid, path: &Path) -> Result<Attachment, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::File {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(guess_mime(path))?;
        let form = reqwest::multipart::Form::new()
            .text("order_id", order_id.to_string())
            .part("file", part);

        let resp = self
            .request(Method::POST, "/api/messages/upload")
            .multipart(form)
            .send()
            .await?;
        self.decode(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_envelope() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error":"Search query is required"}"#),
            "Search query is required"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("accounts.PDF")), "application/pdf");
        assert_eq!(guess_mime(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("no_extension")), "application/octet-stream");
    }

    #[test]
    fn test_token_required() {
        let client = ApiClient::new("http://localhost:8080", None);
        assert!(matches!(client.token(), Err(ClientError::NotLoggedIn)));
    }
}
