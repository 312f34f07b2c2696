use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::AppError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("storage rejected credentials: {0}")]
    Unauthorized(String),

    #[error("storage object not found: {0}")]
    NotFound(String),

    #[error("storage constraint violation: {0}")]
    Conflict(String),

    #[error("invalid storage request: {0}")]
    Invalid(String),

    #[error("tenant isolation violation: {0}")]
    Isolation(String),

    #[error("storage error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("storage transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(msg) => AppError::Conflict(msg),
            DbError::Isolation(msg) => AppError::IsolationViolation(msg),
            // A storage-level 404 means a missing table or endpoint, not a
            // missing row; PostgREST reports empty result sets as 200 [].
            other => AppError::Database(other.to_string()),
        }
    }
}

/// Thin PostgREST client. Row-level-security policies on the other side key
/// on the bearer token's claims, so the token a caller passes decides what
/// the storage layer will let it see.
#[derive(Clone)]
pub struct PostgrestClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl PostgrestClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.postgrest_url.clone(),
            service_key: config.postgrest_service_key.clone(),
        }
    }

    pub fn service_key(&self) -> &str {
        &self.service_key
    }

    fn headers(&self, bearer: &str) -> Result<HeaderMap, DbError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.service_key)
                .map_err(|_| DbError::Invalid("service key is not a valid header value".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|_| DbError::Invalid("bearer token is not a valid header value".into()))?,
        );

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        bearer: &str,
        body: Option<Value>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, bearer, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        bearer: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Storage request: {} {}", method, url);

        let mut headers = self.headers(bearer)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Storage error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    DbError::Unauthorized(error_text)
                }
                StatusCode::NOT_FOUND => DbError::NotFound(error_text),
                StatusCode::CONFLICT => DbError::Conflict(error_text),
                _ => DbError::Api {
                    status: status.as_u16(),
                    body: error_text,
                },
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Fire a request whose response body is irrelevant (deletes, patches
    /// without a representation preference).
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        bearer: &str,
        body: Option<Value>,
    ) -> Result<(), DbError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Storage request: {} {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.headers(bearer)?);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Storage error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    DbError::Unauthorized(error_text)
                }
                StatusCode::NOT_FOUND => DbError::NotFound(error_text),
                StatusCode::CONFLICT => DbError::Conflict(error_text),
                _ => DbError::Api {
                    status: status.as_u16(),
                    body: error_text,
                },
            });
        }

        Ok(())
    }
}
