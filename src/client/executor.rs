//! Authenticated request execution with outcome classification

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::http::HttpRequest;

use super::SpotifyClient;

/// Token acquisition is attempted only while fewer 429 retries than this happened
pub const MAX_TOKEN_ATTEMPTS: u32 = 3;
/// Upper bound on invalidate-and-retry cycles for persistent 401 answers
pub const MAX_UNAUTHORIZED_RETRIES: u32 = 2;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Successful response envelope
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body, `Value::Null` when empty or not JSON
    pub body: Value,
}

impl ApiResponse {
    pub fn is_no_content(&self) -> bool {
        self.status == 204
    }

    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.body)?)
    }
}

fn retry_after(header: Option<&str>) -> Duration {
    header
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_millis((secs * 1000.0) as u64))
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl SpotifyClient {
    /// Issue an authenticated call against the Web API.
    ///
    /// 401 invalidates the access token and retries (bounded); 429 waits for
    /// `Retry-After` and retries without a ceiling; other failures propagate.
    pub async fn execute(&self, path: &str, method: Method, body: Option<Value>) -> Result<ApiResponse> {
        let url = self.url(path);
        let mut attempt: u32 = 0;
        let mut unauthorized: u32 = 0;

        crate::log_api_request!(path, method = %method);

        loop {
            let token = match self.tokens.access_token().await {
                Some(token) => token,
                None if attempt < MAX_TOKEN_ATTEMPTS => self.tokens.ensure_access_token().await?,
                None => return Err(ApiError::Auth("No access token available".to_string())),
            };

            let mut request = HttpRequest::new(method.clone(), url.as_str())
                .bearer(token)
                .header("Content-Type", "application/json");
            if let Some(body) = &body {
                request = request.json(body.clone());
            }

            let response = self.transport.send(request).await?;
            let status = response.status;

            let result = match status {
                401 => {
                    unauthorized += 1;
                    self.tokens.invalidate().await;
                    if unauthorized > MAX_UNAUTHORIZED_RETRIES {
                        Err(ApiError::Auth(
                            "request still unauthorized after refreshing the access token".to_string(),
                        ))
                    } else {
                        tracing::debug!(path, unauthorized, "Access token rejected, refreshing");
                        continue;
                    }
                }
                403 => Err(ApiError::Permission),
                404 => Err(ApiError::NotFound),
                429 => {
                    let wait = retry_after(response.header("Retry-After"));
                    tracing::warn!(path, wait_ms = wait.as_millis() as u64, attempt, "Rate limited, backing off");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                    continue;
                }
                500 => Err(ApiError::Server),
                s if s >= 300 => Err(ApiError::UnexpectedStatus(s)),
                _ => {
                    let body = if response.body.trim().is_empty() {
                        Value::Null
                    } else {
                        serde_json::from_str(&response.body).unwrap_or(Value::Null)
                    };
                    Ok(ApiResponse { status, body })
                }
            };

            crate::log_api_result!(path, result);
            return result;
        }
    }

    pub(crate) async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.execute(path, Method::GET, None).await
    }
}
