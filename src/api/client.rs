//! Authenticated HTTP client for the marketplace REST API
//!
//! Wraps reqwest::Client with bearer token injection and uniform error
//! mapping.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::Session;

/// REST failure, with the server's own message when it sent one.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("401 Unauthorized for {url}: {message}. Run 'venue-chat login'.")]
    Unauthorized { url: String, message: String },

    #[error("HTTP {status} for {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Authenticated client bound to one session token.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl ApiClient {
    pub fn new(base: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Client for the stored session. Fails when logged out or expired.
    pub fn from_config(config: &Config) -> Result<Self> {
        let session = config.require_session()?;
        Ok(Self::new(&config.api_base_url, &session.token))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        decode(check_response(resp, &url).await?, &url).await
    }

    /// POST a JSON body and decode the JSON reply.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!("POST {}", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        decode(check_response(resp, &url).await?, &url).await
    }

    /// PUT without a body; the reply body is ignored.
    pub async fn put(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        tracing::debug!("PUT {}", url);

        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        check_response(resp, &url).await?;
        Ok(())
    }

    /// Invalidate the token server-side.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let url = self.url("/api/auth/logout");
        tracing::debug!("POST {}", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        check_response(resp, &url).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// `POST /api/auth/login` reply.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Session,
}

/// Exchange credentials for a session token (unauthenticated).
pub async fn login(base: &str, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
    let url = format!("{}/api/auth/login", base.trim_end_matches('/'));
    tracing::debug!("POST {}", url);

    let resp = reqwest::Client::new()
        .post(&url)
        .json(&Credentials { email, password })
        .send()
        .await
        .map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;

    decode(check_response(resp, &url).await?, &url).await
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response, url: &str) -> Result<T, ApiError> {
    resp.json().await.map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized {
            url: url.to_string(),
            message,
        });
    }
    Err(ApiError::Status {
        status: status.as_u16(),
        url: url.to_string(),
        message,
    })
}

/// The backend reports failures as `{"error": ...}` or `{"message": ...}`.
fn error_message(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
    }
    let trimmed = body.trim();
    // HTML error pages are noise on a terminal.
    (!trimmed.is_empty() && !trimmed.starts_with('<')).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_fields() {
        assert_eq!(
            error_message(r#"{"error": "Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
        assert_eq!(
            error_message(r#"{"message": "Conversation not found", "code": 404}"#).as_deref(),
            Some("Conversation not found")
        );
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message("  Bad gateway \n").as_deref(), Some("Bad gateway"));
        assert_eq!(error_message("<html>oops</html>"), None);
        assert_eq!(error_message(""), None);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("https://api.test/", "t");
        assert_eq!(
            client.url("/api/users/1/conversations"),
            "https://api.test/api/users/1/conversations"
        );
    }

    #[test]
    fn test_unauthorized_display() {
        let err = ApiError::Unauthorized {
            url: "https://api.test/x".to_string(),
            message: "Token expired".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("Token expired"));
        assert!(text.contains("login"));
    }
}
