//! Thin PostgREST client shared by the Supabase-backed stores.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{RemoteError, RemoteResult};
use crate::config::SupabaseConfig;
use crate::util::compact_text;

/// PostgREST client authorizing as the signed-in user when a token is set,
/// and as the anonymous role otherwise.
#[derive(Clone)]
pub struct SupabaseRestClient {
    rest_url: String,
    anon_key: String,
    client: Client,
    access_token: Arc<RwLock<Option<String>>>,
}

impl SupabaseRestClient {
    pub fn new(config: &SupabaseConfig) -> RemoteResult<Self> {
        Ok(Self {
            rest_url: config.rest_url(),
            anon_key: config.anon_key.clone(),
            client: Client::builder().build()?,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Set or clear the user access token sent with every request.
    ///
    /// Clones of this client share the token.
    pub fn set_access_token(&self, token: Option<String>) {
        let mut slot = self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = token.filter(|token| !token.trim().is_empty());
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = self
            .access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());

        self.client
            .request(method, format!("{}/{table}", self.rest_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
    }

    /// Send a request and decode the JSON rows it returns.
    pub(crate) async fn send_rows<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> RemoteResult<Vec<T>> {
        let response = request.send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<Vec<T>>().await?)
    }
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, parse_api_error(status, &body)))
}

/// 401 means the bearer token itself was refused (expired or revoked), which
/// says nothing about who owns a row. Only 403 is an ownership denial.
fn status_error(status: StatusCode, message: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::SessionRejected(message),
        StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
        status if status.is_server_error() => RemoteError::Unavailable(message),
        _ => RemoteError::Api(message),
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    error: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return match payload.hint.filter(|hint| !hint.trim().is_empty()) {
                Some(hint) => format!("{} ({}; {})", message.trim(), status.as_u16(), hint.trim()),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseRestClient {
        let config = SupabaseConfig::new("https://demo.supabase.co", "anon").unwrap();
        SupabaseRestClient::new(&config).unwrap()
    }

    #[test]
    fn parse_api_error_prefers_message_and_hint() {
        let rendered = parse_api_error(
            StatusCode::BAD_REQUEST,
            r#"{"message":"column missing","hint":"check schema"}"#,
        );
        assert_eq!(rendered, "column missing (400; check schema)");
    }

    #[test]
    fn parse_api_error_falls_back_to_status() {
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[test]
    fn status_error_separates_expired_sessions_from_ownership_denials() {
        let expired = status_error(StatusCode::UNAUTHORIZED, "JWT expired (401)".to_string());
        assert!(matches!(expired, RemoteError::SessionRejected(_)));
        assert!(matches!(
            crate::Error::from(expired),
            crate::Error::Remote(message) if message.contains("JWT expired")
        ));

        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "denied".to_string()),
            RemoteError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "down".to_string()),
            RemoteError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::CONFLICT, "dup".to_string()),
            RemoteError::Api(_)
        ));
    }

    #[test]
    fn access_token_is_shared_between_clones() {
        let first = client();
        let second = first.clone();
        first.set_access_token(Some("token".to_string()));
        assert!(second.has_access_token());

        second.set_access_token(Some("  ".to_string()));
        assert!(!first.has_access_token());
    }

    #[test]
    fn request_targets_table_under_rest_url() {
        let request = client().request(Method::GET, "entries").build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://demo.supabase.co/rest/v1/entries"
        );
        assert_eq!(request.headers()["apikey"], "anon");
    }
}
