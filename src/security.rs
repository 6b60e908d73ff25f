use crate::models::ApiError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{self, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, convert::Infallible, env, sync::Arc};
use tracing::{info, warn};

const KEY_HEADER: &str = "X-Sync-Key";

/// Shared keys accepted on the protected routes. An empty set leaves the
/// routes open.
#[derive(Clone)]
pub struct AuthState {
    keys: Arc<HashMap<String, String>>,
}

/// Which configured key admitted the request; `open` when none are set.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub key_id: String,
}

impl AuthState {
    pub fn from_env() -> Self {
        let raw = env::var("SYNC_API_KEYS").unwrap_or_default();
        let state = Self::from_keys(raw.split(','));
        if state.keys.is_empty() {
            warn!(
                target = "sync.api",
                "SYNC_API_KEYS is empty; protected routes accept unauthenticated requests"
            );
        } else {
            info!(
                target = "sync.api",
                key_count = state.keys.len(),
                "loaded API keys from env"
            );
        }
        state
    }

    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let keys = keys
            .into_iter()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .enumerate()
            .map(|(idx, key)| (key.to_string(), format!("key-{:02}", idx + 1)))
            .collect();
        Self {
            keys: Arc::new(keys),
        }
    }

    fn authenticate(&self, presented: &str) -> Option<AuthContext> {
        self.keys.get(presented).map(|key_id| AuthContext {
            key_id: key_id.clone(),
        })
    }
}

pub async fn require_api_auth(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Infallible> {
    if state.keys.is_empty() {
        request.extensions_mut().insert(AuthContext {
            key_id: "open".into(),
        });
        return Ok(next.run(request).await);
    }

    let Some(presented) = extract_api_key(request.headers(), request.uri().query()) else {
        return Ok(unauthorized_response(
            "missing_api_key",
            "Provide X-Sync-Key, a Bearer token or a token query parameter",
        ));
    };

    let Some(context) = state.authenticate(&presented) else {
        return Ok(unauthorized_response("invalid_api_key", "Key not recognized"));
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Bearer header first, then `X-Sync-Key`, then `?token=`. Push
/// subscriptions can only carry a secret in their endpoint URL.
fn extract_api_key(headers: &http::HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION)
        && let Ok(raw) = value.to_str()
        && raw.len() >= 7
        && raw[..6].eq_ignore_ascii_case("bearer")
    {
        return Some(raw[6..].trim().to_string());
    }
    headers
        .get(KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| query.and_then(token_from_query))
}

fn token_from_query(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "token")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn unauthorized_response(code: &str, message: &str) -> Response {
    let payload = ApiError {
        error: code.to_string(),
        detail: Some(message.to_string()),
    };
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}
