use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::config::AuthConfig;
use crate::security::Identity;

/// Maps bearer tokens to identities.
#[derive(Debug, Default)]
pub struct TokenAuthenticator {
    /// token -> identity name
    tokens: HashMap<String, String>,
    writers: HashSet<String>,
}

impl TokenAuthenticator {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .filter(|(_, token)| !token.is_empty())
            .map(|(name, token)| (token.clone(), name.clone()))
            .collect();
        Self {
            tokens,
            writers: config.writers.iter().cloned().collect(),
        }
    }

    /// Resolve the identity carried by a raw `Authorization` value.
    pub fn identify(&self, authorization: Option<&str>) -> Identity {
        let Some(token) = authorization.and_then(|v| v.strip_prefix("Bearer ")) else {
            return Identity::anonymous();
        };
        match self.tokens.get(token) {
            Some(name) if self.writers.contains(name) => Identity::writer(name.clone()),
            Some(name) => Identity::reader(name.clone()),
            None => Identity::anonymous(),
        }
    }

    pub fn identify_headers(&self, headers: &HeaderMap) -> Identity {
        self.identify(headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()))
    }
}

/// Attach the caller's [`Identity`] to every request.
pub async fn identity_middleware(
    State(auth): State<Arc<TokenAuthenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = auth.identify_headers(request.headers());
    if request.headers().contains_key(AUTHORIZATION) && !identity.is_authenticated() {
        tracing::warn!(path = %request.uri().path(), "Rejected unknown bearer token");
    }
    request.extensions_mut().insert(identity);
    next.run(request).await
}
