use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use tracing::debug;

use shared_models::auth::{Role, ROLE_HEADER};

/// Role claimed by the caller through the trusted role header.
///
/// Extraction never fails: a missing or unrecognized header yields `role: None`,
/// and the route's policy decides what an anonymous caller may do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerRole {
    pub role: Option<Role>,
    pub raw: Option<String>,
}

impl CallerRole {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_role(role: Role) -> Self {
        Self {
            role: Some(role),
            raw: Some(role.as_str().to_string()),
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let raw = match headers.get(ROLE_HEADER) {
            Some(value) => match value.to_str() {
                Ok(text) => text.to_string(),
                Err(_) => {
                    debug!("Ignoring non-text {} header", ROLE_HEADER);
                    return Self::anonymous();
                }
            },
            None => return Self::anonymous(),
        };

        let role = match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                debug!("Unrecognized caller role: {}", e);
                None
            }
        };

        Self { role, raw: Some(raw) }
    }
}

impl<S> FromRequestParts<S> for CallerRole
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
