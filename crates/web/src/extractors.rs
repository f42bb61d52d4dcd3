//! Request extractors.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use url::form_urlencoded;
use yatube_core::{Action, authorize, login_url, parse_page};
use yatube_db::entities::user;

use crate::response::found;

/// Authenticated user extractor.
///
/// Anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

/// Rejection of [`AuthUser`]: a redirect to the login page.
#[derive(Debug)]
pub struct LoginRedirect(String);

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        found(&self.0)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        let viewer = parts.extensions.get::<user::Model>().cloned();
        let requested = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), |pq| pq.as_str());

        match (
            authorize(viewer.as_ref(), Action::Protected).redirect_target(requested),
            viewer,
        ) {
            (None, Some(user)) => Ok(Self(user)),
            (Some(target), _) => Err(LoginRedirect(target)),
            (None, None) => Err(LoginRedirect(login_url(requested))),
        }
    }
}

/// Optional authenticated user extractor.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<user::Model>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<user::Model>().cloned()))
    }
}

/// `?page=` of a feed. Any value is accepted; junk means the first page.
///
/// A repeated `page` key keeps its last value. Never rejects a request.
#[derive(Debug, Default)]
pub struct PageQuery {
    /// Raw `page` value.
    pub page: Option<String>,
}

impl PageQuery {
    /// Pick `page` out of a raw query string.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let page = form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == "page")
            .last()
            .map(|(_, value)| value.into_owned());
        Self { page }
    }

    /// Requested 1-based page number.
    #[must_use]
    pub fn number(&self) -> u64 {
        parse_page(self.page.as_deref())
    }
}

impl<S> FromRequestParts<S> for PageQuery
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.uri.query().map(Self::from_query).unwrap_or_default())
    }
}
