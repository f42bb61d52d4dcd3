//! HTML responses: rendering, redirects and error pages.

use askama::Template;
use axum::{
    body::{Body, to_bytes},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use yatube_common::AppError;

use crate::views::{Chrome, ClientErrorTemplate, NotFoundTemplate, ServerErrorTemplate};

/// Result type of page handlers.
pub type PageResult<T = Response> = Result<T, PageError>;

/// An error shown to the visitor as an HTML page.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct PageError(#[from] pub AppError);

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let err = self.0;

        if err.is_not_found() {
            tracing::debug!(error = %err, "Rendering not found page");
            let mut response = not_found_page(String::new());
            response.extensions_mut().insert(MissingPath);
            return response;
        }

        if err.is_server_error() {
            tracing::error!(error = %err, code = err.error_code(), "Request failed");
            let page = ServerErrorTemplate {
                chrome: Chrome::new("Server error", None),
            };
            return render_with_status(page, StatusCode::INTERNAL_SERVER_ERROR);
        }

        tracing::debug!(error = %err, code = err.error_code(), "Client error");
        client_error_page(err.status_code(), err.to_string())
    }
}

/// Marks a 404 page rendered without knowing the request path.
#[derive(Debug, Clone, Copy)]
struct MissingPath;

/// Longest rejection text carried into an error page.
const REJECTION_BODY_LIMIT: usize = 4096;

/// Turn every client error into an HTML page.
///
/// Handler 404s are re-rendered with the requested path. Plain responses
/// from extractor rejections and static files get the error page, keeping
/// their status and their text as the message.
pub async fn error_pages(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    if response.extensions().get::<MissingPath>().is_some() {
        return not_found_page(path);
    }

    let status = response.status();
    if !status.is_client_error() || is_html(&response) {
        return response;
    }
    if status == StatusCode::NOT_FOUND {
        return not_found_page(path);
    }

    let (parts, body) = response.into_parts();
    let message = match to_bytes(body, REJECTION_BODY_LIMIT).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };
    tracing::debug!(status = status.as_u16(), %message, "Request rejected");

    let mut page = client_error_page(status, message);
    if let Some(allow) = parts.headers.get(header::ALLOW) {
        page.headers_mut().insert(header::ALLOW, allow.clone());
    }
    page
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"))
}

fn client_error_page(status: StatusCode, message: String) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error");
    let page = ClientErrorTemplate {
        chrome: Chrome::new(reason, None),
        status: status.as_u16(),
        reason: reason.to_string(),
        message: if message.is_empty() {
            reason.to_string()
        } else {
            message
        },
    };
    render_with_status(page, status)
}

/// Render a template into an HTML body.
pub fn render_template<T: Template>(template: T) -> PageResult<Html<String>> {
    template
        .render()
        .map(Html)
        .map_err(|e| PageError(AppError::Template(e.to_string())))
}

/// Render a template as a complete `200 OK` response.
pub fn render<T: Template>(template: T) -> PageResult {
    Ok(render_template(template)?.into_response())
}

fn render_with_status<T: Template>(template: T, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Error page failed to render");
            (status, status.canonical_reason().unwrap_or_default()).into_response()
        }
    }
}

/// The custom 404 page.
pub fn not_found_page(path: String) -> Response {
    let page = NotFoundTemplate {
        chrome: Chrome::new("Page not found", None),
        path,
    };
    render_with_status(page, StatusCode::NOT_FOUND)
}

/// `302 Found` pointing at `location`.
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(e) => {
            tracing::error!(error = %e, location, "Invalid redirect target");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
