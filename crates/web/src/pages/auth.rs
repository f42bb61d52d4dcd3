//! Signup, login, logout, password change and password reset.

use axum::{
    Form,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;
use yatube_common::config::SessionConfig;
use yatube_core::{
    FormErrors, LoginInput, PasswordChangeInput, PasswordResetInput, SetPasswordInput,
    SignupInput, Submission, is_safe_next, reset_link_path,
};

use crate::extractors::{AuthUser, MaybeAuthUser};
use crate::middleware::AppState;
use crate::response::{PageResult, found, render};
use crate::views::{
    Chrome, LoggedOutTemplate, LoginTemplate, PasswordChangeDoneTemplate,
    PasswordChangeTemplate, PasswordResetCompleteTemplate, PasswordResetConfirmTemplate,
    PasswordResetDoneTemplate, PasswordResetTemplate, SignupTemplate,
};

/// Where the password change form sends a successful caller.
pub const PASSWORD_CHANGE_DONE_PATH: &str = "/auth/password_change/done/";
/// Where the reset request form sends every valid submission.
pub const PASSWORD_RESET_DONE_PATH: &str = "/auth/password_reset/done/";
/// Where a redeemed reset link ends up.
pub const PASSWORD_RESET_COMPLETE_PATH: &str = "/auth/reset/done/";

/// `?next=` of the login page.
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    /// Path to return to after login.
    pub next: Option<String>,
}

/// Submitted login form.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: String,
}

fn session_cookie(config: &SessionConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .build()
}

fn signup_page(
    viewer: Option<&yatube_db::entities::user::Model>,
    input: &SignupInput,
    errors: FormErrors,
) -> PageResult {
    render(SignupTemplate {
        chrome: Chrome::new("Sign up", viewer),
        first_name: input.first_name.clone(),
        last_name: input.last_name.clone(),
        username: input.username.clone(),
        email: input.email.clone(),
        errors,
    })
}

/// Empty registration form.
pub async fn signup_form(MaybeAuthUser(viewer): MaybeAuthUser) -> PageResult {
    signup_page(viewer.as_ref(), &SignupInput::default(), FormErrors::new())
}

/// Register, then go to the front page.
pub async fn signup(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Form(input): Form<SignupInput>,
) -> PageResult {
    match state.user_service.signup(input.clone()).await? {
        Submission::Accepted(_) => Ok(found("/")),
        Submission::Rejected(errors) => signup_page(viewer.as_ref(), &input, errors),
    }
}

/// Login form remembering `next`.
pub async fn login_form(
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(query): Query<NextQuery>,
) -> PageResult {
    render(LoginTemplate {
        chrome: Chrome::new("Log in", viewer.as_ref()),
        username: String::new(),
        next: query.next.unwrap_or_default(),
        errors: FormErrors::new(),
    })
}

/// Log in, set the session cookie and follow `next` when it is local.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> PageResult {
    let input = LoginInput {
        username: form.username,
        password: form.password,
    };

    match state.user_service.login(&input).await? {
        Submission::Accepted(session) => {
            let target = if is_safe_next(&form.next) {
                form.next.as_str()
            } else {
                "/"
            };
            let jar = jar.add(session_cookie(&state.session, session.token));
            Ok((jar, found(target)).into_response())
        }
        Submission::Rejected(errors) => render(LoginTemplate {
            chrome: Chrome::new("Log in", None),
            username: input.username,
            next: form.next,
            errors,
        }),
    }
}

/// Revoke the session and drop the cookie.
pub async fn logout(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    jar: CookieJar,
) -> PageResult {
    if let Some(user) = viewer {
        state.user_service.logout(user).await?;
    }

    let jar = jar.remove(Cookie::build(state.session.cookie_name.clone()).path("/"));
    let page = render(LoggedOutTemplate {
        chrome: Chrome::new("Logged out", None),
    })?;
    Ok((jar, page).into_response())
}

/// Password change form.
pub async fn password_change_form(AuthUser(user): AuthUser) -> PageResult {
    render(PasswordChangeTemplate {
        chrome: Chrome::new("Change password", Some(&user)),
        errors: FormErrors::new(),
    })
}

/// Change the password, then confirm.
///
/// The change ends every other session, so this one gets the new token.
pub async fn password_change(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
    Form(input): Form<PasswordChangeInput>,
) -> PageResult {
    let chrome = Chrome::new("Change password", Some(&user));
    match state.user_service.change_password(user, &input).await? {
        Submission::Accepted(session) => {
            let jar = jar.add(session_cookie(&state.session, session.token));
            Ok((jar, found(PASSWORD_CHANGE_DONE_PATH)).into_response())
        }
        Submission::Rejected(errors) => render(PasswordChangeTemplate { chrome, errors }),
    }
}

/// Password change confirmation.
pub async fn password_change_done(AuthUser(user): AuthUser) -> PageResult {
    render(PasswordChangeDoneTemplate {
        chrome: Chrome::new("Password changed", Some(&user)),
    })
}

/// Reset request form.
pub async fn password_reset_form(MaybeAuthUser(viewer): MaybeAuthUser) -> PageResult {
    render(PasswordResetTemplate {
        chrome: Chrome::new("Reset password", viewer.as_ref()),
        email: String::new(),
        errors: FormErrors::new(),
    })
}

/// Mail a reset link. Known and unknown addresses land on the same page.
pub async fn password_reset(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Form(input): Form<PasswordResetInput>,
) -> PageResult {
    match state.password_reset_service.request(&input).await? {
        Submission::Accepted(_) => Ok(found(PASSWORD_RESET_DONE_PATH)),
        Submission::Rejected(errors) => render(PasswordResetTemplate {
            chrome: Chrome::new("Reset password", viewer.as_ref()),
            email: input.email,
            errors,
        }),
    }
}

/// "Check your email" page.
pub async fn password_reset_done(MaybeAuthUser(viewer): MaybeAuthUser) -> PageResult {
    render(PasswordResetDoneTemplate {
        chrome: Chrome::new("Password reset sent", viewer.as_ref()),
    })
}

fn reset_confirm_page(
    viewer: Option<&yatube_db::entities::user::Model>,
    uid: &str,
    token: &str,
    validlink: bool,
    errors: FormErrors,
) -> PageResult {
    render(PasswordResetConfirmTemplate {
        chrome: Chrome::new("Set a new password", viewer),
        validlink,
        action: reset_link_path(uid, token),
        errors,
    })
}

/// New password form behind a reset link, or the invalid link notice.
pub async fn password_reset_confirm_form(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path((uid, token)): Path<(String, String)>,
) -> PageResult {
    let validlink = state
        .password_reset_service
        .check_link(&uid, &token)
        .await?
        .is_some();
    reset_confirm_page(viewer.as_ref(), &uid, &token, validlink, FormErrors::new())
}

/// Set the new password and spend the link.
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path((uid, token)): Path<(String, String)>,
    Form(input): Form<SetPasswordInput>,
) -> PageResult {
    match state
        .password_reset_service
        .confirm(&uid, &token, &input)
        .await?
    {
        Some(Submission::Accepted(_)) => Ok(found(PASSWORD_RESET_COMPLETE_PATH)),
        Some(Submission::Rejected(errors)) => {
            reset_confirm_page(viewer.as_ref(), &uid, &token, true, errors)
        }
        None => reset_confirm_page(viewer.as_ref(), &uid, &token, false, FormErrors::new()),
    }
}

/// Final page of the reset flow.
pub async fn password_reset_complete(MaybeAuthUser(viewer): MaybeAuthUser) -> PageResult {
    render(PasswordResetCompleteTemplate {
        chrome: Chrome::new("Password set", viewer.as_ref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let config = SessionConfig {
            cookie_name: "yatube_session".to_string(),
            secure: true,
        };

        let cookie = session_cookie(&config, "abc".to_string());

        assert_eq!(cookie.name(), "yatube_session");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }
}
