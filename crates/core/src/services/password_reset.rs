//! Password reset by emailed one-time link.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use yatube_common::{AppResult, IdGenerator};
use yatube_db::{entities::user, repositories::UserRepository};

use super::email::{Mail, Mailer};
use super::user::{check_new_password, hash_password};
use crate::forms::{FormErrors, Submission};

/// Days a reset link stays usable.
pub const RESET_LINK_DAYS: i64 = 3;

/// Reset request form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordResetInput {
    #[serde(default)]
    pub email: String,
}

/// New password form behind a reset link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetPasswordInput {
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

/// Path of the reset link for `uid` and `token`.
#[must_use]
pub fn reset_link_path(uid: &str, token: &str) -> String {
    format!("/auth/reset/{uid}/{token}/")
}

/// Issues reset links and redeems them.
#[derive(Clone)]
pub struct PasswordResetService {
    user_repo: UserRepository,
    mailer: Arc<dyn Mailer>,
    site_url: String,
    id_gen: IdGenerator,
}

impl PasswordResetService {
    /// Create a service that mails links rooted at `site_url`.
    #[must_use]
    pub fn new(user_repo: UserRepository, mailer: Arc<dyn Mailer>, site_url: &str) -> Self {
        Self {
            user_repo,
            mailer,
            site_url: site_url.trim_end_matches('/').to_string(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Mail a fresh link to every account registered with the address.
    ///
    /// An unknown address is accepted silently so the form does not reveal
    /// which addresses have accounts. Accepted value is the number of mails.
    pub async fn request(&self, input: &PasswordResetInput) -> AppResult<Submission<usize>> {
        let email = input.email.trim();
        let mut errors = FormErrors::new();
        if email.is_empty() {
            errors.add("email", "This field is required.");
        } else if !validator::ValidateEmail::validate_email(&email.to_string()) {
            errors.add("email", "Enter a valid email address.");
        }
        if !errors.is_empty() {
            return Ok(Submission::Rejected(errors));
        }

        let users = self.user_repo.find_by_email(email).await?;
        if users.is_empty() {
            tracing::debug!("Password reset for unknown address");
        }

        let mut sent = 0;
        for user in users {
            let token = self.id_gen.generate_token();
            let mut active = user.into_active_model();
            active.reset_token = Set(Some(token.clone()));
            active.reset_requested_at = Set(Some(Utc::now().into()));
            let user = self.user_repo.update(active).await?;

            self.mailer.send(&self.reset_mail(&user, &token)).await?;
            tracing::info!(user_id = %user.id, "Password reset link sent");
            sent += 1;
        }

        Ok(Submission::Accepted(sent))
    }

    fn reset_mail(&self, user: &user::Model, token: &str) -> Mail {
        let link = format!("{}{}", self.site_url, reset_link_path(&user.id, token));
        Mail {
            to: user.email.clone(),
            subject: format!("Password reset on {}", self.site_url),
            body: format!(
                "You're receiving this email because you requested a password reset \
                 for your user account at {site}.\n\n\
                 Please go to the following page and choose a new password:\n\n\
                 {link}\n\n\
                 Your username, in case you've forgotten: {username}\n",
                site = self.site_url,
                username = user.username,
            ),
        }
    }

    /// The user a link belongs to, while it is unused and unexpired.
    pub async fn check_link(&self, uid: &str, token: &str) -> AppResult<Option<user::Model>> {
        let Some(user) = self.user_repo.find_by_id(uid).await? else {
            return Ok(None);
        };

        let matches = user.reset_token.as_deref() == Some(token);
        let fresh = user
            .reset_requested_at
            .is_some_and(|at| Utc::now() < at.to_utc() + Duration::days(RESET_LINK_DAYS));

        Ok((matches && fresh).then_some(user))
    }

    /// Set a new password through a link. `None` when the link is invalid.
    ///
    /// Success spends the link and ends every session of the user.
    pub async fn confirm(
        &self,
        uid: &str,
        token: &str,
        input: &SetPasswordInput,
    ) -> AppResult<Option<Submission<user::Model>>> {
        let Some(user) = self.check_link(uid, token).await? else {
            return Ok(None);
        };

        let mut errors = FormErrors::new();
        check_new_password(&mut errors, &input.new_password1, &input.new_password2);
        if !errors.is_empty() {
            return Ok(Some(Submission::Rejected(errors)));
        }

        let mut active = user.into_active_model();
        active.password = Set(hash_password(&input.new_password1)?);
        active.token = Set(Some(self.id_gen.generate_token()));
        active.reset_token = Set(None);
        active.reset_requested_at = Set(None);
        let user = self.user_repo.update(active).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(Some(Submission::Accepted(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sea_orm::ActiveModelTrait;
    use yatube_db::test_utils::{TestDatabase, token_for};

    use crate::services::UserService;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<Mail>>);

    #[async_trait]
    impl Mailer for Outbox {
        async fn send(&self, mail: &Mail) -> AppResult<()> {
            self.0.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    impl Outbox {
        fn sent(&self) -> Vec<Mail> {
            self.0.lock().unwrap().clone()
        }
    }

    async fn service() -> (PasswordResetService, Arc<Outbox>, TestDatabase) {
        let db = TestDatabase::new().await.unwrap();
        let outbox = Arc::new(Outbox::default());
        let service = PasswordResetService::new(
            UserRepository::new(db.conn()),
            outbox.clone(),
            "http://testserver/",
        );
        (service, outbox, db)
    }

    fn email(address: &str) -> PasswordResetInput {
        PasswordResetInput {
            email: address.to_string(),
        }
    }

    fn new_password(value: &str) -> SetPasswordInput {
        SetPasswordInput {
            new_password1: value.to_string(),
            new_password2: value.to_string(),
        }
    }

    /// `(uid, token)` from the link in a reset mail.
    fn link_parts(mail: &Mail) -> (String, String) {
        let link = mail
            .body
            .lines()
            .find(|line| line.starts_with("http://testserver/auth/reset/"))
            .unwrap();
        let mut parts = link
            .trim_start_matches("http://testserver/auth/reset/")
            .trim_end_matches('/')
            .split('/');
        (
            parts.next().unwrap().to_string(),
            parts.next().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_request_mails_a_link() {
        let (service, outbox, db) = service().await;
        let leo = db.insert_user("leo").await.unwrap();

        let sent = service
            .request(&email(" LEO@example.com "))
            .await
            .unwrap()
            .accepted()
            .unwrap();

        assert_eq!(sent, 1);
        let mails = outbox.sent();
        assert_eq!(mails[0].to, "leo@example.com");
        assert!(mails[0].body.contains("Your username, in case you've forgotten: leo"));
        let (uid, token) = link_parts(&mails[0]);
        assert_eq!(uid, leo.id);
        assert!(service.check_link(&uid, &token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_address_sends_nothing() {
        let (service, outbox, _db) = service().await;

        let sent = service
            .request(&email("nobody@example.com"))
            .await
            .unwrap()
            .accepted()
            .unwrap();

        assert_eq!(sent, 0);
        assert!(outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn test_request_rejects_bad_address() {
        let (service, outbox, _db) = service().await;

        let blank = service.request(&email("  ")).await.unwrap();
        let junk = service.request(&email("not-an-address")).await.unwrap();

        assert_eq!(
            blank.rejected().unwrap().get("email"),
            ["This field is required."]
        );
        assert_eq!(
            junk.rejected().unwrap().get("email"),
            ["Enter a valid email address."]
        );
        assert!(outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_sets_password_once() {
        let (service, outbox, db) = service().await;
        let users = UserService::new(UserRepository::new(db.conn()));
        db.insert_user("leo").await.unwrap();
        service.request(&email("leo@example.com")).await.unwrap();
        let (uid, token) = link_parts(&outbox.sent()[0]);

        let user = service
            .confirm(&uid, &token, &new_password("anna-karenina"))
            .await
            .unwrap()
            .unwrap()
            .accepted()
            .unwrap();

        assert!(user.reset_token.is_none());
        assert!(users.authenticate("leo", "anna-karenina").await.is_ok());
        // existing sessions end
        assert!(
            users
                .authenticate_by_token(&token_for("leo"))
                .await
                .unwrap()
                .is_none()
        );
        // the link is spent
        assert!(service.check_link(&uid, &token).await.unwrap().is_none());
        assert!(
            service
                .confirm(&uid, &token, &new_password("resurrection"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_confirm_rejects_short_or_mismatched_password() {
        let (service, outbox, db) = service().await;
        db.insert_user("leo").await.unwrap();
        service.request(&email("leo@example.com")).await.unwrap();
        let (uid, token) = link_parts(&outbox.sent()[0]);

        let input = SetPasswordInput {
            new_password1: "short".to_string(),
            new_password2: "other".to_string(),
        };
        let errors = service
            .confirm(&uid, &token, &input)
            .await
            .unwrap()
            .unwrap()
            .rejected()
            .unwrap();

        assert!(errors.has("new_password1"));
        assert!(errors.has("new_password2"));
        // a rejected form keeps the link usable
        assert!(service.check_link(&uid, &token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_wrong_or_expired_link_is_invalid() {
        let (service, outbox, db) = service().await;
        db.insert_user("leo").await.unwrap();
        service.request(&email("leo@example.com")).await.unwrap();
        let (uid, token) = link_parts(&outbox.sent()[0]);

        assert!(service.check_link(&uid, "forged").await.unwrap().is_none());
        assert!(service.check_link("nobody", &token).await.unwrap().is_none());

        let repo = UserRepository::new(db.conn());
        let mut active = repo.get_by_id(&uid).await.unwrap().into_active_model();
        active.reset_requested_at =
            Set(Some((Utc::now() - Duration::days(RESET_LINK_DAYS) - Duration::minutes(1)).into()));
        active.update(db.conn.as_ref()).await.unwrap();

        assert!(service.check_link(&uid, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_password_change_spends_pending_link() {
        let (service, outbox, db) = service().await;
        let users = UserService::new(UserRepository::new(db.conn()));
        let session = users
            .signup(crate::SignupInput {
                username: "leo".to_string(),
                email: "leo@example.com".to_string(),
                password1: "war-and-peace".to_string(),
                password2: "war-and-peace".to_string(),
                ..crate::SignupInput::default()
            })
            .await
            .unwrap()
            .accepted()
            .unwrap();
        service.request(&email("leo@example.com")).await.unwrap();
        let (uid, token) = link_parts(&outbox.sent()[0]);
        let user = UserRepository::new(db.conn()).get_by_id(&uid).await.unwrap();

        users
            .change_password(
                user,
                &crate::PasswordChangeInput {
                    old_password: "war-and-peace".to_string(),
                    new_password1: "resurrection".to_string(),
                    new_password2: "resurrection".to_string(),
                },
            )
            .await
            .unwrap()
            .accepted()
            .unwrap();

        assert_eq!(session.user.id, uid);
        assert!(service.check_link(&uid, &token).await.unwrap().is_none());
    }
}
