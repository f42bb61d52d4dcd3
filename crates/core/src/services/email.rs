//! Outgoing mail.

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use yatube_common::config::{MailConfig, MailTransport};
use yatube_common::{AppError, AppResult};

/// A plain text message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Something that delivers mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    async fn send(&self, mail: &Mail) -> AppResult<()>;
}

enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
    Log,
}

/// [`Mailer`] backed by lettre.
pub struct LettreMailer {
    transport: Transport,
    from: Mailbox,
}

impl LettreMailer {
    /// Build the transport `config` names.
    ///
    /// The file transport expects `file_dir` to exist.
    pub fn from_config(config: &MailConfig) -> AppResult<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid mail sender: {e}")))?;

        let transport = match config.transport {
            MailTransport::Smtp => {
                let smtp = &config.smtp;
                let builder = if smtp.starttls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                        .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
                }
                .port(smtp.port);

                let builder = match (&smtp.username, &smtp.password) {
                    (Some(username), Some(password)) => {
                        builder.credentials(Credentials::new(username.clone(), password.clone()))
                    }
                    _ => builder,
                };
                Transport::Smtp(builder.build())
            }
            MailTransport::File => {
                Transport::File(AsyncFileTransport::<Tokio1Executor>::new(&config.file_dir))
            }
            MailTransport::Log => Transport::Log,
        };

        Ok(Self { transport, from })
    }

    fn message(&self, mail: &Mail) -> AppResult<Message> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Mail(format!("Invalid recipient: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| AppError::Mail(e.to_string()))
    }
}

#[async_trait]
impl Mailer for LettreMailer {
    async fn send(&self, mail: &Mail) -> AppResult<()> {
        let message = self.message(mail)?;

        match &self.transport {
            Transport::Smtp(smtp) => {
                smtp.send(message)
                    .await
                    .map_err(|e| AppError::Mail(e.to_string()))?;
            }
            Transport::File(file) => {
                file.send(message)
                    .await
                    .map_err(|e| AppError::Mail(e.to_string()))?;
            }
            Transport::Log => {
                tracing::info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "Mail not sent (log transport)");
                return Ok(());
            }
        }

        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yatube_common::IdGenerator;

    fn file_config() -> MailConfig {
        let dir = std::env::temp_dir().join(format!("yatube-mail-{}", IdGenerator::new().generate()));
        MailConfig {
            transport: MailTransport::File,
            file_dir: dir,
            ..MailConfig::default()
        }
    }

    fn mail(to: &str) -> Mail {
        Mail {
            to: to.to_string(),
            subject: "Password reset".to_string(),
            body: "Follow the link".to_string(),
        }
    }

    #[tokio::test]
    async fn test_file_transport_writes_message() {
        let config = file_config();
        std::fs::create_dir_all(&config.file_dir).unwrap();
        let mailer = LettreMailer::from_config(&config).unwrap();

        mailer.send(&mail("leo@example.com")).await.unwrap();

        let written: Vec<_> = std::fs::read_dir(&config.file_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(written.len(), 1);
        let content = std::fs::read_to_string(&written[0]).unwrap();
        assert!(content.contains("To: leo@example.com"));
        assert!(content.contains("Subject: Password reset"));
        assert!(content.contains("Follow the link"));

        std::fs::remove_dir_all(&config.file_dir).unwrap();
    }

    #[tokio::test]
    async fn test_bad_recipient_is_mail_error() {
        let config = MailConfig {
            transport: MailTransport::Log,
            ..MailConfig::default()
        };
        let mailer = LettreMailer::from_config(&config).unwrap();

        let result = mailer.send(&mail("not an address")).await;

        assert!(matches!(result, Err(AppError::Mail(_))));
    }

    #[test]
    fn test_bad_sender_is_config_error() {
        let config = MailConfig {
            from: "nobody".to_string(),
            ..MailConfig::default()
        };

        assert!(matches!(
            LettreMailer::from_config(&config),
            Err(AppError::Config(_))
        ));
    }
}
