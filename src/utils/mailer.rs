use anyhow::{Context, Result, bail};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::Config;

/// Outbound relay for password reset mail.
pub struct Mailer {
    smtp: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.smtp_host.trim().is_empty() {
            bail!("SMTP_HOST is not set");
        }

        let from: Mailbox = config
            .mail_from
            .parse()
            .with_context(|| format!("MAIL_FROM {:?} is not a mailbox", config.mail_from))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .context("invalid SMTP relay")?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Mailer {
            smtp: builder.build(),
            from,
        })
    }

    pub async fn send_password_reset(&self, to_email: &str, link: &str) -> Result<()> {
        let email = password_reset_message(self.from.clone(), to_email, link)?;
        self.smtp.send(email).await.context("SMTP relay refused the message")?;
        info!(to = to_email, "Password reset mail sent");
        Ok(())
    }
}

fn password_reset_message(from: Mailbox, to_email: &str, link: &str) -> Result<Message> {
    let to: Mailbox = to_email
        .parse()
        .with_context(|| format!("{to_email:?} is not a valid address"))?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject("Reset your leave scheduler password")
        .header(ContentType::TEXT_PLAIN)
        .body(format!(
            "A password reset was requested for your account.\n\n\
             Open this link to choose a new password:\n{link}\n\n\
             If you did not ask for this, you can ignore this email."
        ))?;

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_carries_link_and_recipient() {
        let from: Mailbox = "Leave Desk <leave@example.com>".parse().unwrap();
        let message =
            password_reset_message(from, "ayu@example.com", "https://leave.example.com/reset?token=t")
                .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: ayu@example.com"));
        assert!(raw.contains("https://leave.example.com/reset?token=t"));
    }

    #[test]
    fn bad_recipient_is_an_error() {
        let from: Mailbox = "leave@example.com".parse().unwrap();
        assert!(password_reset_message(from, "not-an-address", "x").is_err());
    }

    #[test]
    fn missing_host_is_reported() {
        let mut config = Config::for_tests();
        config.smtp_host.clear();
        assert!(Mailer::from_config(&config).is_err());
    }
}
