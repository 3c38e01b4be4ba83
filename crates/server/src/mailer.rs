use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outbound HTML email via sendmail or an SMTP relay
#[derive(Clone)]
pub struct Mailer {
    config: SmtpConfig,
}

impl Mailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn support_email(&self) -> Option<&str> {
        self.config.support_email.as_deref()
    }

    pub async fn send(&self, to_email: &str, subject: &str, html: String) -> Result<(), BoxError> {
        let email = Message::builder()
            .from(format!("{} <{}>", self.config.from_name, self.config.from_email).parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;

        if self.config.use_sendmail {
            let mailer = AsyncSendmailTransport::<Tokio1Executor>::new();
            mailer.send(email).await?;
        } else {
            let creds = Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            );

            let mailer: AsyncSmtpTransport<Tokio1Executor> =
                AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)?
                    .credentials(creds)
                    .port(self.config.port)
                    .build();

            mailer.send(email).await?;
        }

        Ok(())
    }

    /// Fire-and-forget delivery; failures are logged only
    pub fn send_in_background(&self, to_email: String, subject: String, html: String) {
        if !self.enabled() {
            tracing::debug!("SMTP disabled, not sending '{}' to {}", subject, to_email);
            return;
        }

        let mailer = self.clone();
        tokio::spawn(async move {
            match mailer.send(&to_email, &subject, html).await {
                Ok(()) => tracing::info!("Email '{}' sent to {}", subject, to_email),
                Err(e) => tracing::error!("Failed to send email '{}' to {}: {}", subject, to_email, e),
            }
        });
    }
}

pub fn password_reset_email(reset_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Password Reset</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #1d4ed8;">Reset your password</h2>
    <p>We received a request to reset the password on your Company Filings account.</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{url}" style="background-color: #1d4ed8; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; display: inline-block;">Reset Password</a>
    </p>
    <p>Or copy and paste this link into your browser:</p>
    <p style="word-break: break-all; color: #666;">{url}</p>
    <p style="margin-top: 30px; color: #666; font-size: 14px;">This link will expire in 1 hour.</p>
    <p style="color: #666; font-size: 14px;">If you didn't request this, you can safely ignore this email.</p>
</body>
</html>"#,
        url = reset_url
    )
}

pub fn new_message_email(order_id: &str, text: &str, admin_url: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>New customer message</h2>
    <p>Order <strong>{order_id}</strong> has a new message:</p>
    <blockquote style="border-left: 3px solid #ccc; padding-left: 12px; color: #555;">{escaped}</blockquote>
    <p><a href="{admin_url}">Open the conversation</a></p>
</body>
</html>"#
    )
}
