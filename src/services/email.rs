//! Outgoing mail
//!
//! [`Mailer`] is the transport seam. SMTP through lettre in production, a
//! logging stand-in when mail is disabled, and a recorder for tests.
//! [`EmailService`] composes the messages the portal sends.

use crate::config::{AuthConfig, MailConfig};
use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::{Arc, Mutex};

/// A composed message ready to hand to a transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        if config.smtp_host.is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .port(config.smtp_port)
            .build();
        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from_address),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let email = Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(mail.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(mail.html.clone())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Used when mail is disabled. Logs the envelope, never the body.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail delivery disabled, message not sent");
        Ok(())
    }
}

/// Keeps every message in memory
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Most recent message to `to`
    pub fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow!("Recording mailer poisoned"))?
            .push(mail.clone());
        Ok(())
    }
}

/// Pick the transport from configuration
pub fn create_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    if config.enabled {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        Ok(Arc::new(LogMailer))
    }
}

/// Composes and sends the portal's messages
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    invite_accept_url: String,
    reader_verify_url: String,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, auth: &AuthConfig) -> Self {
        Self {
            mailer,
            invite_accept_url: auth.invite_accept_url.clone(),
            reader_verify_url: auth.reader_verify_url.clone(),
        }
    }

    pub async fn send_password_reset_code(&self, to: &str, code: &str) -> Result<()> {
        let mail = OutgoingMail {
            to: to.to_string(),
            subject: "Código de redefinição de senha".to_string(),
            html: format!(
                "<p>Use o código <strong>{}</strong> para definir sua nova senha.</p>",
                code
            ),
        };
        self.mailer.send(&mail).await?;
        tracing::info!(to = %to, "Password reset code sent");
        Ok(())
    }

    pub async fn send_invite(&self, to: &str, token: &str) -> Result<()> {
        let url = invite_link(&self.invite_accept_url, to, token);
        let mail = OutgoingMail {
            to: to.to_string(),
            subject: "Convite para participar do sistema".to_string(),
            html: format!(
                "<p>Você foi convidado para a redação.</p><p><a href=\"{}\">Aceitar convite</a></p>",
                url
            ),
        };
        self.mailer.send(&mail).await?;
        tracing::info!(to = %to, "Invitation sent");
        Ok(())
    }

    pub async fn send_reader_signup_code(&self, to: &str, code: &str) -> Result<()> {
        let url = format!(
            "{}?email={}&code={}",
            self.reader_verify_url,
            urlencoding::encode(to),
            code
        );
        let mail = OutgoingMail {
            to: to.to_string(),
            subject: "Código de verificação".to_string(),
            html: format!(
                "<p>Seu código de verificação é: <strong>{}</strong></p>\
                 <p>Ou clique <a href=\"{}\">aqui</a> para acessar diretamente.</p>",
                code, url
            ),
        };
        self.mailer.send(&mail).await?;
        tracing::info!(to = %to, "Reader signup code sent");
        Ok(())
    }

    pub async fn send_newsletter_confirmation(&self, name: &str, to: &str) -> Result<()> {
        let mail = OutgoingMail {
            to: to.to_string(),
            subject: "Inscrição na newsletter confirmada".to_string(),
            html: format!(
                "<p>Olá, {}!</p><p>Sua inscrição na newsletter foi confirmada.</p>",
                name
            ),
        };
        self.mailer.send(&mail).await?;
        tracing::info!(to = %to, "Newsletter confirmation sent");
        Ok(())
    }
}

/// `{base}?email={urlencoded}&invitationToken={token}`
pub fn invite_link(base: &str, email: &str, token: &str) -> String {
    format!(
        "{}?email={}&invitationToken={}",
        base,
        urlencoding::encode(email),
        token
    )
}

/// Random 6-digit code, zero padded
pub fn generate_verification_code() -> String {
    format!("{:06}", OsRng.next_u32() % 1_000_000)
}
