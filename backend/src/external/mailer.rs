//! Outgoing mail
//!
//! `SmtpMailer` delivers through an SMTP relay with `lettre`; `LogMailer`
//! only logs, for runs without a relay configured.

use std::path::Path;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use shared::{AccountEmailKind, Invoice};

use crate::config::MailConfig;
use crate::error::{AppError, AppResult};

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the rendered invoice PDF as an attachment
    async fn send_invoice(&self, to: &str, pdf_path: &Path, invoice: &Invoice) -> AppResult<()>;

    /// Send a verification or password reset link
    async fn send_account_email(&self, to: &str, kind: AccountEmailKind, link: &str) -> AppResult<()>;
}

fn invoice_body(invoice: &Invoice) -> String {
    format!(
        "Dear {},\n\n\
         Please find attached invoice {} for your order.\n\n\
         Amount due: {} {:.2}\n\n\
         You can also download it at {}\n\n\
         Thank you for your business.\n",
        invoice.farmer_name,
        invoice.number(),
        invoice.currency.as_str(),
        invoice.total_amount,
        invoice.pdf_download_link,
    )
}

fn account_body(kind: AccountEmailKind, link: &str) -> String {
    match kind {
        AccountEmailKind::Verify => format!(
            "Welcome to AgriStock!\n\n\
             Please verify your email address by opening the link below:\n\n{}\n\n\
             This link expires in one hour.\n",
            link
        ),
        AccountEmailKind::Reset => format!(
            "A password reset was requested for your AgriStock account.\n\n\
             Open the link below to choose a new password:\n\n{}\n\n\
             This link expires in one hour. If you did not ask for this, ignore this email.\n",
            link
        ),
    }
}

/// SMTP delivery
#[derive(Clone)]
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> AppResult<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());
        Ok(AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| AppError::Mail(e.to_string()))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build())
    }

    fn builder(&self, to: &str, subject: &str) -> AppResult<lettre::message::MessageBuilder> {
        Ok(Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| AppError::Mail(format!("Invalid sender address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| AppError::Mail(format!("Invalid recipient address: {}", e)))?)
            .subject(subject))
    }

    async fn deliver(&self, message: Message) -> AppResult<()> {
        self.transport()?
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_invoice(&self, to: &str, pdf_path: &Path, invoice: &Invoice) -> AppResult<()> {
        let pdf = tokio::fs::read(pdf_path)
            .await
            .map_err(|e| AppError::Mail(format!("Cannot read invoice document: {}", e)))?;
        let pdf_type = ContentType::parse("application/pdf")
            .map_err(|e| AppError::Mail(e.to_string()))?;

        let message = self
            .builder(to, &format!("Invoice {}", invoice.number()))?
            .multipart(
                MultiPart::mixed()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(invoice_body(invoice)),
                    )
                    .singlepart(Attachment::new(invoice.file_name()).body(pdf, pdf_type)),
            )
            .map_err(|e| AppError::Mail(e.to_string()))?;

        self.deliver(message).await?;
        tracing::info!(invoice_id = %invoice.id, to, "Invoice email sent");
        Ok(())
    }

    async fn send_account_email(&self, to: &str, kind: AccountEmailKind, link: &str) -> AppResult<()> {
        let message = self
            .builder(to, kind.subject())?
            .header(ContentType::TEXT_PLAIN)
            .body(account_body(kind, link))
            .map_err(|e| AppError::Mail(e.to_string()))?;

        self.deliver(message).await?;
        tracing::info!(?kind, to, "Account email sent");
        Ok(())
    }
}

/// Logs mail instead of sending it
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_invoice(&self, to: &str, pdf_path: &Path, invoice: &Invoice) -> AppResult<()> {
        tracing::info!(
            invoice_id = %invoice.id,
            to,
            path = %pdf_path.display(),
            "Mail relay not configured; invoice email logged only"
        );
        Ok(())
    }

    async fn send_account_email(&self, to: &str, kind: AccountEmailKind, link: &str) -> AppResult<()> {
        tracing::info!(?kind, to, link, "Mail relay not configured; account email logged only");
        Ok(())
    }
}
