//! External collaborators: outgoing mail and invoice documents

pub mod mailer;
pub mod pdf;

pub use mailer::{LogMailer, Mailer, SmtpMailer};
pub use pdf::{InvoiceDocument, InvoiceRenderer, PdfInvoiceRenderer};
