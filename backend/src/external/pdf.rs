//! Invoice document rendering with `printpdf`

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use shared::{Invoice, Order};

use crate::error::{AppError, AppResult};

/// Everything printed on an invoice
#[derive(Debug, Clone)]
pub struct InvoiceDocument {
    pub invoice: Invoice,
    pub order: Order,
    pub contact_email: String,
}

#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    /// Render the document and return the path of the written file
    async fn render(&self, document: &InvoiceDocument) -> AppResult<PathBuf>;

    /// Remove a previously rendered file; missing files are ignored
    async fn discard(&self, invoice: &Invoice) -> AppResult<()>;
}

/// Writes A4 PDFs into a directory
#[derive(Debug, Clone)]
pub struct PdfInvoiceRenderer {
    output_dir: PathBuf,
}

impl PdfInvoiceRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

struct Cursor<'a> {
    layer: &'a PdfLayerReference,
    regular: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
    y: f32,
}

impl Cursor<'_> {
    fn line(&mut self, text: &str, size: f32, bold: bool) {
        let font = if bold { self.bold } else { self.regular };
        self.layer.use_text(text, size, Mm(20.0), Mm(self.y), font);
        self.y -= size * 0.5 + 2.0;
    }

    fn columns(&mut self, cells: [&str; 4], bold: bool) {
        let font = if bold { self.bold } else { self.regular };
        for (x, cell) in [20.0, 110.0, 135.0, 165.0].into_iter().zip(cells) {
            self.layer.use_text(cell, 10.0, Mm(x), Mm(self.y), font);
        }
        self.y -= 7.0;
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }
}

fn write_pdf(document: &InvoiceDocument, path: &Path) -> Result<(), String> {
    let invoice = &document.invoice;
    let title = format!("Invoice {}", invoice.number());
    let (doc, page, layer) = PdfDocument::new(&title, Mm(210.0), Mm(297.0), "Layer 1");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| e.to_string())?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| e.to_string())?;
    let layer = doc.get_page(page).get_layer(layer);

    let mut cursor = Cursor {
        layer: &layer,
        regular: &regular,
        bold: &bold,
        y: 270.0,
    };

    cursor.line("AgriStock", 20.0, true);
    cursor.line(&title, 14.0, true);
    cursor.gap(4.0);
    cursor.line(&format!("Date: {}", invoice.created_at.format("%Y-%m-%d")), 10.0, false);
    cursor.line(&format!("Order: {}", invoice.order_id), 10.0, false);
    cursor.line(&format!("Billed to: {}", invoice.farmer_name), 10.0, false);
    cursor.line(&format!("Contact: {}", document.contact_email), 10.0, false);
    cursor.gap(8.0);

    cursor.columns(["Product", "Qty", "Unit price", "Cost"], true);
    for line in &document.order.products {
        cursor.columns(
            [
                &line.product_name,
                &line.quantity.to_string(),
                &format!("{:.2}", line.unit_price),
                &format!("{:.2}", line.cost),
            ],
            false,
        );
    }

    cursor.gap(6.0);
    cursor.line(
        &format!("Total ({}): {:.2}", invoice.currency.as_str(), invoice.total_amount),
        12.0,
        true,
    );
    cursor.line(&format!("Status: {}", invoice.status.as_str()), 10.0, false);

    let file = File::create(path).map_err(|e| e.to_string())?;
    doc.save(&mut BufWriter::new(file)).map_err(|e| e.to_string())
}

#[async_trait]
impl InvoiceRenderer for PdfInvoiceRenderer {
    async fn render(&self, document: &InvoiceDocument) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AppError::Render(format!("Cannot create invoice directory: {}", e)))?;

        let path = self.output_dir.join(document.invoice.file_name());
        let target = path.clone();
        let document = document.clone();
        tokio::task::spawn_blocking(move || write_pdf(&document, &target))
            .await
            .map_err(|e| AppError::Render(e.to_string()))?
            .map_err(AppError::Render)?;

        tracing::debug!(path = %path.display(), "Invoice document rendered");
        Ok(path)
    }

    async fn discard(&self, invoice: &Invoice) -> AppResult<()> {
        let path = self.output_dir.join(invoice.file_name());
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Render(format!("Cannot remove {}: {}", path.display(), e))),
        }
    }
}
