//! Per-company service quotes as PDF, bundled into a ZIP archive.

use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use futures::future::try_join_all;
use printpdf::path::PaintMode;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect};
use qrcode::{Color as QrColor, QrCode};
use shared::{checked_total, format_amount, slugify, CompanySummary, ServiceInfo};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const QR_SIZE: f32 = 45.0;
const QR_QUIET_ZONE: usize = 2;

/// Link printed on each document, pre-filled with the company and services
pub fn payment_url(public_url: &str, company_number: &str, service_slugs: &[&str]) -> String {
    format!(
        "{}/pay?company={}&services={}",
        public_url.trim_end_matches('/'),
        company_number.trim(),
        service_slugs.join(",")
    )
}

struct Page<'a> {
    layer: PdfLayerReference,
    regular: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
    cursor: f32,
}

impl Page<'_> {
    fn line(&mut self, text: &str, size: f32, bold: bool) {
        let font = if bold { self.bold } else { self.regular };
        self.layer
            .use_text(text, size, Mm(MARGIN), Mm(self.cursor), font);
        self.cursor -= size * 0.55;
    }

    fn text_at(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(y), self.regular);
    }

    fn gap(&mut self, mm: f32) {
        self.cursor -= mm;
    }

    fn rule(&mut self) {
        let rect = Rect::new(
            Mm(MARGIN),
            Mm(self.cursor),
            Mm(PAGE_WIDTH - MARGIN),
            Mm(self.cursor + 0.3),
        )
        .with_mode(PaintMode::Fill);
        self.layer.add_rect(rect);
        self.gap(5.0);
    }

    /// Draw dark modules as filled squares with the lower-left corner at (x, y)
    fn qr(&self, code: &QrCode, x: f32, y: f32) {
        let width = code.width();
        let module = QR_SIZE / (width + 2 * QR_QUIET_ZONE) as f32;
        for (idx, color) in code.to_colors().into_iter().enumerate() {
            if color != QrColor::Dark {
                continue;
            }
            let col = idx % width + QR_QUIET_ZONE;
            let row = idx / width + QR_QUIET_ZONE;
            let left = x + col as f32 * module;
            let top = y + QR_SIZE - row as f32 * module;
            let rect = Rect::new(Mm(left), Mm(top - module), Mm(left + module), Mm(top))
                .with_mode(PaintMode::Fill);
            self.layer.add_rect(rect);
        }
    }
}

/// One A4 page: company details, selected services with prices, and a QR code for `pay_url`
pub fn render_company_pdf(
    company: &CompanySummary,
    services: &[ServiceInfo],
    currency: &str,
    pay_url: &str,
) -> Result<Vec<u8>> {
    let code = QrCode::new(pay_url.as_bytes())
        .with_context(|| format!("payment link too long for company {}", company.company_number))?;

    let title = format!("{} - Filing Services", company.company_name);
    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    let mut page = Page {
        layer: doc.get_page(page).get_layer(layer),
        regular: &regular,
        bold: &bold,
        cursor: PAGE_HEIGHT - MARGIN - 5.0,
    };

    page.line("Company Filing Services", 20.0, true);
    page.gap(2.0);
    page.line(
        &format!("Prepared {}", chrono::Utc::now().format("%d %B %Y")),
        10.0,
        false,
    );
    page.gap(4.0);
    page.rule();

    page.line(&company.company_name, 14.0, true);
    page.line(&format!("Company number: {}", company.company_number), 11.0, false);
    let dash = "-".to_string();
    page.line(
        &format!("Status: {}", company.company_status.as_ref().unwrap_or(&dash)),
        11.0,
        false,
    );
    page.line(
        &format!(
            "Confirmation statement due: {}",
            company.confirmation_statement_due.as_ref().unwrap_or(&dash)
        ),
        11.0,
        false,
    );
    page.line(
        &format!("Accounts due: {}", company.accounts_due.as_ref().unwrap_or(&dash)),
        11.0,
        false,
    );
    page.gap(4.0);
    page.rule();

    page.line("Services", 13.0, true);
    page.gap(1.0);
    for service in services {
        let y = page.cursor;
        page.text_at(&service.title, 11.0, MARGIN, y);
        page.text_at(
            &format_amount(service.base_price, currency),
            11.0,
            PAGE_WIDTH - MARGIN - 30.0,
            y,
        );
        page.gap(6.5);
    }
    page.gap(2.0);
    page.rule();

    let total = checked_total(services.iter().map(|s| s.base_price))
        .context("service prices overflow the total")?;
    let y = page.cursor;
    page.layer
        .use_text("Total", 12.0, Mm(MARGIN), Mm(y), page.bold);
    page.layer.use_text(
        format_amount(total, currency),
        12.0,
        Mm(PAGE_WIDTH - MARGIN - 30.0),
        Mm(y),
        page.bold,
    );
    page.gap(12.0);

    let qr_y = (page.cursor - QR_SIZE).max(MARGIN + 15.0);
    page.qr(&code, MARGIN, qr_y);
    page.text_at("Scan to pay online, or visit:", 10.0, MARGIN + QR_SIZE + 6.0, qr_y + QR_SIZE - 6.0);
    page.text_at(pay_url, 8.0, MARGIN + QR_SIZE + 6.0, qr_y + QR_SIZE - 12.0);

    doc.save_to_bytes().context("failed to serialise PDF")
}

/// `{number}-{name}.pdf`, with `-2`, `-3`... appended on collisions
fn archive_names(companies: &[CompanySummary]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(companies.len());
    for company in companies {
        let mut stem = slugify(&company.company_number);
        let name_slug = slugify(&company.company_name);
        if !name_slug.is_empty() {
            stem = if stem.is_empty() { name_slug } else { format!("{}-{}", stem, name_slug) };
        }
        if stem.is_empty() {
            stem = "company".to_string();
        }

        let mut candidate = format!("{}.pdf", stem);
        let mut n = 2;
        while names.contains(&candidate) {
            candidate = format!("{}-{}.pdf", stem, n);
            n += 1;
        }
        names.push(candidate);
    }
    names
}

/// Render every company concurrently and zip the results.
/// Any single rendering failure fails the whole archive.
pub async fn build_archive(
    companies: Vec<CompanySummary>,
    services: Vec<ServiceInfo>,
    currency: String,
    public_url: String,
) -> Result<Vec<u8>> {
    let slugs: Vec<String> = services.iter().map(|s| s.slug.clone()).collect();
    let names = archive_names(&companies);

    let jobs = companies.into_iter().map(|company| {
        let services = services.clone();
        let currency = currency.clone();
        let slug_refs: Vec<&str> = slugs.iter().map(String::as_str).collect();
        let pay_url = payment_url(&public_url, &company.company_number, &slug_refs);
        let handle = tokio::task::spawn_blocking(move || {
            render_company_pdf(&company, &services, &currency, &pay_url)
        });
        async move { handle.await.context("PDF rendering task panicked")? }
    });
    let pdfs = try_join_all(jobs).await?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, pdf) in names.into_iter().zip(pdfs) {
        zip.start_file(name, options)?;
        zip.write_all(&pdf)?;
    }
    let cursor = zip.finish()?;

    Ok(cursor.into_inner())
}
