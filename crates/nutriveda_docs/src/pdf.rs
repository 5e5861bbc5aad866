//! Paginated (PDF) renderer.
//!
//! Generates minimal but valid PDF 1.4 files using raw PDF construction with
//! the built-in Helvetica fonts, so no external font files are required.
//! Pagination is computed first as a [`PdfLayout`] (draw operations per page
//! plus where each block landed) and then serialized by [`PdfBuilder`].

use tracing::debug;

use crate::model::{ReportDocument, Section, SectionKind};
use crate::render::{BinaryArtifact, ExportFormat, RenderError, Renderer, suggested_filename};

// A4 in points.
const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
const MARGIN: f64 = 50.0;
const CONTENT_TOP: f64 = PAGE_HEIGHT - MARGIN;
const CONTENT_BOTTOM: f64 = 60.0;
const USABLE_WIDTH: f64 = PAGE_WIDTH - 2.0 * MARGIN;

const TITLE_SIZE: f64 = 18.0;
const HEADING_SIZE: f64 = 12.0;
const TABLE_SIZE: f64 = 8.0;
const HEADING_HEIGHT: f64 = 20.0;
const ROW_HEIGHT: f64 = 16.0;
const SECTION_GAP: f64 = 14.0;
const NOTE_HEIGHT: f64 = 11.0;
const CELL_PADDING: f64 = 3.0;
/// Average Helvetica glyph width as a fraction of the font size.
const GLYPH_WIDTH: f64 = 0.5;
const MAX_COLUMNS: usize = 16;

type Rgb = (f64, f64, f64);
const BLACK: Rgb = (0.0, 0.0, 0.0);
const WHITE: Rgb = (1.0, 1.0, 1.0);
const GREY: Rgb = (0.4, 0.4, 0.4);
const BRAND: Rgb = (0.18, 0.49, 0.2);
const BAND: Rgb = (0.945, 0.973, 0.914);

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Bold,
    Regular,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Self::Bold => "/F1",
            Self::Regular => "/F2",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f64,
        y: f64,
        size: f64,
        font: Font,
        color: Rgb,
        text: String,
    },
    FillRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        color: Rgb,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
}

/// Something the layout placed, for inspecting pagination decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Title,
    Heading(String),
    /// Column header row of a section; repeated on continuation pages.
    HeaderRow(String),
    DataRow(String, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub block: Block,
    pub page: usize,
    /// Top edge of the block.
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfLayout {
    pub pages: Vec<Vec<DrawOp>>,
    pub placements: Vec<Placement>,
}

impl PdfLayout {
    pub fn page_of(&self, block: &Block) -> Option<usize> {
        self.placements
            .iter()
            .find(|p| &p.block == block)
            .map(|p| p.page)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Escape special characters for PDF string literals and replace anything
/// the standard fonts cannot show.
fn pdf_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' | '\r' | '\t' => out.push(' '),
            c if (' '..='~').contains(&c) => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Truncate `text` so it fits `width` points at `size`, appending `...`.
fn fit_text(text: &str, width: f64, size: f64) -> String {
    let max_chars = ((width - 2.0 * CELL_PADDING) / (size * GLYPH_WIDTH)).floor();
    let max_chars = if max_chars < 1.0 { 1 } else { max_chars as usize };
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

/// Column widths proportional to content length, filling the usable width.
fn column_widths(section: &Section) -> Vec<f64> {
    let weights: Vec<f64> = section
        .columns
        .iter()
        .enumerate()
        .map(|(col, spec)| {
            let longest = section
                .rows
                .iter()
                .filter_map(|r| r.get(col))
                .map(|c| c.to_string().chars().count())
                .chain(std::iter::once(spec.header.chars().count()))
                .max()
                .unwrap_or(1);
            longest.clamp(4, 40) as f64
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| USABLE_WIDTH * w / total).collect()
}

struct LayoutCursor {
    layout: PdfLayout,
    y: f64,
}

impl LayoutCursor {
    fn new() -> Self {
        Self {
            layout: PdfLayout {
                pages: vec![Vec::new()],
                placements: Vec::new(),
            },
            y: CONTENT_TOP,
        }
    }

    fn page(&self) -> usize {
        self.layout.pages.len() - 1
    }

    fn remaining(&self) -> f64 {
        self.y - CONTENT_BOTTOM
    }

    fn at_page_top(&self) -> bool {
        self.y >= CONTENT_TOP
    }

    fn new_page(&mut self) {
        self.layout.pages.push(Vec::new());
        self.y = CONTENT_TOP;
    }

    fn draw(&mut self, op: DrawOp) {
        if let Some(page) = self.layout.pages.last_mut() {
            page.push(op);
        }
    }

    fn place(&mut self, block: Block) {
        let placement = Placement {
            block,
            page: self.page(),
            y: self.y,
        };
        self.layout.placements.push(placement);
    }

    fn text(&mut self, x: f64, y: f64, size: f64, font: Font, color: Rgb, text: &str) {
        self.draw(DrawOp::Text {
            x,
            y,
            size,
            font,
            color,
            text: text.to_string(),
        });
    }

    fn title_block(&mut self, doc: &ReportDocument) {
        self.place(Block::Title);
        let title = &doc.metadata.title;
        self.text(MARGIN, self.y - TITLE_SIZE, TITLE_SIZE, Font::Bold, BRAND, title);
        self.y -= TITLE_SIZE + 8.0;

        if let Some(clinic) = &doc.metadata.branding {
            self.text(MARGIN, self.y - 11.0, 11.0, Font::Bold, BLACK, clinic);
            self.y -= 16.0;
        }

        let stamp = format!(
            "Generated {}",
            doc.metadata.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
        self.text(MARGIN, self.y - 9.0, 9.0, Font::Regular, GREY, &stamp);
        self.y -= 16.0;

        // Notes spill onto further pages when there are many of them.
        for warning in &doc.warnings {
            if self.remaining() < NOTE_HEIGHT {
                self.new_page();
            }
            let line = fit_text(&format!("Note: {warning}"), USABLE_WIDTH, 8.0);
            self.text(MARGIN, self.y - 8.0, 8.0, Font::Regular, GREY, &line);
            self.y -= NOTE_HEIGHT;
        }

        self.draw(DrawOp::Line {
            x1: MARGIN,
            y1: self.y,
            x2: PAGE_WIDTH - MARGIN,
            y2: self.y,
        });
        self.y -= SECTION_GAP;
    }

    fn header_row(&mut self, section: &Section, widths: &[f64]) {
        self.place(Block::HeaderRow(section.title.clone()));
        self.draw(DrawOp::FillRect {
            x: MARGIN,
            y: self.y - ROW_HEIGHT,
            w: USABLE_WIDTH,
            h: ROW_HEIGHT,
            color: BRAND,
        });
        let mut x = MARGIN;
        for (spec, width) in section.columns.iter().zip(widths) {
            let label = fit_text(&spec.header, *width, TABLE_SIZE);
            let baseline = self.y - ROW_HEIGHT + 5.0;
            self.text(x + CELL_PADDING, baseline, TABLE_SIZE, Font::Bold, WHITE, &label);
            x += width;
        }
        self.y -= ROW_HEIGHT;
    }

    fn data_row(&mut self, section: &Section, index: usize, widths: &[f64]) {
        self.place(Block::DataRow(section.title.clone(), index));
        if index % 2 == 1 {
            self.draw(DrawOp::FillRect {
                x: MARGIN,
                y: self.y - ROW_HEIGHT,
                w: USABLE_WIDTH,
                h: ROW_HEIGHT,
                color: BAND,
            });
        }
        let mut x = MARGIN;
        for (cell, width) in section.rows[index].iter().zip(widths) {
            let text = fit_text(&cell.to_string(), *width, TABLE_SIZE);
            let baseline = self.y - ROW_HEIGHT + 5.0;
            self.text(x + CELL_PADDING, baseline, TABLE_SIZE, Font::Regular, BLACK, &text);
            x += width;
        }
        self.y -= ROW_HEIGHT;
    }

    fn section(&mut self, section: &Section) {
        let widths = column_widths(section);
        let first_row = if section.rows.is_empty() { 0.0 } else { ROW_HEIGHT };
        // Heading, column header and first data row stay together.
        let keep_together = HEADING_HEIGHT + ROW_HEIGHT + first_row;
        let full_height = HEADING_HEIGHT + ROW_HEIGHT * (1 + section.rows.len()) as f64;

        let needs_break = if section.kind == SectionKind::AyurvedicProperties {
            full_height > self.remaining()
        } else {
            keep_together > self.remaining()
        };
        if needs_break && !self.at_page_top() {
            self.new_page();
        }

        self.place(Block::Heading(section.title.clone()));
        self.text(
            MARGIN,
            self.y - HEADING_SIZE - 2.0,
            HEADING_SIZE,
            Font::Bold,
            BRAND,
            &section.title,
        );
        self.y -= HEADING_HEIGHT;
        self.header_row(section, &widths);

        if section.rows.is_empty() {
            self.text(
                MARGIN + CELL_PADDING,
                self.y - ROW_HEIGHT + 5.0,
                TABLE_SIZE,
                Font::Regular,
                GREY,
                "No entries",
            );
            self.y -= ROW_HEIGHT;
        }

        for index in 0..section.rows.len() {
            if ROW_HEIGHT > self.remaining() {
                self.new_page();
                self.header_row(section, &widths);
            }
            self.data_row(section, index, &widths);
        }
        self.y -= SECTION_GAP;
    }

    fn finish(mut self, doc: &ReportDocument) -> PdfLayout {
        let total = self.layout.pages.len();
        for (i, page) in self.layout.pages.iter_mut().enumerate() {
            page.push(DrawOp::Text {
                x: MARGIN,
                y: 30.0,
                size: 8.0,
                font: Font::Regular,
                color: GREY,
                text: fit_text(&doc.metadata.title, USABLE_WIDTH * 0.7, 8.0),
            });
            page.push(DrawOp::Text {
                x: PAGE_WIDTH - MARGIN - 50.0,
                y: 30.0,
                size: 8.0,
                font: Font::Regular,
                color: GREY,
                text: format!("Page {} of {total}", i + 1),
            });
        }
        self.layout
    }
}

/// Paginate `doc` without serializing it.
pub fn layout_document(doc: &ReportDocument) -> Result<PdfLayout, RenderError> {
    doc.validate()?;
    if let Some(wide) = doc.sections.iter().find(|s| s.columns.len() > MAX_COLUMNS) {
        return Err(RenderError::Pdf(format!(
            "Section '{}' has {} columns; at most {MAX_COLUMNS} fit on a page",
            wide.title,
            wide.columns.len()
        )));
    }

    let mut cursor = LayoutCursor::new();
    cursor.title_block(doc);
    for section in &doc.sections {
        cursor.section(section);
    }
    Ok(cursor.finish(doc))
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn content_stream(ops: &[DrawOp]) -> String {
    let mut content = String::new();
    for op in ops {
        match op {
            DrawOp::Text {
                x,
                y,
                size,
                font,
                color: (r, g, b),
                text,
            } => {
                content.push_str(&format!("{r:.3} {g:.3} {b:.3} rg\n"));
                content.push_str("BT\n");
                content.push_str(&format!("{} {size:.1} Tf\n", font.resource()));
                content.push_str(&format!("{x:.2} {y:.2} Td\n"));
                content.push_str(&format!("({}) Tj\n", pdf_escape(text)));
                content.push_str("ET\n");
            }
            DrawOp::FillRect {
                x,
                y,
                w,
                h,
                color: (r, g, b),
            } => {
                content.push_str(&format!("{r:.3} {g:.3} {b:.3} rg\n"));
                content.push_str(&format!("{x:.2} {y:.2} {w:.2} {h:.2} re f\n"));
            }
            DrawOp::Line { x1, y1, x2, y2 } => {
                content.push_str("0.6 0.6 0.6 RG\n0.5 w\n");
                content.push_str(&format!("{x1:.2} {y1:.2} m {x2:.2} {y2:.2} l S\n"));
            }
        }
    }
    content
}

/// Minimal PDF file builder. Constructs valid multi-page PDF 1.4 files.
struct PdfBuilder {
    pages: Vec<String>,
    title: String,
    creation_date: String,
}

impl PdfBuilder {
    fn new(title: &str, creation_date: String) -> Self {
        Self {
            pages: Vec::new(),
            title: title.to_string(),
            creation_date,
        }
    }

    fn add_page(&mut self, content: String) {
        self.pages.push(content);
    }

    /// Build the complete PDF file as bytes.
    ///
    /// Object numbers: 1 catalog, 2 page tree, 3-4 fonts, 5 info, then a
    /// page object and its content stream per page.
    fn build(&self) -> Vec<u8> {
        let mut pdf = String::new();
        let mut offsets: Vec<usize> = Vec::new();
        let page_obj = |i: usize| 6 + 2 * i;

        pdf.push_str("%PDF-1.4\n");

        offsets.push(pdf.len());
        pdf.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

        offsets.push(pdf.len());
        let kids: Vec<String> = (0..self.pages.len())
            .map(|i| format!("{} 0 R", page_obj(i)))
            .collect();
        pdf.push_str(&format!(
            "2 0 obj\n<< /Type /Pages /Kids [{}] /Count {} >>\nendobj\n",
            kids.join(" "),
            self.pages.len()
        ));

        offsets.push(pdf.len());
        pdf.push_str(
            "3 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold >>\nendobj\n",
        );

        offsets.push(pdf.len());
        pdf.push_str("4 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>\nendobj\n");

        offsets.push(pdf.len());
        pdf.push_str(&format!(
            "5 0 obj\n<< /Title ({}) /Producer (NutriVeda) /CreationDate ({}) >>\nendobj\n",
            pdf_escape(&self.title),
            self.creation_date
        ));

        for (i, content) in self.pages.iter().enumerate() {
            let page = page_obj(i);
            offsets.push(pdf.len());
            pdf.push_str(&format!(
                "{page} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH:.0} {PAGE_HEIGHT:.0}] \
                 /Contents {} 0 R /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> >>\nendobj\n",
                page + 1
            ));

            offsets.push(pdf.len());
            pdf.push_str(&format!(
                "{} 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
                page + 1,
                content.len(),
                content
            ));
        }

        // Cross-reference table
        let xref_offset = pdf.len();
        let num_objects = offsets.len() + 1; // +1 for free entry
        pdf.push_str(&format!("xref\n0 {num_objects}\n"));
        pdf.push_str("0000000000 65535 f \n");
        for offset in &offsets {
            pdf.push_str(&format!("{offset:010} 00000 n \n"));
        }

        pdf.push_str(&format!(
            "trailer\n<< /Size {num_objects} /Root 1 0 R /Info 5 0 R >>\n"
        ));
        pdf.push_str(&format!("startxref\n{xref_offset}\n%%EOF\n"));

        pdf.into_bytes()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfRenderer;

impl Renderer for PdfRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn render(&self, doc: &ReportDocument) -> Result<BinaryArtifact, RenderError> {
        let layout = layout_document(doc)?;
        let creation_date = doc
            .metadata
            .generated_at
            .format("D:%Y%m%d%H%M%SZ")
            .to_string();
        let mut builder = PdfBuilder::new(&doc.metadata.title, creation_date);
        for page in &layout.pages {
            builder.add_page(content_stream(page));
        }
        let bytes = builder.build();
        debug!(pages = layout.page_count(), size = bytes.len(), "Rendered PDF");
        Ok(BinaryArtifact {
            bytes,
            mime_type: ExportFormat::Pdf.mime_type().to_string(),
            suggested_filename: suggested_filename(doc, ExportFormat::Pdf),
        })
    }
}
