//! Spreadsheet renderer.
//!
//! Layout (sheet names, widths, row styles) is worked out by [`plan_workbook`]
//! as plain data; [`SpreadsheetRenderer`] only writes that plan with
//! `rust_xlsxwriter`.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::collections::HashSet;
use tracing::debug;

use crate::model::{CellValue, ReportDocument};
use crate::render::{BinaryArtifact, ExportFormat, RenderError, Renderer, suggested_filename};

const MAX_SHEET_NAME: usize = 31;
const MIN_COLUMN_WIDTH: f64 = 10.0;
const MAX_COLUMN_WIDTH: f64 = 60.0;
const HEADER_FILL: u32 = 0x2E7D32;
const BAND_FILL: u32 = 0xF1F8E9;
pub const OVERVIEW_SHEET: &str = "Overview";

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStyle {
    Header,
    Plain,
    Banded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellAlign {
    General,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetPlan {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub widths: Vec<f64>,
}

impl SheetPlan {
    fn new(name: String, headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let widths = column_widths(&headers, &rows);
        Self {
            name,
            headers,
            rows,
            widths,
        }
    }

    /// Style of worksheet row `row` (0-based). Row 0 is always the header.
    pub fn row_style(&self, row: usize) -> RowStyle {
        match row {
            0 => RowStyle::Header,
            r if r % 2 == 0 => RowStyle::Banded,
            _ => RowStyle::Plain,
        }
    }
}

pub fn cell_align(cell: &CellValue) -> CellAlign {
    if cell.is_percent() {
        CellAlign::Center
    } else {
        CellAlign::General
    }
}

/// Longest stringified value per column plus padding, clamped to
/// `[MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH]`.
fn column_widths(headers: &[String], rows: &[Vec<CellValue>]) -> Vec<f64> {
    headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let longest = rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.to_string().chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0);
            (longest as f64 + 2.0).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Excel forbids `[]:*?/\` in sheet names and caps them at 31 characters.
pub fn sanitize_sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '-',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').trim();
    let truncated: String = cleaned.chars().take(MAX_SHEET_NAME).collect();
    let truncated = truncated.trim_end().to_string();
    if truncated.is_empty() {
        "Sheet".into()
    } else {
        truncated
    }
}

/// Sheet names are case-insensitive in Excel.
#[derive(Default)]
struct SheetNames {
    used: HashSet<String>,
}

impl SheetNames {
    fn claim(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_name(raw);
        let mut candidate = base.clone();
        let mut n = 2;
        while !self.used.insert(candidate.to_lowercase()) {
            let suffix = format!(" ({n})");
            let keep = MAX_SHEET_NAME - suffix.chars().count();
            let stem: String = base.chars().take(keep).collect();
            candidate = format!("{}{suffix}", stem.trim_end());
            n += 1;
        }
        candidate
    }
}

/// Work out every worksheet of the workbook for `doc`.
pub fn plan_workbook(doc: &ReportDocument) -> Vec<SheetPlan> {
    let mut names = SheetNames::default();
    let mut sheets = Vec::with_capacity(doc.sections.len() + 1);

    if doc.metadata.plan_count > 1 {
        let name = names.claim(OVERVIEW_SHEET);
        let headers = vec![
            "Section".to_string(),
            "Plan".to_string(),
            "Columns".to_string(),
            "Rows".to_string(),
        ];
        let rows = doc
            .sections
            .iter()
            .map(|s| {
                vec![
                    CellValue::from(s.title.as_str()),
                    CellValue::from(s.plan_id.as_deref().unwrap_or("All plans")),
                    CellValue::from(s.headers().join(", ")),
                    CellValue::Integer(s.rows.len() as i64),
                ]
            })
            .collect();
        sheets.push(SheetPlan::new(name, headers, rows));
    }

    for section in &doc.sections {
        let name = names.claim(&section.title);
        let headers = section.columns.iter().map(|c| c.header.clone()).collect();
        sheets.push(SheetPlan::new(name, headers, section.rows.clone()));
    }
    sheets
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

struct Formats {
    header: Format,
    plain: Format,
    plain_center: Format,
    banded: Format,
    banded_center: Format,
}

impl Formats {
    fn new() -> Self {
        let header = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(HEADER_FILL))
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center);
        let plain = Format::new();
        let banded = Format::new().set_background_color(Color::RGB(BAND_FILL));
        Self {
            header,
            plain_center: plain.clone().set_align(FormatAlign::Center),
            plain,
            banded_center: banded.clone().set_align(FormatAlign::Center),
            banded,
        }
    }

    fn for_cell(&self, style: RowStyle, align: CellAlign) -> &Format {
        match (style, align) {
            (RowStyle::Header, _) => &self.header,
            (RowStyle::Plain, CellAlign::General) => &self.plain,
            (RowStyle::Plain, CellAlign::Center) => &self.plain_center,
            (RowStyle::Banded, CellAlign::General) => &self.banded,
            (RowStyle::Banded, CellAlign::Center) => &self.banded_center,
        }
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    format: &Format,
) -> Result<()> {
    match cell {
        CellValue::Text(s) => worksheet.write_string_with_format(row, col, s, format),
        CellValue::Integer(i) => worksheet.write_number_with_format(row, col, *i as f64, format),
        CellValue::Number(n) => worksheet.write_number_with_format(row, col, *n, format),
        CellValue::Empty => worksheet.write_blank(row, col, format),
    }
    .with_context(|| format!("Failed to write cell at ({row}, {col})"))?;
    Ok(())
}

fn write_sheet(workbook: &mut Workbook, sheet: &SheetPlan, formats: &Formats) -> Result<()> {
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(&sheet.name)
        .with_context(|| format!("Failed to set sheet name: {}", sheet.name))?;

    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &formats.header)
            .with_context(|| format!("Failed to write header at column {col}"))?;
    }

    for (idx, row) in sheet.rows.iter().enumerate() {
        let excel_row = (idx + 1) as u32;
        let style = sheet.row_style(idx + 1);
        for (col, cell) in row.iter().enumerate() {
            let format = formats.for_cell(style, cell_align(cell));
            write_cell(worksheet, excel_row, col as u16, cell, format)?;
        }
    }

    for (col, width) in sheet.widths.iter().enumerate() {
        worksheet
            .set_column_width(col as u16, *width)
            .with_context(|| format!("Failed to size column {col}"))?;
    }
    worksheet
        .set_freeze_panes(1, 0)
        .context("Failed to freeze header row")?;
    Ok(())
}

fn write_workbook(sheets: &[SheetPlan]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let formats = Formats::new();
    for sheet in sheets {
        write_sheet(&mut workbook, sheet, &formats)?;
    }
    workbook
        .save_to_buffer()
        .context("Failed to save workbook to buffer")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SpreadsheetRenderer;

impl Renderer for SpreadsheetRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Spreadsheet
    }

    fn render(&self, doc: &ReportDocument) -> Result<BinaryArtifact, RenderError> {
        doc.validate()?;
        let sheets = plan_workbook(doc);
        let bytes = write_workbook(&sheets).map_err(RenderError::Spreadsheet)?;
        debug!(sheets = sheets.len(), size = bytes.len(), "Rendered workbook");
        Ok(BinaryArtifact {
            bytes,
            mime_type: ExportFormat::Spreadsheet.mime_type().to_string(),
            suggested_filename: suggested_filename(doc, ExportFormat::Spreadsheet),
        })
    }
}
