use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{DocumentError, ReportDocument};
use crate::pdf::PdfRenderer;
use crate::xlsx::SpreadsheetRenderer;

pub const PDF_MIME: &str = "application/pdf";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Document is malformed: {0}")]
    MalformedDocument(#[from] DocumentError),
    #[error("Spreadsheet generation failed: {0:#}")]
    Spreadsheet(anyhow::Error),
    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Spreadsheet,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Spreadsheet => "xlsx",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => PDF_MIME,
            Self::Spreadsheet => XLSX_MIME,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Spreadsheet => "spreadsheet",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "spreadsheet" | "xlsx" | "excel" => Ok(Self::Spreadsheet),
            other => Err(format!("Unknown export format: {other}")),
        }
    }
}

/// Rendered output of a document, ready to hand to a download sink.
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub suggested_filename: String,
}

impl BinaryArtifact {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for BinaryArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryArtifact")
            .field("size", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("suggested_filename", &self.suggested_filename)
            .finish()
    }
}

/// `<kind>-<epoch-millis>.<ext>`, timestamped from the document metadata.
pub fn suggested_filename(doc: &ReportDocument, format: ExportFormat) -> String {
    format!(
        "{}-{}.{}",
        doc.metadata.kind.file_stem(),
        doc.metadata.generated_at.timestamp_millis(),
        format.extension()
    )
}

pub trait Renderer: Send + Sync {
    fn format(&self) -> ExportFormat;

    /// Render `doc` into a single in-memory artifact. On error nothing is
    /// returned and nothing is left behind.
    fn render(&self, doc: &ReportDocument) -> Result<BinaryArtifact, RenderError>;
}

pub fn renderer_for(format: ExportFormat) -> Box<dyn Renderer> {
    match format {
        ExportFormat::Pdf => Box::new(PdfRenderer::default()),
        ExportFormat::Spreadsheet => Box::new(SpreadsheetRenderer::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_metadata() {
        assert_eq!(ExportFormat::Pdf.extension(), "pdf");
        assert_eq!(ExportFormat::Spreadsheet.extension(), "xlsx");
        assert_eq!(ExportFormat::Pdf.mime_type(), "application/pdf");
        assert!(ExportFormat::Spreadsheet.mime_type().contains("spreadsheetml"));
    }

    #[test]
    fn format_parses_aliases() {
        assert_eq!("PDF".parse::<ExportFormat>(), Ok(ExportFormat::Pdf));
        assert_eq!("excel".parse::<ExportFormat>(), Ok(ExportFormat::Spreadsheet));
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn format_serializes_lowercase() {
        let json = serde_json::to_string(&ExportFormat::Spreadsheet).unwrap();
        assert_eq!(json, "\"spreadsheet\"");
    }

    #[test]
    fn renderer_for_matches_format() {
        assert_eq!(renderer_for(ExportFormat::Pdf).format(), ExportFormat::Pdf);
        assert_eq!(
            renderer_for(ExportFormat::Spreadsheet).format(),
            ExportFormat::Spreadsheet
        );
    }
}
