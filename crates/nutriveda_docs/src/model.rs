//! Format-agnostic report document.
//!
//! A [`ReportDocument`] is an ordered list of tabular sections plus metadata.
//! Both renderers consume the same document, so anything that differs
//! between PDF and spreadsheet output belongs in the renderer, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Section '{section}' row {row} has {actual} cells, expected {expected}")]
    RowWidth {
        section: String,
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Section title '{0}' appears more than once")]
    DuplicateTitle(String),
    #[error("Section '{0}' has no columns")]
    NoColumns(String),
}

// ---------------------------------------------------------------------------
// Cells and columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Empty,
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Whole-number percentage, e.g. `92%`.
    pub fn percent(value: f64) -> Self {
        Self::Text(format!("{}%", value.round() as i64))
    }

    /// Percentage with one decimal, e.g. `90.5%`.
    pub fn percent_1dp(value: f64) -> Self {
        Self::Text(format!("{value:.1}%"))
    }

    /// Number rounded to one decimal place.
    pub fn number_1dp(value: f64) -> Self {
        Self::Number((value * 10.0).round() / 10.0)
    }

    pub fn is_percent(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim_end().ends_with('%'))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Number(_))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) if n.fract() == 0.0 => write!(f, "{n:.0}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Empty => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<u32> for CellValue {
    fn from(i: u32) -> Self {
        Self::Integer(i as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub header: String,
}

impl ColumnSpec {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    /// Cross-plan summary (bulk and empty documents).
    Summary,
    /// Per-plan overview; doubles as the summary of a single-plan document.
    Overview,
    NutritionFacts,
    AyurvedicProperties,
    Instructions,
    Branding,
}

impl SectionKind {
    pub fn default_title(self) -> &'static str {
        match self {
            Self::Summary => "Summary",
            Self::Overview => "Plan Overview",
            Self::NutritionFacts => "Nutrition Facts",
            Self::AyurvedicProperties => "Ayurvedic Properties",
            Self::Instructions => "Meal Instructions",
            Self::Branding => "Clinic Branding",
        }
    }

    /// Sections the user can switch on or off.
    pub fn is_optional(self) -> bool {
        !matches!(self, Self::Summary | Self::Overview)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub kind: SectionKind,
    /// Plan this section belongs to; `None` for document-wide sections.
    pub plan_id: Option<String>,
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Section {
    pub fn new(title: impl Into<String>, kind: SectionKind, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            kind,
            plan_id: None,
            columns: headers.iter().map(|h| ColumnSpec::new(*h)).collect(),
            rows: Vec::new(),
        }
    }

    pub fn for_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.header.as_str()).collect()
    }

    /// Every cell as display text, header row excluded.
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.rows
            .iter()
            .flatten()
            .any(|cell| cell.to_string() == needle)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Single,
    Bulk,
}

impl DocumentKind {
    /// Filename stem used for artifacts.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Single => "diet-plan",
            Self::Bulk => "diet-plans-bulk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub kind: DocumentKind,
    pub generated_at: DateTime<Utc>,
    /// Clinic name printed under the title when branding is on.
    pub branding: Option<String>,
    pub plan_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub metadata: DocumentMetadata,
    pub sections: Vec<Section>,
    /// Plans that were left out and why.
    pub warnings: Vec<String>,
}

impl ReportDocument {
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    pub fn sections_of(&self, kind: SectionKind) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(move |s| s.kind == kind)
    }

    pub fn has_section(&self, kind: SectionKind) -> bool {
        self.sections.iter().any(|s| s.kind == kind)
    }

    /// The section a reader sees first: the cross-plan summary, or the
    /// overview of a single plan.
    pub fn summary(&self) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| matches!(s.kind, SectionKind::Summary | SectionKind::Overview))
    }

    pub fn section_titles(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.title.as_str()).collect()
    }

    /// Check the structural invariants renderers rely on.
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut seen = HashSet::new();
        for section in &self.sections {
            if !seen.insert(section.title.as_str()) {
                return Err(DocumentError::DuplicateTitle(section.title.clone()));
            }
            if section.columns.is_empty() {
                return Err(DocumentError::NoColumns(section.title.clone()));
            }
            let expected = section.columns.len();
            for (row, cells) in section.rows.iter().enumerate() {
                if cells.len() != expected {
                    return Err(DocumentError::RowWidth {
                        section: section.title.clone(),
                        row,
                        expected,
                        actual: cells.len(),
                    });
                }
            }
        }
        Ok(())
    }
}
