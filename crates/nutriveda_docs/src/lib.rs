pub mod builder;
pub mod model;
pub mod pdf;
pub mod plan;
pub mod render;
pub mod samples;
pub mod xlsx;

pub use builder::{BuildContext, ClinicBranding, ExportOptions, build_document, try_build_single};
pub use model::{
    CellValue, ColumnSpec, DocumentError, DocumentKind, DocumentMetadata, ReportDocument, Section,
    SectionKind,
};
pub use pdf::PdfRenderer;
pub use plan::{BuildError, DietPlanLike, Dosha, FoodItem, ImpactDirection, Meal, validate_plan};
pub use render::{BinaryArtifact, ExportFormat, RenderError, Renderer, renderer_for};
pub use xlsx::SpreadsheetRenderer;
