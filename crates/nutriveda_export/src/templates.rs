//! Named export presets.

use nutriveda_docs::{ExportOptions, SectionKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown export template: {0}")]
    Unknown(String),
    #[error("Template '{0}' is built in and cannot be changed")]
    BuiltIn(String),
    #[error("Template '{0}' already exists")]
    Duplicate(String),
    #[error("Template name must not be empty")]
    EmptyName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTemplate {
    pub name: String,
    pub description: String,
    pub options: ExportOptions,
    #[serde(default)]
    pub built_in: bool,
}

impl ExportTemplate {
    pub fn custom(
        name: impl Into<String>,
        description: impl Into<String>,
        options: ExportOptions,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options,
            built_in: false,
        }
    }

    fn built_in(name: &str, description: &str, options: ExportOptions) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options,
            built_in: true,
        }
    }
}

pub fn built_in_templates() -> Vec<ExportTemplate> {
    let none = ExportOptions::none();
    vec![
        ExportTemplate::built_in(
            "comprehensive",
            "Every section, for the practitioner's records",
            ExportOptions::all(),
        ),
        ExportTemplate::built_in(
            "minimal",
            "Nutrition facts only, for a quick patient handout",
            none.with(SectionKind::NutritionFacts, true)
                .with(SectionKind::Branding, true),
        ),
        ExportTemplate::built_in(
            "clinical",
            "Nutrition facts and meal instructions",
            none.with(SectionKind::NutritionFacts, true)
                .with(SectionKind::Instructions, true)
                .with(SectionKind::Branding, true),
        ),
        ExportTemplate::built_in(
            "ayurvedic",
            "Ayurvedic food properties and preparation",
            none.with(SectionKind::AyurvedicProperties, true)
                .with(SectionKind::Instructions, true)
                .with(SectionKind::Branding, true),
        ),
    ]
}

/// Built-in presets plus any custom ones added at runtime. Names are
/// matched case-insensitively.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<ExportTemplate>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self {
            templates: built_in_templates(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ExportTemplate> {
        let name = name.trim();
        self.templates
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// The options a template selects. Applying a template replaces the
    /// current options wholesale.
    pub fn options_for(&self, name: &str) -> Result<ExportOptions, TemplateError> {
        self.get(name)
            .map(|t| t.options)
            .ok_or_else(|| TemplateError::Unknown(name.to_string()))
    }

    pub fn add(&mut self, template: ExportTemplate) -> Result<(), TemplateError> {
        if template.name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if self.get(&template.name).is_some() {
            return Err(TemplateError::Duplicate(template.name));
        }
        self.templates.push(ExportTemplate {
            built_in: false,
            ..template
        });
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<ExportTemplate, TemplateError> {
        let index = self
            .templates
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| TemplateError::Unknown(name.to_string()))?;
        if self.templates[index].built_in {
            return Err(TemplateError::BuiltIn(self.templates[index].name.clone()));
        }
        Ok(self.templates.remove(index))
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn all(&self) -> &[ExportTemplate] {
        &self.templates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_ins_are_present() {
        let catalog = TemplateCatalog::new();
        assert_eq!(
            catalog.names(),
            vec!["comprehensive", "minimal", "clinical", "ayurvedic"]
        );
        assert_eq!(
            catalog.options_for("comprehensive").unwrap(),
            ExportOptions::all()
        );
    }

    #[test]
    fn minimal_keeps_only_nutrition_and_branding() {
        let opts = TemplateCatalog::new().options_for("Minimal").unwrap();
        assert!(opts.include_nutrition_facts);
        assert!(opts.clinic_branding);
        assert!(!opts.include_ayurvedic_properties);
        assert!(!opts.include_instructions);
    }

    #[test]
    fn unknown_template_is_an_error() {
        assert_eq!(
            TemplateCatalog::new().options_for("fancy"),
            Err(TemplateError::Unknown("fancy".into()))
        );
    }

    #[test]
    fn custom_templates_can_be_added_and_removed() {
        let mut catalog = TemplateCatalog::new();
        let custom = ExportTemplate::custom(
            "handout",
            "Patient handout",
            ExportOptions::none().with(SectionKind::Instructions, true),
        );
        catalog.add(custom.clone()).unwrap();
        assert_eq!(
            catalog.add(custom.clone()),
            Err(TemplateError::Duplicate("handout".into()))
        );
        assert!(catalog.options_for("HANDOUT").unwrap().include_instructions);

        let removed = catalog.remove("handout").unwrap();
        assert_eq!(removed.name, "handout");
        assert!(catalog.get("handout").is_none());
    }

    #[test]
    fn built_ins_cannot_be_removed_or_spoofed() {
        let mut catalog = TemplateCatalog::new();
        assert_eq!(
            catalog.remove("clinical"),
            Err(TemplateError::BuiltIn("clinical".into()))
        );
        let mut spoof = ExportTemplate::custom("x", "", ExportOptions::all());
        spoof.built_in = true;
        catalog.add(spoof).unwrap();
        assert!(catalog.remove("x").is_ok());
        assert_eq!(
            catalog.add(ExportTemplate::custom(" ", "", ExportOptions::all())),
            Err(TemplateError::EmptyName)
        );
    }
}
