//! Document model builder: diet plans + export options → [`ReportDocument`].
//!
//! Building is pure. Everything that is not plan data (timestamp, clinic
//! details) comes in through [`BuildContext`], so the same inputs always
//! produce the same document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::model::{
    CellValue, DocumentKind, DocumentMetadata, ReportDocument, Section, SectionKind,
};
use crate::plan::{BuildError, DietPlanLike, Dosha, Vipaka, Virya, validate_plan};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Which optional sections go into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    pub include_nutrition_facts: bool,
    pub include_ayurvedic_properties: bool,
    pub include_instructions: bool,
    pub clinic_branding: bool,
}

impl ExportOptions {
    pub const fn all() -> Self {
        Self {
            include_nutrition_facts: true,
            include_ayurvedic_properties: true,
            include_instructions: true,
            clinic_branding: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            include_nutrition_facts: false,
            include_ayurvedic_properties: false,
            include_instructions: false,
            clinic_branding: false,
        }
    }

    /// Whether the optional section `kind` is switched on. Mandatory
    /// sections always return `true`.
    pub fn includes(&self, kind: SectionKind) -> bool {
        match kind {
            SectionKind::NutritionFacts => self.include_nutrition_facts,
            SectionKind::AyurvedicProperties => self.include_ayurvedic_properties,
            SectionKind::Instructions => self.include_instructions,
            SectionKind::Branding => self.clinic_branding,
            SectionKind::Summary | SectionKind::Overview => true,
        }
    }

    /// Copy with one optional section switched on or off.
    pub fn with(mut self, kind: SectionKind, enabled: bool) -> Self {
        match kind {
            SectionKind::NutritionFacts => self.include_nutrition_facts = enabled,
            SectionKind::AyurvedicProperties => self.include_ayurvedic_properties = enabled,
            SectionKind::Instructions => self.include_instructions = enabled,
            SectionKind::Branding => self.clinic_branding = enabled,
            SectionKind::Summary | SectionKind::Overview => {}
        }
        self
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicBranding {
    pub clinic_name: String,
    pub practitioner: Option<String>,
    pub contact: Option<String>,
}

impl Default for ClinicBranding {
    fn default() -> Self {
        Self {
            clinic_name: "NutriVeda Clinic".into(),
            practitioner: None,
            contact: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub generated_at: DateTime<Utc>,
    pub branding: ClinicBranding,
}

impl BuildContext {
    pub fn new(generated_at: DateTime<Utc>, branding: ClinicBranding) -> Self {
        Self {
            generated_at,
            branding,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Build a document for one plan, failing if the plan is malformed.
pub fn try_build_single(
    plan: &DietPlanLike,
    options: &ExportOptions,
    ctx: &BuildContext,
) -> Result<ReportDocument, BuildError> {
    validate_plan(plan)?;
    Ok(build_document(std::slice::from_ref(plan), options, ctx))
}

/// Build a document for any number of plans. Never fails.
///
/// * one plan: its overview followed by the enabled optional sections;
/// * several plans: a cross-plan summary, then one section-set per plan;
/// * no plans: only an empty summary.
///
/// Malformed plans are left out and recorded in `warnings`.
pub fn build_document(
    plans: &[DietPlanLike],
    options: &ExportOptions,
    ctx: &BuildContext,
) -> ReportDocument {
    let mut warnings = Vec::new();
    let mut valid: Vec<&DietPlanLike> = Vec::with_capacity(plans.len());
    for plan in plans {
        match validate_plan(plan) {
            Ok(()) => valid.push(plan),
            Err(e) => {
                warn!(plan_id = %plan.id, "Omitting plan from document: {e}");
                warnings.push(format!("Skipped plan {}: {e}", plan.id));
            }
        }
    }

    let kind = if plans.len() == 1 {
        DocumentKind::Single
    } else {
        DocumentKind::Bulk
    };

    let mut sections = Vec::new();
    match (kind, valid.as_slice()) {
        (DocumentKind::Single, [plan]) => {
            plan_sections(plan, None, options, &mut sections);
        }
        _ => {
            sections.push(summary_section(&valid));
            let mut prefixes = PrefixAllocator::default();
            for plan in &valid {
                let prefix = prefixes.allocate(&plan.name);
                plan_sections(plan, Some(&prefix), options, &mut sections);
            }
        }
    }

    let has_content = !valid.is_empty();
    if options.clinic_branding && has_content {
        sections.push(branding_section(ctx));
    }

    let title = match (kind, valid.as_slice()) {
        (DocumentKind::Single, [plan]) => plan.name.clone(),
        _ if valid.is_empty() => "Diet Plan Export".to_string(),
        _ => format!("Diet Plan Export ({} plans)", valid.len()),
    };

    ReportDocument {
        metadata: DocumentMetadata {
            title,
            kind,
            generated_at: ctx.generated_at,
            branding: (options.clinic_branding && has_content)
                .then(|| ctx.branding.clinic_name.clone()),
            plan_count: valid.len(),
        },
        sections,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Section builders
// ---------------------------------------------------------------------------

/// Hands out unique per-plan title prefixes; repeated plan names get a
/// ` (n)` suffix, skipping any suffixed name another plan already holds.
#[derive(Default)]
struct PrefixAllocator {
    issued: HashSet<String>,
    next_suffix: HashMap<String, usize>,
}

impl PrefixAllocator {
    fn allocate(&mut self, name: &str) -> String {
        if self.issued.insert(name.to_string()) {
            return name.to_string();
        }
        let n = self.next_suffix.entry(name.to_string()).or_insert(2);
        loop {
            let candidate = format!("{name} ({n})");
            *n += 1;
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn section_title(kind: SectionKind, prefix: Option<&str>) -> String {
    match prefix {
        Some(p) => format!("{p}: {}", kind.default_title()),
        None => kind.default_title().to_string(),
    }
}

fn plan_sections(
    plan: &DietPlanLike,
    prefix: Option<&str>,
    options: &ExportOptions,
    out: &mut Vec<Section>,
) {
    out.push(overview_section(plan, prefix));
    if options.include_nutrition_facts {
        out.push(nutrition_section(plan, prefix));
    }
    if options.include_ayurvedic_properties {
        out.push(ayurvedic_section(plan, prefix));
    }
    if options.include_instructions {
        out.push(instructions_section(plan, prefix));
    }
}

fn duration_label(days: u32) -> String {
    if days == 1 {
        "1 day".into()
    } else {
        format!("{days} days")
    }
}

fn summary_section(plans: &[&DietPlanLike]) -> Section {
    let mut section = Section::new(
        SectionKind::Summary.default_title(),
        SectionKind::Summary,
        &[
            "Plan",
            "Patient",
            "Duration",
            "Daily Calories",
            "Average Compliance",
        ],
    );
    for plan in plans {
        section.push_row(vec![
            plan.name.as_str().into(),
            plan.patient_label().into(),
            duration_label(plan.duration_days).into(),
            CellValue::number_1dp(plan.total_calories),
            CellValue::percent_1dp(plan.average_compliance()),
        ]);
    }
    section
}

fn overview_section(plan: &DietPlanLike, prefix: Option<&str>) -> Section {
    let mut section = Section::new(
        section_title(SectionKind::Overview, prefix),
        SectionKind::Overview,
        &[
            "Plan",
            "Patient",
            "Duration",
            "Start Date",
            "End Date",
            "Daily Calories",
            "Ayurvedic Compliance",
            "Modern Nutrition Compliance",
            "Dosha Focus",
        ],
    )
    .for_plan(&plan.id);
    section.push_row(vec![
        plan.name.as_str().into(),
        plan.patient_label().into(),
        duration_label(plan.duration_days).into(),
        plan.start_date.to_string().into(),
        plan.end_date.to_string().into(),
        CellValue::number_1dp(plan.total_calories),
        CellValue::percent(plan.ayurvedic_compliance),
        CellValue::percent(plan.modern_nutrition_compliance),
        plan.dosha_focus.map_or("-", Dosha::label).into(),
    ]);
    section
}

fn nutrition_section(plan: &DietPlanLike, prefix: Option<&str>) -> Section {
    let mut section = Section::new(
        section_title(SectionKind::NutritionFacts, prefix),
        SectionKind::NutritionFacts,
        &[
            "Meal",
            "Time",
            "Food",
            "Quantity",
            "Calories",
            "Protein (g)",
            "Carbs (g)",
            "Fat (g)",
            "Fiber (g)",
        ],
    )
    .for_plan(&plan.id);

    let mut totals = [0.0_f64; 5];
    for (meal, food) in plan.foods() {
        let amounts = [
            food.calories,
            food.protein_g,
            food.carbs_g,
            food.fat_g,
            food.fiber_g,
        ];
        for (total, amount) in totals.iter_mut().zip(amounts) {
            *total += amount;
        }
        let mut row: Vec<CellValue> = vec![
            meal.name.as_str().into(),
            meal.time.as_str().into(),
            food.name.as_str().into(),
            food.quantity.as_str().into(),
        ];
        row.extend(amounts.into_iter().map(CellValue::number_1dp));
        section.push_row(row);
    }

    let mut total_row: Vec<CellValue> = vec![
        "Daily Total".into(),
        CellValue::Empty,
        CellValue::Empty,
        CellValue::Empty,
    ];
    total_row.extend(totals.into_iter().map(CellValue::number_1dp));
    section.push_row(total_row);

    let mut target_row: Vec<CellValue> = vec![
        "Calorie Target".into(),
        CellValue::Empty,
        CellValue::Empty,
        CellValue::Empty,
        CellValue::number_1dp(plan.total_calories),
    ];
    target_row.extend(std::iter::repeat_n(CellValue::Empty, 4));
    section.push_row(target_row);

    section
}

fn title_case_list(items: &[String]) -> String {
    if items.is_empty() {
        return "-".into();
    }
    items
        .iter()
        .map(|item| {
            let mut chars = item.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(", ")
}

fn virya_label(v: Virya) -> &'static str {
    match v {
        Virya::Heating => "Heating (Ushna)",
        Virya::Cooling => "Cooling (Sheeta)",
    }
}

fn vipaka_label(v: Vipaka) -> &'static str {
    match v {
        Vipaka::Sweet => "Sweet (Madhura)",
        Vipaka::Sour => "Sour (Amla)",
        Vipaka::Pungent => "Pungent (Katu)",
    }
}

fn ayurvedic_section(plan: &DietPlanLike, prefix: Option<&str>) -> Section {
    let mut section = Section::new(
        section_title(SectionKind::AyurvedicProperties, prefix),
        SectionKind::AyurvedicProperties,
        &[
            "Food",
            "Taste (Rasa)",
            "Quality (Guna)",
            "Energy (Virya)",
            "Post-Digestive (Vipaka)",
            "Vata",
            "Pitta",
            "Kapha",
        ],
    )
    .for_plan(&plan.id);

    let mut seen = HashSet::new();
    for (_, food) in plan.foods() {
        let Some(profile) = &food.ayurvedic else {
            continue;
        };
        if !seen.insert(food.name.as_str()) {
            continue;
        }
        let mut row: Vec<CellValue> = vec![
            food.name.as_str().into(),
            title_case_list(&profile.rasa).into(),
            title_case_list(&profile.guna).into(),
            virya_label(profile.virya).into(),
            vipaka_label(profile.vipaka).into(),
        ];
        row.extend(
            Dosha::ALL
                .iter()
                .map(|d| CellValue::from(profile.dosha_effect.direction(*d).label())),
        );
        section.push_row(row);
    }
    section
}

fn instructions_section(plan: &DietPlanLike, prefix: Option<&str>) -> Section {
    let mut section = Section::new(
        section_title(SectionKind::Instructions, prefix),
        SectionKind::Instructions,
        &["Meal", "Time", "Item", "Instructions"],
    )
    .for_plan(&plan.id);

    for meal in &plan.meals {
        if let Some(note) = &meal.instructions {
            section.push_row(vec![
                meal.name.as_str().into(),
                meal.time.as_str().into(),
                "Whole meal".into(),
                note.as_str().into(),
            ]);
        }
        for food in &meal.foods {
            if let Some(prep) = &food.preparation {
                section.push_row(vec![
                    meal.name.as_str().into(),
                    meal.time.as_str().into(),
                    food.name.as_str().into(),
                    prep.as_str().into(),
                ]);
            }
        }
    }
    section
}

fn branding_section(ctx: &BuildContext) -> Section {
    let mut section = Section::new(
        SectionKind::Branding.default_title(),
        SectionKind::Branding,
        &["Field", "Value"],
    );
    let branding = &ctx.branding;
    section.push_row(vec!["Clinic".into(), branding.clinic_name.as_str().into()]);
    if let Some(practitioner) = &branding.practitioner {
        section.push_row(vec!["Practitioner".into(), practitioner.as_str().into()]);
    }
    if let Some(contact) = &branding.contact {
        section.push_row(vec!["Contact".into(), contact.as_str().into()]);
    }
    section.push_row(vec![
        "Generated".into(),
        ctx.generated_at
            .format("%Y-%m-%d %H:%M UTC")
            .to_string()
            .into(),
    ]);
    section.push_row(vec!["Prepared with".into(), "NutriVeda".into()]);
    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{diabetes_plan, pitta_balance_plan, weight_loss_plan};

    fn ctx() -> BuildContext {
        BuildContext::new(
            DateTime::from_timestamp(1_710_000_000, 0).unwrap(),
            ClinicBranding {
                clinic_name: "Ayur Wellness".into(),
                practitioner: Some("Dr. Meera Iyer".into()),
                contact: None,
            },
        )
    }

    #[test]
    fn single_plan_with_everything() {
        let doc = build_document(&[diabetes_plan()], &ExportOptions::all(), &ctx());
        assert_eq!(doc.metadata.kind, DocumentKind::Single);
        assert_eq!(
            doc.section_titles(),
            vec![
                "Plan Overview",
                "Nutrition Facts",
                "Ayurvedic Properties",
                "Meal Instructions",
                "Clinic Branding",
            ]
        );
        assert_eq!(doc.metadata.branding.as_deref(), Some("Ayur Wellness"));
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn overview_carries_compliance_percentages() {
        let doc = build_document(&[diabetes_plan()], &ExportOptions::none(), &ctx());
        let summary = doc.summary().unwrap();
        assert_eq!(summary.kind, SectionKind::Overview);
        assert!(summary.contains_text("92%"));
        assert!(summary.contains_text("88%"));
        assert!(summary.contains_text("30 days"));
        assert!(summary.contains_text("1800"));
        assert_eq!(doc.sections.len(), 1);
    }

    #[test]
    fn empty_input_gives_empty_summary_only() {
        let doc = build_document(&[], &ExportOptions::all(), &ctx());
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].kind, SectionKind::Summary);
        assert!(doc.sections[0].rows.is_empty());
        assert_eq!(doc.metadata.plan_count, 0);
        assert!(doc.metadata.branding.is_none());
    }

    #[test]
    fn bulk_has_summary_then_section_sets() {
        let plans = vec![diabetes_plan(), weight_loss_plan()];
        let doc = build_document(&plans, &ExportOptions::none(), &ctx());
        assert_eq!(doc.metadata.kind, DocumentKind::Bulk);
        assert_eq!(
            doc.section_titles(),
            vec![
                "Summary",
                "Diabetes Management Plan: Plan Overview",
                "Weight Loss Plan: Plan Overview",
            ]
        );
        let summary = doc.summary().unwrap();
        assert_eq!(summary.rows.len(), 2);
        assert!(summary.contains_text("90.0%"));
        assert!(summary.contains_text("88.0%"));
        assert!(summary.contains_text("Rahul Verma"));
    }

    #[test]
    fn bulk_section_sets_follow_options() {
        let plans = vec![diabetes_plan(), weight_loss_plan(), pitta_balance_plan()];
        let doc = build_document(&plans, &ExportOptions::all(), &ctx());
        // summary + 3 * (overview, nutrition, ayurvedic, instructions) + branding
        assert_eq!(doc.sections.len(), 1 + 3 * 4 + 1);
        assert_eq!(doc.sections_of(SectionKind::Branding).count(), 1);
        assert_eq!(doc.sections.last().unwrap().kind, SectionKind::Branding);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn duplicate_plan_names_get_unique_titles() {
        let mut second = diabetes_plan();
        second.id = "plan-diabetes-002".into();
        let doc = build_document(
            &[diabetes_plan(), second],
            &ExportOptions::none(),
            &ctx(),
        );
        assert!(doc.validate().is_ok());
        assert!(
            doc.section("Diabetes Management Plan (2): Plan Overview")
                .is_some()
        );
    }

    #[test]
    fn suffixed_name_collisions_stay_unique() {
        let plans: Vec<DietPlanLike> = ["A", "A", "A (2)"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut plan = diabetes_plan();
                plan.id = format!("plan-{i}");
                plan.name = name.to_string();
                plan
            })
            .collect();
        let doc = build_document(&plans, &ExportOptions::all(), &ctx());

        assert!(doc.validate().is_ok());
        assert_eq!(doc.metadata.plan_count, 3);
        let overviews: Vec<&str> = doc
            .sections
            .iter()
            .filter(|s| s.kind == SectionKind::Overview)
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(
            overviews,
            vec![
                "A: Plan Overview",
                "A (2): Plan Overview",
                "A (2) (2): Plan Overview",
            ]
        );
    }

    #[test]
    fn invalid_plan_in_bulk_is_omitted_with_warning() {
        let mut broken = weight_loss_plan();
        broken.ayurvedic_compliance = -5.0;
        let doc = build_document(
            &[diabetes_plan(), broken],
            &ExportOptions::none(),
            &ctx(),
        );
        assert_eq!(doc.metadata.plan_count, 1);
        assert_eq!(doc.warnings.len(), 1);
        assert!(doc.warnings[0].contains("plan-weight-002"));
        assert_eq!(doc.summary().unwrap().rows.len(), 1);
    }

    #[test]
    fn try_build_single_surfaces_build_error() {
        let mut plan = diabetes_plan();
        plan.total_calories = f64::INFINITY;
        let err = try_build_single(&plan, &ExportOptions::all(), &ctx()).unwrap_err();
        assert!(matches!(err, BuildError::InvalidCalories { .. }));
    }

    #[test]
    fn nutrition_totals_add_up() {
        let doc = build_document(&[diabetes_plan()], &ExportOptions::all(), &ctx());
        let nutrition = doc.section("Nutrition Facts").unwrap();
        let total = nutrition
            .rows
            .iter()
            .find(|r| r[0] == CellValue::from("Daily Total"))
            .unwrap();
        // 12 + 220 + 340 + 90 + 60 + 200 + 80
        assert_eq!(total[4], CellValue::Number(1002.0));
    }

    #[test]
    fn ayurvedic_rows_use_strict_sign_and_dedupe() {
        let doc = build_document(&[weight_loss_plan()], &ExportOptions::all(), &ctx());
        let ayur = doc.section("Ayurvedic Properties").unwrap();
        let names: Vec<String> = ayur.rows.iter().map(|r| r[0].to_string()).collect();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(names.len(), unique.len());

        let buttermilk = ayur
            .rows
            .iter()
            .find(|r| r[0] == CellValue::from("Spiced Buttermilk"))
            .unwrap();
        assert_eq!(buttermilk[5], CellValue::from("Decrease"));
        assert_eq!(buttermilk[6], CellValue::from("Neutral"));
        assert_eq!(buttermilk[7], CellValue::from("Decrease"));
        assert_eq!(buttermilk[1], CellValue::from("Sour, Astringent"));
    }

    #[test]
    fn branding_lists_clinic_and_practitioner() {
        let doc = build_document(&[diabetes_plan()], &ExportOptions::all(), &ctx());
        let branding = doc.section("Clinic Branding").unwrap();
        assert!(branding.contains_text("Ayur Wellness"));
        assert!(branding.contains_text("Dr. Meera Iyer"));
        assert!(branding.contains_text("2024-03-09 16:00 UTC"));
    }

    #[test]
    fn options_with_toggles_single_flag() {
        let opts = ExportOptions::none().with(SectionKind::AyurvedicProperties, true);
        assert!(opts.include_ayurvedic_properties);
        assert!(!opts.include_nutrition_facts);
        assert!(opts.includes(SectionKind::Overview));
    }

    #[test]
    fn options_serialize_camel_case() {
        let json = serde_json::to_string(&ExportOptions::all()).unwrap();
        assert!(json.contains("includeNutritionFacts"));
        assert!(json.contains("clinicBranding"));
    }
}
