//! Diet plan records as supplied by the plan generator and patient screens.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("Plan {plan_id} has no name")]
    MissingName { plan_id: String },
    #[error("Plan {plan_id} has an invalid calorie target: {value}")]
    InvalidCalories { plan_id: String, value: f64 },
    #[error("Plan {plan_id} has {field} compliance {value} outside 0-100")]
    ComplianceOutOfRange {
        plan_id: String,
        field: &'static str,
        value: f64,
    },
    #[error("Plan {plan_id} ends ({end}) before it starts ({start})")]
    EndBeforeStart {
        plan_id: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("Food '{food}' in plan {plan_id} has a negative or non-finite nutrient value")]
    InvalidNutrient { plan_id: String, food: String },
    #[error("No diet plan found with id {0}")]
    UnknownPlan(String),
}

// ---------------------------------------------------------------------------
// Ayurvedic classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dosha {
    Vata,
    Pitta,
    Kapha,
}

impl Dosha {
    pub const ALL: [Dosha; 3] = [Dosha::Vata, Dosha::Pitta, Dosha::Kapha];

    pub fn label(self) -> &'static str {
        match self {
            Self::Vata => "Vata",
            Self::Pitta => "Pitta",
            Self::Kapha => "Kapha",
        }
    }
}

/// Virya: the heating or cooling potency of a food.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Virya {
    Heating,
    Cooling,
}

/// Vipaka: the post-digestive taste.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vipaka {
    Sweet,
    Sour,
    Pungent,
}

/// Direction a food pushes a dosha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactDirection {
    Decrease,
    Neutral,
    Increase,
}

impl ImpactDirection {
    /// Strict sign: negative decreases, positive increases, zero (and NaN)
    /// is neutral.
    pub fn from_value(value: f64) -> Self {
        if value < 0.0 {
            Self::Decrease
        } else if value > 0.0 {
            Self::Increase
        } else {
            Self::Neutral
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Decrease => "Decrease",
            Self::Neutral => "Neutral",
            Self::Increase => "Increase",
        }
    }
}

/// Signed impact of a food on each dosha.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DoshaEffect {
    pub vata: f64,
    pub pitta: f64,
    pub kapha: f64,
}

impl DoshaEffect {
    pub fn value(&self, dosha: Dosha) -> f64 {
        match dosha {
            Dosha::Vata => self.vata,
            Dosha::Pitta => self.pitta,
            Dosha::Kapha => self.kapha,
        }
    }

    pub fn direction(&self, dosha: Dosha) -> ImpactDirection {
        ImpactDirection::from_value(self.value(dosha))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AyurvedicProfile {
    /// Tastes, e.g. "sweet", "bitter".
    pub rasa: Vec<String>,
    /// Qualities, e.g. "light", "oily".
    pub guna: Vec<String>,
    pub virya: Virya,
    pub vipaka: Vipaka,
    pub dosha_effect: DoshaEffect,
}

// ---------------------------------------------------------------------------
// Plan records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItem {
    pub name: String,
    pub quantity: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    #[serde(default)]
    pub fiber_g: f64,
    #[serde(default)]
    pub preparation: Option<String>,
    #[serde(default)]
    pub ayurvedic: Option<AyurvedicProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    /// "Breakfast", "Mid-morning", ...
    pub name: String,
    /// Display time, e.g. "08:00".
    pub time: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub foods: Vec<FoodItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietPlanLike {
    pub id: String,
    pub patient_id: String,
    #[serde(default)]
    pub patient_name: Option<String>,
    pub name: String,
    pub duration_days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_calories: f64,
    pub ayurvedic_compliance: f64,
    pub modern_nutrition_compliance: f64,
    #[serde(default)]
    pub dosha_focus: Option<Dosha>,
    #[serde(default)]
    pub meals: Vec<Meal>,
}

impl DietPlanLike {
    /// Patient display name, falling back to the patient id.
    pub fn patient_label(&self) -> &str {
        self.patient_name.as_deref().unwrap_or(&self.patient_id)
    }

    /// Mean of the two compliance scores.
    pub fn average_compliance(&self) -> f64 {
        (self.ayurvedic_compliance + self.modern_nutrition_compliance) / 2.0
    }

    pub fn foods(&self) -> impl Iterator<Item = (&Meal, &FoodItem)> {
        self.meals
            .iter()
            .flat_map(|meal| meal.foods.iter().map(move |food| (meal, food)))
    }
}

fn valid_amount(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Reject plans the document builder cannot represent faithfully.
pub fn validate_plan(plan: &DietPlanLike) -> Result<(), BuildError> {
    if plan.name.trim().is_empty() {
        return Err(BuildError::MissingName {
            plan_id: plan.id.clone(),
        });
    }
    if !valid_amount(plan.total_calories) {
        return Err(BuildError::InvalidCalories {
            plan_id: plan.id.clone(),
            value: plan.total_calories,
        });
    }
    for (field, value) in [
        ("ayurvedic", plan.ayurvedic_compliance),
        ("modern nutrition", plan.modern_nutrition_compliance),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(BuildError::ComplianceOutOfRange {
                plan_id: plan.id.clone(),
                field,
                value,
            });
        }
    }
    if plan.end_date < plan.start_date {
        return Err(BuildError::EndBeforeStart {
            plan_id: plan.id.clone(),
            start: plan.start_date,
            end: plan.end_date,
        });
    }
    for (_, food) in plan.foods() {
        let amounts = [
            food.calories,
            food.protein_g,
            food.carbs_g,
            food.fat_g,
            food.fiber_g,
        ];
        if !amounts.iter().all(|v| valid_amount(*v)) {
            return Err(BuildError::InvalidNutrient {
                plan_id: plan.id.clone(),
                food: food.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::diabetes_plan;

    #[test]
    fn impact_direction_uses_strict_sign() {
        assert_eq!(ImpactDirection::from_value(-0.01), ImpactDirection::Decrease);
        assert_eq!(ImpactDirection::from_value(0.0), ImpactDirection::Neutral);
        assert_eq!(ImpactDirection::from_value(-0.0), ImpactDirection::Neutral);
        assert_eq!(ImpactDirection::from_value(0.2), ImpactDirection::Increase);
        assert_eq!(ImpactDirection::from_value(f64::NAN), ImpactDirection::Neutral);
    }

    #[test]
    fn sample_plan_is_valid() {
        assert!(validate_plan(&diabetes_plan()).is_ok());
    }

    #[test]
    fn average_compliance_is_mean() {
        let plan = diabetes_plan();
        assert_eq!(plan.average_compliance(), 90.0);
    }

    #[test]
    fn rejects_blank_name() {
        let mut plan = diabetes_plan();
        plan.name = "   ".into();
        assert!(matches!(
            validate_plan(&plan),
            Err(BuildError::MissingName { .. })
        ));
    }

    #[test]
    fn rejects_compliance_out_of_range() {
        let mut plan = diabetes_plan();
        plan.modern_nutrition_compliance = 120.0;
        let err = validate_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("modern nutrition"));
    }

    #[test]
    fn rejects_reversed_dates() {
        let mut plan = diabetes_plan();
        std::mem::swap(&mut plan.start_date, &mut plan.end_date);
        assert!(matches!(
            validate_plan(&plan),
            Err(BuildError::EndBeforeStart { .. })
        ));
    }

    #[test]
    fn rejects_nan_nutrients() {
        let mut plan = diabetes_plan();
        plan.meals[0].foods[0].protein_g = f64::NAN;
        assert!(matches!(
            validate_plan(&plan),
            Err(BuildError::InvalidNutrient { .. })
        ));
    }

    #[test]
    fn deserializes_camel_case_records() {
        let json = r#"{
            "id": "p1",
            "patientId": "pt-7",
            "name": "Weight Loss Plan",
            "durationDays": 30,
            "startDate": "2024-01-01",
            "endDate": "2024-01-31",
            "totalCalories": 1600,
            "ayurvedicCompliance": 85,
            "modernNutritionCompliance": 90,
            "doshaFocus": "kapha"
        }"#;
        let plan: DietPlanLike = serde_json::from_str(json).unwrap();
        assert_eq!(plan.dosha_focus, Some(Dosha::Kapha));
        assert!(plan.meals.is_empty());
        assert_eq!(plan.patient_label(), "pt-7");
    }
}
