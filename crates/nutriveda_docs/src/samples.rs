//! Mock plans mirroring what the dashboard's plan generator produces.
//! Used by the demo host and tests.

use chrono::NaiveDate;

use crate::plan::{
    AyurvedicProfile, DietPlanLike, Dosha, DoshaEffect, FoodItem, Meal, Vipaka, Virya,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn profile(
    rasa: &[&str],
    guna: &[&str],
    virya: Virya,
    vipaka: Vipaka,
    (vata, pitta, kapha): (f64, f64, f64),
) -> Option<AyurvedicProfile> {
    Some(AyurvedicProfile {
        rasa: rasa.iter().map(|s| s.to_string()).collect(),
        guna: guna.iter().map(|s| s.to_string()).collect(),
        virya,
        vipaka,
        dosha_effect: DoshaEffect { vata, pitta, kapha },
    })
}

#[allow(clippy::too_many_arguments)]
fn food(
    name: &str,
    quantity: &str,
    calories: f64,
    protein_g: f64,
    carbs_g: f64,
    fat_g: f64,
    fiber_g: f64,
    preparation: Option<&str>,
    ayurvedic: Option<AyurvedicProfile>,
) -> FoodItem {
    FoodItem {
        name: name.into(),
        quantity: quantity.into(),
        calories,
        protein_g,
        carbs_g,
        fat_g,
        fiber_g,
        preparation: preparation.map(String::from),
        ayurvedic,
    }
}

fn moong_dal_chilla() -> FoodItem {
    food(
        "Moong Dal Chilla",
        "2 pieces",
        220.0,
        14.0,
        28.0,
        5.0,
        6.0,
        Some("Soak moong dal overnight, grind with ginger and cook on a lightly oiled tawa"),
        profile(
            &["sweet", "astringent"],
            &["light", "dry"],
            Virya::Cooling,
            Vipaka::Sweet,
            (0.1, -0.4, -0.3),
        ),
    )
}

fn methi_water() -> FoodItem {
    food(
        "Methi Water",
        "1 glass",
        12.0,
        0.8,
        2.0,
        0.2,
        1.0,
        Some("Soak one teaspoon of fenugreek seeds overnight and drink on waking"),
        profile(
            &["bitter"],
            &["light", "oily"],
            Virya::Heating,
            Vipaka::Pungent,
            (-0.3, 0.2, -0.5),
        ),
    )
}

fn brown_rice_khichdi() -> FoodItem {
    food(
        "Brown Rice Khichdi",
        "1 bowl",
        340.0,
        12.0,
        58.0,
        6.0,
        7.0,
        Some("Pressure cook brown rice with split moong, turmeric and cumin"),
        profile(
            &["sweet"],
            &["light", "soft"],
            Virya::Cooling,
            Vipaka::Sweet,
            (-0.4, -0.3, 0.0),
        ),
    )
}

fn bitter_gourd_sabzi() -> FoodItem {
    food(
        "Bitter Gourd Sabzi",
        "1 cup",
        90.0,
        3.0,
        10.0,
        4.5,
        4.0,
        Some("Saute with mustard seeds and a pinch of turmeric, no sugar"),
        profile(
            &["bitter"],
            &["light", "dry"],
            Virya::Cooling,
            Vipaka::Pungent,
            (0.3, -0.5, -0.4),
        ),
    )
}

fn buttermilk() -> FoodItem {
    food(
        "Spiced Buttermilk",
        "1 glass",
        60.0,
        3.5,
        5.0,
        2.0,
        0.0,
        Some("Whisk curd with water, roasted cumin and rock salt"),
        profile(
            &["sour", "astringent"],
            &["light"],
            Virya::Heating,
            Vipaka::Sweet,
            (-0.3, 0.0, -0.2),
        ),
    )
}

fn ragi_roti() -> FoodItem {
    food(
        "Ragi Roti",
        "2 pieces",
        200.0,
        5.0,
        40.0,
        2.0,
        6.5,
        None,
        profile(
            &["sweet", "astringent"],
            &["heavy", "dry"],
            Virya::Cooling,
            Vipaka::Sweet,
            (0.2, -0.3, 0.0),
        ),
    )
}

fn lauki_soup() -> FoodItem {
    food(
        "Lauki Soup",
        "1 bowl",
        80.0,
        2.0,
        12.0,
        2.0,
        3.0,
        Some("Simmer bottle gourd with ginger and black pepper, blend lightly"),
        profile(
            &["sweet"],
            &["light", "cold"],
            Virya::Cooling,
            Vipaka::Sweet,
            (0.0, -0.4, -0.1),
        ),
    )
}

/// "Diabetes Management Plan": the canonical sample (92% / 88% compliance).
pub fn diabetes_plan() -> DietPlanLike {
    DietPlanLike {
        id: "plan-diabetes-001".into(),
        patient_id: "pt-1001".into(),
        patient_name: Some("Priya Sharma".into()),
        name: "Diabetes Management Plan".into(),
        duration_days: 30,
        start_date: date(2024, 3, 1),
        end_date: date(2024, 3, 30),
        total_calories: 1800.0,
        ayurvedic_compliance: 92.0,
        modern_nutrition_compliance: 88.0,
        dosha_focus: Some(Dosha::Kapha),
        meals: vec![
            Meal {
                name: "Early Morning".into(),
                time: "06:30".into(),
                instructions: Some("Take on an empty stomach".into()),
                foods: vec![methi_water()],
            },
            Meal {
                name: "Breakfast".into(),
                time: "08:00".into(),
                instructions: None,
                foods: vec![moong_dal_chilla()],
            },
            Meal {
                name: "Lunch".into(),
                time: "13:00".into(),
                instructions: Some("Eat slowly; lunch is the largest meal of the day".into()),
                foods: vec![brown_rice_khichdi(), bitter_gourd_sabzi(), buttermilk()],
            },
            Meal {
                name: "Dinner".into(),
                time: "19:30".into(),
                instructions: Some("Finish at least two hours before sleep".into()),
                foods: vec![ragi_roti(), lauki_soup()],
            },
        ],
    }
}

pub fn weight_loss_plan() -> DietPlanLike {
    DietPlanLike {
        id: "plan-weight-002".into(),
        patient_id: "pt-1002".into(),
        patient_name: Some("Rahul Verma".into()),
        name: "Weight Loss Plan".into(),
        duration_days: 60,
        start_date: date(2024, 2, 15),
        end_date: date(2024, 4, 14),
        total_calories: 1500.0,
        ayurvedic_compliance: 85.0,
        modern_nutrition_compliance: 91.0,
        dosha_focus: Some(Dosha::Kapha),
        meals: vec![
            Meal {
                name: "Breakfast".into(),
                time: "07:30".into(),
                instructions: None,
                foods: vec![methi_water(), moong_dal_chilla()],
            },
            Meal {
                name: "Lunch".into(),
                time: "12:30".into(),
                instructions: Some("Half plate vegetables".into()),
                foods: vec![bitter_gourd_sabzi(), ragi_roti(), buttermilk()],
            },
            Meal {
                name: "Dinner".into(),
                time: "19:00".into(),
                instructions: None,
                foods: vec![lauki_soup()],
            },
        ],
    }
}

pub fn pitta_balance_plan() -> DietPlanLike {
    DietPlanLike {
        id: "plan-pitta-003".into(),
        patient_id: "pt-1003".into(),
        patient_name: Some("Anita Desai".into()),
        name: "Pitta Balancing Plan".into(),
        duration_days: 21,
        start_date: date(2024, 5, 1),
        end_date: date(2024, 5, 21),
        total_calories: 2000.0,
        ayurvedic_compliance: 95.0,
        modern_nutrition_compliance: 82.0,
        dosha_focus: Some(Dosha::Pitta),
        meals: vec![
            Meal {
                name: "Lunch".into(),
                time: "12:30".into(),
                instructions: Some("Avoid chillies and fermented foods".into()),
                foods: vec![brown_rice_khichdi(), lauki_soup()],
            },
            Meal {
                name: "Dinner".into(),
                time: "19:00".into(),
                instructions: None,
                foods: vec![ragi_roti()],
            },
        ],
    }
}

/// All sample plans in dashboard order.
pub fn sample_plans() -> Vec<DietPlanLike> {
    vec![diabetes_plan(), weight_loss_plan(), pitta_balance_plan()]
}
