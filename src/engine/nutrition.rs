//! Daily calorie and macronutrient targets.
//!
//! BMR uses the Mifflin-St Jeor equation:
//! `BMR = 10 * weight_kg + 6.25 * height_cm - 5 * age + s` where `s` is +5
//! for men, -161 for women and -78 (the midpoint) for `other`.
//! TDEE scales BMR by the activity multiplier, then the goal adds or removes a
//! fixed number of kcal.
//!
//! Macro split is a policy, not an optimisation: protein is fixed at 1.6 g/kg,
//! fat at 25% of calories, and carbohydrates take whatever energy is left.

use serde::{Deserialize, Serialize};

use super::errors::EngineError;
use super::profile::{ActivityLevel, BodyMetrics, Goal, Profile, Sex};

pub const KCAL_PER_G_PROTEIN: f64 = 4.0;
pub const KCAL_PER_G_CARBS: f64 = 4.0;
pub const KCAL_PER_G_FAT: f64 = 9.0;

const PROTEIN_G_PER_KG: f64 = 1.6;
const FAT_SHARE_OF_CALORIES: f64 = 0.25;

const MALE_CONSTANT: f64 = 5.0;
const FEMALE_CONSTANT: f64 = -161.0;

/// Goal adjustment knobs, loaded from config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NutritionSettings {
    pub deficit_kcal: f64,
    pub surplus_kcal: f64,
    pub min_daily_calories: f64,
}

impl Default for NutritionSettings {
    fn default() -> Self {
        Self {
            deficit_kcal: 500.0,
            surplus_kcal: 500.0,
            min_daily_calories: 1200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DailyTargets {
    pub bmr: f64,
    pub tdee: f64,
    pub daily_calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl DailyTargets {
    /// Energy implied by the macro grams (4/4/9 kcal per gram).
    pub fn macro_calories(&self) -> f64 {
        self.protein_g * KCAL_PER_G_PROTEIN
            + self.carbs_g * KCAL_PER_G_CARBS
            + self.fat_g * KCAL_PER_G_FAT
    }
}

impl ActivityLevel {
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }
}

pub fn basal_metabolic_rate(metrics: &BodyMetrics) -> Result<f64, EngineError> {
    metrics.check()?;

    let constant = match metrics.sex {
        Sex::Male => MALE_CONSTANT,
        Sex::Female => FEMALE_CONSTANT,
        Sex::Other => (MALE_CONSTANT + FEMALE_CONSTANT) / 2.0,
    };
    Ok(10.0 * metrics.weight_kg + 6.25 * metrics.height_cm - 5.0 * f64::from(metrics.age)
        + constant)
}

pub fn calculate_targets(
    profile: &Profile,
    settings: &NutritionSettings,
) -> Result<DailyTargets, EngineError> {
    let metrics = BodyMetrics {
        age: profile.age,
        sex: profile.sex,
        weight_kg: profile.weight_kg,
        height_cm: profile.height_cm,
    };
    let bmr = basal_metabolic_rate(&metrics)?;
    if bmr <= 0.0 {
        return Err(EngineError::invalid(format!(
            "body metrics give a non-positive basal metabolic rate ({bmr:.1} kcal)"
        )));
    }
    let tdee = bmr * profile.activity_level.multiplier();

    let adjusted = match profile.goal {
        Goal::Maintain => tdee,
        Goal::GainWeight => tdee + settings.surplus_kcal,
        // The floor never pushes intake above maintenance.
        Goal::LoseWeight => {
            (tdee - settings.deficit_kcal).max(settings.min_daily_calories.min(tdee))
        }
    };
    let daily_calories = adjusted.round();
    if daily_calories <= 0.0 {
        return Err(EngineError::invalid("body metrics give no positive calorie target"));
    }

    let fat_g = daily_calories * FAT_SHARE_OF_CALORIES / KCAL_PER_G_FAT;
    let protein_budget = daily_calories - fat_g * KCAL_PER_G_FAT;
    let protein_g = (PROTEIN_G_PER_KG * profile.weight_kg).min(protein_budget / KCAL_PER_G_PROTEIN);
    let carbs_g = ((daily_calories - protein_g * KCAL_PER_G_PROTEIN - fat_g * KCAL_PER_G_FAT)
        / KCAL_PER_G_CARBS)
        .max(0.0);

    Ok(DailyTargets {
        bmr: bmr.round(),
        tdee: tdee.round(),
        daily_calories,
        protein_g: round1(protein_g),
        carbs_g: round1(carbs_g),
        fat_g: round1(fat_g),
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalRecommendation {
    pub bmi: f64,
    pub category: BmiCategory,
    pub goal: Goal,
    pub rationale: String,
}

/// Suggest a goal from BMI bands (18.5 / 25 / 30).
pub fn recommend_goal(metrics: &BodyMetrics) -> Result<GoalRecommendation, EngineError> {
    metrics.check()?;

    let height_m = metrics.height_cm / 100.0;
    let bmi = metrics.weight_kg / (height_m * height_m);
    let (category, goal) = if bmi < 18.5 {
        (BmiCategory::Underweight, Goal::GainWeight)
    } else if bmi < 25.0 {
        (BmiCategory::Normal, Goal::Maintain)
    } else if bmi < 30.0 {
        (BmiCategory::Overweight, Goal::LoseWeight)
    } else {
        (BmiCategory::Obese, Goal::LoseWeight)
    };

    let bmi = round1(bmi);
    let rationale = match goal {
        Goal::GainWeight => format!(
            "BMI {bmi:.1} is underweight; a modest surplus helps reach a healthier weight."
        ),
        Goal::Maintain => format!(
            "BMI {bmi:.1} is in the healthy range; maintain weight and focus on food quality."
        ),
        Goal::LoseWeight => format!(
            "BMI {bmi:.1} is above the healthy range; a moderate deficit is recommended."
        ),
    };

    Ok(GoalRecommendation {
        bmi,
        category,
        goal,
        rationale,
    })
}
