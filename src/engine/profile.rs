use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::EngineError;
use super::nutrition::basal_metabolic_rate;
use super::seasonal::Season;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[serde(alias = "Male")]
    Male,
    #[serde(alias = "Female")]
    Female,
    #[serde(alias = "Other")]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    LoseWeight,
    Maintain,
    GainWeight,
}

/// Diet tag carried by both profiles and foods.
///
/// Declaration order is strictness order: a food satisfies a request when its
/// tag is at least as strict as the requested one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DietType {
    #[serde(alias = "Regular")]
    Regular,
    #[serde(alias = "Vegetarian")]
    Vegetarian,
    #[serde(alias = "Vegan")]
    Vegan,
}

impl DietType {
    /// Whether a food tagged `self` may be served to someone eating `requested`.
    ///
    /// | food \ request | regular | vegetarian | vegan |
    /// |---|---|---|---|
    /// | regular        | yes     | no         | no    |
    /// | vegetarian     | yes     | yes        | no    |
    /// | vegan          | yes     | yes        | yes   |
    pub fn satisfies(self, requested: DietType) -> bool {
        self >= requested
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Breakfast,
        MealSlot::Lunch,
        MealSlot::Dinner,
        MealSlot::Snack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
            MealSlot::Snack => "snack",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! parse_lowercase {
    ($ty:ty, $what:literal, { $($name:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(EngineError::invalid(format!("unrecognized {}: {:?}", $what, other))),
                }
            }
        }
    };
}

parse_lowercase!(Sex, "sex", {
    "male" => Sex::Male,
    "female" => Sex::Female,
    "other" => Sex::Other,
});

parse_lowercase!(ActivityLevel, "activity level", {
    "sedentary" => ActivityLevel::Sedentary,
    "light" => ActivityLevel::Light,
    "moderate" => ActivityLevel::Moderate,
    "active" => ActivityLevel::Active,
    "very_active" => ActivityLevel::VeryActive,
});

parse_lowercase!(Goal, "goal", {
    "lose_weight" => Goal::LoseWeight,
    "maintain" => Goal::Maintain,
    "gain_weight" => Goal::GainWeight,
});

parse_lowercase!(DietType, "diet type", {
    "regular" => DietType::Regular,
    "vegetarian" => DietType::Vegetarian,
    "vegan" => DietType::Vegan,
});

parse_lowercase!(MealSlot, "meal slot", {
    "breakfast" => MealSlot::Breakfast,
    "lunch" => MealSlot::Lunch,
    "dinner" => MealSlot::Dinner,
    "snack" => MealSlot::Snack,
});

/// Validated user profile. Built once per request from a [`ProfileSubmission`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub age: u32,
    pub sex: Sex,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
    pub diet_type: DietType,
    #[serde(default)]
    pub allergies: BTreeSet<String>,
    #[serde(default)]
    pub cuisines: BTreeMap<MealSlot, BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<Season>,
}

impl Profile {
    /// Cuisine preferences for one slot; empty means unconstrained.
    pub fn cuisines_for(&self, slot: MealSlot) -> Option<&BTreeSet<String>> {
        self.cuisines.get(&slot).filter(|set| !set.is_empty())
    }
}

/// A number as posted by the browser form: either a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FormNumber {
    Number(f64),
    Text(String),
}

impl FormNumber {
    fn value(&self, field: &str) -> Result<f64, EngineError> {
        let v = match self {
            FormNumber::Number(n) => *n,
            FormNumber::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| EngineError::invalid(format!("{field} must be a number")))?,
        };
        if !v.is_finite() {
            return Err(EngineError::invalid(format!("{field} must be finite")));
        }
        Ok(v)
    }
}

/// Allergies as posted: a comma separated string or an already split list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AllergyInput {
    List(Vec<String>),
    Text(String),
}

impl Default for AllergyInput {
    fn default() -> Self {
        AllergyInput::List(Vec::new())
    }
}

impl AllergyInput {
    pub fn normalized(&self) -> BTreeSet<String> {
        let raw: Vec<&str> = match self {
            AllergyInput::List(items) => items.iter().map(String::as_str).collect(),
            AllergyInput::Text(s) => s.split(',').collect(),
        };
        raw.into_iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

/// Raw profile form body. Every field is optional here so that a missing or
/// malformed value becomes `InvalidProfile` instead of a JSON rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileSubmission {
    pub age: Option<FormNumber>,
    pub sex: Option<String>,
    pub weight_kg: Option<FormNumber>,
    pub height_cm: Option<FormNumber>,
    pub activity_level: Option<String>,
    pub goal: Option<String>,
    pub diet_type: Option<String>,
    #[serde(default)]
    pub allergies: AllergyInput,
    #[serde(default)]
    pub cuisines: BTreeMap<String, Vec<String>>,
    pub season: Option<String>,
}

pub const MAX_AGE: u32 = 120;
pub const MAX_WEIGHT_KG: f64 = 500.0;
pub const MAX_HEIGHT_CM: f64 = 300.0;

/// Body metrics shared by the profile and the goal recommendation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyMetrics {
    pub age: u32,
    pub sex: Sex,
    pub weight_kg: f64,
    pub height_cm: f64,
}

impl BodyMetrics {
    /// Plausibility bounds. Anything outside them is rejected before any
    /// energy computation runs.
    pub fn check(&self) -> Result<(), EngineError> {
        if !(1..=MAX_AGE).contains(&self.age) {
            return Err(EngineError::invalid(format!(
                "age must be between 1 and {MAX_AGE}"
            )));
        }
        if !(self.weight_kg.is_finite() && self.weight_kg > 0.0 && self.weight_kg <= MAX_WEIGHT_KG)
        {
            return Err(EngineError::invalid(format!(
                "weight_kg must be above 0 and at most {MAX_WEIGHT_KG}"
            )));
        }
        if !(self.height_cm.is_finite() && self.height_cm > 0.0 && self.height_cm <= MAX_HEIGHT_CM)
        {
            return Err(EngineError::invalid(format!(
                "height_cm must be above 0 and at most {MAX_HEIGHT_CM}"
            )));
        }
        Ok(())
    }
}

impl ProfileSubmission {
    pub fn metrics(&self) -> Result<BodyMetrics, EngineError> {
        let age = required(&self.age, "age")?.value("age")?;
        if age <= 0.0 || age.fract() != 0.0 || age > f64::from(MAX_AGE) {
            return Err(EngineError::invalid(format!(
                "age must be a whole number between 1 and {MAX_AGE}"
            )));
        }
        let weight_kg = required(&self.weight_kg, "weight_kg")?.value("weight_kg")?;
        let height_cm = required(&self.height_cm, "height_cm")?.value("height_cm")?;
        let sex = required(&self.sex, "sex")?.parse::<Sex>()?;

        let metrics = BodyMetrics {
            age: age as u32,
            sex,
            weight_kg,
            height_cm,
        };
        metrics.check()?;
        Ok(metrics)
    }

    pub fn validate(&self) -> Result<Profile, EngineError> {
        let metrics = self.metrics()?;
        // in-range metrics can still combine into a non-positive BMR
        if basal_metabolic_rate(&metrics)? <= 0.0 {
            return Err(EngineError::invalid(
                "age, weight_kg and height_cm do not describe a plausible body",
            ));
        }
        let activity_level = required(&self.activity_level, "activity_level")?.parse()?;
        let goal = required(&self.goal, "goal")?.parse()?;
        let diet_type = match self.diet_type.as_deref() {
            Some(s) if !s.trim().is_empty() => s.parse()?,
            _ => DietType::Regular,
        };

        let mut cuisines = BTreeMap::new();
        for (slot, names) in &self.cuisines {
            let slot: MealSlot = slot.parse()?;
            let set: BTreeSet<String> = names
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect();
            cuisines.insert(slot, set);
        }

        let season = match self.season.as_deref() {
            Some(s) if !s.trim().is_empty() => Some(s.parse()?),
            _ => None,
        };

        Ok(Profile {
            age: metrics.age,
            sex: metrics.sex,
            weight_kg: metrics.weight_kg,
            height_cm: metrics.height_cm,
            activity_level,
            goal,
            diet_type,
            allergies: self.allergies.normalized(),
            cuisines,
            season,
        })
    }
}

fn required<'a, T>(value: &'a Option<T>, field: &str) -> Result<&'a T, EngineError> {
    value
        .as_ref()
        .ok_or_else(|| EngineError::invalid(format!("{field} is required")))
}
