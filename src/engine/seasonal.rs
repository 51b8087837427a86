use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Month};

use super::errors::EngineError;
use super::filter::permits;
use super::profile::{DietType, MealSlot};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    #[serde(alias = "Spring")]
    Spring,
    #[serde(alias = "Summer")]
    Summer,
    #[serde(alias = "Fall", alias = "autumn", alias = "Autumn")]
    Fall,
    #[serde(alias = "Winter")]
    Winter,
}

impl Season {
    /// Northern-hemisphere meteorological seasons.
    pub fn from_date(date: Date) -> Self {
        match date.month() {
            Month::March | Month::April | Month::May => Season::Spring,
            Month::June | Month::July | Month::August => Season::Summer,
            Month::September | Month::October | Month::November => Season::Fall,
            Month::December | Month::January | Month::February => Season::Winter,
        }
    }
}

impl FromStr for Season {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "fall" | "autumn" => Ok(Season::Fall),
            "winter" => Ok(Season::Winter),
            other => Err(EngineError::invalid(format!("unrecognized season: {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonalSuggestion {
    pub food_name: String,
}

type Entry = (Season, MealSlot, &'static str, DietType, &'static [&'static str]);

static TABLE: &[Entry] = {
    use DietType::*;
    use MealSlot::*;
    use Season::*;
    &[
        (Spring, Breakfast, "Asparagus and Herb Omelette", Vegetarian, &["egg"]),
        (Spring, Breakfast, "Strawberry Overnight Oats", Vegan, &[]),
        (Spring, Lunch, "Pea and Mint Salad", Vegan, &[]),
        (Spring, Lunch, "Spring Vegetable Wrap", Vegan, &["gluten"]),
        (Spring, Dinner, "Lemon Herb Salmon with Asparagus", Regular, &["fish"]),
        (Spring, Dinner, "Spring Pea Risotto", Vegetarian, &["dairy"]),
        (Spring, Dinner, "Asparagus and Chickpea Stir-Fry", Vegan, &[]),
        (Spring, Snack, "Fresh Strawberries", Vegan, &[]),
        (Spring, Snack, "Radishes with Hummus", Vegan, &["sesame"]),
        (Summer, Breakfast, "Fresh Fruit Smoothie", Vegan, &[]),
        (Summer, Breakfast, "Peach Yogurt Bowl", Vegetarian, &["dairy"]),
        (Summer, Lunch, "Grilled Vegetable Wrap", Vegan, &["gluten"]),
        (Summer, Lunch, "Tomato and Cucumber Salad", Vegan, &[]),
        (Summer, Dinner, "Grilled Fish with Summer Vegetables", Regular, &["fish"]),
        (Summer, Dinner, "Zucchini Noodles with Pesto", Vegetarian, &["dairy", "nuts"]),
        (Summer, Dinner, "Grilled Corn and Black Bean Salad", Vegan, &[]),
        (Summer, Snack, "Fresh Berries", Vegan, &[]),
        (Summer, Snack, "Watermelon Slices", Vegan, &[]),
        (Fall, Breakfast, "Pumpkin Spice Oatmeal", Vegan, &[]),
        (Fall, Breakfast, "Apple Cinnamon Pancakes", Vegetarian, &["egg", "dairy", "gluten"]),
        (Fall, Lunch, "Butternut Squash Soup", Vegan, &[]),
        (Fall, Lunch, "Roasted Beet Salad", Vegetarian, &["dairy"]),
        (Fall, Dinner, "Roasted Root Vegetables with Chicken", Regular, &[]),
        (Fall, Dinner, "Mushroom Barley Stew", Vegan, &["gluten"]),
        (Fall, Dinner, "Squash and Lentil Tray Bake", Vegan, &[]),
        (Fall, Snack, "Sliced Apples with Nut Butter", Vegan, &["nuts"]),
        (Fall, Snack, "Roasted Pumpkin Seeds", Vegan, &[]),
        (Winter, Breakfast, "Warm Quinoa Porridge", Vegan, &[]),
        (Winter, Breakfast, "Citrus Fruit Salad", Vegan, &[]),
        (Winter, Lunch, "Lentil Soup", Vegan, &[]),
        (Winter, Lunch, "Kale and Citrus Salad", Vegan, &[]),
        (Winter, Dinner, "Beef and Root Vegetable Stew", Regular, &[]),
        (Winter, Dinner, "Baked Sweet Potato with Black Beans", Vegan, &[]),
        (Winter, Snack, "Clementines", Vegan, &[]),
        (Winter, Snack, "Roasted Chestnuts", Vegan, &["nuts"]),
    ]
};

/// In-season foods for one slot that fit the diet and avoid every allergen.
pub fn suggestions_for(
    season: Season,
    slot: MealSlot,
    diet_type: DietType,
    allergies: &BTreeSet<String>,
) -> Vec<SeasonalSuggestion> {
    TABLE
        .iter()
        .filter(|(s, sl, ..)| *s == season && *sl == slot)
        .filter(|(.., diet, allergens)| {
            permits(*diet, allergens.iter().copied(), diet_type, allergies)
        })
        .map(|(_, _, name, ..)| SeasonalSuggestion {
            food_name: (*name).to_string(),
        })
        .collect()
}

/// In-season suggestions for every slot. Presentational only; a slot whose
/// suggestions are all excluded gets an empty list.
pub fn seasonal_recommendations(
    season: Season,
    diet_type: DietType,
    allergies: &BTreeSet<String>,
) -> BTreeMap<MealSlot, Vec<SeasonalSuggestion>> {
    MealSlot::ALL
        .into_iter()
        .map(|slot| (slot, suggestions_for(season, slot, diet_type, allergies)))
        .collect()
}
