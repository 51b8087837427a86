//! Turns a validated profile into a complete [`MealPlan`].
//!
//! Targets are computed first; the four slots are then filtered and ranked
//! as independent tasks against one catalog snapshot and joined before the
//! plan is built. A timeout discards the whole plan.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::Date;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use super::allocator::allocate;
use super::catalog::{CatalogSnapshot, CatalogStore, FoodItem};
use super::errors::EngineError;
use super::filter::filter_candidates;
use super::nutrition::{calculate_targets, DailyTargets, NutritionSettings};
use super::profile::{MealSlot, Profile};
use super::seasonal::{seasonal_recommendations, Season, SeasonalSuggestion};
use super::selector::rank_options;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub nutrition: NutritionSettings,
    /// Options kept per slot after ranking; `0` keeps all of them.
    pub max_options: usize,
    pub timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            nutrition: NutritionSettings::default(),
            max_options: 3,
            timeout: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealEntry {
    pub target_calories: u32,
    pub options: Vec<FoodItem>,
    /// Diet and allergen constraints left nothing for this slot.
    #[serde(default)]
    pub empty_options: bool,
    /// The slot's cuisine preference was dropped to find options.
    #[serde(default)]
    pub cuisine_relaxed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealPlan {
    pub daily_targets: DailyTargets,
    pub meals: BTreeMap<MealSlot, MealEntry>,
    pub current_season: Season,
    pub seasonal_recommendations: BTreeMap<MealSlot, Vec<SeasonalSuggestion>>,
}

pub fn plan_slot(
    snapshot: &CatalogSnapshot,
    profile: &Profile,
    slot: MealSlot,
    target_calories: u32,
    max_options: usize,
) -> MealEntry {
    let outcome = filter_candidates(
        snapshot.items_for_slot(slot),
        profile.diet_type,
        &profile.allergies,
        profile.cuisines_for(slot),
    );
    let empty_options = outcome.is_empty();
    let cuisine_relaxed = outcome.cuisine_relaxed;
    let mut ranked = rank_options(outcome.items, target_calories);
    if max_options > 0 {
        ranked.truncate(max_options);
    }

    if empty_options {
        warn!(%slot, diet = ?profile.diet_type, "no food satisfies diet and allergen constraints");
    } else {
        debug!(%slot, target_calories, options = ranked.len(), cuisine_relaxed, "slot planned");
    }

    MealEntry {
        target_calories,
        options: ranked.into_iter().cloned().collect(),
        empty_options,
        cuisine_relaxed,
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanAssembler {
    settings: EngineSettings,
}

impl PlanAssembler {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    fn targets(&self, profile: &Profile) -> Result<DailyTargets, EngineError> {
        calculate_targets(profile, &self.settings.nutrition)
            .map_err(|e| EngineError::IncompletePlan(e.to_string()))
    }

    fn season(profile: &Profile, today: Date) -> Season {
        profile.season.unwrap_or_else(|| Season::from_date(today))
    }

    /// Sequential assembly over an already acquired snapshot.
    pub fn assemble(
        &self,
        profile: &Profile,
        snapshot: &CatalogSnapshot,
        today: Date,
    ) -> Result<MealPlan, EngineError> {
        let daily_targets = self.targets(profile)?;
        let meals = allocate(&daily_targets)
            .into_iter()
            .map(|(slot, target)| {
                (
                    slot,
                    plan_slot(snapshot, profile, slot, target, self.settings.max_options),
                )
            })
            .collect();
        Ok(Self::finish(daily_targets, meals, profile, Self::season(profile, today)))
    }

    /// Generate a plan with the four slots computed concurrently.
    #[instrument(skip_all, fields(diet = ?profile.diet_type, goal = ?profile.goal))]
    pub async fn generate(
        &self,
        catalog: &CatalogStore,
        profile: Profile,
        today: Date,
    ) -> Result<MealPlan, EngineError> {
        let snapshot = catalog.snapshot().await?;
        let limit = self.settings.timeout;

        tokio::time::timeout(limit, self.fan_out(snapshot, Arc::new(profile), today))
            .await
            .map_err(|_| EngineError::Timeout(limit.as_millis() as u64))?
    }

    async fn fan_out(
        &self,
        snapshot: Arc<CatalogSnapshot>,
        profile: Arc<Profile>,
        today: Date,
    ) -> Result<MealPlan, EngineError> {
        let daily_targets = self.targets(&profile)?;
        let slot_targets = allocate(&daily_targets);
        let max_options = self.settings.max_options;

        // dropping the set aborts unfinished slot tasks
        let mut tasks = JoinSet::new();
        for (slot, target) in slot_targets {
            let snapshot = Arc::clone(&snapshot);
            let profile = Arc::clone(&profile);
            tasks.spawn(async move {
                (slot, plan_slot(&snapshot, &profile, slot, target, max_options))
            });
        }

        let mut meals = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (slot, entry) =
                joined.map_err(|e| EngineError::Internal(format!("slot task failed: {e}")))?;
            meals.insert(slot, entry);
        }
        if meals.len() != MealSlot::ALL.len() {
            return Err(EngineError::Internal(format!(
                "expected {} slots, planned {}",
                MealSlot::ALL.len(),
                meals.len()
            )));
        }

        Ok(Self::finish(daily_targets, meals, &profile, Self::season(&profile, today)))
    }

    fn finish(
        daily_targets: DailyTargets,
        meals: BTreeMap<MealSlot, MealEntry>,
        profile: &Profile,
        current_season: Season,
    ) -> MealPlan {
        MealPlan {
            daily_targets,
            meals,
            current_season,
            seasonal_recommendations: seasonal_recommendations(
                current_season,
                profile.diet_type,
                &profile.allergies,
            ),
        }
    }
}

#[cfg(test)]
mod assembler_tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::engine::catalog::catalog_tests::food;
    use crate::engine::profile::{ActivityLevel, DietType, Goal, Sex};
    use time::macros::date;

    fn profile() -> Profile {
        Profile {
            age: 30,
            sex: Sex::Male,
            weight_kg: 80.0,
            height_cm: 180.0,
            activity_level: ActivityLevel::Moderate,
            goal: Goal::Maintain,
            diet_type: DietType::Regular,
            allergies: BTreeSet::new(),
            cuisines: BTreeMap::new(),
            season: None,
        }
    }

    fn catalog() -> Vec<FoodItem> {
        use MealSlot::*;
        vec![
            food("Oatmeal with Berries", 350.0, 12.0, DietType::Vegan, "american", &[], &[Breakfast]),
            food("Veggie Omelette", 650.0, 30.0, DietType::Vegetarian, "french", &["egg"], &[Breakfast]),
            food("Greek Yogurt Bowl", 420.0, 25.0, DietType::Vegetarian, "greek", &["dairy"], &[Breakfast, Snack]),
            food("Chicken Salad", 700.0, 45.0, DietType::Regular, "american", &[], &[Lunch]),
            food("Falafel Wrap", 820.0, 20.0, DietType::Vegan, "lebanese", &["gluten"], &[Lunch, Dinner]),
            food("Salmon with Quinoa", 900.0, 50.0, DietType::Regular, "american", &["fish"], &[Dinner]),
            food("Lentil Curry", 950.0, 30.0, DietType::Vegan, "indian", &[], &[Dinner]),
            food("Trail Mix", 280.0, 8.0, DietType::Vegan, "american", &["nuts"], &[Snack]),
        ]
    }

    const TODAY: Date = date!(2026 - 10 - 18);

    #[test]
    fn assembles_all_slots_with_targets_summing_to_daily() {
        let snap = CatalogSnapshot::new(catalog());
        let plan = PlanAssembler::default().assemble(&profile(), &snap, TODAY).unwrap();

        assert_eq!(plan.daily_targets.daily_calories, 2759.0);
        assert_eq!(plan.meals.len(), 4);
        let total: u32 = plan.meals.values().map(|m| m.target_calories).sum();
        assert_eq!(f64::from(total), plan.daily_targets.daily_calories);

        // breakfast target 690: omelette (40 away) beats yogurt (270) and oatmeal (340)
        let breakfast = &plan.meals[&MealSlot::Breakfast];
        assert_eq!(breakfast.options[0].food_name, "Veggie Omelette");
        assert_eq!(breakfast.options.len(), 3);
        assert!(!breakfast.empty_options);

        assert_eq!(plan.current_season, Season::Fall);
        assert_eq!(plan.seasonal_recommendations.len(), 4);
    }

    #[test]
    fn empty_slot_is_flagged_not_fatal() {
        let mut p = profile();
        p.diet_type = DietType::Vegan;
        p.allergies = ["nuts".to_string(), "dairy".to_string()].into_iter().collect();
        let snap = CatalogSnapshot::new(catalog());
        let plan = PlanAssembler::default().assemble(&p, &snap, TODAY).unwrap();

        let snack = &plan.meals[&MealSlot::Snack];
        assert!(snack.options.is_empty());
        assert!(snack.empty_options);
        assert!(snack.target_calories > 0);
        assert_eq!(plan.meals[&MealSlot::Dinner].options.len(), 2);
    }

    #[test]
    fn missing_cuisine_relaxes_only_that_slot() {
        let mut p = profile();
        p.cuisines.insert(MealSlot::Lunch, ["korean".to_string()].into_iter().collect());
        p.cuisines.insert(MealSlot::Dinner, ["indian".to_string()].into_iter().collect());
        let snap = CatalogSnapshot::new(catalog());
        let plan = PlanAssembler::default().assemble(&p, &snap, TODAY).unwrap();

        let lunch = &plan.meals[&MealSlot::Lunch];
        assert!(lunch.cuisine_relaxed);
        assert!(!lunch.empty_options);
        assert_eq!(lunch.options.len(), 2);

        let dinner = &plan.meals[&MealSlot::Dinner];
        assert!(!dinner.cuisine_relaxed);
        assert_eq!(dinner.options.len(), 1);
        assert_eq!(dinner.options[0].food_name, "Lentil Curry");
    }

    #[test]
    fn max_options_zero_keeps_full_ranking() {
        let settings = EngineSettings {
            max_options: 0,
            ..EngineSettings::default()
        };
        let snap = CatalogSnapshot::new(catalog());
        let plan = PlanAssembler::new(settings).assemble(&profile(), &snap, TODAY).unwrap();
        assert_eq!(plan.meals[&MealSlot::Dinner].options.len(), 3);
    }

    #[test]
    fn season_override_wins_over_date() {
        let mut p = profile();
        p.season = Some(Season::Summer);
        let snap = CatalogSnapshot::new(catalog());
        let plan = PlanAssembler::default().assemble(&p, &snap, TODAY).unwrap();
        assert_eq!(plan.current_season, Season::Summer);
        assert_eq!(
            plan.seasonal_recommendations[&MealSlot::Breakfast][0].food_name,
            "Fresh Fruit Smoothie"
        );
    }

    #[test]
    fn failed_targets_mean_incomplete_plan() {
        let mut p = profile();
        p.weight_kg = -3.0;
        let snap = CatalogSnapshot::new(catalog());
        let err = PlanAssembler::default().assemble(&p, &snap, TODAY).unwrap_err();
        assert!(matches!(err, EngineError::IncompletePlan(_)));
    }

    #[tokio::test]
    async fn concurrent_generation_matches_sequential_and_is_repeatable() {
        let store = CatalogStore::with_items(catalog());
        let assembler = PlanAssembler::default();
        let first = assembler.generate(&store, profile(), TODAY).await.unwrap();
        let second = assembler.generate(&store, profile(), TODAY).await.unwrap();
        assert_eq!(first, second);

        let snap = store.snapshot().await.unwrap();
        let sequential = assembler.assemble(&profile(), &snap, TODAY).unwrap();
        assert_eq!(first, sequential);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn abandoned_generation_leaves_no_slot_tasks() {
        let store = CatalogStore::with_items(catalog());
        let assembler = PlanAssembler::default();
        let metrics = tokio::runtime::Handle::current().metrics();
        let before = metrics.num_alive_tasks();
        {
            let generation = assembler.generate(&store, profile(), TODAY);
            tokio::pin!(generation);
            // one poll spawns the slot tasks; none of them has run yet
            tokio::select! {
                biased;
                _ = &mut generation => panic!("slot tasks finished before the first yield"),
                _ = std::future::ready(()) => {}
            }
            assert_eq!(metrics.num_alive_tasks(), before + MealSlot::ALL.len());
        }
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert_eq!(metrics.num_alive_tasks(), before);
    }

    #[test]
    fn seasonal_suggestions_follow_the_profile() {
        let mut p = profile();
        p.diet_type = DietType::Vegan;
        p.allergies = ["nuts".to_string()].into_iter().collect();
        p.season = Some(Season::Fall);
        let snap = CatalogSnapshot::new(catalog());
        let plan = PlanAssembler::default().assemble(&p, &snap, TODAY).unwrap();

        let names: Vec<&str> = plan
            .seasonal_recommendations
            .values()
            .flatten()
            .map(|s| s.food_name.as_str())
            .collect();
        assert!(!names.contains(&"Roasted Root Vegetables with Chicken"));
        assert!(!names.contains(&"Sliced Apples with Nut Butter"));
        assert!(names.contains(&"Roasted Pumpkin Seeds"));
        // targets are untouched by the suggestion filter
        assert_eq!(plan.daily_targets.daily_calories, 2759.0);
    }

    #[tokio::test]
    async fn unloaded_catalog_fails_the_request() {
        let err = PlanAssembler::default()
            .generate(&CatalogStore::empty(), profile(), TODAY)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CatalogUnavailable(_)));
    }

    #[test]
    fn plan_json_shape() {
        let snap = CatalogSnapshot::new(catalog());
        let plan = PlanAssembler::default().assemble(&profile(), &snap, TODAY).unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert!(json["daily_targets"]["daily_calories"].is_number());
        for slot in ["breakfast", "lunch", "dinner", "snack"] {
            assert!(json["meals"][slot]["target_calories"].is_number());
            assert!(json["meals"][slot]["options"].is_array());
            assert!(json["seasonal_recommendations"][slot].is_array());
        }
        assert_eq!(json["current_season"], "fall");

        let back: MealPlan = serde_json::from_value(json).unwrap();
        assert_eq!(back.meals.len(), 4);
    }
}
