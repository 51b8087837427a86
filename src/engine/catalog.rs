//! Read-only food catalog.
//!
//! Requests work against an immutable [`CatalogSnapshot`]. A refresh builds a
//! complete new snapshot and swaps the `Arc` in one step, so a request that
//! already holds a snapshot keeps seeing the old one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::errors::EngineError;
use super::profile::{DietType, MealSlot};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodItem {
    pub food_name: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    #[serde(default)]
    pub fiber_g: f64,
    pub diet_type: DietType,
    pub cuisine_type: String,
    #[serde(default)]
    pub allergens: BTreeSet<String>,
    /// Slots this food is suitable for. Index only, not part of plan output.
    #[serde(default, skip_serializing)]
    pub meal_slots: BTreeSet<MealSlot>,
}

impl FoodItem {
    /// Trim and lowercase tags; reject records that cannot be served.
    fn normalized(mut self) -> Result<Self, String> {
        self.food_name = self.food_name.trim().to_string();
        if self.food_name.is_empty() {
            return Err("empty food_name".into());
        }
        for (field, v) in [
            ("calories", self.calories),
            ("protein_g", self.protein_g),
            ("carbs_g", self.carbs_g),
            ("fat_g", self.fat_g),
            ("fiber_g", self.fiber_g),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("{field} must be a non-negative number"));
            }
        }
        self.cuisine_type = self.cuisine_type.trim().to_lowercase();
        self.allergens = self
            .allergens
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        Ok(self)
    }
}

/// Immutable, indexed view of the catalog at one point in time.
#[derive(Debug)]
pub struct CatalogSnapshot {
    items: Vec<FoodItem>,
    by_slot: BTreeMap<MealSlot, Vec<usize>>,
    by_name: HashMap<String, usize>,
    loaded_at: OffsetDateTime,
}

impl CatalogSnapshot {
    pub fn new(items: Vec<FoodItem>) -> Self {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            match item.normalized() {
                Ok(item) => kept.push(item),
                Err(reason) => warn!(%reason, "skipping catalog record"),
            }
        }

        let mut by_slot: BTreeMap<MealSlot, Vec<usize>> = BTreeMap::new();
        let mut by_name = HashMap::with_capacity(kept.len());
        for (idx, item) in kept.iter().enumerate() {
            if item.meal_slots.is_empty() {
                warn!(food = %item.food_name, "food has no meal slots; it will never be offered");
            }
            for slot in &item.meal_slots {
                by_slot.entry(*slot).or_default().push(idx);
            }
            by_name
                .entry(item.food_name.to_lowercase())
                .or_insert(idx);
        }

        Self {
            items: kept,
            by_slot,
            by_name,
            loaded_at: OffsetDateTime::now_utc(),
        }
    }

    /// Foods suitable for `slot`, in catalog order.
    pub fn items_for_slot(&self, slot: MealSlot) -> impl Iterator<Item = &FoodItem> + '_ {
        self.by_slot
            .get(&slot)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.items[idx])
    }

    pub fn find(&self, food_name: &str) -> Option<&FoodItem> {
        self.by_name
            .get(&food_name.trim().to_lowercase())
            .map(|&idx| &self.items[idx])
    }

    pub fn items(&self) -> &[FoodItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn loaded_at(&self) -> OffsetDateTime {
        self.loaded_at
    }
}

/// Where catalog records come from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load(&self) -> Result<Vec<FoodItem>, EngineError>;
    fn describe(&self) -> String;
}

/// Parse a JSON array of food records. Records that do not decode are
/// skipped with a warning; only a document that is not an array fails.
pub fn parse_catalog_json(raw: &str) -> Result<Vec<FoodItem>, EngineError> {
    let records: Vec<serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| EngineError::CatalogUnavailable(format!("malformed catalog json: {e}")))?;

    let mut items = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        let name = record
            .get("food_name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();
        match serde_json::from_value::<FoodItem>(record) {
            Ok(item) => items.push(item),
            Err(e) => warn!(record = idx, food = %name, error = %e, "skipping catalog record"),
        }
    }
    Ok(items)
}

/// JSON array of food records on disk.
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn load(&self) -> Result<Vec<FoodItem>, EngineError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            EngineError::CatalogUnavailable(format!("read {}: {e}", self.path.display()))
        })?;
        parse_catalog_json(&raw)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[derive(Debug, FromRow)]
struct FoodRow {
    food_name: String,
    calories: f64,
    protein_g: f64,
    carbs_g: f64,
    fat_g: f64,
    fiber_g: f64,
    diet_type: String,
    cuisine_type: String,
    allergens: Vec<String>,
    meal_slots: Vec<String>,
}

impl TryFrom<FoodRow> for FoodItem {
    type Error = EngineError;

    fn try_from(r: FoodRow) -> Result<Self, Self::Error> {
        let meal_slots = r
            .meal_slots
            .iter()
            .map(|s| s.parse::<MealSlot>())
            .collect::<Result<_, _>>()?;
        Ok(FoodItem {
            diet_type: r.diet_type.parse()?,
            food_name: r.food_name,
            calories: r.calories,
            protein_g: r.protein_g,
            carbs_g: r.carbs_g,
            fat_g: r.fat_g,
            fiber_g: r.fiber_g,
            cuisine_type: r.cuisine_type,
            allergens: r.allergens.into_iter().collect(),
            meal_slots,
        })
    }
}

/// `foods` table in Postgres.
pub struct PgCatalogSource {
    db: PgPool,
}

impl PgCatalogSource {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogSource for PgCatalogSource {
    async fn load(&self) -> Result<Vec<FoodItem>, EngineError> {
        let rows = sqlx::query_as::<_, FoodRow>(
            r#"
            SELECT food_name, calories, protein_g, carbs_g, fat_g, fiber_g,
                   diet_type, cuisine_type, allergens, meal_slots
            FROM foods
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(|e| EngineError::CatalogUnavailable(format!("query foods: {e}")))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.food_name.clone();
            match FoodItem::try_from(row) {
                Ok(item) => items.push(item),
                Err(e) => warn!(food = %name, error = %e, "skipping foods row"),
            }
        }
        Ok(items)
    }

    fn describe(&self) -> String {
        "postgres:foods".into()
    }
}

/// Holds the current snapshot. Readers clone the `Arc`; refresh replaces it.
#[derive(Default)]
pub struct CatalogStore {
    current: RwLock<Option<Arc<CatalogSnapshot>>>,
}

impl CatalogStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<FoodItem>) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(CatalogSnapshot::new(items)))),
        }
    }

    /// The snapshot a request should use for its whole lifetime.
    pub async fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, EngineError> {
        self.current.read().await.clone().ok_or_else(|| {
            EngineError::CatalogUnavailable("food catalog has not been loaded".into())
        })
    }

    pub async fn install(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().await = Some(snapshot.clone());
        snapshot
    }

    /// Load from `source` and swap in the result. On failure the previous
    /// snapshot, if any, stays installed.
    pub async fn refresh(&self, source: &dyn CatalogSource) -> Result<usize, EngineError> {
        debug!(source = %source.describe(), "loading food catalog");
        let items = match source.load().await {
            Ok(items) => items,
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "catalog refresh failed");
                return Err(e);
            }
        };
        let snapshot = self.install(CatalogSnapshot::new(items)).await;
        if snapshot.is_empty() {
            warn!(source = %source.describe(), "food catalog installed with no usable foods");
        } else {
            info!(source = %source.describe(), items = snapshot.len(), "food catalog installed");
        }
        Ok(snapshot.len())
    }
}

#[cfg(test)]
pub(crate) mod catalog_tests {
    use super::*;

    pub(crate) fn food(
        name: &str,
        calories: f64,
        protein_g: f64,
        diet_type: DietType,
        cuisine: &str,
        allergens: &[&str],
        slots: &[MealSlot],
    ) -> FoodItem {
        FoodItem {
            food_name: name.into(),
            calories,
            protein_g,
            carbs_g: 10.0,
            fat_g: 5.0,
            fiber_g: 2.0,
            diet_type,
            cuisine_type: cuisine.into(),
            allergens: allergens.iter().map(|a| a.to_string()).collect(),
            meal_slots: slots.iter().copied().collect(),
        }
    }

    struct FailingSource;

    #[async_trait]
    impl CatalogSource for FailingSource {
        async fn load(&self) -> Result<Vec<FoodItem>, EngineError> {
            Err(EngineError::CatalogUnavailable("boom".into()))
        }
        fn describe(&self) -> String {
            "failing".into()
        }
    }

    struct FixedSource(Vec<FoodItem>);

    #[async_trait]
    impl CatalogSource for FixedSource {
        async fn load(&self) -> Result<Vec<FoodItem>, EngineError> {
            Ok(self.0.clone())
        }
        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    #[test]
    fn indexes_foods_by_slot_in_catalog_order() {
        use MealSlot::*;
        let snap = CatalogSnapshot::new(vec![
            food("Oats", 300.0, 10.0, DietType::Vegan, "American", &[], &[Breakfast]),
            food("Wrap", 450.0, 20.0, DietType::Regular, "mexican", &[], &[Lunch, Dinner]),
            food("Yogurt", 150.0, 12.0, DietType::Vegetarian, "greek", &["Dairy "], &[Breakfast, Snack]),
        ]);
        let names = |slot| {
            snap.items_for_slot(slot)
                .map(|f| f.food_name.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(Breakfast), vec!["Oats", "Yogurt"]);
        assert_eq!(names(Lunch), vec!["Wrap"]);
        assert_eq!(names(Dinner), vec!["Wrap"]);
        assert_eq!(names(Snack), vec!["Yogurt"]);

        let yogurt = snap.find("  yogurt").expect("case-insensitive lookup");
        assert!(yogurt.allergens.contains("dairy"));
        assert_eq!(snap.find("oats").unwrap().cuisine_type, "american");
    }

    #[test]
    fn drops_records_with_negative_nutrition() {
        let mut bad = food("Bad", -5.0, 1.0, DietType::Vegan, "x", &[], &[MealSlot::Snack]);
        bad.fat_g = 1.0;
        let snap = CatalogSnapshot::new(vec![
            bad,
            food("Good", 100.0, 1.0, DietType::Vegan, "x", &[], &[MealSlot::Snack]),
        ]);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.items()[0].food_name, "Good");
    }

    #[test]
    fn parses_json_records_and_hides_slot_index_in_output() {
        let items = parse_catalog_json(
            r#"[{"food_name":"Toast","calories":200,"protein_g":6,"carbs_g":30,"fat_g":5,
                 "diet_type":"Vegan","cuisine_type":"french","allergens":["gluten"],
                 "meal_slots":["breakfast","snack"]}]"#,
        )
        .unwrap();
        assert_eq!(items[0].fiber_g, 0.0);
        assert_eq!(items[0].meal_slots.len(), 2);
        let out = serde_json::to_value(&items[0]).unwrap();
        assert!(out.get("meal_slots").is_none());
        assert_eq!(out["diet_type"], "vegan");

        assert!(matches!(
            parse_catalog_json("{not json"),
            Err(EngineError::CatalogUnavailable(_))
        ));
    }

    #[test]
    fn undecodable_records_are_skipped_not_fatal() {
        let items = parse_catalog_json(
            r#"[
                {"food_name":"Keto Bowl","calories":500,"protein_g":30,"carbs_g":5,"fat_g":40,
                 "diet_type":"keto","cuisine_type":"american","meal_slots":["lunch"]},
                {"food_name":"Rice","calories":"lots"},
                {"food_name":"Miso Soup","calories":80,"protein_g":6,"carbs_g":8,"fat_g":3,
                 "diet_type":"vegan","cuisine_type":"japanese","allergens":["soy"],
                 "meal_slots":["lunch","dinner"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].food_name, "Miso Soup");

        assert!(matches!(
            parse_catalog_json(r#"{"food_name":"not an array"}"#),
            Err(EngineError::CatalogUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn refresh_with_no_foods_installs_an_empty_snapshot() {
        let store = CatalogStore::empty();
        let n = store.refresh(&FixedSource(Vec::new())).await.unwrap();
        assert_eq!(n, 0);
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unloaded_store_is_unavailable() {
        let store = CatalogStore::empty();
        assert!(matches!(
            store.snapshot().await,
            Err(EngineError::CatalogUnavailable(_))
        ));
        assert!(store.refresh(&FailingSource).await.is_err());
        assert!(store.snapshot().await.is_err());
    }

    #[tokio::test]
    async fn refresh_swaps_snapshot_without_touching_held_ones() {
        let store = CatalogStore::with_items(vec![food(
            "Old", 100.0, 1.0, DietType::Vegan, "x", &[], &[MealSlot::Snack],
        )]);
        let held = store.snapshot().await.unwrap();

        let n = store
            .refresh(&FixedSource(vec![
                food("New A", 100.0, 1.0, DietType::Vegan, "x", &[], &[MealSlot::Snack]),
                food("New B", 100.0, 1.0, DietType::Vegan, "x", &[], &[MealSlot::Snack]),
            ]))
            .await
            .unwrap();
        assert_eq!(n, 2);

        assert_eq!(held.len(), 1);
        assert!(held.find("old").is_some());
        let fresh = store.snapshot().await.unwrap();
        assert_eq!(fresh.len(), 2);
        assert!(fresh.find("old").is_none());

        // a failed refresh keeps the current snapshot
        assert!(store.refresh(&FailingSource).await.is_err());
        assert_eq!(store.snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn file_source_reports_missing_file() {
        let source = FileCatalogSource::new("/definitely/not/here/foods.json");
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, EngineError::CatalogUnavailable(_)));
        assert!(source.describe().starts_with("file:"));
    }

    #[tokio::test]
    async fn file_source_loads_bundled_catalog() {
        let source = FileCatalogSource::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data/foods.json"));
        let items = source.load().await.unwrap();
        let snap = CatalogSnapshot::new(items);
        assert!(!snap.is_empty());
        for slot in MealSlot::ALL {
            assert!(snap.items_for_slot(slot).next().is_some(), "no foods for {slot}");
        }
    }
}
