use std::time::Duration;

use anyhow::Context;

use crate::engine::nutrition::NutritionSettings;
use crate::engine::EngineSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSourceKind {
    /// Path to a JSON array of food records.
    File(String),
    Postgres,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub plan_store: PlanStoreKind,
    pub catalog_source: CatalogSourceKind,
    pub engine: EngineSettings,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let plan_store = match std::env::var("PLAN_STORE").ok().as_deref() {
            Some("postgres") => PlanStoreKind::Postgres,
            Some("memory") => PlanStoreKind::Memory,
            Some(other) => anyhow::bail!("unknown PLAN_STORE {other:?}"),
            None if database_url.is_some() => PlanStoreKind::Postgres,
            None => PlanStoreKind::Memory,
        };

        let catalog_source = match std::env::var("FOOD_CATALOG_SOURCE").ok().as_deref() {
            None | Some("file") => CatalogSourceKind::File(
                std::env::var("FOOD_CATALOG_PATH").unwrap_or_else(|_| "data/foods.json".into()),
            ),
            Some("postgres") => CatalogSourceKind::Postgres,
            Some(other) => anyhow::bail!("unknown FOOD_CATALOG_SOURCE {other:?}"),
        };

        let needs_db = plan_store == PlanStoreKind::Postgres
            || catalog_source == CatalogSourceKind::Postgres;
        if needs_db && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required for the postgres plan store or catalog");
        }

        let defaults = EngineSettings::default();
        let nutrition = NutritionSettings {
            deficit_kcal: env_parse("CALORIE_DEFICIT_KCAL", defaults.nutrition.deficit_kcal)?,
            surplus_kcal: env_parse("CALORIE_SURPLUS_KCAL", defaults.nutrition.surplus_kcal)?,
            min_daily_calories: env_parse(
                "MIN_DAILY_CALORIES",
                defaults.nutrition.min_daily_calories,
            )?,
        };
        let engine = EngineSettings {
            nutrition,
            max_options: env_parse("MEAL_PLAN_MAX_OPTIONS", defaults.max_options)?,
            timeout: Duration::from_millis(env_parse(
                "MEAL_PLAN_TIMEOUT_MS",
                defaults.timeout.as_millis() as u64,
            )?),
        };

        Ok(Self {
            database_url,
            plan_store,
            catalog_source,
            engine,
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("parse {key}={v:?}")),
        Err(_) => Ok(default),
    }
}
