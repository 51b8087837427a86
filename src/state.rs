use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::warn;

use crate::config::{AppConfig, CatalogSourceKind, PlanStoreKind};
use crate::engine::{CatalogSource, CatalogStore, FileCatalogSource, PgCatalogSource, PlanAssembler};
use crate::plans::repo::{MemoryPlanStore, PgPlanStore, PlanStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Option<PgPool>,
    pub config: Arc<AppConfig>,
    pub catalog: Arc<CatalogStore>,
    pub catalog_source: Arc<dyn CatalogSource>,
    pub plans: Arc<dyn PlanStore>,
    pub assembler: Arc<PlanAssembler>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = match &config.database_url {
            Some(url) => Some(
                PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?,
            ),
            None => None,
        };

        let plans: Arc<dyn PlanStore> = match (config.plan_store, &db) {
            (PlanStoreKind::Postgres, Some(pool)) => Arc::new(PgPlanStore::new(pool.clone())),
            (PlanStoreKind::Postgres, None) => anyhow::bail!("postgres plan store without a pool"),
            (PlanStoreKind::Memory, _) => Arc::new(MemoryPlanStore::new()),
        };

        let catalog_source: Arc<dyn CatalogSource> = match (&config.catalog_source, &db) {
            (CatalogSourceKind::File(path), _) => Arc::new(FileCatalogSource::new(path)),
            (CatalogSourceKind::Postgres, Some(pool)) => Arc::new(PgCatalogSource::new(pool.clone())),
            (CatalogSourceKind::Postgres, None) => {
                anyhow::bail!("postgres catalog source without a pool")
            }
        };

        Ok(Self {
            db,
            assembler: Arc::new(PlanAssembler::new(config.engine)),
            config,
            catalog: Arc::new(CatalogStore::empty()),
            catalog_source,
            plans,
        })
    }

    /// First catalog load. A failure is logged and the service starts anyway;
    /// plan requests report the catalog as unavailable until a reload succeeds.
    pub async fn load_catalog(&self) {
        if let Err(e) = self.catalog.refresh(self.catalog_source.as_ref()).await {
            warn!(error = %e, "starting without a food catalog");
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::engine::catalog::parse_catalog_json;

        let items = parse_catalog_json(include_str!("../data/foods.json"))
            .expect("bundled catalog parses");
        let config = Arc::new(AppConfig {
            database_url: None,
            plan_store: PlanStoreKind::Memory,
            catalog_source: CatalogSourceKind::File("data/foods.json".into()),
            engine: Default::default(),
        });
        Self {
            db: None,
            assembler: Arc::new(PlanAssembler::new(config.engine)),
            config,
            catalog: Arc::new(CatalogStore::with_items(items)),
            catalog_source: Arc::new(FileCatalogSource::new(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/data/foods.json"
            ))),
            plans: Arc::new(MemoryPlanStore::new()),
        }
    }
}
