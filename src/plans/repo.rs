use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::engine::{MealPlan, Profile};

/// Persistence failures. Never converted into `EngineError`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("meal plan not found")]
    NotFound,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedMealPlan {
    pub id: Uuid,
    pub user_profile: Profile,
    pub meal_plan: MealPlan,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn save(&self, profile: Profile, plan: MealPlan) -> Result<SavedMealPlan, StoreError>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<SavedMealPlan>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

#[derive(Debug, FromRow)]
struct SavedPlanRow {
    id: Uuid,
    user_profile: Json<Profile>,
    meal_plan: Json<MealPlan>,
    created_at: OffsetDateTime,
}

impl From<SavedPlanRow> for SavedMealPlan {
    fn from(r: SavedPlanRow) -> Self {
        Self {
            id: r.id,
            user_profile: r.user_profile.0,
            meal_plan: r.meal_plan.0,
            created_at: r.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgPlanStore {
    db: PgPool,
}

impl PgPlanStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn save(&self, profile: Profile, plan: MealPlan) -> Result<SavedMealPlan, StoreError> {
        let row = sqlx::query_as::<_, SavedPlanRow>(
            r#"
            INSERT INTO meal_plans (id, user_profile, meal_plan)
            VALUES ($1, $2, $3)
            RETURNING id, user_profile, meal_plan, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(Json(&profile))
        .bind(Json(&plan))
        .fetch_one(&self.db)
        .await
        .map_err(|e| anyhow::Error::new(e).context("insert meal plan"))?;
        Ok(row.into())
    }

    async fn list(&self) -> Result<Vec<SavedMealPlan>, StoreError> {
        let rows = sqlx::query_as::<_, SavedPlanRow>(
            r#"
            SELECT id, user_profile, meal_plan, created_at
            FROM meal_plans
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(|e| anyhow::Error::new(e).context("list meal plans"))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(r#"DELETE FROM meal_plans WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| anyhow::Error::new(e).context("delete meal plan"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryPlanStore {
    plans: RwLock<Vec<SavedMealPlan>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn save(&self, profile: Profile, plan: MealPlan) -> Result<SavedMealPlan, StoreError> {
        let saved = SavedMealPlan {
            id: Uuid::new_v4(),
            user_profile: profile,
            meal_plan: plan,
            created_at: OffsetDateTime::now_utc(),
        };
        self.plans.write().await.push(saved.clone());
        Ok(saved)
    }

    async fn list(&self) -> Result<Vec<SavedMealPlan>, StoreError> {
        let mut plans = self.plans.read().await.clone();
        // insertion order breaks created_at ties
        plans.reverse();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plans)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut plans = self.plans.write().await;
        let before = plans.len();
        plans.retain(|p| p.id != id);
        if plans.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod repo_tests {
    use super::*;
    use crate::engine::catalog::CatalogSnapshot;
    use crate::engine::profile::{ActivityLevel, DietType, Goal, Sex};
    use crate::engine::PlanAssembler;
    use time::macros::date;

    fn profile() -> Profile {
        Profile {
            age: 25,
            sex: Sex::Female,
            weight_kg: 62.0,
            height_cm: 168.0,
            activity_level: ActivityLevel::Light,
            goal: Goal::Maintain,
            diet_type: DietType::Vegetarian,
            allergies: Default::default(),
            cuisines: Default::default(),
            season: None,
        }
    }

    fn plan() -> MealPlan {
        PlanAssembler::default()
            .assemble(&profile(), &CatalogSnapshot::new(Vec::new()), date!(2026 - 01 - 10))
            .expect("plan")
    }

    #[tokio::test]
    async fn memory_store_lists_newest_first_and_deletes() {
        let store = MemoryPlanStore::new();
        let first = store.save(profile(), plan()).await.unwrap();
        let second = store.save(profile(), plan()).await.unwrap();
        assert_ne!(first.id, second.id);

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);

        store.delete(first.id).await.unwrap();
        assert!(matches!(store.delete(first.id).await, Err(StoreError::NotFound)));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[test]
    fn saved_plan_serializes_with_camel_case_envelope() {
        let saved = SavedMealPlan {
            id: Uuid::new_v4(),
            user_profile: profile(),
            meal_plan: plan(),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_value(&saved).unwrap();
        assert!(json.get("userProfile").is_some());
        assert!(json.get("mealPlan").is_some());
        assert!(json["createdAt"].is_string());
        assert_eq!(json["userProfile"]["diet_type"], "vegetarian");

        let back: SavedMealPlan = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, saved.id);
    }
}
