use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::engine::similarity::SimilarFood;
use crate::engine::{MealPlan, Profile};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPlanResponse {
    pub user_profile: Profile,
    pub meal_plan: MealPlan,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePlanRequest {
    pub user_profile: Profile,
    pub meal_plan: MealPlan,
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    #[serde(default = "default_similar_limit")]
    pub limit: usize,
}

fn default_similar_limit() -> usize {
    5
}

#[derive(Debug, Serialize)]
pub struct SimilarFoodsResponse {
    pub food_name: String,
    pub similar: Vec<SimilarFood>,
}

#[derive(Debug, Serialize)]
pub struct CatalogReloadResponse {
    pub source: String,
    pub items: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub loaded_at: OffsetDateTime,
}
