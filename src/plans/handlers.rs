use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    engine::{
        nutrition::{recommend_goal, GoalRecommendation},
        similarity::similar_foods,
        EngineError, ProfileSubmission,
    },
    state::AppState,
};

use super::dto::{
    CatalogReloadResponse, GeneratedPlanResponse, SavePlanRequest, SimilarFoodsResponse,
    SimilarQuery,
};
use super::repo::{SavedMealPlan, StoreError};

// --- public routers ---

pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate_plan))
        .route("/recommend-goal", post(recommend_goal_for))
        .route("/foods/:food_name/similar", get(get_similar_foods))
        .route("/catalog/reload", post(reload_catalog))
}

pub fn saved_routes() -> Router<AppState> {
    Router::new()
        .route("/save", post(save_plan))
        .route("/saved", get(list_saved_plans))
        .route("/saved/:id", delete(delete_saved_plan))
}

// --- handlers ---

#[instrument(skip(state, payload))]
pub async fn generate_plan(
    State(state): State<AppState>,
    Json(payload): Json<ProfileSubmission>,
) -> Result<Json<GeneratedPlanResponse>, (StatusCode, String)> {
    let profile = payload.validate().map_err(|e| {
        warn!(error = %e, "rejected profile");
        engine_error(e)
    })?;

    let today = OffsetDateTime::now_utc().date();
    let meal_plan = state
        .assembler
        .generate(&state.catalog, profile.clone(), today)
        .await
        .map_err(|e| {
            error!(error = %e, "meal plan generation failed");
            engine_error(e)
        })?;

    let empty: Vec<_> = meal_plan
        .meals
        .iter()
        .filter(|(_, m)| m.empty_options)
        .map(|(slot, _)| slot.as_str())
        .collect();
    info!(
        daily_calories = meal_plan.daily_targets.daily_calories,
        season = ?meal_plan.current_season,
        empty_slots = ?empty,
        "meal plan generated"
    );

    Ok(Json(GeneratedPlanResponse {
        user_profile: profile,
        meal_plan,
    }))
}

#[instrument(skip(payload))]
pub async fn recommend_goal_for(
    Json(payload): Json<ProfileSubmission>,
) -> Result<Json<GoalRecommendation>, (StatusCode, String)> {
    let metrics = payload.metrics().map_err(engine_error)?;
    let rec = recommend_goal(&metrics).map_err(engine_error)?;
    Ok(Json(rec))
}

#[instrument(skip(state))]
pub async fn get_similar_foods(
    State(state): State<AppState>,
    Path(food_name): Path<String>,
    Query(q): Query<SimilarQuery>,
) -> Result<Json<SimilarFoodsResponse>, (StatusCode, String)> {
    let snapshot = state.catalog.snapshot().await.map_err(engine_error)?;
    match similar_foods(&snapshot, &food_name, q.limit) {
        Some(similar) => Ok(Json(SimilarFoodsResponse { food_name, similar })),
        None => Err((StatusCode::NOT_FOUND, "Food not found".into())),
    }
}

#[instrument(skip(state))]
pub async fn reload_catalog(
    State(state): State<AppState>,
) -> Result<Json<CatalogReloadResponse>, (StatusCode, String)> {
    let items = state
        .catalog
        .refresh(state.catalog_source.as_ref())
        .await
        .map_err(engine_error)?;
    let snapshot = state.catalog.snapshot().await.map_err(engine_error)?;
    Ok(Json(CatalogReloadResponse {
        source: state.catalog_source.describe(),
        items,
        loaded_at: snapshot.loaded_at(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn save_plan(
    State(state): State<AppState>,
    Json(payload): Json<SavePlanRequest>,
) -> Result<(StatusCode, Json<SavedMealPlan>), (StatusCode, String)> {
    let saved = state
        .plans
        .save(payload.user_profile, payload.meal_plan)
        .await
        .map_err(|e| {
            error!(error = %e, "save meal plan failed");
            store_error(e)
        })?;
    info!(id = %saved.id, "meal plan saved");
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip(state))]
pub async fn list_saved_plans(
    State(state): State<AppState>,
) -> Result<Json<Vec<SavedMealPlan>>, (StatusCode, String)> {
    let plans = state.plans.list().await.map_err(|e| {
        error!(error = %e, "list meal plans failed");
        store_error(e)
    })?;
    Ok(Json(plans))
}

#[instrument(skip(state))]
pub async fn delete_saved_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.plans.delete(id).await {
        Ok(()) => {
            info!(%id, "meal plan deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(StoreError::NotFound) => Err((StatusCode::NOT_FOUND, "Meal plan not found".into())),
        Err(e) => {
            error!(error = %e, %id, "delete meal plan failed");
            Err(store_error(e))
        }
    }
}

fn engine_error(e: EngineError) -> (StatusCode, String) {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, e.to_string())
}

fn store_error(e: StoreError) -> (StatusCode, String) {
    match e {
        StoreError::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
        StoreError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
