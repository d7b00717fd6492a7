use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::ai::{PropertyAnalysis, PropertyAnalyzer};
use crate::auth;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::models::{PropertySearch, PropertyWithDetails};
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub storage: Arc<dyn Storage>,
    pub analyzer: Arc<dyn PropertyAnalyzer>,
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/properties/search", post(search_property))
        .route("/api/properties", get(list_properties))
        .route("/api/properties/:id", get(get_property))
        .route("/api/properties/:id/export", get(export_property))
        .route("/api/properties/:id/analyze", post(analyze_property))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/", get(|| async { "PropAnalyzed API" }))
        .route("/login", get(login))
        .merge(protected)
        .with_state(state)
}

async fn authenticate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::Unauthorized("Missing Authorization header"))?;
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized("Invalid Authorization header format"))?;
    let user_id = auth::validate_token(token, &state.config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token"))?;
    log::info!("Authenticated user: {}", user_id);
    Ok(next.run(request).await)
}

async fn login(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let token =
        auth::create_token("user123", &state.config.jwt_secret).map_err(|_| ApiError::Internal)?;
    Ok(Json(json!({ "token": token })))
}

async fn search_property(
    State(state): State<AppState>,
    Json(payload): Json<PropertySearch>,
) -> Result<Json<PropertyWithDetails>, ApiError> {
    payload.validate().map_err(ApiError::Validation)?;
    let property = state.storage.search_property(&payload).await?;
    property.map(Json).ok_or(ApiError::NotFound)
}

async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PropertyWithDetails>, ApiError> {
    let id = parse_id(&id)?;
    let property = state.storage.get_property_by_id(id).await?;
    property.map(Json).ok_or(ApiError::NotFound)
}

async fn export_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let property = state
        .storage
        .get_property_by_id(id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut response = Json(property).into_response();
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        header::HeaderValue::from_static("attachment; filename=\"property-report.json\""),
    );
    Ok(response)
}

async fn analyze_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PropertyAnalysis>, ApiError> {
    let id = parse_id(&id)?;
    // 404 must win before the model is ever called.
    let property = state
        .storage
        .get_property_by_id(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let analysis = state.analyzer.analyze(&property).await?;
    Ok(Json(analysis))
}

async fn list_properties(
    State(state): State<AppState>,
) -> Result<Json<Vec<PropertyWithDetails>>, ApiError> {
    let properties = state.storage.get_all_properties().await?;
    Ok(Json(properties))
}

fn parse_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse::<i32>().map_err(|_| ApiError::InvalidId)
}
