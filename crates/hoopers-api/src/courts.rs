use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use hoopers_db::models::CourtRow;
use hoopers_db::pagination::clamp_limit;
use hoopers_types::api::{CourtRequest, CourtResponse, PageResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;

#[derive(Debug, Deserialize)]
pub struct CourtsQuery {
    pub city: Option<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

fn to_court(row: CourtRow) -> CourtResponse {
    CourtResponse {
        id: row.id,
        name: row.name,
        address: row.address,
        city: row.city,
        lat: row.lat,
        lng: row.lng,
        surface: row.surface,
        hoop_count: row.hoop_count,
        indoor: row.indoor,
        created_at: row.created_at,
    }
}

fn validate(req: &CourtRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() || req.address.trim().is_empty() || req.city.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name, address and city are required".into(),
        ));
    }
    if !(-90.0..=90.0).contains(&req.lat) || !(-180.0..=180.0).contains(&req.lng) {
        return Err(ApiError::BadRequest("coordinates out of range".into()));
    }
    if req.hoop_count < 1 {
        return Err(ApiError::BadRequest("hoop_count must be at least 1".into()));
    }
    Ok(())
}

/// Courts whose creator deleted their account keep a NULL creator and can
/// no longer be edited by anyone.
fn ensure_creator(row: &CourtRow, caller: Uuid) -> Result<(), ApiError> {
    match row.created_by {
        Some(owner) if owner == caller => Ok(()),
        _ => Err(ApiError::Forbidden),
    }
}

pub async fn create_court(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CourtRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req)?;

    let id = Uuid::new_v4();
    state.db.create_court(
        id,
        claims.sub,
        &req.name,
        &req.address,
        &req.city,
        req.lat,
        req.lng,
        req.surface.as_deref(),
        req.hoop_count,
        req.indoor,
    )?;

    let row = state.db.get_court(id)?.ok_or(ApiError::NotFound("court"))?;
    Ok((StatusCode::CREATED, Json(to_court(row))))
}

pub async fn get_court(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.db.get_court(id)?.ok_or(ApiError::NotFound("court"))?;
    Ok(Json(to_court(row)))
}

pub async fn list_courts(
    State(state): State<AppState>,
    Query(query): Query<CourtsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.db.list_courts(
        query.city.as_deref(),
        query.cursor.as_deref(),
        clamp_limit(query.limit),
    )?;
    Ok(Json(PageResponse {
        items: page.items.into_iter().map(to_court).collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

/// Full replace, not a patch: omitted optional fields clear.
pub async fn update_court(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CourtRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req)?;

    let existing = state.db.get_court(id)?.ok_or(ApiError::NotFound("court"))?;
    ensure_creator(&existing, claims.sub)?;

    state.db.update_court(
        id,
        &req.name,
        &req.address,
        &req.city,
        req.lat,
        req.lng,
        req.surface.as_deref(),
        req.hoop_count,
        req.indoor,
    )?;

    let row = state.db.get_court(id)?.ok_or(ApiError::NotFound("court"))?;
    Ok(Json(to_court(row)))
}

pub async fn delete_court(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = state.db.get_court(id)?.ok_or(ApiError::NotFound("court"))?;
    ensure_creator(&existing, claims.sub)?;

    // Conflicts when runs or games still point at the court.
    state.db.delete_court(id)?;
    Ok(StatusCode::NO_CONTENT)
}
