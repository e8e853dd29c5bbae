use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use hoopers_db::models::{ScoutingReportRow, ScoutingSummaryRow};
use hoopers_db::pagination::clamp_limit;
use hoopers_types::api::{
    PageResponse, ScoutingReportRequest, ScoutingReportResponse, ScoutingSummaryResponse,
};

use crate::PageQuery;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;

pub(crate) fn to_scouting_summary(row: ScoutingSummaryRow) -> ScoutingSummaryResponse {
    ScoutingSummaryResponse {
        shooting: row.shooting,
        passing: row.passing,
        defense: row.defense,
        athleticism: row.athleticism,
        report_count: row.report_count,
    }
}

fn to_report(row: ScoutingReportRow) -> ScoutingReportResponse {
    ScoutingReportResponse {
        id: row.id,
        subject_id: row.subject_id,
        scout_id: row.scout_id,
        scout_username: row.scout_username,
        shooting: row.shooting,
        passing: row.passing,
        defense: row.defense,
        athleticism: row.athleticism,
        summary: row.summary,
        created_at: row.created_at,
    }
}

/// File (or re-file) a scouting report on a player. Each skill grades 1-10.
pub async fn create_report(
    State(state): State<AppState>,
    Path(subject): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ScoutingReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if subject == claims.sub {
        return Err(ApiError::BadRequest("cannot scout yourself".into()));
    }
    for grade in [req.shooting, req.passing, req.defense, req.athleticism] {
        if !(1..=10).contains(&grade) {
            return Err(ApiError::BadRequest("skill grades run 1-10".into()));
        }
    }
    if req.summary.trim().is_empty() {
        return Err(ApiError::BadRequest("summary is required".into()));
    }

    let row = state.db.create_report(
        Uuid::new_v4(),
        subject,
        claims.sub,
        req.shooting,
        req.passing,
        req.defense,
        req.athleticism,
        &req.summary,
    )?;

    Ok((StatusCode::CREATED, Json(to_report(row))))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Path(subject): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .reports_on(subject, query.cursor.as_deref(), clamp_limit(query.limit))?;
    Ok(Json(PageResponse {
        items: page.items.into_iter().map(to_report).collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

pub async fn report_summary(
    State(state): State<AppState>,
    Path(subject): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.db.report_summary(subject)?;
    Ok(Json(to_scouting_summary(row)))
}

pub async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.report_scout(id)? != claims.sub {
        return Err(ApiError::Forbidden);
    }
    state.db.delete_report(id)?;
    Ok(StatusCode::NO_CONTENT)
}
