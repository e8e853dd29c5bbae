use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use hoopers_db::models::{RunInviteRow, RunRow};
use hoopers_db::pagination::clamp_limit;
use hoopers_types::api::{
    CreateRunRequest, InviteRequest, PageResponse, RsvpRequest, RunDetailResponse,
    RunInviteResponse, RunResponse, UpdateRunRequest,
};
use hoopers_types::models::{InviteStatus, RunSort, RunStatus};

use crate::PageQuery;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::profiles::to_summary;

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub sort: Option<RunSort>,
    pub status: Option<RunStatus>,
    pub court_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

fn to_run(row: RunRow) -> RunResponse {
    RunResponse {
        id: row.id,
        host_id: row.host_id,
        host_username: row.host_username,
        court_id: row.court_id,
        court_name: row.court_name,
        title: row.title,
        scheduled_at: row.scheduled_at,
        status: row.status,
        max_players: row.max_players,
        accepted_count: row.accepted_count,
        created_at: row.created_at,
    }
}

fn to_invite(base: &str, row: RunInviteRow) -> RunInviteResponse {
    RunInviteResponse {
        profile: to_summary(base, row.profile),
        status: row.status,
        responded_at: row.responded_at,
    }
}

pub async fn create_run(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".into()));
    }
    if req.max_players < 2 {
        return Err(ApiError::BadRequest(
            "a run needs room for at least 2 players".into(),
        ));
    }

    let id = Uuid::new_v4();
    state.db.create_run(
        id,
        claims.sub,
        req.court_id,
        &req.title,
        req.scheduled_at,
        req.max_players,
    )?;

    let detail = run_detail(&state, id)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

fn run_detail(state: &AppState, id: Uuid) -> Result<RunDetailResponse, ApiError> {
    let run = state.db.get_run(id)?.ok_or(ApiError::NotFound("run"))?;
    let roster = state
        .db
        .run_roster(id)?
        .into_iter()
        .map(|r| to_invite(&state.media_base_url, r))
        .collect();
    Ok(RunDetailResponse {
        run: to_run(run),
        roster,
    })
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(run_detail(&state, id)?))
}

pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = query.sort.unwrap_or(RunSort::ScheduledAt);
    let page = state.db.list_runs(
        sort,
        query.status,
        query.court_id,
        query.cursor.as_deref(),
        clamp_limit(query.limit),
    )?;
    Ok(Json(PageResponse {
        items: page.items.into_iter().map(to_run).collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

/// Host-only patch. A status change must follow the run lifecycle:
/// scheduled -> active -> completed, with cancellation open until the end.
pub async fn update_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (host, current) = state.db.run_host_and_status(id)?;
    if host != claims.sub {
        return Err(ApiError::Forbidden);
    }
    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(ApiError::BadRequest("title is required".into()));
        }
    }
    if let Some(max) = req.max_players {
        if max < 2 {
            return Err(ApiError::BadRequest(
                "a run needs room for at least 2 players".into(),
            ));
        }
    }
    if let Some(next) = req.status {
        if !current.can_transition_to(next) {
            return Err(ApiError::Conflict(format!(
                "run cannot go from {current} to {next}"
            )));
        }
    }

    state.db.update_run(
        id,
        req.title.as_deref(),
        req.scheduled_at,
        req.max_players,
        req.status,
    )?;

    let run = state.db.get_run(id)?.ok_or(ApiError::NotFound("run"))?;
    Ok(Json(to_run(run)))
}

pub async fn delete_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (host, _) = state.db.run_host_and_status(id)?;
    if host != claims.sub {
        return Err(ApiError::Forbidden);
    }
    state.db.delete_run(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn invite(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<InviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (host, _) = state.db.run_host_and_status(id)?;
    if host != claims.sub {
        return Err(ApiError::Forbidden);
    }
    state.db.invite_to_run(id, claims.sub, req.profile_id)?;
    Ok(StatusCode::CREATED)
}

pub async fn rsvp(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RsvpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.status == InviteStatus::Invited {
        return Err(ApiError::BadRequest("rsvp must accept or decline".into()));
    }
    state.db.rsvp(id, claims.sub, req.status)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Runs the profile is on the roster of (accepted), soonest first.
pub async fn profile_runs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .runs_for_profile(id, query.cursor.as_deref(), clamp_limit(query.limit))?;
    Ok(Json(PageResponse {
        items: page.items.into_iter().map(to_run).collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}
