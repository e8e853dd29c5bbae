use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use hoopers_db::models::SquadRow;
use hoopers_db::pagination::clamp_limit;
use hoopers_types::api::{
    AddSquadMemberRequest, PageResponse, SquadDetailResponse, SquadRequest, SquadResponse,
};

use crate::PageQuery;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::profiles::to_summary;

fn to_squad(row: SquadRow) -> SquadResponse {
    SquadResponse {
        id: row.id,
        owner_id: row.owner_id,
        name: row.name,
        motto: row.motto,
        member_count: row.member_count,
        created_at: row.created_at,
    }
}

fn squad_detail(state: &AppState, id: Uuid) -> Result<SquadDetailResponse, ApiError> {
    let squad = state.db.get_squad(id)?.ok_or(ApiError::NotFound("squad"))?;
    let members = state
        .db
        .squad_members(id)?
        .into_iter()
        .map(|m| to_summary(&state.media_base_url, m))
        .collect();
    Ok(SquadDetailResponse {
        squad: to_squad(squad),
        members,
    })
}

pub async fn create_squad(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SquadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("squad name is required".into()));
    }

    let id = Uuid::new_v4();
    state
        .db
        .create_squad(id, claims.sub, &req.name, req.motto.as_deref())?;

    Ok((StatusCode::CREATED, Json(squad_detail(&state, id)?)))
}

pub async fn get_squad(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(squad_detail(&state, id)?))
}

pub async fn list_squads(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .list_squads(query.cursor.as_deref(), clamp_limit(query.limit))?;
    Ok(Json(PageResponse {
        items: page.items.into_iter().map(to_squad).collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

pub async fn update_squad(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SquadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("squad name is required".into()));
    }
    if state.db.squad_owner(id)? != claims.sub {
        return Err(ApiError::Forbidden);
    }

    state.db.update_squad(id, &req.name, req.motto.as_deref())?;
    let squad = state.db.get_squad(id)?.ok_or(ApiError::NotFound("squad"))?;
    Ok(Json(to_squad(squad)))
}

pub async fn delete_squad(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.squad_owner(id)? != claims.sub {
        return Err(ApiError::Forbidden);
    }
    state.db.delete_squad(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddSquadMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.squad_owner(id)? != claims.sub {
        return Err(ApiError::Forbidden);
    }
    state.db.add_squad_member(id, req.profile_id)?;
    Ok(StatusCode::CREATED)
}

/// The owner can remove anyone; members can remove themselves. The owner
/// cannot leave their own squad (that surfaces as a conflict).
pub async fn remove_member(
    State(state): State<AppState>,
    Path((id, profile_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = state.db.squad_owner(id)?;
    if claims.sub != owner && claims.sub != profile_id {
        return Err(ApiError::Forbidden);
    }
    state.db.remove_squad_member(id, profile_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn profile_squads(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page =
        state
            .db
            .squads_for_profile(id, query.cursor.as_deref(), clamp_limit(query.limit))?;
    Ok(Json(PageResponse {
        items: page.items.into_iter().map(to_squad).collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}
