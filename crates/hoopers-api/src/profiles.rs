use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use hoopers_db::models::{ProfileRow, ProfileSummaryRow, ScoutingSummaryRow};
use hoopers_db::pagination::clamp_limit;
use hoopers_types::api::{PageResponse, ProfileResponse, ProfileSummary, UpdateProfileRequest};
use hoopers_types::models::ProfileSort;

use crate::PageQuery;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::media;
use crate::middleware::Claims;
use crate::reports::to_scouting_summary;

#[derive(Debug, Deserialize)]
pub struct ProfilesQuery {
    pub sort: Option<ProfileSort>,
    pub city: Option<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

pub(crate) fn to_summary(base: &str, row: ProfileSummaryRow) -> ProfileSummary {
    ProfileSummary {
        id: row.id,
        username: row.username,
        display_name: row.display_name,
        points: row.points,
        player_number: row.player_number,
        avatar_url: media::avatar_url(base, row.avatar_key.as_deref()),
    }
}

fn to_profile(base: &str, row: ProfileRow, scouting: ScoutingSummaryRow) -> ProfileResponse {
    ProfileResponse {
        id: row.id,
        username: row.username,
        display_name: row.display_name,
        bio: row.bio,
        position: row.position,
        player_number: row.player_number,
        points: row.points,
        city: row.city,
        avatar_url: media::avatar_url(base, row.avatar_key.as_deref()),
        followers: row.followers,
        following: row.following,
        posts: row.posts,
        scouting: to_scouting_summary(scouting),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_profile(id)?
        .ok_or(ApiError::NotFound("profile"))?;
    let scouting = state.db.report_summary(id)?;
    Ok(Json(to_profile(&state.media_base_url, row, scouting)))
}

/// Partial update of the caller's own profile; returns the refreshed view.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.sub != id {
        return Err(ApiError::Forbidden);
    }

    state.db.update_profile(
        id,
        req.display_name.as_deref(),
        req.bio.as_deref(),
        req.position.as_deref(),
        req.player_number,
        req.city.as_deref(),
        req.avatar_key.as_deref(),
    )?;

    let row = state
        .db
        .get_profile(id)?
        .ok_or(ApiError::NotFound("profile"))?;
    let scouting = state.db.report_summary(id)?;
    Ok(Json(to_profile(&state.media_base_url, row, scouting)))
}

pub async fn list_profiles(
    State(state): State<AppState>,
    Query(query): Query<ProfilesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = query.sort.unwrap_or(ProfileSort::Points);
    let page = state.db.list_profiles(
        sort,
        query.city.as_deref(),
        query.cursor.as_deref(),
        clamp_limit(query.limit),
    )?;

    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(|r| to_summary(&state.media_base_url, r))
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

pub async fn follow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.sub == id {
        return Err(ApiError::BadRequest("cannot follow yourself".into()));
    }
    state.db.follow(claims.sub, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unfollow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.unfollow(claims.sub, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn followers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .followers(id, query.cursor.as_deref(), clamp_limit(query.limit))?;
    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(|e| to_summary(&state.media_base_url, e.profile))
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

pub async fn following(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .following(id, query.cursor.as_deref(), clamp_limit(query.limit))?;
    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(|e| to_summary(&state.media_base_url, e.profile))
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}
