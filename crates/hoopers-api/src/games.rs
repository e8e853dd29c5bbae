use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use hoopers_db::models::{GamePlayerRow, GameRow};
use hoopers_db::pagination::clamp_limit;
use hoopers_types::api::{CreateGameRequest, GamePlayerResponse, GameResponse, PageResponse};
use hoopers_types::models::Team;

use crate::PageQuery;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;

#[derive(Debug, Deserialize)]
pub struct GamesQuery {
    pub court_id: Option<Uuid>,
    pub run_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

fn to_game(row: GameRow, players: Vec<GamePlayerResponse>) -> GameResponse {
    GameResponse {
        id: row.id,
        run_id: row.run_id,
        court_id: row.court_id,
        played_at: row.played_at,
        team_a_score: row.team_a_score,
        team_b_score: row.team_b_score,
        notes: row.notes,
        players,
        created_at: row.created_at,
    }
}

fn group_players(rows: Vec<GamePlayerRow>) -> HashMap<Uuid, Vec<GamePlayerResponse>> {
    let mut map: HashMap<Uuid, Vec<GamePlayerResponse>> = HashMap::new();
    for p in rows {
        map.entry(p.game_id).or_default().push(GamePlayerResponse {
            profile_id: p.profile_id,
            username: p.username,
            team: p.team,
            points_scored: p.points_scored,
        });
    }
    map
}

pub async fn record_game(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.players.is_empty() {
        return Err(ApiError::BadRequest("a game needs players".into()));
    }
    if req.team_a_score < 0 || req.team_b_score < 0 {
        return Err(ApiError::BadRequest("scores cannot be negative".into()));
    }
    for (i, p) in req.players.iter().enumerate() {
        if p.points_scored < 0 {
            return Err(ApiError::BadRequest("points cannot be negative".into()));
        }
        if req.players[..i].iter().any(|q| q.profile_id == p.profile_id) {
            return Err(ApiError::BadRequest("player listed twice".into()));
        }
    }

    let players: Vec<(Uuid, Team, i64)> = req
        .players
        .iter()
        .map(|p| (p.profile_id, p.team, p.points_scored))
        .collect();

    let id = Uuid::new_v4();
    state.db.record_game(
        id,
        claims.sub,
        req.run_id,
        req.court_id,
        req.played_at,
        req.team_a_score,
        req.team_b_score,
        req.notes.as_deref(),
        &players,
    )?;

    let (game, lines) = state.db.get_game(id)?.ok_or(ApiError::NotFound("game"))?;
    let players = group_players(lines).remove(&id).unwrap_or_default();
    Ok((StatusCode::CREATED, Json(to_game(game, players))))
}

pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (game, lines) = state.db.get_game(id)?.ok_or(ApiError::NotFound("game"))?;
    let players = group_players(lines).remove(&id).unwrap_or_default();
    Ok(Json(to_game(game, players)))
}

/// Latest games; rosters for the whole page come from one batch query.
pub async fn list_games(
    State(state): State<AppState>,
    Query(query): Query<GamesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.db.list_games(
        query.court_id,
        query.run_id,
        query.cursor.as_deref(),
        clamp_limit(query.limit),
    )?;
    let ids: Vec<Uuid> = page.items.iter().map(|g| g.id).collect();
    let mut players = group_players(state.db.players_for_games(&ids)?);

    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(|g| {
                let roster = players.remove(&g.id).unwrap_or_default();
                to_game(g, roster)
            })
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

pub async fn profile_games(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .games_for_profile(id, query.cursor.as_deref(), clamp_limit(query.limit))?;
    let ids: Vec<Uuid> = page.items.iter().map(|g| g.id).collect();
    let mut players = group_players(state.db.players_for_games(&ids)?);

    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(|g| {
                let roster = players.remove(&g.id).unwrap_or_default();
                to_game(g, roster)
            })
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}
