use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use hoopers_db::models::{MentionRow, PostRow};
use hoopers_db::pagination::clamp_limit;
use hoopers_types::api::{
    CommentResponse, CreateCommentRequest, CreatePostRequest, LikeResponse, MentionTag,
    PageResponse, PostResponse, RatePostRequest, RatingResponse,
};
use hoopers_types::models::PostKind;

use crate::PageQuery;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::media;
use crate::middleware::Claims;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub kind: Option<PostKind>,
    pub author: Option<Uuid>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

/// Pull `@username` tokens out of a post body. A username runs over letters,
/// digits and underscores; anything else ends the token.
fn parse_mentions(body: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in body.split('@').skip(1) {
        let name: String = token
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
            names.push(name);
        }
    }
    names
}

fn to_post(base: &str, row: PostRow, mentions: Vec<MentionTag>) -> PostResponse {
    let media_url = match (&row.media_key, row.media_kind) {
        (Some(key), Some(kind)) => Some(media::media_url(base, key, kind)),
        _ => None,
    };
    PostResponse {
        id: row.id,
        author_id: row.author_id,
        author_username: row.author_username,
        kind: row.kind,
        body: row.body,
        media_url,
        like_count: row.like_count,
        comment_count: row.comment_count,
        rating_average: row.rating_average,
        rating_count: row.rating_count,
        liked_by_me: row.liked_by_me,
        mentions,
        created_at: row.created_at,
    }
}

fn group_mentions(rows: Vec<MentionRow>) -> HashMap<Uuid, Vec<MentionTag>> {
    let mut map: HashMap<Uuid, Vec<MentionTag>> = HashMap::new();
    for m in rows {
        map.entry(m.post_id).or_default().push(MentionTag {
            profile_id: m.profile_id,
            username: m.username,
        });
    }
    map
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.body.trim().is_empty() {
        return Err(ApiError::BadRequest("post body is empty".into()));
    }
    if req.media_key.is_some() != req.media_kind.is_some() {
        return Err(ApiError::BadRequest(
            "media key and media kind go together".into(),
        ));
    }

    // Unknown @names are dropped rather than failing the post.
    let names = parse_mentions(&req.body);
    let mentioned: Vec<Uuid> = state
        .db
        .resolve_usernames(&names)?
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    let post_id = Uuid::new_v4();
    state.db.create_post(
        post_id,
        claims.sub,
        req.kind,
        &req.body,
        req.media_key.as_deref(),
        req.media_kind,
        &mentioned,
    )?;

    let row = state
        .db
        .get_post(claims.sub, post_id)?
        .ok_or(ApiError::NotFound("post"))?;
    let mentions = group_mentions(state.db.mentions_for_posts(&[post_id])?)
        .remove(&post_id)
        .unwrap_or_default();

    Ok((
        StatusCode::CREATED,
        Json(to_post(&state.media_base_url, row, mentions)),
    ))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_post(claims.sub, id)?
        .ok_or(ApiError::NotFound("post"))?;
    let mentions = group_mentions(state.db.mentions_for_posts(&[id])?)
        .remove(&id)
        .unwrap_or_default();
    Ok(Json(to_post(&state.media_base_url, row, mentions)))
}

/// Newest-first feed. The page and its mention tags come from two batch
/// queries on a blocking thread; no per-row follow-ups.
pub async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let viewer = claims.sub;
    let FeedQuery { kind, author, limit, cursor } = query;
    let limit = clamp_limit(limit);

    let (page, mention_rows) = tokio::task::spawn_blocking(move || {
        let page = db.db.feed(viewer, kind, author, cursor.as_deref(), limit)?;
        let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
        let mention_rows = db.db.mentions_for_posts(&ids)?;
        Ok::<_, ApiError>((page, mention_rows))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    let mut mentions = group_mentions(mention_rows);
    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(|row| {
                let tags = mentions.remove(&row.id).unwrap_or_default();
                to_post(&state.media_base_url, row, tags)
            })
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

/// Posts that tag the given profile, newest first.
pub async fn mentioned_feed(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let viewer = claims.sub;
    let cursor = query.cursor;
    let limit = clamp_limit(query.limit);

    let (page, mention_rows) = tokio::task::spawn_blocking(move || {
        let page = db.db.mentioned_feed(viewer, profile_id, cursor.as_deref(), limit)?;
        let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
        let mention_rows = db.db.mentions_for_posts(&ids)?;
        Ok::<_, ApiError>((page, mention_rows))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    let mut mentions = group_mentions(mention_rows);
    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(|row| {
                let tags = mentions.remove(&row.id).unwrap_or_default();
                to_post(&state.media_base_url, row, tags)
            })
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.post_author(id)? != claims.sub {
        return Err(ApiError::Forbidden);
    }
    state.db.delete_post(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Comments --

pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.body.trim().is_empty() {
        return Err(ApiError::BadRequest("comment body is empty".into()));
    }

    let comment_id = Uuid::new_v4();
    let created_at = state
        .db
        .add_comment(comment_id, post_id, claims.sub, &req.body)?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: comment_id,
            post_id,
            author_id: claims.sub,
            author_username: claims.username,
            body: req.body,
            created_at,
        }),
    ))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .list_comments(post_id, query.cursor.as_deref(), clamp_limit(query.limit))?;
    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(|c| CommentResponse {
                id: c.id,
                post_id: c.post_id,
                author_id: c.author_id,
                author_username: c.author_username,
                body: c.body,
                created_at: c.created_at,
            })
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

/// Either side of the thread may remove a comment: its author, or the
/// author of the post it sits under.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (comment_author, post_author) = state.db.comment_parties(id)?;
    if claims.sub != comment_author && claims.sub != post_author {
        return Err(ApiError::Forbidden);
    }
    state.db.delete_comment(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Likes and ratings --

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (liked, like_count) = state.db.toggle_like(id, claims.sub)?;
    Ok(Json(LikeResponse { liked, like_count }))
}

pub async fn rate_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !(1..=5).contains(&req.stars) {
        return Err(ApiError::BadRequest("stars must be 1-5".into()));
    }
    let (average, count) = state.db.rate_post(id, claims.sub, req.stars)?;
    Ok(Json(RatingResponse { average, count }))
}

#[cfg(test)]
mod tests {
    use super::parse_mentions;

    #[test]
    fn mentions_come_out_of_body_text() {
        let names = parse_mentions("great run with @iso_joe and @Baseline99, see you @iso_joe!");
        assert_eq!(names, vec!["iso_joe", "Baseline99"]);
    }

    #[test]
    fn stray_at_signs_are_ignored() {
        let names = parse_mentions("email me @ the gym, or ping @@real_one");
        assert_eq!(names, vec!["real_one"]);
    }
}
