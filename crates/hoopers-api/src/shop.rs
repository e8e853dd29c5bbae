use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use hoopers_db::models::{OrderItemRow, OrderRow, ProductRow};
use hoopers_db::pagination::clamp_limit;
use hoopers_types::api::{
    CreateOrderRequest, OrderItemResponse, OrderResponse, PageResponse, ProductRequest,
    ProductResponse, StartSubscriptionRequest, SubscriptionResponse, UpdateOrderStatusRequest,
};
use hoopers_types::models::{MediaKind, ProductSort};

use crate::PageQuery;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::media;
use crate::middleware::Claims;

#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    pub sort: Option<ProductSort>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

fn to_product(base: &str, row: ProductRow) -> ProductResponse {
    ProductResponse {
        id: row.id,
        name: row.name,
        description: row.description,
        price_cents: row.price_cents,
        currency: row.currency,
        sku: row.sku,
        stock: row.stock,
        media_url: row
            .media_key
            .as_deref()
            .map(|k| media::media_url(base, k, MediaKind::Image)),
        active: row.active,
        created_at: row.created_at,
    }
}

fn to_order(row: OrderRow, lines: Vec<OrderItemRow>) -> OrderResponse {
    OrderResponse {
        id: row.id,
        profile_id: row.profile_id,
        status: row.status,
        total_cents: row.total_cents,
        currency: row.currency,
        items: lines
            .into_iter()
            .map(|l| OrderItemResponse {
                product_id: l.product_id,
                product_name: l.product_name,
                quantity: l.quantity,
                unit_price_cents: l.unit_price_cents,
            })
            .collect(),
        created_at: row.created_at,
    }
}

fn validate_product(req: &ProductRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() || req.sku.trim().is_empty() {
        return Err(ApiError::BadRequest("name and sku are required".into()));
    }
    if req.price_cents < 0 {
        return Err(ApiError::BadRequest("price cannot be negative".into()));
    }
    if req.stock < 0 {
        return Err(ApiError::BadRequest("stock cannot be negative".into()));
    }
    if req.currency.len() != 3 {
        return Err(ApiError::BadRequest(
            "currency must be a 3-letter code".into(),
        ));
    }
    Ok(())
}

// -- Products --

pub async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_product(&req)?;

    let id = Uuid::new_v4();
    state.db.create_product(
        id,
        &req.name,
        &req.description,
        req.price_cents,
        &req.currency,
        &req.sku,
        req.stock,
        req.media_key.as_deref(),
    )?;

    let row = state
        .db
        .get_product(id)?
        .ok_or(ApiError::NotFound("product"))?;
    Ok((
        StatusCode::CREATED,
        Json(to_product(&state.media_base_url, row)),
    ))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_product(id)?
        .ok_or(ApiError::NotFound("product"))?;
    Ok(Json(to_product(&state.media_base_url, row)))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = query.sort.unwrap_or(ProductSort::Newest);
    let page = state.db.list_products(
        sort,
        query.include_inactive,
        query.cursor.as_deref(),
        clamp_limit(query.limit),
    )?;
    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(|r| to_product(&state.media_base_url, r))
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_product(&req)?;

    state.db.update_product(
        id,
        &req.name,
        &req.description,
        req.price_cents,
        &req.currency,
        &req.sku,
        req.stock,
        req.media_key.as_deref(),
    )?;

    let row = state
        .db
        .get_product(id)?
        .ok_or(ApiError::NotFound("product"))?;
    Ok(Json(to_product(&state.media_base_url, row)))
}

/// Retire, never hard-delete: order history keeps its product rows.
pub async fn retire_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.retire_product(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Orders --

pub async fn place_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::BadRequest("order has no items".into()));
    }
    for (i, item) in req.items.iter().enumerate() {
        if item.quantity < 1 {
            return Err(ApiError::BadRequest("quantity must be at least 1".into()));
        }
        if req.items[..i].iter().any(|o| o.product_id == item.product_id) {
            return Err(ApiError::BadRequest(
                "product listed twice in one order".into(),
            ));
        }
    }

    let items: Vec<(Uuid, i64)> = req
        .items
        .iter()
        .map(|i| (i.product_id, i.quantity))
        .collect();

    let (order, lines) = state.db.place_order(Uuid::new_v4(), claims.sub, &items)?;
    Ok((StatusCode::CREATED, Json(to_order(order, lines))))
}

/// Orders are private; a foreign order id reads as missing.
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (order, lines) = state.db.get_order(id)?.ok_or(ApiError::NotFound("order"))?;
    if order.profile_id != claims.sub {
        return Err(ApiError::NotFound("order"));
    }
    Ok(Json(to_order(order, lines)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let profile = claims.sub;
    let cursor = query.cursor;
    let limit = clamp_limit(query.limit);

    let page = tokio::task::spawn_blocking(move || {
        Ok::<_, ApiError>(db.db.list_orders(profile, cursor.as_deref(), limit)?)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(|(order, lines)| to_order(order, lines))
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

/// Owner moves an order along pending -> paid -> shipped; cancelling from
/// pending or paid puts the stock back.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (owner, current) = state.db.order_owner_and_status(id)?;
    if owner != claims.sub {
        return Err(ApiError::NotFound("order"));
    }
    if !current.can_transition_to(req.status) {
        return Err(ApiError::Conflict(format!(
            "order cannot go from {current} to {}",
            req.status
        )));
    }

    state.db.set_order_status(id, req.status)?;
    let (order, lines) = state.db.get_order(id)?.ok_or(ApiError::NotFound("order"))?;
    Ok(Json(to_order(order, lines)))
}

// -- Plan subscriptions --

fn to_subscription(row: hoopers_db::models::SubscriptionRow) -> SubscriptionResponse {
    SubscriptionResponse {
        id: row.id,
        profile_id: row.profile_id,
        plan: row.plan,
        status: row.status,
        started_at: row.started_at,
        current_period_end: row.current_period_end,
        cancelled_at: row.cancelled_at,
    }
}

pub async fn start_subscription(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .start_subscription(Uuid::new_v4(), claims.sub, req.plan)?;
    Ok((StatusCode::CREATED, Json(to_subscription(row))))
}

pub async fn current_subscription(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .current_subscription(claims.sub)?
        .ok_or(ApiError::NotFound("subscription"))?;
    Ok(Json(to_subscription(row)))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.cancel_subscription(id, claims.sub)?;
    Ok(StatusCode::NO_CONTENT)
}
