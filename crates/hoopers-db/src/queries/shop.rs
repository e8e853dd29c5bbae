use std::collections::HashMap;

use chrono::{Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use rusqlite::types::ToSql;
use uuid::Uuid;

use hoopers_types::models::{OrderStatus, Plan, ProductSort, SubscriptionStatus};

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{OrderItemRow, OrderRow, ProductRow, SubscriptionRow, enum_col, uuid_col};
use crate::pagination::{Keyset, Page, SortOrder, fetch_page};

const PRODUCT_SELECT: &str = "SELECT id, name, description, price_cents, currency, sku, \
     stock, media_key, active, created_at FROM products";

fn map_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price_cents: row.get(3)?,
        currency: row.get(4)?,
        sku: row.get(5)?,
        stock: row.get(6)?,
        media_key: row.get(7)?,
        active: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn map_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        id: uuid_col(row, 0)?,
        profile_id: uuid_col(row, 1)?,
        status: enum_col(row, 2)?,
        total_cents: row.get(3)?,
        currency: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn order_items(conn: &Connection, order_ids: &[Uuid]) -> Result<Vec<OrderItemRow>> {
    if order_ids.is_empty() {
        return Ok(vec![]);
    }
    let placeholders: Vec<String> = (1..=order_ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT i.order_id, i.product_id, p.name, i.quantity, i.unit_price_cents
         FROM order_items i JOIN products p ON p.id = i.product_id
         WHERE i.order_id IN ({})",
        placeholders.join(", ")
    );
    let id_texts: Vec<String> = order_ids.iter().map(|o| o.to_string()).collect();
    let params: Vec<&dyn ToSql> = id_texts.iter().map(|s| s as &dyn ToSql).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(OrderItemRow {
                order_id: uuid_col(row, 0)?,
                product_id: uuid_col(row, 1)?,
                product_name: row.get(2)?,
                quantity: row.get(3)?,
                unit_price_cents: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

impl Database {
    // -- Products --

    #[allow(clippy::too_many_arguments)]
    pub fn create_product(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
        price_cents: i64,
        currency: &str,
        sku: &str,
        stock: i64,
        media_key: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO products (id, name, description, price_cents, currency, sku,
                                       stock, media_key, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)",
                rusqlite::params![
                    id.to_string(),
                    name,
                    description,
                    price_cents,
                    currency,
                    sku,
                    stock,
                    media_key,
                    now
                ],
            )
            .map_err(DbError::on_unique("sku already exists"))?;
            Ok(())
        })
    }

    pub fn get_product(&self, id: Uuid) -> Result<Option<ProductRow>> {
        let id_text = id.to_string();
        self.with_conn(|conn| {
            let sql = format!("{PRODUCT_SELECT} WHERE id = ?1");
            let row = conn.query_row(&sql, [&id_text], map_product).optional()?;
            Ok(row)
        })
    }

    /// Storefront listing. Retired products only show up when asked for.
    pub fn list_products(
        &self,
        sort: ProductSort,
        include_inactive: bool,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<ProductRow>> {
        self.with_conn(|conn| {
            let filter = if include_inactive { "" } else { "active = 1" };
            match sort {
                ProductSort::Price => fetch_page(
                    conn,
                    PRODUCT_SELECT,
                    filter,
                    &[],
                    Keyset::new("price_cents", "id", SortOrder::Asc),
                    cursor,
                    limit,
                    map_product,
                    |p| (p.price_cents, p.id),
                ),
                ProductSort::Name => fetch_page(
                    conn,
                    PRODUCT_SELECT,
                    filter,
                    &[],
                    Keyset::new("name", "id", SortOrder::Asc),
                    cursor,
                    limit,
                    map_product,
                    |p| (p.name.clone(), p.id),
                ),
                ProductSort::Newest => fetch_page(
                    conn,
                    PRODUCT_SELECT,
                    filter,
                    &[],
                    Keyset::new("created_at", "id", SortOrder::Desc),
                    cursor,
                    limit,
                    map_product,
                    |p| (p.created_at, p.id),
                ),
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_product(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
        price_cents: i64,
        currency: &str,
        sku: &str,
        stock: i64,
        media_key: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn
                .execute(
                    "UPDATE products SET name = ?1, description = ?2, price_cents = ?3,
                         currency = ?4, sku = ?5, stock = ?6, media_key = ?7
                     WHERE id = ?8",
                    rusqlite::params![
                        name,
                        description,
                        price_cents,
                        currency,
                        sku,
                        stock,
                        media_key,
                        id.to_string()
                    ],
                )
                .map_err(DbError::on_unique("sku already exists"))?;
            if n == 0 {
                return Err(DbError::NotFound("product"));
            }
            Ok(())
        })
    }

    /// Products are retired, never hard-deleted: order history keeps
    /// pointing at them.
    pub fn retire_product(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE products SET active = 0 WHERE id = ?1",
                [id.to_string()],
            )?;
            if n == 0 {
                return Err(DbError::NotFound("product"));
            }
            Ok(())
        })
    }

    // -- Orders --

    /// Place an order: decrement stock for every line, snapshot unit
    /// prices, and write the order atomically. Any failing line aborts the
    /// whole order.
    pub fn place_order(
        &self,
        id: Uuid,
        profile: Uuid,
        items: &[(Uuid, i64)],
    ) -> Result<(OrderRow, Vec<OrderItemRow>)> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut total: i64 = 0;
            let mut currency: Option<String> = None;

            for &(product_id, quantity) in items {
                let product: Option<(i64, i64, bool, String)> = tx
                    .query_row(
                        "SELECT price_cents, stock, active, currency FROM products WHERE id = ?1",
                        [product_id.to_string()],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                    )
                    .optional()?;
                let Some((price, stock, active, cur)) = product else {
                    return Err(DbError::NotFound("product"));
                };
                if !active {
                    return Err(DbError::Conflict("product is retired"));
                }
                if stock < quantity {
                    return Err(DbError::Conflict("insufficient stock"));
                }
                match &currency {
                    None => currency = Some(cur),
                    Some(c) if *c != cur => {
                        return Err(DbError::Conflict("mixed currencies in one order"));
                    }
                    Some(_) => {}
                }

                tx.execute(
                    "UPDATE products SET stock = stock - ?1 WHERE id = ?2 AND stock >= ?1",
                    rusqlite::params![quantity, product_id.to_string()],
                )?;
                total += price * quantity;
            }

            let currency = currency.ok_or(DbError::Conflict("order has no items"))?;
            tx.execute(
                "INSERT INTO orders (id, profile_id, status, total_cents, currency, created_at)
                 VALUES (?1, ?2, 'pending', ?3, ?4, ?5)",
                rusqlite::params![id.to_string(), profile.to_string(), total, currency, now],
            )?;
            for &(product_id, quantity) in items {
                tx.execute(
                    "INSERT INTO order_items (order_id, product_id, quantity, unit_price_cents)
                     SELECT ?1, ?2, ?3, price_cents FROM products WHERE id = ?2",
                    rusqlite::params![id.to_string(), product_id.to_string(), quantity],
                )
                .map_err(DbError::on_unique("product listed twice in one order"))?;
            }

            let order = tx.query_row(
                "SELECT id, profile_id, status, total_cents, currency, created_at
                 FROM orders WHERE id = ?1",
                [id.to_string()],
                map_order,
            )?;
            let lines = order_items(&tx, &[id])?;
            tx.commit()?;
            Ok((order, lines))
        })
    }

    pub fn get_order(&self, id: Uuid) -> Result<Option<(OrderRow, Vec<OrderItemRow>)>> {
        let id_text = id.to_string();
        self.with_conn(|conn| {
            let order = conn
                .query_row(
                    "SELECT id, profile_id, status, total_cents, currency, created_at
                     FROM orders WHERE id = ?1",
                    [&id_text],
                    map_order,
                )
                .optional()?;
            let Some(order) = order else { return Ok(None) };
            let lines = order_items(conn, &[order.id])?;
            Ok(Some((order, lines)))
        })
    }

    /// A profile's order history with line items batch-fetched for the
    /// whole page in one query.
    pub fn list_orders(
        &self,
        profile: Uuid,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<(OrderRow, Vec<OrderItemRow>)>> {
        let profile_text = profile.to_string();
        self.with_conn(|conn| {
            let page = fetch_page(
                conn,
                "SELECT id, profile_id, status, total_cents, currency, created_at FROM orders",
                "profile_id = ?",
                &[&profile_text],
                Keyset::new("created_at", "id", SortOrder::Desc),
                cursor,
                limit,
                map_order,
                |o| (o.created_at, o.id),
            )?;

            let ids: Vec<Uuid> = page.items.iter().map(|o| o.id).collect();
            let mut by_order: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
            for line in order_items(conn, &ids)? {
                by_order.entry(line.order_id).or_default().push(line);
            }

            let items = page
                .items
                .into_iter()
                .map(|order| {
                    let lines = by_order.remove(&order.id).unwrap_or_default();
                    (order, lines)
                })
                .collect();
            Ok(Page { items, next: page.next })
        })
    }

    pub fn order_owner_and_status(&self, id: Uuid) -> Result<(Uuid, OrderStatus)> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT profile_id, status FROM orders WHERE id = ?1",
                [id.to_string()],
                |row| Ok((uuid_col(row, 0)?, enum_col::<OrderStatus>(row, 1)?)),
            )
            .optional()?
            .ok_or(DbError::NotFound("order"))
        })
    }

    /// Move an order along its lifecycle. Cancelling restores stock in the
    /// same transaction. Transition legality is the caller's check.
    pub fn set_order_status(&self, id: Uuid, status: OrderStatus) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if status == OrderStatus::Cancelled {
                tx.execute(
                    "UPDATE products SET stock = stock + (
                         SELECT i.quantity FROM order_items i
                         WHERE i.order_id = ?1 AND i.product_id = products.id
                     )
                     WHERE id IN (SELECT product_id FROM order_items WHERE order_id = ?1)",
                    [id.to_string()],
                )?;
            }
            let n = tx.execute(
                "UPDATE orders SET status = ?1 WHERE id = ?2",
                rusqlite::params![status.as_str(), id.to_string()],
            )?;
            if n == 0 {
                return Err(DbError::NotFound("order"));
            }
            tx.commit()?;
            Ok(())
        })
    }

    // -- Plan subscriptions --

    /// Start a membership plan. One live subscription per profile.
    pub fn start_subscription(&self, id: Uuid, profile: Uuid, plan: Plan) -> Result<SubscriptionRow> {
        let now = Utc::now();
        let period_end = now + Duration::days(plan.period_days());
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let live: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM plan_subscriptions
                               WHERE profile_id = ?1 AND status = 'active')",
                [profile.to_string()],
                |r| r.get(0),
            )?;
            if live {
                return Err(DbError::Conflict("subscription already active"));
            }
            tx.execute(
                "INSERT INTO plan_subscriptions
                     (id, profile_id, plan, status, started_at, current_period_end)
                 VALUES (?1, ?2, ?3, 'active', ?4, ?5)",
                rusqlite::params![
                    id.to_string(),
                    profile.to_string(),
                    plan.as_str(),
                    now,
                    period_end
                ],
            )?;
            tx.commit()?;
            Ok(SubscriptionRow {
                id,
                profile_id: profile,
                plan,
                status: SubscriptionStatus::Active,
                started_at: now,
                current_period_end: period_end,
                cancelled_at: None,
            })
        })
    }

    pub fn current_subscription(&self, profile: Uuid) -> Result<Option<SubscriptionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, profile_id, plan, status, started_at, current_period_end,
                            cancelled_at
                     FROM plan_subscriptions
                     WHERE profile_id = ?1 AND status = 'active'",
                    [profile.to_string()],
                    |row| {
                        Ok(SubscriptionRow {
                            id: uuid_col(row, 0)?,
                            profile_id: uuid_col(row, 1)?,
                            plan: enum_col(row, 2)?,
                            status: enum_col(row, 3)?,
                            started_at: row.get(4)?,
                            current_period_end: row.get(5)?,
                            cancelled_at: row.get(6)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Cancel a live subscription; membership stays until period end. Scoped
    /// to the owner, so a foreign id reads as missing.
    pub fn cancel_subscription(&self, id: Uuid, profile: Uuid) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE plan_subscriptions SET status = 'cancelled', cancelled_at = ?1
                 WHERE id = ?2 AND profile_id = ?3 AND status = 'active'",
                rusqlite::params![now, id.to_string(), profile.to_string()],
            )?;
            if n == 0 {
                return Err(DbError::NotFound("subscription"));
            }
            Ok(())
        })
    }
}
