//! Generic keyset pagination. Every listing in the API pages the same way:
//! an opaque cursor carrying the last row's sort key and id, a row-value
//! comparison against `(key, id)`, and a `LIMIT n+1` probe for the next
//! page. Sort expressions come from fixed per-listing tables, never from
//! client input.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rusqlite::Connection;
use rusqlite::types::ToSql;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DbError, Result};

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// Clamp a client-supplied page size into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Cursor payload: the sort key of the last row on the previous page plus
/// its id as tiebreaker. Serialized as JSON, then base64url without padding.
#[derive(Debug, Serialize, Deserialize)]
pub struct Cursor<K> {
    pub key: K,
    pub id: Uuid,
}

impl<K: Serialize + DeserializeOwned> Cursor<K> {
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self).map_err(DbError::CursorEncode)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Any malformed token decodes to `InvalidCursor`, including a cursor
    /// minted for a listing with a different key type.
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| DbError::InvalidCursor)?;
        serde_json::from_slice(&bytes).map_err(|_| DbError::InvalidCursor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn cmp(self) -> &'static str {
        match self {
            SortOrder::Asc => ">",
            SortOrder::Desc => "<",
        }
    }
}

/// Keyset ordering over `(key_expr, id_expr)`.
#[derive(Debug, Clone, Copy)]
pub struct Keyset {
    pub key_expr: &'static str,
    pub id_expr: &'static str,
    pub order: SortOrder,
}

impl Keyset {
    pub fn new(key_expr: &'static str, id_expr: &'static str, order: SortOrder) -> Self {
        Self {
            key_expr,
            id_expr,
            order,
        }
    }

    /// Strict row-value comparison, so rows sharing the cursor's key
    /// resume after the cursor's id.
    fn predicate(&self) -> String {
        format!(
            "({}, {}) {} (?, ?)",
            self.key_expr,
            self.id_expr,
            self.order.cmp()
        )
    }

    fn order_by(&self) -> String {
        format!(
            "ORDER BY {} {ord}, {} {ord}",
            self.key_expr,
            self.id_expr,
            ord = self.order.sql()
        )
    }
}

/// One fetched page plus the encoded cursor for the next one.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// Convert row items into response items, keeping the cursor.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next: self.next,
        }
    }
}

/// Run one keyset page query.
///
/// `base_sql` is the SELECT without WHERE; `filter_sql` (possibly empty)
/// holds fixed filters bound by `base_params`. The cursor predicate, ORDER
/// BY and LIMIT are appended here so every listing builds its SQL the same
/// way. Fetches `limit + 1` rows to learn whether another page exists.
#[allow(clippy::too_many_arguments)]
pub fn fetch_page<K, T>(
    conn: &Connection,
    base_sql: &str,
    filter_sql: &str,
    base_params: &[&dyn ToSql],
    keyset: Keyset,
    cursor: Option<&str>,
    limit: u32,
    map_row: impl Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    key_of: impl Fn(&T) -> (K, Uuid),
) -> Result<Page<T>>
where
    K: Serialize + DeserializeOwned + ToSql,
{
    let decoded = match cursor {
        Some(token) => Some(Cursor::<K>::decode(token)?),
        None => None,
    };
    let cursor_id = decoded.as_ref().map(|c| c.id.to_string());

    let mut clauses: Vec<String> = Vec::new();
    if !filter_sql.is_empty() {
        clauses.push(filter_sql.to_string());
    }
    if decoded.is_some() {
        clauses.push(keyset.predicate());
    }

    let mut sql = base_sql.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push(' ');
    sql.push_str(&keyset.order_by());
    sql.push_str(" LIMIT ?");

    let fetch = i64::from(limit) + 1;
    let mut params: Vec<&dyn ToSql> = base_params.to_vec();
    if let (Some(c), Some(id)) = (&decoded, &cursor_id) {
        params.push(&c.key);
        params.push(id);
    }
    params.push(&fetch);

    let mut stmt = conn.prepare(&sql)?;
    let mut items = stmt
        .query_map(params.as_slice(), map_row)?
        .collect::<rusqlite::Result<Vec<T>>>()?;

    let next = if items.len() as i64 > i64::from(limit) {
        items.truncate(limit as usize);
        match items.last() {
            Some(last) => {
                let (key, id) = key_of(last);
                Some(Cursor { key, id }.encode()?)
            }
            None => None,
        }
    } else {
        None
    };

    Ok(Page { items, next })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::uuid_col;
    use chrono::{DateTime, TimeZone, Utc};

    fn scratch_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE things (
                id         TEXT PRIMARY KEY,
                rank       INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
        .unwrap();
        conn
    }

    fn seed(conn: &Connection, n: usize) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for i in 0..n {
            let id = Uuid::new_v4();
            let at: DateTime<Utc> = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
            conn.execute(
                "INSERT INTO things (id, rank, created_at) VALUES (?, ?, ?)",
                rusqlite::params![id.to_string(), i as i64, at],
            )
            .unwrap();
            ids.push(id);
        }
        ids
    }

    struct Thing {
        id: Uuid,
        rank: i64,
    }

    fn page(conn: &Connection, cursor: Option<&str>, limit: u32) -> Page<Thing> {
        fetch_page(
            conn,
            "SELECT id, rank FROM things",
            "",
            &[],
            Keyset::new("rank", "id", SortOrder::Asc),
            cursor,
            limit,
            |row| {
                Ok(Thing {
                    id: uuid_col(row, 0)?,
                    rank: row.get(1)?,
                })
            },
            |t| (t.rank, t.id),
        )
        .unwrap()
    }

    #[test]
    fn cursor_round_trips() {
        let c = Cursor {
            key: 42i64,
            id: Uuid::new_v4(),
        };
        let token = c.encode().unwrap();
        let back = Cursor::<i64>::decode(&token).unwrap();
        assert_eq!(back.key, 42);
        assert_eq!(back.id, c.id);
    }

    #[test]
    fn garbage_cursor_is_rejected() {
        assert!(matches!(
            Cursor::<i64>::decode("not@base64!"),
            Err(DbError::InvalidCursor)
        ));
        // Valid base64, wrong payload shape.
        let token = URL_SAFE_NO_PAD.encode(b"{\"nope\":1}");
        assert!(matches!(
            Cursor::<i64>::decode(&token),
            Err(DbError::InvalidCursor)
        ));
    }

    #[test]
    fn walks_all_rows_without_gaps_or_repeats() {
        let conn = scratch_conn();
        seed(&conn, 25);

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let p = page(&conn, cursor.as_deref(), 10);
            for t in &p.items {
                seen.push(t.rank);
            }
            match p.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen, (0..25).collect::<Vec<i64>>());
    }

    #[test]
    fn last_page_has_no_cursor_even_when_full() {
        let conn = scratch_conn();
        seed(&conn, 10);

        let p = page(&conn, None, 10);
        assert_eq!(p.items.len(), 10);
        assert!(p.next.is_none());
    }

    #[test]
    fn equal_keys_break_ties_by_id() {
        let conn = scratch_conn();
        // All rows share rank 7, so ordering falls entirely on the id.
        for _ in 0..8 {
            conn.execute(
                "INSERT INTO things (id, rank, created_at) VALUES (?, 7, '2025-01-01 00:00:00+00:00')",
                [Uuid::new_v4().to_string()],
            )
            .unwrap();
        }

        let first = page(&conn, None, 5);
        let second = page(&conn, first.next.as_deref(), 5);
        assert_eq!(first.items.len(), 5);
        assert_eq!(second.items.len(), 3);
        assert!(second.next.is_none());

        let mut all: Vec<Uuid> = first
            .items
            .iter()
            .chain(second.items.iter())
            .map(|t| t.id)
            .collect();
        let before = all.clone();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 8);
        // Ascending id order means the walk itself was already sorted.
        assert_eq!(
            before.iter().map(|u| u.to_string()).collect::<Vec<_>>(),
            all.iter().map(|u| u.to_string()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn clamp_limit_bounds() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), MAX_LIMIT);
    }
}
