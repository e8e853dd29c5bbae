use chrono::Utc;
use rusqlite::OptionalExtension;
use rusqlite::types::ToSql;
use uuid::Uuid;

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{CourtRow, opt_uuid_col, uuid_col};
use crate::pagination::{Keyset, Page, SortOrder, fetch_page};

const COURT_SELECT: &str = "SELECT id, name, address, city, lat, lng, surface, \
     hoop_count, indoor, created_by, created_at FROM courts";

fn map_court(row: &rusqlite::Row<'_>) -> rusqlite::Result<CourtRow> {
    Ok(CourtRow {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        city: row.get(3)?,
        lat: row.get(4)?,
        lng: row.get(5)?,
        surface: row.get(6)?,
        hoop_count: row.get(7)?,
        indoor: row.get(8)?,
        created_by: opt_uuid_col(row, 9)?,
        created_at: row.get(10)?,
    })
}

impl Database {
    #[allow(clippy::too_many_arguments)]
    pub fn create_court(
        &self,
        id: Uuid,
        created_by: Uuid,
        name: &str,
        address: &str,
        city: &str,
        lat: f64,
        lng: f64,
        surface: Option<&str>,
        hoop_count: i64,
        indoor: bool,
    ) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO courts (id, name, address, city, lat, lng, surface,
                                     hoop_count, indoor, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    id.to_string(),
                    name,
                    address,
                    city,
                    lat,
                    lng,
                    surface,
                    hoop_count,
                    indoor,
                    created_by.to_string(),
                    now
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_court(&self, id: Uuid) -> Result<Option<CourtRow>> {
        let id_text = id.to_string();
        self.with_conn(|conn| {
            let sql = format!("{COURT_SELECT} WHERE id = ?1");
            let row = conn.query_row(&sql, [&id_text], map_court).optional()?;
            Ok(row)
        })
    }

    /// Alphabetical court directory, optionally limited to one city.
    pub fn list_courts(
        &self,
        city: Option<&str>,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<CourtRow>> {
        self.with_conn(|conn| {
            let mut params: Vec<&dyn ToSql> = Vec::new();
            let filter = if let Some(c) = &city {
                params.push(c);
                "city = ?"
            } else {
                ""
            };
            fetch_page(
                conn,
                COURT_SELECT,
                filter,
                &params,
                Keyset::new("name", "id", SortOrder::Asc),
                cursor,
                limit,
                map_court,
                |c| (c.name.clone(), c.id),
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_court(
        &self,
        id: Uuid,
        name: &str,
        address: &str,
        city: &str,
        lat: f64,
        lng: f64,
        surface: Option<&str>,
        hoop_count: i64,
        indoor: bool,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE courts SET name = ?1, address = ?2, city = ?3, lat = ?4, lng = ?5,
                                   surface = ?6, hoop_count = ?7, indoor = ?8
                 WHERE id = ?9",
                rusqlite::params![
                    name,
                    address,
                    city,
                    lat,
                    lng,
                    surface,
                    hoop_count,
                    indoor,
                    id.to_string()
                ],
            )?;
            if n == 0 {
                return Err(DbError::NotFound("court"));
            }
            Ok(())
        })
    }

    /// Courts with recorded runs or games are load-bearing and refuse
    /// deletion (RESTRICT on the FK side shows up as a conflict).
    pub fn delete_court(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let in_use: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM runs WHERE court_id = ?1)
                        OR EXISTS(SELECT 1 FROM games WHERE court_id = ?1)",
                [id.to_string()],
                |r| r.get(0),
            )?;
            if in_use {
                return Err(DbError::Conflict("court has runs or games recorded on it"));
            }
            let n = conn.execute("DELETE FROM courts WHERE id = ?1", [id.to_string()])?;
            if n == 0 {
                return Err(DbError::NotFound("court"));
            }
            Ok(())
        })
    }
}
