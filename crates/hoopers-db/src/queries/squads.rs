use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{ProfileSummaryRow, SquadRow, uuid_col};
use crate::pagination::{Keyset, Page, SortOrder, fetch_page};
use crate::queries::profile_exists;

const SQUAD_SELECT: &str = "SELECT s.id, s.owner_id, s.name, s.motto, \
     (SELECT COUNT(*) FROM squad_members m WHERE m.squad_id = s.id), s.created_at \
     FROM squads s";

fn map_squad(row: &rusqlite::Row<'_>) -> rusqlite::Result<SquadRow> {
    Ok(SquadRow {
        id: uuid_col(row, 0)?,
        owner_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        motto: row.get(3)?,
        member_count: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Database {
    /// Create a squad; the owner is its first member. Squad names are
    /// unique across the app, case-insensitively.
    pub fn create_squad(&self, id: Uuid, owner: Uuid, name: &str, motto: Option<&str>) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO squads (id, owner_id, name, motto, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id.to_string(), owner.to_string(), name, motto, now],
            )
            .map_err(DbError::on_unique("squad name already taken"))?;
            tx.execute(
                "INSERT INTO squad_members (squad_id, profile_id, joined_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id.to_string(), owner.to_string(), now],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_squad(&self, id: Uuid) -> Result<Option<SquadRow>> {
        let id_text = id.to_string();
        self.with_conn(|conn| {
            let sql = format!("{SQUAD_SELECT} WHERE s.id = ?");
            let row = conn.query_row(&sql, [&id_text], map_squad).optional()?;
            Ok(row)
        })
    }

    /// Full member list; squads are capped well below page size.
    pub fn squad_members(&self, id: Uuid) -> Result<Vec<ProfileSummaryRow>> {
        let id_text = id.to_string();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, u.username, p.display_name, p.points, p.player_number, p.avatar_key
                 FROM squad_members m
                 JOIN profiles p ON p.id = m.profile_id
                 JOIN users u ON u.id = p.id
                 WHERE m.squad_id = ?1
                 ORDER BY m.joined_at ASC, m.profile_id ASC",
            )?;
            let rows = stmt
                .query_map([&id_text], |row| ProfileSummaryRow::from_row(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn list_squads(&self, cursor: Option<&str>, limit: u32) -> Result<Page<SquadRow>> {
        self.with_conn(|conn| {
            fetch_page(
                conn,
                SQUAD_SELECT,
                "",
                &[],
                Keyset::new("s.created_at", "s.id", SortOrder::Desc),
                cursor,
                limit,
                map_squad,
                |s| (s.created_at, s.id),
            )
        })
    }

    /// Squads the profile belongs to, oldest membership first.
    pub fn squads_for_profile(
        &self,
        profile: Uuid,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<SquadRow>> {
        let profile_text = profile.to_string();
        self.with_conn(|conn| {
            if !profile_exists(conn, profile)? {
                return Err(DbError::NotFound("profile"));
            }
            fetch_page(
                conn,
                "SELECT s.id, s.owner_id, s.name, s.motto, \
                 (SELECT COUNT(*) FROM squad_members m WHERE m.squad_id = s.id), \
                 s.created_at, sm.joined_at \
                 FROM squads s JOIN squad_members sm ON sm.squad_id = s.id",
                "sm.profile_id = ?",
                &[&profile_text],
                Keyset::new("sm.joined_at", "s.id", SortOrder::Asc),
                cursor,
                limit,
                |row| {
                    Ok((map_squad(row)?, row.get::<_, chrono::DateTime<Utc>>(6)?))
                },
                |(s, joined)| (*joined, s.id),
            )
            .map(|page| page.map(|(s, _)| s))
        })
    }

    pub fn squad_owner(&self, id: Uuid) -> Result<Uuid> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT owner_id FROM squads WHERE id = ?1",
                [id.to_string()],
                |r| uuid_col(r, 0),
            )
            .optional()?
            .ok_or(DbError::NotFound("squad"))
        })
    }

    pub fn update_squad(&self, id: Uuid, name: &str, motto: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn
                .execute(
                    "UPDATE squads SET name = ?1, motto = ?2 WHERE id = ?3",
                    rusqlite::params![name, motto, id.to_string()],
                )
                .map_err(DbError::on_unique("squad name already taken"))?;
            if n == 0 {
                return Err(DbError::NotFound("squad"));
            }
            Ok(())
        })
    }

    pub fn delete_squad(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM squads WHERE id = ?1", [id.to_string()])?;
            if n == 0 {
                return Err(DbError::NotFound("squad"));
            }
            Ok(())
        })
    }

    pub fn add_squad_member(&self, squad: Uuid, profile: Uuid) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !profile_exists(&tx, profile)? {
                return Err(DbError::NotFound("profile"));
            }
            tx.execute(
                "INSERT INTO squad_members (squad_id, profile_id, joined_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![squad.to_string(), profile.to_string(), now],
            )
            .map_err(DbError::on_unique("already a member"))?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Removing a non-member is a no-op; the owner cannot be removed.
    pub fn remove_squad_member(&self, squad: Uuid, profile: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let owner: Option<String> = conn
                .query_row(
                    "SELECT owner_id FROM squads WHERE id = ?1",
                    [squad.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            let Some(owner) = owner else {
                return Err(DbError::NotFound("squad"));
            };
            if owner == profile.to_string() {
                return Err(DbError::Conflict("owner cannot leave their squad"));
            }
            conn.execute(
                "DELETE FROM squad_members WHERE squad_id = ?1 AND profile_id = ?2",
                [squad.to_string(), profile.to_string()],
            )?;
            Ok(())
        })
    }
}
