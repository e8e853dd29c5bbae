use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use rusqlite::types::ToSql;
use uuid::Uuid;

use hoopers_types::models::{InviteStatus, NotificationKind, RunStatus, RunSort};

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{ProfileSummaryRow, RunInviteRow, RunRow, enum_col, uuid_col};
use crate::pagination::{Keyset, Page, SortOrder, fetch_page};
use crate::queries::{notify, profile_exists};

const RUN_SELECT: &str = "SELECT r.id, r.host_id, u.username, r.court_id, c.name, \
     r.title, r.scheduled_at, r.status, r.max_players, \
     (SELECT COUNT(*) FROM run_invites i WHERE i.run_id = r.id AND i.status = 'accepted'), \
     r.created_at \
     FROM runs r JOIN users u ON u.id = r.host_id JOIN courts c ON c.id = r.court_id";

fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        id: uuid_col(row, 0)?,
        host_id: uuid_col(row, 1)?,
        host_username: row.get(2)?,
        court_id: uuid_col(row, 3)?,
        court_name: row.get(4)?,
        title: row.get(5)?,
        scheduled_at: row.get(6)?,
        status: enum_col(row, 7)?,
        max_players: row.get(8)?,
        accepted_count: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn run_meta(conn: &Connection, id: Uuid) -> Result<(Uuid, RunStatus)> {
    conn.query_row(
        "SELECT host_id, status FROM runs WHERE id = ?1",
        [id.to_string()],
        |row| Ok((uuid_col(row, 0)?, enum_col::<RunStatus>(row, 1)?)),
    )
    .optional()?
    .ok_or(DbError::NotFound("run"))
}

impl Database {
    /// Create a run; the host joins their own roster as accepted, so
    /// `accepted_count` starts at one.
    pub fn create_run(
        &self,
        id: Uuid,
        host: Uuid,
        court_id: Uuid,
        title: &str,
        scheduled_at: DateTime<Utc>,
        max_players: i64,
    ) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let court_known: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM courts WHERE id = ?1)",
                [court_id.to_string()],
                |r| r.get(0),
            )?;
            if !court_known {
                return Err(DbError::NotFound("court"));
            }
            tx.execute(
                "INSERT INTO runs (id, host_id, court_id, title, scheduled_at, max_players, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    host.to_string(),
                    court_id.to_string(),
                    title,
                    scheduled_at,
                    max_players,
                    now
                ],
            )?;
            tx.execute(
                "INSERT INTO run_invites (run_id, profile_id, status, invited_at, responded_at)
                 VALUES (?1, ?2, 'accepted', ?3, ?3)",
                rusqlite::params![id.to_string(), host.to_string(), now],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_run(&self, id: Uuid) -> Result<Option<RunRow>> {
        let id_text = id.to_string();
        self.with_conn(|conn| {
            let sql = format!("{RUN_SELECT} WHERE r.id = ?");
            let row = conn.query_row(&sql, [&id_text], map_run).optional()?;
            Ok(row)
        })
    }

    /// Full roster for one run, host first, then by invite time.
    pub fn run_roster(&self, id: Uuid) -> Result<Vec<RunInviteRow>> {
        let id_text = id.to_string();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, u.username, p.display_name, p.points, p.player_number,
                        p.avatar_key, i.status, i.responded_at
                 FROM run_invites i
                 JOIN profiles p ON p.id = i.profile_id
                 JOIN users u ON u.id = p.id
                 WHERE i.run_id = ?1
                 ORDER BY i.invited_at ASC, i.profile_id ASC",
            )?;
            let rows = stmt
                .query_map([&id_text], |row| {
                    Ok(RunInviteRow {
                        profile: ProfileSummaryRow::from_row(row, 0)?,
                        status: enum_col(row, 6)?,
                        responded_at: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn list_runs(
        &self,
        sort: RunSort,
        status: Option<RunStatus>,
        court: Option<Uuid>,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<RunRow>> {
        let status_text = status.map(|s| s.as_str());
        let court_text = court.map(|c| c.to_string());
        self.with_conn(|conn| {
            let mut filters: Vec<&str> = Vec::new();
            let mut params: Vec<&dyn ToSql> = Vec::new();
            if let Some(s) = &status_text {
                filters.push("r.status = ?");
                params.push(s);
            }
            if let Some(c) = &court_text {
                filters.push("r.court_id = ?");
                params.push(c);
            }
            let filter = filters.join(" AND ");

            match sort {
                RunSort::ScheduledAt => fetch_page(
                    conn,
                    RUN_SELECT,
                    &filter,
                    &params,
                    Keyset::new("r.scheduled_at", "r.id", SortOrder::Asc),
                    cursor,
                    limit,
                    map_run,
                    |r| (r.scheduled_at, r.id),
                ),
                RunSort::Status => fetch_page(
                    conn,
                    RUN_SELECT,
                    &filter,
                    &params,
                    Keyset::new("r.status", "r.id", SortOrder::Asc),
                    cursor,
                    limit,
                    map_run,
                    |r| (r.status.as_str().to_string(), r.id),
                ),
            }
        })
    }

    /// Runs the profile has accepted, soonest first. Hosts sit on their own
    /// roster as accepted, so hosted runs show up here too.
    pub fn runs_for_profile(
        &self,
        profile: Uuid,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<RunRow>> {
        let profile_text = profile.to_string();
        self.with_conn(|conn| {
            if !profile_exists(conn, profile)? {
                return Err(DbError::NotFound("profile"));
            }
            fetch_page(
                conn,
                RUN_SELECT,
                "EXISTS(SELECT 1 FROM run_invites i
                        WHERE i.run_id = r.id AND i.profile_id = ? AND i.status = 'accepted')",
                &[&profile_text],
                Keyset::new("r.scheduled_at", "r.id", SortOrder::Asc),
                cursor,
                limit,
                map_run,
                |r| (r.scheduled_at, r.id),
            )
        })
    }

    pub fn run_host_and_status(&self, id: Uuid) -> Result<(Uuid, RunStatus)> {
        self.with_conn(|conn| run_meta(conn, id))
    }

    /// Host-side patch; status moves are validated by the caller against
    /// the lifecycle table before they land here.
    pub fn update_run(
        &self,
        id: Uuid,
        title: Option<&str>,
        scheduled_at: Option<DateTime<Utc>>,
        max_players: Option<i64>,
        status: Option<RunStatus>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE runs SET
                     title        = COALESCE(?1, title),
                     scheduled_at = COALESCE(?2, scheduled_at),
                     max_players  = COALESCE(?3, max_players),
                     status       = COALESCE(?4, status)
                 WHERE id = ?5",
                rusqlite::params![
                    title,
                    scheduled_at,
                    max_players,
                    status.map(|s| s.as_str()),
                    id.to_string()
                ],
            )?;
            if n == 0 {
                return Err(DbError::NotFound("run"));
            }
            Ok(())
        })
    }

    pub fn delete_run(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM runs WHERE id = ?1", [id.to_string()])?;
            if n == 0 {
                return Err(DbError::NotFound("run"));
            }
            Ok(())
        })
    }

    /// Invite a profile to a run that is still in its scheduled window.
    /// Re-inviting someone already on the roster is a conflict.
    pub fn invite_to_run(&self, run_id: Uuid, host: Uuid, profile: Uuid) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let (_, status) = run_meta(&tx, run_id)?;
            if status != RunStatus::Scheduled {
                return Err(DbError::Conflict("run is no longer taking invites"));
            }
            if !profile_exists(&tx, profile)? {
                return Err(DbError::NotFound("profile"));
            }
            tx.execute(
                "INSERT INTO run_invites (run_id, profile_id, status, invited_at)
                 VALUES (?1, ?2, 'invited', ?3)",
                rusqlite::params![run_id.to_string(), profile.to_string(), now],
            )
            .map_err(DbError::on_unique("already on the roster"))?;
            notify(&tx, profile, host, NotificationKind::RunInvite, Some(run_id), now)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// RSVP to an invite. Accepting checks capacity inside the same
    /// transaction, so a full run cannot be oversubscribed by a race.
    pub fn rsvp(&self, run_id: Uuid, profile: Uuid, answer: InviteStatus) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let (_, status) = run_meta(&tx, run_id)?;
            if status != RunStatus::Scheduled {
                return Err(DbError::Conflict("run is no longer taking rsvps"));
            }
            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM run_invites WHERE run_id = ?1 AND profile_id = ?2",
                    [run_id.to_string(), profile.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            if current.is_none() {
                return Err(DbError::NotFound("invite"));
            }

            if answer == InviteStatus::Accepted {
                let (accepted, max_players): (i64, i64) = tx.query_row(
                    "SELECT (SELECT COUNT(*) FROM run_invites
                             WHERE run_id = ?1 AND status = 'accepted' AND profile_id != ?2),
                            max_players
                     FROM runs WHERE id = ?1",
                    [run_id.to_string(), profile.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                if accepted >= max_players {
                    return Err(DbError::Conflict("run is full"));
                }
            }

            tx.execute(
                "UPDATE run_invites SET status = ?1, responded_at = ?2
                 WHERE run_id = ?3 AND profile_id = ?4",
                rusqlite::params![answer.as_str(), now, run_id.to_string(), profile.to_string()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}
