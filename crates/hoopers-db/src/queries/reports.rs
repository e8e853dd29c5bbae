use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{ScoutingReportRow, ScoutingSummaryRow, uuid_col};
use crate::pagination::{Keyset, Page, SortOrder, fetch_page};
use crate::queries::profile_exists;

const REPORT_SELECT: &str = "SELECT r.id, r.subject_id, r.scout_id, u.username, r.shooting,
        r.passing, r.defense, r.athleticism, r.summary, r.created_at
 FROM scouting_reports r JOIN users u ON u.id = r.scout_id";

fn map_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScoutingReportRow> {
    Ok(ScoutingReportRow {
        id: uuid_col(row, 0)?,
        subject_id: uuid_col(row, 1)?,
        scout_id: uuid_col(row, 2)?,
        scout_username: row.get(3)?,
        shooting: row.get(4)?,
        passing: row.get(5)?,
        defense: row.get(6)?,
        athleticism: row.get(7)?,
        summary: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl Database {
    /// File a scouting report on a player. One report per scout/subject
    /// pair; filing again replaces the earlier evaluation (the row keeps
    /// its original id) and bumps it to the top of the listing.
    #[allow(clippy::too_many_arguments)]
    pub fn create_report(
        &self,
        id: Uuid,
        subject: Uuid,
        scout: Uuid,
        shooting: i64,
        passing: i64,
        defense: i64,
        athleticism: i64,
        summary: &str,
    ) -> Result<ScoutingReportRow> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !profile_exists(&tx, subject)? {
                return Err(DbError::NotFound("profile"));
            }
            tx.execute(
                "INSERT INTO scouting_reports
                     (id, subject_id, scout_id, shooting, passing, defense, athleticism,
                      summary, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(subject_id, scout_id) DO UPDATE SET
                     shooting = excluded.shooting,
                     passing = excluded.passing,
                     defense = excluded.defense,
                     athleticism = excluded.athleticism,
                     summary = excluded.summary,
                     created_at = excluded.created_at",
                rusqlite::params![
                    id.to_string(),
                    subject.to_string(),
                    scout.to_string(),
                    shooting,
                    passing,
                    defense,
                    athleticism,
                    summary,
                    now
                ],
            )?;
            let row = tx.query_row(
                &format!("{REPORT_SELECT} WHERE r.subject_id = ?1 AND r.scout_id = ?2"),
                [subject.to_string(), scout.to_string()],
                map_report,
            )?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Reports filed on one player, newest first.
    pub fn reports_on(
        &self,
        subject: Uuid,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<ScoutingReportRow>> {
        let subject_text = subject.to_string();
        self.with_conn(|conn| {
            if !profile_exists(conn, subject)? {
                return Err(DbError::NotFound("profile"));
            }
            fetch_page(
                conn,
                REPORT_SELECT,
                "r.subject_id = ?",
                &[&subject_text],
                Keyset::new("r.created_at", "r.id", SortOrder::Desc),
                cursor,
                limit,
                map_report,
                |r| (r.created_at, r.id),
            )
        })
    }

    /// Skill averages across every report on the subject.
    pub fn report_summary(&self, subject: Uuid) -> Result<ScoutingSummaryRow> {
        self.with_conn(|conn| {
            if !profile_exists(conn, subject)? {
                return Err(DbError::NotFound("profile"));
            }
            let row = conn.query_row(
                "SELECT AVG(shooting), AVG(passing), AVG(defense), AVG(athleticism), COUNT(*)
                 FROM scouting_reports WHERE subject_id = ?1",
                [subject.to_string()],
                |row| {
                    Ok(ScoutingSummaryRow {
                        shooting: row.get(0)?,
                        passing: row.get(1)?,
                        defense: row.get(2)?,
                        athleticism: row.get(3)?,
                        report_count: row.get(4)?,
                    })
                },
            )?;
            Ok(row)
        })
    }

    pub fn report_scout(&self, id: Uuid) -> Result<Uuid> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT scout_id FROM scouting_reports WHERE id = ?1",
                [id.to_string()],
                |r| uuid_col(r, 0),
            )
            .optional()?
            .ok_or(DbError::NotFound("report"))
        })
    }

    pub fn delete_report(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM scouting_reports WHERE id = ?1",
                [id.to_string()],
            )?;
            if n == 0 {
                return Err(DbError::NotFound("report"));
            }
            Ok(())
        })
    }
}
