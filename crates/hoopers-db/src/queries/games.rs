use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use rusqlite::types::ToSql;
use uuid::Uuid;

use hoopers_types::models::Team;

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{GamePlayerRow, GameRow, enum_col, opt_uuid_col, uuid_col};
use crate::pagination::{Keyset, Page, SortOrder, fetch_page};

/// Points credited to each participant when a game is recorded.
pub const WIN_POINTS: i64 = 30;
pub const LOSS_POINTS: i64 = 10;
pub const DRAW_POINTS: i64 = 15;

const GAME_SELECT: &str = "SELECT id, run_id, court_id, recorded_by, played_at, \
     team_a_score, team_b_score, notes, created_at FROM games";

const PLAYER_SELECT: &str = "SELECT gp.game_id, gp.profile_id, u.username, gp.team, \
     gp.points_scored FROM game_players gp JOIN users u ON u.id = gp.profile_id";

fn map_player(row: &rusqlite::Row<'_>) -> rusqlite::Result<GamePlayerRow> {
    Ok(GamePlayerRow {
        game_id: uuid_col(row, 0)?,
        profile_id: uuid_col(row, 1)?,
        username: row.get(2)?,
        team: enum_col(row, 3)?,
        points_scored: row.get(4)?,
    })
}

fn map_game(row: &rusqlite::Row<'_>) -> rusqlite::Result<GameRow> {
    Ok(GameRow {
        id: uuid_col(row, 0)?,
        run_id: opt_uuid_col(row, 1)?,
        court_id: uuid_col(row, 2)?,
        recorded_by: opt_uuid_col(row, 3)?,
        played_at: row.get(4)?,
        team_a_score: row.get(5)?,
        team_b_score: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Per-team credit for a final score, from the crediting side's view.
fn credit(own: i64, other: i64) -> i64 {
    if own > other {
        WIN_POINTS
    } else if own < other {
        LOSS_POINTS
    } else {
        DRAW_POINTS
    }
}

impl Database {
    /// Record a finished game: the game row, every participant's line, and
    /// the points credit to each profile land in one transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn record_game(
        &self,
        id: Uuid,
        recorded_by: Uuid,
        run_id: Option<Uuid>,
        court_id: Uuid,
        played_at: DateTime<Utc>,
        team_a_score: i64,
        team_b_score: i64,
        notes: Option<&str>,
        players: &[(Uuid, Team, i64)],
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
            if let Some(run) = run_id {
                let run_known: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM runs WHERE id = ?1)",
                    [run.to_string()],
                    |r| r.get(0),
                )?;
                if !run_known {
                    return Err(DbError::NotFound("run"));
                }
            }
            if !players.is_empty() {
                let placeholders: Vec<String> =
                    (1..=players.len()).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "SELECT COUNT(*) FROM profiles WHERE id IN ({})",
                    placeholders.join(", ")
                );
                let id_texts: Vec<String> =
                    players.iter().map(|(p, _, _)| p.to_string()).collect();
                let params: Vec<&dyn ToSql> =
                    id_texts.iter().map(|s| s as &dyn ToSql).collect();
                let known: i64 = tx.query_row(&sql, params.as_slice(), |r| r.get(0))?;
                if known != players.len() as i64 {
                    return Err(DbError::NotFound("profile"));
                }
            }

            tx.execute(
                "INSERT INTO games (id, run_id, court_id, recorded_by, played_at,
                                    team_a_score, team_b_score, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    id.to_string(),
                    run_id.map(|r| r.to_string()),
                    court_id.to_string(),
                    recorded_by.to_string(),
                    played_at,
                    team_a_score,
                    team_b_score,
                    notes,
                    now
                ],
            )?;

            for (profile, team, scored) in players {
                tx.execute(
                    "INSERT INTO game_players (game_id, profile_id, team, points_scored)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id.to_string(), profile.to_string(), team.as_str(), scored],
                )
                .map_err(DbError::on_unique("player listed twice"))?;

                let earned = match team {
                    Team::A => credit(team_a_score, team_b_score),
                    Team::B => credit(team_b_score, team_a_score),
                };
                tx.execute(
                    "UPDATE profiles SET points = points + ?1 WHERE id = ?2",
                    rusqlite::params![earned, profile.to_string()],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_game(&self, id: Uuid) -> Result<Option<(GameRow, Vec<GamePlayerRow>)>> {
        let id_text = id.to_string();
        self.with_conn(|conn| {
            let sql = format!("{GAME_SELECT} WHERE id = ?1");
            let game = conn.query_row(&sql, [&id_text], map_game).optional()?;
            let Some(game) = game else { return Ok(None) };

            let mut stmt = conn.prepare(&format!(
                "{PLAYER_SELECT} WHERE gp.game_id = ?1 ORDER BY gp.team ASC, gp.points_scored DESC"
            ))?;
            let players = stmt
                .query_map([&id_text], map_player)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Some((game, players)))
        })
    }

    /// Player lines for a whole page of games in one query.
    pub fn players_for_games(&self, game_ids: &[Uuid]) -> Result<Vec<GamePlayerRow>> {
        if game_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=game_ids.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "{PLAYER_SELECT} WHERE gp.game_id IN ({})
                 ORDER BY gp.game_id, gp.team ASC, gp.points_scored DESC",
                placeholders.join(", ")
            );
            let id_texts: Vec<String> = game_ids.iter().map(|g| g.to_string()).collect();
            let params: Vec<&dyn ToSql> = id_texts.iter().map(|s| s as &dyn ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), map_player)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Latest games, optionally narrowed to one court or one run.
    pub fn list_games(
        &self,
        court: Option<Uuid>,
        run: Option<Uuid>,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<GameRow>> {
        let court_text = court.map(|c| c.to_string());
        let run_text = run.map(|r| r.to_string());
        self.with_conn(|conn| {
            let mut filters: Vec<&str> = Vec::new();
            let mut params: Vec<&dyn ToSql> = Vec::new();
            if let Some(c) = &court_text {
                filters.push("court_id = ?");
                params.push(c);
            }
            if let Some(r) = &run_text {
                filters.push("run_id = ?");
                params.push(r);
            }
            let filter = filters.join(" AND ");
            fetch_page(
                conn,
                GAME_SELECT,
                &filter,
                &params,
                Keyset::new("played_at", "id", SortOrder::Desc),
                cursor,
                limit,
                map_game,
                |g| (g.played_at, g.id),
            )
        })
    }

    /// A profile's game log, latest first.
    pub fn games_for_profile(
        &self,
        profile: Uuid,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<GameRow>> {
        let profile_text = profile.to_string();
        self.with_conn(|conn| {
            fetch_page(
                conn,
                GAME_SELECT,
                "EXISTS(SELECT 1 FROM game_players gp
                        WHERE gp.game_id = games.id AND gp.profile_id = ?)",
                &[&profile_text],
                Keyset::new("played_at", "id", SortOrder::Desc),
                cursor,
                limit,
                map_game,
                |g| (g.played_at, g.id),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{open_test_db, seed_court, seed_user};

    #[test]
    fn recording_a_game_credits_points_by_result() {
        let (_dir, db) = open_test_db();
        let rec = seed_user(&db, "scorekeeper");
        let winner = seed_user(&db, "winner");
        let loser = seed_user(&db, "loser");
        let court = seed_court(&db, rec, "Court", "NYC");

        db.record_game(
            Uuid::new_v4(),
            rec,
            None,
            court,
            Utc::now(),
            21,
            15,
            Some("first to 21"),
            &[(winner, Team::A, 12), (loser, Team::B, 9)],
        )
        .unwrap();

        assert_eq!(db.get_profile(winner).unwrap().unwrap().points, WIN_POINTS);
        assert_eq!(db.get_profile(loser).unwrap().unwrap().points, LOSS_POINTS);
    }

    #[test]
    fn draws_credit_both_sides_equally() {
        let (_dir, db) = open_test_db();
        let rec = seed_user(&db, "scorekeeper");
        let a = seed_user(&db, "a");
        let b = seed_user(&db, "b");
        let court = seed_court(&db, rec, "Court", "NYC");

        db.record_game(
            Uuid::new_v4(),
            rec,
            None,
            court,
            Utc::now(),
            11,
            11,
            None,
            &[(a, Team::A, 11), (b, Team::B, 11)],
        )
        .unwrap();

        assert_eq!(db.get_profile(a).unwrap().unwrap().points, DRAW_POINTS);
        assert_eq!(db.get_profile(b).unwrap().unwrap().points, DRAW_POINTS);
    }

    #[test]
    fn unknown_player_aborts_the_whole_recording() {
        let (_dir, db) = open_test_db();
        let rec = seed_user(&db, "scorekeeper");
        let known = seed_user(&db, "known");
        let court = seed_court(&db, rec, "Court", "NYC");

        let err = db
            .record_game(
                Uuid::new_v4(),
                rec,
                None,
                court,
                Utc::now(),
                21,
                10,
                None,
                &[(known, Team::A, 21), (Uuid::new_v4(), Team::B, 10)],
            )
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound("profile")));

        // Nothing was written, including the winner's points.
        assert_eq!(db.get_profile(known).unwrap().unwrap().points, 0);
        assert_eq!(db.list_games(None, None, None, 10).unwrap().items.len(), 0);
    }

    #[test]
    fn game_log_follows_the_player() {
        let (_dir, db) = open_test_db();
        let rec = seed_user(&db, "scorekeeper");
        let player = seed_user(&db, "iron-man");
        let court = seed_court(&db, rec, "Court", "NYC");

        for i in 0..3 {
            db.record_game(
                Uuid::new_v4(),
                rec,
                None,
                court,
                Utc::now(),
                21,
                i,
                None,
                &[(player, Team::A, 21)],
            )
            .unwrap();
        }

        let log = db.games_for_profile(player, None, 2).unwrap();
        assert_eq!(log.items.len(), 2);
        assert!(log.next.is_some());
        let (game, players) = db.get_game(log.items[0].id).unwrap().unwrap();
        assert_eq!(game.team_a_score, 21);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].username, "iron-man");

        // One line per page row from the batch lookup.
        let ids: Vec<Uuid> = log.items.iter().map(|g| g.id).collect();
        let lines = db.players_for_games(&ids).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| ids.contains(&l.game_id)));
    }
}
