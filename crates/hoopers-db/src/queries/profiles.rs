use chrono::Utc;
use rusqlite::OptionalExtension;
use rusqlite::types::ToSql;
use uuid::Uuid;

use hoopers_types::models::{NotificationKind, ProfileSort};

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{FollowEntryRow, ProfileRow, ProfileSummaryRow, uuid_col};
use crate::pagination::{Keyset, Page, SortOrder, fetch_page};
use crate::queries::{notify, profile_exists};

const SUMMARY_SELECT: &str = "SELECT p.id, u.username, p.display_name, p.points, \
     p.player_number, p.avatar_key \
     FROM profiles p JOIN users u ON u.id = p.id";

impl Database {
    pub fn get_profile(&self, id: Uuid) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT p.id, u.username, p.display_name, p.bio, p.position,
                            p.player_number, p.points, p.city, p.avatar_key,
                            (SELECT COUNT(*) FROM follows f WHERE f.followee_id = p.id),
                            (SELECT COUNT(*) FROM follows f WHERE f.follower_id = p.id),
                            (SELECT COUNT(*) FROM posts ps WHERE ps.author_id = p.id),
                            p.created_at, p.updated_at
                     FROM profiles p JOIN users u ON u.id = p.id
                     WHERE p.id = ?1",
                    [id.to_string()],
                    |row| {
                        Ok(ProfileRow {
                            id: uuid_col(row, 0)?,
                            username: row.get(1)?,
                            display_name: row.get(2)?,
                            bio: row.get(3)?,
                            position: row.get(4)?,
                            player_number: row.get(5)?,
                            points: row.get(6)?,
                            city: row.get(7)?,
                            avatar_key: row.get(8)?,
                            followers: row.get(9)?,
                            following: row.get(10)?,
                            posts: row.get(11)?,
                            created_at: row.get(12)?,
                            updated_at: row.get(13)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Partial update: NULL binds keep the current value via COALESCE.
    #[allow(clippy::too_many_arguments)]
    pub fn update_profile(
        &self,
        id: Uuid,
        display_name: Option<&str>,
        bio: Option<&str>,
        position: Option<&str>,
        player_number: Option<i64>,
        city: Option<&str>,
        avatar_key: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE profiles SET
                     display_name  = COALESCE(?1, display_name),
                     bio           = COALESCE(?2, bio),
                     position      = COALESCE(?3, position),
                     player_number = COALESCE(?4, player_number),
                     city          = COALESCE(?5, city),
                     avatar_key    = COALESCE(?6, avatar_key),
                     updated_at    = ?7
                 WHERE id = ?8",
                rusqlite::params![
                    display_name,
                    bio,
                    position,
                    player_number,
                    city,
                    avatar_key,
                    now,
                    id.to_string()
                ],
            )?;
            if n == 0 {
                return Err(DbError::NotFound("profile"));
            }
            Ok(())
        })
    }

    pub fn list_profiles(
        &self,
        sort: ProfileSort,
        city: Option<&str>,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<ProfileSummaryRow>> {
        self.with_conn(|conn| {
            let mut params: Vec<&dyn ToSql> = Vec::new();
            let filter = if let Some(c) = &city {
                params.push(c);
                "p.city = ?"
            } else {
                ""
            };
            let map = |row: &rusqlite::Row<'_>| ProfileSummaryRow::from_row(row, 0);

            match sort {
                ProfileSort::Points => fetch_page(
                    conn,
                    SUMMARY_SELECT,
                    filter,
                    &params,
                    Keyset::new("p.points", "p.id", SortOrder::Desc),
                    cursor,
                    limit,
                    map,
                    |p| (p.points, p.id),
                ),
                ProfileSort::PlayerNumber => fetch_page(
                    conn,
                    SUMMARY_SELECT,
                    filter,
                    &params,
                    Keyset::new("p.player_number", "p.id", SortOrder::Asc),
                    cursor,
                    limit,
                    map,
                    |p| (p.player_number, p.id),
                ),
                ProfileSort::Username => fetch_page(
                    conn,
                    SUMMARY_SELECT,
                    filter,
                    &params,
                    Keyset::new("u.username", "p.id", SortOrder::Asc),
                    cursor,
                    limit,
                    map,
                    |p| (p.username.clone(), p.id),
                ),
            }
        })
    }

    /// Follow and notify in one transaction. Double follow is a conflict.
    pub fn follow(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !profile_exists(&tx, followee)? {
                return Err(DbError::NotFound("profile"));
            }
            tx.execute(
                "INSERT INTO follows (follower_id, followee_id, created_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![follower.to_string(), followee.to_string(), now],
            )
            .map_err(DbError::on_unique("already following"))?;
            notify(&tx, followee, follower, NotificationKind::Follow, None, now)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Unfollowing someone you don't follow is a no-op.
    pub fn unfollow(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                [follower.to_string(), followee.to_string()],
            )?;
            Ok(())
        })
    }

    pub fn followers(&self, of: Uuid, cursor: Option<&str>, limit: u32) -> Result<Page<FollowEntryRow>> {
        self.follow_edge_page(of, "f.followee_id", "f.follower_id", cursor, limit)
    }

    pub fn following(&self, of: Uuid, cursor: Option<&str>, limit: u32) -> Result<Page<FollowEntryRow>> {
        self.follow_edge_page(of, "f.follower_id", "f.followee_id", cursor, limit)
    }

    /// Both follower and followee listings walk the `follows` table from
    /// one side; only which column anchors and which joins out differs.
    fn follow_edge_page(
        &self,
        of: Uuid,
        anchor_col: &'static str,
        other_col: &'static str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<FollowEntryRow>> {
        let of_text = of.to_string();
        self.with_conn(|conn| {
            if !profile_exists(conn, of)? {
                return Err(DbError::NotFound("profile"));
            }
            let base = format!(
                "SELECT p.id, u.username, p.display_name, p.points, p.player_number, \
                 p.avatar_key, f.created_at \
                 FROM follows f \
                 JOIN profiles p ON p.id = {other_col} \
                 JOIN users u ON u.id = p.id"
            );
            let filter = format!("{anchor_col} = ?");
            fetch_page(
                conn,
                &base,
                &filter,
                &[&of_text],
                Keyset::new("f.created_at", other_col, SortOrder::Desc),
                cursor,
                limit,
                |row| {
                    Ok(FollowEntryRow {
                        profile: ProfileSummaryRow::from_row(row, 0)?,
                        followed_at: row.get(6)?,
                    })
                },
                |e| (e.followed_at, e.profile.id),
            )
        })
    }
}
