use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use rusqlite::types::ToSql;
use uuid::Uuid;

use hoopers_types::models::{MediaKind, NotificationKind, PostKind};

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{CommentRow, MentionRow, PostRow, enum_col, opt_enum_col, uuid_col};
use crate::pagination::{Keyset, Page, SortOrder, fetch_page};
use crate::queries::notify;

/// Enriched post select: author username, counters and the viewer's like
/// state all come back in one round trip. The first bind is the viewer id.
const POST_SELECT: &str = "SELECT p.id, p.author_id, u.username, p.kind, p.body, \
     p.media_key, p.media_kind, p.created_at, \
     (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id), \
     (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = p.id), \
     (SELECT AVG(r.stars) FROM post_ratings r WHERE r.post_id = p.id), \
     (SELECT COUNT(*) FROM post_ratings r WHERE r.post_id = p.id), \
     EXISTS(SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.profile_id = ?) \
     FROM posts p JOIN users u ON u.id = p.author_id";

fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: uuid_col(row, 0)?,
        author_id: uuid_col(row, 1)?,
        author_username: row.get(2)?,
        kind: enum_col(row, 3)?,
        body: row.get(4)?,
        media_key: row.get(5)?,
        media_kind: opt_enum_col(row, 6)?,
        created_at: row.get(7)?,
        like_count: row.get(8)?,
        comment_count: row.get(9)?,
        rating_average: row.get(10)?,
        rating_count: row.get(11)?,
        liked_by_me: row.get(12)?,
    })
}

fn post_author(conn: &Connection, post_id: Uuid) -> Result<Uuid> {
    conn.query_row(
        "SELECT author_id FROM posts WHERE id = ?1",
        [post_id.to_string()],
        |r| uuid_col(r, 0),
    )
    .optional()?
    .ok_or(DbError::NotFound("post"))
}

impl Database {
    /// Insert a post with its mention rows, notifying each mentioned
    /// profile, all in one transaction.
    pub fn create_post(
        &self,
        id: Uuid,
        author: Uuid,
        kind: PostKind,
        body: &str,
        media_key: Option<&str>,
        media_kind: Option<MediaKind>,
        mentions: &[Uuid],
    ) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO posts (id, author_id, kind, body, media_key, media_kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    author.to_string(),
                    kind.as_str(),
                    body,
                    media_key,
                    media_kind.map(|m| m.as_str()),
                    now
                ],
            )?;
            for &profile_id in mentions {
                tx.execute(
                    "INSERT OR IGNORE INTO post_mentions (post_id, profile_id) VALUES (?1, ?2)",
                    [id.to_string(), profile_id.to_string()],
                )?;
                notify(&tx, profile_id, author, NotificationKind::Mention, Some(id), now)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_post(&self, viewer: Uuid, id: Uuid) -> Result<Option<PostRow>> {
        let viewer_text = viewer.to_string();
        let id_text = id.to_string();
        self.with_conn(|conn| {
            let sql = format!("{POST_SELECT} WHERE p.id = ?");
            let row = conn
                .query_row(&sql, [&viewer_text, &id_text], map_post)
                .optional()?;
            Ok(row)
        })
    }

    /// Reverse-chronological feed, optionally narrowed by kind or author.
    pub fn feed(
        &self,
        viewer: Uuid,
        kind: Option<PostKind>,
        author: Option<Uuid>,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<PostRow>> {
        let viewer_text = viewer.to_string();
        let author_text = author.map(|a| a.to_string());
        let kind_text = kind.map(|k| k.as_str());

        self.with_conn(|conn| {
            let mut filters: Vec<&str> = Vec::new();
            let mut params: Vec<&dyn ToSql> = vec![&viewer_text];
            if let Some(k) = &kind_text {
                filters.push("p.kind = ?");
                params.push(k);
            }
            if let Some(a) = &author_text {
                filters.push("p.author_id = ?");
                params.push(a);
            }
            let filter = filters.join(" AND ");

            fetch_page(
                conn,
                POST_SELECT,
                &filter,
                &params,
                Keyset::new("p.created_at", "p.id", SortOrder::Desc),
                cursor,
                limit,
                map_post,
                |p| (p.created_at, p.id),
            )
        })
    }

    /// Posts that tag the given profile, newest first.
    pub fn mentioned_feed(
        &self,
        viewer: Uuid,
        profile_id: Uuid,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<PostRow>> {
        let viewer_text = viewer.to_string();
        let profile_text = profile_id.to_string();
        self.with_conn(|conn| {
            let base = format!("{POST_SELECT} JOIN post_mentions pm ON pm.post_id = p.id");
            fetch_page(
                conn,
                &base,
                "pm.profile_id = ?",
                &[&viewer_text, &profile_text],
                Keyset::new("p.created_at", "p.id", SortOrder::Desc),
                cursor,
                limit,
                map_post,
                |p| (p.created_at, p.id),
            )
        })
    }

    /// Batch-fetch mention tags for a page of posts.
    pub fn mentions_for_posts(&self, post_ids: &[Uuid]) -> Result<Vec<MentionRow>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=post_ids.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT m.post_id, m.profile_id, u.username
                 FROM post_mentions m JOIN users u ON u.id = m.profile_id
                 WHERE m.post_id IN ({})",
                placeholders.join(", ")
            );
            let id_texts: Vec<String> = post_ids.iter().map(|p| p.to_string()).collect();
            let params: Vec<&dyn ToSql> = id_texts.iter().map(|s| s as &dyn ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(MentionRow {
                        post_id: uuid_col(row, 0)?,
                        profile_id: uuid_col(row, 1)?,
                        username: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Resolve @mention usernames to profile ids; unknown names are
    /// silently dropped.
    pub fn resolve_usernames(&self, names: &[String]) -> Result<Vec<(Uuid, String)>> {
        if names.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT id, username FROM users WHERE username IN ({})",
                placeholders.join(", ")
            );
            let params: Vec<&dyn ToSql> = names.iter().map(|n| n as &dyn ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((uuid_col(row, 0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn post_author(&self, id: Uuid) -> Result<Uuid> {
        self.with_conn(|conn| post_author(conn, id))
    }

    pub fn delete_post(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM posts WHERE id = ?1", [id.to_string()])?;
            if n == 0 {
                return Err(DbError::NotFound("post"));
            }
            Ok(())
        })
    }

    // -- Comments --

    /// Insert a comment and notify the post's author. Returns the insert
    /// timestamp for the response body.
    pub fn add_comment(
        &self,
        id: Uuid,
        post_id: Uuid,
        author: Uuid,
        body: &str,
    ) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let recipient = post_author(&tx, post_id)?;
            tx.execute(
                "INSERT INTO post_comments (id, post_id, author_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id.to_string(), post_id.to_string(), author.to_string(), body, now],
            )?;
            notify(&tx, recipient, author, NotificationKind::Comment, Some(post_id), now)?;
            tx.commit()?;
            Ok(now)
        })
    }

    /// Comments in thread order (oldest first).
    pub fn list_comments(
        &self,
        post_id: Uuid,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<CommentRow>> {
        let post_text = post_id.to_string();
        self.with_conn(|conn| {
            post_author(conn, post_id)?;
            fetch_page(
                conn,
                "SELECT c.id, c.post_id, c.author_id, u.username, c.body, c.created_at
                 FROM post_comments c JOIN users u ON u.id = c.author_id",
                "c.post_id = ?",
                &[&post_text],
                Keyset::new("c.created_at", "c.id", SortOrder::Asc),
                cursor,
                limit,
                |row| {
                    Ok(CommentRow {
                        id: uuid_col(row, 0)?,
                        post_id: uuid_col(row, 1)?,
                        author_id: uuid_col(row, 2)?,
                        author_username: row.get(3)?,
                        body: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
                |c| (c.created_at, c.id),
            )
        })
    }

    /// Comment author and post author, for the delete permission check.
    pub fn comment_parties(&self, id: Uuid) -> Result<(Uuid, Uuid)> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT c.author_id, p.author_id
                 FROM post_comments c JOIN posts p ON p.id = c.post_id
                 WHERE c.id = ?1",
                [id.to_string()],
                |row| Ok((uuid_col(row, 0)?, uuid_col(row, 1)?)),
            )
            .optional()?
            .ok_or(DbError::NotFound("comment"))
        })
    }

    pub fn delete_comment(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM post_comments WHERE id = ?1", [id.to_string()])?;
            if n == 0 {
                return Err(DbError::NotFound("comment"));
            }
            Ok(())
        })
    }

    // -- Likes and ratings --

    /// Toggle the viewer's like: removes if present, inserts (and notifies
    /// the author) if not. Returns the new state and total.
    pub fn toggle_like(&self, post_id: Uuid, profile: Uuid) -> Result<(bool, i64)> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let author = post_author(&tx, post_id)?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM post_likes WHERE post_id = ?1 AND profile_id = ?2",
                    [post_id.to_string(), profile.to_string()],
                    |r| r.get(0),
                )
                .optional()?;

            let liked = if existing.is_some() {
                tx.execute(
                    "DELETE FROM post_likes WHERE post_id = ?1 AND profile_id = ?2",
                    [post_id.to_string(), profile.to_string()],
                )?;
                false
            } else {
                tx.execute(
                    "INSERT INTO post_likes (post_id, profile_id, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![post_id.to_string(), profile.to_string(), now],
                )?;
                notify(&tx, author, profile, NotificationKind::Like, Some(post_id), now)?;
                true
            };

            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
                [post_id.to_string()],
                |r| r.get(0),
            )?;
            tx.commit()?;
            Ok((liked, count))
        })
    }

    /// Upsert the viewer's star rating and return the new aggregate.
    pub fn rate_post(&self, post_id: Uuid, profile: Uuid, stars: i64) -> Result<(f64, i64)> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            post_author(&tx, post_id)?;
            tx.execute(
                "INSERT INTO post_ratings (post_id, profile_id, stars, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (post_id, profile_id) DO UPDATE SET stars = excluded.stars",
                rusqlite::params![post_id.to_string(), profile.to_string(), stars, now],
            )?;
            let (avg, count) = tx.query_row(
                "SELECT AVG(stars), COUNT(*) FROM post_ratings WHERE post_id = ?1",
                [post_id.to_string()],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)?)),
            )?;
            tx.commit()?;
            Ok((avg, count))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{open_test_db, seed_user};

    fn seed_post(db: &Database, author: Uuid, body: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_post(id, author, PostKind::Post, body, None, None, &[])
            .unwrap();
        id
    }

    #[test]
    fn feed_pages_newest_first_with_counters() {
        let (_dir, db) = open_test_db();
        let author = seed_user(&db, "author");
        let fan = seed_user(&db, "fan");
        for i in 0..7 {
            seed_post(&db, author, &format!("post {i}"));
        }

        let first = db.feed(fan, None, None, None, 5).unwrap();
        assert_eq!(first.items.len(), 5);
        assert_eq!(first.items[0].body, "post 6");
        let second = db.feed(fan, None, None, first.next.as_deref(), 5).unwrap();
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.items[1].body, "post 0");
        assert!(second.next.is_none());

        let p = &first.items[0];
        assert_eq!(p.author_username, "author");
        assert_eq!(p.like_count, 0);
        assert!(!p.liked_by_me);
    }

    #[test]
    fn kind_filter_narrows_the_feed() {
        let (_dir, db) = open_test_db();
        let author = seed_user(&db, "blogger");
        db.create_post(Uuid::new_v4(), author, PostKind::Blog, "a blog", None, None, &[])
            .unwrap();
        seed_post(&db, author, "a plain post");

        let page = db
            .feed(author, Some(PostKind::Blog), None, None, 10)
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].kind, PostKind::Blog);
    }

    #[test]
    fn mentions_are_stored_notified_and_listed() {
        let (_dir, db) = open_test_db();
        let author = seed_user(&db, "shooter");
        let tagged = seed_user(&db, "bigman");
        let post = Uuid::new_v4();
        db.create_post(
            post,
            author,
            PostKind::Post,
            "great game @bigman",
            None,
            None,
            &[tagged],
        )
        .unwrap();

        let tags = db.mentions_for_posts(&[post]).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].username, "bigman");

        let mentioned = db.mentioned_feed(tagged, tagged, None, 10).unwrap();
        assert_eq!(mentioned.items.len(), 1);
        assert_eq!(mentioned.items[0].id, post);

        let notes = db.list_notifications(tagged, false, None, 10).unwrap();
        assert_eq!(notes.items.len(), 1);
        assert_eq!(notes.items[0].kind, NotificationKind::Mention);
    }

    #[test]
    fn resolve_usernames_drops_unknown_names() {
        let (_dir, db) = open_test_db();
        let known = seed_user(&db, "known");
        let resolved = db
            .resolve_usernames(&["known".into(), "ghost".into()])
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].0, known);
    }

    #[test]
    fn like_toggles_and_notifies_once() {
        let (_dir, db) = open_test_db();
        let author = seed_user(&db, "poster");
        let fan = seed_user(&db, "fan");
        let post = seed_post(&db, author, "dunk mix");

        assert_eq!(db.toggle_like(post, fan).unwrap(), (true, 1));
        let enriched = db.get_post(fan, post).unwrap().unwrap();
        assert!(enriched.liked_by_me);

        assert_eq!(db.toggle_like(post, fan).unwrap(), (false, 0));
        // Un-liking does not retract the original notification.
        let notes = db.list_notifications(author, false, None, 10).unwrap();
        assert_eq!(notes.items.len(), 1);
    }

    #[test]
    fn rating_upserts_per_profile() {
        let (_dir, db) = open_test_db();
        let author = seed_user(&db, "poster");
        let viewer = seed_user(&db, "viewer");
        let post = seed_post(&db, author, "mixtape");

        assert_eq!(db.rate_post(post, viewer, 5).unwrap(), (5.0, 1));
        assert_eq!(db.rate_post(post, viewer, 3).unwrap(), (3.0, 1));
        assert_eq!(db.rate_post(post, author, 5).unwrap(), (4.0, 2));
    }

    #[test]
    fn comment_flow_and_permissions_data() {
        let (_dir, db) = open_test_db();
        let author = seed_user(&db, "op");
        let commenter = seed_user(&db, "replyguy");
        let post = seed_post(&db, author, "thoughts?");
        let comment = Uuid::new_v4();
        db.add_comment(comment, post, commenter, "hot take").unwrap();

        let page = db.list_comments(post, None, 10).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].author_username, "replyguy");

        let (c_author, p_author) = db.comment_parties(comment).unwrap();
        assert_eq!((c_author, p_author), (commenter, author));

        let missing = db.add_comment(Uuid::new_v4(), Uuid::new_v4(), commenter, "x");
        assert!(matches!(missing.unwrap_err(), DbError::NotFound("post")));
    }

    #[test]
    fn deleting_a_post_takes_comments_and_likes_with_it() {
        let (_dir, db) = open_test_db();
        let author = seed_user(&db, "op");
        let fan = seed_user(&db, "fan");
        let post = seed_post(&db, author, "soon gone");
        db.add_comment(Uuid::new_v4(), post, fan, "rip").unwrap();
        db.toggle_like(post, fan).unwrap();

        db.delete_post(post).unwrap();
        assert!(db.get_post(fan, post).unwrap().is_none());
        assert!(matches!(
            db.list_comments(post, None, 10).unwrap_err(),
            DbError::NotFound("post")
        ));
    }
}
