use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::ToSql;
use uuid::Uuid;

use hoopers_types::models::NotificationKind;

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{NotificationRow, PushSubscriptionRow, enum_col, opt_uuid_col, uuid_col};
use crate::pagination::{Keyset, Page, SortOrder, fetch_page};

/// Queue a notification inside the caller's transaction. Self-notifies
/// (actor == recipient) are dropped here so every call site gets the same
/// rule for free.
pub(crate) fn notify(
    conn: &Connection,
    recipient: Uuid,
    actor: Uuid,
    kind: NotificationKind,
    subject: Option<Uuid>,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    if recipient == actor {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO notifications (id, profile_id, kind, actor_id, subject_id, read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            recipient.to_string(),
            kind.as_str(),
            actor.to_string(),
            subject.map(|s| s.to_string()),
            now
        ],
    )?;
    Ok(())
}

impl Database {
    /// The profile's inbox, newest first.
    pub fn list_notifications(
        &self,
        profile: Uuid,
        unread_only: bool,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<NotificationRow>> {
        let profile_text = profile.to_string();
        self.with_conn(|conn| {
            let filter = if unread_only {
                "n.profile_id = ? AND n.read = 0"
            } else {
                "n.profile_id = ?"
            };
            let params: Vec<&dyn ToSql> = vec![&profile_text];
            fetch_page(
                conn,
                "SELECT n.id, n.kind, n.actor_id, u.username, n.subject_id, n.read, n.created_at
                 FROM notifications n JOIN users u ON u.id = n.actor_id",
                filter,
                &params,
                Keyset::new("n.created_at", "n.id", SortOrder::Desc),
                cursor,
                limit,
                |row| {
                    Ok(NotificationRow {
                        id: uuid_col(row, 0)?,
                        kind: enum_col(row, 1)?,
                        actor_id: uuid_col(row, 2)?,
                        actor_username: row.get(3)?,
                        subject_id: opt_uuid_col(row, 4)?,
                        read: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
                |n| (n.created_at, n.id),
            )
        })
    }

    /// Mark one of the profile's notifications read. Someone else's
    /// notification id is indistinguishable from a missing one.
    pub fn mark_notification_read(&self, id: Uuid, profile: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND profile_id = ?2",
                [id.to_string(), profile.to_string()],
            )?;
            if n == 0 {
                return Err(DbError::NotFound("notification"));
            }
            Ok(())
        })
    }

    /// Returns how many were flipped.
    pub fn mark_all_notifications_read(&self, profile: Uuid) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET read = 1 WHERE profile_id = ?1 AND read = 0",
                [profile.to_string()],
            )?;
            Ok(n as i64)
        })
    }

    /// Deleting an already-gone notification is a no-op.
    pub fn delete_notification(&self, id: Uuid, profile: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND profile_id = ?2",
                [id.to_string(), profile.to_string()],
            )?;
            Ok(())
        })
    }

    /// Background maintenance: drop read notifications older than the
    /// cutoff. Returns how many were removed.
    pub fn prune_notifications(&self, before: DateTime<Utc>) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM notifications WHERE read = 1 AND created_at < ?1",
                [before],
            )?;
            Ok(n as i64)
        })
    }

    // -- Push subscriptions --

    /// Register a browser push endpoint. Re-registering the same endpoint
    /// refreshes its keys instead of erroring, since clients re-subscribe
    /// on every page load.
    pub fn upsert_push_subscription(
        &self,
        profile: Uuid,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO push_subscriptions (profile_id, endpoint, p256dh, auth, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (profile_id, endpoint)
                 DO UPDATE SET p256dh = excluded.p256dh, auth = excluded.auth",
                rusqlite::params![profile.to_string(), endpoint, p256dh, auth, now],
            )?;
            Ok(())
        })
    }

    pub fn list_push_subscriptions(&self, profile: Uuid) -> Result<Vec<PushSubscriptionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT endpoint, p256dh, auth, created_at
                 FROM push_subscriptions WHERE profile_id = ?1
                 ORDER BY created_at ASC",
            )?;
            let rows = stmt
                .query_map([profile.to_string()], |row| {
                    Ok(PushSubscriptionRow {
                        endpoint: row.get(0)?,
                        p256dh: row.get(1)?,
                        auth: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Removing an unknown endpoint is a no-op; expired endpoints get
    /// cleaned up by clients long after the server forgot them.
    pub fn remove_push_subscription(&self, profile: Uuid, endpoint: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM push_subscriptions WHERE profile_id = ?1 AND endpoint = ?2",
                [&profile.to_string(), &endpoint.to_string()],
            )?;
            Ok(())
        })
    }
}
