use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{UserRow, uuid_col};

impl Database {
    /// Create the user and their profile in one transaction. The profile
    /// shares the user's id.
    pub fn create_user(
        &self,
        id: Uuid,
        username: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<()> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, username, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.to_string(), username, password_hash, now],
            )
            .map_err(DbError::on_unique("username already taken"))?;
            tx.execute(
                "INSERT INTO profiles (id, display_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.to_string(), display_name, now, now],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Availability check matches the UNIQUE COLLATE NOCASE column, so
    /// "Baller" blocks "baller".
    pub fn username_available(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |r| r.get(0),
            )?;
            Ok(!taken)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, password_hash, created_at
                     FROM users WHERE username = ?1",
                    [username],
                    map_user,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, password_hash, created_at
                     FROM users WHERE id = ?1",
                    [id.to_string()],
                    map_user,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Deleting the user row fans out through the FK cascades: profile,
    /// posts, comments, likes, follows, invites, notifications, orders.
    pub fn delete_account(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            if n == 0 {
                return Err(DbError::NotFound("user"));
            }
            Ok(())
        })
    }
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: uuid_col(row, 0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{open_test_db, seed_user};

    #[test]
    fn register_creates_user_and_profile() {
        let (_dir, db) = open_test_db();
        let id = seed_user(&db, "shorty");

        let user = db.get_user_by_username("shorty").unwrap().unwrap();
        assert_eq!(user.id, id);

        let profile = db.get_profile(id).unwrap().unwrap();
        assert_eq!(profile.username, "shorty");
        assert_eq!(profile.points, 0);
    }

    #[test]
    fn duplicate_username_is_a_conflict_case_insensitively() {
        let (_dir, db) = open_test_db();
        seed_user(&db, "Dunker");

        let err = db
            .create_user(Uuid::new_v4(), "dunker", "$argon2id$test", "dunker")
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert!(!db.username_available("DUNKER").unwrap());
        assert!(db.username_available("someone-else").unwrap());
    }

    #[test]
    fn deleting_an_account_cascades_to_content() {
        let (_dir, db) = open_test_db();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");
        let post = Uuid::new_v4();
        db.create_post(
            post,
            alice,
            hoopers_types::models::PostKind::Post,
            "farewell",
            None,
            None,
            &[],
        )
        .unwrap();
        db.follow(bob, alice).unwrap();

        db.delete_account(alice).unwrap();

        assert!(db.get_user_by_id(alice).unwrap().is_none());
        assert!(db.get_post(bob, post).unwrap().is_none());
        let bob_profile = db.get_profile(bob).unwrap().unwrap();
        assert_eq!(bob_profile.following, 0);
    }

    #[test]
    fn deleting_a_missing_account_is_not_found() {
        let (_dir, db) = open_test_db();
        let err = db.delete_account(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DbError::NotFound("user")));
    }
}
