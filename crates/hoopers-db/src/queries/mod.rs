mod courts;
mod games;
mod notifications;
mod posts;
mod profiles;
mod reports;
mod runs;
mod shop;
mod squads;
mod users;

pub(crate) use notifications::notify;

use rusqlite::Connection;
use uuid::Uuid;

pub(crate) fn profile_exists(conn: &Connection, id: Uuid) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM profiles WHERE id = ?1)",
        [id.to_string()],
        |r| r.get(0),
    )
}
