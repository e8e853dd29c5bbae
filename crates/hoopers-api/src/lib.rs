pub mod auth;
pub mod courts;
pub mod error;
pub mod games;
pub mod media;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod profiles;
pub mod reports;
pub mod runs;
pub mod shop;
pub mod squads;

use serde::Deserialize;

/// Cursor pagination knobs, shared by list endpoints that take no other
/// filters. Endpoints with extra filters roll these fields into their own
/// query struct.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}
