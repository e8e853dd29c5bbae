//! Database row types — these map directly to SQLite rows, with ids and
//! timestamps already parsed into native types. Distinct from the
//! hoopers-types API models so the storage layer stays independent.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use hoopers_types::models::{
    InviteStatus, MediaKind, NotificationKind, OrderStatus, Plan, PostKind, RunStatus,
    SubscriptionStatus, Team, UnknownVariant,
};

/// Read a TEXT column as a [`Uuid`].
pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a nullable TEXT column as an optional [`Uuid`].
pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) => Uuid::parse_str(&text)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// Read a TEXT column as one of the domain enums.
pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: UnknownVariant| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })
}

/// Read a nullable TEXT column as an optional domain enum.
pub(crate) fn opt_enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = UnknownVariant>,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|e: UnknownVariant| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            }),
        None => Ok(None),
    }
}

pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

pub struct ProfileRow {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub position: Option<String>,
    pub player_number: i64,
    pub points: i64,
    pub city: Option<String>,
    pub avatar_key: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short profile form used in listings and rosters.
pub struct ProfileSummaryRow {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub points: i64,
    pub player_number: i64,
    pub avatar_key: Option<String>,
}

impl ProfileSummaryRow {
    /// Mapper for queries selecting the summary columns in canonical order
    /// starting at `base`: id, username, display_name, points,
    /// player_number, avatar_key.
    pub(crate) fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_col(row, base)?,
            username: row.get(base + 1)?,
            display_name: row.get(base + 2)?,
            points: row.get(base + 3)?,
            player_number: row.get(base + 4)?,
            avatar_key: row.get(base + 5)?,
        })
    }
}

/// A follow edge joined with the counterpart profile's summary columns.
pub struct FollowEntryRow {
    pub profile: ProfileSummaryRow,
    pub followed_at: DateTime<Utc>,
}

/// Post enriched with author, counters and the viewer's like state, all
/// computed in the page query. Mentions ride separately (batch-fetched).
pub struct PostRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub kind: PostKind,
    pub body: String,
    pub media_key: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub like_count: i64,
    pub comment_count: i64,
    pub rating_average: Option<f64>,
    pub rating_count: i64,
    pub liked_by_me: bool,
    pub created_at: DateTime<Utc>,
}

pub struct MentionRow {
    pub post_id: Uuid,
    pub profile_id: Uuid,
    pub username: String,
}

#[derive(Debug)]
pub struct CommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub struct CourtRow {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub surface: Option<String>,
    pub hoop_count: i64,
    pub indoor: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

pub struct RunRow {
    pub id: Uuid,
    pub host_id: Uuid,
    pub host_username: String,
    pub court_id: Uuid,
    pub court_name: String,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: RunStatus,
    pub max_players: i64,
    pub accepted_count: i64,
    pub created_at: DateTime<Utc>,
}

pub struct RunInviteRow {
    pub profile: ProfileSummaryRow,
    pub status: InviteStatus,
    pub responded_at: Option<DateTime<Utc>>,
}

pub struct SquadRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub motto: Option<String>,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

pub struct GameRow {
    pub id: Uuid,
    pub run_id: Option<Uuid>,
    pub court_id: Uuid,
    pub recorded_by: Option<Uuid>,
    pub played_at: DateTime<Utc>,
    pub team_a_score: i64,
    pub team_b_score: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct GamePlayerRow {
    pub game_id: Uuid,
    pub profile_id: Uuid,
    pub username: String,
    pub team: Team,
    pub points_scored: i64,
}

pub struct ScoutingReportRow {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub scout_id: Uuid,
    pub scout_username: String,
    pub shooting: i64,
    pub passing: i64,
    pub defense: i64,
    pub athleticism: i64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Per-skill averages over all reports for one subject. `None` when the
/// subject has no reports yet.
pub struct ScoutingSummaryRow {
    pub shooting: Option<f64>,
    pub passing: Option<f64>,
    pub defense: Option<f64>,
    pub athleticism: Option<f64>,
    pub report_count: i64,
}

pub struct NotificationRow {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub actor_id: Uuid,
    pub actor_username: String,
    pub subject_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

pub struct PushSubscriptionRow {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub sku: String,
    pub stock: i64,
    pub media_key: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct OrderRow {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct OrderItemRow {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}
