use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    InviteStatus, MediaKind, NotificationKind, OrderStatus, Plan, PostKind, RunStatus,
    SubscriptionStatus, Team,
};

// -- JWT Claims --

/// JWT claims shared between token issuance (auth handlers) and validation
/// (the auth middleware). Canonical definition lives here in hoopers-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Pagination --

/// One page of a keyset-paginated listing. `next_cursor` is absent on the
/// last page; passing it back unchanged fetches the next page.
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameAvailableQuery {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UsernameAvailableResponse {
    pub username: String,
    pub available: bool,
}

// -- Profiles --

/// Short form used in listings, rosters and follower lists.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub points: i64,
    pub player_number: i64,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub position: Option<String>,
    pub player_number: i64,
    pub points: i64,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
    pub scouting: ScoutingSummaryResponse,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update: absent fields are left unchanged.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub position: Option<String>,
    pub player_number: Option<i64>,
    pub city: Option<String>,
    pub avatar_key: Option<String>,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub kind: PostKind,
    pub body: String,
    pub media_key: Option<String>,
    pub media_kind: Option<MediaKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MentionTag {
    pub profile_id: Uuid,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub kind: PostKind,
    pub body: String,
    pub media_url: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub rating_average: Option<f64>,
    pub rating_count: i64,
    pub liked_by_me: bool,
    pub mentions: Vec<MentionTag>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RatePostRequest {
    pub stars: i64,
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub average: f64,
    pub count: i64,
}

// -- Courts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CourtRequest {
    pub name: String,
    pub address: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub surface: Option<String>,
    pub hoop_count: i64,
    pub indoor: bool,
}

#[derive(Debug, Serialize)]
pub struct CourtResponse {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub surface: Option<String>,
    pub hoop_count: i64,
    pub indoor: bool,
    pub created_at: DateTime<Utc>,
}

// -- Runs --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRunRequest {
    pub court_id: Uuid,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub max_players: i64,
}

/// Partial update; `status` moves the run through its lifecycle.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRunRequest {
    pub title: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub max_players: Option<i64>,
    pub status: Option<RunStatus>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
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

#[derive(Debug, Serialize)]
pub struct RunDetailResponse {
    #[serde(flatten)]
    pub run: RunResponse,
    pub roster: Vec<RunInviteResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InviteRequest {
    pub profile_id: Uuid,
}

/// Invitee's answer to an invite. Only `accepted` / `declined` are valid.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RsvpRequest {
    pub status: InviteStatus,
}

#[derive(Debug, Serialize)]
pub struct RunInviteResponse {
    pub profile: ProfileSummary,
    pub status: InviteStatus,
    pub responded_at: Option<DateTime<Utc>>,
}

// -- Squads --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SquadRequest {
    pub name: String,
    pub motto: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SquadResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub motto: Option<String>,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SquadDetailResponse {
    #[serde(flatten)]
    pub squad: SquadResponse,
    pub members: Vec<ProfileSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddSquadMemberRequest {
    pub profile_id: Uuid,
}

// -- Games --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GamePlayerEntry {
    pub profile_id: Uuid,
    pub team: Team,
    pub points_scored: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGameRequest {
    pub run_id: Option<Uuid>,
    pub court_id: Uuid,
    pub played_at: DateTime<Utc>,
    pub team_a_score: i64,
    pub team_b_score: i64,
    pub notes: Option<String>,
    pub players: Vec<GamePlayerEntry>,
}

#[derive(Debug, Serialize)]
pub struct GamePlayerResponse {
    pub profile_id: Uuid,
    pub username: String,
    pub team: Team,
    pub points_scored: i64,
}

#[derive(Debug, Serialize)]
pub struct GameResponse {
    pub id: Uuid,
    pub run_id: Option<Uuid>,
    pub court_id: Uuid,
    pub played_at: DateTime<Utc>,
    pub team_a_score: i64,
    pub team_b_score: i64,
    pub notes: Option<String>,
    pub players: Vec<GamePlayerResponse>,
    pub created_at: DateTime<Utc>,
}

// -- Scouting reports --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoutingReportRequest {
    pub shooting: i64,
    pub passing: i64,
    pub defense: i64,
    pub athleticism: i64,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct ScoutingReportResponse {
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

#[derive(Debug, Serialize)]
pub struct ScoutingSummaryResponse {
    pub shooting: Option<f64>,
    pub passing: Option<f64>,
    pub defense: Option<f64>,
    pub athleticism: Option<f64>,
    pub report_count: i64,
}

// -- Notifications --

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub actor_id: Uuid,
    pub actor_username: String,
    pub subject_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

// -- Push subscriptions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushSubscriptionRequest {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemovePushSubscriptionRequest {
    pub endpoint: String,
}

// -- Shop --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub sku: String,
    pub stock: i64,
    pub media_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub sku: String,
    pub stock: i64,
    pub media_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub currency: String,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartSubscriptionRequest {
    pub plan: Plan,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}
