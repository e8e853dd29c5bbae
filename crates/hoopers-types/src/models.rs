use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a stored enum string is not a known variant.
///
/// Rows are stored with the `as_str` spelling of each enum; anything else in
/// the column means the database was written by something newer (or by hand).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! str_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

// -- Posts --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Post,
    Blog,
    News,
    Event,
}

str_enum!(PostKind, "post kind", {
    Post => "post",
    Blog => "blog",
    News => "news",
    Event => "event",
});

/// Content kind of an attached media object. Decides the file extension the
/// storage host serves it under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Avatar,
}

str_enum!(MediaKind, "media kind", {
    Image => "image",
    Video => "video",
    Avatar => "avatar",
});

// -- Runs --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

str_enum!(RunStatus, "run status", {
    Scheduled => "scheduled",
    Active => "active",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl RunStatus {
    /// Forward-only lifecycle: scheduled -> active -> completed, with
    /// cancellation allowed until the run has completed.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Scheduled, RunStatus::Active)
                | (RunStatus::Scheduled, RunStatus::Cancelled)
                | (RunStatus::Active, RunStatus::Completed)
                | (RunStatus::Active, RunStatus::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Invited,
    Accepted,
    Declined,
}

str_enum!(InviteStatus, "invite status", {
    Invited => "invited",
    Accepted => "accepted",
    Declined => "declined",
});

// -- Games --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    A,
    B,
}

str_enum!(Team, "team", {
    A => "a",
    B => "b",
});

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Follow,
    Comment,
    Like,
    Mention,
    RunInvite,
}

str_enum!(NotificationKind, "notification kind", {
    Follow => "follow",
    Comment => "comment",
    Like => "like",
    Mention => "mention",
    RunInvite => "run_invite",
});

// -- Shop --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Cancelled,
}

str_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Paid => "paid",
    Shipped => "shipped",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// pending -> paid -> shipped; cancellation is allowed until shipment.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Shipped)
                | (OrderStatus::Paid, OrderStatus::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Monthly,
    Yearly,
}

str_enum!(Plan, "plan", {
    Monthly => "monthly",
    Yearly => "yearly",
});

impl Plan {
    pub const fn period_days(self) -> i64 {
        match self {
            Plan::Monthly => 30,
            Plan::Yearly => 365,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
}

str_enum!(SubscriptionStatus, "subscription status", {
    Active => "active",
    Cancelled => "cancelled",
});

// -- Sort selectors for paginated listings --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSort {
    Points,
    PlayerNumber,
    Username,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunSort {
    ScheduledAt,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Price,
    Name,
    Newest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_strings_round_trip() {
        assert_eq!("blog".parse::<PostKind>().unwrap(), PostKind::Blog);
        assert_eq!(PostKind::News.as_str(), "news");
        assert_eq!(
            "run_invite".parse::<NotificationKind>().unwrap(),
            NotificationKind::RunInvite
        );
        assert_eq!(InviteStatus::Declined.to_string(), "declined");
    }

    #[test]
    fn unknown_variant_is_an_error() {
        let err = "dunk".parse::<PostKind>().unwrap_err();
        assert_eq!(err.kind, "post kind");
        assert_eq!(err.value, "dunk");
    }

    #[test]
    fn run_status_transitions() {
        assert!(RunStatus::Scheduled.can_transition_to(RunStatus::Active));
        assert!(RunStatus::Active.can_transition_to(RunStatus::Completed));
        assert!(RunStatus::Scheduled.can_transition_to(RunStatus::Cancelled));
        assert!(!RunStatus::Completed.can_transition_to(RunStatus::Active));
        assert!(!RunStatus::Cancelled.can_transition_to(RunStatus::Scheduled));
        assert!(!RunStatus::Active.can_transition_to(RunStatus::Active));
    }

    #[test]
    fn order_status_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn plan_periods() {
        assert_eq!(Plan::Monthly.period_days(), 30);
        assert_eq!(Plan::Yearly.period_days(), 365);
    }
}
