//! Usage quota for free-tier generation.
//!
//! Subscribers are never metered. Everyone else gets 12 ideas per trailing
//! hour and 24 per local calendar day. Failures to count are surfaced as a
//! retryable error; a quota check never fails open.

use std::fmt;

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::errors::AppError;
use crate::store::{IdeaStore, SubscriptionLookup};

pub const HOURLY_LIMIT: u32 = 12;
pub const DAILY_LIMIT: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    Hourly,
    Daily,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::Hourly => f.write_str("hourly"),
            LimitKind::Daily => f.write_str("daily"),
        }
    }
}

/// Ideas left before a limit binds. Serializes as a number or `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Limited(u32),
    Unlimited,
}

impl Remaining {
    /// Remaining count after one more generation.
    pub fn after_use(self) -> Self {
        match self {
            Remaining::Limited(n) => Remaining::Limited(n.saturating_sub(1)),
            Remaining::Unlimited => Remaining::Unlimited,
        }
    }
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Remaining::Limited(n) => serializer.serialize_u32(*n),
            Remaining::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub can_generate: bool,
    pub remaining: Remaining,
    pub limit_kind: Option<LimitKind>,
}

impl QuotaStatus {
    pub fn unlimited() -> Self {
        Self {
            can_generate: true,
            remaining: Remaining::Unlimited,
            limit_kind: None,
        }
    }

    pub fn from_usage(hourly_used: i64, daily_used: i64) -> Self {
        let hourly_remaining = remaining_under(HOURLY_LIMIT, hourly_used);
        let daily_remaining = remaining_under(DAILY_LIMIT, daily_used);

        let limit_kind = if hourly_remaining == 0 {
            Some(LimitKind::Hourly)
        } else if daily_remaining == 0 {
            Some(LimitKind::Daily)
        } else {
            None
        };

        Self {
            can_generate: hourly_remaining > 0 && daily_remaining > 0,
            remaining: Remaining::Limited(hourly_remaining.min(daily_remaining)),
            limit_kind,
        }
    }

    /// Converts a blocked status into the matching 429.
    pub fn ensure_can_generate(self) -> Result<Self, AppError> {
        match (self.can_generate, self.limit_kind) {
            (true, _) => Ok(self),
            (false, limit) => Err(AppError::QuotaExceeded {
                limit: limit.unwrap_or(LimitKind::Daily),
                remaining: 0,
            }),
        }
    }
}

fn remaining_under(limit: u32, used: i64) -> u32 {
    let used = u32::try_from(used.max(0)).unwrap_or(u32::MAX);
    limit.saturating_sub(used)
}

/// The two window boundaries, fixed once per evaluation.
#[derive(Debug, Clone, Copy)]
pub struct UsageClock {
    pub now: DateTime<Utc>,
    pub day_start: DateTime<Utc>,
}

impl UsageClock {
    /// Calendar day is local to this process.
    pub fn local_now() -> Self {
        Self::at(Local::now())
    }

    pub fn at<Tz: TimeZone>(now: DateTime<Tz>) -> Self {
        Self {
            now: now.with_timezone(&Utc),
            day_start: start_of_day(&now),
        }
    }

    pub fn hour_start(&self) -> DateTime<Utc> {
        self.now - Duration::hours(1)
    }
}

/// First instant of `now`'s calendar day in its own zone. If midnight does not
/// exist (a DST gap), falls back to 24 hours ago, which can only over-count.
fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    now.timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc) - Duration::hours(24))
}

/// Computes the caller's quota. Subscribers short-circuit before any counting.
pub async fn evaluate_quota(
    ideas: &dyn IdeaStore,
    subscriptions: &dyn SubscriptionLookup,
    email: &str,
    clock: UsageClock,
) -> Result<QuotaStatus, AppError> {
    let subscribed = subscriptions
        .has_active_subscription(email)
        .await
        .map_err(|e| AppError::QuotaCheck(format!("subscription lookup failed: {e}")))?;

    if subscribed {
        debug!("{email} has an active subscription; quota not metered");
        return Ok(QuotaStatus::unlimited());
    }

    let (hourly_used, daily_used) = tokio::try_join!(
        ideas.count_ideas_since(email, clock.hour_start()),
        ideas.count_ideas_since(email, clock.day_start),
    )
    .map_err(|e| AppError::QuotaCheck(format!("usage count failed: {e}")))?;

    debug!("Usage for {email}: hourly={hourly_used} daily={daily_used}");
    Ok(QuotaStatus::from_usage(hourly_used, daily_used))
}
