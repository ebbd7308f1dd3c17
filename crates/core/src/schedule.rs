//! Expiry schedule for cached fortunes.
//!
//! All calendar arithmetic happens in the product's local day, expressed as a
//! fixed UTC offset so results never depend on the host's timezone.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};

use crate::category::CategoryGroup;
use crate::error::CoreError;
use crate::types::Timestamp;

/// Lifetime of interactive (input-dependent) readings.
pub const INTERACTIVE_TTL_SECS: i64 = 60 * 60;

/// Lifetime of the love, career/wealth and life/career packages.
pub const PACKAGE_TTL_DAYS: i64 = 7;

/// Lifetime of the lucky-items package.
pub const LUCKY_ITEMS_TTL_DAYS: i64 = 3;

/// The product's home timezone (KST).
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;

/// Build a fixed offset from whole hours east of UTC.
pub fn offset_from_hours(hours: i32) -> Result<FixedOffset, CoreError> {
    FixedOffset::east_opt(hours * 3600).ok_or_else(|| {
        CoreError::Validation(format!("UTC offset {hours}h is out of range"))
    })
}

/// The local calendar date of `now`.
pub fn local_date(now: Timestamp, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// `YYYY-MM-DD` form of [`local_date`], used in cache keys and seeds.
pub fn local_date_string(now: Timestamp, offset: FixedOffset) -> String {
    local_date(now, offset).format("%Y-%m-%d").to_string()
}

/// The first local midnight strictly after `now`, in UTC.
pub fn next_local_midnight(now: Timestamp, offset: FixedOffset) -> Timestamp {
    let tomorrow = local_date(now, offset) + Duration::days(1);
    offset
        .from_local_datetime(&tomorrow.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or(now + Duration::days(1))
}

/// Absolute expiry for content of `group` generated at `now`.
///
/// Returns `None` for groups that never expire.
pub fn expires_at(group: CategoryGroup, now: Timestamp, offset: FixedOffset) -> Option<Timestamp> {
    match group {
        CategoryGroup::DailyComprehensive => Some(next_local_midnight(now, offset)),
        CategoryGroup::Interactive => Some(now + Duration::seconds(INTERACTIVE_TTL_SECS)),
        CategoryGroup::LovePackage
        | CategoryGroup::CareerWealthPackage
        | CategoryGroup::LifeCareerPackage => Some(now + Duration::days(PACKAGE_TTL_DAYS)),
        CategoryGroup::LuckyItemsPackage => Some(now + Duration::days(LUCKY_ITEMS_TTL_DAYS)),
        CategoryGroup::LifeProfile | CategoryGroup::ClientBased => None,
    }
}

/// Whether a record with `expires_at` is still valid at `now`.
pub fn is_live(expires_at: Option<Timestamp>, now: Timestamp) -> bool {
    expires_at.map_or(true, |at| at > now)
}

/// TTL to apply in a bounded cache tier: the smaller of `cap` and the time
/// left until `expires_at`. `None` means the record has already expired and
/// must not be written.
pub fn tier_ttl(
    expires_at: Option<Timestamp>,
    now: Timestamp,
    cap: std::time::Duration,
) -> Option<std::time::Duration> {
    match expires_at {
        None => Some(cap),
        Some(at) if at <= now => None,
        Some(at) => {
            let remaining = (at - now).to_std().ok()?;
            Some(remaining.min(cap))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
