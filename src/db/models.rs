use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Campaign identifiers are snowflake-style u64s with 63 significant bits,
/// so they survive a round trip through a signed BIGINT column.
pub type CampaignId = u64;

/// A schedulable launch-screen campaign record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    /// Creating user; None on system/admin creation paths
    pub owner_id: Option<u64>,
    /// Object key of the image in the asset store
    pub asset_url: String,
    pub link_href: String,
    pub text: String,
    pub targeting_regex: String,
    /// Slot classifier (splash type); the mobile read path always filters on it
    pub category: i32,
    /// Calendar window: eligible while start_at <= now < end_at
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// Inclusive hour-of-day window within each day, 0..=24
    pub start_hour: u8,
    pub end_hour: u8,
    /// Advisory max impressions per day; stored but not enforced server-side
    pub frequency_cap: u32,
    pub impression_count: u64,
    pub click_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// The eligibility predicate: not soft-deleted, `at` inside the calendar
    /// window, and the hour of day inside the daily window. Every query path
    /// (range scan, id-set re-filter) evaluates exactly this.
    pub fn is_eligible_at(&self, at: DateTime<Utc>) -> bool {
        if self.deleted_at.is_some() {
            return false;
        }
        if at < self.start_at || at >= self.end_at {
            return false;
        }
        let hour = at.hour() as u8;
        self.start_hour <= hour && hour <= self.end_hour
    }
}
