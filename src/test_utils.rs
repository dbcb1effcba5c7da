use crate::db::{Campaign, CampaignId};
use crate::idgen::{IdGenError, IdGenerator};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Creates a campaign that is eligible at `now`: a ±1 hour calendar window
/// and an all-day hour window.
///
/// Other fields can be customized after creation if needed.
pub fn create_test_campaign(id: CampaignId, category: i32, now: DateTime<Utc>) -> Campaign {
    Campaign {
        id,
        owner_id: Some(7),
        asset_url: format!("campaigns/{}.img", id),
        link_href: "https://example.com/promo".to_string(),
        text: "Launch promo".to_string(),
        targeting_regex: ".*".to_string(),
        category,
        start_at: now - Duration::hours(1),
        end_at: now + Duration::hours(1),
        start_hour: 0,
        end_hour: 24,
        frequency_cap: 3,
        impression_count: 0,
        click_count: 0,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

/// Deterministic id generator for service tests: sequential ids from a
/// starting value, with an injectable failure.
pub struct FakeIdGenerator {
    next: AtomicU64,
    fail: AtomicBool,
}

impl FakeIdGenerator {
    pub fn new(start: u64) -> Self {
        FakeIdGenerator {
            next: AtomicU64::new(start),
            fail: AtomicBool::new(false),
        }
    }

    /// Make every subsequent next_id call fail
    pub fn fake_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl IdGenerator for FakeIdGenerator {
    fn next_id(&self) -> Result<CampaignId, IdGenError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IdGenError::SequenceExhausted(0));
        }
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }
}
