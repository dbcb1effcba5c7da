use crate::cache::error::CacheError;
use crate::cache::store::CacheStore;
use crate::db::{Campaign, CampaignId, CampaignStore, DatabaseError};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Cache key for the most recently assigned campaign id as of the last full
/// recomputation. Global, shared by every (category, requester) entry.
const LAST_ID_KEY: &str = "campaigns:last_id";

fn ids_key(category: i32, requester_key: &str) -> String {
    format!("campaigns:eligible:{}:{}", category, requester_key)
}

/// Errors surfaced by the eligibility read path
#[derive(Error, Debug)]
pub enum EligibilityError {
    #[error("Cache access failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Campaign store access failed: {0}")]
    Database(#[from] DatabaseError),
}

/// Cache-aside layer over the campaign store for the mobile read path.
///
/// Per (category, requester) it keeps a TTL'd list of campaign ids, and one
/// global sentinel holding the highest campaign id known at the last
/// recomputation. A cheap sentinel comparison against `latest_id()` detects
/// that new campaigns exist without re-running the range query; campaigns
/// that merely expired drop out on the hit path because `get_by_ids`
/// re-applies the eligibility predicate.
pub struct EligibilityCache<C: CacheStore, S: CampaignStore> {
    cache: C,
    campaigns: S,
    ttl: Duration,
}

impl<C: CacheStore, S: CampaignStore> EligibilityCache<C, S> {
    pub fn new(cache: C, campaigns: S, ttl: Duration) -> Self {
        EligibilityCache {
            cache,
            campaigns,
            ttl,
        }
    }

    /// Resolve the eligible campaigns for one requester.
    ///
    /// Hit: cached id list revalidated through `get_by_ids`. Miss (entry or
    /// sentinel absent, or the sentinel no longer matches the store): full
    /// recomputation, then both keys are rewritten with the TTL. On any
    /// store or cache error the previous cache state is left untouched.
    pub async fn get_eligible(
        &self,
        category: i32,
        requester_key: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, EligibilityError> {
        let key = ids_key(category, requester_key);

        if let Some(ids) = self.read_cached_ids(&key).await? {
            if let Some(sentinel) = self.read_sentinel().await? {
                let latest = self.campaigns.latest_id().await?;
                if sentinel == latest {
                    debug!(
                        "Eligibility cache hit for {} ({} cached ids)",
                        key,
                        ids.len()
                    );
                    let campaigns = self.campaigns.get_by_ids(&ids, category, as_of).await?;
                    return Ok(campaigns);
                }
                debug!(
                    "Sentinel moved ({:?} -> {:?}), recomputing {}",
                    sentinel, latest, key
                );
            }
        }

        self.recompute(&key, category, as_of).await
    }

    async fn recompute(
        &self,
        key: &str,
        category: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, EligibilityError> {
        let eligible = self.campaigns.find_eligible(category, as_of).await?;
        let ids: Vec<CampaignId> = eligible.iter().map(|c| c.id).collect();

        debug!("Recomputed {} eligible campaigns for {}", ids.len(), key);

        let payload = serde_json::to_string(&ids)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        self.cache.set(key, &payload, self.ttl).await?;

        let latest = self.campaigns.latest_id().await?;
        let sentinel_payload = serde_json::to_string(&latest)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        self.cache.set(LAST_ID_KEY, &sentinel_payload, self.ttl).await?;

        Ok(eligible)
    }

    async fn read_cached_ids(&self, key: &str) -> Result<Option<Vec<CampaignId>>, CacheError> {
        let Some(raw) = self.cache.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(ids) => Ok(Some(ids)),
            Err(e) => {
                // A corrupt entry must not poison the read path; fall back to
                // a recomputation which overwrites it.
                warn!("Discarding corrupt cache entry {}: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn read_sentinel(&self) -> Result<Option<Option<CampaignId>>, CacheError> {
        let Some(raw) = self.cache.get(LAST_ID_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(sentinel) => Ok(Some(sentinel)),
            Err(e) => {
                warn!("Discarding corrupt sentinel entry: {}", e);
                Ok(None)
            }
        }
    }
}
