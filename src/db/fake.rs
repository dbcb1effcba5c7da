use crate::db::campaigns::CampaignStore;
use crate::db::error::DatabaseError;
use crate::db::models::{Campaign, CampaignId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A fake in-memory implementation of the CampaignStore trait for testing.
/// Write failures can be injected to exercise the partial-failure paths.
pub struct FakeCampaignStore {
    campaigns: Arc<RwLock<HashMap<CampaignId, Campaign>>>,
    fail_creates: Arc<RwLock<bool>>,
    fail_updates: Arc<RwLock<bool>>,
    fail_reads: Arc<RwLock<bool>>,
}

#[allow(dead_code)]
impl FakeCampaignStore {
    /// Create a new empty FakeCampaignStore
    pub fn new() -> Self {
        FakeCampaignStore {
            campaigns: Arc::new(RwLock::new(HashMap::new())),
            fail_creates: Arc::new(RwLock::new(false)),
            fail_updates: Arc::new(RwLock::new(false)),
            fail_reads: Arc::new(RwLock::new(false)),
        }
    }

    /// Make every subsequent create fail with a query error
    pub fn fake_fail_creates(&self, fail: bool) {
        *self.fail_creates.write().unwrap() = fail;
    }

    /// Make every subsequent update or delete fail with a query error
    pub fn fake_fail_updates(&self, fail: bool) {
        *self.fail_updates.write().unwrap() = fail;
    }

    /// Make every subsequent query fail with a query error
    pub fn fake_fail_reads(&self, fail: bool) {
        *self.fail_reads.write().unwrap() = fail;
    }

    /// Insert a campaign directly, bypassing the trait
    pub fn fake_add_campaign(&self, campaign: Campaign) {
        let mut campaigns = self.campaigns.write().unwrap();
        campaigns.insert(campaign.id, campaign);
    }

    /// Read a campaign directly, bypassing the trait
    pub fn fake_get_campaign(&self, id: CampaignId) -> Option<Campaign> {
        let campaigns = self.campaigns.read().unwrap();
        campaigns.get(&id).cloned()
    }
}

impl Default for FakeCampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_newest_first(mut campaigns: Vec<Campaign>) -> Vec<Campaign> {
    campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    campaigns
}

#[async_trait]
impl CampaignStore for FakeCampaignStore {
    async fn create(&self, campaign: Campaign) -> Result<Campaign, DatabaseError> {
        if *self.fail_creates.read().unwrap() {
            return Err(DatabaseError::QueryError("injected create failure".into()));
        }

        let mut campaigns = self.campaigns.write().unwrap();
        if campaigns.contains_key(&campaign.id) {
            return Err(DatabaseError::QueryError(format!(
                "duplicate campaign id {}",
                campaign.id
            )));
        }
        campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    async fn get_by_id(&self, id: CampaignId) -> Result<Campaign, DatabaseError> {
        let campaigns = self.campaigns.read().unwrap();
        campaigns
            .get(&id)
            .cloned()
            .ok_or(DatabaseError::NotFound(id))
    }

    async fn latest_id(&self) -> Result<Option<CampaignId>, DatabaseError> {
        if *self.fail_reads.read().unwrap() {
            return Err(DatabaseError::QueryError("injected read failure".into()));
        }

        let campaigns = self.campaigns.read().unwrap();
        Ok(campaigns.keys().max().copied())
    }

    async fn update(&self, campaign: Campaign) -> Result<Campaign, DatabaseError> {
        if *self.fail_updates.read().unwrap() {
            return Err(DatabaseError::QueryError("injected update failure".into()));
        }

        let mut campaigns = self.campaigns.write().unwrap();
        if !campaigns.contains_key(&campaign.id) {
            return Err(DatabaseError::NotFound(campaign.id));
        }
        campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    async fn delete(&self, id: CampaignId) -> Result<Campaign, DatabaseError> {
        if *self.fail_updates.read().unwrap() {
            return Err(DatabaseError::QueryError("injected delete failure".into()));
        }

        let mut campaigns = self.campaigns.write().unwrap();
        let campaign = campaigns.get_mut(&id).ok_or(DatabaseError::NotFound(id))?;
        if campaign.deleted_at.is_some() {
            return Err(DatabaseError::NotFound(id));
        }
        let now = Utc::now();
        campaign.deleted_at = Some(now);
        campaign.updated_at = now;
        Ok(campaign.clone())
    }

    async fn find_eligible(
        &self,
        category: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, DatabaseError> {
        if *self.fail_reads.read().unwrap() {
            return Err(DatabaseError::QueryError("injected read failure".into()));
        }

        let campaigns = self.campaigns.read().unwrap();
        let eligible: Vec<Campaign> = campaigns
            .values()
            .filter(|c| c.category == category && c.is_eligible_at(as_of))
            .cloned()
            .collect();
        Ok(sorted_newest_first(eligible))
    }

    async fn get_by_ids(
        &self,
        ids: &[CampaignId],
        category: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, DatabaseError> {
        if *self.fail_reads.read().unwrap() {
            return Err(DatabaseError::QueryError("injected read failure".into()));
        }

        let campaigns = self.campaigns.read().unwrap();
        let eligible: Vec<Campaign> = ids
            .iter()
            .filter_map(|id| campaigns.get(id))
            .filter(|c| c.category == category && c.is_eligible_at(as_of))
            .cloned()
            .collect();
        Ok(sorted_newest_first(eligible))
    }

    async fn increment_impressions(&self, ids: &[CampaignId]) -> Result<(), DatabaseError> {
        let mut campaigns = self.campaigns.write().unwrap();
        for id in ids {
            if let Some(campaign) = campaigns.get_mut(id) {
                if campaign.deleted_at.is_none() {
                    campaign.impression_count += 1;
                    campaign.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    async fn increment_clicks(&self, id: CampaignId) -> Result<(), DatabaseError> {
        let mut campaigns = self.campaigns.write().unwrap();
        if let Some(campaign) = campaigns.get_mut(&id) {
            if campaign.deleted_at.is_none() {
                campaign.click_count += 1;
                campaign.updated_at = Utc::now();
            }
        }
        Ok(())
    }
}
