use crate::db::error::DatabaseError;
use crate::db::models::{Campaign, CampaignId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// CampaignStore trait defining the interface for campaign persistence
#[async_trait]
pub trait CampaignStore: Send + Sync + 'static {
    /// Insert a new campaign row. The id must already be assigned.
    async fn create(&self, campaign: Campaign) -> Result<Campaign, DatabaseError>;

    /// Fetch a single campaign by id, soft-deleted rows included.
    /// Returns `DatabaseError::NotFound` when no row exists.
    async fn get_by_id(&self, id: CampaignId) -> Result<Campaign, DatabaseError>;

    /// Highest campaign id ever assigned, soft-deleted rows included.
    /// This is the staleness sentinel source for the eligibility cache.
    async fn latest_id(&self) -> Result<Option<CampaignId>, DatabaseError>;

    /// Overwrite an existing campaign row with the given record.
    async fn update(&self, campaign: Campaign) -> Result<Campaign, DatabaseError>;

    /// Mark a campaign as deleted and return the marked record.
    async fn delete(&self, id: CampaignId) -> Result<Campaign, DatabaseError>;

    /// All campaigns of `category` whose calendar and hour windows contain
    /// `as_of`, newest first.
    async fn find_eligible(
        &self,
        category: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, DatabaseError>;

    /// Same predicate as `find_eligible`, restricted to an explicit id set.
    /// Ids whose rows have since expired or been deleted silently drop out.
    async fn get_by_ids(
        &self,
        ids: &[CampaignId],
        category: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, DatabaseError>;

    /// Atomically add one impression to each listed campaign.
    /// Ids that match no live row are ignored.
    async fn increment_impressions(&self, ids: &[CampaignId]) -> Result<(), DatabaseError>;

    /// Atomically add one click to the campaign.
    async fn increment_clicks(&self, id: CampaignId) -> Result<(), DatabaseError>;
}

/// Implementation of CampaignStore for Arc<T> where T implements CampaignStore
///
/// This allows sharing a store instance across the service and the
/// eligibility cache without wrapper types.
#[async_trait]
impl<T: CampaignStore + ?Sized> CampaignStore for Arc<T> {
    async fn create(&self, campaign: Campaign) -> Result<Campaign, DatabaseError> {
        (**self).create(campaign).await
    }

    async fn get_by_id(&self, id: CampaignId) -> Result<Campaign, DatabaseError> {
        (**self).get_by_id(id).await
    }

    async fn latest_id(&self) -> Result<Option<CampaignId>, DatabaseError> {
        (**self).latest_id().await
    }

    async fn update(&self, campaign: Campaign) -> Result<Campaign, DatabaseError> {
        (**self).update(campaign).await
    }

    async fn delete(&self, id: CampaignId) -> Result<Campaign, DatabaseError> {
        (**self).delete(id).await
    }

    async fn find_eligible(
        &self,
        category: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, DatabaseError> {
        (**self).find_eligible(category, as_of).await
    }

    async fn get_by_ids(
        &self,
        ids: &[CampaignId],
        category: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, DatabaseError> {
        (**self).get_by_ids(ids, category, as_of).await
    }

    async fn increment_impressions(&self, ids: &[CampaignId]) -> Result<(), DatabaseError> {
        (**self).increment_impressions(ids).await
    }

    async fn increment_clicks(&self, id: CampaignId) -> Result<(), DatabaseError> {
        (**self).increment_clicks(id).await
    }
}
