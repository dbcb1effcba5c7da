use crate::cache::{CacheStore, EligibilityCache};
use crate::db::{Campaign, CampaignId, CampaignStore};
use crate::idgen::IdGenerator;
use crate::ingest::{assemble, ChunkStream};
use crate::s3::AssetStore;
use crate::service::error::ServiceError;
use crate::service::requests::{CreateCampaign, UpdateCampaignProperty};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happens to the stored blob when a campaign is deleted.
/// The observed system retains blobs; purging is opt-in per deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetPolicy {
    pub purge_on_delete: bool,
}

fn asset_key(id: CampaignId) -> String {
    format!("campaigns/{}.img", id)
}

fn versioned_asset_key(id: CampaignId, revision: u64) -> String {
    format!("campaigns/{}.v{}.img", id, revision)
}

fn validate_schedule(
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    start_hour: u8,
    end_hour: u8,
) -> Result<(), ServiceError> {
    if start_at >= end_at {
        return Err(ServiceError::Validation(format!(
            "display window start {} is not before end {}",
            start_at, end_at
        )));
    }
    if start_hour > end_hour {
        return Err(ServiceError::Validation(format!(
            "daily window start hour {} is after end hour {}",
            start_hour, end_hour
        )));
    }
    if end_hour > 24 {
        return Err(ServiceError::Validation(format!(
            "daily window end hour {} is above 24",
            end_hour
        )));
    }
    Ok(())
}

/// Orchestrates campaign creation, updates, counters, and the eligibility
/// read path over the injected store seams.
pub struct CampaignService<S, A, C, G>
where
    S: CampaignStore,
    A: AssetStore,
    C: CacheStore,
    G: IdGenerator,
{
    campaigns: Arc<S>,
    assets: Arc<A>,
    idgen: Arc<G>,
    eligibility: EligibilityCache<Arc<C>, Arc<S>>,
    policy: AssetPolicy,
}

impl<S, A, C, G> CampaignService<S, A, C, G>
where
    S: CampaignStore,
    A: AssetStore,
    C: CacheStore,
    G: IdGenerator,
{
    pub fn new(
        campaigns: Arc<S>,
        assets: Arc<A>,
        cache: Arc<C>,
        idgen: Arc<G>,
        cache_ttl: Duration,
        policy: AssetPolicy,
    ) -> Self {
        let eligibility = EligibilityCache::new(cache, campaigns.clone(), cache_ttl);
        CampaignService {
            campaigns,
            assets,
            idgen,
            eligibility,
            policy,
        }
    }

    /// Create a campaign: assemble the streamed image, allocate an id, then
    /// insert the row and upload the blob concurrently. A one-sided failure
    /// is compensated by deleting whichever side succeeded; only a failed
    /// compensation surfaces as `Partial`.
    pub async fn create<St: ChunkStream>(
        &self,
        req: CreateCampaign,
        stream: &mut St,
    ) -> Result<Campaign, ServiceError> {
        validate_schedule(req.start_at, req.end_at, req.start_hour, req.end_hour)?;

        let image = assemble(stream).await.map_err(ServiceError::from_ingest)?;

        let id = self
            .idgen
            .next_id()
            .map_err(|e| ServiceError::storage("allocating campaign id", e))?;
        let asset_url = asset_key(id);
        let now = Utc::now();

        let campaign = Campaign {
            id,
            owner_id: req.owner_id,
            asset_url: asset_url.clone(),
            link_href: req.link_href,
            text: req.text,
            targeting_regex: req.targeting_regex,
            category: req.category,
            start_at: req.start_at,
            end_at: req.end_at,
            start_hour: req.start_hour,
            end_hour: req.end_hour,
            frequency_cap: req.frequency_cap,
            impression_count: 0,
            click_count: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        debug!("Creating campaign {} ({} byte asset)", id, image.len());

        let (inserted, uploaded) = tokio::join!(
            self.campaigns.create(campaign),
            self.assets.put(&asset_url, image)
        );

        match (inserted, uploaded) {
            (Ok(campaign), Ok(())) => {
                info!("Created campaign {} in category {}", id, campaign.category);
                Ok(campaign)
            }
            (Ok(_), Err(upload_err)) => {
                warn!(
                    "Asset upload failed after row insert for campaign {}, compensating: {}",
                    id, upload_err
                );
                match self.campaigns.delete(id).await {
                    Ok(_) => Err(ServiceError::storage(
                        "uploading campaign asset",
                        upload_err,
                    )),
                    Err(comp_err) => {
                        warn!("Compensating row delete for {} failed: {}", id, comp_err);
                        Err(ServiceError::Partial {
                            op: "create",
                            remnant: format!("campaign row {} remains without its asset", id),
                            source: upload_err.into(),
                        })
                    }
                }
            }
            (Err(insert_err), Ok(())) => {
                warn!(
                    "Row insert failed after asset upload for campaign {}, compensating: {}",
                    id, insert_err
                );
                match self.assets.delete(&asset_url).await {
                    Ok(()) => Err(ServiceError::storage("inserting campaign row", insert_err)),
                    Err(comp_err) => {
                        warn!(
                            "Compensating asset delete for {} failed: {}",
                            asset_url, comp_err
                        );
                        Err(ServiceError::Partial {
                            op: "create",
                            remnant: format!("asset {} remains without its row", asset_url),
                            source: insert_err.into(),
                        })
                    }
                }
            }
            (Err(insert_err), Err(upload_err)) => {
                debug!("Both create sides failed for {}: {}", id, upload_err);
                Err(ServiceError::storage("inserting campaign row", insert_err))
            }
        }
    }

    /// Overwrite scheduling/display metadata. Pure row mutation, no asset
    /// interaction.
    pub async fn update_property(
        &self,
        req: UpdateCampaignProperty,
    ) -> Result<Campaign, ServiceError> {
        let mut campaign = self
            .campaigns
            .get_by_id(req.id)
            .await
            .map_err(|e| ServiceError::from_db("loading campaign", e))?;
        if campaign.deleted_at.is_some() {
            return Err(ServiceError::NotFound(req.id));
        }

        if let Some(link_href) = req.link_href {
            campaign.link_href = link_href;
        }
        if let Some(text) = req.text {
            campaign.text = text;
        }
        if let Some(targeting_regex) = req.targeting_regex {
            campaign.targeting_regex = targeting_regex;
        }
        if let Some(category) = req.category {
            campaign.category = category;
        }
        if let Some(start_at) = req.start_at {
            campaign.start_at = start_at;
        }
        if let Some(end_at) = req.end_at {
            campaign.end_at = end_at;
        }
        if let Some(start_hour) = req.start_hour {
            campaign.start_hour = start_hour;
        }
        if let Some(end_hour) = req.end_hour {
            campaign.end_hour = end_hour;
        }
        if let Some(frequency_cap) = req.frequency_cap {
            campaign.frequency_cap = frequency_cap;
        }

        validate_schedule(
            campaign.start_at,
            campaign.end_at,
            campaign.start_hour,
            campaign.end_hour,
        )?;

        campaign.updated_at = Utc::now();
        let updated = self
            .campaigns
            .update(campaign)
            .await
            .map_err(|e| ServiceError::from_db("updating campaign", e))?;

        info!("Updated properties of campaign {}", updated.id);
        Ok(updated)
    }

    /// Replace a campaign's image: upload the new blob under a fresh
    /// versioned key concurrently with persisting that key, then delete the
    /// replaced blob. Same compensation scheme as `create`.
    pub async fn update_asset<St: ChunkStream>(
        &self,
        id: CampaignId,
        stream: &mut St,
    ) -> Result<Campaign, ServiceError> {
        let existing = self
            .campaigns
            .get_by_id(id)
            .await
            .map_err(|e| ServiceError::from_db("loading campaign", e))?;
        if existing.deleted_at.is_some() {
            return Err(ServiceError::NotFound(id));
        }

        let image = assemble(stream).await.map_err(ServiceError::from_ingest)?;

        let revision = self
            .idgen
            .next_id()
            .map_err(|e| ServiceError::storage("allocating asset revision", e))?;
        let new_url = versioned_asset_key(id, revision);
        let old_url = existing.asset_url.clone();

        let mut updated = existing.clone();
        updated.asset_url = new_url.clone();
        updated.updated_at = Utc::now();

        debug!(
            "Replacing asset of campaign {}: {} -> {}",
            id, old_url, new_url
        );

        let (persisted, uploaded) = tokio::join!(
            self.campaigns.update(updated),
            self.assets.put(&new_url, image)
        );

        match (persisted, uploaded) {
            (Ok(campaign), Ok(())) => {
                // Replaced blob goes last; an orphaned blob is preferred over
                // a row pointing at nothing.
                if let Err(e) = self.assets.delete(&old_url).await {
                    warn!("Failed to delete replaced asset {}: {}", old_url, e);
                }
                info!("Replaced asset of campaign {}", id);
                Ok(campaign)
            }
            (Ok(_), Err(upload_err)) => {
                warn!(
                    "Replacement upload failed after row update for {}, restoring: {}",
                    id, upload_err
                );
                match self.campaigns.update(existing).await {
                    Ok(_) => Err(ServiceError::storage(
                        "uploading replacement asset",
                        upload_err,
                    )),
                    Err(comp_err) => {
                        warn!("Restoring previous asset key for {} failed: {}", id, comp_err);
                        Err(ServiceError::Partial {
                            op: "update_asset",
                            remnant: format!("campaign row {} references missing asset {}", id, new_url),
                            source: upload_err.into(),
                        })
                    }
                }
            }
            (Err(update_err), Ok(())) => {
                warn!(
                    "Row update failed after replacement upload for {}, compensating: {}",
                    id, update_err
                );
                match self.assets.delete(&new_url).await {
                    Ok(()) => Err(ServiceError::storage(
                        "persisting replacement asset key",
                        update_err,
                    )),
                    Err(comp_err) => {
                        warn!(
                            "Compensating asset delete for {} failed: {}",
                            new_url, comp_err
                        );
                        Err(ServiceError::Partial {
                            op: "update_asset",
                            remnant: format!("asset {} remains unreferenced", new_url),
                            source: update_err.into(),
                        })
                    }
                }
            }
            (Err(update_err), Err(_)) => Err(ServiceError::storage(
                "persisting replacement asset key",
                update_err,
            )),
        }
    }

    /// Soft-delete a campaign. The blob is purged only when the deployment's
    /// asset policy says so; a purge failure never undoes the delete.
    pub async fn delete(&self, id: CampaignId) -> Result<Campaign, ServiceError> {
        let campaign = self
            .campaigns
            .delete(id)
            .await
            .map_err(|e| ServiceError::from_db("deleting campaign", e))?;

        if self.policy.purge_on_delete {
            if let Err(e) = self.assets.delete(&campaign.asset_url).await {
                warn!(
                    "Failed to purge asset {} of deleted campaign {}: {}",
                    campaign.asset_url, id, e
                );
            }
        }

        info!("Deleted campaign {}", id);
        Ok(campaign)
    }

    /// Batch-record one impression per listed campaign
    pub async fn record_impressions(&self, ids: &[CampaignId]) -> Result<(), ServiceError> {
        self.campaigns
            .increment_impressions(ids)
            .await
            .map_err(|e| ServiceError::from_db("recording impressions", e))
    }

    /// Record one click
    pub async fn record_click(&self, id: CampaignId) -> Result<(), ServiceError> {
        self.campaigns
            .increment_clicks(id)
            .await
            .map_err(|e| ServiceError::from_db("recording click", e))
    }

    /// The mobile read path: cached eligibility resolution
    pub async fn get_eligible(
        &self,
        category: i32,
        requester_key: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, ServiceError> {
        self.eligibility
            .get_eligible(category, requester_key, as_of)
            .await
            .map_err(|e| ServiceError::storage("resolving eligible campaigns", e))
    }
}
