use crate::db::CampaignId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decoded request to create a campaign. The image itself arrives separately
/// as a chunk stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub owner_id: Option<u64>,
    pub link_href: String,
    pub text: String,
    pub targeting_regex: String,
    pub category: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub start_hour: u8,
    pub end_hour: u8,
    pub frequency_cap: u32,
}

/// Decoded request to overwrite scheduling/display metadata field by field.
/// Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCampaignProperty {
    pub id: CampaignId,
    pub link_href: Option<String>,
    pub text: Option<String>,
    pub targeting_regex: Option<String>,
    pub category: Option<i32>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub start_hour: Option<u8>,
    pub end_hour: Option<u8>,
    pub frequency_cap: Option<u32>,
}
