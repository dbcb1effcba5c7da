use crate::db::campaigns::CampaignStore;
use crate::db::error::DatabaseError;
use crate::db::models::{Campaign, CampaignId};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, error, info};

/// A PostgreSQL implementation of the CampaignStore trait
pub struct PostgresCampaignStore {
    pool: PgPool,
}

impl PostgresCampaignStore {
    /// Create a new PostgresCampaignStore with the given connection URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(60))
            .connect_lazy(database_url)
            .map_err(|e| {
                error!("Failed to create connection pool: {}", e);
                DatabaseError::ConnectionError(e.to_string())
            })?;

        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            error!("Database connectivity test failed: {}", e);
            return Err(DatabaseError::ConnectionError(format!(
                "Database is not accessible: {}",
                e
            )));
        }

        let store = PostgresCampaignStore { pool };
        store.initialize_schema().await?;

        info!("PostgreSQL campaign store connection established successfully");
        Ok(store)
    }

    /// Create the campaigns table and the read-path index if missing
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let create_table_query = r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                id BIGINT PRIMARY KEY,
                owner_id BIGINT,
                asset_url TEXT NOT NULL,
                link_href TEXT NOT NULL,
                text TEXT NOT NULL,
                targeting_regex TEXT NOT NULL,
                category INTEGER NOT NULL,
                start_at TIMESTAMPTZ NOT NULL,
                end_at TIMESTAMPTZ NOT NULL,
                start_hour SMALLINT NOT NULL,
                end_hour SMALLINT NOT NULL,
                frequency_cap INTEGER NOT NULL DEFAULT 0,
                impression_count BIGINT NOT NULL DEFAULT 0,
                click_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                deleted_at TIMESTAMPTZ
            )
        "#;

        debug!("Ensuring campaigns table exists");
        sqlx::query(create_table_query)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to create campaigns table: {}", e);
                DatabaseError::QueryError(format!("Failed to create table: {}", e))
            })?;

        let create_index_query = r#"
            CREATE INDEX IF NOT EXISTS campaigns_category_window_idx
            ON campaigns (category, start_at, end_at)
        "#;

        debug!("Ensuring read-path index exists");
        sqlx::query(create_index_query)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to create index: {}", e);
                DatabaseError::QueryError(format!("Failed to create index: {}", e))
            })?;

        Ok(())
    }
}

const CAMPAIGN_COLUMNS: &str = "id, owner_id, asset_url, link_href, text, targeting_regex, \
     category, start_at, end_at, start_hour, end_hour, frequency_cap, \
     impression_count, click_count, created_at, updated_at, deleted_at";

fn campaign_from_row(row: &PgRow) -> Result<Campaign, DatabaseError> {
    let get = |e: sqlx::Error| DatabaseError::DeserializationError(e.to_string());

    Ok(Campaign {
        id: row.try_get::<i64, _>("id").map_err(get)? as u64,
        owner_id: row
            .try_get::<Option<i64>, _>("owner_id")
            .map_err(get)?
            .map(|v| v as u64),
        asset_url: row.try_get("asset_url").map_err(get)?,
        link_href: row.try_get("link_href").map_err(get)?,
        text: row.try_get("text").map_err(get)?,
        targeting_regex: row.try_get("targeting_regex").map_err(get)?,
        category: row.try_get("category").map_err(get)?,
        start_at: row.try_get("start_at").map_err(get)?,
        end_at: row.try_get("end_at").map_err(get)?,
        start_hour: row.try_get::<i16, _>("start_hour").map_err(get)? as u8,
        end_hour: row.try_get::<i16, _>("end_hour").map_err(get)? as u8,
        frequency_cap: row.try_get::<i32, _>("frequency_cap").map_err(get)? as u32,
        impression_count: row.try_get::<i64, _>("impression_count").map_err(get)? as u64,
        click_count: row.try_get::<i64, _>("click_count").map_err(get)? as u64,
        created_at: row.try_get("created_at").map_err(get)?,
        updated_at: row.try_get("updated_at").map_err(get)?,
        deleted_at: row.try_get("deleted_at").map_err(get)?,
    })
}

#[async_trait]
impl CampaignStore for PostgresCampaignStore {
    async fn create(&self, campaign: Campaign) -> Result<Campaign, DatabaseError> {
        debug!("Inserting campaign {}", campaign.id);

        let query = format!(
            "INSERT INTO campaigns ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            CAMPAIGN_COLUMNS
        );

        sqlx::query(&query)
            .bind(campaign.id as i64)
            .bind(campaign.owner_id.map(|v| v as i64))
            .bind(&campaign.asset_url)
            .bind(&campaign.link_href)
            .bind(&campaign.text)
            .bind(&campaign.targeting_regex)
            .bind(campaign.category)
            .bind(campaign.start_at)
            .bind(campaign.end_at)
            .bind(campaign.start_hour as i16)
            .bind(campaign.end_hour as i16)
            .bind(campaign.frequency_cap as i32)
            .bind(campaign.impression_count as i64)
            .bind(campaign.click_count as i64)
            .bind(campaign.created_at)
            .bind(campaign.updated_at)
            .bind(campaign.deleted_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to insert campaign {}: {}", campaign.id, e);
                DatabaseError::QueryError(e.to_string())
            })?;

        Ok(campaign)
    }

    async fn get_by_id(&self, id: CampaignId) -> Result<Campaign, DatabaseError> {
        let query = format!("SELECT {} FROM campaigns WHERE id = $1", CAMPAIGN_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to fetch campaign {}: {}", id, e);
                DatabaseError::QueryError(e.to_string())
            })?;

        match row {
            Some(row) => campaign_from_row(&row),
            None => Err(DatabaseError::NotFound(id)),
        }
    }

    async fn latest_id(&self) -> Result<Option<CampaignId>, DatabaseError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT max(id) FROM campaigns")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to fetch latest campaign id: {}", e);
                DatabaseError::QueryError(e.to_string())
            })?;

        Ok(max.map(|v| v as u64))
    }

    async fn update(&self, campaign: Campaign) -> Result<Campaign, DatabaseError> {
        debug!("Updating campaign {}", campaign.id);

        let result = sqlx::query(
            "UPDATE campaigns SET \
                owner_id = $2, asset_url = $3, link_href = $4, text = $5, \
                targeting_regex = $6, category = $7, start_at = $8, end_at = $9, \
                start_hour = $10, end_hour = $11, frequency_cap = $12, \
                updated_at = $13, deleted_at = $14 \
             WHERE id = $1",
        )
        .bind(campaign.id as i64)
        .bind(campaign.owner_id.map(|v| v as i64))
        .bind(&campaign.asset_url)
        .bind(&campaign.link_href)
        .bind(&campaign.text)
        .bind(&campaign.targeting_regex)
        .bind(campaign.category)
        .bind(campaign.start_at)
        .bind(campaign.end_at)
        .bind(campaign.start_hour as i16)
        .bind(campaign.end_hour as i16)
        .bind(campaign.frequency_cap as i32)
        .bind(campaign.updated_at)
        .bind(campaign.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to update campaign {}: {}", campaign.id, e);
            DatabaseError::QueryError(e.to_string())
        })?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(campaign.id));
        }

        Ok(campaign)
    }

    async fn delete(&self, id: CampaignId) -> Result<Campaign, DatabaseError> {
        debug!("Soft-deleting campaign {}", id);

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE campaigns SET deleted_at = $2, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id as i64)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to delete campaign {}: {}", id, e);
            DatabaseError::QueryError(e.to_string())
        })?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(id));
        }

        self.get_by_id(id).await
    }

    async fn find_eligible(
        &self,
        category: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, DatabaseError> {
        debug!(
            "Querying eligible campaigns for category {} as of {}",
            category, as_of
        );

        let query = format!(
            "SELECT {} FROM campaigns \
             WHERE category = $1 AND deleted_at IS NULL \
               AND start_at <= $2 AND end_at > $2 \
               AND start_hour <= $3 AND end_hour >= $3 \
             ORDER BY created_at DESC",
            CAMPAIGN_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(category)
            .bind(as_of)
            .bind(as_of.hour() as i16)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Eligibility query failed: {}", e);
                DatabaseError::QueryError(e.to_string())
            })?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            result.push(campaign_from_row(row)?);
        }

        debug!("Eligibility query returned {} campaigns", result.len());
        Ok(result)
    }

    async fn get_by_ids(
        &self,
        ids: &[CampaignId],
        category: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_params: Vec<i64> = ids.iter().map(|id| *id as i64).collect();
        let query = format!(
            "SELECT {} FROM campaigns \
             WHERE id = ANY($1) AND category = $2 AND deleted_at IS NULL \
               AND start_at <= $3 AND end_at > $3 \
               AND start_hour <= $4 AND end_hour >= $4 \
             ORDER BY created_at DESC",
            CAMPAIGN_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(&id_params)
            .bind(category)
            .bind(as_of)
            .bind(as_of.hour() as i16)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Id-set eligibility query failed: {}", e);
                DatabaseError::QueryError(e.to_string())
            })?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            result.push(campaign_from_row(row)?);
        }

        Ok(result)
    }

    async fn increment_impressions(&self, ids: &[CampaignId]) -> Result<(), DatabaseError> {
        if ids.is_empty() {
            return Ok(());
        }

        let id_params: Vec<i64> = ids.iter().map(|id| *id as i64).collect();
        sqlx::query(
            "UPDATE campaigns \
             SET impression_count = impression_count + 1, updated_at = now() \
             WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(&id_params)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to increment impressions: {}", e);
            DatabaseError::QueryError(e.to_string())
        })?;

        Ok(())
    }

    async fn increment_clicks(&self, id: CampaignId) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE campaigns \
             SET click_count = click_count + 1, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to increment clicks for {}: {}", id, e);
            DatabaseError::QueryError(e.to_string())
        })?;

        Ok(())
    }
}
