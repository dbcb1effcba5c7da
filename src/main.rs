use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod cache;
mod config;
mod db;
mod idgen;
mod ingest;
mod logging;
mod s3;
mod service;
#[cfg(test)]
mod test_utils;

use crate::cache::RedisCacheStore;
use crate::db::PostgresCampaignStore;
use crate::idgen::SnowflakeIdGenerator;
use crate::ingest::BytesChunkStream;
use crate::s3::S3AssetStore;
use crate::service::{AssetPolicy, CampaignService, CreateCampaign, UpdateCampaignProperty};

/// Chunk size used when feeding a local file through the ingest path
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

type Service =
    CampaignService<PostgresCampaignStore, S3AssetStore, RedisCacheStore, SnowflakeIdGenerator>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.toml",
        global = true
    )]
    config: String,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a campaign from an image file and scheduling metadata
    Create {
        /// Image file streamed through the ingest path
        #[arg(long)]
        image: PathBuf,

        #[arg(long)]
        category: i32,

        #[arg(long)]
        link_href: String,

        #[arg(long)]
        text: String,

        #[arg(long, default_value = "")]
        targeting_regex: String,

        /// Display window start (RFC3339)
        #[arg(long)]
        start_at: String,

        /// Display window end (RFC3339)
        #[arg(long)]
        end_at: String,

        #[arg(long, default_value_t = 0)]
        start_hour: u8,

        #[arg(long, default_value_t = 24)]
        end_hour: u8,

        #[arg(long, default_value_t = 0)]
        frequency_cap: u32,

        #[arg(long)]
        owner_id: Option<u64>,
    },
    /// Overwrite scheduling/display metadata of a campaign
    UpdateProperty {
        #[arg(long)]
        id: u64,

        #[arg(long)]
        link_href: Option<String>,

        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        targeting_regex: Option<String>,

        #[arg(long)]
        category: Option<i32>,

        #[arg(long)]
        start_at: Option<String>,

        #[arg(long)]
        end_at: Option<String>,

        #[arg(long)]
        start_hour: Option<u8>,

        #[arg(long)]
        end_hour: Option<u8>,

        #[arg(long)]
        frequency_cap: Option<u32>,
    },
    /// Replace a campaign's image
    UpdateAsset {
        #[arg(long)]
        id: u64,

        #[arg(long)]
        image: PathBuf,
    },
    /// Soft-delete a campaign
    Delete {
        #[arg(long)]
        id: u64,
    },
    /// Resolve the eligible campaigns for a category and requester
    Eligible {
        #[arg(long)]
        category: i32,

        #[arg(long)]
        requester: String,

        /// Evaluation instant (RFC3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Record one impression per listed campaign id
    Impress {
        #[arg(long, num_args = 1..)]
        ids: Vec<u64>,
    },
    /// Record a click on a campaign
    Click {
        #[arg(long)]
        id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", cli.config, e);
            process::exit(1);
        }
    };

    let _log_guard = logging::init_logging(config.logging.as_ref(), cli.verbose)?;

    info!("Campaign engine v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config);

    let service = initialize_service(&config).await?;

    let result = run_command(&service, cli.command).await;
    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }

    Ok(())
}

async fn initialize_service(config: &config::Config) -> Result<Service> {
    let campaigns = Arc::new(
        PostgresCampaignStore::new(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to connect to the campaign database")?,
    );
    let assets = Arc::new(
        S3AssetStore::new(&config.s3)
            .await
            .context("Failed to initialize the asset store")?,
    );
    let cache = Arc::new(
        RedisCacheStore::new(&config.cache)
            .await
            .context("Failed to connect to the cache store")?,
    );
    let idgen = Arc::new(
        SnowflakeIdGenerator::new(config.idgen.machine_id)
            .context("Failed to initialize the id generator")?,
    );

    let service = CampaignService::new(
        campaigns,
        assets,
        cache,
        idgen,
        Duration::from_secs(config.cache.ttl_seconds),
        AssetPolicy {
            purge_on_delete: config.campaigns.purge_assets_on_delete,
        },
    );

    info!("Campaign service initialized successfully");
    Ok(service)
}

async fn run_command(service: &Service, command: Commands) -> Result<()> {
    match command {
        Commands::Create {
            image,
            category,
            link_href,
            text,
            targeting_regex,
            start_at,
            end_at,
            start_hour,
            end_hour,
            frequency_cap,
            owner_id,
        } => {
            let data = tokio::fs::read(&image)
                .await
                .context(format!("Failed to read image file {}", image.display()))?;
            let mut stream = BytesChunkStream::from_bytes(&data, UPLOAD_CHUNK_BYTES);

            let request = CreateCampaign {
                owner_id,
                link_href,
                text,
                targeting_regex,
                category,
                start_at: parse_timestamp(&start_at)?,
                end_at: parse_timestamp(&end_at)?,
                start_hour,
                end_hour,
                frequency_cap,
            };

            let campaign = service.create(request, &mut stream).await?;
            info!(
                "Created campaign {} serving asset {}",
                campaign.id, campaign.asset_url
            );
            println!("{}", campaign.id);
        }
        Commands::UpdateProperty {
            id,
            link_href,
            text,
            targeting_regex,
            category,
            start_at,
            end_at,
            start_hour,
            end_hour,
            frequency_cap,
        } => {
            let request = UpdateCampaignProperty {
                id,
                link_href,
                text,
                targeting_regex,
                category,
                start_at: start_at.as_deref().map(parse_timestamp).transpose()?,
                end_at: end_at.as_deref().map(parse_timestamp).transpose()?,
                start_hour,
                end_hour,
                frequency_cap,
            };

            let campaign = service.update_property(request).await?;
            info!("Updated campaign {}", campaign.id);
        }
        Commands::UpdateAsset { id, image } => {
            let data = tokio::fs::read(&image)
                .await
                .context(format!("Failed to read image file {}", image.display()))?;
            let mut stream = BytesChunkStream::from_bytes(&data, UPLOAD_CHUNK_BYTES);

            let campaign = service.update_asset(id, &mut stream).await?;
            info!(
                "Campaign {} now serves asset {}",
                campaign.id, campaign.asset_url
            );
        }
        Commands::Delete { id } => {
            let campaign = service.delete(id).await?;
            info!("Deleted campaign {}", campaign.id);
        }
        Commands::Eligible {
            category,
            requester,
            at,
        } => {
            let as_of = match at {
                Some(ts) => parse_timestamp(&ts)?,
                None => Utc::now(),
            };

            let campaigns = service.get_eligible(category, &requester, as_of).await?;
            info!(
                "{} campaigns eligible in category {} as of {}",
                campaigns.len(),
                category,
                as_of
            );
            println!("{}", serde_json::to_string_pretty(&campaigns)?);
        }
        Commands::Impress { ids } => {
            service.record_impressions(&ids).await?;
            info!("Recorded impressions for {} campaigns", ids.len());
        }
        Commands::Click { id } => {
            service.record_click(id).await?;
            info!("Recorded click on campaign {}", id);
        }
    }

    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .context(format!("Failed to parse timestamp: {}", value))?
        .with_timezone(&Utc))
}
