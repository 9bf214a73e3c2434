//! mediadex - resolve a title across catalogs from the command line

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use mediadex_common::config::{resolve_root_folder, TomlConfig};
use mediadex_common::db::init_database;
use mediadex_resolver::db::seed::seed_from_synonym_dump;
use mediadex_resolver::sources::configure_sources;
use mediadex_resolver::{CacheStore, Medium, Query, Resolver, ResolverConfig, Source};

/// Command-line arguments for mediadex
#[derive(Parser, Debug)]
#[command(name = "mediadex")]
#[command(about = "Multi-catalog media title lookup with a persistent cache")]
#[command(version)]
struct Args {
    /// TOML config file (default: MEDIADEX_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the cache database (default: MEDIADEX_ROOT_FOLDER, then TOML)
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a title and print the document of every matching catalog
    Resolve {
        text: String,

        #[arg(short, long)]
        medium: Medium,

        /// Restrict to these sources (repeatable); all registered sources by default
        #[arg(short, long = "source", value_name = "SOURCE")]
        sources: Vec<Source>,
    },

    /// Pre-seed the cache from the popular-titles feed
    Prime {
        #[arg(short, long)]
        medium: Medium,

        /// Number of feed pages to walk
        #[arg(short, long, default_value_t = 1)]
        pages: u32,

        /// Entries to cross-resolve against the secondary source
        #[arg(short, long, default_value_t = 0)]
        cross: usize,
    },

    /// Import a synonym dump (sqlite file with a `synonyms` table)
    Seed { dump_path: PathBuf },

    /// Delete expired payloads and lookup misses
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting mediadex v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = config.database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open cache database {}", db_path.display()))?;
    let cache = CacheStore::with_ttl(pool.clone(), config.cache.payload_ttl());

    match args.command {
        Command::Resolve {
            text,
            medium,
            sources,
        } => {
            let configured =
                configure_sources(&config.sources).context("Failed to configure sources")?;
            let resolver = Resolver::new(
                cache,
                configured.registry,
                ResolverConfig::from_sources_config(&config.sources),
            );

            let query = Query::new(text, medium);
            let requested = (!sources.is_empty()).then_some(sources.as_slice());
            let result = resolver.resolve(&query, requested).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Prime {
            medium,
            pages,
            cross,
        } => {
            let configured =
                configure_sources(&config.sources).context("Failed to configure sources")?;
            let feed = configured
                .popular_feed
                .context("No popular feed available: enable the anilist source")?;
            let resolver = Resolver::new(
                cache,
                configured.registry,
                ResolverConfig::from_sources_config(&config.sources),
            );

            let report = resolver
                .prime(feed.as_ref(), config.primer.secondary, medium, pages, cross)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Seed { dump_path } => {
            let report = seed_from_synonym_dump(&pool, &dump_path)
                .await
                .with_context(|| format!("Failed to seed from {}", dump_path.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Purge => {
            let removed = cache
                .purge_expired()
                .await
                .context("Failed to purge expired cache rows")?;
            println!("Removed {} expired rows", removed);
        }
    }

    pool.close().await;
    Ok(())
}
