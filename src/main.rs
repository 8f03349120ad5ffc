use clap::{Parser, Subcommand};
use entity_registry::application::events::TracingObserver;
use entity_registry::application::provider::RegistryProvider;
use entity_registry::config::{CacheConfig, DEFAULT_KEY_PREFIX};
use entity_registry::domain::context::Context;
use entity_registry::domain::entity::{Entity, Metadata};
use entity_registry::domain::ports::CacheBackendBox;
use entity_registry::error::RegistryError;
use entity_registry::infrastructure::file::FileSnapshotStore;
use entity_registry::infrastructure::in_memory::InMemoryCache;
use entity_registry::interfaces::csv::entity_reader::EntityReader;
use entity_registry::interfaces::csv::entity_writer::EntityWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Snapshot file backing the registry. Without it the registry lives only for this run.
    #[arg(long, env = "REGISTRY_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Redis URL for the cache tier (requires the `cache-redis` feature).
    #[arg(long, env = "REGISTRY_REDIS_URL")]
    redis_url: Option<String>,

    /// Cache entry lifetime in seconds (defaults to 24 hours).
    #[arg(long, env = "REGISTRY_TTL_SECS")]
    ttl_secs: Option<u64>,

    /// Namespace for remote cache keys.
    #[arg(long, env = "REGISTRY_KEY_PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    key_prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register every row of an entity CSV file
    Import { input: PathBuf },
    /// Register or replace a single entity
    Register {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Register the entity as inactive
        #[arg(long)]
        inactive: bool,
        /// Metadata entry, repeatable
        #[arg(long = "meta", value_parser = parse_key_val)]
        metadata: Vec<(String, String)>,
    },
    /// Print one entity as JSON
    Get { id: String },
    /// Remove an entity
    Unregister { id: String },
    /// Mark an entity active
    Activate { id: String },
    /// Mark an entity inactive
    Deactivate { id: String },
    /// Print entities as CSV
    List {
        #[arg(long)]
        active: bool,
    },
    /// Case-insensitive search on id, name and metadata values
    Search { query: String },
    /// Entities whose metadata contains every given pair
    SearchMeta {
        #[arg(value_parser = parse_key_val, required = true)]
        filter: Vec<(String, String)>,
    },
    /// Print total and active entity counts
    Count,
    /// Print registry metrics as JSON
    Stats,
    /// Print the health report as JSON
    Health,
}

fn parse_key_val(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn build_cache(redis_url: Option<&str>, config: &CacheConfig) -> Result<CacheBackendBox> {
    if let Some(url) = redis_url {
        #[cfg(feature = "cache-redis")]
        {
            use entity_registry::infrastructure::redis::RedisStore;
            use entity_registry::infrastructure::remote::RemoteCache;

            let store = RedisStore::open(url).into_diagnostic()?;
            return Ok(Box::new(RemoteCache::new(Arc::new(store), config)));
        }
        #[cfg(not(feature = "cache-redis"))]
        {
            tracing::warn!(
                url,
                "Remote cache requested via --redis-url, but the 'cache-redis' feature is not enabled. Falling back to the in-memory cache."
            );
        }
    }
    Ok(Box::new(InMemoryCache::new(config)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn print_csv(entities: &[Entity]) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = EntityWriter::new(stdout.lock());
    writer.write_entities(entities).into_diagnostic()
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut cache_config = CacheConfig::default().with_key_prefix(cli.key_prefix.clone());
    if let Some(secs) = cli.ttl_secs {
        cache_config = cache_config.with_ttl(Duration::from_secs(secs));
    }

    let cache = build_cache(cli.redis_url.as_deref(), &cache_config)?;
    let mut registry = RegistryProvider::new(cache);
    if let Some(path) = &cli.snapshot {
        registry = registry.with_persistence(Box::new(FileSnapshotStore::new(path)));
    }
    registry.events().subscribe(Arc::new(TracingObserver));

    let ctx = Context::background();
    registry.restore(&ctx).await.into_diagnostic()?;

    match cli.command {
        Command::Import { input } => {
            let file = File::open(input).into_diagnostic()?;
            let mut imported = 0;
            for row in EntityReader::new(file).entities() {
                match row {
                    Ok(entity) => match registry.register(&ctx, entity).await {
                        Ok(_) => imported += 1,
                        Err(e) => eprintln!("Error registering entity: {}", e),
                    },
                    Err(e) => eprintln!("Error reading entity: {}", e),
                }
            }
            println!("imported {imported}");
        }
        Command::Register {
            id,
            name,
            inactive,
            metadata,
        } => {
            let mut entity = Entity::new(id, name).with_active(!inactive);
            for (key, value) in metadata {
                entity.set_metadata(key, value).into_diagnostic()?;
            }
            let stored = registry.register(&ctx, entity).await.into_diagnostic()?;
            print_json(&stored)?;
        }
        Command::Get { id } => {
            let entity = registry
                .get(&ctx, &id)
                .await
                .into_diagnostic()?
                .ok_or(RegistryError::NotFound(id))
                .into_diagnostic()?;
            print_json(&entity)?;
        }
        Command::Unregister { id } => {
            if registry.unregister(&ctx, &id).await.into_diagnostic()? {
                println!("unregistered {id}");
            } else {
                println!("not found {id}");
            }
        }
        Command::Activate { id } => {
            print_json(&registry.activate(&ctx, &id).await.into_diagnostic()?)?;
        }
        Command::Deactivate { id } => {
            print_json(&registry.deactivate(&ctx, &id).await.into_diagnostic()?)?;
        }
        Command::List { active } => {
            let entities = if active {
                registry.list_active(&ctx).await
            } else {
                registry.list(&ctx).await
            }
            .into_diagnostic()?;
            print_csv(&entities)?;
        }
        Command::Search { query } => {
            print_csv(&registry.search(&ctx, &query).await.into_diagnostic()?)?;
        }
        Command::SearchMeta { filter } => {
            let filter: Metadata = filter.into_iter().collect();
            print_csv(&registry.search_by_metadata(&ctx, &filter).await.into_diagnostic()?)?;
        }
        Command::Count => {
            let total = registry.count(&ctx).await.into_diagnostic()?;
            let active = registry.count_active(&ctx).await.into_diagnostic()?;
            println!("total={total} active={active}");
        }
        Command::Stats => print_json(&registry.stats())?,
        Command::Health => print_json(&registry.health_status())?,
    }

    Ok(())
}
