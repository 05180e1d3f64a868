use bound::{
    cache::{CacheBackend, LocalCache, SqliteCache},
    config::BoundConfig,
    graceful_shutdown::GracefulShutdown,
    resolver::DnsResolver,
    server::Server,
    upstream::UdpUpstream,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Minimal DNS responder answering A and PTR queries from a local table
#[derive(Debug, Parser)]
#[command(name = "bound", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, value_name = "ADDRESS:PORT")]
    bind: Option<SocketAddr>,

    /// SQLite database holding the forward table
    #[arg(short, long, value_name = "FILE")]
    database: Option<String>,

    /// Keep the table in memory instead of SQLite
    #[arg(long)]
    memory: bool,

    /// Upstream server, may be repeated
    #[arg(short, long, value_name = "ADDRESS:PORT")]
    upstream: Vec<SocketAddr>,

    /// Also listen on a raw UDP socket (needs CAP_NET_RAW)
    #[arg(long)]
    raw_socket: bool,

    /// Store upstream answers in the table
    #[arg(long)]
    write_back: bool,
}

impl Args {
    /// Defaults, then the config file, then `BOUND_*` variables, then flags
    fn into_config(self) -> Result<BoundConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = BoundConfig::from_file(path)?;
                config.apply_env()?;
                config
            }
            None => BoundConfig::from_env()?,
        };

        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(database) = self.database {
            config.database_path = database;
        }
        if !self.upstream.is_empty() {
            config.upstream_servers = self.upstream;
        }
        config.in_memory |= self.memory;
        config.raw_socket |= self.raw_socket;
        config.write_back |= self.write_back;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Args::parse().into_config()?;
    info!("Starting bound with {:?}", config);

    let cache: Arc<dyn CacheBackend> = if config.in_memory {
        info!("Using in-memory cache");
        Arc::new(LocalCache::new())
    } else {
        Arc::new(SqliteCache::open(&config.database_path).await?)
    };
    let upstream = Arc::new(UdpUpstream::from_config(&config));
    let resolver = Arc::new(
        DnsResolver::new(cache.clone(), upstream).with_write_back(config.write_back),
    );

    let server = Server::bind(&config, resolver.clone()).await?;
    info!("Listening on port {}...", server.local_addr()?.port());

    let shutdown = GracefulShutdown::new();
    let server_task = Arc::new(Mutex::new(Some(tokio::spawn(
        server.run(shutdown.subscribe()),
    ))));

    shutdown
        .register_component("udp-server".to_string(), move || {
            let server_task = server_task.clone();
            async move {
                if let Some(handle) = server_task.lock().await.take() {
                    handle.await??;
                }
                Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
            }
        })
        .await;

    let stats_resolver = resolver.clone();
    shutdown
        .register_component("cache".to_string(), move || {
            let cache = cache.clone();
            let resolver = stats_resolver.clone();
            async move {
                info!("Resolver statistics: {}", resolver.stats());
                cache.close().await;
                Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
            }
        })
        .await;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");

    if let Err(e) = shutdown.shutdown().await {
        error!("Shutdown failed: {}", e);
    }
    Ok(())
}
