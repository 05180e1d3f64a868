use crate::error::ConfigError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Upper bound for `max_concurrent_queries`
pub const MAX_CONCURRENT_QUERIES_LIMIT: usize = 65_536;

#[derive(Debug, Clone)]
pub struct BoundConfig {
    /// Address both listening sockets bind to
    pub bind_addr: SocketAddr,

    /// Also capture packets through a raw IPPROTO_UDP socket (needs CAP_NET_RAW)
    pub raw_socket: bool,

    /// SQLite database holding the forward table
    pub database_path: String,

    /// Use an in-memory table instead of SQLite
    pub in_memory: bool,

    /// Upstream DNS servers consulted on cache misses, in order
    pub upstream_servers: Vec<SocketAddr>,

    /// Timeout for a single upstream attempt
    pub upstream_timeout: Duration,

    /// Maximum number of retries per upstream server
    pub max_retries: u8,

    /// Size of the per-datagram receive buffer; longer datagrams are truncated
    pub recv_buffer_size: usize,

    /// Max number of queries resolved concurrently
    pub max_concurrent_queries: usize,

    /// Store upstream answers back into the cache
    pub write_back: bool,
}

impl Default for BoundConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:53".parse().expect("Default bind address is valid"),
            raw_socket: false,
            database_path: "bound.db".to_string(),
            in_memory: false,
            upstream_servers: vec!["8.8.8.8:53".parse().expect("Google DNS is valid")],
            upstream_timeout: Duration::from_secs(5),
            max_retries: 2,
            recv_buffer_size: 512,
            max_concurrent_queries: 1024,
            write_back: false,
        }
    }
}

/// On-disk representation; every field is optional and overrides the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    bind_addr: Option<String>,
    raw_socket: Option<bool>,
    database_path: Option<String>,
    in_memory: Option<bool>,
    upstream_servers: Option<Vec<String>>,
    upstream_timeout_secs: Option<u64>,
    max_retries: Option<u8>,
    recv_buffer_size: Option<usize>,
    max_concurrent_queries: Option<usize>,
    write_back: Option<bool>,
}

impl BoundConfig {
    /// Load a TOML file on top of the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::default();
        config.apply_toml(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the contents of a TOML document to this configuration
    pub fn apply_toml(&mut self, text: &str) -> Result<(), ConfigError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| ConfigError::File(e.message().to_string()))?;

        if let Some(bind_addr) = file.bind_addr {
            self.bind_addr = bind_addr
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress(bind_addr))?;
        }
        if let Some(raw_socket) = file.raw_socket {
            self.raw_socket = raw_socket;
        }
        if let Some(database_path) = file.database_path {
            self.database_path = database_path;
        }
        if let Some(in_memory) = file.in_memory {
            self.in_memory = in_memory;
        }
        if let Some(servers) = file.upstream_servers {
            self.upstream_servers = parse_servers(servers.iter().map(String::as_str))?;
        }
        if let Some(secs) = file.upstream_timeout_secs {
            self.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(max_retries) = file.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(size) = file.recv_buffer_size {
            self.recv_buffer_size = size;
        }
        if let Some(max) = file.max_concurrent_queries {
            self.max_concurrent_queries = max;
        }
        if let Some(write_back) = file.write_back {
            self.write_back = write_back;
        }
        Ok(())
    }

    /// Create a BoundConfig from environment variables
    /// Returns Err if critical configuration is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields with `BOUND_*` environment variables if present
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(bind_addr) = std::env::var("BOUND_BIND_ADDR") {
            self.bind_addr = bind_addr
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress(bind_addr))?;
        }

        if let Ok(raw_socket) = std::env::var("BOUND_RAW_SOCKET") {
            self.raw_socket = parse_bool(&raw_socket, false);
        }

        if let Ok(database_path) = std::env::var("BOUND_DATABASE") {
            if !database_path.is_empty() {
                self.database_path = database_path;
            }
        }

        if let Ok(upstream_servers) = std::env::var("BOUND_UPSTREAM_SERVERS") {
            self.upstream_servers = parse_servers(upstream_servers.split(','))?;
        }

        if let Ok(timeout_str) = std::env::var("BOUND_UPSTREAM_TIMEOUT") {
            let timeout_secs = timeout_str
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(timeout_str.clone()))?;
            self.upstream_timeout = Duration::from_secs(timeout_secs);
        }

        if let Ok(max_retries) = std::env::var("BOUND_MAX_RETRIES") {
            self.max_retries = max_retries.parse::<u8>().map_err(|_| {
                ConfigError::ParseError(format!("Invalid max retries: {}", max_retries))
            })?;
        }

        if let Ok(size) = std::env::var("BOUND_RECV_BUFFER_SIZE") {
            self.recv_buffer_size = size
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidBufferSize(size))?;
        }

        if let Ok(max_concurrent) = std::env::var("BOUND_MAX_CONCURRENT_QUERIES") {
            self.max_concurrent_queries = max_concurrent
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidConcurrency(max_concurrent))?;
        }

        if let Ok(write_back) = std::env::var("BOUND_WRITE_BACK") {
            self.write_back = parse_bool(&write_back, false);
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if self.upstream_timeout.as_secs() > 300 {
            return Err(ConfigError::InvalidTimeout(
                "Timeout too large (max 300 seconds)".to_string(),
            ));
        }

        // Header alone is 12 bytes; a datagram can never exceed 64KiB
        if self.recv_buffer_size < 12 || self.recv_buffer_size > 65_535 {
            return Err(ConfigError::InvalidBufferSize(format!(
                "{} (must be between 12 and 65535)",
                self.recv_buffer_size
            )));
        }

        if self.max_concurrent_queries == 0 {
            return Err(ConfigError::InvalidConcurrency(
                "Max concurrent queries must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_queries > MAX_CONCURRENT_QUERIES_LIMIT {
            return Err(ConfigError::InvalidConcurrency(format!(
                "{} (max {})",
                self.max_concurrent_queries, MAX_CONCURRENT_QUERIES_LIMIT
            )));
        }

        if !self.in_memory && self.database_path.is_empty() {
            return Err(ConfigError::ParseError(
                "Database path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_servers<'a>(items: impl Iterator<Item = &'a str>) -> Result<Vec<SocketAddr>, ConfigError> {
    let servers = items
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<SocketAddr>()
                .map_err(|_| ConfigError::InvalidUpstreamServer(s.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if servers.is_empty() {
        return Err(ConfigError::InvalidUpstreamServer(
            "No valid upstream servers provided".to_string(),
        ));
    }
    Ok(servers)
}

/// Parse a boolean from a string, with a default value for invalid input
pub fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
