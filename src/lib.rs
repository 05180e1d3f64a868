pub mod cache;
pub mod config;
pub mod dns;
pub mod error;
pub mod graceful_shutdown;
pub mod resolver;
pub mod server;
pub mod target;
pub mod upstream;
pub mod validation;

pub use dns::Query;
pub use target::ResolvedTarget;
