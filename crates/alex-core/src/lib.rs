pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod payload;
pub mod supervisor;
pub mod topics;

pub use cache::{CachedMessage, TopicCache};
pub use client::BusClient;
pub use config::BusConfig;
pub use connection::ConnectionState;
pub use error::{BusError, BusResult, ConfigError};
pub use payload::{encode_outbound, Payload};
pub use supervisor::{spawn_supervisor, ExponentialBackoff, NoReconnect, ReconnectPolicy};
