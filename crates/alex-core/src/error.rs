use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus client is not connected")]
    NotConnected,
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

pub type BusResult<T> = Result<T, BusError>;
