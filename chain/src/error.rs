use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("gateway request failed: {0}")]
    Http(String),

    #[error("gateway returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("could not decode gateway response: {0}")]
    Decode(String),

    #[error("no registry deployed on the upstream chain")]
    RegistryMissing,

    #[error("unknown entity: {0}")]
    NotFound(String),
}
