use std::path::PathBuf;

pub use anyhow::Result;

/// Custom error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not access {0:?}")]
    Io(PathBuf),
    #[error("invalid sector number {content:?} on line {line}: {reason}")]
    Parse {
        line: usize,
        content: String,
        reason: String,
    },
    #[error("could not connect to {api} API at {endpoint}")]
    Connection { api: &'static str, endpoint: String },
    #[error("invalid actor address: {0}")]
    Address(String),
    #[error("querying sectors of miner {0} failed")]
    Query(String),
    #[error("iterating partition sector bitmap")]
    Iteration,
    #[error("invalid bitfield: {0}")]
    InvalidBitField(String),
    #[error("window post generation failed: {0}")]
    Proof(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}
