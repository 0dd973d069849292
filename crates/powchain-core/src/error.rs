use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("invalid difficulty {requested}: must be at most {max} leading zeros")]
    InvalidDifficulty { requested: u32, max: u32 },

    #[error("mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },

    #[error("mining timed out after {elapsed:?} ({attempts} attempts)")]
    MiningTimedOut { elapsed: Duration, attempts: u64 },

    #[error("nonce space exhausted searching from {start}")]
    NonceSpaceExhausted { start: u64 },

    #[error("failed to build mining thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a chain failed validation. Each variant names the offending block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("block {index}: stored hash does not match its contents")]
    HashMismatch { index: u64 },

    #[error("block {index}: previous hash does not match its predecessor")]
    BrokenLink { index: u64 },

    #[error("block {index}: hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: u64, difficulty: u32 },
}
