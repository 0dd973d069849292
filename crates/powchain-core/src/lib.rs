//! Minimal proof-of-work chain: blocks linked by SHA-256 hashes, mined to a
//! leading-zeros target, with a validator that catches tampering.

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod payload;
pub mod pow;
#[cfg(any(test, feature = "tamper"))]
pub mod tamper;

pub use block::{digest, Block};
pub use chain::Chain;
pub use config::{ChainConfig, MiningConfig};
pub use error::{ChainError, Result, ValidationError};
pub use payload::{Payload, Transaction};
pub use pow::{CancelFlag, Difficulty, MiningOptions, MiningReport, MiningStrategy};
#[cfg(any(test, feature = "tamper"))]
pub use tamper::Tamper;
