use crate::error::Result;
use crate::payload::Payload;
use crate::pow::{self, Difficulty, MiningOptions, MiningReport, MiningStrategy};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// One link of the chain.
///
/// A block starts out pending: its hash is computed at construction but has
/// not been searched for proof of work. [`Block::mine`] seals it. Fields are
/// read-only outside the crate; mining is the only way `nonce` and `hash`
/// change in normal use.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub(crate) index: u64,
    pub(crate) timestamp: u64,
    pub(crate) transactions: Payload,
    pub(crate) previous_hash: String,
    pub(crate) nonce: u64,
    pub(crate) hash: String,
    #[serde(skip)]
    pub(crate) sealed: bool,
}

impl Block {
    pub fn new(
        index: u64,
        transactions: impl Into<Payload>,
        previous_hash: impl Into<String>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp: now_millis(),
            transactions: transactions.into(),
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: String::new(),
            sealed: false,
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Genesis is trusted as-is and never mined.
    pub(crate) fn genesis(
        transactions: impl Into<Payload>,
        previous_hash: impl Into<String>,
    ) -> Self {
        let mut block = Self::new(0, transactions, previous_hash);
        block.sealed = true;
        block
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &Payload {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Recompute the digest from the current fields.
    pub fn calculate_hash(&self) -> String {
        self.preimage().hash_with_nonce(self.nonce)
    }

    pub fn meets_difficulty(&self, difficulty: Difficulty) -> bool {
        difficulty.is_met_by(&self.hash)
    }

    /// Search nonces until the hash has `difficulty` leading zeros. Blocks the
    /// calling thread for as long as that takes.
    pub fn mine(&mut self, difficulty: Difficulty) -> MiningReport {
        let preimage = self.preimage();
        let found = pow::search(
            self.nonce,
            self.hash.clone(),
            difficulty,
            |nonce| preimage.hash_with_nonce(nonce),
            |_, _| Ok::<(), Infallible>(()),
        );
        let report = match found {
            Ok(report) => report,
            Err(never) => match never {},
        };
        self.seal(&report);
        report
    }

    /// Like [`Block::mine`] but honours the strategy, timeout and cancel flag
    /// in `options`. On error the block is left exactly as it was.
    pub fn mine_with(
        &mut self,
        difficulty: Difficulty,
        options: &MiningOptions,
    ) -> Result<MiningReport> {
        let preimage = self.preimage();
        let hash_at = |nonce: u64| preimage.hash_with_nonce(nonce);
        let found = match options.strategy {
            MiningStrategy::Sequential => pow::search_interruptible(
                self.nonce,
                self.hash.clone(),
                difficulty,
                options,
                hash_at,
            ),
            MiningStrategy::Parallel { threads } => {
                pow::search_parallel(self.nonce, difficulty, options, threads, hash_at)
            }
        };
        match found {
            Ok(report) => {
                self.seal(&report);
                Ok(report)
            }
            Err(e) => {
                warn!("Mining block {} stopped: {}", self.index, e);
                Err(e)
            }
        }
    }

    fn seal(&mut self, report: &MiningReport) {
        self.nonce = report.nonce;
        self.hash = report.hash.clone();
        self.sealed = true;
        info!("Block mined: {}", self.hash);
        info!(
            "Mining block {} took {:.2} seconds ({} attempts, nonce {})",
            self.index,
            report.elapsed.as_secs_f64(),
            report.attempts,
            report.nonce
        );
    }

    /// Everything but the nonce, already fed to the hasher.
    fn preimage(&self) -> Preimage {
        Preimage::new(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
        )
    }
}

/// SHA-256 of `index ‖ timestamp ‖ transactions ‖ previous_hash ‖ nonce`, all
/// rendered as text and concatenated without separators, hex encoded.
pub fn digest(
    index: u64,
    timestamp: u64,
    transactions: &Payload,
    previous_hash: &str,
    nonce: u64,
) -> String {
    Preimage::new(index, timestamp, transactions, previous_hash).hash_with_nonce(nonce)
}

struct Preimage {
    hasher: Sha256,
}

impl Preimage {
    fn new(index: u64, timestamp: u64, transactions: &Payload, previous_hash: &str) -> Self {
        let prefix = format!("{index}{timestamp}{}{previous_hash}", transactions.canonical());
        Self {
            hasher: Sha256::new_with_prefix(prefix.as_bytes()),
        }
    }

    fn hash_with_nonce(&self, nonce: u64) -> String {
        let mut hasher = self.hasher.clone();
        hasher.update(nonce.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
