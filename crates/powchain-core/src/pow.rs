use crate::constants::{DEFAULT_DIFFICULTY, HASH_HEX_SIZE};
use crate::error::{ChainError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How many attempts a search makes between checks of its deadline.
const DEADLINE_POLL_INTERVAL: u64 = 1 << 10;

/// Required number of leading `'0'` characters in a block's hex hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Difficulty(u32);

impl Difficulty {
    pub const MAX: u32 = HASH_HEX_SIZE as u32;

    pub fn new(zeros: u32) -> Result<Self> {
        if zeros > Self::MAX {
            return Err(ChainError::InvalidDifficulty {
                requested: zeros,
                max: Self::MAX,
            });
        }
        Ok(Self(zeros))
    }

    pub fn zeros(self) -> u32 {
        self.0
    }

    /// The prefix every qualifying hash starts with.
    pub fn target(self) -> String {
        "0".repeat(self.0 as usize)
    }

    /// Same as `hash.starts_with(&self.target())` without allocating.
    pub fn is_met_by(self, hash: &str) -> bool {
        count_leading_zero_hex(hash) >= self.0
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(DEFAULT_DIFFICULTY)
    }
}

impl TryFrom<u32> for Difficulty {
    type Error = ChainError;

    fn try_from(zeros: u32) -> Result<Self> {
        Self::new(zeros)
    }
}

impl From<Difficulty> for u32 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn count_leading_zero_hex(hash: &str) -> u32 {
    hash.bytes().take_while(|b| *b == b'0').count() as u32
}

/// Shared flag a caller can flip to stop an in-flight mining search.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Once triggered the flag stays set until [`CancelFlag::reset`].
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MiningStrategy {
    #[default]
    Sequential,
    /// Race workers over the nonce space. `None` uses rayon's global pool.
    Parallel { threads: Option<usize> },
}

#[derive(Clone, Debug, Default)]
pub struct MiningOptions {
    pub strategy: MiningStrategy,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelFlag>,
}

impl MiningOptions {
    pub fn sequential() -> Self {
        Self::default()
    }

    pub fn parallel(threads: Option<usize>) -> Self {
        Self {
            strategy: MiningStrategy::Parallel { threads },
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The cancel flag is checked on every call, the clock only once every
    /// `DEADLINE_POLL_INTERVAL` attempts.
    fn interruption(&self, attempts: u64, started: Instant) -> Option<Interrupt> {
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Some(Interrupt::Cancelled);
        }
        match self.timeout {
            Some(limit)
                if attempts % DEADLINE_POLL_INTERVAL == 0 && started.elapsed() >= limit =>
            {
                Some(Interrupt::TimedOut)
            }
            _ => None,
        }
    }
}

/// Outcome of a successful search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiningReport {
    pub nonce: u64,
    pub hash: String,
    pub attempts: u64,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Cancelled,
    TimedOut,
}

impl Interrupt {
    pub(crate) fn into_error(self, attempts: u64, elapsed: Duration) -> ChainError {
        match self {
            Interrupt::Cancelled => ChainError::MiningCancelled { attempts },
            Interrupt::TimedOut => ChainError::MiningTimedOut { elapsed, attempts },
        }
    }
}

/// Increment the nonce until `hash_at(nonce)` meets `difficulty`, starting
/// from an already computed `(nonce, hash)` pair. `poll` runs before every
/// new attempt and may abort the search.
pub(crate) fn search<F, P, E>(
    nonce: u64,
    hash: String,
    difficulty: Difficulty,
    hash_at: F,
    mut poll: P,
) -> std::result::Result<MiningReport, E>
where
    F: Fn(u64) -> String,
    P: FnMut(u64, Instant) -> std::result::Result<(), E>,
{
    let started = Instant::now();
    let (mut nonce, mut hash, mut attempts) = (nonce, hash, 0u64);
    while !difficulty.is_met_by(&hash) {
        poll(attempts, started)?;
        nonce = nonce.wrapping_add(1);
        hash = hash_at(nonce);
        attempts += 1;
    }
    Ok(MiningReport {
        nonce,
        hash,
        attempts,
        elapsed: started.elapsed(),
    })
}

/// Sequential search honouring the cancel flag and timeout in `options`.
pub(crate) fn search_interruptible<F>(
    nonce: u64,
    hash: String,
    difficulty: Difficulty,
    options: &MiningOptions,
    hash_at: F,
) -> Result<MiningReport>
where
    F: Fn(u64) -> String,
{
    search(nonce, hash, difficulty, hash_at, |attempts, started| {
        match options.interruption(attempts, started) {
            Some(stop) => Err(stop.into_error(attempts, started.elapsed())),
            None => Ok(()),
        }
    })
}

/// Parallel search over the nonce space from `start`. The first worker to
/// hit the target wins; the rest stop at their next candidate.
pub(crate) fn search_parallel<F>(
    start: u64,
    difficulty: Difficulty,
    options: &MiningOptions,
    threads: Option<usize>,
    hash_at: F,
) -> Result<MiningReport>
where
    F: Fn(u64) -> String + Sync,
{
    let started = Instant::now();
    let attempts = AtomicU64::new(0);

    let race = || {
        (start..u64::MAX).into_par_iter().find_map_any(|nonce| {
            let n = attempts.fetch_add(1, Ordering::Relaxed);
            if let Some(stop) = options.interruption(n, started) {
                return Some(Err(stop));
            }
            let hash = hash_at(nonce);
            difficulty.is_met_by(&hash).then_some(Ok((nonce, hash)))
        })
    };

    let found = match threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()?
            .install(race),
        None => race(),
    };

    let attempts = attempts.load(Ordering::Relaxed);
    match found {
        Some(Ok((nonce, hash))) => Ok(MiningReport {
            nonce,
            hash,
            attempts,
            elapsed: started.elapsed(),
        }),
        Some(Err(stop)) => Err(stop.into_error(attempts, started.elapsed())),
        None => Err(ChainError::NonceSpaceExhausted { start }),
    }
}
