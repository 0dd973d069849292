use crate::constants::{DEFAULT_DIFFICULTY, GENESIS_MARKER};
use crate::error::{ChainError, Result};
use crate::pow::{Difficulty, MiningOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Chain parameters, loadable from a JSON file. Missing fields fall back to
/// the defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub difficulty: u32,
    pub genesis_marker: String,
    pub mining: MiningConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub parallel: bool,
    pub threads: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            genesis_marker: GENESIS_MARKER.to_string(),
            mining: MiningConfig::default(),
        }
    }
}

impl ChainConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        Difficulty::new(self.difficulty)?;
        if self.mining.threads == Some(0) {
            return Err(ChainError::Config("mining.threads must be at least 1".into()));
        }
        if self.mining.threads.is_some() && !self.mining.parallel {
            return Err(ChainError::Config(
                "mining.threads requires mining.parallel".into(),
            ));
        }
        Ok(())
    }

    pub fn difficulty(&self) -> Result<Difficulty> {
        Difficulty::new(self.difficulty)
    }
}

impl MiningConfig {
    pub fn options(&self) -> MiningOptions {
        let options = if self.parallel {
            MiningOptions::parallel(self.threads)
        } else {
            MiningOptions::sequential()
        };
        match self.timeout_ms {
            Some(ms) => options.with_timeout(Duration::from_millis(ms)),
            None => options,
        }
    }
}
