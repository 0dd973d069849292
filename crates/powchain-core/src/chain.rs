use crate::block::Block;
use crate::config::ChainConfig;
use crate::constants::{GENESIS_MARKER, GENESIS_PREVIOUS_HASH};
use crate::error::{Result, ValidationError};
use crate::payload::Payload;
use crate::pow::{Difficulty, MiningOptions};
use serde::Serialize;
use tracing::{debug, info};

/// An in-memory, append-only proof-of-work chain.
///
/// The caller owns it outright. There is no way to remove or reorder blocks;
/// [`Chain::add_block`] is the only way the chain grows.
#[derive(Clone, Debug, Serialize)]
pub struct Chain {
    #[serde(rename = "chain")]
    pub(crate) blocks: Vec<Block>,
    difficulty: Difficulty,
    #[serde(skip)]
    mining: MiningOptions,
}

impl Chain {
    /// Genesis block plus the default difficulty of 3.
    pub fn new() -> Self {
        Self::with_difficulty(Difficulty::default())
    }

    pub fn with_difficulty(difficulty: Difficulty) -> Self {
        Self::from_parts(difficulty, GENESIS_MARKER, MiningOptions::default())
    }

    pub fn with_config(config: &ChainConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(
            config.difficulty()?,
            &config.genesis_marker,
            config.mining.options(),
        ))
    }

    fn from_parts(difficulty: Difficulty, genesis_marker: &str, mining: MiningOptions) -> Self {
        let genesis = Block::genesis([genesis_marker], GENESIS_PREVIOUS_HASH);
        info!("Created chain with genesis {} at difficulty {}", genesis.hash(), difficulty);
        Self {
            blocks: vec![genesis],
            difficulty,
            mining,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Options used by [`Chain::try_add_block`].
    pub fn set_mining_options(&mut self, options: MiningOptions) {
        self.mining = options;
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: the genesis block is present from construction.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn latest_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always holds at least the genesis block")
    }

    /// Mine a block holding `transactions` on top of the current tip and
    /// append it. Blocks until a valid nonce is found.
    pub fn add_block(&mut self, transactions: impl Into<Payload>) -> &Block {
        let mut block = self.next_block(transactions);
        block.mine(self.difficulty);
        self.push(block)
    }

    /// Like [`Chain::add_block`] but mines with the configured
    /// [`MiningOptions`]. If mining is cancelled or times out the chain is
    /// left unchanged.
    pub fn try_add_block(&mut self, transactions: impl Into<Payload>) -> Result<&Block> {
        let mut block = self.next_block(transactions);
        block.mine_with(self.difficulty, &self.mining)?;
        Ok(self.push(block))
    }

    fn next_block(&self, transactions: impl Into<Payload>) -> Block {
        Block::new(
            self.blocks.len() as u64,
            transactions,
            self.latest_block().hash(),
        )
    }

    fn push(&mut self, block: Block) -> &Block {
        debug_assert!(block.is_sealed());
        info!(
            "Appended block {} (chain length {})",
            block.index(),
            self.blocks.len() + 1
        );
        self.blocks.push(block);
        self.latest_block()
    }

    /// Check every block after genesis: stored hash matches its contents,
    /// previous hash links to the predecessor, and the hash meets the
    /// difficulty. Reports the first failure.
    ///
    /// Passing only shows the chain is internally consistent. A chain that
    /// was tampered with and fully re-mined passes too; detecting that needs
    /// an externally published hash to compare against.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        for (position, pair) in self.blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let index = position as u64 + 1;
            if current.hash() != current.calculate_hash() {
                return Err(ValidationError::HashMismatch { index });
            }
            if current.previous_hash() != previous.hash() {
                return Err(ValidationError::BrokenLink { index });
            }
            if !current.meets_difficulty(self.difficulty) {
                return Err(ValidationError::InsufficientWork {
                    index,
                    difficulty: self.difficulty.zeros(),
                });
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                debug!("Chain validation failed: {e}");
                false
            }
        }
    }

    /// Human-readable dump: `{"chain": [...], "difficulty": n}`.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Transaction;

    fn easy() -> Difficulty {
        Difficulty::new(1).unwrap()
    }

    #[test]
    fn genesis_block_example() {
        let chain = Chain::new();
        let genesis = chain.genesis();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.difficulty().zeros(), 3);
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_hash(), "0");
        assert_eq!(genesis.nonce(), 0);
        assert_eq!(genesis.transactions().canonical(), r#"["Genesis Block"]"#);
        assert_eq!(genesis.hash(), genesis.calculate_hash());
        assert!(genesis.is_sealed());
        assert!(!chain.is_empty());
    }

    #[test]
    fn latest_block_is_genesis_on_new_chain() {
        let chain = Chain::new();
        assert_eq!(chain.latest_block(), chain.genesis());
    }

    #[test]
    fn add_block_links_to_tip() {
        let mut chain = Chain::with_difficulty(easy());
        let tip = chain.latest_block().hash().to_string();
        let block = chain.add_block(["Alice pays Bob 10 BTC"]);
        assert_eq!(block.index(), 1);
        assert_eq!(block.previous_hash(), tip);
        assert!(block.hash().starts_with('0'));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn fresh_chain_is_valid() {
        assert!(Chain::new().is_valid());
        assert_eq!(Chain::new().validate(), Ok(()));
    }

    #[test]
    fn reference_chain_is_valid() {
        let mut chain = Chain::new();
        chain.add_block(["Alice pays Bob 10 BTC"]);
        chain.add_block(["Eve pays Frank 5 BTC"]);
        chain.add_block(["Jim pays Alice 10 BTC"]);
        assert_eq!(chain.len(), 4);
        assert!(chain.is_valid());
        for block in &chain.blocks()[1..] {
            assert!(block.hash().starts_with("000"));
        }
    }

    #[test]
    fn typed_transactions_are_accepted() {
        let mut chain = Chain::with_difficulty(easy());
        chain.add_block(vec![Transaction::new("Alice", "Bob", 10)]);
        assert!(chain.is_valid());
    }

    #[test]
    fn try_add_block_with_parallel_options() {
        let mut chain = Chain::with_difficulty(Difficulty::new(2).unwrap());
        chain.set_mining_options(MiningOptions::parallel(Some(2)));
        chain.try_add_block(["parallel"]).unwrap();
        chain.try_add_block(["again"]).unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain.is_valid());
    }

    #[test]
    fn interrupted_mining_leaves_chain_unchanged() {
        let mut chain = Chain::with_difficulty(Difficulty::new(64).unwrap());
        let cancel = crate::pow::CancelFlag::new();
        cancel.cancel();
        chain.set_mining_options(MiningOptions::sequential().with_cancel(cancel));
        let err = chain.try_add_block(["never"]).unwrap_err();
        assert!(matches!(err, crate::ChainError::MiningCancelled { .. }));
        assert_eq!(chain.len(), 1);
        assert!(chain.is_valid());
    }

    #[test]
    fn with_config_uses_marker_and_difficulty() {
        let config = ChainConfig {
            difficulty: 2,
            genesis_marker: "Hello".into(),
            ..ChainConfig::default()
        };
        let chain = Chain::with_config(&config).unwrap();
        assert_eq!(chain.difficulty().zeros(), 2);
        assert_eq!(chain.genesis().transactions().canonical(), r#"["Hello"]"#);
    }

    #[test]
    fn json_dump_shape() {
        let mut chain = Chain::with_difficulty(easy());
        chain.add_block(["Alice pays Bob 10 BTC"]);
        let json = chain.to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["difficulty"], 1);
        assert_eq!(value["chain"].as_array().unwrap().len(), 2);
        assert_eq!(value["chain"][1]["previousHash"], chain.genesis().hash());
        assert_eq!(value["chain"][1]["transactions"][0], "Alice pays Bob 10 BTC");

        let keys = [
            "\"index\"",
            "\"timestamp\"",
            "\"transactions\"",
            "\"previousHash\"",
            "\"nonce\"",
            "\"hash\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.find("\"chain\"").unwrap() < json.find("\"difficulty\"").unwrap());
    }
}
