//! Post-seal mutation of blocks, for demonstrating and testing tamper
//! detection. Compiled only with the `tamper` feature (and in this crate's
//! unit tests). Nothing here re-mines unless asked to, so a tampered chain
//! normally fails [`Chain::validate`].

use crate::block::Block;
use crate::chain::Chain;
use crate::payload::Payload;
use crate::pow::MiningReport;

/// Mutable handle on a single block inside a [`Chain`].
pub struct Tamper<'a> {
    block: &'a mut Block,
}

impl Tamper<'_> {
    /// Replace the payload without touching the stored hash.
    pub fn set_transactions(&mut self, transactions: impl Into<Payload>) -> &mut Self {
        self.block.transactions = transactions.into();
        self
    }

    pub fn set_previous_hash(&mut self, previous_hash: impl Into<String>) -> &mut Self {
        self.block.previous_hash = previous_hash.into();
        self
    }

    /// Recompute the stored hash from the current fields, keeping the nonce.
    pub fn rehash(&mut self) -> &mut Self {
        self.block.hash = self.block.calculate_hash();
        self
    }
}

impl Chain {
    pub fn tamper(&mut self, index: usize) -> Option<Tamper<'_>> {
        self.blocks.get_mut(index).map(|block| Tamper { block })
    }

    /// Re-link and rehash every block after `index` without mining, the way
    /// a careless forger would.
    pub fn rechain_from(&mut self, index: usize) {
        for i in index + 1..self.blocks.len() {
            let previous = self.blocks[i - 1].hash.clone();
            let block = &mut self.blocks[i];
            block.previous_hash = previous;
            block.hash = block.calculate_hash();
        }
    }

    /// Re-mine the block at `index` and re-link and re-mine everything after
    /// it. The result validates again.
    pub fn remine_from(&mut self, index: usize) -> Vec<MiningReport> {
        let difficulty = self.difficulty();
        let mut reports = Vec::new();
        for i in index..self.blocks.len() {
            if i > 0 {
                let previous = self.blocks[i - 1].hash.clone();
                self.blocks[i].previous_hash = previous;
            }
            let block = &mut self.blocks[i];
            block.hash = block.calculate_hash();
            reports.push(block.mine(difficulty));
        }
        reports
    }
}
