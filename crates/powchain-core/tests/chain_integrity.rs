use powchain_core::{
    digest, Block, Chain, ChainConfig, ChainError, Difficulty, MiningConfig, MiningOptions,
    Payload, Transaction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Write;
use tempfile::NamedTempFile;

fn random_payload(rng: &mut StdRng) -> Payload {
    let count = rng.gen_range(1..5);
    let txs: Vec<Transaction> = (0..count)
        .map(|i| {
            Transaction::new(
                format!("addr_from_{i}"),
                format!("addr_to_{}", rng.gen_range(0..100)),
                rng.gen_range(1..1_000),
            )
        })
        .collect();
    Payload::from(txs)
}

#[test]
fn test_digest_is_deterministic() {
    let payload = Payload::from(["Alice pays Bob 10 BTC"]);
    let first = digest(3, 1_700_000_000_000, &payload, "00abc", 42);
    for _ in 0..100 {
        assert_eq!(digest(3, 1_700_000_000_000, &payload, "00abc", 42), first);
    }
    assert_ne!(digest(3, 1_700_000_000_000, &payload, "00abc", 43), first);
}

#[test]
fn test_mined_block_meets_higher_difficulty() {
    let difficulty = Difficulty::new(5).unwrap();
    let mut block = Block::new(1, ["deep"], "0");
    block
        .mine_with(difficulty, &MiningOptions::parallel(None))
        .unwrap();
    assert!(block.hash().starts_with("00000"));
    assert_eq!(block.hash(), block.calculate_hash());
}

#[test]
fn test_mined_block_meets_difficulty_six() {
    let difficulty = Difficulty::new(6).unwrap();
    let mut block = Block::new(1, ["six"], "0");
    let report = block
        .mine_with(difficulty, &MiningOptions::parallel(None))
        .unwrap();
    assert!(block.hash().starts_with("000000"));
    assert!(block.meets_difficulty(difficulty));
    assert_eq!(block.hash(), block.calculate_hash());
    assert_eq!(block.nonce(), report.nonce);
}

#[test]
fn test_chain_with_generated_blocks_is_valid() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut chain = Chain::with_difficulty(Difficulty::new(2).unwrap());
    for _ in 0..20 {
        chain.add_block(random_payload(&mut rng));
        assert!(chain.is_valid());
    }
    assert_eq!(chain.len(), 21);
}

#[test]
fn test_append_grows_by_one_and_links_to_previous_tip() {
    let mut chain = Chain::with_difficulty(Difficulty::new(1).unwrap());
    for i in 0..10 {
        let len_before = chain.len();
        let tip_before = chain.latest_block().hash().to_string();
        let block = chain.add_block(vec![format!("tx {i}")]);
        assert_eq!(block.index(), len_before as u64);
        assert_eq!(block.previous_hash(), tip_before);
        assert_eq!(chain.len(), len_before + 1);
    }
}

#[test]
fn test_genesis_is_exempt_from_difficulty() {
    // find a genesis marker whose hash does not meet the target
    let chain = (0..)
        .map(|i| ChainConfig {
            difficulty: 2,
            genesis_marker: format!("Genesis Block #{i}"),
            ..ChainConfig::default()
        })
        .map(|config| Chain::with_config(&config).unwrap())
        .find(|chain| !chain.genesis().meets_difficulty(chain.difficulty()))
        .unwrap();

    assert!(chain.is_valid());
    let mut chain = chain;
    chain.add_block(["Alice pays Bob 10 BTC"]);
    chain.add_block(["Eve pays Frank 5 BTC"]);
    assert!(!chain.genesis().meets_difficulty(chain.difficulty()));
    assert!(chain.is_valid());
}

#[test]
fn test_config_file_drives_chain() -> anyhow::Result<()> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"{{ "difficulty": 2, "mining": {{ "parallel": true, "threads": 2 }} }}"#
    )?;
    let config = ChainConfig::from_json_file(file.path())?;
    assert_eq!(
        config.mining,
        MiningConfig {
            parallel: true,
            threads: Some(2),
            timeout_ms: None
        }
    );
    let mut chain = Chain::with_config(&config)?;
    chain.try_add_block(["Jim pays Alice 10 BTC"])?;
    assert!(chain.latest_block().hash().starts_with("00"));
    assert!(chain.is_valid());
    Ok(())
}

#[test]
fn test_timeout_leaves_chain_unchanged() {
    let config = ChainConfig {
        difficulty: 64,
        mining: MiningConfig {
            timeout_ms: Some(20),
            ..MiningConfig::default()
        },
        ..ChainConfig::default()
    };
    let mut chain = Chain::with_config(&config).unwrap();
    let err = chain.try_add_block(["unreachable"]).unwrap_err();
    assert!(matches!(err, ChainError::MiningTimedOut { .. }));
    assert_eq!(chain.len(), 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ChainConfig {
        difficulty: 65,
        ..ChainConfig::default()
    };
    assert!(matches!(
        Chain::with_config(&config),
        Err(ChainError::InvalidDifficulty { requested: 65, .. })
    ));
}

#[test]
fn test_json_dump_round_trips_as_plain_json() {
    let mut chain = Chain::with_difficulty(Difficulty::new(1).unwrap());
    chain.add_block(["Alice pays Bob 10 BTC"]);
    chain.add_block(["Eve pays Frank 5 BTC"]);
    let json = chain.to_json_pretty().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let blocks = value["chain"].as_array().unwrap();
    assert_eq!(blocks.len(), 3);
    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(block["index"], i as u64);
        assert_eq!(block["hash"], chain.blocks()[i].hash());
        assert_eq!(block["nonce"], chain.blocks()[i].nonce());
    }
}
