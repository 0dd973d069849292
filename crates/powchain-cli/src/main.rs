use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use powchain_core::{Chain, ChainConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const DEMO_TRANSACTIONS: [&str; 3] = [
    "Alice pays Bob 10 BTC",
    "Eve pays Frank 5 BTC",
    "Jim pays Alice 10 BTC",
];
const TAMPERED_PAYLOAD: &str = "I am tampered with";

#[derive(Parser, Debug)]
#[command(name = "powchain")]
#[command(about = "Mine, inspect and tamper with a small proof-of-work chain")]
struct Cli {
    /// JSON chain config (difficulty, genesis_marker, mining)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Leading zero hex digits required per block
    #[arg(long, global = true)]
    difficulty: Option<u32>,

    /// Search nonces on all cores
    #[arg(long, global = true)]
    parallel: bool,

    /// Worker threads for parallel mining (implies --parallel)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Give up mining a block after this many milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine three blocks, tamper with one, and validate before and after
    Demo {
        /// Block whose payload gets replaced
        #[arg(long, default_value_t = 2)]
        tamper_index: usize,
    },
    /// Mine one block per payload and print the chain
    Mine {
        #[arg(required = true)]
        payloads: Vec<String>,
    },
}

impl Cli {
    fn chain_config(&self) -> Result<ChainConfig> {
        let mut config = match &self.config {
            Some(path) => ChainConfig::from_json_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => ChainConfig::default(),
        };
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
        if self.parallel || self.threads.is_some() {
            config.mining.parallel = true;
        }
        if self.threads.is_some() {
            config.mining.threads = self.threads;
        }
        if self.timeout_ms.is_some() {
            config.mining.timeout_ms = self.timeout_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.chain_config()?;
    info!(
        "difficulty {}, parallel mining {}",
        config.difficulty, config.mining.parallel
    );

    match cli.cmd {
        Command::Demo { tamper_index } => run_demo(&config, tamper_index),
        Command::Mine { payloads } => run_mine(&config, payloads),
    }
}

/// Genesis cannot be tampered with; the demo chain has one block per
/// demo transaction after it.
fn check_tamper_index(index: usize) -> Result<()> {
    if !(1..=DEMO_TRANSACTIONS.len()).contains(&index) {
        bail!(
            "tamper index must be between 1 and {}, got {index}",
            DEMO_TRANSACTIONS.len()
        );
    }
    Ok(())
}

fn run_demo(config: &ChainConfig, tamper_index: usize) -> Result<()> {
    check_tamper_index(tamper_index)?;
    let mut chain = Chain::with_config(config)?;
    for tx in DEMO_TRANSACTIONS {
        chain.try_add_block([tx])?;
    }

    print_chain("ORIGINAL BLOCKCHAIN", &chain)?;
    report_validity("Is blockchain valid?", &chain);

    chain
        .tamper(tamper_index)
        .context("tamper index out of range")?
        .set_transactions(TAMPERED_PAYLOAD)
        .rehash();
    chain.rechain_from(tamper_index);

    print_chain("MODIFIED BLOCKCHAIN", &chain)?;
    report_validity("Is blockchain valid after tampering?", &chain);
    Ok(())
}

fn run_mine(config: &ChainConfig, payloads: Vec<String>) -> Result<()> {
    let mut chain = Chain::with_config(config)?;
    for payload in payloads {
        chain.try_add_block(vec![payload])?;
    }
    print_chain("BLOCKCHAIN", &chain)?;
    report_validity("Is blockchain valid?", &chain);
    Ok(())
}

fn print_chain(title: &str, chain: &Chain) -> Result<()> {
    println!("\n--- {title} ---\n{}", chain.to_json_pretty()?);
    println!("\n• Number of blocks on chain: {}", chain.len());
    Ok(())
}

fn report_validity(question: &str, chain: &Chain) {
    match chain.validate() {
        Ok(()) => println!("• {question} true\n"),
        Err(e) => println!("• {question} false ({e})\n"),
    }
}
