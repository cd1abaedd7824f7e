//! RingGuard CLI tool.
//!
//! Provides commands for scanning transaction files, training risk models and
//! generating synthetic data.

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng, rng};
use ringguard::prelude::*;
use ringguard_ml::dataset::LabeledTransaction;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CHANNELS: [&str; 4] = ["web", "mobile", "pos", "kiosk"];

#[derive(Parser)]
#[command(name = "ringguard")]
#[command(version, about = "Fraud-ring detection over transaction graphs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and score rings in a JSON Lines transaction file
    Scan {
        /// Transactions, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Trained model snapshot (random weights when omitted)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Minimum ring length
        #[arg(long)]
        min_length: Option<usize>,

        /// Stop after this many rings
        #[arg(long)]
        max_cycles: Option<usize>,

        /// Enumeration deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Score with the structural heuristic instead of the model
        #[arg(long)]
        structural: bool,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },

    /// Train a risk model on labeled rings
    Train {
        /// Labeled rows with `ring_id` and `is_fraud`, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the model snapshot
        #[arg(short, long)]
        output: PathBuf,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Training epochs
        #[arg(long)]
        epochs: Option<usize>,

        /// Seed for initialization and training
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print synthetic transactions as JSON Lines
    Generate {
        /// Random background transactions
        #[arg(short = 'n', long, default_value = "500")]
        count: usize,

        /// Planted rings
        #[arg(short, long, default_value = "5")]
        rings: usize,

        /// Distinct background accounts
        #[arg(long, default_value = "50")]
        accounts: usize,

        /// Emit labeled training rows instead of a transaction stream
        #[arg(long)]
        labeled: bool,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

impl Commands {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Commands::Scan { config, .. } | Commands::Train { config, .. } => config.as_deref(),
            Commands::Generate { .. } => None,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config first, so its logging section applies
    let mut config = load_config(cli.command.config_path())?;
    log_config(&config.logging, cli.verbose, cli.json_logs).init()?;

    match cli.command {
        Commands::Scan {
            input,
            model,
            min_length,
            max_cycles,
            timeout_ms,
            structural,
            pretty,
            ..
        } => {
            if let Some(n) = min_length {
                config.detection.min_length = n;
            }
            if let Some(n) = max_cycles {
                config.detection.max_cycles = Some(n);
            }
            if let Some(ms) = timeout_ms {
                config.detection.timeout_ms = Some(ms);
            }
            config.validate()?;
            cmd_scan(config, &input, model, structural, pretty)?;
        }

        Commands::Train {
            input,
            output,
            epochs,
            seed,
            ..
        } => {
            if let Some(n) = epochs {
                config.training.epochs = n;
            }
            if let Some(seed) = seed {
                config.model.seed = Some(seed);
                config.training.seed = Some(seed);
            }
            config.validate()?;
            cmd_train(&config, &input, &output)?;
        }

        Commands::Generate {
            count,
            rings,
            accounts,
            labeled,
            seed,
        } => {
            cmd_generate(count, rings, accounts, labeled, seed)?;
        }
    }

    Ok(())
}

/// Command-line flags layered over the configured logging.
fn log_config(base: &LogConfig, verbose: bool, json_logs: bool) -> LogConfig {
    let mut logging = base.clone();
    if json_logs {
        logging.structured = true;
    }
    if verbose {
        logging = logging.with_level(LogLevel::Debug);
    }
    logging
}

/// File config when given, environment overrides on top either way.
fn load_config(path: Option<&Path>) -> anyhow::Result<RingGuardConfig> {
    let base = match path {
        Some(path) => RingGuardConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RingGuardConfig::default(),
    };
    Ok(base.with_env_overrides(|key| std::env::var(key).ok())?)
}

fn cmd_scan(
    config: RingGuardConfig,
    input: &Path,
    model: Option<PathBuf>,
    structural: bool,
    pretty: bool,
) -> anyhow::Result<()> {
    let records = load_transactions_jsonl(input)
        .with_context(|| format!("reading transactions from {}", input.display()))?;

    let mut scanner = RingScanner::new(config);
    if let Some(path) = model {
        let model = RiskModel::load_json(&path)
            .with_context(|| format!("loading model {}", path.display()))?;
        scanner = scanner.with_model(Arc::new(model));
    }
    if structural {
        scanner = scanner.with_scorer(Arc::new(StructuralScorer::default()));
    }

    let report = scanner.scan(&records)?;
    if let Some(reason) = &report.incomplete {
        tracing::warn!(%reason, "Ring detection incomplete; report holds a partial ring set");
    }

    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}

fn cmd_train(config: &RingGuardConfig, input: &Path, output: &Path) -> anyhow::Result<()> {
    let dataset = LabeledRingDataset::from_jsonl(input, config.model.features)
        .with_context(|| format!("reading labeled rings from {}", input.display()))?;
    println!(
        "Loaded {} labeled rings ({} fraudulent)",
        dataset.len(),
        dataset.positives()
    );

    let base = RiskModel::new(config.model.clone());
    let outcome = Trainer::new(config.training.clone()).fit(&base, &dataset.examples);

    if outcome.trained {
        if let Some(last) = outcome.history.last() {
            match last.validation_loss {
                Some(val) => println!(
                    "Final loss: {:.4} (validation {:.4})",
                    last.train_loss, val
                ),
                None => println!("Final loss: {:.4}", last.train_loss),
            }
        }
    } else {
        println!("No usable training data, saving untrained model");
    }

    outcome.model.save_json(output)?;
    println!("Model written to {}", output.display());
    Ok(())
}

fn cmd_generate(
    count: usize,
    rings: usize,
    accounts: usize,
    labeled: bool,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    anyhow::ensure!(accounts > 0, "--accounts must be positive");

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rng()),
    };
    let now = Utc::now();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if labeled {
        for row in labeled_rows(&mut rng, rings, accounts) {
            writeln!(out, "{}", serde_json::to_string(&row)?)?;
        }
        return Ok(());
    }

    let mut records = Vec::with_capacity(count + rings * 6);
    for i in 0..count {
        let source = format!("U{:04}", rng.random_range(1..=accounts));
        let target = format!("U{:04}", rng.random_range(1..=accounts));
        let amount = (rng.random::<f64>() * 100_000.0).round() / 100.0;
        records.push(
            TransactionRecord::new(source, target, amount)
                .with_timestamp(now - ChronoDuration::minutes(i as i64)),
        );
    }
    for r in 0..rings {
        records.extend(planted_ring(&mut rng, r, 9_000.0));
    }

    for (i, record) in records.into_iter().enumerate() {
        let channel = CHANNELS.choose(&mut rng).copied().unwrap_or("web");
        let record = record.with_id(format!("T{i:06}")).with_channel(channel);
        writeln!(out, "{}", serde_json::to_string(&record)?)?;
    }
    Ok(())
}

/// A closed loop of 3 to 6 mule accounts moving roughly `amount` each hop.
fn planted_ring(rng: &mut StdRng, index: usize, amount: f64) -> Vec<TransactionRecord> {
    let len = rng.random_range(3..=6);
    (0..len)
        .map(|i| {
            let jitter = rng.random_range(0.97..1.03);
            TransactionRecord::new(
                format!("R{index:03}-{i}"),
                format!("R{index:03}-{}", (i + 1) % len),
                (amount * jitter).round(),
            )
        })
        .collect()
}

/// Alternating fraudulent loops and legitimate payment chains.
fn labeled_rows(rng: &mut StdRng, rings: usize, accounts: usize) -> Vec<LabeledTransaction> {
    let mut rows = Vec::new();
    for r in 0..rings.max(1) * 2 {
        let ring_id = format!("ring-{r:04}");
        let fraud = r % 2 == 0;
        let transactions = if fraud {
            planted_ring(rng, r, 9_000.0)
        } else {
            let len = rng.random_range(3..=6);
            let chain: Vec<usize> = (0..=len).map(|_| rng.random_range(1..=accounts)).collect();
            chain
                .windows(2)
                .map(|w| {
                    let amount = (rng.random::<f64>() * 50_000.0).round() / 100.0;
                    TransactionRecord::new(format!("U{:04}", w[0]), format!("U{:04}", w[1]), amount)
                })
                .collect()
        };
        rows.extend(transactions.into_iter().map(|transaction| LabeledTransaction {
            ring_id: ring_id.clone(),
            transaction,
            is_fraud: fraud,
        }));
    }
    rows
}
