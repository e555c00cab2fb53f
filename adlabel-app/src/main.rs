use adlabel_common::observability::init_logging;
use adlabel_config::{AdlabelConfig, AdlabelConfigLoader};
use adlabel_pipeline::batch::format_labels;
use adlabel_pipeline::{
    build_prompt, evaluate, ingest, AdClassifier, BatchDriver, Label, ResultStore,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

mod wiring;

#[derive(Parser, Debug)]
#[command(name = "adlabel", about = "Label political ads as Presidential, Other or Unsure")]
struct Cli {
    /// Configuration file; `ADLABEL__*` environment variables override it.
    #[arg(long, env = "ADLABEL_CONFIG", default_value = "adlabel.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify every ad not yet in the result store
    Run {
        /// Also re-classify rows stored as Error or InvalidResponse
        #[arg(long)]
        retry_failed: bool,
        /// Classify at most this many ads
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Compare stored labels with a hand-labelled sample
    Evaluate {
        /// CSV with `_id` and `is_presidential` columns
        #[arg(long)]
        labeled: PathBuf,
        /// Where to write the merged table
        #[arg(long)]
        out: PathBuf,
    },
    /// Draw ads with and without transcripts from the raw export for hand labelling
    Sample {
        /// Where to write the sample
        #[arg(long, default_value = "data/processed/sample_labeled.csv")]
        out: PathBuf,
        /// Ads drawn from each group
        #[arg(long, default_value_t = 100)]
        per_group: usize,
        /// Seed for a reproducible draw; random when omitted
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Label counts and token totals of the result store
    Stats,
    /// Print the prompt one ad would be classified with
    Prompt {
        ad_id: String,
    },
}

fn load_config(path: &Path) -> Result<AdlabelConfig> {
    AdlabelConfigLoader::new()
        .with_file(path, true)
        .load()
        .with_context(|| format!("loading {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let log_path = init_logging(wiring::log_config(&cfg))?;
    tracing::debug!(log = %log_path.display(), config = %cli.config.display(), "adlabel.start");

    match cli.command {
        Commands::Run {
            retry_failed,
            limit,
        } => {
            let records = ingest::load_records(&cfg.batch.raw_path, &cfg.batch.processed_path)?;
            let (provider_cfg, temperature) = wiring::provider_config(&cfg);
            let provider = adlabel_llm::connect(&provider_cfg)?;
            let classifier = AdClassifier::new(provider, temperature)
                .with_retry_policy(wiring::retry_policy(&cfg));
            let driver =
                BatchDriver::new(classifier, wiring::batch_config(&cfg, retry_failed, limit));

            let outcome = driver.run(&records).await?;
            let s = &outcome.summary;
            println!(
                "classified {} of {} ads ({} already stored, {} deferred, {} duplicate ids)",
                s.classified,
                s.input_records,
                s.skipped_existing,
                s.deferred_by_limit,
                s.duplicate_ids
            );
            println!("labels: {}", s.label_line());
            println!(
                "tokens: prompt={} completion={} total={}",
                s.usage.prompt_tokens, s.usage.completion_tokens, s.usage.total_tokens
            );
            println!(
                "store: {} rows at {}",
                outcome.store.len(),
                driver.config().output_path.display()
            );
        }
        Commands::Evaluate { labeled, out } => {
            let store = ResultStore::load(&cfg.batch.output_path)?;
            let eval = evaluate(&labeled, &store, &out)?;
            println!(
                "{} rows, {} matched, {} disagreements",
                eval.rows, eval.matched, eval.errors
            );
            match eval.accuracy() {
                Some(acc) => println!("accuracy: {:.1}%", acc * 100.0),
                None => println!("accuracy: n/a (no matched rows)"),
            }
            println!("merged table written to {}", out.display());
        }
        Commands::Sample {
            out,
            per_group,
            seed,
        } => {
            let seed = seed.unwrap_or_else(rand::random);
            let counts = ingest::select_sample(&cfg.batch.raw_path, &out, per_group, seed)?;
            println!(
                "sampled {} ads with a transcript and {} without (seed {seed})",
                counts.with_transcript, counts.without_transcript
            );
            println!("sample written to {}; add an `is_presidential` column", out.display());
        }
        Commands::Stats => {
            let store = ResultStore::load_if_exists(&cfg.batch.output_path)?;
            let counts = store.label_counts();
            let failures: usize = counts
                .iter()
                .filter(|(label, _)| label.is_failure())
                .map(|(_, n)| n)
                .sum();
            let usage = store.total_usage();
            println!("{} rows in {}", store.len(), cfg.batch.output_path.display());
            println!("labels: {}", format_labels(&counts));
            println!(
                "presidential: {}  retryable failures: {failures}",
                counts.get(&Label::Presidential).copied().unwrap_or(0)
            );
            println!(
                "tokens: prompt={} completion={} total={}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }
        Commands::Prompt { ad_id } => {
            let records = ingest::load_records(&cfg.batch.raw_path, &cfg.batch.processed_path)?;
            let record = records
                .iter()
                .find(|r| r.id() == ad_id)
                .with_context(|| format!("no ad with id {ad_id}"))?;
            println!("{}", build_prompt(record));
        }
    }
    Ok(())
}
