//! Character-level text generation driver.
//!
//! Loads a corpus, vectorizes it into one-hot windows, then alternates
//! between fitting the next section of the batch and sampling text from a
//! random corpus window at every configured temperature.
//! Optionally writes JSONL metrics events and the alphabet.

use anyhow::{Context, Result};
use chargen::persist::save_alphabet;
use chargen::{
    encode, extract_windows, generate, load_corpus, rows_per_epoch, train_epoch, Config,
    CountModel, Metrics,
};
use clap::Parser;
use env_logger::Env;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::ThreadPoolBuilder;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "chargen-train",
    about = "Vectorize a text corpus, fit a next-character model, and sample text"
)]
struct Args {
    /// Text corpus to learn from (lowercased on load)
    #[arg(long)]
    corpus: PathBuf,

    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Window length in characters
    #[arg(long)]
    maxlen: Option<usize>,

    /// Stride between window starts
    #[arg(long)]
    step: Option<usize>,

    /// Number of fit-then-sample epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Characters to generate per temperature
    #[arg(long)]
    length: Option<usize>,

    /// Sampling temperature (repeat the flag for several)
    #[arg(long = "temperature")]
    temperatures: Vec<f64>,

    /// Context length of the count model
    #[arg(long)]
    order: Option<usize>,

    /// Additive smoothing of the count model
    #[arg(long)]
    smoothing: Option<f64>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Rows fitted per epoch, > 0 (default: spread the batch evenly over all epochs)
    #[arg(long)]
    rows_per_epoch: Option<usize>,

    /// Limit Rayon worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Output metrics file (JSONL)
    #[arg(long)]
    metrics_file: Option<PathBuf>,

    /// Write the alphabet as JSON to this path
    #[arg(long)]
    alphabet_out: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(maxlen) = self.maxlen {
            config.maxlen = maxlen;
        }
        if let Some(step) = self.step {
            config.step = step;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(length) = self.length {
            config.generate_count = length;
        }
        if !self.temperatures.is_empty() {
            config.temperatures = self.temperatures.clone();
        }
        if let Some(order) = self.order {
            config.order = order;
        }
        if let Some(smoothing) = self.smoothing {
            config.smoothing = smoothing;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}

fn open_metrics(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating metrics directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening metrics file {}", path.display()))
}

fn write_event(file: &mut Option<File>, event: &serde_json::Value) -> Result<()> {
    if let Some(file) = file {
        writeln!(file, "{event}").context("writing metrics event")?;
        file.flush().context("flushing metrics")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("unable to configure Rayon thread pool")?;
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let corpus = load_corpus(&args.corpus)?;
    let alphabet = corpus.alphabet()?;
    info!("corpus length: {} | alphabet size: {}", corpus.len(), alphabet.size());

    let windows = extract_windows(corpus.chars(), config.maxlen, config.step)
        .context("cutting corpus into windows")?;
    info!("number of sequences: {}", windows.len());

    let start = Instant::now();
    let batch = encode(windows, &alphabet)?;
    info!(
        "vectorized x{:?} y{:?} in {:.2}s",
        batch.x.shape(),
        batch.y.shape(),
        start.elapsed().as_secs_f64()
    );

    if let Some(path) = &args.alphabet_out {
        save_alphabet(&alphabet, path)
            .with_context(|| format!("saving alphabet to {}", path.display()))?;
        info!("alphabet written to {}", path.display());
    }

    let mut metrics_file = args.metrics_file.as_deref().map(open_metrics).transpose()?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut model = CountModel::new(alphabet.size(), config.order, config.smoothing)?;
    let section_rows = rows_per_epoch(args.rows_per_epoch, batch.len(), config.epochs)?;

    write_event(
        &mut metrics_file,
        &serde_json::json!({
            "type": "run_start",
            "corpus": args.corpus.display().to_string(),
            "corpus_len": corpus.len(),
            "alphabet_size": alphabet.size(),
            "num_sequences": batch.len(),
            "rows_per_epoch": section_rows,
            "config": &config,
        }),
    )?;

    for epoch in 0..config.epochs {
        let start = Instant::now();
        let metrics: Metrics = train_epoch(&mut model, &batch, epoch, section_rows)?;
        let elapsed = start.elapsed().as_secs_f64();

        info!(
            "Epoch {:3}/{} | rows: {} | loss: {:.4} | accuracy: {:.2}% | contexts: {} | {:.2}s",
            epoch + 1,
            config.epochs,
            metrics.rows,
            metrics.loss,
            metrics.accuracy * 100.0,
            metrics.contexts,
            elapsed,
        );
        write_event(
            &mut metrics_file,
            &serde_json::json!({
                "type": "epoch",
                "epoch": epoch + 1,
                "metrics": &metrics,
                "rows_seen": model.rows_seen(),
                "elapsed_secs": elapsed,
            }),
        )?;

        let seed = corpus.random_seed_window(&mut rng, config.maxlen)?;
        info!("generating with seed: {seed:?}");

        for &temperature in &config.temperatures {
            let text = generate(
                &model,
                &seed,
                &alphabet,
                config.maxlen,
                temperature,
                config.generate_count,
                &mut rng,
            )
            .with_context(|| format!("generating at temperature {temperature}"))?;

            println!("------ epoch {} | temperature: {temperature}", epoch + 1);
            println!("{text}");

            write_event(
                &mut metrics_file,
                &serde_json::json!({
                    "type": "sample",
                    "epoch": epoch + 1,
                    "temperature": temperature,
                    "seed": &seed,
                    "text": &text[seed.len()..],
                }),
            )?;
        }
    }

    info!("done: {} rows fitted, {} contexts", model.rows_seen(), model.num_contexts());
    Ok(())
}
