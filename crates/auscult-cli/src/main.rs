use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use auscult::model::{DenseClassifier, WEIGHTS_FILE};
use auscult::weights::WeightStore;
use auscult::{
    AnalysisOutcome, AudioFormat, AudioUpload, ClosingKind, Domain, ScreeningService,
    ServiceConfig,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(name = "auscult")]
#[command(about = "Heart and lung sound screening", long_about = None)]
struct Args {
    /// Path to an audio file (WAV, MP3 or M4A).
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Read the upload from stdin.
    #[arg(long, default_value_t = false)]
    stdin: bool,

    /// Declared type of the upload (`wav`, `mp3`, `m4a` or a MIME type).
    /// Sniffed from the bytes when omitted.
    #[arg(long)]
    format: Option<String>,

    /// Which classifier to run: cardiac (heart) or respiratory (lung).
    #[arg(long, default_value = "cardiac")]
    domain: Domain,

    /// Service config (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model directory with model.json / model.safetensors for the selected domain.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Label registry (JSON) replacing the built-in one for the selected domain.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Validate a model directory without analysing audio.
    #[arg(long, default_value_t = false)]
    inspect_model: bool,

    /// Print the outcome as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => ServiceConfig::from_path(path)?,
        None => ServiceConfig::default(),
    };
    {
        let domain_cfg = cfg.domain_mut(args.domain);
        if let Some(dir) = &args.model_dir {
            domain_cfg.model_dir = Some(dir.clone());
        }
        if let Some(labels) = &args.labels {
            domain_cfg.labels = Some(labels.clone());
        }
    }

    if args.inspect_model {
        return inspect_model(&cfg.model_dir(args.domain));
    }

    let modes = u32::from(args.audio.is_some()) + u32::from(args.stdin);
    if modes != 1 {
        anyhow::bail!("choose exactly one input mode: --audio or --stdin");
    }

    let mut upload = match &args.audio {
        Some(path) => AudioUpload::from_path(path)?,
        None => read_stdin()?,
    };
    if let Some(declared) = &args.format {
        upload.declared = Some(AudioFormat::from_declared(declared)?);
    }

    let service = ScreeningService::from_config(&cfg)?;
    let outcome = service
        .analyze(args.domain, &upload)
        .with_context(|| format!("analyse {}", upload.name))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("serialise outcome")?
        );
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auscult=info,auscult_cli=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_stdin() -> Result<AudioUpload> {
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("read stdin")?;
    Ok(AudioUpload::new("stdin", buf))
}

fn inspect_model(model_dir: &Path) -> Result<()> {
    let model = DenseClassifier::load_from_dir(model_dir)
        .with_context(|| format!("load model from {}", model_dir.display()))?;
    let params = model.params();
    info!(
        name = params.name.as_deref().unwrap_or("-"),
        input_width = params.input_width,
        num_classes = params.num_classes,
        layers = params.layers.len(),
        "model ok"
    );
    for (i, layer) in params.layers.iter().enumerate() {
        eprintln!(
            "  layer {i}: {} -> {} {:?} (weight={}, bias={})",
            layer.in_dim,
            layer.out_dim,
            layer.activation,
            layer.weight,
            layer.bias.as_deref().unwrap_or("-")
        );
    }

    let store = WeightStore::open(model_dir.join(WEIGHTS_FILE)).context("open weights")?;
    let names = store.names().context("list tensor names")?;
    eprintln!("weights ok: tensor_count={}", names.len());
    Ok(())
}

fn print_outcome(outcome: &AnalysisOutcome) {
    let report = &outcome.report;
    println!("{}", report.title);
    println!(
        "file: {} ({} bytes, {})",
        outcome.upload.name, outcome.upload.size_bytes, outcome.upload.format
    );
    println!(
        "analysed: {:.2}s, {} MFCC features",
        outcome.clip_secs, outcome.feature_count
    );
    println!();
    println!(
        "{} {}  {}",
        report.emoji, report.top_label, report.confidence_text
    );
    println!("  {}", report.description);
    println!("  Recommendation: {}", report.recommendation);
    println!();

    let name_width = report
        .breakdown
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(0);
    for score in &report.breakdown {
        let bar = "#".repeat((score.probability * 30.0).round() as usize);
        println!(
            "  {:<name_width$}  {:>6}  {bar}",
            score.name,
            auscult::report::format_percent(score.percent())
        );
    }
    println!();

    let marker = match report.closing_kind {
        ClosingKind::Positive => "+",
        ClosingKind::Cautionary => "!",
    };
    println!("[{marker}] {}", report.closing_message);
    if !report.disclaimer.is_empty() {
        println!();
        println!("{}", report.disclaimer);
    }
}
