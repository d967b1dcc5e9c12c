// ABOUTME: CLI for building conversation-tree datasets from scraped documents and curating them.
// ABOUTME: `make` turns an XML document into rows; `curate` runs QA split, dedup, sampling and filtering.

mod workspace;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use threadset_corpus::io::{decode_corpus, detect_encoding, encode_corpus, ensure_encoding_compatible};
use threadset_corpus::stage::ensure_non_empty;
use threadset_corpus::{
    CancelFlag, CorpusError, Curation, DataFormat, DataShape, Denylist, GroupKey, NodeDefaults,
    ParallelFilter, QaGate, QaSplitter, TextEncoding, TreeBuilder, UnderSampler, DEFAULT_MARKERS,
};
use threadset_source::{load_document, ProfileRegistry, SourceError};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::workspace::{atomic_write, WorkingCopy};

/// Build and curate conversation-tree datasets.
#[derive(Parser, Debug)]
#[command(name = "threadset", version)]
#[command(about = "Build and curate conversation-tree datasets from scraped discussion threads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn a scraped XML document into dataset rows.
    Make(MakeArgs),
    /// Split, deduplicate, balance and filter a dataset.
    Curate(CurateArgs),
}

#[derive(Args, Debug)]
struct MakeArgs {
    /// Scraped XML document.
    #[arg(long)]
    input: PathBuf,

    /// Output file (.csv, .jsonl, .json tree documents or .xlsx).
    #[arg(long)]
    output: PathBuf,

    /// Source profile name, e.g. naver_cafe or lawtalk_consult.
    #[arg(long)]
    source: String,

    /// JSON file of source profiles replacing the built-in ones.
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Language tag stamped on every turn.
    #[arg(long, default_value = "ko")]
    lang: String,
}

#[derive(Args, Debug)]
struct CurateArgs {
    /// Dataset to curate (.csv, .jsonl, .json or .xlsx).
    #[arg(long)]
    input: PathBuf,

    /// Output file (.csv, .jsonl, .json tree documents or .xlsx).
    #[arg(long)]
    output: PathBuf,

    /// Denylist file (.csv or .xlsx); every cell below the header is a term.
    #[arg(long)]
    filter: PathBuf,

    /// Maximum size ratio between the largest and smallest group (>= 1.0).
    #[arg(long)]
    undersample: f64,

    /// Grouping used for under-sampling: source, tree_state or lang.
    #[arg(long, default_value = "source")]
    group_by: String,

    /// Filter worker threads (defaults to available parallelism).
    #[arg(long)]
    workers: Option<usize>,

    /// Split comment blocks holding both a question and its answer.
    #[arg(long, default_value_t = false)]
    qa_split: bool,

    /// Answer marker for --qa-split; repeatable. Defaults to "A." and "답변".
    #[arg(long = "qa-marker")]
    qa_markers: Vec<String>,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "threadset=info,threadset_corpus=info,threadset_source=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Make(args) => make(args),
        Command::Curate(args) => curate(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// 2 for configuration and encoding problems, 3 for an empty result, 130 on cancel, otherwise 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(source) = err.downcast_ref::<SourceError>() {
        return if source.is_unknown_profile() { 2 } else { 1 };
    }
    match err.downcast_ref::<CorpusError>() {
        Some(CorpusError::Config(_)) | Some(CorpusError::Encoding { .. }) => 2,
        Some(CorpusError::EmptyResult { .. }) => 3,
        Some(CorpusError::Cancelled) => 130,
        _ => 1,
    }
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        return Err(CorpusError::config(format!("{what} not found: {}", path.display())).into());
    }
    Ok(())
}

fn make(args: MakeArgs) -> Result<()> {
    require_file(&args.input, "input document")?;
    let output_format = DataFormat::from_path(&args.output)?;
    let registry = match &args.profiles {
        Some(path) => ProfileRegistry::from_path(path)
            .with_context(|| format!("loading profiles from {}", path.display()))?,
        None => ProfileRegistry::load_builtin()?,
    };
    let profile = registry.get(&args.source)?;

    let builder = TreeBuilder::new(NodeDefaults {
        lang: args.lang.clone(),
        ..NodeDefaults::default()
    });
    let trees = load_document(&args.input, profile, &builder)?;
    let mismatches: usize = trees.iter().map(|t| t.report.mismatches.len()).sum();
    let nodes: Vec<_> = trees.into_iter().flat_map(|t| t.nodes).collect();
    ensure_non_empty("make", &nodes)?;

    let bytes = encode_corpus(&nodes, output_format, TextEncoding::UTF8)?;
    atomic_write(&args.output, &bytes)?;
    info!(output = %args.output.display(), rows = nodes.len(), mismatches, "dataset written");

    let summary = json!({
        "output": args.output.display().to_string(),
        "source": profile.name,
        "trees": nodes.iter().filter(|n| n.is_root()).count(),
        "rows": nodes.len(),
        "mismatches": mismatches,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn curate(args: CurateArgs) -> Result<()> {
    // Every configuration problem is reported before any stage runs.
    require_file(&args.input, "input file")?;
    let input_format = DataFormat::from_path(&args.input)?;
    let output_format = DataFormat::from_path(&args.output)?;
    let denylist = Denylist::load(&args.filter)?;
    if denylist.is_empty() {
        warn!(filter = %args.filter.display(), "denylist is empty; filter stage keeps every row");
    }
    let sampler = UnderSampler::new(args.undersample, args.group_by.parse::<GroupKey>()?)?;
    let qa = if args.qa_split {
        let splitter = if args.qa_markers.is_empty() {
            QaSplitter::new(DEFAULT_MARKERS.iter().copied())?
        } else {
            QaSplitter::new(&args.qa_markers)?
        };
        let shape = if input_format.is_tree_document() {
            DataShape::TreeDocument
        } else {
            DataShape::Table
        };
        Some((splitter, QaGate { source_supports_qa: true, shape }))
    } else {
        None
    };

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        if let Err(err) = ctrlc::set_handler(move || cancel.cancel()) {
            warn!("could not install Ctrl-C handler: {err}");
        }
    }
    let filter = match args.workers {
        Some(workers) => ParallelFilter::new(denylist, workers),
        None => ParallelFilter::with_available_workers(denylist),
    }
    .with_cancel_flag(cancel);

    let mut work = WorkingCopy::create(&args.input, &args.output)?;
    let bytes = fs::read(work.input())?;
    let encoding = detect_encoding(&bytes, input_format);
    ensure_encoding_compatible(input_format, output_format, encoding)?;
    let nodes = decode_corpus(&bytes, input_format, encoding)?;
    info!(input = %args.input.display(), rows = nodes.len(), encoding = %encoding, "loaded dataset");

    let curation = Curation { qa, sampler, filter };
    let outcome = curation.run(nodes, |stage, nodes| work.checkpoint(stage, nodes).map(|_| ()))?;

    let out_encoding = if output_format == DataFormat::Csv { encoding } else { TextEncoding::UTF8 };
    let bytes = encode_corpus(&outcome.nodes, output_format, out_encoding)?;
    atomic_write(&args.output, &bytes)?;
    info!(output = %args.output.display(), rows = outcome.nodes.len(), "curated dataset written");

    let stages: Vec<_> = outcome
        .reports
        .iter()
        .map(|r| {
            json!({
                "stage": r.stage,
                "rows_before": r.rows_before,
                "rows_after": r.rows_after,
                "seeds": r.seeds,
            })
        })
        .collect();
    let summary = json!({
        "output": args.output.display().to_string(),
        "encoding": encoding.name(),
        "rows": outcome.nodes.len(),
        "stages": stages,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
