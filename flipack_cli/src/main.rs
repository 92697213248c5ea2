use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use flipack_codecs::codec_by_name;
use flipack_core::{ArtifactStore, ChunkSizePolicy, SearchConfig, SearchOptimizer, TransformKind};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "flipack",
    about = "Search reversible chunk transforms that make a file compress smaller",
    version
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CodecArgs {
    /// Compressor backend: passthrough | zstd | lz4 | gzip
    #[arg(short, long, default_value = "zstd")]
    codec: String,
    /// Compression level for zstd (1–22) or gzip (0–9)
    #[arg(long)]
    level: Option<i32>,
}

#[derive(Args)]
struct SearchArgs {
    /// JSON search configuration; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,
    /// Random seed for parameter sampling
    #[arg(long)]
    seed: Option<u64>,
    /// Stop after this many trials
    #[arg(long)]
    max_iterations: Option<u64>,
    /// Stop after this many consecutive trials without improvement
    #[arg(long)]
    patience: Option<u64>,
    /// Stop after this many milliseconds
    #[arg(long)]
    time_budget_ms: Option<u64>,
    /// Smallest chunk size to try
    #[arg(long)]
    min_chunk: Option<u32>,
    /// Largest chunk size to try
    #[arg(long)]
    max_chunk: Option<u32>,
    /// Try only these chunk sizes (comma separated)
    #[arg(long, value_delimiter = ',', conflicts_with = "sweep_step")]
    chunk_sizes: Vec<u32>,
    /// Sweep min_chunk..=max_chunk with this step instead of sampling
    #[arg(long)]
    sweep_step: Option<u32>,
    /// Most chunk positions one trial may select
    #[arg(long)]
    max_positions: Option<u32>,
    /// Transforms to try (comma separated): reverse, rotate:<n>, xor:<mask>
    #[arg(long, value_delimiter = ',')]
    transforms: Vec<String>,
    /// Trials evaluated in parallel
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search transform parameters and write the smallest verified artifact
    Compress {
        /// Source file
        input: PathBuf,
        /// Destination artifact
        output: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Restore the original file from an artifact
    Extract {
        /// Source artifact
        input: PathBuf,
        /// Destination file
        output: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Print the transform metadata stored in an artifact
    Inspect {
        /// Artifact to inspect
        file: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
        /// Print every selected chunk position
        #[arg(long)]
        positions: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_default_env();
    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(buf, "[{}] {}", record.level(), record.args())
    });
    let _ = builder.try_init();
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn build_config(args: &SearchArgs) -> anyhow::Result<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading search config {:?}", path))?;
            serde_json::from_str::<SearchConfig>(&text)
                .with_context(|| format!("parsing search config {:?}", path))?
        }
        None => SearchConfig::default(),
    };

    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.max_iterations.is_some() {
        config.max_iterations = args.max_iterations;
    }
    if args.patience.is_some() {
        config.patience = args.patience;
    }
    if args.time_budget_ms.is_some() {
        config.time_budget_ms = args.time_budget_ms;
    }
    if let Some(n) = args.max_positions {
        config.max_positions = n;
    }
    if let Some(n) = args.workers {
        config.workers = n;
    }

    if !args.chunk_sizes.is_empty() {
        config.chunk_sizes = ChunkSizePolicy::FixedSet {
            sizes: args.chunk_sizes.clone(),
        };
    } else if args.min_chunk.is_some() || args.max_chunk.is_some() || args.sweep_step.is_some()
    {
        let (default_min, default_max) = match config.chunk_sizes {
            ChunkSizePolicy::Uniform { min, max } | ChunkSizePolicy::Sweep { min, max, .. } => {
                (min, max)
            }
            ChunkSizePolicy::FixedSet { .. } => match ChunkSizePolicy::default() {
                ChunkSizePolicy::Uniform { min, max } => (min, max),
                _ => (2, 4096),
            },
        };
        let min = args.min_chunk.unwrap_or(default_min);
        let max = args.max_chunk.unwrap_or(default_max);
        config.chunk_sizes = match args.sweep_step {
            Some(step) => ChunkSizePolicy::Sweep { min, max, step },
            None => ChunkSizePolicy::Uniform { min, max },
        };
    }

    if !args.transforms.is_empty() {
        config.kinds = args
            .transforms
            .iter()
            .map(|s| s.parse::<TransformKind>())
            .collect::<Result<Vec<_>, _>>()?;
    }

    config.validate()?;
    Ok(config)
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    codec_args: &CodecArgs,
    search_args: &SearchArgs,
) -> anyhow::Result<()> {
    let codec = codec_by_name(&codec_args.codec, codec_args.level)?;
    let config = build_config(search_args)?;

    let data = fs::read(&input).with_context(|| format!("reading input file {:?}", input))?;
    let raw_size = data.len() as u64;

    let t0 = Instant::now();
    let optimizer = SearchOptimizer::new(codec.clone(), config)?;
    let report = optimizer
        .run(&data)
        .with_context(|| format!("searching transforms for {:?}", input))?;

    let params = report.best.params().clone();
    let trial = report.best.trial();
    let store = ArtifactStore::new(codec.clone());
    let info = store
        .persist(&output, report.best)
        .with_context(|| format!("writing artifact {:?}", output))?;
    drop(data);
    let elapsed = t0.elapsed();

    eprintln!("  codec       : {}", codec.name());
    eprintln!("  trials      : {} ({})", report.iterations, report.stop_reason);
    eprintln!("  best trial  : {}", trial);
    eprintln!("  chunk size  : {}", human_bytes(u64::from(params.chunk_size)));
    eprintln!("  transform   : {}", params.kind);
    eprintln!("  positions   : {}", params.positions().len());
    eprintln!("  raw size    : {}", human_bytes(raw_size));
    eprintln!("  compressed  : {}", human_bytes(info.artifact_size));
    eprintln!("  ratio       : {:.2}x", info.ratio());
    if !report.rejected.is_empty() {
        eprintln!("  rejected    : {:?}", report.rejected);
    }
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_extract(input: PathBuf, output: PathBuf, codec_args: &CodecArgs) -> anyhow::Result<()> {
    let codec = codec_by_name(&codec_args.codec, codec_args.level)?;
    let store = ArtifactStore::new(codec);

    let t0 = Instant::now();
    let written = store
        .restore_to(&input, &output)
        .with_context(|| format!("restoring {:?} into {:?}", input, output))?;
    let elapsed = t0.elapsed();

    eprintln!("  raw size    : {}", human_bytes(written));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((written as f64 / elapsed.as_secs_f64().max(1e-9)) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(
    file: PathBuf,
    codec_args: &CodecArgs,
    show_positions: bool,
) -> anyhow::Result<()> {
    let codec = codec_by_name(&codec_args.codec, codec_args.level)?;
    let store = ArtifactStore::new(codec.clone());
    let info = store
        .inspect(&file)
        .with_context(|| format!("inspecting {:?}", file))?;
    let params = &info.metadata.params;

    println!("=== flipack artifact: {:?} ===", file);
    println!();
    println!("  codec          : {}", codec.name());
    println!("  artifact size  : {}", human_bytes(info.artifact_size));
    println!("  payload size   : {}", human_bytes(info.payload_size));
    println!("  original size  : {}", human_bytes(info.metadata.original_size));
    println!("  ratio          : {:.2}x", info.ratio());
    println!("  digest         : {:016x}", info.digest);
    println!("  transform      : {}", params.kind);
    println!("  chunk size     : {}", params.chunk_size);
    println!(
        "  chunks         : {}",
        params.chunk_count(info.metadata.original_size as usize)
    );
    println!("  positions      : {}", params.positions().len());

    if show_positions {
        println!();
        for row in params.positions().chunks(12) {
            let line: Vec<String> = row.iter().map(|p| format!("{:>6}", p)).collect();
            println!("  {}", line.join(" "));
        }
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Compress {
            input,
            output,
            codec,
            search,
        } => run_compress(input, output, &codec, &search),
        Commands::Extract {
            input,
            output,
            codec,
        } => run_extract(input, output, &codec),
        Commands::Inspect {
            file,
            codec,
            positions,
        } => run_inspect(file, &codec, positions),
    }
}
