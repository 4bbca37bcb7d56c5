//! Elichika ONNX CLI
//!
//! Converts JSON traces to ONNX models and dumps models as protobuf text.

use anyhow::Context;
use clap::{Parser, Subcommand};
use elichika_onnx::config::ConfigFile;
use elichika_onnx::text_format::{strip_large_values, to_text};
use elichika_onnx::{compile_model, load_model, save_model, save_model_as_text, TraceFile};
use std::path::{Path, PathBuf};
use std::process;
use tracing::warn;

/// Elichika ONNX - export traced neural-network graphs to ONNX
#[derive(Parser, Debug)]
#[command(name = "elichika-onnx")]
#[command(version)]
#[command(about = "Export traced neural-network graphs to ONNX", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a JSON trace into an ONNX model
    Convert(ConvertArgs),

    /// Print ONNX models as protobuf text
    Dump(DumpArgs),
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Traced graph (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Output path for the binary .onnx model
    #[arg(short, long)]
    output: PathBuf,

    /// Also write the protobuf text form to this path
    #[arg(long)]
    text: Option<PathBuf>,

    /// Path to config file (TOML format)
    ///
    /// If not specified, searches for config in:
    /// 1. ./elichika-onnx.toml (current dir)
    /// 2. ~/.config/elichika/onnx-exporter.toml (user config)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Producer name written to the model
    #[arg(long = "producer-name")]
    producer_name: Option<String>,

    /// Default-domain opset version
    #[arg(long)]
    opset: Option<i64>,
}

#[derive(Parser, Debug)]
struct DumpArgs {
    /// ONNX model files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Dump all tensor values
    #[arg(long)]
    full: bool,

    /// Path to config file (TOML format)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Convert(args) => run_convert(args),
        Commands::Dump(args) => run_dump(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// An explicit `--config` must load; standard locations are best effort
fn load_config(path: Option<&Path>) -> anyhow::Result<ConfigFile> {
    if let Some(path) = path {
        return ConfigFile::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    match ConfigFile::find_and_load() {
        Ok(found) => Ok(found.unwrap_or_default()),
        Err(e) => {
            warn!("Ignoring config file: {}", e);
            Ok(ConfigFile::default())
        }
    }
}

fn run_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?.merge_with_cli(args.producer_name, args.opset);

    let model = compile_model(&TraceFile::new(&args.input), &config)
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;

    save_model(&model, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    if let Some(text) = &args.text {
        save_model_as_text(&model, text)
            .with_context(|| format!("Failed to write {}", text.display()))?;
    }

    let graph_nodes = model.model.graph.as_ref().map_or(0, |g| g.node.len());
    println!(
        "Converted {} -> {} ({} nodes, {} initializers, {} skipped calls)",
        args.input.display(),
        args.output.display(),
        graph_nodes,
        model.stats.initializers,
        model.stats.nodes_skipped
    );
    Ok(())
}

fn run_dump(args: DumpArgs) -> anyhow::Result<()> {
    let threshold = load_config(args.config.as_deref())?
        .merge_with_cli(None, None)
        .strip_threshold;

    for file in &args.files {
        println!("=== {} ===", file.display());
        let mut model =
            load_model(file).with_context(|| format!("Failed to load {}", file.display()))?;
        if !args.full {
            strip_large_values(&mut model, threshold);
        }
        print!("{}", to_text(&model));
    }
    Ok(())
}
