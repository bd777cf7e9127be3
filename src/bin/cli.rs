// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Hemifuse CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use hemifuse::config::WorkerConfig;
use hemifuse::io::read_nrrd;
use hemifuse::store::label_digest;
use hemifuse::{CancelToken, DirectoryStore, FusePipeline, FuseRequest, MeshId, PipelineConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hemifuse")]
#[command(about = "Fuse two half-surfaces into one sealed binary labelmap", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./hemifuse.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Voxelize, unite and close two meshes, then publish the labelmap
    Fuse {
        /// Store directory holding the meshes
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Left mesh reference (path below the root, without .stl)
        left: String,

        /// Right mesh reference
        right: String,

        /// Name of the published volume
        #[arg(short, long, default_value = "fused")]
        output: String,

        /// External rasterization worker executable
        #[arg(long, value_name = "PROGRAM")]
        worker: Option<PathBuf>,

        /// Print the receipt as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report bounds and reference planes of two meshes
    Analyze {
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        left: String,
        right: String,
    },

    /// Summarize an NRRD labelmap
    Inspect {
        /// Labelmap file
        input: PathBuf,
    },

    /// List meshes and published volumes in a store directory
    List {
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// Print the effective configuration, or write it to a file
    Config {
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Fuse {
            root,
            left,
            right,
            output,
            worker,
            json,
        } => fuse_command(config, &root, left, right, output, worker, json),
        Commands::Analyze { root, left, right } => analyze_command(config, &root, left, right),
        Commands::Inspect { input } => inspect_command(&config, &input),
        Commands::List { root } => list_command(&root),
        Commands::Config { output } => config_command(&config, output.as_deref()),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let mut config = PipelineConfig::from_file(path)?;
            config.apply_env()?;
            Ok(config)
        }
        None => PipelineConfig::load(),
    }
}

fn fuse_command(
    mut config: PipelineConfig,
    root: &Path,
    left: String,
    right: String,
    output: String,
    worker: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if let Some(program) = worker {
        config.voxelizer.worker = WorkerConfig::Process {
            program,
            args: Vec::new(),
        };
    }

    let store = DirectoryStore::new(root).with_labels(config.labels);
    let pipeline = FusePipeline::new(config);
    let request = FuseRequest::new(left, right, output);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    spinner.set_message(format!("Fusing {} + {}", request.left, request.right));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = pipeline.run(&store, &request, &CancelToken::new());
    spinner.finish_and_clear();
    let outcome = result.with_context(|| format!("Failed to fuse {} and {}", request.left, request.right))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.receipt)?);
        return Ok(());
    }

    let receipt = &outcome.receipt;
    println!("{} {}", "✓".green(), "Fusion complete".bold());
    println!("  {} {}", "Volume:".bright_black(), receipt.name.cyan());
    println!("  {} {}", "Location:".bright_black(), receipt.location);
    println!("  {} {:?}", "Dimensions:".bright_black(), receipt.dims);
    println!(
        "  {} {} of {} ({:.2}%)",
        "Foreground:".bright_black(),
        receipt.foreground.to_string().green(),
        receipt.voxels,
        100.0 * receipt.foreground as f64 / receipt.voxels.max(1) as f64
    );
    println!(
        "  {} {} ({:?})",
        "Dilation radius:".bright_black(),
        outcome.params.radius.to_string().yellow(),
        outcome.params.element
    );
    println!("  {} {}", "SHA-256:".bright_black(), receipt.digest.bright_black());
    println!("  {} {:.2?}", "Elapsed:".bright_black(), outcome.elapsed);
    Ok(())
}

fn analyze_command(config: PipelineConfig, root: &Path, left: String, right: String) -> Result<()> {
    let store = DirectoryStore::new(root);
    let pipeline = FusePipeline::new(config);
    let analysis = pipeline
        .analyze(&store, &MeshId::new(left), &MeshId::new(right))
        .context("Failed to analyze meshes")?;
    let planes = &analysis.planes;

    println!("{}", "Bounds".bold());
    for (label, bounds) in [("left", &analysis.left), ("right", &analysis.right)] {
        println!(
            "  {:<6} min {:>9.3} {:>9.3} {:>9.3}   max {:>9.3} {:>9.3} {:>9.3}",
            label, bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
        );
    }
    println!("{}", "Reference planes".bold());
    println!("  {} {:.3}", "left bound: ".bright_black(), planes.left_bound);
    println!("  {} {:.3}", "right bound:".bright_black(), planes.right_bound);
    println!("  {} {:.3}", "top bound:  ".bright_black(), planes.top_bound);
    println!("  {} {:.3}", "front bound:".bright_black(), planes.front_bound);
    println!("  {} {:.3}", "back bound: ".bright_black(), planes.back_bound);
    println!("  {} {:.3}", "midline:    ".bright_black(), planes.midline);
    println!("  {} {:.3}", "halfway:    ".bright_black(), planes.halfway);

    let divisor = pipeline.config().morphology.radius_divisor;
    match hemifuse::morphology::derive_radius(planes.span(), divisor) {
        Ok(radius) => println!("  {} {}", "radius:     ".bright_black(), radius.to_string().yellow()),
        Err(e) => println!("  {} {}", "radius:     ".bright_black(), e.to_string().red()),
    }
    Ok(())
}

fn inspect_command(config: &PipelineConfig, input: &Path) -> Result<()> {
    let grid = read_nrrd(input, &config.labels)
        .with_context(|| format!("Failed to read labelmap: {:?}", input))?;
    let spec = grid.spec();

    println!("{}", input.display().to_string().bold());
    println!("  {} {:?}", "Dimensions:".bright_black(), spec.dims);
    println!("  {} {:?}", "Spacing:".bright_black(), spec.spacing.as_slice());
    println!("  {} {:?}", "Origin:".bright_black(), spec.origin.coords.as_slice());
    for (axis, name) in ["i", "j", "k"].iter().enumerate() {
        let column = spec.directions.column(axis);
        println!(
            "  {} {:>6.3} {:>6.3} {:>6.3}",
            format!("Axis {}:", name).bright_black(),
            column[0],
            column[1],
            column[2]
        );
    }
    println!(
        "  {} {} of {}",
        "Foreground:".bright_black(),
        grid.foreground_count().to_string().green(),
        grid.voxels().len()
    );
    println!("  {} {}", "SHA-256:".bright_black(), label_digest(&grid, &config.labels));
    Ok(())
}

fn list_command(root: &Path) -> Result<()> {
    let store = DirectoryStore::new(root);

    let meshes = store.list_meshes();
    println!("{} ({})", "Meshes".bold(), meshes.len());
    for id in &meshes {
        println!("  {}", id.to_string().cyan());
    }

    let volumes = store.list_volumes();
    println!("{} ({})", "Volumes".bold(), volumes.len());
    for name in &volumes {
        println!("  {}", name.green());
    }
    Ok(())
}

fn config_command(config: &PipelineConfig, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            config.save(path)?;
            println!("{} Configuration written to {}", "✓".green(), path.display());
        }
        None => print!("{}", config.to_toml()?),
    }
    Ok(())
}
