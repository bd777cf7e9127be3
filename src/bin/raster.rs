// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Out-of-process rasterization worker
//!
//! Reads a JSON request, rasterizes the referenced STL onto the requested
//! grid and writes the labelmap. Diagnostics go to stderr; a non-zero exit
//! status means no usable output was produced.

use anyhow::{Context, Result};
use clap::Parser;
use hemifuse::raster::{serve_request, WorkerRequest};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hemifuse-raster")]
#[command(about = "Rasterize one mesh onto a labelmap grid", long_about = None)]
#[command(version)]
struct Args {
    /// Request file written by the calling pipeline
    #[arg(long, value_name = "FILE")]
    request: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let start = Instant::now();
    let request = WorkerRequest::load(&args.request)
        .with_context(|| format!("Failed to load request: {:?}", args.request))?;
    let foreground = serve_request(&request)
        .with_context(|| format!("Failed to rasterize mesh {}", request.mesh_ref))?;

    info!(
        mesh = %request.mesh_ref,
        foreground,
        elapsed = ?start.elapsed(),
        "labelmap written"
    );
    Ok(())
}
