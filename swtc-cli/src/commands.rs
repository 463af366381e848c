//! Subcommand implementations, kept thin: parse input, call into
//! `swtc_core`, report results.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use swtc_core::target::DemoTarget;
use swtc_core::{partition_hot_cold_basic_blocks, reorder_basic_blocks, PassStats, ReorderConfig};

use crate::cfg_description::{self, CfgDescription};

fn load_description(path: &Path) -> Result<CfgDescription> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(cfg_description::parse(&text)?)
}

fn make_config(optimize_size: bool, enable_partitioning: bool) -> ReorderConfig {
    let mut config = ReorderConfig::new(Box::new(DemoTarget::default()));
    config.optimize_size = optimize_size;
    config.enable_partitioning = enable_partitioning;
    config
}

pub fn run_reorder(path: &Path, optimize_size: bool) -> Result<PassStats> {
    let desc = load_description(path)?;
    let mut graph = cfg_description::build_graph(&desc)?;
    info!("loaded {} blocks from {}", graph.len(), path.display());

    let config = make_config(optimize_size, false);
    let stats = reorder_basic_blocks(&mut graph, &config);
    Ok(stats)
}

pub fn run_partition(path: &Path, optimize_size: bool) -> Result<PassStats> {
    let desc = load_description(path)?;
    let mut graph = cfg_description::build_graph(&desc)?;
    info!("loaded {} blocks from {}", graph.len(), path.display());

    let config = make_config(optimize_size, true);
    let stats = partition_hot_cold_basic_blocks(&mut graph, &config);
    Ok(stats)
}

pub fn run_both(path: &Path, optimize_size: bool) -> Result<(PassStats, PassStats)> {
    let desc = load_description(path)?;
    let mut graph = cfg_description::build_graph(&desc)?;
    info!("loaded {} blocks from {}", graph.len(), path.display());

    let config = make_config(optimize_size, true);
    let reorder_stats = reorder_basic_blocks(&mut graph, &config);
    let partition_stats = partition_hot_cold_basic_blocks(&mut graph, &config);
    Ok((reorder_stats, partition_stats))
}
