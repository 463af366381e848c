// CLI driver for the basic-block reordering / hot-cold partitioning pass
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

pub mod cfg_description;
pub mod commands;

use commands::{run_both, run_partition, run_reorder};

#[derive(Parser)]
#[command(name = "swtc")]
#[command(about = "Software trace cache: basic-block reordering and hot/cold partitioning")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Reorder basic blocks into fall-through-maximising traces
    Reorder {
        /// Path to a JSON control-flow graph description
        #[arg(short, long)]
        cfg_file: PathBuf,

        /// Favor code size over execution speed when breaking ties
        #[arg(long)]
        optimize_size: bool,
    },
    /// Classify blocks hot/cold and rewrite the CFG so the split is realizable
    Partition {
        /// Path to a JSON control-flow graph description
        #[arg(short, long)]
        cfg_file: PathBuf,

        /// Favor code size over execution speed when breaking ties
        #[arg(long)]
        optimize_size: bool,
    },
    /// Run reordering followed by partitioning
    Both {
        /// Path to a JSON control-flow graph description
        #[arg(short, long)]
        cfg_file: PathBuf,

        /// Favor code size over execution speed when breaking ties
        #[arg(long)]
        optimize_size: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reorder { cfg_file, optimize_size } => {
            let pb = create_progress_bar("Forming traces...");
            let stats = run_reorder(&cfg_file, optimize_size)?;
            pb.finish_with_message(format!(
                "Formed {} trace(s) across {} block(s), duplicated {}",
                stats.traces_formed, stats.blocks, stats.blocks_duplicated
            ));
        }
        Commands::Partition { cfg_file, optimize_size } => {
            let pb = create_progress_bar("Classifying hot/cold partitions...");
            let stats = run_partition(&cfg_file, optimize_size)?;
            pb.finish_with_message(format!(
                "{} crossing edge(s), {} crossing jump note(s)",
                stats.crossing_edges, stats.crossing_jump_notes
            ));
        }
        Commands::Both { cfg_file, optimize_size } => {
            let pb = create_progress_bar("Reordering and partitioning...");
            let (reorder_stats, partition_stats) = run_both(&cfg_file, optimize_size)?;
            pb.finish_with_message(format!(
                "{} trace(s), {} crossing edge(s), {} crossing jump note(s)",
                reorder_stats.traces_formed, partition_stats.crossing_edges, partition_stats.crossing_jump_notes
            ));
        }
    }

    Ok(())
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb
}
