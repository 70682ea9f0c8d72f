//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    bom::BomArgs, completions::CompletionsArgs, search::SearchArgs, wo::WoArgs,
};

#[derive(Parser)]
#[command(name = "olt")]
#[command(author, version, about = "Order Lookup Toolkit")]
#[command(long_about = "Read-only lookup of bills of materials and work-order hierarchies from an ERP snapshot.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "tree")]
    pub format: OutputFormat,

    /// SQLite snapshot to read (default: from config or OLT_DATABASE)
    #[arg(long, short = 'd', global = true)]
    pub database: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search job numbers or main work orders
    Search(SearchArgs),

    /// Show the bill of materials of a job
    Bom(BomArgs),

    /// Show the hierarchy below a work order
    Wo(WoArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Indented tree with colours
    #[default]
    Tree,
    /// JSON format (for programming)
    Json,
}
