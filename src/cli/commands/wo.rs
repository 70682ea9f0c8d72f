//! Work-order hierarchy command

use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{materialize, open_loader, print_view, Materialize};
use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::core::{RootKey, TreeMode, WorkOrderKey};

#[derive(clap::Args, Debug)]
pub struct WoArgs {
    /// Work order as BASE/LOT (main work order) or BASE/LOT/SUB
    pub work_order: String,

    /// Show operations and the material they consume instead of sub work orders only
    #[arg(long)]
    pub detailed: bool,

    /// Load the whole hierarchy instead of the first level
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Recursion limit (default: from config, 10)
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Expand the nodes along a path of keys separated by `>`
    #[arg(long, short = 'e', value_name = "PATH", conflicts_with = "all")]
    pub expand: Option<String>,
}

pub fn run(args: WoArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let mode = if args.detailed {
        TreeMode::Detailed
    } else {
        TreeMode::Simplified
    };
    let loader = open_loader(global, &config, mode)?;

    let key: WorkOrderKey = args.work_order.parse().into_diagnostic()?;
    let root = RootKey::work_order(key).into_diagnostic()?;

    let opts = Materialize {
        max_depth: args.max_depth.unwrap_or_else(|| config.max_depth()),
        all: args.all,
        expand: args.expand,
        row_budget: config.row_budget(),
    };
    let view = materialize(loader, root, &opts, global)?;
    print_view(&view, global, mode)
}
