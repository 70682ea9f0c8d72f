//! Bill of materials command

use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{materialize, open_loader, print_view, Materialize};
use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::core::{RootKey, TreeMode};

#[derive(clap::Args, Debug)]
pub struct BomArgs {
    /// Job (customer order) number
    pub job: String,

    /// Load the whole hierarchy instead of the first level
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Recursion limit (default: from config, 10)
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Expand the nodes along a path of keys, e.g. `00/0>01/1`
    #[arg(long, short = 'e', value_name = "PATH", conflicts_with = "all")]
    pub expand: Option<String>,
}

pub fn run(args: BomArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let loader = open_loader(global, &config, TreeMode::Simplified)?;
    let root = RootKey::job(&args.job).into_diagnostic()?;

    let opts = Materialize {
        max_depth: args.max_depth.unwrap_or_else(|| config.max_depth()),
        all: args.all,
        expand: args.expand,
        row_budget: config.row_budget(),
    };
    let view = materialize(loader, root, &opts, global)?;
    print_view(&view, global, TreeMode::Simplified)
}
