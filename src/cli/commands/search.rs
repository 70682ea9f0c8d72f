//! Search command - find job numbers or main work orders

use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{open_loader, truncate_str};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::core::{Domain, TreeMode};
use crate::entities::RootSummary;

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Job number or work-order base id; `%` and `_` are wildcards, a
    /// trailing `%` is added when none is given
    pub pattern: String,

    /// Search jobs (bill of materials roots) instead of work orders
    #[arg(long)]
    pub bom: bool,

    /// Maximum number of results (default: from config, 100)
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

/// Run the search command
pub fn run(args: SearchArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let loader = open_loader(global, &config, TreeMode::Simplified)?;

    let domain = if args.bom { Domain::Bom } else { Domain::WorkOrder };
    let limit = args.limit.unwrap_or_else(|| config.search_limit());
    let results = loader
        .search_roots(domain, &args.pattern, limit)
        .into_diagnostic()?;

    if global.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&results).into_diagnostic()?);
        return Ok(());
    }

    if results.is_empty() {
        if !global.quiet {
            println!("No results found for '{}'.", style(&args.pattern).yellow());
        }
        return Ok(());
    }

    let mut builder = Builder::default();
    match domain {
        Domain::Bom => builder.push_record(["Job", "Customer", "Assemblies"]),
        Domain::WorkOrder => {
            builder.push_record(["Status", "Work Order", "Qty", "Part", "Dates"])
        }
    }
    for result in &results {
        match result {
            RootSummary::Job(job) => builder.push_record([
                job.job_number.clone(),
                truncate_str(job.customer_display(), 40),
                job.assembly_count.to_string(),
            ]),
            RootSummary::WorkOrder(wo) => builder.push_record([
                wo.formatted_status(),
                wo.formatted_id(),
                wo.formatted_qty(),
                truncate_str(&wo.description(), 40),
                wo.formatted_dates(),
            ]),
        }
    }

    if !global.quiet {
        println!(
            "{} {} for '{}':",
            style(results.len()).cyan(),
            if results.len() == 1 { "result" } else { "results" },
            style(&args.pattern).yellow()
        );
        println!();
    }
    println!("{}", builder.build().with(Style::markdown()));

    Ok(())
}
