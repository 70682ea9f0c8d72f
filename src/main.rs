use clap::Parser;
use miette::Result;
use olt::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    olt::core::logging::init_logging(global.verbose);

    match cli.command {
        Commands::Search(args) => olt::cli::commands::search::run(args, &global),
        Commands::Bom(args) => olt::cli::commands::bom::run(args, &global),
        Commands::Wo(args) => olt::cli::commands::wo::run(args, &global),
        Commands::Completions(args) => olt::cli::commands::completions::run(args),
    }
}
