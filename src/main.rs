mod classifier;
mod cli;
mod error;
mod extractor;
mod fmt;
mod models;
mod pdf;
mod pipeline;
mod reviewer;
#[cfg(feature = "server")]
mod server;
mod settings;
mod store;
#[cfg(test)]
mod testutil;
mod tui;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Analyze { files, json } => cli::analyze::run(&files, json),
        Commands::Generate {
            file,
            labels,
            output,
            force,
        } => cli::generate::run(&file, labels.as_deref(), output.as_deref(), force),
        Commands::Review {
            file,
            output,
            save_labels,
        } => cli::review::run(&file, output.as_deref(), save_labels.as_deref()),
        Commands::Batch {
            files,
            output_dir,
            zip,
        } => cli::batch::run(&files, output_dir.as_deref(), zip),
        Commands::Bundle { files, output } => cli::bundle::run(&files, &output),
        #[cfg(feature = "server")]
        Commands::Serve { port } => cli::serve::run(port),
        Commands::Init {
            data_dir,
            logo,
            font_dir,
            timezone,
        } => cli::init::run(data_dir, logo, font_dir, timezone),
        Commands::Status => cli::status::run(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "vod", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
