pub mod analyze;
pub mod batch;
pub mod bundle;
pub mod generate;
pub mod init;
pub mod review;
#[cfg(feature = "server")]
pub mod serve;
pub mod status;

use std::path::Path;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::pdf::{RenderAssets, Renderer};
use crate::settings::Settings;

pub(crate) fn renderer(settings: &Settings) -> Result<Renderer> {
    Renderer::new(RenderAssets::from_settings(settings)?)
}

pub(crate) fn write_output(bytes: &[u8], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[derive(Parser)]
#[command(
    name = "vod",
    version,
    about = "Verification-of-deposit generator for surplus ledger exports."
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify deposits in one or more ledger workbooks.
    Analyze {
        /// Ledger .xlsx files
        #[arg(required = true)]
        files: Vec<String>,
        /// Print the classification as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render the verification PDF for a ledger.
    Generate {
        /// Ledger .xlsx file
        file: String,
        /// JSON file of labels keyed by transaction index ("__EXCLUDE__" drops a row)
        #[arg(long)]
        labels: Option<String>,
        /// Output path (default: <data_dir>/exports/<name> - VOD <date>.pdf)
        #[arg(long)]
        output: Option<String>,
        /// Render even if some deposits still need review
        #[arg(long)]
        force: bool,
    },
    /// Interactively label deposits that need review, then render.
    Review {
        /// Ledger .xlsx file
        file: String,
        /// Output path (default: <data_dir>/exports/<name> - VOD <date>.pdf)
        #[arg(long)]
        output: Option<String>,
        /// Also save the chosen labels as JSON for later `vod generate --labels`
        #[arg(long = "save-labels")]
        save_labels: Option<String>,
    },
    /// Process several ledgers; files needing review are reported, not rendered.
    Batch {
        /// Ledger .xlsx files
        #[arg(required = true)]
        files: Vec<String>,
        /// Directory for generated PDFs (default: <data_dir>/exports)
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
        /// Also pack the generated PDFs into VOD_Batch_<date>.zip
        #[arg(long)]
        zip: bool,
    },
    /// Pack existing PDFs into a zip archive.
    Bundle {
        /// Files to include
        #[arg(required = true)]
        files: Vec<String>,
        /// Archive path
        #[arg(long)]
        output: String,
    },
    /// Start the HTTP upload service.
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on (default from settings, 5000)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Write settings: data directory, logo, fonts and timezone.
    Init {
        /// Path for uploads, outputs and exports (default: ~/Documents/vodgen)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// PNG logo printed at the top of each document
        #[arg(long)]
        logo: Option<String>,
        /// Directory containing DejaVuSans.ttf and DejaVuSans-Bold.ttf
        #[arg(long = "font-dir")]
        font_dir: Option<String>,
        /// IANA timezone for the generation stamp
        #[arg(long)]
        timezone: Option<String>,
    },
    /// Show current settings and data directory usage.
    Status,
    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}
