use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Commerce RS - stage, publish and inspect stored assets
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish files to the configured storage provider
    ///
    /// The files are staged in a fresh work area, promoted as one batch and
    /// the work area is removed afterwards.
    Publish {
        /// Files to publish
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Directory prefix of the published resource names
        #[arg(long, short)]
        prefix: Option<String>,

        /// Site the work area is allocated for
        #[arg(long)]
        site: Option<i64>,
    },

    /// Print a stored resource
    Get {
        /// Resource name
        #[arg(value_name = "NAME")]
        name: String,

        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Remove a stored resource
    Remove {
        /// Resource name
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Check a bundled static resource
    Static {
        /// Resource name relative to the static resource directory
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Render an HTML file as plain text
    RenderPlain {
        #[arg(value_name = "HTML_FILE")]
        file: PathBuf,
    },

    /// Compose and send an email from an HTML template
    Mail {
        /// Recipient address
        #[arg(value_name = "TO")]
        to: String,

        /// Subject line
        #[arg(long, short)]
        subject: String,

        /// HTML template with ${name} placeholders
        #[arg(long)]
        template: PathBuf,

        /// Template variable as key=value
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// CC recipient
        #[arg(long)]
        cc: Vec<String>,

        /// BCC recipient
        #[arg(long)]
        bcc: Vec<String>,

        /// File to attach
        #[arg(long)]
        attach: Vec<PathBuf>,
    },
}
