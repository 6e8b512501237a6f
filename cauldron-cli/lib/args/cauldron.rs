use std::path::PathBuf;

use cauldron_core::{
    challenge::{Language, Level},
    config::IsolationMode,
};
use clap::{Parser, Subcommand};

use crate::styles;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Default port of the portal
pub const DEFAULT_PORTAL_PORT: u16 = 4780;

/// Default host of the portal
pub const DEFAULT_PORTAL_HOST: &str = "127.0.0.1";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Arguments for the cauldron command
#[derive(Debug, Parser)]
#[command(name = "cauldron", author, styles=styles::styles())]
pub struct CauldronArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<CauldronSubcommand>,

    /// Show version
    #[arg(short = 'V', long)]
    pub version: bool,

    /// Show logs with error level
    #[arg(long, global = true)]
    pub error: bool,

    /// Show logs with warn level
    #[arg(long, global = true)]
    pub warn: bool,

    /// Show logs with info level
    #[arg(long, global = true)]
    pub info: bool,

    /// Show logs with debug level
    #[arg(long, global = true)]
    pub debug: bool,

    /// Show logs with trace level
    #[arg(long, global = true)]
    pub trace: bool,
}

/// Options shared by every subcommand that executes code
#[derive(Debug, Clone, clap::Args)]
pub struct EngineOptions {
    /// Isolation backend: `process` (default) or `thread`
    #[arg(long)]
    pub isolation: Option<IsolationMode>,

    /// Stop runs after this many milliseconds
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Compare objects with sorted keys when grading
    #[arg(long, default_value_t = false)]
    pub normalize_keys: bool,
}

/// Available subcommands for the cauldron command
#[derive(Debug, Subcommand)]
pub enum CauldronSubcommand {
    /// Run a JavaScript file and print its output
    #[command(name = "run")]
    Run {
        /// File with the code to run
        file: PathBuf,

        /// Engine options
        #[command(flatten)]
        engine: EngineOptions,
    },

    /// Grade a JavaScript file against a challenge
    #[command(name = "test")]
    Test {
        /// File with the submission
        file: PathBuf,

        /// Id of the challenge, e.g. `js-novato-001`
        #[arg(short, long)]
        challenge: String,

        /// Catalog file to use instead of the bundled one
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Engine options
        #[command(flatten)]
        engine: EngineOptions,
    },

    /// List challenges
    #[command(name = "challenges")]
    Challenges {
        /// Only challenges of this level
        #[arg(short, long)]
        level: Option<Level>,

        /// Only challenges in this language
        #[arg(long)]
        language: Option<Language>,

        /// Catalog file to use instead of the bundled one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Serve the JSON-RPC portal
    #[command(name = "serve")]
    Serve {
        /// Host to bind
        #[arg(long, default_value = DEFAULT_PORTAL_HOST)]
        host: String,

        /// Port number to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORTAL_PORT)]
        port: u16,

        /// Catalog file to use instead of the bundled one
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Engine options
        #[command(flatten)]
        engine: EngineOptions,
    },

    /// Run one submission from stdin as an isolated worker
    #[command(name = "worker", hide = true)]
    Worker,
}
