mod handlers;

use cauldron_cli::{AnsiStyles, CauldronArgs, CauldronCliResult, CauldronSubcommand};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> CauldronCliResult<()> {
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = CauldronArgs::parse();

    // Logs go to stderr so a worker's stdout carries nothing but frames.
    handlers::log_level(&args);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Print version if requested
    if args.version {
        println!("{}", format!("v{}", env!("CARGO_PKG_VERSION")).literal());
        return Ok(());
    }

    match args.subcommand {
        Some(CauldronSubcommand::Run { file, engine }) => {
            handlers::run_subcommand(file, engine).await?;
        }
        Some(CauldronSubcommand::Test {
            file,
            challenge,
            catalog,
            engine,
        }) => {
            handlers::test_subcommand(file, challenge, catalog, engine)?;
        }
        Some(CauldronSubcommand::Challenges {
            level,
            language,
            catalog,
        }) => {
            handlers::challenges_subcommand(level, language, catalog)?;
        }
        Some(CauldronSubcommand::Serve {
            host,
            port,
            catalog,
            engine,
        }) => {
            handlers::serve_subcommand(host, port, catalog, engine).await?;
        }
        Some(CauldronSubcommand::Worker) => {
            cauldron_core::unit::serve_stdio()?;
        }
        None => {
            CauldronArgs::command().print_help()?;
        }
    }

    Ok(())
}
