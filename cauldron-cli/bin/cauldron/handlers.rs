use std::{env, fs, path::PathBuf, time::Duration};

use cauldron_cli::{AnsiStyles, CauldronArgs, CauldronCliError, CauldronCliResult, EngineOptions};
use cauldron_core::{
    challenge::{Catalog, ChallengeSession, Language, Level, Validation},
    config::{EngineConfig, IsolationMode, KeyOrder, ISOLATION_ENV_VAR},
    coordinator::Coordinator,
    grader::{Grader, TestResult},
    sink::{MessageKind, OutputCursor, OutputMessage},
};
use cauldron_portal::{route, state::AppState};

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

pub fn log_level(args: &CauldronArgs) {
    let level = if args.trace {
        Some("trace")
    } else if args.debug {
        Some("debug")
    } else if args.info {
        Some("info")
    } else if args.warn {
        Some("warn")
    } else if args.error {
        Some("error")
    } else {
        None
    };

    // Set RUST_LOG environment variable only if a level is specified
    if let Some(level) = level {
        env::set_var(
            "RUST_LOG",
            format!(
                "cauldron={level},cauldron_core={level},cauldron_portal={level},cauldron_cli={level}"
            ),
        );
    }
}

pub async fn run_subcommand(file: PathBuf, engine: EngineOptions) -> CauldronCliResult<()> {
    let source = fs::read_to_string(&file)?;
    let coordinator = Coordinator::new(engine_config(&engine)?)?;

    tracing::info!(file = %file.display(), "running file");
    coordinator.run(source);

    let mut status = coordinator.subscribe();
    let mut cursor = OutputCursor::default();

    loop {
        let running = status.borrow_and_update().running;

        let (fresh, next) = coordinator.messages_since(cursor);
        for message in &fresh {
            print_message(message);
        }
        cursor = next;

        if !running {
            break;
        }

        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                coordinator.cancel();
            }
        }
    }

    Ok(())
}

pub fn test_subcommand(
    file: PathBuf,
    challenge_id: String,
    catalog: Option<PathBuf>,
    engine: EngineOptions,
) -> CauldronCliResult<()> {
    let source = fs::read_to_string(&file)?;
    let catalog = load_catalog(catalog)?;
    let challenge = catalog.find(&challenge_id)?;

    let config = engine_config(&engine)?;
    let grader = Grader::from_config(&config);
    let coordinator = Coordinator::new(config)?;

    println!(
        "{} {} {}",
        challenge.level.icon(),
        challenge.title.header(),
        format!("({})", challenge.id).placeholder()
    );

    let validation = ChallengeSession::new().validate(&coordinator, &grader, challenge, &source)?;

    if let Validation::Graded { results, .. } = &validation {
        for result in results {
            print_result(result);
        }
    }

    for message in coordinator.messages() {
        print_message(&message);
    }

    match validation {
        Validation::Graded {
            results,
            all_passed: false,
            ..
        } => Err(CauldronCliError::TestsFailed {
            passed: results.iter().filter(|r| r.passed).count(),
            total: results.len(),
        }),
        _ => Ok(()),
    }
}

pub fn challenges_subcommand(
    level: Option<Level>,
    language: Option<Language>,
    catalog: Option<PathBuf>,
) -> CauldronCliResult<()> {
    let catalog = load_catalog(catalog)?;

    let candidates = match language {
        Some(language) => catalog.by_language(language),
        None => catalog.iter().collect(),
    };

    for tier in Level::ALL {
        if level.is_some_and(|wanted| wanted != tier) {
            continue;
        }

        let challenges: Vec<_> = candidates.iter().filter(|c| c.level == tier).collect();
        if challenges.is_empty() {
            continue;
        }

        println!("{} {}", tier.icon(), tier.display_name().header());
        for challenge in challenges {
            let tests = match challenge.tests.len() {
                0 => "sin tests".to_string(),
                1 => "1 test".to_string(),
                n => format!("{} tests", n),
            };

            println!(
                "  {} {} {} {}",
                challenge.id.literal(),
                challenge.title,
                challenge.language.icon(),
                format!("({})", tests).placeholder()
            );
        }
    }

    Ok(())
}

pub async fn serve_subcommand(
    host: String,
    port: u16,
    catalog: Option<PathBuf>,
    engine: EngineOptions,
) -> CauldronCliResult<()> {
    let catalog = load_catalog(catalog)?;
    let coordinator = Coordinator::new(engine_config(&engine)?)?;

    let state = AppState::new(coordinator, catalog);
    let app = route::create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Starting portal on {}", addr);
    println!(
        "{} Portal listening on {}",
        console::style("✓").green(),
        console::style(&addr).yellow()
    );

    axum::serve(listener, app).await?;

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Engine configuration for the CLI: environment first, flags on top.
///
/// Unless `CAULDRON_ISOLATION` says otherwise, the CLI runs code in worker processes backed by
/// this very binary.
fn engine_config(options: &EngineOptions) -> CauldronCliResult<EngineConfig> {
    let mut config = EngineConfig::from_env()?;

    if env::var_os(ISOLATION_ENV_VAR).is_none() {
        config.set_isolation(IsolationMode::Process);
    }

    if let Some(isolation) = options.isolation {
        config.set_isolation(isolation);
    }

    if let Some(ms) = options.timeout_ms {
        config.set_timeout(Some(Duration::from_millis(ms)));
    }

    if options.normalize_keys {
        config.set_key_order(KeyOrder::Normalized);
    }

    config.validate()?;
    Ok(config)
}

fn load_catalog(path: Option<PathBuf>) -> CauldronCliResult<Catalog> {
    Ok(match path {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::bundled()?,
    })
}

fn print_message(message: &OutputMessage) {
    let text = match message.kind {
        MessageKind::Log => message.text.clone(),
        MessageKind::Error => console::style(&message.text).red().to_string(),
        MessageKind::Warn => console::style(&message.text).yellow().to_string(),
        MessageKind::Info => console::style(&message.text).cyan().to_string(),
        MessageKind::Success => console::style(&message.text).green().to_string(),
    };

    println!("{}", text);
}

fn print_result(result: &TestResult) {
    if result.passed {
        println!("  {}", console::style(&result.message).green());
    } else {
        println!("  {}", result.message.error());
    }
}
