//! FlowRunner CLI Entry Point
//!
//! Loads a JSON flow document, recovers or starts the execution for a
//! scope and fires trigger codes against it.
//!
//! # Usage
//!
//! ```bash
//! # Show the current state of the default execution
//! flowrunner approval.json
//!
//! # Fire triggers 1 then 2
//! flowrunner approval.json --fire 1 --fire 2
//!
//! # Keep progress between runs, one execution per scope
//! flowrunner approval.json --state-dir .flowrunner --scope invoice-42 --fire 1
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{error, info};
use uuid::Uuid;

use flowrunner::activity::ActivityResolver;
use flowrunner::config::{EngineConfig, ResolutionPolicy};
use flowrunner::execution::{FireResult, FlowOperator};
use flowrunner::flow::{Flow, SerializedFlow};
use flowrunner::storage::file::DEFAULT_STATE_DIR;
use flowrunner::storage::{
    ExecutionRepository, FileExecutionRepository, InMemoryExecutionRepository, InMemoryFlowRepository,
};
use flowrunner::{APP_NAME, VERSION};

/// Command-line options parsed from arguments.
#[derive(Debug, Default)]
struct Options {
    flow_path: Option<PathBuf>,
    fires: Vec<i32>,
    scope: Option<String>,
    state_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    strict: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Programmable Workflow Engine");
    println!();
}

fn print_usage() {
    println!("Usage: flowrunner [OPTIONS] <FLOW_JSON>");
    println!();
    println!("Arguments:");
    println!("  <FLOW_JSON>         Path to a JSON flow document");
    println!();
    println!("Options:");
    println!("  --fire CODE         Fire a trigger code (repeatable, fired in order)");
    println!("  --scope NAME        Execution scope (default: unscoped)");
    println!("  --state-dir DIR     Persist executions under DIR");
    println!("  --persist           Persist executions under {}", DEFAULT_STATE_DIR);
    println!("  --config PATH       Engine config file (YAML)");
    println!("  --strict            Fail when a hook activity cannot be resolved");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  flowrunner approval.json --fire 1 --fire 2");
    println!("  flowrunner approval.json --persist --scope invoice-42 --fire 1");
}

/// Returns the value following option `name`.
fn option_value<'a>(args: &'a [String], i: &mut usize, name: &str) -> Result<&'a String, String> {
    *i += 1;
    args.get(*i)
        .ok_or_else(|| format!("{} requires an argument", name))
}

fn parse_arguments(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => options.verbose = true,
            "--strict" => options.strict = true,
            "--fire" => {
                let value = option_value(args, &mut i, "--fire")?;
                let code = value
                    .parse()
                    .map_err(|_| format!("Invalid trigger code: {}", value))?;
                options.fires.push(code);
            }
            "--scope" => {
                options.scope = Some(option_value(args, &mut i, "--scope")?.clone());
            }
            "--persist" => {
                if options.state_dir.is_none() {
                    options.state_dir = Some(PathBuf::from(DEFAULT_STATE_DIR));
                }
            }
            "--state-dir" => {
                options.state_dir = Some(PathBuf::from(option_value(args, &mut i, "--state-dir")?));
            }
            "--config" => {
                options.config_path = Some(PathBuf::from(option_value(args, &mut i, "--config")?));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if options.flow_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                options.flow_path = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Merges the config file with command-line overrides.
fn engine_config(options: &Options) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match &options.config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::discover()?,
    };

    if options.strict {
        config.activity_resolution = ResolutionPolicy::Strict;
    }
    if let Some(dir) = &options.state_dir {
        config.state_dir = Some(dir.clone());
    }

    Ok(config)
}

/// Builds the flow document. Documents without an id get one derived from
/// their key, so persisted executions find their flow on the next run.
async fn load_document(
    path: &Path,
    resolver: &ActivityResolver,
    policy: ResolutionPolicy,
) -> Result<Flow, Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Could not read flow from '{}': {}", path.display(), e))?;

    let mut document = SerializedFlow::from_json(&content)?;
    if document.id.is_none() {
        document.id = Some(Uuid::new_v5(&Uuid::NAMESPACE_OID, document.key.as_bytes()));
    }

    Ok(document.build(resolver, policy).await?)
}

fn print_result(action: i32, result: &FireResult) {
    if result.is_completed() {
        println!("  {} fire {}: {}", "✓".green(), action, result.message);
    } else {
        println!("  {} fire {}: {}", "✗".red(), action, result.message.red());
    }
}

/// Main application logic. Returns false if any fire failed.
async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let options = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(options.verbose);
    print_banner();

    let flow_path = options
        .flow_path
        .clone()
        .ok_or("No flow document given")?;
    let config = engine_config(&options)?;

    let resolver = Arc::new(ActivityResolver::default());
    info!("Loading flow: {}", flow_path.display());
    let flow = load_document(&flow_path, &resolver, config.activity_resolution)
        .await
        .map_err(|e| {
            error!("Failed to load flow: {}", e);
            e
        })?;

    let executions: Arc<dyn ExecutionRepository> = match &config.state_dir {
        Some(dir) => {
            info!("State directory: {}", dir.display());
            Arc::new(FileExecutionRepository::new(dir))
        }
        None => Arc::new(InMemoryExecutionRepository::new()),
    };

    let operator = FlowOperator::new(
        Arc::new(InMemoryFlowRepository::new()),
        executions,
        resolver,
        &config,
    );
    let flow = operator.register(flow).await?;
    let scope = options.scope.as_deref();

    let mut all_completed = true;
    for action in &options.fires {
        let result = operator.fire_scoped(flow.key(), scope, *action, None).await;
        print_result(*action, &result);
        all_completed &= result.is_completed();
    }

    let state = operator.state(flow.key(), scope).await?;
    let triggers = flow.step_for(state.code).map(|s| s.triggers()).unwrap_or_default();

    println!();
    println!("Flow:     {}", flow.key().bold());
    if let Some(scope) = scope {
        println!("Scope:    {}", scope);
    }
    println!("State:    {} ({})", state.name.cyan(), state.code);
    if triggers.is_empty() {
        println!("Triggers: none (finished)");
    } else {
        println!("Triggers: {:?}", triggers);
    }

    Ok(all_completed)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
