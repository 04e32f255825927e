//! filtra CLI: driving adapter for the filtra resolution engine.
//!
//! Subcommands:
//! - `check <config>`: validate that an engine config builds
//! - `find <config> <invocation...> [--trace]`: list the filters that apply
//! - `resolve <config> <invocation...> [--return JSON]`: render the action result
//! - `info`: print registered type URLs
//!
//! Set `FILTRA_LOG` (e.g. `FILTRA_LOG=debug`) to see engine logs on stderr.

use std::collections::BTreeMap;
use std::process;
use std::sync::Arc;

use filtra::{ActionResult, Configuration, Engine, EngineConfig, PayloadKind, TypeRegistry};
use filtra_test::fixture::Invocation;
use filtra_test::Filter;
use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "check" => cmd_check(&args[2..]),
        "find" => cmd_find(&args[2..]),
        "resolve" => cmd_resolve(&args[2..]),
        "info" => cmd_info(),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("error: unknown command \"{other}\"");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("FILTRA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_check(args: &[String]) -> Result<(), String> {
    let [config_path] = args else {
        return Err("check requires a config file path".into());
    };

    let engine = build_engine(load_config(config_path)?)?;
    println!(
        "Config valid: {} filter(s), {} result factory(ies)",
        engine.filters().len(),
        engine.results().registry().len()
    );
    Ok(())
}

fn cmd_find(args: &[String]) -> Result<(), String> {
    let (config_path, rest) = args.split_first().ok_or("find requires a config file path")?;
    let parsed = parse_invocation(rest)?;
    let engine = build_engine(load_config(config_path)?)?;
    let selector = parsed.invocation.selector();

    if parsed.trace {
        for step in engine.filters().find_with_trace(&selector).steps {
            let mark = if step.matched { "+" } else { "-" };
            println!("{mark} {}", step.id);
        }
        return Ok(());
    }

    let filters = engine
        .find_filters(&selector)
        .map_err(|e| format!("find failed: {e}"))?;
    if filters.is_empty() {
        println!("(no filters)");
    }
    for filter in filters {
        println!("{}", filter.name());
    }
    Ok(())
}

fn cmd_resolve(args: &[String]) -> Result<(), String> {
    let (config_path, rest) = args.split_first().ok_or("resolve requires a config file path")?;
    let parsed = parse_invocation(rest)?;
    let engine = build_engine(load_config(config_path)?)?;

    let result = engine
        .render(&parsed.invocation.result_selector())
        .map_err(|e| format!("resolve failed: {e}"))?;
    println!("{}", describe(&result));
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Uniform return type for all commands
fn cmd_info() -> Result<(), String> {
    let registry = build_types();

    for (title, kind) in [
        ("Registered filters:", PayloadKind::Filter),
        ("Registered result factories:", PayloadKind::ResultFactory),
        ("Registered constraints:", PayloadKind::Constraint),
    ] {
        println!("{title}");
        for url in registry.type_urls(kind) {
            println!("  {url}");
        }
        println!();
    }

    Ok(())
}

fn describe(result: &ActionResult) -> String {
    match result {
        ActionResult::Json(value) => format!("json {value}"),
        ActionResult::View { name, model } => format!("view {name} {model}"),
        ActionResult::Content { content_type, body } => format!("content {content_type} {body}"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Engine assembly (composition root)
// ═══════════════════════════════════════════════════════════════════════════════

fn build_types() -> TypeRegistry<dyn Filter> {
    filtra_test::types()
}

fn build_engine(config: EngineConfig) -> Result<Engine<dyn Filter>, String> {
    Configuration::<dyn Filter>::from_config(config, Arc::new(build_types()))
        .and_then(Configuration::build)
        .map_err(|e| format!("config invalid: {e}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Config loading
// ═══════════════════════════════════════════════════════════════════════════════

fn load_config(path: &str) -> Result<EngineConfig, String> {
    tracing::debug!(path, "loading engine config");
    let content = std::fs::read_to_string(path).map_err(|e| format!("failed to read \"{path}\": {e}"))?;

    let is_json = std::path::Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content).map_err(|e| format!("JSON parse error: {e}"))
    } else {
        // Default to YAML (handles .yaml and .yml)
        serde_yaml::from_str(&content).map_err(|e| format!("YAML parse error: {e}"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Argument parsing
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct ParsedInvocation {
    invocation: Invocation,
    trace: bool,
}

fn parse_invocation(args: &[String]) -> Result<ParsedInvocation, String> {
    let mut controller = None;
    let mut action = None;
    let mut bases = Vec::new();
    let mut method = None;
    let mut headers = BTreeMap::new();
    let mut return_value = serde_json::Value::Null;
    let mut trace = false;

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = || iter.next().ok_or_else(|| format!("{flag} requires a value"));
        match flag.as_str() {
            "--controller" => controller = Some(value()?.clone()),
            "--action" => action = Some(value()?.clone()),
            "--base" => bases.push(value()?.clone()),
            "--method" => method = Some(value()?.clone()),
            "--header" => {
                let pair = value()?;
                let (name, v) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("invalid header \"{pair}\", expected name=value"))?;
                headers.insert(name.to_owned(), v.to_owned());
            }
            "--return" => {
                let raw = value()?;
                return_value =
                    serde_json::from_str(raw).map_err(|e| format!("invalid --return JSON \"{raw}\": {e}"))?;
            }
            "--trace" => trace = true,
            other => return Err(format!("unexpected argument \"{other}\"")),
        }
    }

    Ok(ParsedInvocation {
        invocation: Invocation {
            controller: controller.ok_or("--controller is required")?,
            bases,
            action: action.ok_or("--action is required")?,
            method,
            headers,
            return_value,
        },
        trace,
    })
}

fn print_usage() {
    eprintln!(
        "Usage: filtra <command> [options]

Commands:
  check <config>                     Validate config
  find <config> <invocation>         List filters that apply [--trace]
  resolve <config> <invocation>      Render the action result [--return JSON]
  info                               Print registered type URLs
  help                               Show this help

Invocation:
  --controller NAME --action NAME [--base NAME...] [--method VERB] [--header name=value...]"
    );
}
