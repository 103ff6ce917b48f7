#![forbid(unsafe_code)]

use std::env;
use std::fs;

use metro_tools::classify_cli::{
    execute_classify_command, execute_search_command, SummaryOptions,
};
use tracing::Level;
use tracing_subscriber::EnvFilter;

const USAGE: &str = concat!(
    "usage: metro classify <rows.json> [--config <engine.json>] [--day-summary] ",
    "[--month-summary]\n",
    "       metro search <rows.json> <serial-fragment> [--config <engine.json>]",
);

fn main() {
    // stdout carries the JSON document; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let subcommand = args.first().ok_or_else(|| USAGE.to_string())?.as_str();

    let mut positional = Vec::new();
    let mut config_path = None;
    let mut summaries = SummaryOptions::default();
    let mut rest = args[1..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--config" => {
                let path = rest
                    .next()
                    .ok_or_else(|| "--config requires a path".to_string())?;
                config_path = Some(path.as_str());
            }
            "--day-summary" => summaries.daily = true,
            "--month-summary" => summaries.monthly = true,
            flag if flag.starts_with("--") => {
                return Err(format!("unknown flag: {flag}\n{USAGE}"));
            }
            value => positional.push(value),
        }
    }

    let rows_path = positional.first().ok_or_else(|| USAGE.to_string())?;
    let rows_json = read_file(rows_path)?;
    let config_json = config_path.map(read_file).transpose()?;

    let output = match subcommand {
        "classify" => execute_classify_command(&rows_json, config_json.as_deref(), summaries)?,
        "search" => {
            let fragment = positional
                .get(1)
                .ok_or_else(|| "usage: metro search <rows.json> <serial-fragment>".to_string())?;
            execute_search_command(&rows_json, config_json.as_deref(), fragment)?
        }
        _ => {
            return Err(format!(
                "unknown subcommand: {subcommand}. expected one of: classify, search"
            ))
        }
    };
    println!("{output}");
    Ok(())
}

fn read_file(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))
}
