//! Status command implementation
//!
//! Fetches `/health` from a running collector and renders it as a table.

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use event_collector::config::Config;
use serde_json::Value;
use std::time::Duration;

/// Execute the status command
pub async fn execute(cfg: &Config, url: Option<String>, json: bool) -> Result<()> {
    let base = url.unwrap_or_else(|| default_base_url(cfg));
    let health_url = format!("{}/health", base.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let report: Value = client
        .get(&health_url)
        .send()
        .await
        .with_context(|| format!("Failed to reach collector at {}", health_url))?
        .error_for_status()?
        .json()
        .await
        .context("Health response was not JSON")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    render(&base, &report);
    Ok(())
}

/// Wildcard bind addresses are not connectable; use loopback instead
fn default_base_url(cfg: &Config) -> String {
    let host = match cfg.host.as_str() {
        "0.0.0.0" | "::" | "" => "127.0.0.1",
        other => other,
    };
    format!("http://{}:{}", host, cfg.port)
}

fn render(base: &str, report: &Value) {
    let state = report
        .pointer("/lifecycle/state")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let state_colored = match state {
        "running" => state.green(),
        "stopping" => state.yellow(),
        _ => state.red(),
    };
    println!("Collector at {} is {}", base, state_colored);
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("METRIC").fg(Color::Cyan),
        Cell::new("VALUE").fg(Color::Cyan),
    ]);

    let rows = [
        ("Queue length", "/queue/length"),
        ("Queue capacity", "/queue/maxSize"),
        ("Accepted", "/stats/accepted"),
        ("Dropped", "/stats/dropped"),
        ("Dropped at shutdown", "/stats/shutdownDropped"),
        ("Flushed", "/stats/flushed"),
        ("Flush failures", "/stats/flushFailures"),
        ("Retention failures", "/stats/retentionFailures"),
        ("Stored events", "/storage/totalEvents"),
        ("Last flush (ms)", "/lifecycle/lastSuccessfulFlushAtMs"),
        ("Last retention (ms)", "/lifecycle/lastSuccessfulRetentionAtMs"),
    ];
    for (label, pointer) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(display_value(report.pointer(pointer)))]);
    }
    println!("{}", table);

    for (label, pointer) in [
        ("Last flush error", "/failures/lastFlushError/message"),
        ("Last retention error", "/failures/lastRetentionError/message"),
    ] {
        if let Some(message) = report.pointer(pointer).and_then(Value::as_str) {
            println!("{}: {}", label.red(), message);
        }
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
