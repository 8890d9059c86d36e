//! tracedesk-cli: command-line client for the Tracedesk HTTP API
//!
//! # Subcommands
//! - `chat <message> [--json]`                : send a support message
//! - `traces [--category <c>] [--json]`       : list stored traces, newest first
//! - `analytics [--json]`                     : category breakdown and latency
//! - `status`                                 : show server health

use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";
const PREVIEW_CHARS: usize = 60;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "tracedesk-cli",
    version,
    about = "Tracedesk support-chat logging: command-line client"
)]
struct Cli {
    /// Tracedesk HTTP server URL (overrides TRACEDESK_HTTP_URL env var)
    #[arg(long, env = "TRACEDESK_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send a message and print the classified reply
    Chat {
        /// The customer's message
        message: String,

        /// Print the stored trace as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored traces
    Traces {
        /// Only show traces in this category (e.g. "Billing")
        #[arg(short, long)]
        category: Option<String>,

        /// Print traces as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Show per-category counts and average response time
    Analytics {
        /// Print the raw analytics JSON
        #[arg(long)]
        json: bool,
    },

    /// Show Tracedesk server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TraceView {
    pub id: String,
    pub user_message: String,
    pub bot_response: String,
    pub category: String,
    pub timestamp: String,
    pub response_time_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryStatsView {
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsView {
    pub total_traces: i64,
    pub category_breakdown: BTreeMap<String, CategoryStatsView>,
    pub average_response_time_ms: f64,
}

// ============================================================================
// Formatting
// ============================================================================

/// First line of `text`, cut to `max` characters with a trailing ellipsis.
pub fn preview(text: &str, max: usize) -> String {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() <= max {
        return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

/// One line per trace: timestamp, category, latency, message preview.
pub fn format_trace_line(trace: &TraceView) -> String {
    let timestamp: String = trace.timestamp.chars().take(19).collect();
    format!(
        "{}  {:<16} {:>6}ms  {}",
        timestamp,
        trace.category,
        trace.response_time_ms,
        preview(&trace.user_message, PREVIEW_CHARS)
    )
}

/// Human-readable analytics table, largest category first.
pub fn format_analytics(report: &AnalyticsView) -> String {
    let mut rows: Vec<(&String, &CategoryStatsView)> = report.category_breakdown.iter().collect();
    rows.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));

    let mut out = format!(
        "Total traces:          {}\nAverage response time: {:.2}ms\n\n",
        report.total_traces, report.average_response_time_ms
    );
    for (category, stats) in rows {
        out.push_str(&format!(
            "{:<16} {:>6}  {:>6.2}%\n",
            category, stats.count, stats.percentage
        ));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Bail out with the server's status and body on a non-2xx response.
fn ensure_success(
    resp: reqwest::blocking::Response,
    url: &str,
) -> anyhow::Result<reqwest::blocking::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    anyhow::bail!("{} returned {}: {}", url, status, body)
}

fn do_chat(server: &str, message: &str, json_output: bool) -> anyhow::Result<()> {
    // Generation retries can take a while; give the server room.
    let client = http_client(120)?;
    let url = format!("{}/chat/", server);

    let resp = client
        .post(&url)
        .json(&serde_json::json!({ "user_message": message }))
        .send()
        .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;
    let trace: TraceView = ensure_success(resp, &url)?.json()?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&trace)?);
    } else {
        println!("[{}] {}ms", trace.category, trace.response_time_ms);
        println!();
        println!("{}", trace.bot_response);
    }

    Ok(())
}

fn do_traces(server: &str, category: Option<&str>, json_output: bool) -> anyhow::Result<()> {
    let client = http_client(30)?;
    let base = format!("{}/traces/", server);
    let url = match category {
        Some(category) => reqwest::Url::parse_with_params(&base, &[("category", category)])?,
        None => reqwest::Url::parse(&base)?,
    };
    let url = url.to_string();

    let resp = client
        .get(&url)
        .send()
        .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;
    let traces: Vec<TraceView> = ensure_success(resp, &url)?.json()?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&traces)?);
    } else if traces.is_empty() {
        eprintln!("No traces found");
    } else {
        for trace in &traces {
            println!("{}", format_trace_line(trace));
        }
    }

    Ok(())
}

fn do_analytics(server: &str, json_output: bool) -> anyhow::Result<()> {
    let client = http_client(30)?;
    let url = format!("{}/analytics/", server);

    let resp = client
        .get(&url)
        .send()
        .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;
    let body: serde_json::Value = ensure_success(resp, &url)?.json()?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let report: AnalyticsView = serde_json::from_value(body)?;
        print!("{}", format_analytics(&report));
    }

    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = http_client(10)?;
    let url = format!("{}/health", server);

    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Tracedesk server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:          {}", body["version"].as_str().unwrap_or("?"));
            println!("Storage:          {}", body["storage"].as_str().unwrap_or("?"));
            if let Some(pg) = body["postgresql"].as_str() {
                println!("PostgreSQL:       {}", pg);
            }
            Ok(())
        }
        Ok(r) => anyhow::bail!("server unhealthy (HTTP {})", r.status()),
        Err(e) => anyhow::bail!("cannot reach {}: {}", url, e),
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Chat { message, json } => do_chat(&server, &message, json),
        Commands::Traces { category, json } => do_traces(&server, category.as_deref(), json),
        Commands::Analytics { json } => do_analytics(&server, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("tracedesk-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
