//! instasync CLI: run syncs and inspect the Instantly API from the terminal.
//!
//! Usage:
//! ```bash
//! # Full sync into a SQLite file (requires the `sqlite` feature)
//! INSTANTLY_API_KEY=... INSTASYNC_DB=instasync.db instasync sync
//!
//! # Sync a single campaign with its metrics
//! instasync sync-campaign --id 0f3c...
//!
//! # Look at what the API really returns
//! instasync debug --endpoint /campaigns --param limit=2
//! ```

use std::collections::BTreeMap;
use std::env;
use std::process;
use std::sync::Arc;

use instasync_core::store::ListQuery;
use instasync_core::{Diagnostics, InstantlyApi, SyncConfig, SyncReport, SyncRunner};
use instasync_observability::{init_tracing, LogConfig};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    if let Err(e) = init_tracing(&LogConfig::with_level("warn").merge_env()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "sync" => cmd_sync(&args[2..]).await,
        "sync-campaign" => cmd_sync_campaign(&args[2..]).await,
        "campaigns" => cmd_campaigns(&args[2..]).await,
        "test" => cmd_test().await,
        "debug" => cmd_debug(&args[2..]).await,
        "stats" => cmd_stats().await,
        "version" | "--version" | "-V" => {
            println!("instasync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("instasync {}", env!("CARGO_PKG_VERSION"));
    println!("Sync Instantly campaigns and leads into a document store\n");
    println!("USAGE:");
    println!("    instasync <COMMAND>\n");
    println!("COMMANDS:");
    println!("    sync [campaigns|leads|all]  Run a sync (default: all)");
    println!("    sync-campaign               Sync one campaign and its metrics");
    println!("    campaigns                   List stored campaigns");
    println!("    test                        Test the upstream connection");
    println!("    debug                       Show a raw upstream response and its shape");
    println!("    stats                       Stored counts and the last run");
    println!("    version                     Print version");
    println!("    help                        Print this help\n");
    println!("FLAGS:");
    println!("    sync-campaign --id <ID>                   [required]");
    println!("    campaigns --status <LABEL> --limit <N> --page <N>");
    println!("    debug --endpoint <PATH> [--param k=v]...  [--endpoint required]\n");
    println!("ENVIRONMENT:");
    println!("    INSTANTLY_API_KEY   API key  [required]");
    println!("    INSTASYNC_DB        SQLite file (sqlite feature); in-memory otherwise");
    println!("    LOG_LEVEL           tracing level (default: warn)");
}

fn load_config() -> Result<SyncConfig, String> {
    SyncConfig::from_env().map_err(|e| e.to_string())
}

fn connect(config: &SyncConfig) -> Result<Arc<dyn InstantlyApi>, String> {
    let client = instasync_http::connect(config).map_err(|e| e.to_string())?;
    Ok(Arc::new(client))
}

async fn runner() -> Result<SyncRunner, String> {
    let config = load_config()?;
    let api = connect(&config)?;
    let store = instasync_storage::open_store(env::var("INSTASYNC_DB").ok().as_deref())
        .await
        .map_err(|e| e.to_string())?;
    Ok(SyncRunner::new(api, store, config))
}

async fn cmd_sync(args: &[String]) -> Result<(), String> {
    let runner = runner().await?;
    let target = args.first().map(String::as_str).unwrap_or("all");

    println!("Syncing {target}...");
    let report = match target {
        "campaigns" => runner.sync_campaigns().await,
        "leads" => runner.sync_leads().await,
        "all" | "full" => runner.sync_all().await,
        other => return Err(format!("unknown sync target '{other}'")),
    }
    .map_err(|e| e.to_string())?;

    print_report(&report);
    Ok(())
}

async fn cmd_sync_campaign(args: &[String]) -> Result<(), String> {
    let id = parse_flag(args, "--id").ok_or("--id is required")?;
    let runner = runner().await?;

    println!("Syncing campaign {id}...");
    let report = runner
        .sync_campaign_by_id(&id)
        .await
        .map_err(|e| e.to_string())?;
    print_report(&report);
    Ok(())
}

async fn cmd_campaigns(args: &[String]) -> Result<(), String> {
    let limit = parse_number(args, "--limit")?.unwrap_or(50);
    let page = parse_number(args, "--page")?.unwrap_or(1).max(1);
    let mut query = ListQuery::new().page(page, limit);
    if let Some(status) = parse_flag(args, "--status") {
        query = query.filter("status", status);
    }

    let runner = runner().await?;
    let campaigns = runner
        .list_campaigns(&query)
        .await
        .map_err(|e| e.to_string())?;

    if campaigns.is_empty() {
        println!("No campaigns stored.");
        return Ok(());
    }
    for c in &campaigns {
        println!(
            "  {:<38} {:<22} sent={:<6} opened={:<6} {}",
            c.id.as_deref().unwrap_or("-"),
            c.status,
            c.metrics.sent,
            c.metrics.opened,
            c.name
        );
    }
    println!("\n{} campaign(s), page {page}", campaigns.len());
    Ok(())
}

async fn cmd_test() -> Result<(), String> {
    let config = load_config()?;
    let api = connect(&config)?;
    let diagnostics = Diagnostics::new(api, &config.api.endpoints);

    println!("Testing {}...", config.api.base_url);
    let report = diagnostics
        .test_connection()
        .await
        .map_err(|e| e.to_string())?;

    println!("  Status:    {}", report.status);
    println!("  Message:   {}", report.message);
    println!(
        "  Campaigns: {} (HTTP {})",
        if report.campaigns_endpoint.success { "OK" } else { "FAILED" },
        report.campaigns_endpoint.status
    );
    if let Some(err) = &report.campaigns_endpoint.error {
        println!("  Error:     {err}");
    }
    Ok(())
}

async fn cmd_debug(args: &[String]) -> Result<(), String> {
    let endpoint = parse_flag(args, "--endpoint").ok_or("--endpoint is required")?;
    let mut params = BTreeMap::new();
    for raw in parse_all(args, "--param") {
        let (k, v) = raw
            .split_once('=')
            .ok_or_else(|| format!("--param expects key=value, got '{raw}'"))?;
        params.insert(k.to_string(), v.to_string());
    }

    let config = load_config()?;
    let diagnostics = Diagnostics::new(connect(&config)?, &config.api.endpoints);
    let report = diagnostics
        .debug(&endpoint, params)
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    Ok(())
}

async fn cmd_stats() -> Result<(), String> {
    let stats = runner()
        .await?
        .stats()
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("  Run:      {}", report.run_id);
    println!("  Kind:     {}", report.kind);
    println!("  Fetched:  {}", report.fetched);
    println!("  Written:  {} in {} batch(es)", report.written, report.batches);
    println!("  Skipped:  {}", report.skipped);
    for c in &report.collections {
        println!(
            "    {:<10} fetched={} written={} skipped={}",
            c.collection, c.fetched, c.written, c.skipped
        );
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_all(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .collect()
}

fn parse_number(args: &[String], flag: &str) -> Result<Option<usize>, String> {
    parse_flag(args, flag)
        .map(|v| v.parse().map_err(|_| format!("{flag} expects a number, got '{v}'")))
        .transpose()
}
