//! Replay recorded NDJSON hour files into `POST /ingest`.
//!
//! Files are read in name order (the hour key sorts chronologically) and
//! each line is posted as-is.  Pacing follows the recorded timestamps,
//! scaled by `--speed`; lines without usable timestamps fall back to the
//! fixed `--interval`.  Blank and non-JSON lines are skipped.

use chrono::DateTime;
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "zmeta-replay")]
#[command(about = "Replay recorded NDJSON events into a running ingest endpoint")]
struct Args {
    /// Directory containing .ndjson record files
    #[arg(long, default_value = "data/records")]
    records: PathBuf,

    /// Service base URL
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    host: String,

    /// Ingest path
    #[arg(long, default_value = "/ingest")]
    endpoint: String,

    /// Playback speed multiplier (2.0 = twice as fast)
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Delay between lines when timestamps are unusable, seconds
    #[arg(long, default_value_t = 1.0)]
    interval: f64,

    /// Stop after this many lines (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    limit: usize,

    /// Replay forever, restarting at the first file
    #[arg(long)]
    r#loop: bool,

    /// Shared secret sent via the x-zmeta-secret header
    #[arg(long, default_value = "")]
    secret: String,
}

fn record_files(dir: &std::path::Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "ndjson"))
        .collect();
    files.sort();
    Ok(files)
}

fn parse_ts(line: &Value) -> Option<f64> {
    let raw = line.get("timestamp")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.timestamp_millis() as f64 / 1000.0)
}

fn read_lines(files: &[PathBuf]) -> Vec<Value> {
    let mut lines = Vec::new();
    for path in files {
        let Ok(content) = std::fs::read_to_string(path) else {
            eprintln!("skipping unreadable file: {}", path.display());
            continue;
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(value) => lines.push(value),
                Err(_) => continue,
            }
        }
    }
    lines
}

async fn run_once(args: &Args, client: &reqwest::Client, lines: &[Value]) -> Result<usize, reqwest::Error> {
    let url = format!("{}{}", args.host.trim_end_matches('/'), args.endpoint);
    let mut sent = 0usize;
    let mut last_ts: Option<f64> = None;
    for line in lines {
        if args.limit > 0 && sent >= args.limit {
            break;
        }
        let mut delay = args.interval;
        let ts = parse_ts(line);
        if let (Some(ts), Some(last)) = (ts, last_ts) {
            if ts >= last {
                delay = (ts - last) / args.speed.max(0.0001);
            }
        }
        if let Some(ts) = ts {
            last_ts = Some(ts);
        }
        if delay > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }
        let mut request = client.post(&url).json(line);
        if !args.secret.is_empty() {
            request = request.header("x-zmeta-secret", args.secret.clone());
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            eprintln!("line rejected with HTTP {}", response.status());
        }
        sent += 1;
    }
    Ok(sent)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let files = match record_files(&args.records) {
        Ok(files) if !files.is_empty() => files,
        Ok(_) => {
            eprintln!("no .ndjson files under {}", args.records.display());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("cannot read {}: {e}", args.records.display());
            std::process::exit(1);
        }
    };
    let lines = read_lines(&files);
    if lines.is_empty() {
        eprintln!("no replayable lines found");
        std::process::exit(1);
    }

    let client = reqwest::Client::new();
    loop {
        match run_once(&args, &client, &lines).await {
            Ok(sent) => println!("replayed {sent} events"),
            Err(e) => {
                eprintln!("replay failed: {e}");
                std::process::exit(2);
            }
        }
        if !args.r#loop {
            break;
        }
    }
}
