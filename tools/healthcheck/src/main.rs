//! Health probe for a running backend.
//!
//! Exit codes: 0 when `/healthz` answers with `status: ok`, 2 when the
//! request itself fails, 3 when the endpoint answers with anything else.

use clap::Parser;
use serde_json::Value;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "zmeta-healthcheck")]
#[command(about = "Probe a running ZMeta backend's health endpoint")]
struct Args {
    /// Service base URL
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    base_url: String,

    /// Per-request timeout, seconds
    #[arg(long, default_value_t = 3.0)]
    timeout: f64,

    /// Retry attempts before giving up
    #[arg(long, default_value_t = 1)]
    retries: u32,

    /// Delay between retries, seconds
    #[arg(long, default_value_t = 1.0)]
    delay: f64,

    /// Print the full health document on success
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    std::process::exit(run(&args).await);
}

async fn run(args: &Args) -> i32 {
    let url = format!("{}/healthz", args.base_url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs_f64(args.timeout))
        .build()
        .expect("client build");

    let mut last_error = String::new();
    for attempt in 1..=args.retries.max(1) {
        match probe(&client, &url).await {
            Ok(body) => {
                if body.get("status").and_then(Value::as_str) == Some("ok") {
                    if args.verbose {
                        println!("{body:#}");
                    } else {
                        println!("ok");
                    }
                    return 0;
                }
                eprintln!("unexpected health status: {body}");
                return 3;
            }
            Err(e) => {
                last_error = e;
                if attempt < args.retries {
                    tokio::time::sleep(Duration::from_secs_f64(args.delay)).await;
                }
            }
        }
    }
    eprintln!("health request failed: {last_error}");
    2
}

async fn probe(client: &reqwest::Client, url: &str) -> Result<Value, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    response.json().await.map_err(|e| e.to_string())
}
