use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use rand::Rng;

#[derive(Parser)]
#[command(name = "cart-loadgen")]
#[command(about = "Drive mixed traffic at a running cart service", long_about = None)]
struct Cli {
    /// Base URL of the service.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Total number of requests to send.
    #[arg(short = 'n', long, default_value_t = 200)]
    requests: usize,

    /// Requests in flight at once.
    #[arg(short, long, default_value_t = 8)]
    concurrency: usize,

    /// Share of requests sent to /error (0.0 - 1.0).
    #[arg(short, long, default_value_t = 0.1, value_parser = parse_ratio)]
    error_ratio: f64,
}

fn parse_ratio(raw: &str) -> Result<f64, String> {
    let ratio: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if ratio.is_finite() && (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("{raw} is not between 0.0 and 1.0"))
    }
}

/// Pick the next request path.
fn pick_path(error_ratio: f64) -> String {
    let mut rng = rand::thread_rng();
    if rng.gen_bool(error_ratio) {
        return "/error".to_string();
    }
    match rng.gen_range(0..3) {
        0 => "/ok".to_string(),
        1 => format!("/cart/add?count={}", rng.gen_range(1..=5)),
        _ => "/cart/items".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/').to_string();
    let next = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let workers: Vec<_> = (0..cli.concurrency.max(1))
        .map(|_| {
            let client = client.clone();
            let base = base.clone();
            let next = Arc::clone(&next);
            let total = cli.requests;
            let error_ratio = cli.error_ratio;
            tokio::spawn(async move {
                let mut statuses: BTreeMap<String, usize> = BTreeMap::new();
                while next.fetch_add(1, Ordering::Relaxed) < total {
                    let path = pick_path(error_ratio);
                    let key = match client.get(format!("{base}{path}")).send().await {
                        Ok(res) => res.status().as_u16().to_string(),
                        Err(_) => "transport error".to_string(),
                    };
                    *statuses.entry(key).or_default() += 1;
                }
                statuses
            })
        })
        .collect();

    let mut statuses: BTreeMap<String, usize> = BTreeMap::new();
    for worker in workers {
        for (status, count) in worker.await? {
            *statuses.entry(status).or_default() += count;
        }
    }

    println!(
        "Sent {} requests to {} in {:.2?}",
        cli.requests,
        base,
        start.elapsed()
    );
    for (status, count) in &statuses {
        println!("  {status:>16}: {count}");
    }

    let items = client
        .get(format!("{base}/cart/items"))
        .send()
        .await?
        .text()
        .await?;
    println!("Cart now holds {} items", items.trim());
    Ok(())
}
