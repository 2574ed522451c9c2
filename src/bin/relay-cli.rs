use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for the provider relay", long_about = None)]
struct Cli {
    /// Admin API base URL.
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Public API base URL, used by `execute`.
    #[arg(long, default_value = "http://localhost:8080")]
    api_url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check relay status and open breakers
    Status,
    /// Show per-provider health, or one provider's
    Health {
        provider: Option<String>,
    },
    /// Show the error telemetry report
    Errors {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Run an operation through the chain
    Execute {
        operation: String,
        /// JSON payload
        #[arg(short, long, default_value = "null")]
        payload: String,
        #[arg(short, long)]
        timeout_ms: Option<u64>,
        /// priority, round_robin, weighted_random or best_performance
        #[arg(short, long)]
        strategy: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Health { provider } => {
            let path = match provider {
                Some(name) => format!("{}/admin/health/{}", cli.url, name),
                None => format!("{}/admin/health", cli.url),
            };
            client.get(path).headers(headers).send().await?
        }
        Commands::Errors { limit } => {
            client
                .get(format!("{}/admin/errors", cli.url))
                .query(&[("limit", limit)])
                .headers(headers)
                .send()
                .await?
        }
        Commands::Execute {
            operation,
            payload,
            timeout_ms,
            strategy,
        } => {
            let payload: Value = serde_json::from_str(&payload)?;
            client
                .post(format!("{}/v1/execute", cli.api_url))
                .json(&json!({
                    "operation": operation,
                    "payload": payload,
                    "timeout_ms": timeout_ms,
                    "strategy": strategy,
                }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }

    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        std::process::exit(1);
    }
    Ok(())
}
