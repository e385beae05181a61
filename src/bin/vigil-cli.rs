use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "vigil-cli")]
#[command(about = "Management CLI for the vigil threat engine", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8088")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check engine status and emergency mode
    Status,
    /// List security incidents
    Incidents,
    /// Transition an incident's status
    Resolve {
        /// Incident id
        id: String,
        /// New status: open, investigating, resolved, ignored
        #[arg(default_value = "resolved")]
        status: String,
    },
    /// List active transient IP blocks
    Blocks,
    /// Lift all blocks for an IP
    Unblock { ip: String },
    /// Show the permanent blacklist
    Blacklist,
    /// Add an IP to the permanent blacklist
    Ban { ip: String, reason: String },
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

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Incidents => {
            let res = client
                .get(format!("{}/admin/incidents", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Resolve { id, status } => {
            let res = client
                .post(format!("{}/admin/incidents/{}/status", cli.url, id))
                .headers(headers)
                .json(&serde_json::json!({ "status": status }))
                .send()
                .await?;
            println!("{}", res.status());
        }
        Commands::Blocks => {
            let res = client
                .get(format!("{}/admin/blocks", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Unblock { ip } => {
            let res = client
                .delete(format!("{}/admin/blocks/{}", cli.url, ip))
                .headers(headers)
                .send()
                .await?;
            println!("{}", res.status());
        }
        Commands::Blacklist => {
            let res = client
                .get(format!("{}/admin/blacklist", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Ban { ip, reason } => {
            let res = client
                .post(format!("{}/admin/blacklist", cli.url))
                .headers(headers)
                .json(&serde_json::json!({ "ip": ip, "reason": reason }))
                .send()
                .await?;
            println!("{}", res.status());
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !res.status().is_success() {
        eprintln!("Request failed: {}", res.status());
        return Ok(());
    }
    let body: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
