use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use overlay_gateway::hotfix;

#[derive(Parser)]
#[command(name = "overlay-cli")]
#[command(about = "Management CLI for the overlay gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "OVERLAY_ADMIN_URL", default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "OVERLAY_ADMIN_KEY", default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// Manage hotfix records
    Hotfix {
        #[command(subcommand)]
        command: HotfixCommands,
    },
    /// Invalidate or clear cached merges
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Manage canned gate responses
    Gate {
        #[command(subcommand)]
        command: GateCommands,
    },
}

#[derive(Subcommand)]
enum HotfixCommands {
    /// List records, optionally for one file
    List {
        #[arg(short, long)]
        file: Option<String>,
    },
    /// List files that carry records
    Files,
    /// Upload a local override file
    Import {
        path: PathBuf,
        /// File id to store the records under; defaults to the file name
        #[arg(long)]
        file: Option<String>,
        /// Only replace records previously imported under this file id
        #[arg(long)]
        unique_file: Option<String>,
    },
    /// Print the rendered override file
    Export {
        file: String,
        #[arg(long)]
        include_disabled: bool,
        #[arg(long)]
        timestamp: bool,
    },
    /// Remove one record
    Remove {
        file: String,
        section: String,
        key: String,
    },
    /// Merge two local files; keys in the first win (runs offline)
    Combine {
        primary: PathBuf,
        secondary: PathBuf,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Invalidate entries tagged with the given tables (default: hotfixes)
    Invalidate { tables: Vec<String> },
    /// Drop every cached entry
    Clear,
}

#[derive(Subcommand)]
enum GateCommands {
    /// Serve a local file for a path
    Set {
        path: String,
        body: PathBuf,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },
    /// Remove a gate entry
    Remove {
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
    },
    /// List gate entries
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/').to_string();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{base}/admin/status"))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Hotfix { command } => match command {
            HotfixCommands::List { file } => {
                let mut req = client.get(format!("{base}/admin/hotfixes")).headers(headers);
                if let Some(file) = file {
                    req = req.query(&[("file", file)]);
                }
                print_response(req.send().await?).await?;
            }
            HotfixCommands::Files => {
                let res = client
                    .get(format!("{base}/admin/hotfixes/files"))
                    .headers(headers)
                    .send()
                    .await?;
                print_response(res).await?;
            }
            HotfixCommands::Import {
                path,
                file,
                unique_file,
            } => {
                let content = tokio::fs::read_to_string(&path).await?;
                let file = file.unwrap_or_else(|| file_name(&path));
                let mut req = client
                    .post(format!(
                        "{base}/admin/hotfixes/import/{}",
                        urlencoding::encode(&file)
                    ))
                    .headers(headers)
                    .header(CONTENT_TYPE, "text/plain")
                    .body(content);
                if let Some(unique) = unique_file {
                    req = req.query(&[("unique_file", unique)]);
                }
                print_response(req.send().await?).await?;
            }
            HotfixCommands::Export {
                file,
                include_disabled,
                timestamp,
            } => {
                let res = client
                    .get(format!(
                        "{base}/admin/hotfixes/files/{}",
                        urlencoding::encode(&file)
                    ))
                    .headers(headers)
                    .query(&[
                        ("include_disabled", include_disabled),
                        ("timestamp", timestamp),
                    ])
                    .send()
                    .await?;
                print_text(res).await?;
            }
            HotfixCommands::Remove { file, section, key } => {
                let res = client
                    .delete(format!("{base}/admin/hotfixes"))
                    .headers(headers)
                    .query(&[("file", file), ("section", section), ("key", key)])
                    .send()
                    .await?;
                print_response(res).await?;
            }
            HotfixCommands::Combine { primary, secondary } => {
                let combined = hotfix::combine(
                    &tokio::fs::read_to_string(&primary).await?,
                    &tokio::fs::read_to_string(&secondary).await?,
                    &file_name(&primary),
                    Some(&file_name(&secondary)),
                );
                print!("{combined}");
            }
        },
        Commands::Cache { command } => match command {
            CacheCommands::Invalidate { tables } => {
                let res = client
                    .post(format!("{base}/admin/cache/invalidate"))
                    .headers(headers)
                    .json(&json!({ "tables": tables }))
                    .send()
                    .await?;
                print_response(res).await?;
            }
            CacheCommands::Clear => {
                let res = client
                    .post(format!("{base}/admin/cache/clear"))
                    .headers(headers)
                    .send()
                    .await?;
                print_response(res).await?;
            }
        },
        Commands::Gate { command } => match command {
            GateCommands::Set {
                path,
                body,
                method,
                content_type,
            } => {
                let res = client
                    .put(gate_url(&base, &path))
                    .headers(headers)
                    .query(&[("method", method)])
                    .header(CONTENT_TYPE, content_type)
                    .body(tokio::fs::read(&body).await?)
                    .send()
                    .await?;
                print_response(res).await?;
            }
            GateCommands::Remove { path, method } => {
                let res = client
                    .delete(gate_url(&base, &path))
                    .headers(headers)
                    .query(&[("method", method)])
                    .send()
                    .await?;
                print_response(res).await?;
            }
            GateCommands::List => {
                let res = client
                    .get(format!("{base}/admin/overrides"))
                    .headers(headers)
                    .send()
                    .await?;
                print_response(res).await?;
            }
        },
    }

    Ok(())
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn gate_url(base: &str, path: &str) -> String {
    format!("{base}/admin/overrides/{}", path.trim_start_matches('/'))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }
    print!("{text}");
    Ok(())
}
