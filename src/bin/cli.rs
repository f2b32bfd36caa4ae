//! Roster CLI
//!
//! Command-line interface for Roster operations:
//! - List, add, update and remove users
//! - Check status
//! - Generate a config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roster-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage users on a Roster server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

/// User fields shared by `add` and `update`
#[derive(clap::Args)]
pub struct UserFields {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    nickname: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[arg(long)]
    country: Option<String>,
}

impl UserFields {
    fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        for (key, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("nickname", &self.nickname),
            ("email", &self.email),
            ("password", &self.password),
            ("country", &self.country),
        ] {
            if let Some(value) = value {
                body.insert(key.to_string(), serde_json::Value::String(value.clone()));
            }
        }
        serde_json::Value::Object(body)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List users
    List {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        nickname: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Maximum results (server caps at 1000)
        #[arg(short, long, default_value = "10")]
        limit: i64,
        /// Results to skip
        #[arg(short, long, default_value = "0")]
        offset: i64,
    },

    /// Show one user
    Get {
        /// User ID
        id: String,
    },

    /// Create a user (email and password are required)
    Add {
        #[command(flatten)]
        fields: UserFields,
    },

    /// Change fields of a user
    Update {
        /// User ID
        id: String,
        #[command(flatten)]
        fields: UserFields,
    },

    /// Delete a user
    Remove {
        /// User ID
        id: String,
    },

    /// Show server status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::List {
            first_name,
            last_name,
            nickname,
            country,
            email,
            limit,
            offset,
        } => {
            let mut query: Vec<(&str, String)> =
                vec![("limit", limit.to_string()), ("offset", offset.to_string())];
            for (key, value) in [
                ("first_name", first_name),
                ("last_name", last_name),
                ("nickname", nickname),
                ("country", country),
                ("email", email),
            ] {
                if let Some(value) = value {
                    query.push((key, value));
                }
            }

            let response = client
                .get(format!("{}/api/users", cli.api_url))
                .query(&query)
                .send()
                .await?;
            let users: Vec<serde_json::Value> = expect_success(response, "List").await?.json().await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else if users.is_empty() {
                println!("No users found.");
            } else {
                print_user_table(&users);
            }
        }

        Commands::Get { id } => {
            let response = client
                .get(format!("{}/api/user/{}", cli.api_url, id))
                .send()
                .await?;
            let user: serde_json::Value = expect_success(response, "Get").await?.json().await?;
            print_user(&user, &cli.format)?;
        }

        Commands::Add { fields } => {
            if fields.email.is_none() || fields.password.is_none() {
                eprintln!("Both --email and --password are required");
                std::process::exit(1);
            }

            let response = client
                .post(format!("{}/api/user", cli.api_url))
                .json(&fields.to_json())
                .send()
                .await?;
            let user: serde_json::Value = expect_success(response, "Add").await?.json().await?;

            println!("Created user {}", user["id"].as_str().unwrap_or("-"));
        }

        Commands::Update { id, fields } => {
            let response = client
                .put(format!("{}/api/user/{}", cli.api_url, id))
                .json(&fields.to_json())
                .send()
                .await?;
            let user: serde_json::Value = expect_success(response, "Update").await?.json().await?;
            print_user(&user, &cli.format)?;
        }

        Commands::Remove { id } => {
            let response = client
                .delete(format!("{}/api/user/{}", cli.api_url, id))
                .send()
                .await?;
            expect_success(response, "Remove").await?;
            println!("Removed user {}", id);
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/api/health", cli.api_url))
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let health: serde_json::Value = resp.json().await?;

                    println!("Roster v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    println!(
                        "API Status: {} ({})",
                        health["status"].as_str().unwrap_or("unknown"),
                        status
                    );
                    println!(
                        "Database:   {}",
                        health["database"].as_str().unwrap_or("unknown")
                    );

                    println!();
                    println!("Notifier:");
                    println!(
                        "  Watchers:           {}",
                        health["subscribers"].as_u64().unwrap_or(0)
                    );
                    println!(
                        "  Events broadcast:   {}",
                        health["events_broadcast"].as_u64().unwrap_or(0)
                    );
                    println!(
                        "  Deliveries dropped: {}",
                        health["deliveries_dropped"].as_u64().unwrap_or(0)
                    );

                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!();
                        println!("Uptime: {}", format_duration(uptime));
                    }

                    if !status.is_success() {
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("Cannot connect to Roster API at {}", cli.api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the Roster server is running:");
                    eprintln!("  cargo run --bin roster");
                    std::process::exit(1);
                }
            }
        }

        Commands::Config { output } => {
            let config = roster::config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Exit with the server's error message on a non-2xx response
async fn expect_success(
    response: reqwest::Response,
    action: &str,
) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| body["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);

    eprintln!("{} failed ({}): {}", action, status, message);
    std::process::exit(1);
}

fn print_user(user: &serde_json::Value, format: &str) -> Result<(), serde_json::Error> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(user)?);
        return Ok(());
    }

    for key in [
        "id",
        "first_name",
        "last_name",
        "nickname",
        "email",
        "country",
        "created_at",
        "updated_at",
    ] {
        println!("{:<12} {}", key, user[key].as_str().unwrap_or("-"));
    }
    Ok(())
}

fn print_user_table(users: &[serde_json::Value]) {
    println!(
        "{:<36} {:<16} {:<28} {:<8}",
        "ID", "Nickname", "Email", "Country"
    );
    println!("{}", "-".repeat(91));

    for user in users {
        println!(
            "{:<36} {:<16} {:<28} {:<8}",
            user["id"].as_str().unwrap_or("-"),
            user["nickname"].as_str().unwrap_or("-"),
            user["email"].as_str().unwrap_or("-"),
            user["country"].as_str().unwrap_or("-"),
        );
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
