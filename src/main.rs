use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use fieldserve::auth::Credentials;
use fieldserve::config::ServerConfig;
use fieldserve::import;
use fieldserve::mail::LogMailer;
use fieldserve::photos::PhotoStore;
use fieldserve::server::{AppState, create_router};
use fieldserve::store::{SqliteStore, Store};
use fieldserve::types::{Role, Service, Unit, User};

const DEFAULT_ADMIN_EMAIL: &str = "admin@fieldserve.local";

#[derive(Parser)]
#[command(name = "fieldserve")]
#[command(about = "A field-service tracking server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8000")]
        port: u16,

        /// Data directory for database and uploads
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Frontend base URL used to build password-reset links
        #[arg(long)]
        frontend_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the database, admin account and default catalog
    Init {
        /// Data directory for database and uploads
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Admin e-mail (falls back to ADMIN_EMAIL)
        #[arg(long)]
        email: Option<String>,

        /// Admin password (falls back to ADMIN_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },

    /// Destructively rebuild the location tree from a CSV file
    ImportLocations {
        /// Data directory for database and uploads
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Path to the import file (columns: cidade,bairro,rua,lat,lng,observacoes)
        #[arg(long)]
        csv: PathBuf,
    },
}

fn open_store(data_dir: &str) -> anyhow::Result<SqliteStore> {
    let data_path: PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let store = SqliteStore::new(data_path.join("fieldserve.db"))?;
    store.initialize()?;
    Ok(store)
}

fn run_init(data_dir: String, email: Option<String>, password: Option<String>) -> anyhow::Result<()> {
    let store = open_store(&data_dir)?;

    let email = email
        .or_else(|| std::env::var("ADMIN_EMAIL").ok())
        .unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string());
    let password = password
        .or_else(|| std::env::var("ADMIN_PASSWORD").ok())
        .unwrap_or_else(|| "admin123".to_string());

    if store.get_user_by_email(&email)?.is_none() {
        let now = Utc::now();
        let admin = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            name: "Administrator".to_string(),
            password_hash: Credentials::new().hash(&password)?,
            role: Role::Admin,
            assignments: "[]".to_string(),
            version: 0,
            reset_token: None,
            reset_token_expires: None,
            created_at: now,
            updated_at: now,
        };
        store.create_user(&admin)?;
        println!("Created admin account: {email}");
    } else {
        println!("Admin account already exists: {email}");
    }

    seed_catalog(&store)?;

    println!("Initialization complete.");
    Ok(())
}

/// Ensures the default measurement units and services exist. Idempotent by
/// name so re-running init never duplicates catalog rows.
fn seed_catalog(store: &SqliteStore) -> anyhow::Result<()> {
    let mut units = store.list_units()?;

    let default_units = [("Metros Quadrados", "m²"), ("Metros Lineares", "m linear")];
    for (name, symbol) in default_units {
        if !units.iter().any(|u| u.name == name) {
            let unit = Unit {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                symbol: symbol.to_string(),
            };
            store.create_unit(&unit)?;
            units.push(unit);
        }
    }

    let unit_id = |symbol: &str| -> Option<String> {
        units.iter().find(|u| u.symbol == symbol).map(|u| u.id.clone())
    };

    let services = store.list_services()?;
    let default_services = [
        ("Varrição Manual", "m linear"),
        ("Roçada", "m²"),
        ("Limpeza de Vidro", "m²"),
    ];
    for (name, symbol) in default_services {
        if services.iter().any(|s| s.name == name) {
            continue;
        }
        let Some(unit) = unit_id(symbol) else {
            bail!("default unit '{symbol}' missing");
        };
        store.create_service(&Service {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            unit_id: unit,
        })?;
    }

    println!("Default units and services ensured.");
    Ok(())
}

fn run_import(data_dir: String, csv: PathBuf) -> anyhow::Result<()> {
    let store = open_store(&data_dir)?;

    let summary = import::run(&store, &csv)?;
    println!(
        "Imported {} group(s) and {} member(s); {} row(s) skipped.",
        summary.groups_created,
        summary.members_created,
        summary.skipped.len()
    );
    for (city, group, member) in &summary.skipped {
        println!("  skipped: '{member}' (group '{group}' not found in '{city}')");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fieldserve=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                email,
                password,
            } => {
                run_init(data_dir, email, password)?;
            }
            AdminCommands::ImportLocations { data_dir, csv } => {
                run_import(data_dir, csv)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            frontend_url,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                frontend_url,
            };

            fs::create_dir_all(&config.data_dir)?;
            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;

            if store.list_users()?.is_empty() {
                bail!(
                    "No accounts exist. Run 'fieldserve admin init' first to create the admin account."
                );
            }

            let state = Arc::new(AppState {
                store: Arc::new(store),
                photos: PhotoStore::new(&config.data_dir),
                mailer: Arc::new(LogMailer),
                frontend_url: config.frontend_url.clone(),
            });

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
