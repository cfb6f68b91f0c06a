use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stowage::auth::{MIN_PASSWORD_LEN, TokenIssuer, generate_secret};
use stowage::blob::FsBlobStore;
use stowage::config::ServerConfig;
use stowage::server::{AppState, create_router};
use stowage::service::{Authorizer, IdentityService, NewAccount};
use stowage::store::{SqliteStore, Store};
use stowage::types::AccountType;

const NOT_INITIALIZED: &str =
    "Server not initialized. Run 'stowage admin init' first to create the database \
     and admin account.";

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "stowage")]
#[command(about = "A versioned multi-user file store", long_about = None)]
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
        /// TOML config file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and blobs
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, signing secret and admin account)
    Init {
        /// Data directory for the database and blobs
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Login of the first admin account
        #[arg(long, default_value = "admin")]
        login: String,

        /// Mail address of the first admin account
        #[arg(long)]
        mail: String,

        /// Admin password. Prompted for when omitted.
        #[arg(long)]
        password: Option<String>,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

fn prompt_password() -> anyhow::Result<String> {
    let password = inquire::Password::new("Admin password:")
        .with_validator(|input: &str| {
            if input.chars().count() < MIN_PASSWORD_LEN {
                Err(format!("Password must be at least {MIN_PASSWORD_LEN} characters").into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;
    Ok(password)
}

fn run_init(
    data_dir: PathBuf,
    login: String,
    mail: String,
    password: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)?;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(config.db_path())?);
    store.initialize()?;

    if store.has_admin()? {
        bail!(
            "Server already initialized. An admin account exists in {}",
            config.db_path().display()
        );
    }

    let password = match password {
        Some(password) => password,
        None if non_interactive => bail!("--password is required with --non-interactive"),
        None => prompt_password()?,
    };

    let secret = generate_secret();
    let secret_file = config.jwt_secret_path();
    fs::write(&secret_file, &secret)
        .with_context(|| format!("failed to write {}", secret_file.display()))?;

    #[cfg(unix)]
    set_restrictive_permissions(&secret_file);

    let tokens = Arc::new(TokenIssuer::new(&secret, config.token_ttl_secs)?);
    let identity = IdentityService::new(store.clone(), Authorizer::new(store.clone()), tokens);
    let admin = identity.create_account(NewAccount {
        login,
        mail,
        password,
        display_name: String::new(),
        account_type: AccountType::Admin,
        role_id: None,
        group_id: None,
    })?;

    println!();
    println!("========================================");
    println!("Created admin account '{}' ({})", admin.login, admin.id);
    println!();
    println!("Signing secret written to: {}", secret_file.display());
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    if !config.db_path().exists() {
        bail!(NOT_INITIALIZED);
    }

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    if !store.has_admin()? {
        bail!(NOT_INITIALIZED);
    }

    let secret = config
        .resolve_jwt_secret()
        .context("failed to load the token signing secret")?;
    let blobs = Arc::new(FsBlobStore::new(&config.data_dir));
    let addr = config.socket_addr()?;

    let state = Arc::new(AppState::new(Arc::new(store), blobs, config, &secret)?);
    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("stowage=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                login,
                mail,
                password,
                non_interactive,
            } => {
                run_init(data_dir, login, mail, password, non_interactive)?;
            }
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => {
            let mut config = ServerConfig::load(config.as_deref())?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }

            run_serve(config).await?;
        }
    }

    Ok(())
}
