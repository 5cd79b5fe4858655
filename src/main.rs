use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use client_manager::config::{self, Config};
use client_manager::service::UserRequest;
use client_manager::{build_router, db, AppState, CrmService, CrmStore, MemoryStore};

#[derive(Debug, Parser)]
#[command(name = "client_manager", version, about = "CRM backend for clients and their interactions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Address to bind, overrides BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
        /// Keep everything in memory instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },
    /// Apply pending database migrations
    Migrate,
    /// Create a user and print its bearer token
    CreateUser {
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Delete a user; records referencing it are kept with the reference cleared
    DeleteUser { username: String },
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::init()?;
    init_tracing(&config);

    match cli.command {
        Command::Serve { bind, in_memory } => serve(&config, bind, in_memory).await,
        Command::Migrate => {
            db::init(&config).await?;
            info!("migrations applied");
            Ok(())
        }
        Command::CreateUser {
            username,
            email,
            first_name,
            last_name,
        } => {
            let service = postgres_service(&config).await?;
            let (user, token) = service
                .create_user(UserRequest {
                    username,
                    email,
                    first_name,
                    last_name,
                })
                .await
                .context("could not create user")?;
            println!("created user {} (id {})", user.username, user.id);
            println!("token: {token}");
            Ok(())
        }
        Command::DeleteUser { username } => {
            let service = postgres_service(&config).await?;
            service
                .delete_user(&username)
                .await
                .with_context(|| format!("could not delete user {username}"))?;
            println!("deleted user {username}");
            Ok(())
        }
    }
}

async fn postgres_service(config: &Config) -> Result<CrmService> {
    let database = db::init(config).await?;
    Ok(CrmService::new(Arc::new(database)))
}

async fn serve(config: &Config, bind: Option<String>, in_memory: bool) -> Result<()> {
    let store: Arc<dyn CrmStore> = if in_memory {
        warn!("serving from memory; data is lost on exit");
        Arc::new(MemoryStore::default())
    } else {
        Arc::new(db::init(config).await?)
    };
    let state = AppState::new(store);

    if in_memory {
        // Nobody can provision users against a memory store from outside
        let (user, token) = state
            .service
            .create_user(UserRequest {
                username: "admin".to_string(),
                ..Default::default()
            })
            .await
            .context("could not seed development user")?;
        info!(username = %user.username, %token, "seeded development user");
    }

    let bind_addr = bind.unwrap_or_else(|| config.bind_addr.clone());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("bind failed on {bind_addr}"))?;
    info!("client_manager listening on {bind_addr}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("ctrl-c handler failed: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => warn!("SIGTERM handler failed: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
