use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use homehub_auth::{
    ApiState, AuthConfig, DatabaseConfig, UserRole, create_auth, create_connection, create_router,
    ensure_schema,
};

#[derive(Parser)]
#[command(name = "homehub-auth")]
#[command(about = "Authentication service for the HomeHub console")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the auth HTTP server
    Server {
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        #[arg(long, default_value = "memory", env = "SURREALDB_URL")]
        db_url: String,
        /// How often to sweep expired sessions, in seconds
        #[arg(long, default_value = "3600")]
        sweep_interval: u64,
        /// Mark auth cookies Secure (requires TLS in front)
        #[arg(long, env = "COOKIE_SECURE")]
        secure_cookies: bool,
    },
    /// Initialize the database schema
    Init {
        #[arg(long, default_value = "memory", env = "SURREALDB_URL")]
        db_url: String,
    },
    /// Create a user account (administrative action)
    CreateUser {
        username: String,
        /// Password for the new account
        #[arg(long, env = "HOMEHUB_PASSWORD")]
        password: String,
        #[arg(long, value_parser = parse_role, default_value = "user")]
        role: UserRole,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long, default_value = "memory", env = "SURREALDB_URL")]
        db_url: String,
    },
    /// Retire sessions past their expiry, once
    SweepSessions {
        #[arg(long, default_value = "memory", env = "SURREALDB_URL")]
        db_url: String,
    },
}

fn parse_role(s: &str) -> Result<UserRole, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("homehub_auth=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            port,
            bind,
            db_url,
            sweep_interval,
            secure_cookies,
        } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url: {}", db_config.url);

            let mut auth_config = AuthConfig::default();
            auth_config.secure_cookies = secure_cookies || auth_config.secure_cookies;

            if auth_config.using_dev_secret() {
                warn!(
                    "JWT_SECRET is not set; running on the development fallback secret. \
                     Set JWT_SECRET before exposing this server."
                );
            }

            let auth = create_auth(db_config, &auth_config).await?;

            // Expired-session sweep runs off the request path; deactivation
            // is idempotent so racing logins/refreshes is harmless.
            {
                let sessions = auth.sessions().clone();
                tokio::spawn(async move {
                    let mut ticker =
                        tokio::time::interval(Duration::from_secs(sweep_interval.max(1)));
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        match sessions.sweep_expired().await {
                            Ok(0) => {}
                            Ok(count) => info!("swept {} expired sessions", count),
                            Err(e) => warn!("session sweep failed: {}", e),
                        }
                    }
                });
            }

            let app = create_router(ApiState {
                auth,
                config: auth_config,
            });

            let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind, port)).await?;
            info!("Auth server listening on http://{}:{}", bind, port);

            axum::serve(listener, app).await?;
        }
        Commands::Init { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Initializing database at {}", db_config.url);

            let db = create_connection(db_config).await?;
            ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::CreateUser {
            username,
            password,
            role,
            email,
            display_name,
            db_url,
        } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let auth = create_auth(db_config, &AuthConfig::default()).await?;

            let user = auth
                .credentials()
                .create(&username, &password, email, display_name, role)
                .await?;

            println!("User created:");
            println!("  id:       {}", user.id);
            println!("  username: {}", user.username);
            println!("  role:     {}", user.role.as_str());
        }
        Commands::SweepSessions { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let auth = create_auth(db_config, &AuthConfig::default()).await?;

            let count = auth.sessions().sweep_expired().await?;
            println!("Swept {} expired sessions", count);
        }
    }

    Ok(())
}
