use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use shopkeep::{AdminSetup, JwtConfig, Shopkeep, ShopkeepBuilder, SqliteRepositoryProvider};
use shopkeep_axum::Environment;
use tokio::{net::TcpListener, signal, sync::watch};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Command line interface for the shopkeep login service
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://shopkeep.db?mode=rwc",
        global = true
    )]
    database_url: String,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Run database migrations
    Migrate,
    /// Create an admin account if none exists for the email
    SetupAdmin(SetupAdminArgs),
    /// Print version information
    Version,
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// `development` or `production`
    #[arg(long, env = "APP_ENV", default_value_t = Environment::Development)]
    environment: Environment,

    /// Skip creating admin@example.com when no admin account exists
    #[arg(long)]
    no_default_admin: bool,
}

#[derive(clap::Args)]
struct SetupAdminArgs {
    #[arg(long, env = "ADMIN_EMAIL")]
    email: String,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long, default_value = "Admin")]
    first_name: String,

    #[arg(long, default_value = "User")]
    last_name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopkeep=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => serve(&cli.database_url, args).await,
        Commands::Migrate => {
            // Sessions are never issued here; any key satisfies the builder.
            connect(&cli.database_url, JwtConfig::new_random_hs256()).await?;
            tracing::info!("Migrations applied");
            Ok(())
        }
        Commands::SetupAdmin(args) => {
            match setup_admin(&cli.database_url, &args).await? {
                AdminSetup::Created(user) => {
                    println!("Admin user created: {} ({})", user.email, user.id)
                }
                AdminSetup::AlreadyExists(user) => {
                    println!("Admin user already exists: {} ({})", user.email, user.id)
                }
            }
            Ok(())
        }
        Commands::Version => {
            println!("shopkeep v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn setup_admin(database_url: &str, args: &SetupAdminArgs) -> anyhow::Result<AdminSetup> {
    let shopkeep = connect(database_url, JwtConfig::new_random_hs256()).await?;
    let setup = shopkeep
        .ensure_admin(&args.email, &args.password, &args.first_name, &args.last_name)
        .await?;
    Ok(setup)
}

async fn connect(
    database_url: &str,
    jwt: JwtConfig,
) -> anyhow::Result<Shopkeep<SqliteRepositoryProvider>> {
    let shopkeep = ShopkeepBuilder::new()
        .with_sqlite(database_url)
        .await
        .context("failed to open database")?
        .with_jwt(jwt)
        .apply_migrations(true)
        .build()
        .await?;
    Ok(shopkeep)
}

async fn serve(database_url: &str, args: ServeArgs) -> anyhow::Result<()> {
    let shopkeep =
        Arc::new(connect(database_url, JwtConfig::new_hs256(args.jwt_secret.into_bytes())).await?);

    if !args.no_default_admin {
        shopkeep.seed_default_admin().await?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep = shopkeep.start_sweep_task(shutdown_rx);

    let app = shopkeep_axum::routes(shopkeep.clone())
        .with_environment(args.environment)
        .build()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let address = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(%address, environment = %args.environment, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweep.await {
        tracing::warn!(error = %e, "Sweep task did not shut down cleanly");
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use shopkeep::{ClientInfo, LoginOutcome, LoginRequest};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from([
            "shopkeep",
            "--database-url",
            "sqlite::memory:",
            "serve",
            "--jwt-secret",
            "secret",
            "--port",
            "8080",
            "--environment",
            "production",
            "--no-default-admin",
        ])
        .unwrap();

        assert_eq!(cli.database_url, "sqlite::memory:");
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.jwt_secret, "secret");
        assert_eq!(args.port, 8080);
        assert_eq!(args.environment, Environment::Production);
        assert!(args.no_default_admin);
    }

    #[test]
    fn test_unknown_environment_is_rejected() {
        let result = Cli::try_parse_from([
            "shopkeep",
            "serve",
            "--jwt-secret",
            "secret",
            "--environment",
            "staging",
        ]);
        assert!(result.is_err());
    }

    /// A file-backed database so separate commands see the same data.
    struct TempDatabase {
        path: std::path::PathBuf,
    }

    impl TempDatabase {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "shopkeep-{name}-{}-{}.db",
                std::process::id(),
                unique_suffix()
            ));
            Self { path }
        }

        fn url(&self) -> String {
            format!("sqlite://{}?mode=rwc", self.path.display())
        }
    }

    impl Drop for TempDatabase {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let mut path = self.path.clone().into_os_string();
                path.push(suffix);
                let _ = std::fs::remove_file(path);
            }
        }
    }

    fn unique_suffix() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_migrate_then_setup_admin_commands() {
        let db = TempDatabase::new("commands");
        let url = db.url();

        run(Cli::try_parse_from(["shopkeep", "--database-url", &url, "migrate"]).unwrap())
            .await
            .unwrap();

        run(Cli::try_parse_from([
            "shopkeep",
            "--database-url",
            &url,
            "setup-admin",
            "--email",
            "owner@example.com",
            "--password",
            "secret1",
        ])
        .unwrap())
        .await
        .unwrap();

        let again = SetupAdminArgs {
            email: "owner@example.com".to_string(),
            password: "another".to_string(),
            first_name: "Admin".to_string(),
            last_name: "User".to_string(),
        };
        let second = setup_admin(&url, &again).await.unwrap();
        assert!(!second.is_created());
        assert_eq!(second.user().email, "owner@example.com");

        // The original password still works.
        let shopkeep = connect(&url, JwtConfig::new_hs256(b"secret".to_vec()))
            .await
            .unwrap();
        let result = shopkeep
            .login(
                LoginRequest::new("owner@example.com", "secret1"),
                &ClientInfo::new("127.0.0.1", None),
            )
            .await;
        assert!(matches!(result.outcome, Ok(LoginOutcome::Success { .. })));
    }

    #[tokio::test]
    async fn test_setup_admin_creates_account() {
        let args = SetupAdminArgs {
            email: "owner@example.com".to_string(),
            password: "secret1".to_string(),
            first_name: "Admin".to_string(),
            last_name: "User".to_string(),
        };

        let created = setup_admin("sqlite::memory:", &args).await.unwrap();
        assert!(created.is_created());
        assert_eq!(created.user().first_name, "Admin");
    }
}
