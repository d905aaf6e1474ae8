use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use courier_auth::JwtVerifier;
use courier_messenger::data_access::DataAccess;
use courier_messenger::messenger::{Messenger, MessengerConfig};
use courier_web::server;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "COURIER_HOST", default_value = "127.0.0.1")]
    host: String,
    #[arg(short, long, env = "COURIER_PORT", default_value_t = 5000)]
    port: u16,
    #[arg(long, env = "DATABASE_URL", id = "CONNECTION URL", help = "Database connection url. Format: postgresql://[user[:password]@][host][:port][/dbname][?param1=value1&...]")]
    db: Option<String>,
    #[arg(long, env = "COURIER_MOCK", help = "Use the seeded in-memory store instead of PostgreSQL")]
    mock: bool,
    #[arg(long, env = "JWT_SECRET", hide_env_values = true, help = "HS256 secret access tokens are signed with")]
    jwt_secret: String,
    #[arg(long, env = "COURIER_IO_TIMEOUT_MS", default_value_t = 5000, help = "Upper bound on every store and token call")]
    io_timeout_ms: u64,
    #[arg(long, env = "COURIER_INBOX_UNREAD_COUNTS", help = "Report real unread counts in inbox previews")]
    inbox_unread_counts: bool,
    #[arg(long, env = "COURIER_LOG_JSON", help = "Log as JSON lines")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let addr = format!("{}:{}", args.host, args.port);
    let token_verifier = JwtVerifier::new(args.jwt_secret.as_bytes());
    let config = MessengerConfig {
        io_timeout: Duration::from_millis(args.io_timeout_ms),
        inbox_unread_counts: args.inbox_unread_counts,
    };

    let cancellation_token = make_cancellation_token();

    if args.mock {
        let db_access = mock_db::Db::new();
        log_dev_tokens(&db_access, &token_verifier);
        run_server(db_access, token_verifier, config, &addr, cancellation_token).await?;
    } else {
        let db_connection = args.db.context("Database connection url must be specified")?;
        let db_access = postgres_db::Db::new(&db_connection).await?;
        db_access.check_migrations().await?;
        let db_graceful_shutdown = db_access.graceful_shutdown(cancellation_token.clone());

        run_server(db_access, token_verifier, config, &addr, cancellation_token).await?;

        db_graceful_shutdown.await.context("Join error in thread handling database connection shutdown")?;
    }

    Ok(())
}

async fn run_server<D: DataAccess>(
    data_access: D,
    token_verifier: JwtVerifier,
    config: MessengerConfig,
    addr: &str,
    cancellation_token: CancellationToken,
) -> Result<()> {
    let messenger = Messenger::with_config(data_access, token_verifier, config);
    server::run_server(addr, messenger, cancellation_token)
        .await
        .with_context(|| format!("Unable to start server at {}", addr))?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Mock mode only: prints a day-long token for every seeded user so the
/// socket can be tried out by hand.
fn log_dev_tokens(db_access: &mock_db::Db, token_verifier: &JwtVerifier) {
    let users = match db_access.users() {
        Ok(users) => users,
        Err(e) => {
            tracing::warn!(error = %e, "Couldn't list seeded users");
            return;
        }
    };
    for user in users {
        match token_verifier.issue(user.id, Some(user.email.clone()), Some(user.role()), chrono::Duration::days(1)) {
            Ok(token) => tracing::info!(user_id = %user.id, email = %user.email, role = user.role().as_str(), %token, "dev token"),
            Err(e) => tracing::warn!(user_id = %user.id, error = %e, "Couldn't issue dev token"),
        }
    }
}

fn make_cancellation_token() -> CancellationToken {
    let cancellation_token = CancellationToken::new();

    let cloned_token = cancellation_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received shutdown signal");
            },
            Err(err) => {
                tracing::error!("Unable to listen for shutdown signal: {}", err);
            },
        };
        cloned_token.cancel();
    });

    cancellation_token
}
