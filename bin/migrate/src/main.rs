use clap::Parser;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

use postgres_db::{Db, DB_VERSION};

#[derive(Parser, Debug)]
struct Args {
    #[arg(env = "DATABASE_URL", id = "CONNECTION URL", help = "Database connection url. Format: postgresql://[user[:password]@][host][:port][/dbname][?param1=value1&...]")]
    db: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let db_access = Db::new(&args.db).await?;
    db_access.migrate().await?;
    tracing::info!(version = DB_VERSION, "Database migrated");
    Ok(())
}
