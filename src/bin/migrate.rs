/// Run pending database migrations and exit
use anyhow::Context;
use clap::Parser;
use prompt_party::{config::ServerConfig, db};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "migrate", about = "Apply pending database migrations")]
struct Args {
    /// Database file to migrate; defaults to the configured PP_* location
    #[arg(long)]
    database: Option<PathBuf>,

    /// Print the target database path and exit without migrating
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let database = match args.database {
        Some(path) => path,
        None => {
            ServerConfig::from_env()
                .context("loading configuration")?
                .storage
                .database
        }
    };

    println!("Database: {}", database.display());
    if args.dry_run {
        return Ok(());
    }

    if let Some(parent) = database.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("creating data directory")?;
    }

    let pool = db::create_pool(&database, db::DatabaseOptions::default())
        .await
        .context("opening database")?;
    db::run_migrations(&pool).await.context("running migrations")?;

    println!("Migrations applied");
    Ok(())
}
