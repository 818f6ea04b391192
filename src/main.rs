/// Prompt Party server binary
use prompt_party::{config::ServerConfig, context::AppContext, error::AppResult, jobs, server};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prompt_party=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let config = ServerConfig::from_env()?;
    let ctx = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ____                             __     ____             __
   / __ \_________  ____ ___  ____  / /_   / __ \____ ______/ /___  __
  / /_/ / ___/ __ \/ __ `__ \/ __ \/ __/  / /_/ / __ `/ ___/ __/ / / /
 / ____/ /  / /_/ / / / / / / /_/ / /_   / ____/ /_/ / /  / /_/ /_/ /
/_/   /_/   \____/_/ /_/ /_/ .___/\__/  /_/    \__,_/_/   \__/\__, /
                          /_/                                /____/

        Share, remix, and rate AI prompts v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
