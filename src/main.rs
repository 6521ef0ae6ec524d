use std::sync::Arc;

use clap::Parser;
use site_gateway::config::Args;
use site_gateway::{AppState, router};
use tracing::info;
use tracing_subscriber::EnvFilter;

// this is main async function with tokio
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // parse cli arguments
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // creating shared state
    let state = Arc::new(AppState::from_args(&args)?);
    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Gateway running on http://localhost:{}", args.port);
    info!(
        "Rate limit: {} requests ({} for AI) per {} seconds",
        args.rate_limit, args.ai_rate_limit, args.rate_window
    );
    if args.ai_upstream.is_none() {
        info!("No AI upstream configured, /api/ai will answer with an error");
    }

    axum::serve(listener, app).await?;
    Ok(())
}
