use std::process::ExitCode;

use face_verify::{app_state::AppState, config::AppConfig, models::job::JobStatus};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Run a single verification for the URL given on the command line and
/// print the result as JSON.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let Some(image_url) = std::env::args().nth(1) else {
        eprintln!("usage: verify-once <image_url>");
        return ExitCode::from(2);
    };

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    let shutdown = CancellationToken::new();
    let state = match AppState::from_config(&config, shutdown.clone()) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let ctx = state.request_context();
    let result = state.pipeline.verify(&image_url, &ctx).await;

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("failed to render result: {}", e);
            return ExitCode::FAILURE;
        }
    }

    match result.status {
        JobStatus::Accepted | JobStatus::Pending => ExitCode::SUCCESS,
        JobStatus::Rejected | JobStatus::Failed => ExitCode::FAILURE,
    }
}
