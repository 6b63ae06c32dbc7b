//! `taskboard-mock` -- in-memory Taskboard backend.
//!
//! Serves the full REST API under `/api` with no persistence. Verification
//! codes and password-reset tokens are written to the log instead of being
//! emailed.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 127.0.0.1:8080
//! cargo run --bin taskboard-mock
//!
//! # Short-lived credentials to watch refreshes happen
//! cargo run --bin taskboard-mock -- --bind 127.0.0.1:9000 --access-ttl-secs 20
//! ```

use std::sync::Arc;

use clap::Parser;
use taskboard_mock::config::{MockCliArgs, MockConfig};
use taskboard_mock::server::{self, MockState};

#[tokio::main]
async fn main() {
    let cli = MockCliArgs::parse();

    let config = match MockConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let state = Arc::new(MockState::with_access_ttl(config.access_ttl_secs));
    if let Some(seed) = &config.seed {
        match state.store.insert_verified(&seed.name, &seed.email, &seed.password) {
            Ok(user) => tracing::info!(email = %user.email, "seeded account"),
            Err(e) => tracing::warn!(error = %e, "failed to seed account"),
        }
    }

    tracing::info!(addr = %config.bind_addr, "starting taskboard mock backend");
    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "mock backend listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "mock backend task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start mock backend");
            std::process::exit(1);
        }
    }
}
