/*
 * 5D Labs HealthCheck Controller - Controller Service
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! Controller Service - Kubernetes Controller for the `HealthCheck` CRD
//!
//! This service keeps monitor workloads in line with declared resources by:
//! - Watching `HealthCheck` custom resources in all namespaces
//! - Creating a monitor Deployment when a `HealthCheck` appears
//! - Deleting the Deployment when the `HealthCheck` is removed

use healthcheck_controller::tasks::{config::ControllerConfig, run_health_check_controller};
use healthcheck_controller::Error;
use std::path::Path;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "/config/config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!(
        "Starting 5D Labs HealthCheck Controller v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = match kube::Client::try_default().await {
        Ok(client) => client,
        Err(e) => {
            let err = anyhow::Error::from(Error::Connection(e));
            error!("{:#}", err);
            return Err(err);
        }
    };
    info!("Connected to Kubernetes cluster");

    let config = load_controller_config();

    if let Err(e) = run_health_check_controller(client, config, shutdown_signal()).await {
        error!("Controller error: {}", e);
        return Err(e.into());
    }

    info!("HealthCheck controller stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,healthcheck_controller=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_controller_config() -> ControllerConfig {
    let config_path =
        std::env::var("CONTROLLER_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if !Path::new(&config_path).exists() {
        info!(
            "No configuration file at {}, using defaults",
            config_path
        );
        return ControllerConfig::default();
    }

    match ControllerConfig::from_mounted_file(&config_path) {
        Ok(cfg) => {
            info!("Loaded controller configuration from {}", config_path);
            cfg
        }
        Err(err) => {
            warn!(
                "Failed to load configuration from {}: {}. Using defaults.",
                config_path, err
            );
            ControllerConfig::default()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
