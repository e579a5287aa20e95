//! DevOps Relay - Entry Point
//!
//! Runs either the public gateway that authenticates CI and Slack traffic,
//! or the in-cluster relay server that drives ArgoCD rollouts.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use devops_relay::app::options::{AppOptions, Role};
use devops_relay::app::run::run;
use devops_relay::app::settings::Settings;
use devops_relay::logs::{init_logging, LogOptions};
use devops_relay::utils::version_info;

use tracing::{error, info};

const ROLE_ENV: &str = "RELAY_ROLE";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to serialize version: {e}"),
        }
        return;
    }

    // The role comes from --role, then RELAY_ROLE
    let raw_role = cli_args
        .get("role")
        .cloned()
        .or_else(|| env::var(ROLE_ENV).ok())
        .unwrap_or_default();
    let role = match raw_role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Run: devops-relay --role=<gateway|server>");
            std::process::exit(2);
        }
    };

    let settings = match Settings::load().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to load settings: {e}");
            std::process::exit(1);
        }
    };

    // Initialize logging
    if let Err(e) = init_logging(LogOptions::from_settings(&settings)) {
        println!("Failed to initialize logging: {e}");
    }

    let options = AppOptions::from_settings(role, &settings);
    info!("Running DevOps relay with options: {:?}", options);

    if let Err(e) = run(options, Arc::new(settings), await_shutdown_signal()).await {
        error!("Failed to run the relay: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C: {e}");
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl+C: {e}");
                    }
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Ctrl+C received, shutting down...");
    }
}
