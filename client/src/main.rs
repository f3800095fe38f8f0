//! Deployctl - Entry Point
//!
//! Command-line dashboard client for the AutoDeploy orchestration server:
//! submits a deployment and renders its progress until completion.

use std::collections::HashMap;
use std::env;

use deployctl::app::options::AppOptions;
use deployctl::app::run::run;
use deployctl::deploy::reconciler::DeployStatus;
use deployctl::logs::{init_logging, LogOptions};
use deployctl::models::deployment::DeployRequest;
use deployctl::utils::version_info;

use tracing::{error, info};

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
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize version info: {}", e),
        }
        return;
    }

    if cli_args.contains_key("help") {
        print_usage();
        return;
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: cli_args
            .get("log-level")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
        json_format: cli_args.contains_key("json-logs"),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    // The repository to deploy is the one required argument
    let Some(github_url) = cli_args.get("url").cloned() else {
        print_usage();
        std::process::exit(2);
    };

    let container_port = match parse_port(&cli_args, "container-port") {
        Ok(port) => port,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    let host_port = match parse_port(&cli_args, "host-port") {
        Ok(port) => port,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let request = DeployRequest {
        github_url,
        instance_name: cli_args.get("name").cloned(),
        container_port,
        host_port,
    };

    let mut options = AppOptions::default();
    if let Some(backend) = cli_args.get("backend") {
        options.backend_base_url = backend.clone();
    }

    info!("Running deployctl against {}", options.backend_base_url);
    match run(options, request, await_shutdown_signal()).await {
        Ok(DeployStatus::Success) => {}
        Ok(status) => {
            info!("Exiting with status {:?}", status);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Deployment client failed: {e}");
            std::process::exit(1);
        }
    }
}

fn parse_port(cli_args: &HashMap<String, String>, key: &str) -> Result<Option<u16>, String> {
    match cli_args.get(key) {
        None => Ok(None),
        Some(value) => value
            .parse::<u16>()
            .map(Some)
            .map_err(|_| format!("Invalid --{}: {}", key, value)),
    }
}

fn print_usage() {
    println!("deployctl - deploy a GitHub repository and track its progress");
    println!();
    println!("Usage: deployctl --url=<github_url> [options]");
    println!();
    println!("Options:");
    println!("  --url=<github_url>        Repository to deploy (required)");
    println!("  --name=<instance_name>    Custom instance name");
    println!("  --container-port=<port>   Container port");
    println!("  --host-port=<port>        Host port");
    println!("  --backend=<base_url>      Deployment server base URL");
    println!("  --log-level=<level>       trace|debug|info|warn|error");
    println!("  --json-logs               Log in JSON format");
    println!("  --version                 Print version info");
    println!("  --help                    Show this help");
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                return std::future::pending::<()>().await;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGINT handler: {}", e);
                return std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
