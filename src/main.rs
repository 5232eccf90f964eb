//! process-stats-exporter
//!
//! Prometheus exporter for per-process statistics with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod startup_checks;
mod state;
mod updater;

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use process_stats_exporter::health_stats::HealthStats;
use process_stats_exporter::{ProcessMetrics, ProcessMetricsHandler};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info, Level};

use cli::{Args, Commands};
use commands::{command_check, command_test};
use config::{
    parse_log_level, resolve_config, show_config, validate_effective_config, Config,
    DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{health_handler, metrics_handler, root_handler};
use state::{AppState, Telemetry};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level_name = config.log_level.as_deref().unwrap_or("info");
    let Some(log_level) = parse_log_level(level_name).unwrap_or(Some(Level::INFO)) else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config);

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Check => command_check(&config),
            Commands::Test {
                iterations,
                verbose,
            } => command_test(*iterations, *verbose, &config),
        };
    }

    info!("Starting process-stats-exporter");

    let proc_root = config.proc_root();
    if let Err(e) = startup_checks::validate_requirements(&proc_root) {
        error!("❌ Startup validation failed: {}", e);
        error!("   The exporter will start but may not function correctly!");
        // Continue anyway - don't fail hard
    }

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    let handler = ProcessMetricsHandler::new(config.selection()?, config.static_labels(), proc_root);

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    debug!("Prometheus registry initialized");

    let metrics = ProcessMetrics::create(&registry, &handler.get_metric_configs())?;
    let telemetry = if config.enable_telemetry.unwrap_or(true) {
        Some(Telemetry::register(&registry)?)
    } else {
        debug!("Internal telemetry disabled");
        None
    };

    info!(
        "Registered {} process metrics with labels {:?}",
        metrics.len(),
        handler
            .get_metric_configs()
            .first()
            .map(|c| c.labels.clone())
            .unwrap_or_default()
    );

    let state = Arc::new(AppState {
        registry,
        handler,
        metrics,
        update_lock: Mutex::new(()),
        telemetry,
        config: Arc::new(config.clone()),
        health_stats: Arc::new(HealthStats::new()),
        start_time: Instant::now(),
    });

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
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
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state.clone());

    match (
        config.enable_tls.unwrap_or(false),
        config.tls_cert_path.as_deref(),
        config.tls_key_path.as_deref(),
    ) {
        (true, Some(cert_path), Some(key_path)) => {
            info!("Loading TLS certificate from: {}", cert_path);
            info!("Loading TLS private key from: {}", key_path);

            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .map_err(|e| {
                    error!("Failed to load TLS configuration: {}", e);
                    e
                })?;

            info!(
                "process-stats-exporter listening on https://{}:{}",
                bind_ip_str, port
            );

            let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!("Server error: {}", e);
                        return Err(e.into());
                    }
                }
                _ = shutdown_signal => {
                    info!("Shutdown signal received, exiting...");
                }
            }
        }
        (true, _, _) => {
            // validate_effective_config rejects this combination
            return Err("TLS enabled without certificate and key paths".into());
        }
        _ => {
            let listener = TcpListener::bind(addr).await?;
            info!(
                "process-stats-exporter listening on http://{}:{}",
                bind_ip_str, port
            );

            let server = axum::serve(listener, app);

            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!("Server error: {}", e);
                        return Err(e.into());
                    }
                }
                _ = shutdown_signal => {
                    info!("Shutdown signal received, exiting...");
                }
            }
        }
    }

    info!("process-stats-exporter stopped gracefully");
    Ok(())
}
