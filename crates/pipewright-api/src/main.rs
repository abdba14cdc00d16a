//! pipewright CLI and HTTP server entry point.
//!
//! Parses CLI arguments, loads the engine configuration, then dispatches to
//! the appropriate command handler or starts the HTTP server.

mod cli;
mod http;
mod state;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;
use pipewright_infra::config::{apply_env_overrides, load_engine_config};
use pipewright_observe::{LogFormat, init_tracing, shutdown_tracing, verbosity_filter};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Shell completions need neither logging nor configuration
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "pipewright", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(verbosity_filter(cli.verbose, cli.quiet), format, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let mut config = load_engine_config(&cli.config).await;
    apply_env_overrides(&mut config);

    let code = match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            let addr = format!("{}:{}", config.server.host, config.server.port);
            let state = AppState::init(config);

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            if !cli.quiet {
                println!(
                    "  {} pipewright listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let router = http::router::build_router(state);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            tracing::info!("server stopped");
            ExitCode::SUCCESS
        }

        Commands::Run { file } => {
            let state = AppState::init(config);
            cli::run::run_workflow(&state, &file, cli.json, cli.quiet).await?
        }

        Commands::Validate { file } => cli::validate::validate_workflow(&file, cli.json).await?,

        Commands::Completions { .. } => ExitCode::SUCCESS,
    };

    shutdown_tracing();
    Ok(code)
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
