//! feedback-collector: MCP stdio server entry point.
//!
//! This is the shell that wires together all domains. No business logic
//! lives here: only module declarations, environment loading, and the
//! server run loop.
//!
//! Domains:
//!   - feedback/   session, validation, coordinator, lifecycle, service
//!   - images/     file/clipboard acquisition and PNG normalization
//!   - surface/    interaction surfaces (terminal)
//!   - mcp/        JSON-RPC server exposing `collect_feedback`

pub mod config;
pub mod error;
pub mod feedback;
pub mod images;
pub mod mcp;
pub mod surface;

use config::Settings;
use feedback::FeedbackService;
use images::DesktopImages;
use mcp::McpServer;
use std::sync::Arc;
use surface::TerminalSurface;

/// Entry point: called by main.rs.
pub fn run() {
    // Load .env.local → .env from the working directory; first one found wins.
    'env_load: for env_file in [".env.local", ".env"] {
        let path = std::path::Path::new(env_file);
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break 'env_load;
        }
    }

    env_logger::init();

    let settings = Settings::from_env();
    log::info!(
        "[STARTUP] feedback-collector {} starting, dialog timeout: {}s",
        env!("CARGO_PKG_VERSION"),
        settings.dialog_timeout_secs
    );

    match TerminalSurface::probe() {
        Ok(()) => log::info!("[STARTUP] Interactive terminal available"),
        Err(e) => log::warn!(
            "[STARTUP] {} (collect_feedback will fail until one is available)",
            e
        ),
    }

    let service = Arc::new(FeedbackService::new(
        settings,
        Box::new(TerminalSurface::new()),
        Box::new(DesktopImages::new()),
    ));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("[STARTUP] Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let server = McpServer::new(Arc::clone(&service));
    runtime.block_on(async {
        tokio::select! {
            result = server.serve(tokio::io::stdin(), tokio::io::stdout()) => {
                if let Err(e) = result {
                    log::error!("{}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("[STARTUP] Interrupted, shutting down");
            }
        }
    });

    service.shutdown();
    // A blocked collect_feedback or stdin read must not hold the process open.
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    log::info!("[STARTUP] Server stopped");
}
