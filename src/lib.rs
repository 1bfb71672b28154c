pub mod advisor;
pub mod config;
pub mod http;
pub mod paperless;
pub mod routes;
pub mod scanner;
pub mod session;
pub mod settings;
pub mod shell;

use std::sync::Arc;

/// Serves the command surface until the listener fails.
pub async fn serve(
    listener: tokio::net::TcpListener,
    shell: Arc<shell::Shell>,
    gui_origin: Option<&str>,
) -> std::io::Result<()> {
    axum::serve(listener, routes::router(shell, gui_origin)).await
}
