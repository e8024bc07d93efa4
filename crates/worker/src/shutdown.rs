//! Ctrl+C / SIGTERM graceful shutdown, modeled on the teacher's
//! `api::main::shutdown_signal`. `wait()` resolves once; callers `select!`
//! it against their own work loop.

use tokio::signal;

pub async fn wait() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
