//! Bind and run the gateway's HTTP server, taking a pre-bound listener
//! and a `CancellationToken` for graceful shutdown.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::routes;
use crate::state::AppState;

/// Run the gateway until `cancel` fires, then drain in-flight requests
/// and flush every registry's pending debounced write.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    let app = routes::build(state.clone());

    info!(%addr, "o2o gateway listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    state.flush_all().await;
    info!("o2o gateway shut down");
    Ok(())
}
