use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use tracing::debug;

use crate::notifications::NotificationHub;
use crate::state::AppState;

/// Live feed of catalog and content changes for the admin dashboard.
pub async fn activity_feed(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let sender = state.hub.sender();
    debug!("admin activity feed connected");
    ws.on_upgrade(move |socket| NotificationHub::handle_socket(socket, sender))
}
