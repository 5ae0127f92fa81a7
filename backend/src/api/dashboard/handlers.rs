//! Handler functions for the dashboard API.
//!
//! These functions read table state from `services::process_table`, render
//! it through `view`, and push a fresh view to WebSocket clients whenever a
//! table changes.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

use super::view::{render, render_page, TableView};
use crate::api::AppState;
use crate::errors::AppError;
use crate::services::ProcessTable;

fn current_view(table: &ProcessTable) -> TableView {
    render(table.channel(), &table.state())
}

pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let views: Vec<TableView> = state
        .tables()
        .iter()
        .map(|table| current_view(table))
        .collect();
    Ok(Html(render_page(&views)?))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn table_view(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<TableView>, AppError> {
    let table = state.table(&channel)?;
    Ok(Json(current_view(&table)))
}

pub async fn table_updates(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Response, AppError> {
    let table = state.table(&channel)?;
    Ok(ws
        .on_upgrade(move |socket| stream_table(socket, table))
        .into_response())
}

/// Sends the current view, then one view per table change until the client leaves.
async fn stream_table(socket: WebSocket, table: Arc<ProcessTable>) {
    let channel = table.channel();
    let (mut sender, mut receiver) = socket.split();
    let mut updates = table.watch();
    info!(event = "api.stream_opened", channel = %channel);

    loop {
        updates.borrow_and_update();
        let json = match serde_json::to_string(&current_view(&table)) {
            Ok(json) => json,
            Err(err) => {
                debug!(event = "api.stream_encode_failed", channel = %channel, error = %err);
                break;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }

        let table_changed = loop {
            tokio::select! {
                changed = updates.changed() => break changed.is_ok(),
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break false,
                    Some(Ok(_)) => {}
                },
            }
        };
        if !table_changed {
            break;
        }
    }

    info!(event = "api.stream_closed", channel = %channel);
}
