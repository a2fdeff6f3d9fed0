use axum::{
    extract::{State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use murmur_gateway::connection::{LiveSession, handle_connection};

use crate::error::ApiError;
use crate::extract::{Path, Query};
use crate::session::Session;
use crate::state::AppState;
use crate::tokens::decode_session;

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub token: String,
}

/// GET /rooms/{code}/live?token=...
///
/// Browsers cannot set headers on a websocket handshake, so the session token
/// travels in the query string. The session is checked before the upgrade
/// handshake is looked at.
pub async fn live(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<LiveQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let claims = decode_session(&state.session_secret, &query.token).ok_or(ApiError::Unauthorized)?;
    let session = Session(claims);
    let room = session.room(&state, &code).await?;
    session.ensure_not_banned(&state, &room.id).await?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let live = LiveSession {
        room_id: session.0.sub,
        display_name: session.0.name,
        is_owner: session.0.owner,
    };
    let dispatcher = state.dispatcher.clone();

    Ok(ws.on_upgrade(move |socket| handle_connection(socket, dispatcher, live)))
}
