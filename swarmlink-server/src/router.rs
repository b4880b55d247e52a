//! Per-connection read loop and message dispatch.
//!
//! Each connection runs [`handle_socket`] on its own task: register the
//! write half, then read frames until the peer goes away. A text frame runs
//! through [`process`] — parse, stamp the sender, validate, then the pure
//! [`handle`] step that touches the indexes and says what to write. The
//! async shell performs the writes through the registry.
//!
//! A handler error is a log line, never a disconnect: the protocol has no
//! error reply, so a peer that sends garbage simply hears nothing back.
//! Only a close frame or a transport-level read error ends the loop.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::StreamExt;

use swarmlink_proto::{self as proto, PieceAction, Request, Response};

use crate::error::SignalError;
use crate::pieces::{PieceCatalog, PieceIndex};
use crate::server::AppState;
use crate::swarm::SwarmIndex;

/// What servicing one message asks the transport layer to do.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Send a synthesized response back on the originating connection.
    Reply(Response),
    /// Relay an already-encoded payload to another peer.
    Deliver { to: String, payload: String },
    /// Nothing to write (actions).
    None,
}

/// Drive one connection from registration to cleanup.
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, mut stream) = socket.split();
    let peer_id = state.registry.register(sink);
    tracing::info!(%peer_id, "peer connected");

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Err(e) = dispatch(&state, &peer_id, text.as_str()).await {
                    tracing::warn!(%peer_id, error = %e, "message handling failed");
                }
            }
            Ok(Message::Binary(data)) => {
                tracing::warn!(%peer_id, len = data.len(), "ignoring binary frame");
            }
            Ok(Message::Close(frame)) => {
                log_close(&peer_id, frame.as_ref());
                break;
            }
            // axum answers pings itself; pongs need no action
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                tracing::warn!(%peer_id, error = %e, "read error, dropping connection");
                break;
            }
        }
    }

    // The peer is gone: revoke liveness first so swarm snapshots stop
    // returning it, then scrub the piece index. Swarms reap lazily.
    state.registry.unregister(&peer_id);
    if let Err(e) = state.pieces.drop_peer(&peer_id) {
        tracing::debug!(%peer_id, error = %e, "no piece holdings to scrub");
    }
    tracing::info!(%peer_id, "peer disconnected");
}

fn log_close(peer_id: &str, frame: Option<&CloseFrame>) {
    match frame {
        None => tracing::debug!(%peer_id, "close frame without status"),
        Some(f) if f.code == close_code::NORMAL || f.code == close_code::AWAY => {
            tracing::debug!(%peer_id, code = f.code, "peer closed")
        }
        Some(f) => {
            tracing::warn!(%peer_id, code = f.code, reason = %f.reason, "abnormal close")
        }
    }
}

async fn dispatch(state: &Arc<AppState>, peer_id: &str, text: &str) -> Result<(), SignalError> {
    let outcome = process(
        peer_id,
        text,
        &state.swarms,
        &state.pieces,
        &state.catalog,
        |p| state.registry.is_live(p),
    )?;
    match outcome {
        Outcome::Reply(resp) => {
            state
                .registry
                .write_to(peer_id, serde_json::to_string(&resp)?)
                .await
        }
        Outcome::Deliver { to, payload } => state.registry.write_to(&to, payload).await,
        Outcome::None => Ok(()),
    }
}

/// Parse, stamp, validate, handle. Pure with respect to the transport —
/// everything it needs is passed in, so it runs under test with no socket.
pub(crate) fn process(
    peer_id: &str,
    text: &str,
    swarms: &SwarmIndex,
    pieces: &PieceIndex,
    catalog: &PieceCatalog,
    is_live: impl Fn(&str) -> bool,
) -> Result<Outcome, SignalError> {
    let mut req = proto::parse_request(text)?;
    req.stamp_sender(peer_id);
    req.validate()?;
    handle(peer_id, req, swarms, pieces, catalog, is_live)
}

fn handle(
    peer_id: &str,
    req: Request,
    swarms: &SwarmIndex,
    pieces: &PieceIndex,
    catalog: &PieceCatalog,
    is_live: impl Fn(&str) -> bool,
) -> Result<Outcome, SignalError> {
    match req {
        Request::Join(join) => {
            swarms.join(peer_id, &join.file_id);
            let peer_list = swarms.snapshot(&join.file_id, is_live)?;
            Ok(Outcome::Reply(Response::JoinResponse {
                peer_id: peer_id.to_string(),
                peer_list,
            }))
        }

        Request::Forward(ref fwd) => {
            if fwd.from == fwd.to {
                return Err(SignalError::SelfAddressed(fwd.from.clone()));
            }
            relay(fwd.to.clone(), &req)
        }

        Request::Offer(ref sig) | Request::Answer(ref sig) => relay(sig.to.clone(), &req),

        Request::Info(info) => {
            let piece_list = catalog.pieces_of(&info.name);
            Ok(Outcome::Reply(Response::InfoResponse {
                name: info.name,
                piece_list,
            }))
        }

        Request::Action(act) => {
            match act.action {
                PieceAction::Add => {
                    catalog.record(&act.name, &act.piece_id);
                    pieces.add(&act.peer_id, &act.piece_id);
                }
                PieceAction::Remove => pieces.remove(&act.peer_id, &act.piece_id)?,
            }
            Ok(Outcome::None)
        }

        Request::Need(need) => {
            let peer_list = pieces.holders_of(&need.piece_id, peer_id);
            Ok(Outcome::Reply(Response::NeedResponse {
                name: need.name,
                piece_id: need.piece_id,
                peer_list,
            }))
        }
    }
}

/// Encode a stamped message for verbatim delivery to its destination.
fn relay(to: String, req: &Request) -> Result<Outcome, SignalError> {
    let payload = serde_json::to_string(req)?;
    Ok(Outcome::Deliver { to, payload })
}
