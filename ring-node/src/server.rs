use axum::extract::{ConnectInfo, Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ring_core::wire::{
    ChatForm, Greeting, JoinDenied, JoinGranted, JoinQuery, PanicForm, QuitForm, RingDump,
    Snapshot, TokenForm,
};
use ring_core::NodeAddr;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::warn;

use crate::heartbeat::unix_now;
use crate::peers::Peers;
use crate::state::{NodeState, Token, TokenKind};
use crate::task::{Task, TaskSender};

/// Shared context for the HTTP listener.
///
/// The listener never touches protocol state directly; it enqueues tasks
/// for the worker. The one exception is `heartbeat`, a relaxed
/// single-writer scalar updated straight from the endpoint.
#[derive(Clone)]
pub struct AppState {
    pub state: Arc<Mutex<NodeState>>,
    pub tx: TaskSender,
    pub peers: Peers,
    pub heartbeat: Arc<AtomicU64>,
    pub lenient_join: bool,
}

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/serialize", get(serialize))
        .route("/serialize/all", get(serialize_all))
        .route("/ring/join", get(join))
        .route("/ring/quit", post(quit))
        .route("/ring/le/:kind", post(election))
        .route("/ring/message", post(uplink).put(broadcast))
        .route("/heartbeat", post(heartbeat))
        .route("/panic", post(panic_token))
        .with_state(app)
}

async fn index() -> Json<Greeting> {
    Json(Greeting {
        message: "I am working right now! Don't bother me!".to_string(),
    })
}

async fn serialize(State(app): State<AppState>) -> Json<Snapshot> {
    let snapshot = app
        .state
        .lock()
        .await
        .snapshot(app.heartbeat.load(Ordering::Relaxed));
    Json(snapshot)
}

/// Walks the ring one `/serialize` at a time, stopping when the walk
/// returns to this node or a hop is unreachable.
async fn serialize_all(State(app): State<AppState>) -> Json<RingDump> {
    let (origin, first) = {
        let state = app.state.lock().await;
        (
            state.addr(),
            state.snapshot(app.heartbeat.load(Ordering::Relaxed)),
        )
    };
    let mut cursor = first.next_addr();
    let mut nodes = vec![first];
    while let Ok(hop) = cursor {
        if hop == origin {
            break;
        }
        match app.peers.snapshot(hop).await {
            Ok(snapshot) => {
                cursor = snapshot.next_addr();
                nodes.push(snapshot);
            }
            Err(err) => {
                warn!(of = %hop, cause = %err, "ring walk stopped early");
                break;
            }
        }
    }
    Json(RingDump { nodes })
}

async fn join(
    State(app): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    query: Option<Query<JoinQuery>>,
) -> Response {
    let Some(Query(query)) = query else {
        return denied("malformed join request");
    };
    let Ok(peer) = NodeAddr::from_parts(&query.ip, query.port) else {
        return denied("malformed join request");
    };
    if !app.lenient_join && IpAddr::V4(peer.host) != remote.ip() {
        warn!(advertised = %peer, remote = %remote, "join with spoofed source rejected");
        return denied("You are a liar!");
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    if app
        .tx
        .send(Task::Join {
            peer,
            reply: reply_tx,
        })
        .await
        .is_err()
    {
        return denied("node is shutting down");
    }
    match reply_rx.await {
        Ok(old) => Json(JoinGranted {
            host: old.host.to_string(),
            port: old.port,
            success: true,
        })
        .into_response(),
        Err(_) => denied("node is shutting down"),
    }
}

fn denied(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(JoinDenied {
            message: message.to_string(),
            success: false,
        }),
    )
        .into_response()
}

async fn quit(State(app): State<AppState>, form: Option<Form<QuitForm>>) -> String {
    let Some(Form(form)) = form else {
        return String::new();
    };
    let echo = form.port.to_string();
    let (Ok(target), Ok(target_next)) = (
        NodeAddr::from_parts(&form.host, form.port),
        NodeAddr::from_parts(&form.next_host, form.next_port),
    ) else {
        return echo;
    };
    let _ = app
        .tx
        .send(Task::Quit {
            target,
            target_next,
        })
        .await;
    echo
}

async fn election(
    State(app): State<AppState>,
    Path(kind): Path<String>,
    form: Option<Form<TokenForm>>,
) -> StatusCode {
    let (Some(kind), Some(Form(form))) = (TokenKind::from_path(&kind), form) else {
        return StatusCode::OK;
    };
    let _ = app
        .tx
        .send(Task::Token(Token {
            kind,
            id: form.node_id,
        }))
        .await;
    StatusCode::OK
}

async fn uplink(State(app): State<AppState>, form: Option<Form<ChatForm>>) -> StatusCode {
    if let Some(Form(form)) = form {
        let _ = app
            .tx
            .send(Task::Uplink {
                text: form.message,
                sender: form.sender,
            })
            .await;
    }
    StatusCode::OK
}

async fn broadcast(State(app): State<AppState>, form: Option<Form<ChatForm>>) -> StatusCode {
    if let Some(Form(form)) = form {
        let _ = app
            .tx
            .send(Task::Broadcast {
                text: form.message,
                sender: form.sender,
            })
            .await;
    }
    StatusCode::OK
}

/// The one write that bypasses the queue: a single relaxed scalar, so the
/// failure detector sees fresh heartbeats even under a backed-up worker.
async fn heartbeat(State(app): State<AppState>) -> StatusCode {
    app.heartbeat.store(unix_now(), Ordering::Relaxed);
    StatusCode::OK
}

async fn panic_token(State(app): State<AppState>, form: Option<Form<PanicForm>>) -> StatusCode {
    if let Some(Form(form)) = form {
        if let Ok(orphan) = NodeAddr::from_parts(&form.host, form.port) {
            let _ = app.tx.send(Task::Panic { orphan }).await;
        }
    }
    StatusCode::OK
}
