use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::config::{Effective, WireFormat};
use super::domain::{Sample, arrow_frame, legacy_frame};
use super::error::FeedGenError;

#[derive(Clone)]
struct AppState {
    feed: Arc<Effective>,
    shutdown: CancellationToken,
}

pub async fn run(eff: &Effective) -> Result<(), FeedGenError> {
    let addr = format!("{}:{}", eff.bind, eff.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| FeedGenError::Bind { addr: addr.clone(), source })?;

    tracing::info!(
        addr = %addr,
        route = %eff.route(),
        format = %eff.format,
        rate_hz = eff.rate_hz,
        topic = %eff.topic,
        "feed-gen listening"
    );

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl_c handler failed");
        }
        tracing::info!("shutdown requested");
        signal_token.cancel();
    });

    serve(listener, eff.clone(), token).await
}

/// Обслуживать WebSocket endpoint до отмены `shutdown`.
pub async fn serve(
    listener: TcpListener,
    feed: Effective,
    shutdown: CancellationToken,
) -> Result<(), FeedGenError> {
    let route = feed.route();
    let state = AppState {
        feed: Arc::new(feed),
        shutdown: shutdown.clone(),
    };
    let app = Router::new().route(&route, get(handle_ws)).with_state(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(socket, state))
}

// ═══════════════════════════════════════════════════════════════
//  Per-connection sender
// ═══════════════════════════════════════════════════════════════

async fn ws_connection(mut socket: WebSocket, state: AppState) {
    let feed = state.feed;
    let started = Instant::now();
    let mut tick = tokio::time::interval(Duration::from_secs_f64(1.0 / feed.rate_hz));
    let mut sent: u64 = 0;
    tracing::info!(format = %feed.format, "client connected");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                close(&mut socket).await;
                break;
            }
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = tick.tick() => {
                let time_ms = started.elapsed().as_millis() as u64;
                let sample = Sample::sine(time_ms as f64 / 1000.0);
                let message = match build_message(&feed, time_ms, &sample) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::error!(error = %e, "cannot encode sample");
                        break;
                    }
                };
                if let Err(e) = socket.send(message).await {
                    tracing::debug!(error = %e, "send failed");
                    break;
                }
                sent += 1;
            }
        }
    }

    tracing::info!(sent, "client disconnected");
}

/// Отправить Close и дождаться ответного (не дольше секунды).
async fn close(socket: &mut WebSocket) {
    if socket.send(Message::Close(None)).await.is_err() {
        return;
    }
    let drain = async {
        while let Some(Ok(msg)) = socket.recv().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(1), drain).await.is_err() {
        tracing::debug!("client did not answer close in time");
    }
}

/// Arrow при ошибке кодирования откатывается на JSON.
fn build_message(feed: &Effective, time_ms: u64, sample: &Sample) -> Result<Message, FeedGenError> {
    if feed.format == WireFormat::Arrow {
        match arrow_frame(&feed.topic, time_ms, sample) {
            Ok(bytes) => return Ok(Message::Binary(bytes.into())),
            Err(e) => tracing::warn!(error = %e, "arrow encoding failed, falling back to json"),
        }
    }
    let text = legacy_frame(&feed.topic, time_ms, sample)?;
    Ok(Message::Text(text.into()))
}

#[cfg(test)]
#[path = "serve_test.rs"]
mod tests;
