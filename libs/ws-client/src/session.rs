use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use frame_codec::Frame;

use crate::manager::Shared;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Step {
    Cancelled,
    Tick,
    Message(Option<Result<Message, tungstenite::Error>>),
}

/// Задача одной сессии: open → приём frame'ов + rate tick → close.
///
/// Всё, что она сообщает в `Shared`, помечено её epoch; после
/// вытеснения новым `connect()` эти сообщения игнорируются.
pub(crate) async fn run(shared: Arc<Shared>, epoch: u64, url: Url, token: CancellationToken) {
    let connected = tokio::select! {
        _ = token.cancelled() => {
            tracing::debug!(epoch, "cancelled before transport opened");
            shared.closed(epoch);
            return;
        }
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };

    let mut ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            shared.failed(epoch, &e.to_string());
            return;
        }
    };

    if !shared.opened(epoch) {
        close(&mut ws, shared.options.close_timeout, epoch).await;
        return;
    }
    tracing::info!(url = %url, epoch, "connection open");

    let mut tick = tokio::time::interval(shared.options.tick);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // первый tick срабатывает сразу
    tick.tick().await;

    loop {
        let step = tokio::select! {
            _ = token.cancelled() => Step::Cancelled,
            _ = tick.tick() => Step::Tick,
            msg = ws.next() => Step::Message(msg),
        };

        match step {
            Step::Cancelled => {
                close(&mut ws, shared.options.close_timeout, epoch).await;
                shared.closed(epoch);
                return;
            }
            Step::Tick => {
                if !shared.tick(epoch) {
                    break;
                }
            }
            Step::Message(Some(Ok(message))) => {
                let current = match &message {
                    Message::Text(text) => shared.ingest(epoch, Frame::Text(text.as_str())),
                    Message::Binary(bytes) => shared.ingest(epoch, Frame::Binary(bytes)),
                    Message::Close(frame) => {
                        // ответный Close уйдёт на следующем чтении, затем поток кончится
                        tracing::debug!(epoch, frame = ?frame, "close frame received");
                        true
                    }
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => true,
                };
                if !current {
                    break;
                }
            }
            Step::Message(Some(Err(e))) => {
                shared.failed(epoch, &e.to_string());
                return;
            }
            Step::Message(None) => {
                shared.closed(epoch);
                return;
            }
        }
    }

    // вытеснены новой сессией
    close(&mut ws, shared.options.close_timeout, epoch).await;
}

/// Close handshake, не дольше `timeout`; после: сокет просто бросается.
async fn close(ws: &mut Socket, timeout: Duration, epoch: u64) {
    let handshake = async {
        ws.close(None).await?;
        // дочитать до ответного Close
        while let Some(message) = ws.next().await {
            message?;
        }
        Ok::<(), tungstenite::Error>(())
    };

    match tokio::time::timeout(timeout, handshake).await {
        Ok(Ok(())) => tracing::debug!(epoch, "close handshake complete"),
        Ok(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {}
        Ok(Err(e)) => tracing::debug!(epoch, error = %e, "close handshake failed"),
        Err(_) => tracing::debug!(epoch, ?timeout, "close handshake timed out"),
    }
}
