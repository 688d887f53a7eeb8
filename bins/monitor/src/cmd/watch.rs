use telemetry_api::now_ms;
use ws_client::{ConnectionManager, ConnectionState, TelemetryEvent, TelemetrySnapshot};

use crate::config::{Effective, WatchArgs};
use crate::error::MonitorError;

pub async fn run(args: WatchArgs) -> Result<(), MonitorError> {
    let eff = Effective::new(&args)?;
    tracing::info!(
        url = %eff.endpoint.url_string(),
        summary_ms = eff.summary.as_millis() as u64,
        print_records = eff.print_records,
        "telemetry-monitor starting"
    );

    let manager = ConnectionManager::new(eff.endpoint.clone());
    let mut events = manager.subscribe();
    manager.connect()?;

    let result = watch(&manager, &mut events, &eff).await;

    manager.shutdown().await;
    log_summary(&manager.snapshot());
    result
}

async fn watch(
    manager: &ConnectionManager,
    events: &mut ws_client::Subscription,
    eff: &Effective,
) -> Result<(), MonitorError> {
    let mut summary = tokio::time::interval(eff.summary);
    summary.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                tracing::info!("interrupted, closing connection");
                return Ok(());
            }
            _ = summary.tick() => log_summary(&manager.snapshot()),
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(());
                };
                match event {
                    TelemetryEvent::StateChanged { state: ConnectionState::Error, .. } => {
                        return Err(MonitorError::ConnectionFailed {
                            url: eff.endpoint.url_string(),
                        });
                    }
                    TelemetryEvent::StateChanged { state: ConnectionState::Disconnected, .. } => {
                        tracing::info!("source closed the connection");
                        return Ok(());
                    }
                    other => log_event(&other, eff.print_records),
                }
            }
        }
    }
}

fn log_event(event: &TelemetryEvent, print_records: bool) {
    match event {
        TelemetryEvent::StateChanged { state, ready_state, epoch } => {
            tracing::info!(state = %state, ready_state = %ready_state, epoch, "connection state");
        }
        TelemetryEvent::Record { record, message_count, message_rate } => {
            if print_records {
                tracing::info!(
                    topic = record.topic().unwrap_or("-"),
                    server_time = ?record.server_time,
                    count = message_count,
                    rate = message_rate,
                    payload = %record.payload,
                    "record"
                );
            } else {
                tracing::trace!(topic = ?record.topic(), count = message_count, "record");
            }
        }
        TelemetryEvent::RateTick { message_rate } => {
            tracing::trace!(rate = message_rate, "rate tick");
        }
        TelemetryEvent::DecodeFailed { error, frame_kind, frame_len } => {
            tracing::warn!(kind = frame_kind, len = frame_len, error = %error, "frame dropped");
        }
        TelemetryEvent::Cleared => tracing::debug!("live view cleared"),
    }
}

fn log_summary(snapshot: &TelemetrySnapshot) {
    let topics: Vec<&str> = snapshot.topic_names().collect();
    tracing::info!(
        state = %snapshot.state,
        ready_state = snapshot.ready_state.code(),
        messages = snapshot.message_count,
        rate = snapshot.message_rate,
        uptime_ms = ?snapshot.uptime_ms(now_ms()),
        latest = ?snapshot.latest.as_ref().and_then(|r| r.topic()),
        topics = ?topics,
        "summary"
    );
}
