use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use frame_codec::Frame;
use telemetry_api::{ConnectionState, ReadyState, now_ms};
use topic_engine::{DEFAULT_TICK, RateEstimator, TopicCache};

use crate::config::EndpointConfig;
use crate::error::ClientError;
use crate::session;
use crate::store::{Subscription, TelemetryEvent, TelemetrySnapshot};

/// Параметры manager'а, не относящиеся к endpoint'у.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Период фонового пересчёта rate.
    pub tick: Duration,
    /// Сколько ждать ответного Close от сервера.
    pub close_timeout: Duration,
    /// Ёмкость broadcast-канала событий.
    pub event_capacity: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            close_timeout: Duration::from_secs(1),
            event_capacity: 1024,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Core — всё изменяемое состояние под одним lock'ом
// ═══════════════════════════════════════════════════════════════

struct Session {
    epoch: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Core {
    state: ConnectionState,
    ready_state: ReadyState,
    endpoint: Arc<EndpointConfig>,
    /// Растёт на каждый `connect()`. События сессии с другим epoch отбрасываются.
    epoch: u64,
    cache: TopicCache,
    rate: RateEstimator,
    connected_at_ms: Option<i64>,
    session: Option<Session>,
}

impl Core {
    fn snapshot(&self) -> TelemetrySnapshot {
        let topics = self.cache.snapshot();
        TelemetrySnapshot {
            state: self.state,
            ready_state: self.ready_state,
            endpoint: Arc::clone(&self.endpoint),
            topics: topics.topics,
            latest: topics.latest,
            message_count: self.rate.message_count(),
            message_rate: self.rate.rate(),
            connected_at_ms: self.connected_at_ms,
            epoch: self.epoch,
        }
    }

    fn set_state(&mut self, state: ConnectionState, ready_state: ReadyState) -> TelemetryEvent {
        tracing::debug!(from = %self.state, to = %state, ready_state = %ready_state, epoch = self.epoch, "state transition");
        self.state = state;
        self.ready_state = ready_state;
        TelemetryEvent::StateChanged {
            state,
            ready_state,
            epoch: self.epoch,
        }
    }

    fn reset_stream(&mut self) {
        self.cache.clear();
        self.rate.reset();
    }
}

// ═══════════════════════════════════════════════════════════════
//  Shared — общее для manager'а и задачи сессии
// ═══════════════════════════════════════════════════════════════

pub(crate) struct Shared {
    core: Mutex<Core>,
    snapshots: watch::Sender<Arc<TelemetrySnapshot>>,
    events: broadcast::Sender<TelemetryEvent>,
    pub(crate) options: ManagerOptions,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Core> {
        match self.core.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("connection state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Разослать новый snapshot и события. Вызывается под lock'ом,
    /// чтобы порядок публикаций совпадал с порядком изменений;
    /// оба канала не блокируют отправителя.
    fn publish(&self, core: &Core, events: impl IntoIterator<Item = TelemetryEvent>) {
        self.snapshots.send_replace(Arc::new(core.snapshot()));
        for event in events {
            // Err = нет подписчиков
            let _ = self.events.send(event);
        }
    }

    /// Lock + проверка epoch. `None`: событие от вытесненной сессии.
    fn current(&self, epoch: u64) -> Option<MutexGuard<'_, Core>> {
        let core = self.lock();
        if core.epoch != epoch {
            tracing::debug!(event_epoch = epoch, current_epoch = core.epoch, "stale session event discarded");
            return None;
        }
        Some(core)
    }

    pub(crate) fn opened(&self, epoch: u64) -> bool {
        let Some(mut core) = self.current(epoch) else {
            return false;
        };
        let event = core.set_state(ConnectionState::Open, ReadyState::Open);
        self.publish(&core, [event]);
        true
    }

    /// Frame от транспорта: decode вне lock'а, затем upsert + rate.
    pub(crate) fn ingest(&self, epoch: u64, frame: Frame<'_>) -> bool {
        let decoded = frame_codec::decode(frame);

        let Some(mut core) = self.current(epoch) else {
            return false;
        };
        match decoded {
            Ok(record) => {
                let record = Arc::new(record);
                core.cache.upsert(Arc::clone(&record), now_ms());
                let message_rate = core.rate.record(Instant::now());
                let message_count = core.rate.message_count();
                self.publish(
                    &core,
                    [TelemetryEvent::Record {
                        record,
                        message_count,
                        message_rate,
                    }],
                );
            }
            Err(error) => {
                tracing::debug!(kind = frame.kind(), len = frame.len(), error = %error, "frame decode failed");
                let _ = self.events.send(TelemetryEvent::DecodeFailed {
                    error,
                    frame_kind: frame.kind(),
                    frame_len: frame.len(),
                });
            }
        }
        true
    }

    pub(crate) fn tick(&self, epoch: u64) -> bool {
        let Some(mut core) = self.current(epoch) else {
            return false;
        };
        let message_rate = core.rate.recompute(Instant::now());
        self.publish(&core, [TelemetryEvent::RateTick { message_rate }]);
        true
    }

    /// Транспорт закрыт штатно (сервером или после `disconnect()`).
    pub(crate) fn closed(&self, epoch: u64) {
        let Some(mut core) = self.current(epoch) else {
            return;
        };
        core.session = None;
        let event = core.set_state(ConnectionState::Disconnected, ReadyState::Closed);
        tracing::info!(epoch, "connection closed");
        self.publish(&core, [event]);
    }

    /// Ошибка транспорта: терминально для сессии, без переподключения.
    pub(crate) fn failed(&self, epoch: u64, reason: &str) {
        let Some(mut core) = self.current(epoch) else {
            return;
        };
        core.session = None;
        let event = core.set_state(ConnectionState::Error, ReadyState::Closed);
        tracing::warn!(epoch, error = %reason, url = %core.endpoint.url_string(), "connection failed");
        self.publish(&core, [event]);
    }
}

// ═══════════════════════════════════════════════════════════════
//  ConnectionManager
// ═══════════════════════════════════════════════════════════════

/// Владелец единственного соединения с источником телеметрии.
///
/// Один живой транспорт на экземпляр. Потребители получают snapshot'ы
/// (`snapshot()` / `watch()`) и события (`subscribe()`), но никогда
/// не изменяемую ссылку на cache.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(EndpointConfig::default())
    }
}

impl ConnectionManager {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self::with_options(endpoint, ManagerOptions::default())
    }

    pub fn with_options(endpoint: EndpointConfig, options: ManagerOptions) -> Self {
        let core = Core {
            state: ConnectionState::Disconnected,
            ready_state: ReadyState::Uninstantiated,
            endpoint: Arc::new(endpoint),
            epoch: 0,
            cache: TopicCache::new(),
            rate: RateEstimator::new(),
            connected_at_ms: None,
            session: None,
        };
        let (snapshots, _) = watch::channel(Arc::new(core.snapshot()));
        let (events, _) = broadcast::channel(options.event_capacity.max(1));

        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                snapshots,
                events,
                options,
            }),
        }
    }

    // ── read surface ────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<TelemetrySnapshot> {
        Arc::clone(&self.shared.snapshots.borrow())
    }

    /// Канал последнего snapshot'а: для тех, кто перерисовывается
    /// на каждое изменение или опрашивает с собственной частотой.
    pub fn watch(&self) -> watch::Receiver<Arc<TelemetrySnapshot>> {
        self.shared.snapshots.subscribe()
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.shared.events.subscribe())
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.lock().ready_state
    }

    pub fn endpoint(&self) -> EndpointConfig {
        EndpointConfig::clone(&self.shared.lock().endpoint)
    }

    // ── configuration ───────────────────────────────────────────

    pub fn set_endpoint(&self, endpoint: EndpointConfig) -> Result<(), ClientError> {
        self.update_endpoint(|current| *current = endpoint)
    }

    pub fn set_address(&self, address: impl Into<String>) -> Result<(), ClientError> {
        let address = address.into();
        self.update_endpoint(|current| current.address = address)
    }

    pub fn set_port(&self, port: u16) -> Result<(), ClientError> {
        self.update_endpoint(|current| current.port = port)
    }

    pub fn set_path(&self, path: impl Into<String>) -> Result<(), ClientError> {
        let path = path.into();
        self.update_endpoint(|current| current.path = path)
    }

    fn update_endpoint(&self, change: impl FnOnce(&mut EndpointConfig)) -> Result<(), ClientError> {
        let mut core = self.shared.lock();
        if !matches!(core.state, ConnectionState::Disconnected | ConnectionState::Error) {
            return Err(ClientError::Busy(core.state));
        }
        change(Arc::make_mut(&mut core.endpoint));
        self.shared.publish(&core, std::iter::empty());
        Ok(())
    }

    // ── lifecycle ───────────────────────────────────────────────

    /// Открыть новую сессию.
    ///
    /// No-op в `Connecting`/`Open`. Иначе: прежняя сессия отменяется,
    /// epoch растёт, cache и счётчики сбрасываются, состояние →
    /// `Connecting`, транспорт открывается в фоновой задаче.
    pub fn connect(&self) -> Result<(), ClientError> {
        let mut core = self.shared.lock();
        if core.state.is_active() {
            tracing::debug!(state = %core.state, epoch = core.epoch, "connect ignored, session already active");
            return Ok(());
        }

        let url = core.endpoint.url()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        if let Some(previous) = core.session.take() {
            tracing::debug!(epoch = previous.epoch, "cancelling superseded session");
            previous.token.cancel();
        }
        core.epoch += 1;
        let epoch = core.epoch;
        core.reset_stream();
        core.connected_at_ms = Some(now_ms());
        let state_event = core.set_state(ConnectionState::Connecting, ReadyState::Connecting);

        tracing::info!(url = %url, epoch, "connecting");
        let token = CancellationToken::new();
        let handle = runtime.spawn(session::run(
            Arc::clone(&self.shared),
            epoch,
            url,
            token.clone(),
        ));
        core.session = Some(Session {
            epoch,
            token,
            handle,
        });

        self.shared.publish(&core, [TelemetryEvent::Cleared, state_event]);
        Ok(())
    }

    /// Закрыть текущую сессию. Без сессии: no-op.
    pub fn disconnect(&self) {
        let mut core = self.shared.lock();
        if core.state == ConnectionState::Closing {
            return;
        }
        let Some(session) = &core.session else {
            tracing::debug!(state = %core.state, "disconnect ignored, no live session");
            return;
        };
        session.token.cancel();
        tracing::info!(epoch = session.epoch, "disconnect requested");
        let event = core.set_state(ConnectionState::Closing, ReadyState::Closing);
        self.shared.publish(&core, [event]);
    }

    /// Сбросить cache и счётчики, не трогая соединение.
    pub fn clear(&self) {
        let mut core = self.shared.lock();
        core.reset_stream();
        self.shared.publish(&core, [TelemetryEvent::Cleared]);
    }

    /// Закрыть сессию и дождаться её задачи.
    ///
    /// Задаче даётся `close_timeout` на Close handshake (плюс запас),
    /// после чего она прерывается. Manager остаётся в `Disconnected`.
    pub async fn shutdown(&self) {
        let session = {
            let mut core = self.shared.lock();
            let session = core.session.take();
            if session.is_some() && core.state != ConnectionState::Closing {
                let event = core.set_state(ConnectionState::Closing, ReadyState::Closing);
                self.shared.publish(&core, [event]);
            }
            session
        };
        let Some(Session {
            epoch,
            token,
            mut handle,
        }) = session
        else {
            return;
        };

        token.cancel();
        let grace = self.shared.options.close_timeout + Duration::from_millis(250);
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            tracing::warn!(epoch, "session task did not finish in time, aborting");
            handle.abort();
        }

        let mut core = self.shared.lock();
        if core.epoch == epoch && core.state != ConnectionState::Disconnected {
            let event = core.set_state(ConnectionState::Disconnected, ReadyState::Closed);
            self.shared.publish(&core, [event]);
        }
        tracing::info!(epoch, "connection manager shut down");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(session) = self.shared.lock().session.take() {
            session.token.cancel();
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
