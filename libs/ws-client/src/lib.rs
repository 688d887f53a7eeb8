//! Клиент живого потока телеметрии.
//!
//! [`ConnectionManager`] держит одно WebSocket-соединение, декодирует
//! frame'ы (JSON и Arrow IPC), раскладывает записи по topic'ам и
//! считает rate. Наружу: snapshot'ы и события, см. [`TelemetrySnapshot`],
//! [`TelemetryEvent`].

mod config;
mod error;
mod manager;
mod session;
mod store;

pub use config::{DEFAULT_ADDRESS, DEFAULT_PORT, EndpointConfig, Scheme};
pub use error::{ClientError, ConfigError};
pub use manager::{ConnectionManager, ManagerOptions};
pub use store::{Subscription, TelemetryEvent, TelemetrySnapshot};

pub use telemetry_api::{ConnectionState, DecodeError, ReadyState, Record, TopicEntry};
