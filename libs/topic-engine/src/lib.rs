//! Живое состояние потока телеметрии.
//!
//! - [`TopicCache`]: последняя запись на topic + latest slot;
//! - [`RateEstimator`]: скользящее окно 1 s и счётчик сообщений.
//!
//! Оба типа синхронные и без внутренней блокировки: единственный
//! писатель: connection manager, который держит их под своим lock'ом.

mod cache;
mod rate;

pub use cache::{TopicCache, TopicMap, TopicSnapshot};
pub use rate::{DEFAULT_TICK, RATE_WINDOW, RateEstimator};
