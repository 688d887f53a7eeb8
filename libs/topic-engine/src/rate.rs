use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Ширина окна: сообщений за последнюю секунду.
pub const RATE_WINDOW: Duration = Duration::from_millis(1000);

/// Период фонового пересчёта, чтобы rate падал и в тишине.
pub const DEFAULT_TICK: Duration = Duration::from_millis(200);

/// Скользящий счётчик сообщений.
///
/// После `recompute(now)` в окне остаются только моменты из
/// `(now - 1s, now]`; `rate()`: их количество.
#[derive(Debug, Default)]
pub struct RateEstimator {
    instants: VecDeque<Instant>,
    count: u64,
    rate: usize,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Учесть сообщение и сразу пересчитать окно.
    pub fn record(&mut self, now: Instant) -> usize {
        self.instants.push_back(now);
        self.count += 1;
        self.recompute(now)
    }

    pub fn recompute(&mut self, now: Instant) -> usize {
        while let Some(&oldest) = self.instants.front() {
            if now.saturating_duration_since(oldest) < RATE_WINDOW {
                break;
            }
            self.instants.pop_front();
        }
        self.rate = self.instants.len();
        self.rate
    }

    /// Сообщений в окне на момент последнего пересчёта.
    pub fn rate(&self) -> usize {
        self.rate
    }

    /// Успешно декодированных сообщений с последнего `reset()`.
    pub fn message_count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        self.instants.clear();
        self.count = 0;
        self.rate = 0;
    }
}

#[cfg(test)]
#[path = "rate_test.rs"]
mod tests;
