use crate::client::BusClient;
use crate::connection::ConnectionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Decides whether, and how long after, to retry a lost connection.
///
/// `attempt` counts consecutive failures and starts at 1.
pub trait ReconnectPolicy: Send + Sync + 'static {
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectPolicy for NoReconnect {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Doubling delay, capped, with an optional attempt limit.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|limit| attempt > limit) {
            return None;
        }
        let mut delay = self.initial;
        for _ in 1..attempt {
            delay = delay.saturating_mul(2);
            if delay >= self.max {
                return Some(self.max);
            }
        }
        Some(delay.min(self.max))
    }
}

/// Spawns a task that calls [`BusClient::connect`] again whenever the
/// connection drops, as long as `policy` allows.
///
/// The task does not make the first connection; it only reacts to
/// `Disconnected` transitions after it starts. It exits when the policy gives
/// up or the client is dropped.
pub fn spawn_supervisor<P: ReconnectPolicy>(
    client: Arc<BusClient>,
    policy: P,
) -> JoinHandle<()> {
    let mut state_rx = client.subscribe_state();
    let weak = Arc::downgrade(&client);
    drop(client);
    tokio::spawn(async move {
        let mut attempt = 0u32;
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow_and_update();
            if state == ConnectionState::Connected {
                attempt = 0;
                continue;
            }
            attempt = attempt.saturating_add(1);
            let Some(delay) = policy.next_delay(attempt) else {
                warn!(event = "mqtt_reconnect_exhausted", attempt);
                break;
            };
            info!(
                event = "mqtt_reconnect_scheduled",
                attempt,
                delay_ms = delay.as_millis() as u64
            );
            tokio::time::sleep(delay).await;
            let Some(client) = weak.upgrade() else {
                break;
            };
            if client.is_connected() {
                attempt = 0;
                continue;
            }
            // Handle dropped on purpose; the event loop reports through state.
            let _ = client.connect();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ExponentialBackoff::default();
        let delays: Vec<u64> = (1..=6)
            .map(|attempt| policy.next_delay(attempt).expect("delay").as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
        assert_eq!(policy.next_delay(10_000), Some(Duration::from_secs(10)));
    }

    #[test]
    fn backoff_respects_attempt_limit() {
        let policy = ExponentialBackoff {
            max_attempts: Some(2),
            ..ExponentialBackoff::default()
        };
        assert!(policy.next_delay(2).is_some());
        assert!(policy.next_delay(3).is_none());
    }

    #[test]
    fn no_reconnect_never_retries() {
        assert!(NoReconnect.next_delay(1).is_none());
    }
}
