use std::future::Future;
use std::time::{Duration, Instant};

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Closed   - calls pass through; consecutive failures are counted
// Open     - calls are refused until the cooldown elapses
// HalfOpen - one trial call decides between Closed and Open
//
// Owned by a single actor, so state is mutated through &mut self.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("operation failed: {0}")]
    OperationFailed(E),
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    phase: Phase,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            phase: Phase::Closed { failures: 0 },
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.phase {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen => CircuitState::HalfOpen,
        }
    }

    /// Run `operation` unless the circuit is open.
    pub async fn call<F, T, E>(&mut self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.admit(Instant::now()) {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match operation.await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure(Instant::now());
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    fn admit(&mut self, now: Instant) -> bool {
        match self.phase {
            Phase::Open { since } if now.duration_since(since) >= self.config.cooldown => {
                tracing::info!(breaker = self.name, "Circuit half-open, sending a trial call");
                self.phase = Phase::HalfOpen;
                true
            }
            Phase::Open { .. } => false,
            Phase::Closed { .. } | Phase::HalfOpen => true,
        }
    }

    fn on_success(&mut self) {
        if matches!(self.phase, Phase::HalfOpen) {
            tracing::info!(breaker = self.name, "✅ Circuit closed");
        }
        self.phase = Phase::Closed { failures: 0 };
    }

    fn on_failure(&mut self, now: Instant) {
        self.phase = match self.phase {
            Phase::Closed { failures } if failures + 1 < self.config.failure_threshold => {
                Phase::Closed { failures: failures + 1 }
            }
            Phase::Closed { failures } => {
                tracing::warn!(breaker = self.name, failures = failures + 1, "Circuit opened");
                Phase::Open { since: now }
            }
            Phase::HalfOpen => {
                tracing::warn!(breaker = self.name, "Trial call failed, circuit re-opened");
                Phase::Open { since: now }
            }
            open @ Phase::Open { .. } => open,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown,
            },
        )
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let mut cb = breaker(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(cb.call(async { Err::<(), _>("down") }).await.is_err());
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let result = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen)));
    }

    #[tokio::test]
    async fn test_success_resets_the_failure_count() {
        let mut cb = breaker(2, Duration::from_secs(60));

        let _ = cb.call(async { Err::<(), _>("down") }).await;
        let _ = cb.call(async { Ok::<_, &str>(()) }).await;
        let _ = cb.call(async { Err::<(), _>("down") }).await;

        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_decides() {
        let mut cb = breaker(1, Duration::from_millis(50));

        let _ = cb.call(async { Err::<(), _>("down") }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let _ = cb.call(async { Err::<(), _>("still down") }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cb.call(async { Ok::<_, &str>(7) }).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
