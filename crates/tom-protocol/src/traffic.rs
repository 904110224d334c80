//! Poisson traffic source.
//!
//! Originates one DATA event per exponentially distributed interval with a
//! word picked uniformly from the dictionary. Not part of the ordering
//! core, but its cadence is what keeps every `lastSeen` slot moving.
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::error::TomProtocolError;
use crate::runtime::RuntimeHandle;

/// Shortest gap between two generated events.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct TrafficConfig {
    /// Mean events per second (λ).
    pub rate_per_sec: f64,
    /// Wait before the first event so the other members can start listening.
    pub startup_delay: Duration,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 1.0,
            startup_delay: Duration::from_millis(1500),
        }
    }
}

impl TrafficConfig {
    pub fn validate(&self) -> Result<(), TomProtocolError> {
        if !self.rate_per_sec.is_finite() || self.rate_per_sec <= 0.0 {
            return Err(TomProtocolError::Config(format!(
                "traffic rate must be positive, got {}",
                self.rate_per_sec
            )));
        }
        Ok(())
    }
}

pub struct TrafficSource {
    words: Vec<String>,
    config: TrafficConfig,
}

impl TrafficSource {
    pub fn new(words: Vec<String>, config: TrafficConfig) -> Result<Self, TomProtocolError> {
        config.validate()?;
        if words.is_empty() {
            return Err(TomProtocolError::Config("word list is empty".into()));
        }
        Ok(Self { words, config })
    }

    /// Draw the next inter-arrival time: `-ln(1 - U) / λ`, at least 1 ms.
    pub fn next_interval<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let u: f64 = rng.random();
        let secs = -(1.0 - u).ln() / self.config.rate_per_sec;
        Duration::try_from_secs_f64(secs)
            .unwrap_or(Duration::MAX)
            .max(MIN_INTERVAL)
    }

    pub fn pick_word<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.words[rng.random_range(0..self.words.len())]
    }

    /// Generate events until `cancel` fires or the runtime goes away.
    pub async fn run(self, handle: RuntimeHandle, cancel: CancellationToken) {
        let mut rng = StdRng::from_os_rng();

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.config.startup_delay) => {}
        }
        tracing::info!(
            node = %handle.local_id(),
            rate = self.config.rate_per_sec,
            "traffic source started"
        );

        loop {
            let wait = self.next_interval(&mut rng);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            let word = self.pick_word(&mut rng).to_owned();
            if let Err(e) = handle.originate(word).await {
                tracing::debug!("traffic source stopping: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(rate: f64) -> TrafficSource {
        let config = TrafficConfig {
            rate_per_sec: rate,
            ..TrafficConfig::default()
        };
        TrafficSource::new(vec!["alfa".into(), "bravo".into()], config).unwrap()
    }

    #[test]
    fn mean_interval_tracks_rate() {
        let src = source(10.0);
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let total: f64 = (0..n).map(|_| src.next_interval(&mut rng).as_secs_f64()).sum();
        let mean = total / n as f64;
        assert!((mean - 0.1).abs() < 0.01, "mean interval {mean}");
    }

    #[test]
    fn interval_has_a_floor() {
        let src = source(1e9);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(src.next_interval(&mut rng) >= MIN_INTERVAL);
        }
    }

    #[test]
    fn words_come_from_the_list() {
        let src = source(1.0);
        let mut rng = StdRng::seed_from_u64(3);
        let picked: std::collections::HashSet<_> =
            (0..100).map(|_| src.pick_word(&mut rng).to_owned()).collect();
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn bad_config_rejected() {
        assert!(TrafficSource::new(vec![], TrafficConfig::default()).is_err());
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = TrafficConfig {
                rate_per_sec: rate,
                ..TrafficConfig::default()
            };
            assert!(TrafficSource::new(vec!["w".into()], config).is_err());
        }
    }
}
