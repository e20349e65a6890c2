//! Readiness polling between dependency tiers.
//!
//! After a tier is submitted, each of its tables is polled until it holds
//! at least as many entries as were submitted. Polls back off
//! exponentially up to a cap and give up at a deadline with
//! [`DashPerfError::ReadinessTimeout`].

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SettleConfig;
use crate::error::{DashPerfError, DashPerfResult};
use crate::tables::DashTable;

/// APPL_DB database number.
pub const APPL_DB_ID: u8 = 0;

/// Keys requested per SCAN round trip.
const SCAN_BATCH: usize = 1000;

/// Reports how many entries a table currently holds on the device.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn entry_count(&self, table: DashTable) -> DashPerfResult<usize>;
}

/// Poll schedule: `initial`, doubling up to `max`, bounded by `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub timeout: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration, timeout: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            timeout,
        }
    }

    /// Interval following `current`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

impl From<&SettleConfig> for BackoffPolicy {
    fn from(settle: &SettleConfig) -> Self {
        Self::new(
            settle.poll_initial_interval(),
            settle.poll_max_interval(),
            settle.readiness_timeout(),
        )
    }
}

/// Polls `table` until it holds at least `expected` entries.
///
/// Returns the time spent waiting. Retryable probe errors count as an
/// unsuccessful poll; other probe errors abort the wait.
pub async fn wait_for_entries(
    probe: &dyn ReadinessProbe,
    table: DashTable,
    expected: usize,
    policy: &BackoffPolicy,
) -> DashPerfResult<Duration> {
    poll_until(probe, table, expected, policy, |observed| observed >= expected).await
}

/// Polls `table` until it holds no entries.
pub async fn wait_for_drain(
    probe: &dyn ReadinessProbe,
    table: DashTable,
    policy: &BackoffPolicy,
) -> DashPerfResult<Duration> {
    poll_until(probe, table, 0, policy, |observed| observed == 0).await
}

async fn poll_until<F>(
    probe: &dyn ReadinessProbe,
    table: DashTable,
    expected: usize,
    policy: &BackoffPolicy,
    done: F,
) -> DashPerfResult<Duration>
where
    F: Fn(usize) -> bool + Send,
{
    let start = Instant::now();
    let mut interval = policy.initial;
    let mut observed = None;
    let mut polls = 0u32;

    loop {
        polls += 1;
        match probe.entry_count(table).await {
            Ok(count) => observed = Some(count),
            Err(e) if e.is_retryable() => {
                warn!(table = %table, error = %e, "Readiness probe failed, will retry");
            }
            Err(e) => return Err(e),
        }

        let waited = start.elapsed();
        if observed.is_some_and(&done) {
            info!(
                table = %table,
                expected,
                observed = observed.unwrap_or(0),
                polls,
                waited_ms = waited.as_millis() as u64,
                "Table ready"
            );
            return Ok(waited);
        }

        if waited >= policy.timeout {
            return Err(DashPerfError::ReadinessTimeout {
                table,
                expected,
                observed: observed.unwrap_or(0),
                waited,
            });
        }

        debug!(table = %table, expected, ?observed, ?interval, "Table not ready");
        let remaining = policy.timeout - waited;
        tokio::time::sleep(interval.min(remaining)).await;
        interval = policy.next_interval(interval);
    }
}

/// Counts `<TABLE>:*` keys in APPL_DB.
#[derive(Clone)]
pub struct RedisReadinessProbe {
    connection: ConnectionManager,
}

impl RedisReadinessProbe {
    /// Connects to APPL_DB on `host:port`.
    pub async fn connect(host: &str, port: u16) -> DashPerfResult<Self> {
        let uri = appl_db_uri(host, port);
        let client = redis::Client::open(uri.as_str())
            .map_err(|e| DashPerfError::database("connect", format!("{}: {}", uri, e)))?;
        let connection = client.get_connection_manager().await.map_err(|e| {
            DashPerfError::database("connect", format!("{}: {}", uri, e))
        })?;
        info!("Connected to APPL_DB at {}", uri);
        Ok(Self { connection })
    }
}

#[async_trait]
impl ReadinessProbe for RedisReadinessProbe {
    async fn entry_count(&self, table: DashTable) -> DashPerfResult<usize> {
        let mut conn = self.connection.clone();
        let pattern = key_pattern(table);
        let mut cursor: u64 = 0;
        let mut count = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| DashPerfError::database("scan", e.to_string()))?;
            count += keys.len();
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(count)
    }
}

fn appl_db_uri(host: &str, port: u16) -> String {
    format!("redis://{}:{}/{}", host, port, APPL_DB_ID)
}

fn key_pattern(table: DashTable) -> String {
    format!("{}:*", table.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns queued counts in order, repeating the last one.
    struct ScriptedProbe {
        counts: Mutex<Vec<DashPerfResult<usize>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProbe {
        fn new(counts: Vec<DashPerfResult<usize>>) -> Self {
            Self {
                counts: Mutex::new(counts),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReadinessProbe for ScriptedProbe {
        async fn entry_count(&self, _table: DashTable) -> DashPerfResult<usize> {
            *self.calls.lock().unwrap() += 1;
            let mut counts = self.counts.lock().unwrap();
            if counts.len() > 1 {
                counts.remove(0)
            } else {
                match &counts[0] {
                    Ok(n) => Ok(*n),
                    Err(_) => Err(DashPerfError::database("scan", "down")),
                }
            }
        }
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(100),
            Duration::from_millis(400),
            Duration::from_secs(2),
        )
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let p = policy();
        let mut interval = p.initial;
        let mut seen = vec![];
        for _ in 0..5 {
            seen.push(interval.as_millis());
            interval = p.next_interval(interval);
        }
        assert_eq!(seen, vec![100, 200, 400, 400, 400]);
    }

    #[test]
    fn test_backoff_from_settle_config() {
        let p = BackoffPolicy::from(&SettleConfig::default());
        assert_eq!(p.initial, Duration::from_millis(100));
        assert_eq!(p.max, Duration::from_millis(2000));
        assert_eq!(p.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_key_pattern_and_uri() {
        assert_eq!(key_pattern(DashTable::Route), "DASH_ROUTE_TABLE:*");
        assert_eq!(appl_db_uri("127.0.0.1", 6379), "redis://127.0.0.1:6379/0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_immediately() {
        let probe = ScriptedProbe::new(vec![Ok(10)]);
        let waited = wait_for_entries(&probe, DashTable::Vnet, 10, &policy())
            .await
            .unwrap();
        assert_eq!(waited, Duration::ZERO);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_backoff() {
        let probe = ScriptedProbe::new(vec![Ok(0), Ok(3), Ok(7), Ok(10)]);
        let waited = wait_for_entries(&probe, DashTable::Route, 10, &policy())
            .await
            .unwrap();
        // 100 + 200 + 400
        assert!(waited >= Duration::from_millis(700));
        assert!(waited < Duration::from_millis(710));
        assert_eq!(probe.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_probe_error_keeps_polling() {
        let probe = ScriptedProbe::new(vec![
            Err(DashPerfError::database("scan", "loading")),
            Ok(5),
        ]);
        wait_for_entries(&probe, DashTable::Eni, 5, &policy())
            .await
            .unwrap();
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_observation() {
        let probe = ScriptedProbe::new(vec![Ok(4)]);
        let err = wait_for_entries(&probe, DashTable::VnetMapping, 9, &policy())
            .await
            .unwrap_err();
        match err {
            DashPerfError::ReadinessTimeout {
                table,
                expected,
                observed,
                waited,
            } => {
                assert_eq!(table, DashTable::VnetMapping);
                assert_eq!(expected, 9);
                assert_eq!(observed, 4);
                assert!(waited >= Duration::from_secs(2));
            }
            other => panic!("Expected ReadinessTimeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain() {
        let probe = ScriptedProbe::new(vec![Ok(8), Ok(2), Ok(0)]);
        wait_for_drain(&probe, DashTable::Route, &policy())
            .await
            .unwrap();
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_not_satisfied_by_failed_probe() {
        let probe = ScriptedProbe::new(vec![Err(DashPerfError::database("scan", "down"))]);
        let err = wait_for_drain(&probe, DashTable::Route, &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, DashPerfError::ReadinessTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_aborts() {
        struct BrokenProbe;

        #[async_trait]
        impl ReadinessProbe for BrokenProbe {
            async fn entry_count(&self, _table: DashTable) -> DashPerfResult<usize> {
                Err(DashPerfError::invalid_config("probe", "bad"))
            }
        }

        let err = wait_for_entries(&BrokenProbe, DashTable::Qos, 1, &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, DashPerfError::InvalidConfig { .. }));
    }
}
