//! Process monitor: reports top-level failures and flushes on exit.
//!
//! [`Monitor::run`] wraps the service's main future. Whether the future
//! succeeds or fails, the exit hook runs first and pending crash reports are
//! flushed afterwards, bounded by the configured timeout. Failures are
//! captured before the flush and then returned to the caller unchanged.

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Env;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Environment variables consulted, in order, when no DSN is configured.
pub const KNOWN_DSN_VARIABLES: [&str; 6] = [
    "SentryDsn",
    "SENTRYDSN",
    "Sentry__Dsn",
    "SENTRY__DSN",
    "Sentry_Dsn",
    "SENTRY_DSN",
];

/// Return the value of the first DSN variable that is set.
///
/// # Examples
/// ```
/// use mockable::MockEnv;
/// use service_backend::monitor::discover_dsn;
///
/// let mut env = MockEnv::new();
/// env.expect_string()
///     .returning(|key| (key == "SENTRY_DSN").then(|| "https://k@host/1".to_owned()));
/// assert_eq!(discover_dsn(&env).as_deref(), Some("https://k@host/1"));
/// ```
pub fn discover_dsn<E: Env>(env: &E) -> Option<String> {
    KNOWN_DSN_VARIABLES
        .iter()
        .find_map(|name| env.string(name))
}

/// Failure summary handed to a [`CrashReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    /// Top-level error message.
    pub message: String,
    /// Messages of the error's `source()` chain, outermost first.
    pub causes: Vec<String>,
}

impl CrashReport {
    /// Capture an error and its source chain.
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            causes,
        }
    }
}

/// Sink for crash reports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CrashReporter: Send + Sync {
    /// Record a fatal failure.
    fn capture(&self, report: &CrashReport);

    /// Deliver pending reports. Returns `false` when the timeout elapsed
    /// first.
    async fn flush(&self, timeout: Duration) -> bool;
}

/// Reporter that writes crash reports to the tracing subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingCrashReporter {
    dsn: Option<String>,
}

impl TracingCrashReporter {
    /// Build a reporter; `dsn` is only recorded as context.
    pub fn new(dsn: Option<String>) -> Self {
        Self { dsn }
    }
}

#[async_trait]
impl CrashReporter for TracingCrashReporter {
    fn capture(&self, report: &CrashReport) {
        error!(
            message = %report.message,
            causes = ?report.causes,
            dsn_configured = self.dsn.is_some(),
            "fatal error captured"
        );
    }

    async fn flush(&self, _timeout: Duration) -> bool {
        true
    }
}

/// Runs the service future under crash reporting.
#[derive(Clone)]
pub struct Monitor {
    reporter: Arc<dyn CrashReporter>,
    flush_timeout: Duration,
}

impl Monitor {
    /// Monitor reporting through `reporter` and flushing for at most
    /// `flush_timeout` on exit.
    pub fn new(reporter: Arc<dyn CrashReporter>, flush_timeout: Duration) -> Self {
        Self {
            reporter,
            flush_timeout,
        }
    }

    /// Await `task`, then call `on_exit` with the failure (if any), capture
    /// it, and flush the reporter.
    ///
    /// # Errors
    ///
    /// Returns the task's own error unchanged.
    pub async fn run<T, E, F, X>(&self, task: F, on_exit: X) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: StdError + 'static,
        X: FnOnce(Option<&E>),
    {
        match task.await {
            Ok(value) => {
                on_exit(None);
                self.flush().await;
                Ok(value)
            }
            Err(err) => {
                on_exit(Some(&err));
                self.reporter.capture(&CrashReport::from_error(&err));
                self.flush().await;
                Err(err)
            }
        }
    }

    /// Flush the reporter, giving up after `flush_timeout` even when the
    /// reporter ignores its own deadline.
    async fn flush(&self) {
        let flushed = timeout(self.flush_timeout, self.reporter.flush(self.flush_timeout))
            .await
            .unwrap_or(false);
        if flushed {
            info!("crash reports flushed");
        } else {
            warn!(
                timeout_secs = self.flush_timeout.as_secs(),
                "crash report flush timed out"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io;

    use mockable::MockEnv;
    use mockall::Sequence;
    use rstest::rstest;

    fn env_with(vars: HashMap<&'static str, &'static str>) -> MockEnv {
        let mut env = MockEnv::new();
        env.expect_string()
            .times(0..)
            .returning(move |key| vars.get(key).map(|value| (*value).to_owned()));
        env
    }

    #[rstest]
    #[case(HashMap::new(), None)]
    #[case(HashMap::from([("SENTRY_DSN", "last")]), Some("last"))]
    #[case(HashMap::from([("SENTRY_DSN", "last"), ("SentryDsn", "first")]), Some("first"))]
    #[case(HashMap::from([("Sentry__Dsn", "middle"), ("Sentry_Dsn", "later")]), Some("middle"))]
    fn dsn_discovery_uses_the_first_known_name(
        #[case] vars: HashMap<&'static str, &'static str>,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(discover_dsn(&env_with(vars)).as_deref(), expected);
    }

    #[rstest]
    fn crash_report_collects_the_source_chain() {
        #[derive(Debug, thiserror::Error)]
        #[error("server stopped")]
        struct Stopped(#[source] io::Error);

        let report = CrashReport::from_error(&Stopped(io::Error::other("socket closed")));

        assert_eq!(report.message, "server stopped");
        assert_eq!(report.causes, vec!["socket closed".to_owned()]);
    }

    #[tokio::test]
    async fn success_runs_exit_hook_and_flushes_without_capture() {
        let mut reporter = MockCrashReporter::new();
        reporter.expect_capture().never();
        reporter.expect_flush().times(1).returning(|_| true);
        let monitor = Monitor::new(Arc::new(reporter), Duration::from_secs(1));
        let seen = RefCell::new(None);

        let result = monitor
            .run(async { Ok::<_, io::Error>(7) }, |err| {
                *seen.borrow_mut() = Some(err.is_some());
            })
            .await;

        assert_eq!(result.expect("task succeeds"), 7);
        assert_eq!(*seen.borrow(), Some(false));
    }

    struct StalledReporter;

    #[async_trait]
    impl CrashReporter for StalledReporter {
        fn capture(&self, _report: &CrashReport) {}

        async fn flush(&self, _timeout: Duration) -> bool {
            std::future::pending::<bool>().await
        }
    }

    #[tokio::test]
    async fn flush_is_bounded_even_when_the_reporter_stalls() {
        let monitor = Monitor::new(Arc::new(StalledReporter), Duration::from_millis(50));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            monitor.run(async { Err::<(), _>(io::Error::other("crashed")) }, |_| {}),
        )
        .await
        .expect("monitor returns once the flush deadline passes");

        assert_eq!(result.expect_err("task fails").to_string(), "crashed");
    }

    #[tokio::test]
    async fn failure_is_captured_flushed_and_returned() {
        let mut sequence = Sequence::new();
        let mut reporter = MockCrashReporter::new();
        reporter
            .expect_capture()
            .withf(|report| report.message == "bind failed")
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        reporter
            .expect_flush()
            .withf(|timeout| *timeout == Duration::from_secs(15))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| false);
        let monitor = Monitor::new(Arc::new(reporter), Duration::from_secs(15));
        let seen = RefCell::new(None);

        let result = monitor
            .run(
                async { Err::<(), _>(io::Error::other("bind failed")) },
                |err| *seen.borrow_mut() = err.map(ToString::to_string),
            )
            .await;

        let error = result.expect_err("task fails");
        assert_eq!(error.to_string(), "bind failed");
        assert_eq!(seen.borrow().as_deref(), Some("bind failed"));
    }
}
