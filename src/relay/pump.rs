//! Forwarding a running summarizer's output into a response body.
//!
//! One [`Relay`] owns one child. It reads both pipes as data arrives,
//! pushes chunks into the body channel, and reaps the child at the end.
//! Dropping the sender when [`Relay::run`] returns is what ends the HTTP
//! body, so the stream is closed exactly once.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::observability::metrics;
#[cfg(unix)]
use crate::relay::command::kill_process_group;
use crate::relay::command::SpawnedChild;
use crate::relay::filter::MarkerFilter;

/// Appended to the body when the summarizer does not exit successfully.
pub const FAILURE_NOTICE: &str = "\n[Error] 분석 중 오류가 발생했습니다.";

const READ_BUF_SIZE: usize = 8 * 1024;

/// Sending half of a streamed response body.
pub type BodySender = mpsc::Sender<Result<Bytes, std::io::Error>>;

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Child exited successfully.
    Completed,
    /// Child exited with a failure status.
    ChildFailed,
    /// Client went away; the child was killed.
    Disconnected,
    /// The request deadline passed; the child was killed.
    TimedOut,
    /// The server is shutting down; the child was killed.
    Shutdown,
}

impl RelayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayOutcome::Completed => "ok",
            RelayOutcome::ChildFailed => "child_failed",
            RelayOutcome::Disconnected => "disconnected",
            RelayOutcome::TimedOut => "timed_out",
            RelayOutcome::Shutdown => "shutdown",
        }
    }
}

/// Summary of a finished relay.
#[derive(Debug)]
pub struct RelayReport {
    pub outcome: RelayOutcome,
    pub exit_status: Option<ExitStatus>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Stdout,
    Stderr,
}

impl Channel {
    fn as_str(self) -> &'static str {
        match self {
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
        }
    }
}

/// Per-request relay state.
pub struct Relay {
    request_id: String,
    filter: Arc<MarkerFilter>,
    deadline: Instant,
    kill_on_disconnect: bool,
    shutdown: broadcast::Receiver<()>,
}

impl Relay {
    pub fn new(
        request_id: impl Into<String>,
        filter: Arc<MarkerFilter>,
        timeout: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            filter,
            deadline: Instant::now() + timeout,
            kill_on_disconnect: true,
            shutdown,
        }
    }

    pub fn kill_on_disconnect(mut self, enabled: bool) -> Self {
        self.kill_on_disconnect = enabled;
        self
    }

    /// Pump the child's output into `tx` until it exits or the relay is interrupted.
    pub async fn run(mut self, spawned: SpawnedChild, tx: BodySender) -> RelayReport {
        let started = Instant::now();
        let SpawnedChild {
            mut child,
            mut stdout,
            mut stderr,
        } = spawned;
        let pid = child.id();
        metrics::child_started();

        let mut out_buf = vec![0u8; READ_BUF_SIZE];
        let mut err_buf = vec![0u8; READ_BUF_SIZE];
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut shutdown_armed = true;
        let mut client_gone = false;
        let mut interrupted = None;

        let deadline = tokio::time::sleep_until(self.deadline);
        tokio::pin!(deadline);

        'pump: while stdout_open || stderr_open {
            let (channel, read) = tokio::select! {
                read = stdout.read(&mut out_buf), if stdout_open => (Channel::Stdout, read),
                read = stderr.read(&mut err_buf), if stderr_open => (Channel::Stderr, read),
                _ = tx.closed(), if !client_gone => {
                    client_gone = true;
                    if self.kill_on_disconnect {
                        interrupted = Some(RelayOutcome::Disconnected);
                        break;
                    }
                    tracing::info!(request_id = %self.request_id, "Client disconnected, letting summarizer finish");
                    continue;
                }
                _ = &mut deadline => {
                    interrupted = Some(RelayOutcome::TimedOut);
                    break;
                }
                signal = self.shutdown.recv(), if shutdown_armed => {
                    if matches!(signal, Err(broadcast::error::RecvError::Closed)) {
                        shutdown_armed = false;
                        continue;
                    }
                    interrupted = Some(RelayOutcome::Shutdown);
                    break;
                }
            };

            let n = match read {
                Ok(0) => {
                    tracing::trace!(request_id = %self.request_id, channel = channel.as_str(), "Pipe closed");
                    match channel {
                        Channel::Stdout => stdout_open = false,
                        Channel::Stderr => stderr_open = false,
                    }
                    continue;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(request_id = %self.request_id, channel = channel.as_str(), error = %e, "Pipe read failed");
                    match channel {
                        Channel::Stdout => stdout_open = false,
                        Channel::Stderr => stderr_open = false,
                    }
                    continue;
                }
            };

            let chunk = match channel {
                Channel::Stdout => &out_buf[..n],
                Channel::Stderr => &err_buf[..n],
            };
            self.mirror(channel, chunk);

            let forward = match channel {
                Channel::Stdout => true,
                Channel::Stderr => self.filter.should_forward(chunk),
            };
            if !forward {
                metrics::record_suppressed_chunk();
                continue;
            }
            if client_gone {
                continue;
            }

            // A client that stops reading fills the channel; the deadline and
            // shutdown must still fire while we wait for room.
            let permit = loop {
                tokio::select! {
                    permit = tx.reserve() => break permit,
                    _ = &mut deadline => {
                        interrupted = Some(RelayOutcome::TimedOut);
                        break 'pump;
                    }
                    signal = self.shutdown.recv(), if shutdown_armed => {
                        if matches!(signal, Err(broadcast::error::RecvError::Closed)) {
                            shutdown_armed = false;
                            continue;
                        }
                        interrupted = Some(RelayOutcome::Shutdown);
                        break 'pump;
                    }
                }
            };

            match permit {
                Ok(permit) => {
                    permit.send(Ok(Bytes::copy_from_slice(chunk)));
                    metrics::record_forwarded(channel.as_str(), n);
                }
                Err(_) => {
                    client_gone = true;
                    if self.kill_on_disconnect {
                        interrupted = Some(RelayOutcome::Disconnected);
                        break;
                    }
                }
            }
        }

        if let Some(reason) = interrupted {
            tracing::warn!(
                request_id = %self.request_id,
                pid = ?pid,
                reason = reason.as_str(),
                "Killing summarizer"
            );
            #[cfg(unix)]
            if let Some(pid) = pid {
                if let Err(e) = kill_process_group(pid) {
                    tracing::debug!(request_id = %self.request_id, pid, error = %e, "Failed to signal summarizer process group");
                }
            }
            if let Err(e) = child.kill().await {
                tracing::warn!(request_id = %self.request_id, error = %e, "Failed to kill summarizer");
            }
        }

        let exit_status = match child.wait().await {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::error!(request_id = %self.request_id, error = %e, "Failed to reap summarizer");
                None
            }
        };
        let elapsed = started.elapsed();
        let succeeded = exit_status.is_some_and(|s| s.success());

        tracing::info!(
            request_id = %self.request_id,
            pid = ?pid,
            exit_code = ?exit_status.and_then(|s| s.code()),
            elapsed_ms = elapsed.as_millis() as u64,
            "Summarizer finished in {:.2}s",
            elapsed.as_secs_f64()
        );

        let outcome = match interrupted {
            Some(reason) => reason,
            None if succeeded => RelayOutcome::Completed,
            None => RelayOutcome::ChildFailed,
        };

        if !succeeded && !client_gone {
            if let Err(e) = tx.try_send(Ok(Bytes::from_static(FAILURE_NOTICE.as_bytes()))) {
                tracing::debug!(request_id = %self.request_id, error = %e, "Failure notice not delivered");
            }
        }

        metrics::child_finished(outcome.as_str(), elapsed);

        RelayReport {
            outcome,
            exit_status,
            elapsed,
        }
    }

    fn mirror(&self, channel: Channel, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);
        match channel {
            Channel::Stdout => {
                tracing::info!(target: "summarizer::stdout", request_id = %self.request_id, "{}", text.trim_end())
            }
            Channel::Stderr => {
                tracing::info!(target: "summarizer::stderr", request_id = %self.request_id, "{}", text.trim_end())
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::SummarizerConfig;
    use crate::relay::command::SummarizerCommand;

    fn sh(script: &str) -> SummarizerCommand {
        SummarizerCommand::new(SummarizerConfig {
            program: "sh".into(),
            args: vec!["-c".into(), script.into(), "summarizer".into()],
            ..SummarizerConfig::default()
        })
    }

    async fn relay_with(
        script: &str,
        timeout: Duration,
    ) -> (String, RelayReport) {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let relay = Relay::new("test", Arc::new(MarkerFilter::default()), timeout, shutdown_rx);
        let spawned = sh(script).spawn("http://example.com").unwrap();
        let (tx, mut rx) = mpsc::channel(16);

        let task = tokio::spawn(relay.run(spawned, tx));
        let mut body = Vec::new();
        while let Some(chunk) = rx.recv().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        let report = task.await.unwrap();
        (String::from_utf8(body).unwrap(), report)
    }

    #[tokio::test]
    async fn suppresses_unmarked_stderr_on_success() {
        let (body, report) = relay_with(
            "printf 'Analyzing...\\n' >&2; printf 'Summary: done\\n'",
            Duration::from_secs(10),
        )
        .await;

        assert_eq!(body, "Summary: done\n");
        assert_eq!(report.outcome, RelayOutcome::Completed);
        assert!(report.exit_status.unwrap().success());
    }

    #[tokio::test]
    async fn marked_stderr_and_failure_notice() {
        let (body, report) =
            relay_with("printf 'Fatal: timeout\\n' >&2; exit 1", Duration::from_secs(10)).await;

        assert_eq!(body, format!("Fatal: timeout\n{FAILURE_NOTICE}"));
        assert_eq!(report.outcome, RelayOutcome::ChildFailed);
        assert_eq!(report.exit_status.unwrap().code(), Some(1));
    }

    #[tokio::test]
    async fn url_is_passed_as_argument() {
        let (body, _) = relay_with("printf '%s' \"$1\"", Duration::from_secs(10)).await;
        assert_eq!(body, "http://example.com");
    }

    #[tokio::test]
    async fn stdout_order_is_preserved() {
        let (body, _) = relay_with(
            "for i in 1 2 3 4 5; do printf \"line $i\\n\"; sleep 0.05; done",
            Duration::from_secs(10),
        )
        .await;
        assert_eq!(body, "line 1\nline 2\nline 3\nline 4\nline 5\n");
    }

    #[tokio::test]
    async fn deadline_kills_child_and_reports_failure() {
        let started = std::time::Instant::now();
        let (body, report) =
            relay_with("printf 'hi\\n'; exec sleep 30", Duration::from_millis(500)).await;

        assert_eq!(report.outcome, RelayOutcome::TimedOut);
        assert_eq!(body, format!("hi\n{FAILURE_NOTICE}"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn dropped_receiver_kills_child() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let relay = Relay::new(
            "test",
            Arc::new(MarkerFilter::default()),
            Duration::from_secs(30),
            shutdown_rx,
        );
        let spawned = sh("while true; do printf 'tick\\n'; sleep 0.1; done")
            .spawn("u")
            .unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let task = tokio::spawn(relay.run(spawned, tx));

        assert!(rx.recv().await.is_some());
        drop(rx);

        let report = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.outcome, RelayOutcome::Disconnected);
    }

    #[tokio::test]
    async fn shutdown_signal_kills_child() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let relay = Relay::new(
            "test",
            Arc::new(MarkerFilter::default()),
            Duration::from_secs(30),
            shutdown_rx,
        );
        let spawned = sh("printf 'started\\n'; exec sleep 30").spawn("u").unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let task = tokio::spawn(relay.run(spawned, tx));

        assert_eq!(rx.recv().await.unwrap().unwrap(), Bytes::from_static(b"started\n"));
        shutdown_tx.send(()).unwrap();

        let report = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.outcome, RelayOutcome::Shutdown);
    }

    #[tokio::test]
    async fn deadline_fires_while_client_stops_reading() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let relay = Relay::new(
            "test",
            Arc::new(MarkerFilter::default()),
            Duration::from_millis(500),
            shutdown_rx,
        );
        let spawned = sh("while true; do printf 'x\\n'; sleep 0.01; done")
            .spawn("u")
            .unwrap();
        // Held but never read: the channel stays full.
        let (tx, _rx) = mpsc::channel(1);
        let task = tokio::spawn(relay.run(spawned, tx));

        let report = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("relay must give up at its deadline even with a full body channel")
            .unwrap();
        assert_eq!(report.outcome, RelayOutcome::TimedOut);
        assert!(report.exit_status.is_some());
    }

    #[tokio::test]
    async fn shutdown_fires_while_client_stops_reading() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let relay = Relay::new(
            "test",
            Arc::new(MarkerFilter::default()),
            Duration::from_secs(30),
            shutdown_rx,
        );
        let spawned = sh("while true; do printf 'x\\n'; sleep 0.01; done")
            .spawn("u")
            .unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let task = tokio::spawn(relay.run(spawned, tx));

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(()).unwrap();

        let report = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.outcome, RelayOutcome::Shutdown);
    }

    #[tokio::test]
    async fn disconnect_without_kill_lets_child_finish() {
        let dir = tempfile::tempdir().unwrap();
        let finished = dir.path().join("finished");

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let relay = Relay::new(
            "test",
            Arc::new(MarkerFilter::default()),
            Duration::from_secs(30),
            shutdown_rx,
        )
        .kill_on_disconnect(false);
        let spawned = sh("printf 'one\\n'; sleep 0.3; printf 'two\\n'; touch \"$1\"")
            .spawn(&finished.display().to_string())
            .unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let task = tokio::spawn(relay.run(spawned, tx));

        assert_eq!(rx.recv().await.unwrap().unwrap(), Bytes::from_static(b"one\n"));
        drop(rx);

        let report = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.outcome, RelayOutcome::Completed);
        assert!(report.exit_status.unwrap().success());
        assert!(finished.exists(), "summarizer should have run to completion");
    }

    /// Linux: a killed process may linger as a zombie until its parent reaps it.
    #[cfg(target_os = "linux")]
    fn process_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(") ")
                .and_then(|(_, rest)| rest.chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn deadline_kills_grandchildren() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let relay = Relay::new(
            "test",
            Arc::new(MarkerFilter::default()),
            Duration::from_millis(500),
            shutdown_rx,
        );
        let spawned = sh("sleep 30 & printf '%s\\n' $!; wait").spawn("u").unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let task = tokio::spawn(relay.run(spawned, tx));

        let first = rx.recv().await.unwrap().unwrap();
        let grandchild: u32 = String::from_utf8_lossy(&first)
            .lines()
            .next()
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(process_running(grandchild));

        let report = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.outcome, RelayOutcome::TimedOut);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while process_running(grandchild) {
            assert!(std::time::Instant::now() < deadline, "grandchild {grandchild} survived");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
