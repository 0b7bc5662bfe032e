//! Guess loop controller.
//!
//! One engine owns one loop. [`Engine::start`] spawns the cycle task;
//! [`Engine::stop`] flips the shared run state and the task exits at its
//! next checkpoint, never mid submission. A refused API key is the one
//! outcome that stops the loop from the inside.

use crate::config::EngineConfig;
use crate::log::LogSink;
use crate::{mnemonic, poller};
use nutcracker_client::{OracleClient, StatsClient};
use nutcracker_types::{Credentials, EngineEvent, EngineState, LogEntry, SubmissionOutcome};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Bound on buffered engine events. A shell that stops draining loses
/// notifications, not engine progress; the log buffer keeps every line.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum StartError {
    /// The configured API key is blank; the loop will not start.
    #[error("no API key configured")]
    MissingApiKey,
    /// A previous loop task is still alive, possibly draining an in-flight
    /// submission after a stop.
    #[error("guess loop is already running")]
    AlreadyRunning,
}

/// State shared between the engine handle and its spawned tasks.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: EngineConfig,
    pub(crate) credentials: Credentials,
    pub(crate) oracle: OracleClient,
    pub(crate) stats: StatsClient,
    state: Mutex<EngineState>,
    pub(crate) log: LogSink,
    pub(crate) events: mpsc::Sender<EngineEvent>,
}

impl Shared {
    pub(crate) fn state(&self) -> EngineState {
        *self.lock_state()
    }

    /// Transition the run state, emitting `StateChanged` only on an actual
    /// change. Returns whether the state moved.
    pub(crate) fn set_state(&self, next: EngineState) -> bool {
        let mut state = self.lock_state();
        if *state == next {
            return false;
        }
        *state = next;
        drop(state);
        if self
            .events
            .try_send(EngineEvent::StateChanged(next))
            .is_err()
        {
            tracing::debug!(state = %next, "event channel full or closed; state change not delivered");
        }
        true
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The guess engine: loop controller, log buffer, and display pollers
/// behind one handle.
///
/// All methods take `&self`; the handle is meant to sit in an `Arc` or a
/// long-lived owner while spawned tasks hold the shared core.
#[derive(Debug)]
pub struct Engine {
    shared: Arc<Shared>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Build an engine and the receiving end of its event channel.
    ///
    /// Fails only if the underlying HTTP clients cannot be constructed.
    pub fn new(
        config: EngineConfig,
        credentials: Credentials,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>), reqwest::Error> {
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let oracle = OracleClient::new(&config.oracle_url)?;
        let stats = StatsClient::new(&config.stats_url)?;
        let log = LogSink::new(events.clone());
        let shared = Arc::new(Shared {
            config,
            credentials,
            oracle,
            stats,
            state: Mutex::new(EngineState::Stopped),
            log,
            events,
        });
        Ok((
            Self {
                shared,
                loop_task: Mutex::new(None),
                background: Mutex::new(Vec::new()),
            },
            rx,
        ))
    }

    /// Start the guess loop. Must be called from within a Tokio runtime.
    ///
    /// Refused while a previous loop task is still alive, which covers both
    /// a running loop and one draining its last submission after a stop.
    pub fn start(&self) -> Result<(), StartError> {
        if !self.shared.credentials.has_api_key() {
            return Err(StartError::MissingApiKey);
        }

        let mut slot = self.lock_loop_task();
        if let Some(task) = slot.as_ref()
            && !task.is_finished()
        {
            return Err(StartError::AlreadyRunning);
        }

        self.shared.set_state(EngineState::Running);
        self.shared.log.append("Guessing started");
        *slot = Some(tokio::spawn(run_loop(Arc::clone(&self.shared))));
        tracing::info!("guess loop started");
        Ok(())
    }

    /// Request a stop. Returns immediately; the loop task exits at its next
    /// checkpoint and an in-flight submission always runs to completion.
    /// Stopping an already stopped engine does nothing.
    pub fn stop(&self) {
        if self.shared.set_state(EngineState::Stopped) {
            self.shared.log.append("Guessing stopped");
            tracing::info!("guess loop stop requested");
        }
    }

    /// Wait for the loop task to wind down. Returns immediately when no
    /// loop has ever run. Does not request the stop itself; pair with
    /// [`Engine::stop`].
    pub async fn wait_until_stopped(&self) {
        loop {
            let finished = self
                .lock_loop_task()
                .as_ref()
                .is_none_or(|task| task.is_finished());
            if finished {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Spawn the log retention sweep and the display pollers. Safe to call
    /// once per engine; later calls do nothing.
    ///
    /// The wallet poller only runs when a wallet address is configured.
    pub fn spawn_background(&self) {
        let mut background = self.lock_background();
        if !background.is_empty() {
            return;
        }
        background.push(
            self.shared
                .log
                .spawn_retention(self.shared.config.log_retention),
        );
        background.push(tokio::spawn(poller::poll_latest_box(Arc::clone(
            &self.shared,
        ))));
        if let Some(address) = self.shared.credentials.wallet_address.clone() {
            background.push(tokio::spawn(poller::poll_wallet_stats(
                Arc::clone(&self.shared),
                address,
            )));
        }
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Snapshot of the engine log, oldest entry first.
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.shared.log.snapshot()
    }

    /// Clear the engine log now, independent of the retention sweep.
    pub fn clear_logs(&self) {
        self.shared.log.clear();
    }

    /// Read-only explorer client, shared with the display pollers.
    #[must_use]
    pub fn stats(&self) -> &StatsClient {
        &self.shared.stats
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.shared.credentials
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    fn lock_loop_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.loop_task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_background(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Pollers and the retention sweep are pure readers and safe to
        // abort. The guess loop is not aborted; it observes the stopped
        // state and winds down on its own.
        for task in self.lock_background().drain(..) {
            task.abort();
        }
        self.shared.set_state(EngineState::Stopped);
    }
}

/// One generate, submit, log, delay cycle per iteration.
///
/// Stop checkpoints sit before generation and before the delay, so a stop
/// request never interrupts a submission and never waits out a full delay
/// once the cycle's work is done.
async fn run_loop(shared: Arc<Shared>) {
    loop {
        if !shared.state().is_running() {
            break;
        }

        match mnemonic::generate_batch(shared.config.batch_size) {
            Ok(batch) => {
                shared
                    .log
                    .append(format!("🔑️ Generated {} guesses", batch.len()));
                shared.log.append("➡️ Submitting to oracle");

                let outcome = shared
                    .oracle
                    .submit_guesses(&batch, &shared.credentials.api_key)
                    .await;
                match outcome {
                    SubmissionOutcome::Accepted => {
                        shared.log.append("✅ Guesses accepted");
                    }
                    SubmissionOutcome::Rejected { status, body } => {
                        shared
                            .log
                            .append(format!("❌ Guesses rejected ({status}): {body}"));
                    }
                    SubmissionOutcome::TransportError(cause) => {
                        shared.log.append(format!("⚠️ Error occurred: {cause}"));
                    }
                    SubmissionOutcome::AuthFailed => {
                        shared
                            .log
                            .append("⚠️ Error occurred: oracle rejected the API key (401)");
                        tracing::warn!("authentication failed; stopping guess loop");
                        shared.set_state(EngineState::Stopped);
                        break;
                    }
                }
            }
            Err(err) => {
                // A failed batch aborts this cycle only; the loop itself
                // stays up and tries again after the normal delay.
                shared
                    .log
                    .append(format!("⚠️ Error generating guesses: {err}"));
            }
        }

        if !shared.state().is_running() {
            break;
        }
        tokio::time::sleep(shared.config.cycle_delay).await;
    }
    tracing::debug!("guess loop exited");
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine_against(server_uri: &str, key: &str) -> (Engine, mpsc::Receiver<EngineEvent>) {
        let config = EngineConfig {
            oracle_url: server_uri.to_string(),
            // Loop tests generate no stats traffic; the address only has to parse.
            stats_url: "http://127.0.0.1:1".to_string(),
            batch_size: 50,
            cycle_delay: Duration::from_millis(40),
            log_retention: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(900),
        };
        Engine::new(config, Credentials::new(key, None)).unwrap()
    }

    fn messages(engine: &Engine) -> Vec<String> {
        engine
            .logs()
            .into_iter()
            .map(|entry| entry.message)
            .collect()
    }

    #[test]
    fn accessors_reflect_the_engine_configuration() {
        let (engine, _events) = engine_against("http://oracle.test", "good-key");
        assert_eq!(engine.config().batch_size, 50);
        assert!(engine.credentials().has_api_key());
        assert_eq!(engine.stats().base_url(), "http://127.0.0.1:1");
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn start_is_rejected_without_an_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit_guesses"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&server)
            .await;

        let (engine, mut events) = engine_against(&server.uri(), "   ");
        assert!(matches!(engine.start(), Err(StartError::MissingApiKey)));
        assert_eq!(engine.state(), EngineState::Stopped);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(events.try_recv().is_err(), "a refused start emits nothing");
    }

    #[tokio::test]
    async fn running_loop_generates_submits_and_logs_each_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit_guesses"))
            .and(header("x-api-key", "good-key"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let (engine, mut events) = engine_against(&server.uri(), "good-key");
        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        engine.stop();

        let messages = messages(&engine);
        assert!(messages.iter().any(|m| m == "Guessing started"));
        assert!(messages.iter().any(|m| m.contains("Generated 50 guesses")));
        assert!(messages.iter().any(|m| m == "➡️ Submitting to oracle"));
        let accepted = messages
            .iter()
            .filter(|m| *m == "✅ Guesses accepted")
            .count();
        assert!(accepted >= 2, "expected repeat cycles, saw {accepted}");
        assert!(messages.iter().any(|m| m == "Guessing stopped"));

        match events.recv().await {
            Some(EngineEvent::StateChanged(EngineState::Running)) => {}
            other => panic!("expected a Running state change first, got {other:?}"),
        }

        engine.clear_logs();
        assert!(engine.logs().is_empty());
    }

    #[tokio::test]
    async fn auth_failure_forces_a_stop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit_guesses"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (engine, mut events) = engine_against(&server.uri(), "revoked-key");
        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(engine.state(), EngineState::Stopped);
        let messages = messages(&engine);
        assert!(messages.iter().any(|m| m.contains("401")));
        assert!(
            !messages.iter().any(|m| m == "Guessing stopped"),
            "a forced stop is not a user stop"
        );

        let mut saw_running = false;
        let mut saw_stopped = false;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::StateChanged(state) = event {
                match state {
                    EngineState::Running => saw_running = true,
                    EngineState::Stopped => saw_stopped = true,
                }
            }
        }
        assert!(saw_running, "missing Running state change");
        assert!(saw_stopped, "missing forced Stopped state change");
    }

    #[tokio::test]
    async fn stop_lets_an_inflight_submission_finish() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit_guesses"))
            .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;

        let (engine, _events) = engine_against(&server.uri(), "good-key");
        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(
            messages(&engine).iter().any(|m| m == "✅ Guesses accepted"),
            "in-flight submission should run to completion"
        );
    }

    #[tokio::test]
    async fn start_while_running_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit_guesses"))
            .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_millis(100)))
            .expect(1)
            .mount(&server)
            .await;

        let (engine, _events) = engine_against(&server.uri(), "good-key");
        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(StartError::AlreadyRunning)));

        // Let the first cycle get its submission in flight before stopping,
        // then let it drain so the mock sees exactly one request.
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.stop();
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    #[tokio::test]
    async fn restart_waits_for_the_previous_loop_to_drain() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit_guesses"))
            .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_millis(200)))
            .expect(2)
            .mount(&server)
            .await;

        let (engine, _events) = engine_against(&server.uri(), "good-key");
        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        engine.stop();

        // The old task is still draining its submission, so a restart is
        // refused rather than allowed to overlap it.
        assert!(matches!(engine.start(), Err(StartError::AlreadyRunning)));

        tokio::time::sleep(Duration::from_millis(400)).await;
        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        engine.stop();
        tokio::time::sleep(Duration::from_millis(400)).await;
    }

    #[tokio::test]
    async fn stop_during_the_delay_prevents_another_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit_guesses"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        // A long delay so the stop lands while the loop sleeps between
        // cycles rather than mid submission.
        let config = EngineConfig {
            oracle_url: server.uri(),
            stats_url: "http://127.0.0.1:1".to_string(),
            batch_size: 50,
            cycle_delay: Duration::from_secs(10),
            log_retention: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(900),
        };
        let (engine, _events) =
            Engine::new(config, Credentials::new("good-key", None)).unwrap();
        engine.start().unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        engine.stop();
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(engine.state(), EngineState::Stopped);
        let messages = messages(&engine);
        assert!(messages.iter().any(|m| m == "✅ Guesses accepted"));
        assert!(messages.iter().any(|m| m == "Guessing stopped"));
    }

    #[tokio::test]
    async fn auth_failure_stop_leaves_the_engine_restartable() {
        let server = MockServer::start().await;
        // The first submission is refused; the key works after that, as
        // when a rotated key is deployed server-side.
        Mock::given(method("POST"))
            .and(path("/submit_guesses"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/submit_guesses"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1..)
            .mount(&server)
            .await;

        let (engine, _events) = engine_against(&server.uri(), "rotated-key");
        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(engine.state(), EngineState::Stopped);

        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        engine.stop();

        let messages = messages(&engine);
        assert!(messages.iter().any(|m| m.contains("401")));
        assert!(messages.iter().any(|m| m == "✅ Guesses accepted"));
        let started = messages.iter().filter(|m| *m == "Guessing started").count();
        assert_eq!(started, 2, "both starts should be logged");
    }
}
