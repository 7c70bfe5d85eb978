use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::clients::RemoteEngine;

use super::error::RunError;
use super::state::{GenerationTiming, RunEvent, RunState};

/// What one model contributes to a `ModelStore`: its parameters, how to check
/// them, and how to turn them into a decoded output through the engine.
#[async_trait]
pub trait ModelTask: Send + Sync + 'static {
    type Params: Clone + Default + Debug + Serialize + Send + Sync + 'static;
    type Output: Clone + Debug + Serialize + Send + Sync + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Check required input before anything is sent
    fn validate(&self, params: &Self::Params) -> Result<(), RunError>;

    /// Call the engine and decode its answer
    async fn execute(
        &self,
        engine: &RemoteEngine,
        params: Self::Params,
    ) -> Result<Self::Output, RunError>;
}

/// Everything a viewer needs to render one model page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSnapshot<P, O> {
    pub params: P,
    pub run: RunState<O>,
    /// Most recent successful output; survives later failures, cleared by reset
    pub last_output: Option<O>,
    pub timing: Option<GenerationTiming>,
}

impl<P: Default, O> ModelSnapshot<P, O> {
    pub fn initial() -> Self {
        Self {
            params: P::default(),
            run: RunState::Idle,
            last_output: None,
            timing: None,
        }
    }
}

pub type Snapshot<T> = ModelSnapshot<<T as ModelTask>::Params, <T as ModelTask>::Output>;

/// How a call to `ModelStore::run` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
    /// Validation failed; the engine was not called
    Rejected,
    /// A newer run or a reset took over; this result was discarded
    Superseded,
}

#[derive(Default)]
struct RunControl {
    generation: u64,
    in_flight: Option<CancellationToken>,
    /// Bumped by every reset; input operations check it before publishing
    resets: u64,
}

impl RunControl {
    /// Cancel whatever is in flight and hand out a fresh ticket
    fn supersede(&mut self) -> u64 {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        self.generation += 1;
        self.generation
    }
}

/// State holder for one model.
///
/// Parameters and the latest run outcome live in a `watch` channel, so every
/// change is published to subscribers. Each run gets a ticket and a
/// cancellation token; starting another run or resetting cancels the previous
/// token, and a result carrying an outdated ticket is dropped.
pub struct ModelStore<T: ModelTask> {
    task: T,
    engine: RemoteEngine,
    state: watch::Sender<Snapshot<T>>,
    control: Mutex<RunControl>,
}

impl<T: ModelTask> ModelStore<T> {
    pub fn new(task: T, engine: RemoteEngine) -> Self {
        let (state, _) = watch::channel(ModelSnapshot::initial());
        Self {
            task,
            engine,
            state,
            control: Mutex::new(RunControl::default()),
        }
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub(crate) fn engine(&self) -> &RemoteEngine {
        &self.engine
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every published change
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.state.subscribe()
    }

    pub fn params(&self) -> T::Params {
        self.state.borrow().params.clone()
    }

    pub fn run_state(&self) -> RunState<T::Output> {
        self.state.borrow().run.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.state.borrow().run.is_processing()
    }

    pub fn output(&self) -> Option<T::Output> {
        self.state.borrow().run.output().cloned()
    }

    pub fn last_output(&self) -> Option<T::Output> {
        self.state.borrow().last_output.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().run.error().map(str::to_string)
    }

    pub fn timing(&self) -> Option<GenerationTiming> {
        self.state.borrow().timing
    }

    pub(crate) fn update_params(&self, update: impl FnOnce(&mut T::Params)) {
        self.state.send_modify(|snapshot| update(&mut snapshot.params));
    }

    /// Ticket for an input operation that awaits before it sets params
    pub(crate) fn input_ticket(&self) -> u64 {
        self.lock_control().resets
    }

    /// Apply `update` unless a reset happened after `ticket` was taken
    pub(crate) fn update_params_since(
        &self,
        ticket: u64,
        update: impl FnOnce(&mut T::Params),
    ) -> Result<(), RunError> {
        let control = self.lock_control();
        if control.resets != ticket {
            debug!("{} input dropped after reset", self.task.name());
            return Err(RunError::Discarded);
        }
        self.update_params(update);
        Ok(())
    }

    /// Restore every default and abandon any in-flight run
    pub fn reset(&self) {
        let mut control = self.lock_control();
        let ticket = control.supersede();
        control.resets += 1;
        self.apply(RunEvent::Reset, |snapshot| *snapshot = ModelSnapshot::initial());
        info!("{} store reset (ticket {})", self.task.name(), ticket);
    }

    /// Validate, call the engine, and publish the outcome.
    ///
    /// Never blocks an earlier run; it cancels it. Whatever started last
    /// decides the final state.
    pub async fn run(&self) -> RunOutcome {
        let name = self.task.name();
        let params = self.params();

        if let Err(e) = self.task.validate(&params) {
            let mut control = self.lock_control();
            control.supersede();
            let message = e.to_string();
            self.apply(RunEvent::Fail, |snapshot| snapshot.run = RunState::Failed(message));
            warn!("{} run rejected: {}", name, e);
            return RunOutcome::Rejected;
        }

        let (ticket, token) = {
            let mut control = self.lock_control();
            let ticket = control.supersede();
            let token = CancellationToken::new();
            control.in_flight = Some(token.clone());
            self.apply(RunEvent::Start, |snapshot| {
                snapshot.run = RunState::Processing;
                snapshot.timing = Some(GenerationTiming::start(Utc::now()));
            });
            (ticket, token)
        };
        debug!("{} run {} started", name, ticket);

        let result = tokio::select! {
            _ = token.cancelled() => {
                debug!("{} run {} superseded before the engine answered", name, ticket);
                return RunOutcome::Superseded;
            }
            result = self.task.execute(&self.engine, params) => result,
        };

        self.finish(ticket, result)
    }

    fn finish(&self, ticket: u64, result: Result<T::Output, RunError>) -> RunOutcome {
        let name = self.task.name();
        let mut control = self.lock_control();

        if control.generation != ticket {
            debug!("{} run {} finished after being superseded", name, ticket);
            return RunOutcome::Superseded;
        }
        control.in_flight = None;

        let now = Utc::now();
        match result {
            Ok(output) => {
                self.apply(RunEvent::Complete, |snapshot| {
                    if let Some(timing) = snapshot.timing.as_mut() {
                        timing.finish(now);
                    }
                    snapshot.last_output = Some(output.clone());
                    snapshot.run = RunState::Succeeded(output);
                });
                info!("{} run {} succeeded", name, ticket);
                RunOutcome::Succeeded
            }
            Err(e) => {
                let message = e.to_string();
                self.apply(RunEvent::Fail, |snapshot| {
                    if let Some(timing) = snapshot.timing.as_mut() {
                        timing.finish(now);
                    }
                    snapshot.run = RunState::Failed(message);
                });
                warn!("{} run {} failed: {}", name, ticket, e);
                RunOutcome::Failed
            }
        }
    }

    /// Apply `update` if the state machine accepts `event`; publish on change
    fn apply(&self, event: RunEvent, update: impl FnOnce(&mut Snapshot<T>)) -> bool {
        let name = self.task.name();
        self.state
            .send_if_modified(|snapshot| match snapshot.run.phase().next(event) {
                Ok(_) => {
                    update(snapshot);
                    true
                }
                Err(rejection) => {
                    warn!("{}: {}", name, rejection);
                    false
                }
            })
    }

    fn lock_control(&self) -> MutexGuard<'_, RunControl> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clients::EngineError;
    use crate::testing::MockTransport;
    use serde_json::{json, Value};

    /// Echo task: sends the prompt as a user-info pixel and returns the output as text
    #[derive(Default)]
    struct EchoTask;

    #[derive(Debug, Clone, Default, PartialEq, Serialize)]
    struct EchoParams {
        prompt: String,
    }

    #[async_trait]
    impl ModelTask for EchoTask {
        type Params = EchoParams;
        type Output = String;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn validate(&self, params: &EchoParams) -> Result<(), RunError> {
            if params.prompt.trim().is_empty() {
                return Err(RunError::Validation("Please enter a prompt"));
            }
            Ok(())
        }

        async fn execute(&self, engine: &RemoteEngine, params: EchoParams) -> Result<String, RunError> {
            let output = engine
                .execute(&model_studio_pixel::Command::new("Echo").arg("text", params.prompt))
                .await?;
            Ok(match output {
                Value::String(text) => text,
                other => other.to_string(),
            })
        }
    }

    fn store(mock: &MockTransport) -> Arc<ModelStore<EchoTask>> {
        Arc::new(ModelStore::new(EchoTask, mock.engine()))
    }

    fn set_prompt(store: &ModelStore<EchoTask>, prompt: &str) {
        store.update_params(|p| p.prompt = prompt.to_string());
    }

    #[tokio::test]
    async fn test_validation_failure_never_calls_engine() {
        let mock = MockTransport::new();
        let store = store(&mock);
        set_prompt(&store, "   ");

        let outcome = store.run().await;

        assert_eq!(outcome, RunOutcome::Rejected);
        assert_eq!(mock.calls(), 0);
        assert_eq!(store.error().as_deref(), Some("Please enter a prompt"));
        assert!(!store.is_processing());
        assert_eq!(store.timing(), None);
    }

    #[tokio::test]
    async fn test_success_publishes_output_and_timing() {
        let mock = MockTransport::new();
        mock.push_output(json!("pong"));
        let store = store(&mock);
        let mut updates = store.subscribe();
        set_prompt(&store, "ping");

        let outcome = store.run().await;

        assert_eq!(outcome, RunOutcome::Succeeded);
        assert_eq!(store.run_state(), RunState::Succeeded("pong".to_string()));
        assert_eq!(store.last_output().as_deref(), Some("pong"));
        assert!(store.timing().and_then(|t| t.duration_ms()).is_some());
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().run.output().map(String::as_str), Some("pong"));
        assert_eq!(mock.expressions(), vec![r#"Echo ( text = "ping" ) ;"#]);
    }

    #[tokio::test]
    async fn test_failure_keeps_last_output() {
        let mock = MockTransport::new();
        mock.push_output(json!("first"));
        mock.push_errors(["engine ", "down"]);
        let store = store(&mock);
        set_prompt(&store, "ping");

        assert_eq!(store.run().await, RunOutcome::Succeeded);
        assert_eq!(store.run().await, RunOutcome::Failed);

        assert_eq!(store.error().as_deref(), Some("engine down"));
        assert_eq!(store.output(), None);
        assert_eq!(store.last_output().as_deref(), Some("first"));
        assert!(store.timing().and_then(|t| t.finished_at).is_some());
    }

    #[tokio::test]
    async fn test_transport_failure_lands_in_same_error_field() {
        let mock = MockTransport::new();
        mock.push_failure(EngineError::MalformedResponse("not json".to_string()));
        let store = store(&mock);
        set_prompt(&store, "ping");

        assert_eq!(store.run().await, RunOutcome::Failed);
        assert_eq!(store.error().as_deref(), Some("Malformed response: not json"));
    }

    #[tokio::test]
    async fn test_processing_is_visible_while_in_flight() {
        let mock = MockTransport::new();
        let reply = mock.push_deferred();
        let store = store(&mock);
        set_prompt(&store, "ping");

        let running = tokio::spawn({
            let store = store.clone();
            async move { store.run().await }
        });
        mock.wait_for_calls(1).await;

        assert!(store.is_processing());
        assert_eq!(store.last_output(), None);

        reply.send(Ok(crate::clients::PixelResponse::success(json!("pong")))).unwrap();

        assert_eq!(running.await.unwrap(), RunOutcome::Succeeded);
        assert!(!store.is_processing());
    }

    #[tokio::test]
    async fn test_overlapping_runs_resolved_in_reverse_order() {
        let mock = MockTransport::new();
        let first_reply = mock.push_deferred();
        let second_reply = mock.push_deferred();
        let store = store(&mock);
        set_prompt(&store, "first");

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.run().await }
        });
        mock.wait_for_calls(1).await;

        set_prompt(&store, "second");
        let second = tokio::spawn({
            let store = store.clone();
            async move { store.run().await }
        });
        mock.wait_for_calls(2).await;

        // The later run resolves first, then the earlier one
        second_reply
            .send(Ok(crate::clients::PixelResponse::success(json!("second result"))))
            .unwrap();
        assert_eq!(second.await.unwrap(), RunOutcome::Succeeded);
        let _ = first_reply.send(Ok(crate::clients::PixelResponse::success(json!("first result"))));
        assert_eq!(first.await.unwrap(), RunOutcome::Superseded);

        assert_eq!(store.output().as_deref(), Some("second result"));
        assert!(!store.is_processing());
    }

    #[tokio::test]
    async fn test_reset_during_run_discards_late_result() {
        let mock = MockTransport::new();
        let reply = mock.push_deferred();
        let store = store(&mock);
        set_prompt(&store, "ping");

        let running = tokio::spawn({
            let store = store.clone();
            async move { store.run().await }
        });
        mock.wait_for_calls(1).await;

        store.reset();
        let _ = reply.send(Ok(crate::clients::PixelResponse::success(json!("late"))));

        assert_eq!(running.await.unwrap(), RunOutcome::Superseded);
        assert_eq!(store.snapshot(), ModelSnapshot::initial());
    }

    #[test]
    fn test_input_after_reset_is_discarded() {
        let mock = MockTransport::new();
        let store = store(&mock);

        let stale = store.input_ticket();
        store.reset();
        let current = store.input_ticket();

        let result = store.update_params_since(stale, |p| p.prompt = "late".to_string());
        assert!(matches!(result, Err(RunError::Discarded)));
        assert_eq!(store.params().prompt, "");

        store
            .update_params_since(current, |p| p.prompt = "fresh".to_string())
            .unwrap();
        assert_eq!(store.params().prompt, "fresh");
    }

    #[tokio::test]
    async fn test_reset_restores_defaults_from_any_state() {
        let mock = MockTransport::new();
        mock.push_output(json!("pong"));
        mock.push_errors(["nope"]);
        let store = store(&mock);

        set_prompt(&store, "ping");
        store.run().await;
        store.reset();
        assert_eq!(store.snapshot(), ModelSnapshot::initial());

        set_prompt(&store, "ping");
        store.run().await;
        store.reset();
        assert_eq!(store.snapshot(), ModelSnapshot::initial());

        set_prompt(&store, "");
        store.run().await;
        store.reset();
        assert_eq!(store.snapshot(), ModelSnapshot::initial());
    }
}
