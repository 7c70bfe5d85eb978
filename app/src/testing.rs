//! In-memory engine for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::clients::{EngineError, PixelResponse, PixelTransport, RemoteEngine, UploadedFile};

type Reply = Result<PixelResponse, EngineError>;

enum Scripted {
    Ready(Reply),
    Deferred(oneshot::Receiver<Reply>),
}

enum ScriptedUpload {
    Ready(String),
    Deferred(oneshot::Receiver<String>),
}

#[derive(Default)]
struct MockState {
    scripted: Mutex<VecDeque<Scripted>>,
    expressions: Mutex<Vec<String>>,
    upload_locations: Mutex<VecDeque<ScriptedUpload>>,
    uploads: Mutex<Vec<(String, usize)>>,
    insight_id: Mutex<Option<String>>,
}

/// Scripted transport: replies are consumed in call order.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(&self) -> RemoteEngine {
        RemoteEngine::new(Arc::new(self.clone()))
    }

    pub fn push_output(&self, output: Value) {
        self.push(Scripted::Ready(Ok(PixelResponse::success(output))));
    }

    pub fn push_errors<S: Into<String>>(&self, errors: impl IntoIterator<Item = S>) {
        self.push(Scripted::Ready(Ok(PixelResponse::failure(errors))));
    }

    pub fn push_failure(&self, error: EngineError) {
        self.push(Scripted::Ready(Err(error)));
    }

    /// Reply later through the returned sender.
    pub fn push_deferred(&self) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.push(Scripted::Deferred(rx));
        tx
    }

    pub fn push_upload(&self, location: &str) {
        self.state
            .upload_locations
            .lock()
            .unwrap()
            .push_back(ScriptedUpload::Ready(location.to_string()));
    }

    /// Answer the next upload later with the location sent through the returned sender.
    pub fn push_deferred_upload(&self) -> oneshot::Sender<String> {
        let (tx, rx) = oneshot::channel();
        self.state
            .upload_locations
            .lock()
            .unwrap()
            .push_back(ScriptedUpload::Deferred(rx));
        tx
    }

    pub fn set_insight_id(&self, insight_id: &str) {
        *self.state.insight_id.lock().unwrap() = Some(insight_id.to_string());
    }

    pub fn expressions(&self) -> Vec<String> {
        self.state.expressions.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.state.expressions.lock().unwrap().len()
    }

    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.state.uploads.lock().unwrap().clone()
    }

    /// Yield until at least `n` pixels have been sent.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }

    /// Yield until at least `n` uploads have started.
    pub async fn wait_for_uploads(&self, n: usize) {
        while self.uploads().len() < n {
            tokio::task::yield_now().await;
        }
    }

    fn push(&self, scripted: Scripted) {
        self.state.scripted.lock().unwrap().push_back(scripted);
    }
}

#[async_trait]
impl PixelTransport for MockTransport {
    async fn run_pixel(&self, expression: &str) -> Result<PixelResponse, EngineError> {
        self.state
            .expressions
            .lock()
            .unwrap()
            .push(expression.to_string());

        let next = self.state.scripted.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Deferred(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(EngineError::Transport("reply dropped".to_string()))),
            None => Err(EngineError::Transport(format!(
                "no scripted reply for {}",
                expression
            ))),
        }
    }

    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<UploadedFile>, EngineError> {
        self.state
            .uploads
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes.len()));

        let next = self.state.upload_locations.lock().unwrap().pop_front();
        let location = match next {
            Some(ScriptedUpload::Ready(location)) => Some(location),
            Some(ScriptedUpload::Deferred(rx)) => rx.await.ok(),
            None => None,
        };
        Ok(location
            .map(|file_location| UploadedFile {
                file_name: file_name.to_string(),
                file_location,
            })
            .into_iter()
            .collect())
    }

    fn insight_id(&self) -> Option<String> {
        self.state.insight_id.lock().unwrap().clone()
    }
}
