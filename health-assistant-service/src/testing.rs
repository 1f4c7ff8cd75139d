//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::gateway::{CompletionRequest, GatewayError, LlmGateway, ModelSet};

/// Gateway that replays canned replies in order and records every request.
///
/// When the script runs dry, further calls fail with `EmptyCompletion`.
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<String, GatewayError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    models: ModelSet,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            models: ModelSet {
                text: "text-model".to_string(),
                vision: "vision-model".to_string(),
            },
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self::new().then(reply)
    }

    pub fn failing(error: GatewayError) -> Self {
        let gateway = Self::new();
        gateway.replies.lock().unwrap().push_back(Err(error));
        gateway
    }

    pub fn then(self, reply: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    fn models(&self) -> &ModelSet {
        &self.models
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GatewayError::EmptyCompletion))
    }

    async fn speak(&self, text: &str, _voice: &str) -> Result<Vec<u8>, GatewayError> {
        self.requests
            .lock()
            .unwrap()
            .push(CompletionRequest::new("tts", text));
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply.into_bytes()),
            Some(Err(e)) => Err(e),
            None => Err(GatewayError::EmptyCompletion),
        }
    }
}
