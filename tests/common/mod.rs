#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use toolwright::llm::CompletionService;
use toolwright::openapi::{Confirm, RestExecutor, RestRequest, RestResponse};
use toolwright::tools::{ToolDefinition, ToolError};
use toolwright::types::{ChatMessage, Completion, TokenUsage, ToolCall};

pub fn answer(text: &str) -> Completion {
    Completion {
        message: ChatMessage::assistant(text),
        usage: TokenUsage::default(),
    }
}

pub fn calls(calls: Vec<ToolCall>) -> Completion {
    Completion {
        message: ChatMessage::assistant_with_calls("", calls),
        usage: TokenUsage::default(),
    }
}

/// Replies with queued completions and records what it was sent.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<Completion, String>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    tools: Mutex<Vec<Vec<ToolDefinition>>>,
}

impl ScriptedCompletion {
    pub fn new(replies: impl IntoIterator<Item = Completion>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            ..Default::default()
        })
    }

    /// Queue a failure after the current replies.
    pub fn then_fail(self: &Arc<Self>, message: &str) {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
    }

    /// Message histories of every request, in order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    /// Tool names offered with the first request.
    pub fn offered_tools(&self) -> Vec<String> {
        self.tools
            .lock()
            .unwrap()
            .first()
            .map(|defs| defs.iter().map(|d| d.name.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Result<Completion> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.tools.lock().unwrap().push(tools.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(message)) => bail!("{message}"),
            None => bail!("no scripted reply left"),
        }
    }
}

/// Records requests and answers each with a fixed body.
pub struct RecordingExecutor {
    pub requests: Mutex<Vec<RestRequest>>,
    body: String,
}

impl RecordingExecutor {
    pub fn new(body: &str) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            body: body.to_string(),
        })
    }

    pub fn requests(&self) -> Vec<RestRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RestExecutor for RecordingExecutor {
    async fn execute(&self, request: RestRequest) -> Result<RestResponse, ToolError> {
        self.requests.lock().unwrap().push(request);
        Ok(RestResponse {
            body: self.body.clone(),
        })
    }
}

/// Gives the same answer to every confirmation and counts the questions.
pub struct StaticConfirm {
    approve: bool,
    pub asked: Mutex<usize>,
}

impl StaticConfirm {
    pub fn new(approve: bool) -> Arc<Self> {
        Arc::new(Self {
            approve,
            asked: Mutex::new(0),
        })
    }

    pub fn asked(&self) -> usize {
        *self.asked.lock().unwrap()
    }
}

#[async_trait]
impl Confirm for StaticConfirm {
    async fn confirm(&self, _request: &RestRequest) -> Result<bool, ToolError> {
        *self.asked.lock().unwrap() += 1;
        Ok(self.approve)
    }
}
