//! Scripted in-memory backend for driving the engine without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use dialectic_engine::{Backend, BackendError};
use std::collections::VecDeque;
use std::sync::Mutex;

/// What the backend answers for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
}

pub fn text(s: &str) -> Reply {
    Reply::Text(s.to_string())
}

pub fn fail(msg: &str) -> Reply {
    Reply::Fail(msg.to_string())
}

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub max_tokens: u32,
    pub system_prompt: String,
}

/// Answers from a queue (sequential use) or by prompt substring (concurrent use).
pub struct ScriptedBackend {
    queue: Mutex<VecDeque<Reply>>,
    routes: Vec<(String, Reply)>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    /// Replies are handed out in call order; an exhausted queue returns `EmptyResponse`.
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            queue: Mutex::new(replies.into()),
            routes: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The first route whose needle appears in the prompt answers the call.
    pub fn routed(routes: Vec<(&str, Reply)>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            routes: routes
                .into_iter()
                .map(|(needle, reply)| (needle.to_string(), reply))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        system_prompt: &str,
    ) -> Result<String, BackendError> {
        self.calls.lock().unwrap().push(Call {
            prompt: prompt.to_string(),
            max_tokens,
            system_prompt: system_prompt.to_string(),
        });

        let reply = if self.routes.is_empty() {
            self.queue.lock().unwrap().pop_front()
        } else {
            self.routes
                .iter()
                .find(|(needle, _)| prompt.contains(needle.as_str()))
                .map(|(_, reply)| reply.clone())
        };

        match reply {
            Some(Reply::Text(t)) => Ok(t),
            Some(Reply::Fail(msg)) => Err(BackendError::Http(msg)),
            None => Err(BackendError::EmptyResponse),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
