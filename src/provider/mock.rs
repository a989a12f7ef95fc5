// src/provider/mock.rs
//! Scripted in-memory provider for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::Provider;
use crate::error::{AppError, Result};
use crate::request::Endpoint;

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Json(Value),
    Status(u16, String),
}

/// Replies are consumed per endpoint in FIFO order; every call is logged.
#[derive(Default)]
pub(crate) struct MockProvider {
    replies: Mutex<HashMap<Endpoint, VecDeque<Reply>>>,
    calls: Mutex<Vec<(Endpoint, Value)>>,
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, endpoint: Endpoint, body: Value) -> Self {
        self.push(endpoint, Reply::Json(body));
        self
    }

    pub(crate) fn fail(self, endpoint: Endpoint, status: u16, body: &str) -> Self {
        self.push(endpoint, Reply::Status(status, body.to_string()));
        self
    }

    fn push(&self, endpoint: Endpoint, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn calls(&self) -> Vec<(Endpoint, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn call(&self, endpoint: Endpoint, payload: &Value) -> Result<Value> {
        self.calls.lock().unwrap().push((endpoint, payload.clone()));
        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Reply::Json(v)) => Ok(v),
            Some(Reply::Status(status, body)) => Err(AppError::Provider { status, body }),
            None => Err(AppError::Provider {
                status: 404,
                body: format!("no scripted reply for {}", endpoint),
            }),
        }
    }
}
