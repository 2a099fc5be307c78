use super::{UpstreamPayload, UpstreamService};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum MockReply {
    Body(Value),
    Rejected { status: u16, message: Option<String> },
}

/// In-memory upstream that records every forwarded payload.
#[derive(Clone)]
pub struct MockUpstreamClient {
    replies: Arc<Mutex<Vec<MockReply>>>,
    payloads: Arc<Mutex<Vec<UpstreamPayload>>>,
}

impl MockUpstreamClient {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            payloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, body: Value) -> Self {
        self.replies.lock().unwrap().push(MockReply::Body(body));
        self
    }

    pub fn with_rejection(self, status: u16, message: Option<String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push(MockReply::Rejected { status, message });
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub fn payloads(&self) -> Vec<UpstreamPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

impl Default for MockUpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamService for MockUpstreamClient {
    async fn forward(&self, payload: &UpstreamPayload) -> Result<Value> {
        let call_index = {
            let mut payloads = self.payloads.lock().unwrap();
            payloads.push(payload.clone());
            payloads.len() - 1
        };

        let reply = {
            let replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                None
            } else {
                Some(replies[call_index % replies.len()].clone())
            }
        };

        match reply {
            // Default mock response
            None => Ok(json!({ "mock": payload.label() })),
            Some(MockReply::Body(body)) => Ok(body),
            Some(MockReply::Rejected { status, message }) => Err(Error::UpstreamRejected {
                label: payload.label(),
                status,
                message,
            }),
        }
    }
}
