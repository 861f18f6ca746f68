//! Shared test fixtures.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::activity::{Activity, ActivityContext};
use crate::error::ActivityError;
use crate::flow::{Flow, FlowBuilder, State};

/// Draft -(1)-> Review -(2, condition true)-> Approved
pub fn approval_flow() -> Flow {
    FlowBuilder::new("approval")
        .state(State::new(2, "Approved"))
        .initial(|s| s.for_state(State::new(0, "Draft")).allow(State::new(1, "Review"), 1))
        .new_step(|s| {
            s.for_state(State::new(1, "Review"))
                .allow_when(State::new(2, "Approved"), 2, || true)
        })
        .build()
        .unwrap()
}

/// Records every invocation as `"{hook} {from}->{to}"`.
#[derive(Clone)]
pub struct RecordingActivity {
    name: String,
    calls: Arc<Mutex<Vec<String>>>,
    contexts: Arc<Mutex<Vec<ActivityContext>>>,
}

impl RecordingActivity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            contexts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_data(&self, key: &str) -> Option<Value> {
        self.contexts
            .lock()
            .unwrap()
            .last()
            .and_then(|c| c.data.get(key).cloned())
    }

    fn record(&self, prefix: &str, context: &ActivityContext) {
        let call = format!("{}{} {}->{}", prefix, context.hook, context.from, context.to);
        self.calls.lock().unwrap().push(call);
        self.contexts.lock().unwrap().push(context.clone());
    }
}

#[async_trait]
impl Activity for RecordingActivity {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, context: &ActivityContext) -> Result<(), ActivityError> {
        self.record("", context);
        Ok(())
    }

    async fn compensate(&self, context: &ActivityContext) -> Result<(), ActivityError> {
        self.record("compensate ", context);
        Ok(())
    }
}

/// Fails both invocation and compensation.
pub struct FailingActivity {
    message: String,
}

impl FailingActivity {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Activity for FailingActivity {
    fn name(&self) -> &str {
        "failing"
    }

    async fn invoke(&self, _context: &ActivityContext) -> Result<(), ActivityError> {
        Err(ActivityError::new(self.message.clone()))
    }

    async fn compensate(&self, _context: &ActivityContext) -> Result<(), ActivityError> {
        Err(ActivityError::new(self.message.clone()))
    }
}
