use std::sync::{Arc, Mutex};

use apirun_store::ReportStatus;
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RunStarted {
        run_id: Uuid,
        name: String,
    },
    RunFinished {
        run_id: Uuid,
        status: ReportStatus,
    },
    /// `label` is the step alias in a suite, `iteration_<n>` in a case.
    AttemptStarted {
        run_id: Uuid,
        label: String,
        attempt_no: u32,
    },
    AttemptFinished {
        run_id: Uuid,
        label: String,
        attempt_no: u32,
        succeeded: bool,
    },
    RetryScheduled {
        run_id: Uuid,
        label: String,
        delay_ms: u64,
    },
    PolicyDenied {
        run_id: Uuid,
        label: String,
        reason: String,
    },
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) {
        match event {
            Event::RunStarted { run_id, name } => tracing::debug!(%run_id, %name, "run started"),
            Event::RunFinished { run_id, status } => {
                tracing::debug!(%run_id, status = status.as_str(), "run finished")
            }
            Event::AttemptStarted {
                run_id,
                label,
                attempt_no,
            } => tracing::debug!(%run_id, %label, attempt_no, "attempt started"),
            Event::AttemptFinished {
                run_id,
                label,
                attempt_no,
                succeeded,
            } => tracing::debug!(%run_id, %label, attempt_no, succeeded, "attempt finished"),
            Event::RetryScheduled {
                run_id,
                label,
                delay_ms,
            } => tracing::debug!(%run_id, %label, delay_ms, "retry scheduled"),
            Event::PolicyDenied { run_id, label, reason } => {
                tracing::debug!(%run_id, %label, %reason, "policy denied attempt")
            }
        }
    }
}

#[derive(Default)]
pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: Event) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn composite_fans_out() {
        let a = Arc::new(RecordingEventSink::new());
        let b = Arc::new(RecordingEventSink::new());
        let mut sink = CompositeEventSink::new();
        sink.add(a.clone());
        sink.add(b.clone());
        sink.add(Arc::new(NoOpEventSink));

        let run_id = Uuid::new_v4();
        sink.emit(Event::RunStarted {
            run_id,
            name: "smoke".to_string(),
        })
        .await;
        assert_eq!(a.events(), b.events());
        assert_eq!(a.events().len(), 1);
    }
}
