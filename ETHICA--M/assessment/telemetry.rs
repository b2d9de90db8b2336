use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use tokio::runtime::{Builder, Handle};
use uuid::Uuid;

/// Builder configuring telemetry for the assessment pipeline.
pub struct AssessmentTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl AssessmentTelemetryBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            event_publisher: None,
        }
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Assigns the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> Result<AssessmentTelemetry> {
        AssessmentTelemetry::new(self.module, self.log_path, self.event_publisher)
    }
}

/// Telemetry handle for pipeline runs. Cheap to clone and share.
#[derive(Clone)]
pub struct AssessmentTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for AssessmentTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentTelemetry")
            .field("module", &self.inner.module)
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
    event: Option<EventHandle>,
}

/// Owns no runtime: the handle must stay droppable from async contexts.
struct EventHandle {
    publisher: Arc<dyn EventPublisher>,
}

impl EventHandle {
    fn publish(&self, record: EventRecord) -> Result<()> {
        let publisher = Arc::clone(&self.publisher);
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = publisher.publish(record).await {
                    eprintln!("telemetry event publish failed: {err:?}");
                }
            });
            Ok(())
        } else {
            // Sync caller: a short-lived current-thread runtime, dropped
            // here where blocking is allowed.
            let runtime = Builder::new_current_thread().enable_all().build()?;
            runtime.block_on(publisher.publish(record))
        }
    }
}

impl AssessmentTelemetry {
    fn new(
        module: impl Into<String>,
        log_path: Option<PathBuf>,
        event_publisher: Option<Arc<dyn EventPublisher>>,
    ) -> Result<Self> {
        let logger = if let Some(path) = log_path {
            Some(JsonLogger::new(path)?)
        } else {
            None
        };
        let event = event_publisher.map(|publisher| EventHandle { publisher });
        Ok(Self {
            inner: Arc::new(TelemetryInner {
                module: module.into(),
                logger,
                event,
            }),
        })
    }

    /// Returns a builder for this telemetry helper.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> AssessmentTelemetryBuilder {
        AssessmentTelemetryBuilder::new(module)
    }

    /// Logs a structured record.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        self.write(level, message, metadata, None)
    }

    /// Logs a structured record correlated to a workflow run.
    pub fn log_workflow(
        &self,
        workflow_id: Uuid,
        level: LogLevel,
        message: &str,
        metadata: Value,
    ) -> Result<()> {
        self.write(level, message, metadata, Some(workflow_id))
    }

    fn write(
        &self,
        level: LogLevel,
        message: &str,
        metadata: Value,
        workflow_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let mut record = LogRecord::new(&self.inner.module, level, message);
            if let Some(id) = workflow_id {
                record = record.with_workflow(id);
            }
            if let Some(obj) = metadata.as_object() {
                record.metadata = obj.clone();
            }
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Emits an event entry via the configured bus.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        if let Some(handle) = &self.inner.event {
            let record = EventRecord::new(self.inner.module.clone(), event_type, payload);
            handle.publish(record)?;
        }
        Ok(())
    }
}
