//! Publisher that prints instead of commenting

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use quill_core::{ArtifactId, FormattedOutput, Publisher, TargetId};

/// Writes every message to a sink, stdout by default
///
/// Never reports an existing artifact, so every run publishes fresh.
pub struct StdoutPublisher {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl StdoutPublisher {
    pub fn new() -> Self {
        Self::with_sink(Box::new(std::io::stdout()))
    }

    fn with_sink(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    fn emit(&self, header: &str, body: &str) -> quill_core::Result<()> {
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(sink, "----- {} -----", header)?;
        writeln!(sink, "{}", body)?;
        sink.flush()?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn find_existing(
        &self,
        _target: &TargetId,
        _signature: &str,
    ) -> quill_core::Result<Option<ArtifactId>> {
        Ok(None)
    }

    async fn create(
        &self,
        target: &TargetId,
        output: &FormattedOutput,
    ) -> quill_core::Result<ArtifactId> {
        self.emit(&format!("review for {}", target), &output.primary_message)?;
        Ok(0)
    }

    async fn supersede(&self, _target: &TargetId, _artifact: ArtifactId) -> quill_core::Result<()> {
        Ok(())
    }

    async fn create_continuation(&self, target: &TargetId, text: &str) -> quill_core::Result<()> {
        self.emit(&format!("continuation for {}", target), text)
    }
}
