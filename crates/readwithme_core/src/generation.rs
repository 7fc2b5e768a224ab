//! crates/readwithme_core/src/generation.rs
//!
//! Call-boundary guards around the external generation service.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{GeneratedContent, GenerationOptions};
use crate::ports::{ContentGenerator, PortError, PortResult};

/// Bounds every generation call with a deadline and rejects empty output, so
/// callers never see (or cache) a blank answer.
pub struct TimeoutGenerator {
    inner: Arc<dyn ContentGenerator>,
    timeout: Duration,
}

impl TimeoutGenerator {
    pub fn new(inner: Arc<dyn ContentGenerator>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl ContentGenerator for TimeoutGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> PortResult<GeneratedContent> {
        let options = options.effective();
        debug!(search = options.use_search, json = options.json_mode, "Calling generation service");

        let content = tokio::time::timeout(self.timeout, self.inner.generate(prompt, options))
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.timeout.as_secs(), "Generation call timed out");
                PortError::Generation(format!(
                    "generation timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if content.text.trim().is_empty() {
            return Err(PortError::Generation("No content generated".to_string()));
        }
        Ok(content)
    }
}
