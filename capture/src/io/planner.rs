//! Natural-language plan generation boundary.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::types::{Document, Step};
use crate::io::process::call_json;

/// Turns a task into ordered steps. `documents` is `None` on the fallback path.
#[async_trait]
pub trait PlanSummarizer: Send + Sync {
    async fn summarize(
        &self,
        task: &str,
        app_id: &str,
        documents: Option<&[Document]>,
    ) -> Result<Vec<Step>>;
}

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    task: &'a str,
    app_id: &'a str,
    documents: Option<&'a [Document]>,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    steps: Vec<Step>,
}

/// Summarizer backed by an external command (`{"task","app_id","documents"}` in,
/// `{"steps":[...]}` out).
#[derive(Debug, Clone)]
pub struct CommandPlanner {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandPlanner {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }
}

#[async_trait]
impl PlanSummarizer for CommandPlanner {
    #[instrument(skip(self, documents), fields(grounded = documents.is_some()))]
    async fn summarize(
        &self,
        task: &str,
        app_id: &str,
        documents: Option<&[Document]>,
    ) -> Result<Vec<Step>> {
        let request = serde_json::to_value(SummarizeRequest {
            task,
            app_id,
            documents,
        })?;
        let command = self.command.clone();
        let timeout = self.timeout;
        let limit = self.output_limit_bytes;
        let response: SummarizeResponse =
            tokio::task::spawn_blocking(move || call_json(&command, &request, timeout, limit))
                .await
                .context("join planner call")??;
        debug!(steps = response.steps.len(), "planner returned");
        Ok(response.steps)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_planner_passes_null_documents_on_fallback() {
        // Echo back one step whose instruction is the `documents` field of the request.
        let planner = CommandPlanner::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                r#"if grep -q '"documents":null'; then d=none; else d=some; fi; echo "{\"steps\":[{\"ordinal\":1,\"instruction\":\"$d\"}]}""#.to_string(),
            ],
            Duration::from_secs(5),
            4096,
        );
        let steps = planner
            .summarize("Add a task in Asana", "asana", None)
            .await
            .expect("summarize");
        assert_eq!(steps, vec![Step::new(1, "none")]);
    }
}
