//! External research/search service boundary.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::types::Document;
use crate::io::process::call_json;

/// Ranked document search. Ranking is the service's business.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Document>>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    documents: Vec<Document>,
}

/// Search backed by an external command (`{"query"}` in, `{"documents":[...]}` out).
#[derive(Debug, Clone)]
pub struct CommandSearch {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandSearch {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }
}

#[async_trait]
impl SearchService for CommandSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<Document>> {
        let command = self.command.clone();
        let timeout = self.timeout;
        let limit = self.output_limit_bytes;
        let request = serde_json::to_value(SearchRequest { query })?;
        let response: SearchResponse =
            tokio::task::spawn_blocking(move || call_json(&command, &request, timeout, limit))
                .await
                .context("join search call")??;
        debug!(documents = response.documents.len(), "search returned");
        Ok(response.documents)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_search_parses_documents() {
        let search = CommandSearch::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                r#"cat >/dev/null; echo '{"documents":[{"title":"Projects","url":"https://linear.app/docs/projects","snippet":"Create a project"}]}'"#.to_string(),
            ],
            Duration::from_secs(5),
            4096,
        );
        let docs = search.search("linear create project").await.expect("search");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "Projects");
    }
}
