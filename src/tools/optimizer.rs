//! Tool output optimizer.
//!
//! Wraps a tool so that oversized results are condensed by a secondary
//! completion call, steered by a caller-supplied goal, before they re-enter
//! the conversation.

use super::{Schema, Tool, ToolArgs, ToolContext, ToolError, ToolOutput};
use crate::llm::CompletionService;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Results at or below this many characters are returned unchanged.
pub const DEFAULT_OPTIMIZE_THRESHOLD: usize = 4000;

const GOAL_DESCRIPTION: &str = "The goal of the task including the expected record, fields and \
information you expect or search in the result. This goal is used to compress and filter large results.";

/// A tool whose output is compressed when it exceeds the threshold.
pub struct OptimizedTool {
    inner: Arc<dyn Tool>,
    completion: Arc<dyn CompletionService>,
    threshold: usize,
}

impl OptimizedTool {
    pub fn new(inner: Arc<dyn Tool>, completion: Arc<dyn CompletionService>, threshold: usize) -> Self {
        Self {
            inner,
            completion,
            threshold,
        }
    }
}

/// Wrap every tool in the list.
pub fn optimize_tools(
    tools: Vec<Arc<dyn Tool>>,
    completion: Arc<dyn CompletionService>,
    threshold: usize,
) -> Vec<Arc<dyn Tool>> {
    tools
        .into_iter()
        .map(|tool| {
            Arc::new(OptimizedTool::new(tool, completion.clone(), threshold)) as Arc<dyn Tool>
        })
        .collect()
}

#[async_trait]
impl Tool for OptimizedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn schema(&self) -> Schema {
        Schema::object()
            .required_property("goal", Schema::string().describe(GOAL_DESCRIPTION))
            .property("input", self.inner.schema())
            .build()
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let goal = match args.get("goal") {
            Some(Value::String(goal)) => goal.clone(),
            _ => return Err(ToolError::InvalidArguments("goal is required".into())),
        };

        // A missing input is treated as an empty argument map.
        let input = match args.get("input") {
            None | Some(Value::Null) => ToolArgs::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(ToolError::InvalidArguments("input must be an object".into()))
            }
        };

        debug!("[{}] goal: {}", self.inner.name(), goal);

        let output = self.inner.execute(ctx, input).await?;
        let data = output.into_text().trim().to_string();

        let length = data.chars().count();
        if length <= self.threshold {
            return Ok(ToolOutput::Text(data));
        }

        info!(
            "[{}] Compressing {} chars of output (threshold {})",
            self.inner.name(),
            length,
            self.threshold
        );

        let system = format!("Extract relevant information based on this goal:\n{goal}");
        let summary = self
            .completion
            .complete_text(&system, &data)
            .await
            .map_err(|e| ToolError::Completion(format!("{e:#}")))?;

        Ok(ToolOutput::Text(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolDefinition;
    use crate::types::{ChatMessage, Completion, TokenUsage};
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns `size` characters of output.
    struct Blob(usize);

    #[async_trait]
    impl Tool for Blob {
        fn name(&self) -> &str {
            "dump"
        }

        fn description(&self) -> &str {
            "dumps data"
        }

        fn schema(&self) -> Schema {
            Schema::object().property("path", Schema::string()).build()
        }

        async fn execute(&self, _ctx: &ToolContext, _args: ToolArgs) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::Text(format!("  {}\n", "x".repeat(self.0))))
        }
    }

    #[derive(Default)]
    struct Summarizer {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionService for Summarizer {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> anyhow::Result<Completion> {
            self.calls.lock().unwrap().push(messages.to_vec());
            if self.fail {
                anyhow::bail!("model offline");
            }
            Ok(Completion {
                message: ChatMessage::assistant("summary"),
                usage: TokenUsage::default(),
            })
        }
    }

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    fn wrap(size: usize, summarizer: Arc<Summarizer>) -> OptimizedTool {
        OptimizedTool::new(Arc::new(Blob(size)), summarizer, DEFAULT_OPTIMIZE_THRESHOLD)
    }

    #[tokio::test]
    async fn output_at_threshold_is_returned_trimmed_without_completion() {
        let summarizer = Arc::new(Summarizer::default());
        let tool = wrap(DEFAULT_OPTIMIZE_THRESHOLD, summarizer.clone());

        let out = tool
            .execute(&ToolContext::default(), args(json!({ "goal": "find x", "input": {} })))
            .await
            .unwrap()
            .into_text();

        assert_eq!(out.len(), DEFAULT_OPTIMIZE_THRESHOLD);
        assert!(summarizer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn output_over_threshold_is_summarized_with_goal() {
        let summarizer = Arc::new(Summarizer::default());
        let tool = wrap(DEFAULT_OPTIMIZE_THRESHOLD + 1, summarizer.clone());

        let out = tool
            .execute(&ToolContext::default(), args(json!({ "goal": "find x", "input": {} })))
            .await
            .unwrap();

        assert_eq!(out, ToolOutput::Text("summary".into()));
        let calls = summarizer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0][0].content,
            "Extract relevant information based on this goal:\nfind x"
        );
        assert_eq!(calls[0][1].content.len(), DEFAULT_OPTIMIZE_THRESHOLD + 1);
    }

    #[tokio::test]
    async fn repeated_small_calls_are_identical() {
        let summarizer = Arc::new(Summarizer::default());
        let tool = wrap(10, summarizer.clone());
        let call = args(json!({ "goal": "g", "input": { "path": "." } }));

        let first = tool.execute(&ToolContext::default(), call.clone()).await.unwrap();
        let second = tool.execute(&ToolContext::default(), call).await.unwrap();

        assert_eq!(first, second);
        assert!(summarizer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_goal_fails_and_missing_input_is_tolerated() {
        let tool = wrap(5, Arc::new(Summarizer::default()));

        let err = tool
            .execute(&ToolContext::default(), args(json!({ "input": {} })))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid arguments: goal is required");

        let out = tool
            .execute(&ToolContext::default(), args(json!({ "goal": "g" })))
            .await
            .unwrap();
        assert_eq!(out.into_text(), "xxxxx");
    }

    #[tokio::test]
    async fn summarizer_failure_propagates() {
        let summarizer = Arc::new(Summarizer {
            fail: true,
            ..Default::default()
        });
        let tool = wrap(DEFAULT_OPTIMIZE_THRESHOLD + 50, summarizer);

        let err = tool
            .execute(&ToolContext::default(), args(json!({ "goal": "g", "input": {} })))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Completion(msg) if msg.contains("model offline")));
    }

    #[test]
    fn schema_wraps_inner_schema_under_input() {
        let tool = wrap(1, Arc::new(Summarizer::default()));
        let value = tool.schema().to_value();

        assert_eq!(value["required"], json!(["goal"]));
        assert_eq!(
            value["properties"]["input"],
            json!({ "type": "object", "properties": { "path": { "type": "string" } } })
        );
    }
}
