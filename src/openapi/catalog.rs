//! The set of operations of one document, exposed as tools.

use super::document::Document;
use super::loader::load_document;
use super::operation::Operation;
use super::rest::RestExecutor;
use super::OpenApiError;
use crate::agent::{system_prompt, Agent};
use crate::llm::CompletionService;
use crate::tools::{Schema, Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolProvider, ToolSet};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Operations keyed by name plus the executor they run on.
///
/// A catalog holds no conversation state; it can serve any number of
/// independent sessions.
pub struct Catalog {
    title: String,
    operations: BTreeMap<String, Arc<Operation>>,
    client: Arc<dyn RestExecutor>,
}

impl Catalog {
    /// Load a document from a path or URL and derive its operations.
    pub async fn load(source: &str, client: Arc<dyn RestExecutor>) -> Result<Self, OpenApiError> {
        let document = load_document(source).await?;
        Ok(Self::from_document(&document, client))
    }

    /// Derive one operation per (path, method) with an `operationId`.
    /// A later operation whose snake-cased name collides replaces the
    /// earlier one.
    pub fn from_document(document: &Document, client: Arc<dyn RestExecutor>) -> Self {
        let mut operations = BTreeMap::new();
        let mut skipped = 0usize;

        for (path, item) in &document.paths {
            for (method, op) in item.operations() {
                let Some(operation) = Operation::derive(path, method, op, &item.parameters) else {
                    skipped += 1;
                    continue;
                };
                if let Some(previous) = operations.insert(operation.name.clone(), Arc::new(operation)) {
                    warn!(
                        "Operation name '{}' is used more than once, {} {} replaced",
                        previous.name, previous.method, previous.path
                    );
                }
            }
        }

        info!(
            "Catalog '{}': {} operations ({} skipped without operationId)",
            document.info.title,
            operations.len(),
            skipped
        );

        Self {
            title: document.info.title.clone(),
            operations,
            client,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operation(&self, name: &str) -> Option<&Arc<Operation>> {
        self.operations.get(name)
    }

    pub fn operations(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.operations.values()
    }

    /// Bind and run an operation by name.
    pub async fn execute(&self, name: &str, args: &ToolArgs) -> Result<String, ToolError> {
        let operation = self
            .operations
            .get(name)
            .ok_or_else(|| ToolError::OperationNotFound(name.to_string()))?;
        run(operation, self.client.as_ref(), args).await
    }

    pub fn tool_list(&self) -> Vec<Arc<dyn Tool>> {
        self.operations
            .values()
            .map(|operation| {
                Arc::new(OperationTool {
                    operation: operation.clone(),
                    client: self.client.clone(),
                }) as Arc<dyn Tool>
            })
            .collect()
    }

    /// Answer a single prompt in a fresh session over this catalog's tools.
    pub async fn query(
        &self,
        completion: Arc<dyn CompletionService>,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let agent = Agent::new(completion, ToolSet::new(self.tool_list()))
            .with_system_prompt(system_prompt::API);
        let mut session = agent.new_session();
        agent.ask(&mut session, prompt, cancel).await
    }
}

async fn run(operation: &Operation, client: &dyn RestExecutor, args: &ToolArgs) -> Result<String, ToolError> {
    let request = operation.bind(args)?;
    let response = client.execute(request).await?;
    Ok(response.body)
}

#[async_trait]
impl ToolProvider for Catalog {
    async fn tools(&self, _ctx: &ToolContext) -> Result<Vec<Arc<dyn Tool>>> {
        Ok(self.tool_list())
    }
}

/// An operation bound to an executor.
pub struct OperationTool {
    operation: Arc<Operation>,
    client: Arc<dyn RestExecutor>,
}

#[async_trait]
impl Tool for OperationTool {
    fn name(&self) -> &str {
        &self.operation.name
    }

    fn description(&self) -> &str {
        &self.operation.description
    }

    fn schema(&self) -> Schema {
        self.operation.schema.clone().build()
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(ToolError::Cancelled),
            body = run(&self.operation, self.client.as_ref(), &args) => Ok(ToolOutput::Text(body?)),
        }
    }
}
