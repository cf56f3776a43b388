mod common;

use async_trait::async_trait;
use common::{answer, calls, ScriptedCompletion};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use toolwright::agent::{Agent, Cancelled, ScriptedPrompts};
use toolwright::tools::{Schema, Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolSet};
use toolwright::types::{ChatRole, ToolCall};

/// Appends its `tag` argument to a shared log.
struct Record {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Tool for Record {
    fn name(&self) -> &str {
        "record"
    }

    fn description(&self) -> &str {
        "Record a tag"
    }

    fn schema(&self) -> Schema {
        Schema::object().property("tag", Schema::string()).build()
    }

    async fn execute(&self, _ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let tag = args
            .get("tag")
            .and_then(|v| v.as_str())
            .unwrap_or("nothing")
            .to_string();
        self.log.lock().unwrap().push(tag.clone());
        Ok(ToolOutput::Text(format!("recorded {tag}")))
    }
}

struct Broken;

#[async_trait]
impl Tool for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn schema(&self) -> Schema {
        Schema::object().build()
    }

    async fn execute(&self, _ctx: &ToolContext, _args: ToolArgs) -> Result<ToolOutput, ToolError> {
        Err(ToolError::Process("boom".into()))
    }
}

/// Cancels the session it runs in.
struct Interrupt;

#[async_trait]
impl Tool for Interrupt {
    fn name(&self) -> &str {
        "interrupt"
    }

    fn description(&self) -> &str {
        "Cancel the session"
    }

    fn schema(&self) -> Schema {
        Schema::object().build()
    }

    async fn execute(&self, ctx: &ToolContext, _args: ToolArgs) -> Result<ToolOutput, ToolError> {
        ctx.cancel.cancel();
        Ok(ToolOutput::Text("stopping".into()))
    }
}

fn agent(completion: Arc<ScriptedCompletion>, log: &Arc<Mutex<Vec<String>>>) -> Agent {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(Record { log: log.clone() }),
        Arc::new(Broken),
        Arc::new(Interrupt),
    ];
    Agent::new(completion, ToolSet::new(tools)).with_system_prompt("You are a test.")
}

#[tokio::test]
async fn tool_calls_run_in_order_and_results_follow_the_assistant_message() {
    let completion = ScriptedCompletion::new([
        calls(vec![
            ToolCall::new("c1", "record", r#"{"tag":"a"}"#),
            ToolCall::new("c2", "record", r#"{"tag":"b"}"#),
        ]),
        answer("done"),
    ]);
    let log = Arc::new(Mutex::new(Vec::new()));
    let agent = agent(completion.clone(), &log);
    let mut session = agent.new_session();

    let reply = agent
        .ask(&mut session, "tag things", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply, "done");
    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);

    let roles: Vec<ChatRole> = session.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            ChatRole::System,
            ChatRole::User,
            ChatRole::Assistant,
            ChatRole::Tool,
            ChatRole::Tool,
            ChatRole::Assistant,
        ]
    );
    assert_eq!(session.messages()[3].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(session.messages()[3].content, "recorded a");
    assert_eq!(session.messages()[4].tool_call_id.as_deref(), Some("c2"));

    let requests = completion.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].len(), 2);
    assert_eq!(requests[1].len(), 5);
    assert_eq!(completion.offered_tools(), vec!["record", "broken", "interrupt"]);
}

#[tokio::test]
async fn unknown_tool_is_reported_back_to_the_model() {
    let completion = ScriptedCompletion::new([
        calls(vec![ToolCall::new("c1", "missing", "{}")]),
        answer("sorry"),
    ]);
    let log = Arc::new(Mutex::new(Vec::new()));
    let agent = agent(completion.clone(), &log);
    let mut session = agent.new_session();

    let reply = agent
        .ask(&mut session, "go", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply, "sorry");
    let second = &completion.requests()[1];
    let result = second.last().unwrap();
    assert_eq!(result.role, ChatRole::Tool);
    assert_eq!(result.content, "Unknown tool: missing");
}

#[tokio::test]
async fn malformed_arguments_are_treated_as_empty() {
    let completion = ScriptedCompletion::new([
        calls(vec![ToolCall::new("c1", "record", "{tag: oops")]),
        answer("ok"),
    ]);
    let log = Arc::new(Mutex::new(Vec::new()));
    let agent = agent(completion.clone(), &log);
    let mut session = agent.new_session();

    agent
        .ask(&mut session, "go", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["nothing"]);
}

#[tokio::test]
async fn tool_errors_become_tool_results() {
    let completion = ScriptedCompletion::new([
        calls(vec![
            ToolCall::new("c1", "broken", "{}"),
            ToolCall::new("c2", "record", r#"{"tag":"after"}"#),
        ]),
        answer("handled"),
    ]);
    let log = Arc::new(Mutex::new(Vec::new()));
    let agent = agent(completion.clone(), &log);
    let mut session = agent.new_session();

    let reply = agent
        .ask(&mut session, "go", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply, "handled");
    assert_eq!(session.messages()[3].content, "process error: boom");
    assert_eq!(*log.lock().unwrap(), vec!["after"]);
}

#[tokio::test]
async fn completion_failure_propagates_and_rolls_back() {
    let completion = ScriptedCompletion::new([calls(vec![ToolCall::new(
        "c1",
        "record",
        r#"{"tag":"x"}"#,
    )])]);
    completion.then_fail("upstream down");
    let log = Arc::new(Mutex::new(Vec::new()));
    let agent = agent(completion.clone(), &log);
    let mut session = agent.new_session();

    let err = agent
        .ask(&mut session, "go", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("upstream down"));
    assert_eq!(session.len(), 1);
    assert_eq!(completion.requests().len(), 2);
}

#[tokio::test]
async fn cancelled_session_stops_before_the_next_round() {
    let completion = ScriptedCompletion::new([
        calls(vec![ToolCall::new("c1", "interrupt", "{}")]),
        answer("never sent"),
    ]);
    let log = Arc::new(Mutex::new(Vec::new()));
    let agent = agent(completion.clone(), &log);
    let mut session = agent.new_session();

    let err = agent
        .ask(&mut session, "go", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<Cancelled>().is_some());
    assert_eq!(completion.requests().len(), 1);
    assert_eq!(session.len(), 1);
}

#[tokio::test]
async fn run_skips_blank_prompts_and_keeps_history() {
    let completion = ScriptedCompletion::new([answer("first"), answer("second")]);
    let log = Arc::new(Mutex::new(Vec::new()));
    let agent = agent(completion.clone(), &log);
    let mut session = agent.new_session();
    let mut prompts = ScriptedPrompts::new(["", "hello", "   ", "again"]);

    agent
        .run(&mut session, &mut prompts, &CancellationToken::new())
        .await
        .unwrap();

    let requests = completion.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].len(), 4);
    assert_eq!(requests[1][3].content, "again");
    assert_eq!(session.len(), 5);
}
