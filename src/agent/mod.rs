pub mod context;
pub mod input;
pub mod loop_;
pub mod render;
pub mod system_prompt;

pub use context::{compose_prompt, Session};
pub use input::{PromptSource, ScriptedPrompts, StdinPrompts};
pub use loop_::{dispatch, parse_arguments, Agent, Cancelled};
pub use render::{ConsoleRenderer, Renderer, SilentRenderer, ToolOutcome};
