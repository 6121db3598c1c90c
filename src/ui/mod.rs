//! Chat front-end model
//!
//! Everything a front-end needs that is not drawing: the message model, the
//! stream chunks that build assistant replies, the session that folds them
//! together, and the rules for what each part displays. The terminal client
//! drives it directly; the browser shell mirrors the same rules in script.

mod continuation;
mod convert;
mod message;
pub mod render;
mod session;
mod stream;

pub use continuation::last_assistant_message_is_complete_with_tool_calls;
pub use convert::convert_to_model_messages;
pub use message::{
    ChatRequest, ToolState, TransitionError, UiMessage, UiPart, UiRole, UiToolPart,
    TOOL_PART_PREFIX,
};
pub use render::{render_part, render_tool_part, RenderOptions, Rendered};
pub use session::ChatSession;
pub use stream::{UiStreamChunk, DONE_MARKER, UI_STREAM_HEADER, UI_STREAM_VERSION};
