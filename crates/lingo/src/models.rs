//! These models represent the objects passed around by the dispatch loop
//!
//! The transcript is an ordered, append-only `Vec<Message>` and is the sole
//! conversation state. Tool requests arrive inside assistant messages as the
//! remote model emits them; tool results go back as `Role::Tool` messages
//! carrying the stringified return value and the originating call id. Wire
//! formats (the OpenAI chat-completions shapes) are converted to and from
//! these internal structs at the provider boundary, never used directly.
pub mod message;
pub mod role;
pub mod tool;
