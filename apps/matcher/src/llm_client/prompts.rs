// Shared prompt constants for chat-completion calls.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// Default system instruction for HR-style assessments.
pub const HR_ASSISTANT_SYSTEM: &str = "You are a helpful HR assistant.";
