//! Completion service implementations.

pub mod openai_completion;

pub use openai_completion::OpenAICompletionClient;
