use ghostwriter_core::completion::CompletionError;

/// Internal events delivered to a session's run loop.
///
/// Timer firings and finished completion requests arrive here instead of
/// mutating the session from another task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The completion debounce for a paragraph elapsed.
    CompletionDue { paragraph_id: String },
    /// The auto-save idle timer elapsed.
    AutoSaveDue,
    /// A completion request finished, successfully or not.
    CompletionFinished {
        paragraph_id: String,
        token: u64,
        result: Result<String, CompletionError>,
    },
}
