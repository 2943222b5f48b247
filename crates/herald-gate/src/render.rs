use thiserror::Error;

/// A template could not be rendered; the whole batch is abandoned
/// before anything reaches the queue.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct RenderError(pub String);

/// Per-recipient values the gate injects into the render context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    /// Unsubscribe link for this recipient, when the feature is on.
    pub unsubscribe_url: Option<String>,
}

/// Produces a message body from a template reference.
///
/// Template storage and the template language are the embedding
/// application's business; the gate only requires that rendering is
/// deterministic for a given reference and context.
pub trait Render {
    fn render(&self, template: &str, context: &RenderContext) -> Result<String, RenderError>;
}
