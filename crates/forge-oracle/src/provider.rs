use async_trait::async_trait;
use forge_core::Result;

/// Trait implemented by each oracle backend (HTTP-based or mock).
///
/// Both methods return raw text. Interpretation output is expected to carry
/// an action envelope, but enforcing that is the caller's job — a backend
/// must never silently repair malformed output.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Human-readable backend name, e.g. "openai", "mock".
    fn name(&self) -> &str;

    /// Interpret user input against the assembled context (capabilities,
    /// recalled facts, recent turns). Returns the model's raw reply.
    async fn interpret(&self, context: &str, input: &str) -> Result<String>;

    /// Draft source text from a scaffold or repair prompt.
    async fn draft(&self, prompt: &str) -> Result<String>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<()>;
}
