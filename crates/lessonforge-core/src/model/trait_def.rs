//! The `ModelClient` trait -- the seam for outbound model calls.
//!
//! The orchestrator holds an `Arc<dyn ModelClient>`, so tests substitute
//! scripted doubles and the binary plugs in [`super::HttpModelClient`].

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

use super::types::ModelRequest;

/// A chat-completion backend.
///
/// Responses are free text that should, but need not, contain one JSON
/// object. Implementations do not interpret the text.
///
/// # Object Safety
///
/// Every method returns a concrete type or a boxed stream, so the trait
/// can be used as `dyn ModelClient`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short name for logs (e.g. "openai").
    fn name(&self) -> &str;

    /// Send `request` and return the full response text.
    async fn complete(&self, request: &ModelRequest) -> Result<String>;

    /// Send `request` and yield the response text as it arrives.
    ///
    /// The default yields the result of [`ModelClient::complete`] as a
    /// single chunk.
    fn stream<'a>(&'a self, request: &'a ModelRequest) -> BoxStream<'a, Result<String>> {
        futures::stream::once(self.complete(request)).boxed()
    }
}

// Compile-time assertion: ModelClient must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ModelClient) {}
};
