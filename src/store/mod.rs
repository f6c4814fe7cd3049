//! Graph store backends.
//!
//! Results come back in the untyped GraphSON 1.0 JSON shape regardless of the
//! backend, so dispatchers can treat them as plain `serde_json::Value`s.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::traversal::Traversal;

mod memory;
mod neptune;

pub use memory::MemoryGraph;
pub use neptune::NeptuneGraph;

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run a traversal to completion and return every result.
    async fn submit(&self, traversal: &Traversal) -> Result<Vec<Value>>;

    /// Run a traversal and keep only its first result, like `next()`.
    async fn first(&self, traversal: &Traversal) -> Result<Option<Value>> {
        Ok(self.submit(traversal).await?.into_iter().next())
    }
}
