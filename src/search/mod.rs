use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::product;

/// Full-text index over the product catalog.
#[async_trait]
pub trait ProductIndex: Send + Sync + 'static {
    /// Adds or replaces the product's entry.
    async fn index_product(&self, product: &product::Model) -> Result<()>;
    async fn remove_product(&self, id: Uuid) -> Result<()>;
    /// Matching product ids, best first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<(Uuid, f32)>>;
}

pub mod memory;
pub mod tantivy_index;

pub use memory::MemoryIndex;
pub use tantivy_index::{SearchOptions, TantivyIndex};
