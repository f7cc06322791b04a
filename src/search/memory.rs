use crate::entities::product;
use crate::search::ProductIndex;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Substring matcher used by tests and database-less runs.
#[derive(Clone, Default)]
pub struct MemoryIndex {
    products: DashMap<Uuid, (String, String)>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductIndex for MemoryIndex {
    async fn index_product(&self, product: &product::Model) -> Result<()> {
        let body = format!("{} {}", product.description, product.category.label());
        self.products
            .insert(product.id, (product.title.to_lowercase(), body.to_lowercase()));
        Ok(())
    }

    async fn remove_product(&self, id: Uuid) -> Result<()> {
        self.products.remove(&id);
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<(Uuid, f32)>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<(Uuid, f32)> = self
            .products
            .iter()
            .filter_map(|entry| {
                let (title, body) = entry.value();
                if title.contains(&query) {
                    Some((*entry.key(), 2.0))
                } else if body.contains(&query) {
                    Some((*entry.key(), 1.0))
                } else {
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| b.1.total_cmp(&a.1));
        results.truncate(limit);
        Ok(results)
    }
}
