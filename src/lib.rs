pub mod auth;
pub mod catalog;
pub mod cms;
pub mod config;
pub mod entities;
pub mod error;
pub mod form;
mod models;
pub mod notifications;
pub mod routes;
pub mod search;
pub mod state;
pub mod storage;
pub mod uploads;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::ActivityEvent;
pub use routes::router;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormFields;
    use crate::search::MemoryIndex;
    use crate::storage::memory::MemoryStorage;
    use anyhow::Result;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn fields(value: Value) -> FormFields {
        match value {
            Value::Object(map) => FormFields::new(map),
            _ => unreachable!(),
        }
    }

    fn memory_state(upload_dir: &std::path::Path) -> AppState {
        let storage = Arc::new(MemoryStorage::new());
        AppState::new(
            Config::for_tests(upload_dir),
            storage.clone(),
            storage,
            Arc::new(MemoryIndex::new()),
        )
    }

    #[tokio::test]
    async fn test_catalog_operations() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let state = memory_state(dir.path());

        let panel = state
            .catalog
            .create_product(
                fields(json!({
                    "title": "Mono PERC 540W",
                    "newPrice": "Rs. 18,500",
                    "category": "Solar Panels",
                    "tags": "[\"mono\", \"perc\"]",
                })),
                Vec::new(),
            )
            .await?;
        let inverter = state
            .catalog
            .create_product(
                fields(json!({
                    "title": "Hybrid Inverter 5kW",
                    "newPrice": "Rs. 95,000",
                    "category": "Inverters",
                })),
                Vec::new(),
            )
            .await?;

        let found = state.catalog.get_product(panel.id).await?;
        assert_eq!(found.title, "Mono PERC 540W");

        let results = state.catalog.search_products("inverter").await?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, inverter.id);

        state.catalog.delete_product(inverter.id).await?;
        assert!(state.catalog.search_products("inverter").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_activity_notifications() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let state = memory_state(dir.path());
        let mut activity = state.hub.subscribe();

        let product = state
            .catalog
            .create_product(
                fields(json!({
                    "title": "Lithium Battery 10kWh",
                    "newPrice": "250000",
                    "category": "Batteries",
                })),
                Vec::new(),
            )
            .await?;

        match timeout(Duration::from_secs(1), activity.next()).await? {
            Some(Ok(ActivityEvent::ProductCreated(created))) => assert_eq!(created.id, product.id),
            other => panic!("expected ProductCreated, got {other:?}"),
        }

        state.catalog.delete_product(product.id).await?;

        match timeout(Duration::from_secs(1), activity.next()).await? {
            Some(Ok(ActivityEvent::ProductDeleted { id })) => assert_eq!(id, product.id),
            other => panic!("expected ProductDeleted, got {other:?}"),
        }
        Ok(())
    }
}
