use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::cms::Cms;
use crate::config::Config;
use crate::error::expose_internal_details;
use crate::notifications::NotificationHub;
use crate::search::{ProductIndex, TantivyIndex};
use crate::storage::memory::MemoryStorage;
use crate::storage::postgres::PostgresStorage;
use crate::storage::{CatalogStorage, CmsStorage};
use crate::uploads::UploadStore;

/// Shared handles given to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub cms: Arc<Cms>,
    pub uploads: UploadStore,
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    pub fn new(
        config: Config,
        catalog_storage: Arc<dyn CatalogStorage>,
        cms_storage: Arc<dyn CmsStorage>,
        index: Arc<dyn ProductIndex>,
    ) -> Self {
        let hub = Arc::new(NotificationHub::new());
        let uploads = UploadStore::new(config.upload_dir().clone(), config.api_base_url().clone());

        let catalog = Catalog::new(catalog_storage, index, uploads.clone(), hub.sender());
        let cms = Cms::new(cms_storage, uploads.clone(), hub.sender());

        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            cms: Arc::new(cms),
            uploads,
            hub,
        }
    }

    /// Connects the configured stores, opens the search index and fills it.
    pub async fn build(config: Config) -> Result<Self> {
        expose_internal_details(!config.production());

        let (catalog_storage, cms_storage) = connect_storage(&config).await?;

        let index = match config.search_index_dir() {
            Some(dir) => {
                info!(dir = %dir.display(), "opening on-disk search index");
                TantivyIndex::open_or_create(dir)?
            }
            None => TantivyIndex::in_ram()?,
        };

        tokio::fs::create_dir_all(config.upload_dir()).await?;

        let state = Self::new(config, catalog_storage, cms_storage, Arc::new(index));
        state.catalog.rebuild_index().await?;
        Ok(state)
    }
}

async fn connect_storage(
    config: &Config,
) -> Result<(Arc<dyn CatalogStorage>, Arc<dyn CmsStorage>)> {
    let catalog_url = config.database_url().as_deref();
    let cms_url = config.cms_database_url().as_deref();

    match (catalog_url, cms_url) {
        (Some(catalog_url), Some(cms_url)) if catalog_url == cms_url => {
            info!("using one Postgres database for catalog and content");
            let storage = Arc::new(PostgresStorage::new(catalog_url).await?);
            let catalog: Arc<dyn CatalogStorage> = storage.clone();
            let cms: Arc<dyn CmsStorage> = storage;
            Ok((catalog, cms))
        }
        (catalog_url, cms_url) => {
            let catalog: Arc<dyn CatalogStorage> = match catalog_url {
                Some(url) => Arc::new(PostgresStorage::new(url).await?),
                None => {
                    warn!("DATABASE_URL not set, catalog uses in-memory storage");
                    Arc::new(MemoryStorage::new())
                }
            };
            let cms: Arc<dyn CmsStorage> = match cms_url {
                Some(url) => Arc::new(PostgresStorage::new(url).await?),
                None => {
                    warn!("DATABASE_URL_CMS not set, content uses in-memory storage");
                    Arc::new(MemoryStorage::new())
                }
            };
            Ok((catalog, cms))
        }
    }
}
