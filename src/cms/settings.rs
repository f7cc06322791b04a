use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use crate::entities::{cms_setting, MediaMap};
use crate::storage::{CmsStorage, StorageResult};
use crate::uploads::UploadField;

/// Singleton CMS documents, addressed by slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    About,
    HeroSection,
    TeamCelebration,
    NavbarConfiguration,
    FooterConfiguration,
    ContactInfo,
}

static KEYS: [(&str, SettingsKey); 6] = [
    ("about", SettingsKey::About),
    ("hero-section", SettingsKey::HeroSection),
    ("team-celebration", SettingsKey::TeamCelebration),
    ("navbar", SettingsKey::NavbarConfiguration),
    ("footer", SettingsKey::FooterConfiguration),
    ("contact-info", SettingsKey::ContactInfo),
];

impl SettingsKey {
    pub fn from_slug(slug: &str) -> Option<Self> {
        KEYS.iter()
            .find(|(key_slug, _)| *key_slug == slug)
            .map(|(_, key)| *key)
    }

    pub fn slug(self) -> &'static str {
        KEYS.iter()
            .find(|(_, key)| *key == self)
            .map(|(slug, _)| *slug)
            .unwrap_or("about")
    }

    pub fn upload_dir(self) -> &'static str {
        match self {
            SettingsKey::About => "about",
            SettingsKey::HeroSection => "hero-section",
            SettingsKey::TeamCelebration => "team-celebration",
            SettingsKey::NavbarConfiguration | SettingsKey::FooterConfiguration => "branding",
            SettingsKey::ContactInfo => "contact",
        }
    }

    pub fn uploads(self) -> &'static [UploadField] {
        match self {
            SettingsKey::About | SettingsKey::TeamCelebration => {
                &[UploadField::Image, UploadField::Video]
            }
            SettingsKey::HeroSection => &[
                UploadField::Image,
                UploadField::MobileImage,
                UploadField::Video,
            ],
            SettingsKey::NavbarConfiguration | SettingsKey::FooterConfiguration => {
                &[UploadField::Logo]
            }
            SettingsKey::ContactInfo => &[],
        }
    }

    /// Sub-fields multipart clients send JSON-encoded.
    pub fn json_fields(self) -> &'static [&'static str] {
        match self {
            SettingsKey::About => &["stats", "values"],
            SettingsKey::HeroSection => &["buttons"],
            SettingsKey::TeamCelebration => &["highlights"],
            SettingsKey::NavbarConfiguration => &["links", "cta"],
            SettingsKey::FooterConfiguration => &["columns", "socialLinks"],
            SettingsKey::ContactInfo => &["phones", "emails", "socialLinks", "hours"],
        }
    }

    /// Body served before an admin has saved anything.
    pub fn default_document(self) -> Value {
        match self {
            SettingsKey::About => json!({
                "title": "About Us",
                "description": "",
                "mission": "",
                "vision": "",
                "stats": [],
                "values": [],
            }),
            SettingsKey::HeroSection => json!({
                "title": "Power your future with clean solar energy",
                "subtitle": "",
                "buttons": [],
            }),
            SettingsKey::TeamCelebration => json!({
                "title": "Our Team",
                "description": "",
                "highlights": [],
            }),
            SettingsKey::NavbarConfiguration => json!({
                "brandName": "Solar",
                "links": [
                    { "label": "Home", "href": "/" },
                    { "label": "Products", "href": "/products" },
                    { "label": "About", "href": "/about" },
                    { "label": "Contact", "href": "/contact" },
                ],
                "cta": { "label": "Get a Quote", "href": "/contact" },
            }),
            SettingsKey::FooterConfiguration => json!({
                "description": "",
                "columns": [],
                "socialLinks": [],
                "copyright": "",
            }),
            SettingsKey::ContactInfo => json!({
                "address": "",
                "phones": [],
                "emails": [],
                "socialLinks": [],
                "hours": [],
                "mapUrl": "",
            }),
        }
    }
}

impl std::fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Returns the stored singleton, inserting `default_factory()` first if the
/// key has never been written. Concurrent first reads all see one document.
pub async fn get_or_create_default<F>(
    store: &dyn CmsStorage,
    key: SettingsKey,
    default_factory: F,
) -> StorageResult<cms_setting::Model>
where
    F: FnOnce() -> Value + Send,
{
    if let Some(existing) = store.get_setting(key.slug()).await? {
        return Ok(existing);
    }

    let stored = store
        .insert_setting_if_absent(cms_setting::Model {
            key: key.slug().to_string(),
            data: default_factory(),
            media: MediaMap::default(),
            updated_at: Utc::now(),
        })
        .await?;
    debug!(key = %key, "settings document initialised");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use anyhow::Result;
    use std::sync::Arc;

    #[test]
    fn test_slugs() {
        for (slug, key) in KEYS {
            assert_eq!(SettingsKey::from_slug(slug), Some(key));
            assert_eq!(key.slug(), slug);
            assert!(key.default_document().is_object());
        }
        assert_eq!(SettingsKey::from_slug("navbar-configuration"), None);
    }

    #[tokio::test]
    async fn test_default_created_once() -> Result<()> {
        let store = MemoryStorage::new();

        let first = get_or_create_default(&store, SettingsKey::About, || json!({ "v": 1 })).await?;
        assert_eq!(first.data["v"], 1);

        let second =
            get_or_create_default(&store, SettingsKey::About, || json!({ "v": 2 })).await?;
        assert_eq!(second.data["v"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_first_reads_agree() -> Result<()> {
        let store = Arc::new(MemoryStorage::new());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                get_or_create_default(&*store, SettingsKey::FooterConfiguration, move || {
                    json!({ "writer": i })
                })
                .await
            }));
        }

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await??.data["writer"].clone());
        }
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
        Ok(())
    }
}
