pub mod icon;
pub mod resource;
pub mod settings;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

pub use icon::Icon;
pub use resource::{CmsResource, ResourceDescriptor};
pub use settings::{get_or_create_default, SettingsKey};

use crate::entities::{cms_entry, cms_setting, MediaMap};
use crate::error::{AppError, AppResult, FieldError};
use crate::form::FormFields;
use crate::models::ActivityEvent;
use crate::storage::{CmsStorage, EntryQuery, EntrySort, Page};
use crate::uploads::{UploadField, UploadStore, UploadedFile};

/// Keys the server owns; clients cannot write them through the content body.
const RESERVED_FIELDS: [&str; 8] = [
    "id",
    "_id",
    "resource",
    "order",
    "isActive",
    "media",
    "createdAt",
    "updatedAt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// The whole list in its new order.
    Moved(Vec<cms_entry::Model>),
    /// First item moved up or last item moved down.
    AtBoundary,
}

struct ContentRules {
    required: &'static [(&'static str, &'static str)],
    json_fields: &'static [&'static str],
    icon_field: Option<&'static str>,
}

impl From<&ResourceDescriptor> for ContentRules {
    fn from(descriptor: &ResourceDescriptor) -> Self {
        Self {
            required: descriptor.required,
            json_fields: descriptor.json_fields,
            icon_field: descriptor.icon_field,
        }
    }
}

/// Content collections and singleton documents behind the public site.
pub struct Cms {
    storage: Arc<dyn CmsStorage>,
    uploads: UploadStore,
    notification_tx: broadcast::Sender<ActivityEvent>,
    order_lock: Mutex<()>,
}

impl Cms {
    pub fn new(
        storage: Arc<dyn CmsStorage>,
        uploads: UploadStore,
        notification_tx: broadcast::Sender<ActivityEvent>,
    ) -> Self {
        Self {
            storage,
            uploads,
            notification_tx,
            order_lock: Mutex::new(()),
        }
    }

    fn notify(&self, event: ActivityEvent) {
        let _ = self.notification_tx.send(event);
    }

    pub async fn list(
        &self,
        resource: CmsResource,
        query: &EntryQuery,
    ) -> AppResult<Page<cms_entry::Model>> {
        Ok(self.storage.list_entries(resource, query).await?)
    }

    pub async fn get(&self, resource: CmsResource, id: Uuid) -> AppResult<cms_entry::Model> {
        self.storage
            .get_entry(resource, id)
            .await?
            .ok_or(AppError::NotFound("Content"))
    }

    pub async fn create(
        &self,
        resource: CmsResource,
        fields: FormFields,
        files: Vec<UploadedFile>,
    ) -> AppResult<cms_entry::Model> {
        let descriptor = resource.descriptor();
        let content = parse_content(&fields, &ContentRules::from(descriptor), true)?;
        let is_active = fields.bool("isActive")?.unwrap_or(true);
        let uploaded = self
            .store_files(descriptor.upload_dir, descriptor.uploads, &files)
            .await?;

        let now = Utc::now();
        let inserted = {
            let _order = self.order_lock.lock().await;
            match self.storage.next_position(resource).await {
                Ok(position) => {
                    self.storage
                        .insert_entry(cms_entry::Model {
                            id: Uuid::new_v4(),
                            resource,
                            position,
                            is_active,
                            data: Value::Object(content),
                            media: MediaMap(uploaded.clone()),
                            created_at: now,
                            updated_at: now,
                        })
                        .await
                }
                Err(e) => Err(e),
            }
        };

        let entry = match inserted {
            Ok(entry) => entry,
            Err(e) => {
                self.discard(uploaded.values()).await;
                return Err(e.into());
            }
        };

        info!(%resource, id = %entry.id, "content created");
        self.notify(ActivityEvent::content_changed(resource, Some(entry.id)));
        Ok(entry)
    }

    /// Merges the supplied fields into the stored content. Omitted fields keep
    /// their value; a new file replaces the previous one for its field and an
    /// empty value for an upload field clears it.
    pub async fn update(
        &self,
        resource: CmsResource,
        id: Uuid,
        fields: FormFields,
        files: Vec<UploadedFile>,
    ) -> AppResult<cms_entry::Model> {
        let descriptor = resource.descriptor();
        let mut entry = self.get(resource, id).await?;
        let content = parse_content(&fields, &ContentRules::from(descriptor), false)?;
        let is_active = fields.bool("isActive")?;
        let uploaded = self
            .store_files(descriptor.upload_dir, descriptor.uploads, &files)
            .await?;

        let mut data = match std::mem::take(&mut entry.data) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        data.extend(content);
        entry.data = Value::Object(data);
        if let Some(is_active) = is_active {
            entry.is_active = is_active;
        }
        let replaced = apply_media(
            &mut entry.media,
            uploaded.clone(),
            descriptor.uploads,
            &fields,
        );
        entry.updated_at = Utc::now();

        let entry = match self.storage.update_entry(entry).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.discard(uploaded.values()).await;
                return Err(AppError::NotFound("Content"));
            }
            Err(e) => {
                self.discard(uploaded.values()).await;
                return Err(e.into());
            }
        };
        self.discard(replaced.iter()).await;

        debug!(%resource, %id, "content updated");
        self.notify(ActivityEvent::content_changed(resource, Some(id)));
        Ok(entry)
    }

    pub async fn delete(&self, resource: CmsResource, id: Uuid) -> AppResult<cms_entry::Model> {
        let entry = self
            .storage
            .delete_entry(resource, id)
            .await?
            .ok_or(AppError::NotFound("Content"))?;
        self.discard(entry.media.0.values()).await;

        info!(%resource, %id, "content deleted");
        self.notify(ActivityEvent::content_changed(resource, Some(id)));
        Ok(entry)
    }

    /// Swaps an entry with its neighbour and renumbers the whole list.
    pub async fn move_entry(
        &self,
        resource: CmsResource,
        id: Uuid,
        direction: Direction,
    ) -> AppResult<MoveOutcome> {
        ensure_orderable(resource)?;
        let _order = self.order_lock.lock().await;

        let mut entries = self.ordered(resource).await?;
        let index = entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(AppError::NotFound("Content"))?;

        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < entries.len() => index + 1,
            _ => {
                debug!(%resource, %id, ?direction, "move at boundary");
                return Ok(MoveOutcome::AtBoundary);
            }
        };
        entries.swap(index, target);

        self.write_order(resource, &mut entries).await?;
        info!(%resource, %id, ?direction, "content moved");
        self.notify(ActivityEvent::content_changed(resource, None));
        Ok(MoveOutcome::Moved(entries))
    }

    /// Applies an explicit ordering. `ids` must name every entry exactly once.
    pub async fn reorder(
        &self,
        resource: CmsResource,
        ids: &[Uuid],
    ) -> AppResult<Vec<cms_entry::Model>> {
        ensure_orderable(resource)?;
        let _order = self.order_lock.lock().await;

        let mut by_id: HashMap<Uuid, cms_entry::Model> = self
            .ordered(resource)
            .await?
            .into_iter()
            .map(|entry| (entry.id, entry))
            .collect();
        if ids.len() != by_id.len() {
            return Err(AppError::bad_request(
                "ids must list every entry exactly once",
            ));
        }

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            let entry = by_id.remove(id).ok_or_else(|| {
                AppError::bad_request("ids must list every entry exactly once")
            })?;
            entries.push(entry);
        }

        self.write_order(resource, &mut entries).await?;
        info!(%resource, count = entries.len(), "content reordered");
        self.notify(ActivityEvent::content_changed(resource, None));
        Ok(entries)
    }

    pub async fn setting(&self, key: SettingsKey) -> AppResult<cms_setting::Model> {
        Ok(get_or_create_default(self.storage.as_ref(), key, || key.default_document()).await?)
    }

    /// Replaces a singleton's body. Uploads follow the same rules as entries.
    pub async fn update_setting(
        &self,
        key: SettingsKey,
        fields: FormFields,
        files: Vec<UploadedFile>,
    ) -> AppResult<cms_setting::Model> {
        let current = self.setting(key).await?;
        let rules = ContentRules {
            required: &[],
            json_fields: key.json_fields(),
            icon_field: None,
        };
        let content = parse_content(&fields, &rules, false)?;
        let uploaded = self
            .store_files(key.upload_dir(), key.uploads(), &files)
            .await?;

        let mut media = current.media;
        let replaced = apply_media(&mut media, uploaded.clone(), key.uploads(), &fields);

        let saved = self
            .storage
            .save_setting(cms_setting::Model {
                key: current.key,
                data: Value::Object(content),
                media,
                updated_at: Utc::now(),
            })
            .await;
        let setting = match saved {
            Ok(setting) => setting,
            Err(e) => {
                self.discard(uploaded.values()).await;
                return Err(e.into());
            }
        };
        self.discard(replaced.iter()).await;

        info!(key = %key, "settings updated");
        self.notify(ActivityEvent::ContentChanged {
            resource: format!("settings/{}", key.slug()),
            id: None,
        });
        Ok(setting)
    }

    /// Stores a file that is not attached to any entry (rich-text editor
    /// images). Returns the relative URL.
    pub async fn upload(&self, resource: CmsResource, file: &UploadedFile) -> AppResult<String> {
        if !resource.accepts_upload(file.field) {
            return Err(unexpected_field(file.field));
        }
        let url = self
            .uploads
            .save(resource.descriptor().upload_dir, file)
            .await?;
        info!(%resource, url, "standalone upload stored");
        Ok(url)
    }

    async fn ordered(&self, resource: CmsResource) -> AppResult<Vec<cms_entry::Model>> {
        let query = EntryQuery {
            sort: EntrySort::Order,
            page: 1,
            ..Default::default()
        };
        Ok(self.storage.list_entries(resource, &query).await?.items)
    }

    async fn write_order(
        &self,
        resource: CmsResource,
        entries: &mut [cms_entry::Model],
    ) -> AppResult<()> {
        let positions: Vec<(Uuid, i32)> = entries
            .iter()
            .zip(0..)
            .map(|(entry, position)| (entry.id, position))
            .collect();
        self.storage.write_positions(resource, &positions).await?;

        for (entry, (_, position)) in entries.iter_mut().zip(positions) {
            entry.position = position;
        }
        Ok(())
    }

    /// Saves each file under `dir`. A later file for the same field wins. Any
    /// failure removes what was already written.
    async fn store_files(
        &self,
        dir: &str,
        allowed: &[UploadField],
        files: &[UploadedFile],
    ) -> AppResult<BTreeMap<UploadField, String>> {
        if let Some(file) = files.iter().find(|file| !allowed.contains(&file.field)) {
            return Err(unexpected_field(file.field));
        }

        let mut stored = BTreeMap::new();
        for file in files {
            match self.uploads.save(dir, file).await {
                Ok(url) => {
                    if let Some(previous) = stored.insert(file.field, url) {
                        self.uploads.remove(&previous).await;
                    }
                }
                Err(e) => {
                    self.discard(stored.values()).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    async fn discard<'a>(&self, urls: impl Iterator<Item = &'a String>) {
        for url in urls {
            self.uploads.remove(url).await;
        }
    }
}

fn ensure_orderable(resource: CmsResource) -> AppResult<()> {
    if resource.is_orderable() {
        Ok(())
    } else {
        Err(AppError::bad_request(format!(
            "{resource} does not support ordering"
        )))
    }
}

fn unexpected_field(field: UploadField) -> AppError {
    AppError::bad_request(format!("Unexpected file field: {}", field.name()))
}

/// Puts new uploads in place and drops cleared ones. Returns the URLs that
/// are no longer referenced.
fn apply_media(
    media: &mut MediaMap,
    uploaded: BTreeMap<UploadField, String>,
    allowed: &[UploadField],
    fields: &FormFields,
) -> Vec<String> {
    let mut released = Vec::new();

    for field in allowed {
        let cleared = matches!(
            fields.get(field.name()),
            Some(Value::Null) | Some(Value::String(_))
        ) && fields.text(field.name()).is_none();
        if cleared && !uploaded.contains_key(field) {
            released.extend(media.0.remove(field));
        }
    }

    for (field, url) in uploaded {
        released.extend(media.0.insert(field, url));
    }
    released
}

/// Reads the content body of a form. Upload field names and server-owned
/// keys are skipped; JSON sub-fields are decoded and icons resolved.
fn parse_content(
    fields: &FormFields,
    rules: &ContentRules,
    creating: bool,
) -> AppResult<Map<String, Value>> {
    let mut errors = Vec::new();
    for (key, label) in rules.required {
        if creating {
            fields.require_text(key, label, &mut errors);
        } else if fields.contains(key) && fields.text(key).is_none() {
            errors.push(FieldError::new(*key, format!("{label} cannot be empty")));
        }
    }

    let mut content = Map::new();
    for (key, value) in fields.clone().into_map() {
        if RESERVED_FIELDS.contains(&key.as_str()) || UploadField::from_name(&key).is_some() {
            continue;
        }

        if rules.json_fields.contains(&key.as_str()) {
            match fields.json::<Value>(&key) {
                Ok(Some(parsed)) => {
                    content.insert(key, parsed);
                }
                Ok(None) => {
                    content.insert(key, Value::Null);
                }
                Err(AppError::Validation(mut field_errors)) => errors.append(&mut field_errors),
                Err(e) => return Err(e),
            }
            continue;
        }

        if rules.icon_field == Some(key.as_str()) {
            match fields.text(&key) {
                Some(name) => match Icon::from_name(&name) {
                    Some(icon) => {
                        content.insert(key, Value::String(icon.name().to_string()));
                    }
                    None => errors.push(FieldError::new(key, format!("Unknown icon: {name}"))),
                },
                None => {
                    content.insert(key, Value::Null);
                }
            }
            continue;
        }

        let value = match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        };
        content.insert(key, value);
    }

    if errors.is_empty() {
        Ok(content)
    } else {
        Err(AppError::Validation(errors))
    }
}
