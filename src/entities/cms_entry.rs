use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use super::MediaMap;
use crate::cms::CmsResource;

/// One item of a list-shaped CMS resource (a director, a blog post, a hero slide, ...).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cms_entries")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub resource: CmsResource,
    #[serde(rename = "order")]
    pub position: i32,
    pub is_active: bool,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub media: MediaMap,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Flat public shape: content fields, then upload URLs by field name, then
    /// bookkeeping fields.
    pub fn to_document(&self) -> Json {
        let mut doc = match &self.data {
            Json::Object(map) => map.clone(),
            _ => Map::new(),
        };
        self.media.write_into(&mut doc);
        doc.insert("id".to_string(), json!(self.id));
        doc.insert("order".to_string(), json!(self.position));
        doc.insert("isActive".to_string(), json!(self.is_active));
        doc.insert("createdAt".to_string(), json!(self.created_at));
        doc.insert("updatedAt".to_string(), json!(self.updated_at));
        Json::Object(doc)
    }
}
