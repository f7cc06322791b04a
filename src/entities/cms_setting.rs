use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use super::MediaMap;

/// A singleton CMS document (about page, navbar, footer, ...) keyed by a fixed slug.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cms_settings")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub media: MediaMap,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn to_document(&self) -> Json {
        let mut doc = match &self.data {
            Json::Object(map) => map.clone(),
            _ => Map::new(),
        };
        self.media.write_into(&mut doc);
        doc.insert("key".to_string(), json!(self.key));
        doc.insert("updatedAt".to_string(), json!(self.updated_at));
        Json::Object(doc)
    }
}
