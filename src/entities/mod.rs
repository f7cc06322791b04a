pub mod cms_entry;
pub mod cms_setting;
pub mod product;
pub mod review;

use std::collections::BTreeMap;

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::uploads::UploadField;

/// Ordered list of strings stored as a JSON array column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct StringList(pub Vec<String>);

/// Free-form key/value product specifications.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Specifications(pub BTreeMap<String, String>);

/// Relative upload URLs keyed by the form field they arrived in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct MediaMap(pub BTreeMap<UploadField, String>);

impl MediaMap {
    pub fn write_into(&self, doc: &mut Map<String, Value>) {
        for (field, url) in &self.0 {
            doc.insert(field.name().to_string(), Value::String(url.clone()));
        }
    }
}
