use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use super::{Specifications, StringList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum Category {
    #[sea_orm(string_value = "Solar Panels")]
    #[serde(rename = "Solar Panels")]
    SolarPanels,
    #[sea_orm(string_value = "Inverters")]
    Inverters,
    #[sea_orm(string_value = "Batteries")]
    Batteries,
    #[sea_orm(string_value = "Accessories")]
    Accessories,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::SolarPanels,
        Category::Inverters,
        Category::Batteries,
        Category::Accessories,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::SolarPanels => "Solar Panels",
            Category::Inverters => "Inverters",
            Category::Batteries => "Batteries",
            Category::Accessories => "Accessories",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(label))
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub category: Category,
    pub new_price: String,
    pub old_price: Option<String>,
    /// Numeric reading of `new_price`, kept for sorting.
    #[sea_orm(column_type = "Double")]
    pub price_value: f64,
    pub stock: i32,
    pub is_active: bool,
    pub is_featured: bool,
    #[sea_orm(column_type = "Double")]
    pub average_rating: f64,
    pub review_count: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub specifications: Specifications,
    #[sea_orm(column_type = "JsonBinary")]
    pub images: StringList,
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: StringList,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::review::Entity")]
    Review,
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            self.updated_at = Set(chrono::Utc::now());
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
        assert_eq!(Category::from_label("solar panels"), Some(Category::SolarPanels));
        assert_eq!(Category::from_label("Wind Turbines"), None);
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&Category::SolarPanels).unwrap();
        assert_eq!(json, "\"Solar Panels\"");
    }
}
