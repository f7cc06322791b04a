use serde::Serialize;
use uuid::Uuid;

use crate::cms::CmsResource;
use crate::entities::{product, review};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActivityEvent {
    ProductCreated(product::Model),
    ProductUpdated(product::Model),
    ProductDeleted {
        id: Uuid,
    },
    ReviewSubmitted(review::Model),
    ReviewModerated(review::Model),
    ReviewDeleted {
        id: Uuid,
        product_id: Uuid,
    },
    RatingRecomputed {
        product_id: Uuid,
        average_rating: f64,
        review_count: u64,
    },
    ContentChanged {
        resource: String,
        id: Option<Uuid>,
    },
}

impl ActivityEvent {
    pub fn content_changed(resource: CmsResource, id: Option<Uuid>) -> Self {
        ActivityEvent::ContentChanged {
            resource: resource.slug().to_string(),
            id,
        }
    }
}
