use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::uploads::UploadField;
use crate::uploads::UploadField::{Document, Image, Logo, MobileImage, Photo, Video};

/// List-shaped CMS collections. The string value doubles as the URL slug.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum CmsResource {
    #[sea_orm(string_value = "heroes")]
    #[serde(rename = "heroes")]
    Hero,
    #[sea_orm(string_value = "directors")]
    #[serde(rename = "directors")]
    Director,
    #[sea_orm(string_value = "team-members")]
    #[serde(rename = "team-members")]
    TeamMember,
    #[sea_orm(string_value = "blogs")]
    #[serde(rename = "blogs")]
    Blog,
    #[sea_orm(string_value = "press-releases")]
    #[serde(rename = "press-releases")]
    PressRelease,
    #[sea_orm(string_value = "achievements")]
    #[serde(rename = "achievements")]
    Achievement,
    #[sea_orm(string_value = "processes")]
    #[serde(rename = "processes")]
    Process,
    #[sea_orm(string_value = "solar-journey")]
    #[serde(rename = "solar-journey")]
    SolarJourney,
    #[sea_orm(string_value = "testimonials")]
    #[serde(rename = "testimonials")]
    Testimonial,
    #[sea_orm(string_value = "faqs")]
    #[serde(rename = "faqs")]
    Faq,
    #[sea_orm(string_value = "partners")]
    #[serde(rename = "partners")]
    Partner,
    #[sea_orm(string_value = "projects")]
    #[serde(rename = "projects")]
    Project,
    #[sea_orm(string_value = "certifications")]
    #[serde(rename = "certifications")]
    Certification,
    #[sea_orm(string_value = "services")]
    #[serde(rename = "services")]
    Service,
    #[sea_orm(string_value = "gallery")]
    #[serde(rename = "gallery")]
    Gallery,
}

/// What a resource accepts and how it is stored.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    pub slug: &'static str,
    pub upload_dir: &'static str,
    /// `(field, label)` pairs that must be non-blank on create.
    pub required: &'static [(&'static str, &'static str)],
    /// Structured sub-fields multipart clients send JSON-encoded.
    pub json_fields: &'static [&'static str],
    pub uploads: &'static [UploadField],
    pub orderable: bool,
    pub icon_field: Option<&'static str>,
}

static DESCRIPTORS: [(CmsResource, ResourceDescriptor); 15] = [
    (
        CmsResource::Hero,
        ResourceDescriptor {
            slug: "heroes",
            upload_dir: "heroes",
            required: &[("title", "Title")],
            json_fields: &["buttons"],
            uploads: &[Image, MobileImage, Video],
            orderable: true,
            icon_field: None,
        },
    ),
    (
        CmsResource::Director,
        ResourceDescriptor {
            slug: "directors",
            upload_dir: "directors",
            required: &[("name", "Name"), ("position", "Position")],
            json_fields: &["socialLinks"],
            uploads: &[Photo],
            orderable: true,
            icon_field: None,
        },
    ),
    (
        CmsResource::TeamMember,
        ResourceDescriptor {
            slug: "team-members",
            upload_dir: "team",
            required: &[("name", "Name"), ("role", "Role")],
            json_fields: &["socialLinks"],
            uploads: &[Photo],
            orderable: true,
            icon_field: None,
        },
    ),
    (
        CmsResource::Blog,
        ResourceDescriptor {
            slug: "blogs",
            upload_dir: "blogs",
            required: &[("title", "Title"), ("content", "Content")],
            json_fields: &["tags"],
            uploads: &[Image],
            orderable: false,
            icon_field: None,
        },
    ),
    (
        CmsResource::PressRelease,
        ResourceDescriptor {
            slug: "press-releases",
            upload_dir: "press",
            required: &[("title", "Title")],
            json_fields: &[],
            uploads: &[Image, Document],
            orderable: false,
            icon_field: None,
        },
    ),
    (
        CmsResource::Achievement,
        ResourceDescriptor {
            slug: "achievements",
            upload_dir: "achievements",
            required: &[("title", "Title")],
            json_fields: &[],
            uploads: &[Image],
            orderable: false,
            icon_field: Some("icon"),
        },
    ),
    (
        CmsResource::Process,
        ResourceDescriptor {
            slug: "processes",
            upload_dir: "processes",
            required: &[("title", "Title"), ("description", "Description")],
            json_fields: &[],
            uploads: &[Image],
            orderable: true,
            icon_field: Some("icon"),
        },
    ),
    (
        CmsResource::SolarJourney,
        ResourceDescriptor {
            slug: "solar-journey",
            upload_dir: "journey",
            required: &[("year", "Year"), ("title", "Title")],
            json_fields: &[],
            uploads: &[Image],
            orderable: true,
            icon_field: Some("icon"),
        },
    ),
    (
        CmsResource::Testimonial,
        ResourceDescriptor {
            slug: "testimonials",
            upload_dir: "testimonials",
            required: &[("name", "Name"), ("content", "Content")],
            json_fields: &[],
            uploads: &[Photo],
            orderable: false,
            icon_field: None,
        },
    ),
    (
        CmsResource::Faq,
        ResourceDescriptor {
            slug: "faqs",
            upload_dir: "faqs",
            required: &[("question", "Question"), ("answer", "Answer")],
            json_fields: &[],
            uploads: &[],
            orderable: false,
            icon_field: None,
        },
    ),
    (
        CmsResource::Partner,
        ResourceDescriptor {
            slug: "partners",
            upload_dir: "partners",
            required: &[("name", "Name")],
            json_fields: &[],
            uploads: &[Logo],
            orderable: false,
            icon_field: None,
        },
    ),
    (
        CmsResource::Project,
        ResourceDescriptor {
            slug: "projects",
            upload_dir: "projects",
            required: &[("title", "Title")],
            json_fields: &["highlights"],
            uploads: &[Image, MobileImage],
            orderable: false,
            icon_field: None,
        },
    ),
    (
        CmsResource::Certification,
        ResourceDescriptor {
            slug: "certifications",
            upload_dir: "certifications",
            required: &[("title", "Title")],
            json_fields: &[],
            uploads: &[Image, Document],
            orderable: false,
            icon_field: None,
        },
    ),
    (
        CmsResource::Service,
        ResourceDescriptor {
            slug: "services",
            upload_dir: "services",
            required: &[("title", "Title"), ("description", "Description")],
            json_fields: &["features"],
            uploads: &[Image],
            orderable: false,
            icon_field: Some("icon"),
        },
    ),
    (
        CmsResource::Gallery,
        ResourceDescriptor {
            slug: "gallery",
            upload_dir: "gallery",
            required: &[("title", "Title")],
            json_fields: &[],
            uploads: &[Image, Video],
            orderable: false,
            icon_field: None,
        },
    ),
];

impl CmsResource {
    pub fn all() -> impl Iterator<Item = CmsResource> {
        DESCRIPTORS.iter().map(|(resource, _)| *resource)
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        DESCRIPTORS
            .iter()
            .find(|(_, descriptor)| descriptor.slug == slug)
            .map(|(resource, _)| *resource)
    }

    pub fn descriptor(self) -> &'static ResourceDescriptor {
        // Every variant has a row.
        &DESCRIPTORS
            .iter()
            .find(|(resource, _)| *resource == self)
            .unwrap_or(&DESCRIPTORS[0])
            .1
    }

    pub fn slug(self) -> &'static str {
        self.descriptor().slug
    }

    pub fn is_orderable(self) -> bool {
        self.descriptor().orderable
    }

    pub fn accepts_upload(self, field: UploadField) -> bool {
        self.descriptor().uploads.contains(&field)
    }
}

impl std::fmt::Display for CmsResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}
