use crate::descriptor::{Described, Descriptor, FieldDecl, FieldType};
use crate::types::{json_text, reparse_json, DateTime};
use async_graphql::{ComplexObject, SimpleObject, ID};
use serde::Deserialize;

/// User alert
#[derive(SimpleObject, Deserialize, Default, Clone, Debug)]
#[graphql(complex)]
#[serde(default)]
pub struct Notification {
    pub id: Option<ID>,
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[graphql(name = "type")]
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub is_read: Option<bool>,
    #[serde(deserialize_with = "json_text")]
    pub metadata: Option<String>,
    pub created_at: Option<DateTime>,
}

static NOTIFICATION: Descriptor = Descriptor {
    name: "Notification",
    table: "notifications",
    fields: &[
        FieldDecl::stored("id", FieldType::Id),
        FieldDecl::stored("user_id", FieldType::String),
        FieldDecl::stored("title", FieldType::String),
        FieldDecl::stored("message", FieldType::String),
        FieldDecl::stored("type", FieldType::String),
        FieldDecl::stored("is_read", FieldType::Boolean),
        FieldDecl::stored("metadata", FieldType::String),
        FieldDecl::stored("created_at", FieldType::Timestamp),
        FieldDecl::computed("parsed_metadata", FieldType::String),
    ],
};

impl Described for Notification {
    fn descriptor() -> &'static Descriptor {
        &NOTIFICATION
    }
}

#[ComplexObject]
impl Notification {
    async fn parsed_metadata(&self) -> Option<String> {
        reparse_json(self.metadata.as_deref())
    }
}
