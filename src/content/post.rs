//! Post models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::richtext::RichTextNode;
use crate::source::RawDocument;
use crate::{Error, Result};

/// Custom fields of a `posts` document, as stored in the repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostFields {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subtitle: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(deserialize_with = "null_as_default")]
    pub banner: Banner,
    #[serde(deserialize_with = "null_as_default")]
    pub content: Vec<RawContentBlock>,
}

impl PostFields {
    /// Decode the `data` object of a document; absent fields stay empty
    pub fn from_document(doc: &RawDocument) -> Result<Self> {
        if doc.data.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(doc.data.clone())?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Banner {
    pub url: Option<String>,
}

/// One section of a post body before transformation
///
/// The body stays undecoded so a malformed block only fails itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawContentBlock {
    #[serde(deserialize_with = "null_as_default")]
    pub heading: String,
    pub body: Value,
}

impl RawContentBlock {
    /// Decode the rich text nodes of the body
    pub fn nodes(&self) -> Result<Vec<RichTextNode>> {
        if self.body.is_null() {
            return Ok(Vec::new());
        }
        Vec::<RichTextNode>::deserialize(&self.body)
            .map_err(|e| Error::Transform(format!("malformed body: {}", e)))
    }
}

/// CMS fields are often `null` instead of absent
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Display-ready entry of the post listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub uid: String,
    /// Raw instant; formatting happens when the page is rendered
    pub first_publication_date: Option<DateTime<Utc>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// A section of a rendered post
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentBlock {
    pub heading: String,
    pub body: String,
}

/// A fully resolved post, owned by the render that asked for it
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub uid: String,
    /// Absent for drafts that were never published
    pub first_publication_date: Option<DateTime<Utc>>,
    pub last_publication_date: Option<DateTime<Utc>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub content: Vec<ContentBlock>,
}

impl PostDetail {
    /// Whether the post was edited after its first publication
    pub fn was_edited(&self) -> bool {
        match (self.first_publication_date, self.last_publication_date) {
            (Some(first), Some(last)) => last > first,
            _ => false,
        }
    }
}

/// Link to the chronologically adjacent post
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiblingRef {
    pub exists: bool,
    pub uid: String,
    pub title: String,
}

impl SiblingRef {
    pub fn none() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(data: serde_json::Value) -> RawDocument {
        RawDocument {
            id: "1".to_string(),
            uid: Some("post".to_string()),
            doc_type: "posts".to_string(),
            first_publication_date: None,
            last_publication_date: None,
            data,
        }
    }

    #[test]
    fn test_partial_fields() {
        let fields = PostFields::from_document(&document(json!({ "title": "Only a title" }))).unwrap();
        assert_eq!(fields.title, "Only a title");
        assert!(fields.author.is_empty());
        assert!(fields.content.is_empty());
        assert!(fields.banner.url.is_none());
    }

    #[test]
    fn test_null_data() {
        let fields = PostFields::from_document(&document(serde_json::Value::Null)).unwrap();
        assert!(fields.title.is_empty());
    }

    #[test]
    fn test_null_fields_read_as_empty() {
        let fields = PostFields::from_document(&document(json!({
            "title": null,
            "content": [ { "heading": null, "body": null } ]
        })))
        .unwrap();
        assert!(fields.title.is_empty());
        assert_eq!(fields.content.len(), 1);
        assert!(fields.content[0].heading.is_empty());
        assert!(fields.content[0].nodes().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_body_fails_only_its_block() {
        let fields = PostFields::from_document(&document(json!({
            "content": [
                { "heading": "Good", "body": [ { "type": "paragraph", "text": "ok", "spans": [] } ] },
                { "heading": "Bad", "body": [ { "text": "no type", "spans": [ { "start": "x" } ] } ] },
                { "heading": "Odd", "body": "just a string" }
            ]
        })))
        .unwrap();

        assert_eq!(fields.content[0].nodes().unwrap().len(), 1);
        assert!(matches!(fields.content[1].nodes(), Err(Error::Transform(..))));
        assert!(matches!(fields.content[2].nodes(), Err(Error::Transform(..))));
    }

    #[test]
    fn test_wrong_field_type_is_an_error() {
        let err = PostFields::from_document(&document(json!({ "title": 42 }))).unwrap_err();
        assert!(matches!(err, crate::Error::Decode(..)));
    }
}
