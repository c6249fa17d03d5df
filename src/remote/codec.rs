//! Article <-> Firestore document mapping.
//!
//! Firestore wraps every value in a typed envelope (`stringValue`,
//! `integerValue`, ...). Integers travel as decimal strings. The article id
//! is not a field; it is the last segment of the document name.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::RemoteError;
use crate::model::{Article, Category, Comment};

#[derive(Debug, Deserialize)]
pub(crate) struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
    pub next_page_token: Option<String>,
}

impl Document {
    /// Last path segment of the document name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

// ============================================================================
// Encoding
// ============================================================================

fn string(v: &str) -> Value {
    json!({ "stringValue": v })
}

fn integer(v: i64) -> Value {
    json!({ "integerValue": v.to_string() })
}

fn comment_fields(c: &Comment) -> Value {
    json!({
        "mapValue": {
            "fields": {
                "id": string(&c.id),
                "userName": string(&c.user_name),
                "text": string(&c.text),
                "createdAt": integer(c.created_at),
            }
        }
    })
}

/// Encode an article as a Firestore `fields` map.
pub(crate) fn encode_fields(article: &Article) -> Value {
    let mut fields = Map::new();
    fields.insert("title".into(), string(&article.title));
    fields.insert("subtitle".into(), string(&article.subtitle));
    fields.insert("content".into(), string(&article.content));
    fields.insert("author".into(), string(&article.author));
    fields.insert("category".into(), string(article.category.label()));
    fields.insert("imageUrl".into(), string(&article.image_url));
    fields.insert("createdAt".into(), integer(article.created_at));
    if let Some(flag) = article.is_breaking {
        fields.insert("isBreaking".into(), json!({ "booleanValue": flag }));
    }
    if let Some(expiry) = article.breaking_expiry {
        fields.insert("breakingExpiry".into(), integer(expiry));
    }
    let comments: Vec<Value> = article.comments.iter().map(comment_fields).collect();
    let array = if comments.is_empty() {
        json!({ "arrayValue": {} })
    } else {
        json!({ "arrayValue": { "values": comments } })
    };
    fields.insert("comments".into(), array);

    json!({ "fields": fields })
}

// ============================================================================
// Decoding
// ============================================================================

fn malformed(field: &str) -> RemoteError {
    RemoteError::Malformed(format!("missing or mistyped field '{field}'"))
}

fn get_string(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)?
        .get("stringValue")?
        .as_str()
        .map(str::to_string)
}

/// Integers arrive as strings; clients that wrote JS numbers may have
/// produced `doubleValue` instead.
fn get_i64(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = fields.get(key)?;
    if let Some(raw) = value.get("integerValue") {
        return match raw {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
    }
    value
        .get("doubleValue")
        .and_then(Value::as_f64)
        .map(|f| f as i64)
}

fn get_bool(fields: &Map<String, Value>, key: &str) -> Option<bool> {
    fields.get(key)?.get("booleanValue")?.as_bool()
}

fn decode_comment(value: &Value) -> Result<Comment, RemoteError> {
    let fields = value
        .get("mapValue")
        .and_then(|m| m.get("fields"))
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("comments"))?;
    Ok(Comment {
        id: get_string(fields, "id").ok_or_else(|| malformed("comments.id"))?,
        user_name: get_string(fields, "userName").unwrap_or_default(),
        text: get_string(fields, "text").unwrap_or_default(),
        created_at: get_i64(fields, "createdAt").unwrap_or(0),
    })
}

/// Decode a Firestore document into an article.
///
/// Title, category and creation time are required; other text fields default
/// to empty.
pub(crate) fn decode_document(doc: &Document) -> Result<Article, RemoteError> {
    let f = &doc.fields;
    let category: Category = get_string(f, "category")
        .ok_or_else(|| malformed("category"))?
        .parse()
        .map_err(|e: crate::model::UnknownCategory| RemoteError::Malformed(e.to_string()))?;

    let comments = match f
        .get("comments")
        .and_then(|c| c.get("arrayValue"))
        .and_then(|a| a.get("values"))
        .and_then(Value::as_array)
    {
        Some(values) => values
            .iter()
            .map(decode_comment)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(Article {
        id: doc.id().to_string(),
        title: get_string(f, "title").ok_or_else(|| malformed("title"))?,
        subtitle: get_string(f, "subtitle").unwrap_or_default(),
        content: get_string(f, "content").unwrap_or_default(),
        author: get_string(f, "author").unwrap_or_default(),
        category,
        image_url: get_string(f, "imageUrl").unwrap_or_default(),
        created_at: get_i64(f, "createdAt").ok_or_else(|| malformed("createdAt"))?,
        is_breaking: get_bool(f, "isBreaking"),
        breaking_expiry: get_i64(f, "breakingExpiry"),
        comments,
    })
}
