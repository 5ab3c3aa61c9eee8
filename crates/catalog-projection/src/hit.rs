//! Wire model for search-index hits.
//!
//! Only `left`, `right` and `payload` are required. `id`, `parent_id` and
//! `tree_id` are optional metadata that some reads need. Pagination, scoring
//! and aggregation envelopes are ignored.
//!
//! ```rust
//! use catalog_projection::parse_hits;
//!
//! let hits = parse_hits(r#"{"hits": [
//!     {"left": 1, "right": 4, "payload": {"name": "Electronics"}},
//!     {"left": 2, "right": 3, "payload": {"name": "Phones"}, "id": 2}
//! ], "total": 2}"#).unwrap();
//! assert_eq!(hits.len(), 2);
//! assert_eq!(hits[1].id, Some(2));
//! ```

use catalog_tree::{CategoryId, CategoryNode, Interval};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ProjectionError, ProjectionResult};

/// One indexed category document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    /// Category id, if the index stores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CategoryId>,
    /// Parent id, if the index stores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CategoryId>,
    /// Tree id, if the index stores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<CategoryId>,
    /// Left boundary at indexing time.
    pub left: i64,
    /// Right boundary at indexing time.
    pub right: i64,
    /// Opaque document body.
    pub payload: Value,
}

impl IndexHit {
    /// Builds the document the projection stores for `node`.
    pub fn from_node(node: &CategoryNode) -> Self {
        Self {
            id: Some(node.id),
            parent_id: Some(node.parent_id),
            tree_id: Some(node.tree_id),
            left: node.left,
            right: node.right,
            payload: json!({
                "name": node.name,
                "description": node.description,
                "icon": node.icon,
            }),
        }
    }

    /// The hit's id or `MissingField`.
    pub fn require_id(&self) -> ProjectionResult<CategoryId> {
        self.id.ok_or(ProjectionError::MissingField("id"))
    }

    /// The hit's tree id or `MissingField`.
    pub fn require_tree_id(&self) -> ProjectionResult<CategoryId> {
        self.tree_id.ok_or(ProjectionError::MissingField("tree_id"))
    }

    /// Primary name from the payload, when present.
    pub fn name(&self) -> Option<&str> {
        let name = self.payload.get("name")?;
        name.get("primary").or(Some(name))?.as_str()
    }
}

impl Interval for IndexHit {
    fn left(&self) -> i64 {
        self.left
    }

    fn right(&self) -> i64 {
        self.right
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HitEnvelope {
    Bare(Vec<IndexHit>),
    Wrapped { hits: Vec<IndexHit> },
}

/// Decodes hits from a bare JSON array or from an object with a `hits` array.
///
/// Hits are returned in the order given; callers sort before reconstructing.
pub fn parse_hits(json: &str) -> ProjectionResult<Vec<IndexHit>> {
    let hits = match serde_json::from_str::<HitEnvelope>(json) {
        Ok(HitEnvelope::Bare(hits)) | Ok(HitEnvelope::Wrapped { hits }) => hits,
        // Untagged errors say nothing useful; decode again for the real cause.
        Err(_) if json.trim_start().starts_with('[') => serde_json::from_str::<Vec<IndexHit>>(json)?,
        Err(_) => serde_json::from_str::<Wrapped>(json)?.hits,
    };
    Ok(hits)
}

#[derive(Deserialize)]
struct Wrapped {
    hits: Vec<IndexHit>,
}
