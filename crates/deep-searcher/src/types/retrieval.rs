//! Vector store entries, search results and metadata filters

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Free-form metadata attached to stored entries
pub type Metadata = serde_json::Map<String, Value>;

/// One embedded entry written to a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Embedding vector, width must equal the collection dimension
    pub vector: Vec<f32>,
    /// Chunk text
    pub text: String,
    /// Source identifier (file path or URL)
    pub reference: String,
    /// Extra metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// One scored candidate returned by a vector search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Stored embedding
    pub embedding: Vec<f32>,
    /// Chunk text
    pub text: String,
    /// Source identifier (file path or URL)
    pub reference: String,
    /// Stored metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Similarity, higher is more relevant
    pub score: f32,
}

impl RetrievalResult {
    /// Build a result from a stored entry and its score
    pub fn from_entry(entry: &VectorEntry, score: f32) -> Self {
        Self {
            embedding: entry.vector.clone(),
            text: entry.text.clone(),
            reference: entry.reference.clone(),
            metadata: entry.metadata.clone(),
            score,
        }
    }

    /// Order by descending score; NaN sorts last
    pub fn cmp_by_score(a: &Self, b: &Self) -> Ordering {
        match (a.score.is_nan(), b.score.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => b.score.total_cmp(&a.score),
        }
    }

    /// Sort descending by score (stable)
    pub fn sort_by_score(results: &mut [RetrievalResult]) {
        results.sort_by(Self::cmp_by_score);
    }
}

/// Collection descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name
    pub name: String,
    /// Vector width
    pub dimension: usize,
    /// Free-text description used for routing
    pub description: String,
}

/// Predicate over entry metadata
///
/// Backends translate what they can natively; anything else is evaluated client-side
/// through [`MetadataFilter::matches`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MetadataFilter {
    /// Field equals value
    Eq { field: String, value: Value },
    /// Field equals any of the values
    In { field: String, values: Vec<Value> },
    /// All sub-filters match
    And { filters: Vec<MetadataFilter> },
}

impl MetadataFilter {
    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field in values`
    pub fn any_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In {
            field: field.into(),
            values,
        }
    }

    /// Conjunction
    pub fn and(filters: Vec<MetadataFilter>) -> Self {
        Self::And { filters }
    }

    /// Evaluate against metadata
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { field, value } => metadata.get(field) == Some(value),
            Self::In { field, values } => metadata
                .get(field)
                .map_or(false, |v| values.contains(v)),
            Self::And { filters } => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}
