//! Resource paths and the routing table.
//!
//! Records are addressed as `scheme://authority/collection` (every record)
//! or `scheme://authority/collection/{id}` (one record). A [`Router`] is
//! built once from the deployment's scheme, authority and collection and is
//! immutable afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{StoreError, TableSchema};

pub const DEFAULT_SCHEME: &str = "content";

/// A parsed `scheme://authority/segment/...` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    scheme: String,
    authority: String,
    segments: Vec<String>,
}

impl ResourcePath {
    pub fn new(
        scheme: impl Into<String>,
        authority: impl Into<String>,
        segments: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            authority: authority.into(),
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| StoreError::UnknownResource(format!("missing scheme in '{}'", s)))?;
        if scheme.is_empty() {
            return Err(StoreError::UnknownResource(format!(
                "missing scheme in '{}'",
                s
            )));
        }
        // query and fragment do not take part in routing
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let mut parts = rest.split('/');
        let authority = parts.next().unwrap_or_default();
        if authority.is_empty() {
            return Err(StoreError::UnknownResource(format!(
                "missing authority in '{}'",
                s
            )));
        }
        let segments = parts
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            segments,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Append a numeric id segment.
    pub fn with_appended_id(&self, id: i64) -> Self {
        let mut path = self.clone();
        path.segments.push(id.to_string());
        path
    }

    /// True when `self` is a strict prefix of `other` (same scheme and authority).
    pub fn is_ancestor_of(&self, other: &ResourcePath) -> bool {
        self.scheme == other.scheme
            && self.authority == other.authority
            && self.segments.len() < other.segments.len()
            && other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for ResourcePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Result of matching a path against the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `collection`: every record.
    Collection,
    /// `collection/#`: one record by id.
    Item(i64),
}

/// Immutable two-pattern routing table for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Router {
    scheme: String,
    authority: String,
    collection: String,
}

impl Router {
    pub fn new(
        scheme: impl Into<String>,
        authority: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            authority: authority.into(),
            collection: collection.into(),
        }
    }

    /// Router for `content://{authority}/{schema.collection}`.
    pub fn for_schema(authority: impl Into<String>, schema: &TableSchema) -> Self {
        Self::new(DEFAULT_SCHEME, authority, schema.collection.clone())
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The path addressing every record.
    pub fn collection_path(&self) -> ResourcePath {
        ResourcePath::new(
            self.scheme.clone(),
            self.authority.clone(),
            [self.collection.clone()],
        )
    }

    /// The path addressing one record.
    pub fn item_path(&self, id: i64) -> ResourcePath {
        self.collection_path().with_appended_id(id)
    }

    pub fn route(&self, path: &ResourcePath) -> Result<Route, StoreError> {
        if path.scheme != self.scheme || path.authority != self.authority {
            return Err(StoreError::UnknownResource(path.to_string()));
        }
        match path.segments.as_slice() {
            [collection] if *collection == self.collection => Ok(Route::Collection),
            [collection, id] if *collection == self.collection => parse_id(id)
                .map(Route::Item)
                .ok_or_else(|| StoreError::UnknownResource(path.to_string())),
            _ => Err(StoreError::UnknownResource(path.to_string())),
        }
    }

    /// Parse and route in one step.
    pub fn route_str(&self, path: &str) -> Result<(ResourcePath, Route), StoreError> {
        let path = ResourcePath::parse(path)?;
        let route = self.route(&path)?;
        Ok((path, route))
    }

    /// Content type of the data behind a route.
    pub fn content_type(&self, route: Route) -> String {
        let kind = match route {
            Route::Collection => "dir",
            Route::Item(_) => "item",
        };
        format!("vnd.{}.{}/{}/{}", self.scheme, kind, self.authority, self.collection)
    }
}

/// Positive decimal id made only of ASCII digits.
fn parse_id(segment: &str) -> Option<i64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse::<i64>().ok().filter(|id| *id > 0)
}

/// Deployment configuration: where the store is addressed and what it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub authority: String,
    pub schema: TableSchema,
}

fn default_scheme() -> String {
    DEFAULT_SCHEME.to_string()
}

impl StoreConfig {
    pub fn new(authority: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            scheme: default_scheme(),
            authority: authority.into(),
            schema,
        }
    }

    /// Parse and validate a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let config: Self = serde_json::from_str(json)?;
        config.schema.validate()?;
        if config.authority.is_empty() || config.authority.contains('/') {
            return Err(StoreError::InvalidSchema(format!(
                "authority '{}' must be a non-empty host name",
                config.authority
            )));
        }
        Ok(config)
    }

    pub fn router(&self) -> Router {
        Router::new(
            self.scheme.clone(),
            self.authority.clone(),
            self.schema.collection.clone(),
        )
    }
}
