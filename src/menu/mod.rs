pub mod cache;
pub mod provider;
pub mod source;

pub use provider::{MenuProvider, MenuSnapshot, ProviderState};
pub use source::{HttpMenuSource, MenuSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bound on how deep a lookup descends.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Upper bound on nodes visited by a single lookup.
const MAX_VISITED: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MenuError {
    #[error("Menu fetch failed: {0}")]
    FetchFailed(String),

    #[error("Menu fetch returned HTTP {status}")]
    Status { status: u16 },

    #[error("Menu response could not be decoded: {0}")]
    Decode(String),
}

impl MenuError {
    /// Stable code for machine-readable output
    pub fn error_code(&self) -> &'static str {
        match self {
            MenuError::FetchFailed(_) => "FETCH_FAILED",
            MenuError::Status { .. } => "FETCH_FAILED",
            MenuError::Decode(_) => "FETCH_FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuNode {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, deserialize_with = "children_or_empty")]
    pub children: Vec<MenuNode>,
}

// Servers send `"children": null` on leaves
fn children_or_empty<'de, D>(deserializer: D) -> Result<Vec<MenuNode>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let children: Option<Vec<MenuNode>> = Option::deserialize(deserializer)?;
    Ok(children.unwrap_or_default())
}

impl MenuNode {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<MenuNode>) -> Self {
        self.children = children;
        self
    }
}

/// Ordered forest of menu roots, as served by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuTree {
    roots: Vec<MenuNode>,
}

impl MenuTree {
    pub fn new(roots: Vec<MenuNode>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[MenuNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Whether `key` appears at any depth, searching depth-first in sibling order.
    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key, DEFAULT_MAX_DEPTH).is_some()
    }

    /// Depth-first lookup that descends at most `max_depth` levels below the roots.
    pub fn find(&self, key: &str, max_depth: usize) -> Option<&MenuNode> {
        // Reverse pushes keep pops in stored sibling order
        let mut stack: Vec<(&MenuNode, usize)> =
            self.roots.iter().rev().map(|node| (node, 0)).collect();
        let mut visited = 0usize;

        while let Some((node, depth)) = stack.pop() {
            visited += 1;
            if visited > MAX_VISITED {
                tracing::warn!("Menu lookup for '{}' aborted after {} nodes", key, MAX_VISITED);
                return None;
            }

            if node.key == key {
                return Some(node);
            }

            if depth < max_depth {
                stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
            }
        }

        None
    }

    /// Every key in depth-first order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        let mut stack: Vec<&MenuNode> = self.roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            keys.push(node.key.as_str());
            stack.extend(node.children.iter().rev());
        }
        keys
    }
}

impl From<Vec<MenuNode>> for MenuTree {
    fn from(roots: Vec<MenuNode>) -> Self {
        Self::new(roots)
    }
}
