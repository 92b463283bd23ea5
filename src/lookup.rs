use crate::error::LookupError;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;

/// The branch record the compiler needs from the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
}

/// Read access to branch records, keyed by branch id.
pub trait BranchLookup: Send + Sync {
    fn lookup_branch(&self, branch_id: &str) -> Result<Branch, LookupError>;
}

/// An in-memory branch directory, e.g. loaded from a JSON export.
#[derive(Debug, Clone, Default)]
pub struct StaticBranchLookup {
    branches: AHashMap<String, Branch>,
}

impl StaticBranchLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(mut self, branch_id: &str, name: &str) -> Self {
        self.branches.insert(
            branch_id.to_string(),
            Branch {
                name: name.to_string(),
            },
        );
        self
    }

    /// Parses a `{ "<branch id>": { "name": "..." } }` document.
    pub fn from_json(json: &str) -> Result<Self, LookupError> {
        let branches =
            serde_json::from_str(json).map_err(|e| LookupError::Store(e.to_string()))?;
        Ok(Self { branches })
    }

    pub fn from_file(path: &str) -> Result<Self, LookupError> {
        let content = fs::read_to_string(path)
            .map_err(|e| LookupError::Store(format!("Could not read '{}': {}", path, e)))?;
        Self::from_json(&content)
    }
}

impl BranchLookup for StaticBranchLookup {
    fn lookup_branch(&self, branch_id: &str) -> Result<Branch, LookupError> {
        self.branches
            .get(branch_id)
            .cloned()
            .ok_or_else(|| LookupError::BranchNotFound(branch_id.to_string()))
    }
}
