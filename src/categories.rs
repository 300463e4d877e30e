// 🏷️ Category List - Ordered, versioned set of expense categories
//
// The list is a configuration value owned by one authority: the aggregator
// only reads it, and add/remove produce a NEW version instead of mutating
// shared state.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Default category list
pub const DEFAULT_CATEGORIES: [&str; 6] = ["食費", "外食", "デート", "日用品", "その他❤️", "立て替え"];

/// Category marking an advance (proxy) payment
pub const DEFAULT_ADVANCE_CATEGORY: &str = "立て替え";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryList {
    /// Incremented on every add/remove
    pub version: u64,

    /// Insertion order is display order
    names: Vec<String>,
}

impl CategoryList {
    /// Build version 1 from `names`, dropping blanks and repeats
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if !name.is_empty() && !list.contains(&name) {
                list.push(name);
            }
        }
        CategoryList {
            version: 1,
            names: list,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CATEGORIES)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Next version with `name` appended
    pub fn with_added(&self, name: &str) -> Result<CategoryList> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::invalid("category", "name must not be empty"));
        }
        if self.contains(name) {
            return Err(LedgerError::invalid(
                "category",
                format!("'{}' already exists", name),
            ));
        }

        let mut names = self.names.clone();
        names.push(name.to_string());
        Ok(CategoryList {
            version: self.version + 1,
            names,
        })
    }

    /// Next version without `name`
    pub fn with_removed(&self, name: &str) -> Result<CategoryList> {
        if !self.contains(name) {
            return Err(LedgerError::not_found("category", name));
        }

        Ok(CategoryList {
            version: self.version + 1,
            names: self.names.iter().filter(|n| *n != name).cloned().collect(),
        })
    }
}

impl Default for CategoryList {
    fn default() -> Self {
        Self::with_defaults()
    }
}
