//! Category value types.

use crate::error::{TreeError, TreeResult};
use crate::CategoryId;

// =============================================================================
// Interval
// =============================================================================

/// Anything carrying nested-set `[left, right]` boundaries.
///
/// Implemented by [`CategoryNode`], [`FlatRecord`](crate::FlatRecord) and
/// [`TreeNode`](crate::TreeNode) so the interval helpers and
/// [`reconstruct_nodes`](crate::reconstruct_nodes) work with any of them.
pub trait Interval {
    /// Left (opening) boundary.
    fn left(&self) -> i64;

    /// Right (closing) boundary.
    fn right(&self) -> i64;

    /// True when the interval has no room for descendants.
    fn is_leaf(&self) -> bool {
        self.right() - self.left() == 1
    }

    /// Number of descendants encoded by the interval width.
    fn descendant_count(&self) -> usize {
        ((self.right() - self.left() - 1) / 2).max(0) as usize
    }

    /// True when `other` lies strictly inside this interval.
    fn contains<I: Interval + ?Sized>(&self, other: &I) -> bool {
        self.left() < other.left() && other.right() < self.right()
    }
}

// =============================================================================
// CategoryName
// =============================================================================

/// Structured category name: primary form, alias and search mnemonic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoryName {
    primary: String,
    alias: Option<String>,
    mnemonic: Option<String>,
}

impl CategoryName {
    /// Creates a name from its primary form.
    ///
    /// The primary form is trimmed and must not be empty.
    pub fn new(primary: impl Into<String>) -> TreeResult<Self> {
        Self::from_parts(primary, None, None)
    }

    /// Rebuilds a name from its stored parts.
    ///
    /// This is the rehydration path used when reading rows back from a store.
    /// Blank aliases and mnemonics are normalised to `None`.
    pub fn from_parts(
        primary: impl Into<String>,
        alias: Option<String>,
        mnemonic: Option<String>,
    ) -> TreeResult<Self> {
        let primary = primary.into().trim().to_string();
        if primary.is_empty() {
            return Err(TreeError::InvalidName("primary form is empty".to_string()));
        }
        Ok(Self {
            primary,
            alias: non_blank(alias),
            mnemonic: non_blank(mnemonic),
        })
    }

    /// Sets the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = non_blank(Some(alias.into()));
        self
    }

    /// Sets the search mnemonic.
    pub fn with_mnemonic(mut self, mnemonic: impl Into<String>) -> Self {
        self.mnemonic = non_blank(Some(mnemonic.into()));
        self
    }

    /// The primary display form.
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// The alias, if any.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The search mnemonic, if any.
    pub fn mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_deref()
    }

    /// Case-insensitive match against any of the three forms.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [Some(self.primary.as_str()), self.alias(), self.mnemonic()]
            .into_iter()
            .flatten()
            .any(|form| form.to_lowercase().contains(&needle))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl std::fmt::Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.primary)
    }
}

// =============================================================================
// NewCategory
// =============================================================================

/// Payload for inserting a category.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewCategory {
    /// Structured name.
    pub name: CategoryName,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Optional icon reference.
    pub icon: Option<String>,
}

impl NewCategory {
    /// Creates an insert payload with only a name.
    pub fn new(name: CategoryName) -> Self {
        Self {
            name,
            description: None,
            icon: None,
        }
    }

    /// Shorthand for a payload whose name is just a primary form.
    pub fn named(primary: impl Into<String>) -> TreeResult<Self> {
        Ok(Self::new(CategoryName::new(primary)?))
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the icon reference.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

// =============================================================================
// CategoryNode
// =============================================================================

/// A stored category with its nested-set boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoryNode {
    /// Unique, immutable identifier.
    pub id: CategoryId,
    /// Parent id; equal to `id` for roots.
    pub parent_id: CategoryId,
    /// Tree the node belongs to; equal to the root's id.
    pub tree_id: CategoryId,
    /// Left boundary.
    pub left: i64,
    /// Right boundary.
    pub right: i64,
    /// Structured name.
    pub name: CategoryName,
    /// Optional description.
    pub description: Option<String>,
    /// Optional icon reference.
    pub icon: Option<String>,
}

impl CategoryNode {
    /// True for the root of a tree.
    pub fn is_root(&self) -> bool {
        self.parent_id == self.id
    }

    /// Boundaries as a `(left, right)` pair.
    pub fn bounds(&self) -> (i64, i64) {
        (self.left, self.right)
    }
}

impl Interval for CategoryNode {
    fn left(&self) -> i64 {
        self.left
    }

    fn right(&self) -> i64 {
        self.right
    }
}

impl std::fmt::Display for CategoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{} [{}, {}]", self.name, self.id, self.left, self.right)
    }
}
