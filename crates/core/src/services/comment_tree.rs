//! In-memory comment tree.
//!
//! Comments reference their parent by id. The tree is an arena keyed by id,
//! so walking ancestors never follows pointers into the database and a
//! corrupted parent chain shows up as a revisited id.

use std::collections::{HashMap, HashSet};

use quill_db::{entities::comment, repositories::ParentLink};
use serde::Serialize;

/// A parent chain loops back on itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDetected {
    /// First id seen twice.
    pub at: String,
}

/// Arena of `id -> parent_id` links for the comments of one post.
#[derive(Debug, Clone, Default)]
pub struct CommentTree {
    parents: HashMap<String, Option<String>>,
}

impl CommentTree {
    /// Build the arena from stored links.
    #[must_use]
    pub fn from_links(links: impl IntoIterator<Item = ParentLink>) -> Self {
        Self {
            parents: links
                .into_iter()
                .map(|link| (link.id, link.parent_id))
                .collect(),
        }
    }

    /// Add or replace a node.
    pub fn insert(&mut self, id: impl Into<String>, parent_id: Option<String>) {
        self.parents.insert(id.into(), parent_id);
    }

    /// Whether a node is present.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether the arena has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// `id` followed by its ancestors up to the root.
    ///
    /// Links pointing outside the arena end the walk.
    pub fn ancestors<'a>(&'a self, id: &'a str) -> Result<Vec<&'a str>, CycleDetected> {
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut current = Some(id);

        while let Some(node) = current {
            if !seen.insert(node) {
                return Err(CycleDetected {
                    at: node.to_string(),
                });
            }
            chain.push(node);
            current = self
                .parents
                .get(node)
                .and_then(|parent| parent.as_deref());
        }
        Ok(chain)
    }

    /// Whether attaching a new comment `id` under `parent_id` keeps the tree acyclic.
    pub fn check_attach(&self, id: &str, parent_id: &str) -> Result<(), CycleDetected> {
        let chain = self.ancestors(parent_id)?;
        if chain.contains(&id) {
            return Err(CycleDetected { at: id.to_string() });
        }
        Ok(())
    }
}

/// A comment with its nested replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub is_reply: bool,
    pub has_replies: bool,
    pub replies: Vec<CommentView>,
}

/// Arrange comments into threads.
///
/// Roots are comments without a parent; each keeps the input order of its
/// replies. Comments whose parent is missing from `comments` are dropped,
/// as is anything reachable only through a cycle.
#[must_use]
pub fn thread(comments: Vec<comment::Model>) -> Vec<CommentView> {
    let mut children: HashMap<String, Vec<comment::Model>> = HashMap::new();
    let mut roots = Vec::new();
    for c in comments {
        match c.parent_id.clone() {
            Some(parent) => children.entry(parent).or_default().push(c),
            None => roots.push(c),
        }
    }

    let mut visited = HashSet::new();
    roots
        .into_iter()
        .filter_map(|root| build(root, &mut children, &mut visited))
        .collect()
}

fn build(
    comment: comment::Model,
    children: &mut HashMap<String, Vec<comment::Model>>,
    visited: &mut HashSet<String>,
) -> Option<CommentView> {
    if !visited.insert(comment.id.clone()) {
        return None;
    }

    let replies: Vec<CommentView> = children
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|reply| build(reply, children, visited))
        .collect();

    Some(CommentView {
        is_reply: comment.is_reply(),
        has_replies: !replies.is_empty(),
        replies,
        comment,
    })
}
