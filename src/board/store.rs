//! Flat storage for decoded posts.

use std::collections::HashMap;

use super::post::Post;

/// The session's flat set of decoded posts, keyed by display hash.
///
/// Posts are stored without their reply links; tree assembly is the
/// thread builder's job, run over a snapshot of this store.
#[derive(Debug, Default)]
pub struct PostStore {
    posts: Vec<Post>,
    by_hash: HashMap<String, usize>,
}

impl PostStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a post.
    ///
    /// Returns `false` when a post with the same hash is already known;
    /// a rescan may observe the same transaction twice.
    pub fn insert(&mut self, post: Post) -> bool {
        if self.by_hash.contains_key(&post.hash) {
            return false;
        }
        self.by_hash.insert(post.hash.clone(), self.posts.len());
        self.posts.push(post);
        true
    }

    /// Whether a post with this display hash is known.
    pub fn contains(&self, hash: &str) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// Number of stored posts.
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Snapshot of all posts in observation order.
    pub fn all(&self) -> Vec<Post> {
        self.posts.clone()
    }

    /// Find the first post whose display hash starts with `prefix`.
    ///
    /// A deliberate linear scan: the decoded set is small and keeping it
    /// index-free keeps insertion trivial.
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&Post> {
        if prefix.is_empty() {
            return None;
        }
        self.posts.iter().find(|p| p.hash.starts_with(prefix))
    }
}
