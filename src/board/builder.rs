//! Reply tree assembly.
//!
//! Posts arrive from the ledger in arbitrary order, so a reply is
//! routinely observed before its parent. The builder keeps posts in a
//! flat arena with an orphan table keyed by the missing parent hash;
//! registering a post adopts any children buffered under its hash.
//! Orphans whose parent never shows up are left out of the final tree:
//! their parent is presumed pruned or not yet scanned.

use std::collections::HashMap;

use super::post::Post;

/// Incremental reply tree builder.
#[derive(Debug, Default)]
pub struct ThreadBuilder {
    /// Flat post arena; `replies` stays empty in here.
    arena: Vec<Post>,
    /// Display hash to arena index.
    by_hash: HashMap<String, usize>,
    /// Parent hash to resolved child indices.
    children: HashMap<String, Vec<usize>>,
    /// Missing parent hash to buffered child indices.
    orphans: HashMap<String, Vec<usize>>,
    /// Indices of posts without a parent.
    roots: Vec<usize>,
}

impl ThreadBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a forest out of a flat set of posts, in one pass.
    pub fn build_forest(posts: impl IntoIterator<Item = Post>) -> Vec<Post> {
        let mut builder = Self::new();
        for post in posts {
            builder.insert(post);
        }
        builder.build()
    }

    /// Register one post.
    ///
    /// Duplicate hashes and self-replies are ignored; neither occurs in
    /// honest data, and dropping them keeps the link pass loop-free.
    pub fn insert(&mut self, mut post: Post) {
        if self.by_hash.contains_key(&post.hash) {
            return;
        }
        if post.reply_to.as_deref() == Some(post.hash.as_str()) {
            return;
        }

        post.replies.clear();
        let index = self.arena.len();
        let hash = post.hash.clone();

        match post.reply_to.clone() {
            Some(parent) => {
                if self.by_hash.contains_key(&parent) {
                    self.children.entry(parent).or_default().push(index);
                } else {
                    self.orphans.entry(parent).or_default().push(index);
                }
            }
            None => self.roots.push(index),
        }

        self.arena.push(post);
        self.by_hash.insert(hash.clone(), index);

        // Adopt any children that arrived before this post.
        if let Some(buffered) = self.orphans.remove(&hash) {
            self.children.entry(hash).or_default().extend(buffered);
        }
    }

    /// Materialize the forest: roots newest-first, replies oldest-first
    /// within each parent.
    pub fn build(&self) -> Vec<Post> {
        let mut forest: Vec<Post> = self
            .roots
            .iter()
            .map(|&index| self.materialize(index))
            .collect();
        forest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        forest
    }

    fn materialize(&self, index: usize) -> Post {
        let mut post = self.arena[index].clone();
        if let Some(child_indices) = self.children.get(&post.hash) {
            let mut replies: Vec<Post> = child_indices
                .iter()
                .map(|&child| self.materialize(child))
                .collect();
            replies.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            post.replies = replies;
        }
        post
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::post::Author;
    use chrono::{Duration, TimeZone, Utc};

    fn post(hash: &str, reply_to: Option<&str>, minute: i64) -> Post {
        Post {
            hash: hash.to_string(),
            author: Author::Unknown,
            timestamp: Utc.with_ymd_and_hms(2015, 3, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minute),
            title: hash.to_string(),
            content: hash.to_string(),
            reply_to: reply_to.map(str::to_string),
            replies: Vec::new(),
        }
    }

    /// Flatten a forest back into an unordered post list.
    fn flatten(forest: Vec<Post>) -> Vec<Post> {
        let mut flat = Vec::new();
        let mut stack = forest;
        while let Some(mut post) = stack.pop() {
            stack.append(&mut post.replies);
            flat.push(post);
        }
        flat
    }

    #[test]
    fn test_single_root() {
        let forest = ThreadBuilder::build_forest([post("a", None, 0)]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].hash, "a");
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn test_reply_nests_under_parent() {
        let forest = ThreadBuilder::build_forest([post("a", None, 0), post("b", Some("a"), 1)]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].replies.len(), 1);
        assert_eq!(forest[0].replies[0].hash, "b");
    }

    #[test]
    fn test_out_of_order_arrival() {
        // Scenario: two roots and three replies, one reply observed
        // before its own parent (which is itself a reply).
        let posts = [
            post("r1-reply", Some("r1"), 5),
            post("deep", Some("r2-reply"), 7),
            post("r2", None, 1),
            post("r1", None, 0),
            post("r2-reply", Some("r2"), 3),
        ];
        let forest = ThreadBuilder::build_forest(posts);

        assert_eq!(forest.len(), 2);
        // Roots newest-first.
        assert_eq!(forest[0].hash, "r2");
        assert_eq!(forest[1].hash, "r1");

        assert_eq!(forest[1].replies.len(), 1);
        assert_eq!(forest[1].replies[0].hash, "r1-reply");

        assert_eq!(forest[0].replies.len(), 1);
        assert_eq!(forest[0].replies[0].hash, "r2-reply");
        assert_eq!(forest[0].replies[0].replies.len(), 1);
        assert_eq!(forest[0].replies[0].replies[0].hash, "deep");
    }

    #[test]
    fn test_replies_sorted_ascending() {
        let forest = ThreadBuilder::build_forest([
            post("a", None, 0),
            post("late", Some("a"), 9),
            post("early", Some("a"), 1),
            post("mid", Some("a"), 5),
        ]);
        let order: Vec<&str> = forest[0].replies.iter().map(|p| p.hash.as_str()).collect();
        assert_eq!(order, ["early", "mid", "late"]);
    }

    #[test]
    fn test_roots_sorted_descending() {
        let forest = ThreadBuilder::build_forest([
            post("old", None, 0),
            post("new", None, 9),
            post("mid", None, 5),
        ]);
        let order: Vec<&str> = forest.iter().map(|p| p.hash.as_str()).collect();
        assert_eq!(order, ["new", "mid", "old"]);
    }

    #[test]
    fn test_dangling_orphan_dropped() {
        let forest = ThreadBuilder::build_forest([
            post("a", None, 0),
            post("lost", Some("never-seen"), 1),
        ]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].hash, "a");
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn test_self_reply_ignored() {
        let forest = ThreadBuilder::build_forest([post("a", None, 0), post("b", Some("b"), 1)]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].hash, "a");
    }

    #[test]
    fn test_idempotent_over_rebuild() {
        let posts = [
            post("r1-reply", Some("r1"), 5),
            post("deep", Some("r2-reply"), 7),
            post("r2", None, 1),
            post("r1", None, 0),
            post("r2-reply", Some("r2"), 3),
        ];

        let first = ThreadBuilder::build_forest(posts.clone());
        let second = ThreadBuilder::build_forest(flatten(first.clone()));
        assert_eq!(first, second);
    }

    #[test]
    fn test_idempotent_under_permutation() {
        let posts = vec![
            post("a", None, 0),
            post("b", Some("a"), 1),
            post("c", Some("a"), 2),
            post("d", Some("c"), 3),
            post("e", None, 4),
        ];

        let reference = ThreadBuilder::build_forest(posts.clone());
        // A few deterministic permutations, including fully reversed.
        let mut rotated = posts.clone();
        rotated.rotate_left(2);
        let mut reversed = posts.clone();
        reversed.reverse();

        for variant in [rotated, reversed] {
            assert_eq!(ThreadBuilder::build_forest(variant), reference);
        }
    }
}
