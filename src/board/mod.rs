//! Board domain model for chainbbs.
//!
//! Posts are decoded from ledger transactions, collected in a flat
//! store, and assembled into reply trees on demand.

mod builder;
mod post;
mod store;

pub use builder::ThreadBuilder;
pub use post::{derive_title, Author, Post, PostPayload, UNTITLED};
pub use store::PostStore;
