//! Merges the web and WhatsApp content stores into one feed.

pub mod engine;
pub mod error;
pub mod messaging;
pub mod store;
pub mod web;

pub use engine::{ApprovalMatch, Reconciler};
pub use error::FeedError;
pub use store::{ContentRecord, ContentStore, FieldUpdate, Mutation, Selection};
