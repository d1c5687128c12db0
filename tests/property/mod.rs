//! Property-based tests

pub mod chat_proptest;
pub mod topic_proptest;
