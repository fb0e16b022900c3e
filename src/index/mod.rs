//! # Index Module
//!
//! The similarity search engine and the index type binding it to a record store.
//!
//! ### FlatIndex
//! - **Complexity**: O(n·dim) search, O(1) upsert
//! - **Memory**: Linear with dataset size
//! - **Accuracy**: exact; every record is compared against the query
//!
//! `search` holds the stateless top-k scan and `flat` the `(metric, dim)`
//! bound index that validates inputs before reaching it.

pub mod flat;
pub mod search;
