//! Query cache.
//!
//! Results of backend reads are kept under hierarchical `QueryKey`s with a
//! per-query `StalePolicy`. Mutations mark key prefixes stale so the next
//! read goes back to the network; see `queries::edges` for which mutation
//! touches which prefix.

pub mod entry;
pub mod key;
pub mod policy;
pub mod store;
pub mod tasks;

pub use entry::{QuerySnapshot, QueryStatus};
pub use key::QueryKey;
pub use policy::StalePolicy;
pub use store::{FetchTicket, QueryCache, Subscription};
pub use tasks::{spawn_gc_task, spawn_polling};
