//! Domain query modules.
//!
//! Each module owns its cache key builders (`keys`), its read operations
//! (served through the query cache with a per-query `StalePolicy`) and its
//! mutations, which apply the invalidation edges from `edges` on success.

pub mod auth;
pub mod edges;
pub mod image_predictions;
pub mod predictions;
pub mod profile;
pub mod system;
pub mod transactions;

pub use auth::Auth;
pub use edges::Mutation;
pub use image_predictions::{ImageFile, ImagePredictions};
pub use predictions::Predictions;
pub use profile::Profile;
pub use system::{Readiness, System};
pub use transactions::Transactions;
