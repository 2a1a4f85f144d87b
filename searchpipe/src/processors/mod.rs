//! Built-in post-processors.
//!
//! Every processor registers itself by name; see [`register_builtins`].

mod dedup;
mod fuzzy;
#[cfg(feature = "http")]
mod metadata;
mod refine;
mod reorder;
mod url_normalize;

pub use dedup::{Dedup, DedupSettings};
pub use fuzzy::{levenshtein, similarity, Fuzzy, FuzzySettings};
#[cfg(feature = "http")]
pub use metadata::{Metadata, MetadataSettings, PageMetadata};
pub use refine::{Refine, RefineSettings};
pub use reorder::{Reorder, ReorderSettings};
pub use url_normalize::normalize_url;

use crate::registry::ServiceRegistry;

/// Registers every built-in processor on `registry`.
pub fn register_builtins(registry: &ServiceRegistry) {
    dedup::register(registry);
    reorder::register(registry);
    fuzzy::register(registry);
    refine::register(registry);
    #[cfg(feature = "http")]
    metadata::register(registry);
}
