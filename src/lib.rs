pub mod consolidate;
pub mod element;
pub mod err;
pub mod extract;
pub mod path_expr;
pub mod records;
pub mod source;
pub mod uf;
pub mod walker;

pub use consolidate::{
    BATCH_ROOT_TAG, ConsolidatedBatch, RECORD_TAG, consolidate_by_results, consolidate_by_uf,
};
pub use element::Element;
pub use err::{NfcomxError, Result};
pub use extract::{FilterSpec, ValueCounts, extract_filtered_tag_values, extract_tag_values};
pub use path_expr::QueryPath;
pub use records::{ExtractionRequest, ResultRecord, process_files, total_occurrences};
pub use source::DocumentSource;
pub use walker::{WalkStats, walk_matching_subtrees};

#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests in parallel, so we need to synchronize the logger
// initialization.
#[cfg(test)]
pub(crate) fn ensure_env_logger_initialized() {
    LOGGER_INIT.call_once(env_logger::init);
}
