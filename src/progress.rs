//! Progress-callback trait for per-unit extraction events.
//!
//! A *unit* is one image, one PDF page, or one phone-number screenshot.
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to hear about
//! each unit as the AI pipeline works through a batch. Spreadsheet extraction
//! makes no AI calls and emits no events.
//!
//! # Example
//!
//! ```rust
//! use edgequake_table2xlsx::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RowCounter {
//!     rows: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for RowCounter {
//!     fn on_unit_complete(&self, unit: usize, total: usize, records: usize) {
//!         self.rows.fetch_add(records, Ordering::SeqCst);
//!         eprintln!("unit {}/{}: {} rows", unit, total, records);
//!     }
//! }
//!
//! let counter = Arc::new(RowCounter { rows: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the AI pipeline as it processes each unit.
///
/// All methods default to no-ops so callers only override what they need.
/// Units are processed one at a time, in input order.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first unit is sent.
    fn on_batch_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called just before the vision request for `unit` (1-indexed).
    fn on_unit_start(&self, unit: usize, total_units: usize) {
        let _ = (unit, total_units);
    }

    /// Called when a unit's reply parsed; `records` may be zero, e.g. for a
    /// PDF page without a table.
    fn on_unit_complete(&self, unit: usize, total_units: usize, records: usize) {
        let _ = (unit, total_units, records);
    }

    /// Called when a unit failed. The batch carries on.
    fn on_unit_error(&self, unit: usize, total_units: usize, error: &str) {
        let _ = (unit, total_units, error);
    }

    /// Called once after every unit has been attempted.
    fn on_batch_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// Used when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
