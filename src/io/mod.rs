//! Input/output helpers.
//!
//! - waveform read/merge/write (`waveform`)
//! - pick and detection tables (`export`)
//! - cross-file summary (`summary`)
//! - results-root layout and image listing (`layout`, `images`)

pub mod export;
pub mod images;
pub mod layout;
pub mod summary;
pub mod waveform;

pub use export::{write_detections, write_picks};
pub use images::ImageIndex;
pub use layout::{FileLayout, basename_of};
pub use summary::{SummaryColumns, write_summary};
