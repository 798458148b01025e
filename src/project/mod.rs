//! Project Management Module
//!
//! Project records, the file-system backed store, library scanning,
//! import of original audio and archive export.

pub mod export;
pub mod import;
pub mod metadata;
pub mod scan;
pub mod store;

pub use export::export_project;
pub use import::{import_audio, ImportedAudio};
pub use metadata::{download_ref, Project, StemRef, METADATA_FILE};
pub use scan::sanitize_filename;
pub use store::ProjectStore;
