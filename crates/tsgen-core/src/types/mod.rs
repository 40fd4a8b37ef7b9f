//! Domain types for the tsgen tool.
//!
//! # Module Organization
//!
//! - `fingerprint` - Content digests of schema documents
//! - `format` - Output flavours of the generated TypeScript client
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use tsgen_core::{ClientFormat, Fingerprint};
//! ```

mod fingerprint;
mod format;

pub use fingerprint::Fingerprint;
pub use format::{ClientFormat, UnknownFormat};
