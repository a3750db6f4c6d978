//! # Fonts
//!
//! - [`registry`]: the set of loaded font faces
//! - [`stylesheet`]: finding the stylesheet in pasted markup, parsing `@font-face`
//! - [`detector`]: loading web fonts and deciding when they are ready

pub mod detector;
pub mod registry;
pub mod stylesheet;

pub use detector::{FontFetcher, FontReadinessDetector, HttpFetcher, LoadOutcome, PollConfig};
pub use registry::{FontFace, FontRegistry};
