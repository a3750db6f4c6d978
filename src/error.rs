//! # Error Types
//!
//! This module defines error types used throughout the namecard library.

use thiserror::Error;

/// Main error type for namecard operations
#[derive(Debug, Error)]
pub enum CardError {
    /// Pasted font markup had no `href` to a stylesheet
    #[error("could not find stylesheet URL")]
    StylesheetNotFound,

    /// No drawing surface could be created for the source image
    #[error("No drawing surface for a {width}x{height} image")]
    NoDrawingSurface { width: u32, height: u32 },

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Font file could not be parsed
    #[error("Font error: {0}")]
    Font(String),

    /// Stylesheet or font download failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
