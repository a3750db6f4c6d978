//! # namecard - Personalized Invitation Cards
//!
//! namecard puts a name onto an uploaded image to make an invitation card.
//! It provides:
//!
//! - **Settings**: the card configuration and its share-link encoding
//! - **Fonts**: loading web fonts from pasted provider markup
//! - **Rendering**: compositing the name onto the image, resolution-independent
//! - **Sync**: debounced re-render and re-persist on every edit
//! - **Server**: an HTTP card editor built on the above
//!
//! ## Quick Start
//!
//! ```no_run
//! use namecard::{fonts::FontRegistry, render, settings::query, SourceImage};
//!
//! let settings = query::decode("name=Jane%20Doe&fontSize=30&coordinates=%5B0.5%2C0.1%5D");
//!
//! let fonts = FontRegistry::new();
//! fonts.load_dir(std::path::Path::new("fonts"))?;
//!
//! let source = SourceImage::decode(std::fs::read("party.jpg")?, "party.jpg")?;
//! let card = render::render_card(&source, &settings, &fonts)?;
//! std::fs::write("card.png", &card.png)?;
//!
//! # Ok::<(), namecard::error::CardError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`settings`] | Settings store and page-address codec |
//! | [`fonts`] | Font registry and readiness detection |
//! | [`render`] | Card compositing |
//! | [`sync`] | Debounced render/persist controller |
//! | [`server`] | HTTP API and embedded editor |
//! | [`error`] | Error types |

pub mod error;
pub mod fonts;
pub mod render;
pub mod server;
pub mod settings;
pub mod sync;

// Re-exports for convenience
pub use error::CardError;
pub use render::{RenderedCard, SourceImage};
pub use settings::{Settings, SettingsStore};
