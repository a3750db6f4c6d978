//! # Settings Store
//!
//! Holds the card configuration (name, font, size, style, color, position)
//! and the current source image.
//!
//! Every mutation publishes a fresh snapshot on a [`tokio::sync::watch`]
//! channel. Observers are woken once per publish and always read the
//! latest snapshot, so a burst of edits collapses into a single pending
//! notification for anyone who was not scheduled in between.
//!
//! ```
//! use namecard::settings::SettingsStore;
//!
//! let store = SettingsStore::default();
//! let mut rx = store.subscribe();
//!
//! store.set_display_name("Jane Doe");
//! assert!(rx.has_changed().unwrap());
//! assert_eq!(rx.borrow_and_update().display_name, "Jane Doe");
//! ```

pub mod query;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use crate::render::SourceImage;

pub use query::PageAddress;

/// Font size used when the configured size is missing or unparsable.
pub const DEFAULT_SIZE_PT: f32 = 14.0;

/// Text anchor as fractions of the image width and height.
///
/// Keeping the anchor relative makes a layout independent of the
/// resolution of whatever image it is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const CENTER: Position = Position { x: 0.5, y: 0.5 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Convert a click on the displayed preview into a relative position.
    ///
    /// `offset` is the click point relative to the preview's top-left
    /// corner and `displayed` is the preview's rendered size, both in the
    /// same (CSS pixel) units. Returns `None` for a degenerate preview.
    pub fn from_click(offset: (f32, f32), displayed: (f32, f32)) -> Option<Self> {
        let (w, h) = displayed;
        if !(w > 0.0 && h > 0.0) {
            return None;
        }
        Some(Self {
            x: (offset.0 / w).clamp(0.0, 1.0),
            y: (offset.1 / h).clamp(0.0, 1.0),
        })
    }

    /// True if both components are finite and within `[0, 1]`.
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::CENTER
    }
}

/// The full card configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub display_name: String,
    pub font_family: String,
    pub bold: bool,
    pub italic: bool,
    pub color_hex: String,
    /// Size in points against a 600px-tall reference image
    pub size_pt: f32,
    pub position: Position,
    /// Pasted font-provider markup (e.g. a `<link href=...>` tag)
    pub font_stylesheet_markup: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_name: query::DEFAULT_NAME.to_string(),
            font_family: query::DEFAULT_FONT_FAMILY.to_string(),
            bold: false,
            italic: false,
            color_hex: query::DEFAULT_COLOR.to_string(),
            size_pt: DEFAULT_SIZE_PT,
            position: Position::CENTER,
            font_stylesheet_markup: String::new(),
        }
    }
}

impl Settings {
    /// True if `other` differs in anything that affects the rendered card.
    ///
    /// The font markup only matters through the fonts it loads, which the
    /// sync controller tracks separately.
    pub fn visually_differs(&self, other: &Settings) -> bool {
        self.display_name != other.display_name
            || self.font_family != other.font_family
            || self.bold != other.bold
            || self.italic != other.italic
            || self.color_hex != other.color_hex
            || self.size_pt != other.size_pt
            || self.position != other.position
    }
}

/// Partial settings update, as sent by the frontend widgets.
///
/// Absent fields are left untouched. `size_pt` accepts the raw text of the
/// size field; unparsable text falls back to the default size.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub display_name: Option<String>,
    pub font_family: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub color_hex: Option<String>,
    pub size_pt: Option<serde_json::Value>,
    pub position: Option<Position>,
    pub font_stylesheet_markup: Option<String>,
}

impl SettingsPatch {
    /// Apply to `settings`, returning whether anything changed.
    pub fn apply(self, settings: &mut Settings) -> bool {
        let before = settings.clone();
        if let Some(v) = self.display_name {
            settings.display_name = v;
        }
        if let Some(v) = self.font_family {
            settings.font_family = v;
        }
        if let Some(v) = self.bold {
            settings.bold = v;
        }
        if let Some(v) = self.italic {
            settings.italic = v;
        }
        if let Some(v) = self.color_hex {
            settings.color_hex = v;
        }
        if let Some(v) = self.size_pt {
            settings.size_pt = match v {
                serde_json::Value::Number(n) => n
                    .as_f64()
                    .map(|n| n as f32)
                    .filter(|n| n.is_finite())
                    .unwrap_or(DEFAULT_SIZE_PT),
                serde_json::Value::String(s) => parse_size(&s),
                _ => DEFAULT_SIZE_PT,
            };
        }
        if let Some(v) = self.position.filter(Position::is_valid) {
            settings.position = v;
        }
        if let Some(v) = self.font_stylesheet_markup {
            settings.font_stylesheet_markup = v;
        }
        *settings != before
    }
}

/// Parse a font size, falling back to [`DEFAULT_SIZE_PT`].
pub fn parse_size(text: &str) -> f32 {
    text.trim()
        .parse::<f32>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(DEFAULT_SIZE_PT)
}

/// Observable settings plus the current source image.
///
/// Cloning the store is cheap and every clone shares the same channels.
#[derive(Clone)]
pub struct SettingsStore {
    settings: Arc<watch::Sender<Settings>>,
    image: Arc<watch::Sender<Option<Arc<SourceImage>>>>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsStore {
    pub fn new(initial: Settings) -> Self {
        let (settings, _) = watch::channel(initial);
        let (image, _) = watch::channel(None);
        Self {
            settings: Arc::new(settings),
            image: Arc::new(image),
        }
    }

    /// Seed a store from a page-address query string.
    pub fn from_query(query: &str) -> Self {
        Self::new(query::decode(query))
    }

    pub fn snapshot(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.settings.subscribe()
    }

    pub fn subscribe_image(&self) -> watch::Receiver<Option<Arc<SourceImage>>> {
        self.image.subscribe()
    }

    pub fn image(&self) -> Option<Arc<SourceImage>> {
        self.image.borrow().clone()
    }

    /// Replace the source image wholesale.
    pub fn set_image(&self, image: SourceImage) {
        self.image.send_replace(Some(Arc::new(image)));
    }

    /// Mutate the settings in place. Observers are notified only if the
    /// closure actually changed something.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) -> bool {
        self.settings.send_if_modified(|s| {
            let before = s.clone();
            f(s);
            *s != before
        })
    }

    pub fn apply(&self, patch: SettingsPatch) -> bool {
        self.settings.send_if_modified(|s| patch.apply(s))
    }

    pub fn display_name(&self) -> String {
        self.settings.borrow().display_name.clone()
    }

    pub fn set_display_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.update(|s| s.display_name = name);
    }

    pub fn font_family(&self) -> String {
        self.settings.borrow().font_family.clone()
    }

    pub fn set_font_family(&self, family: impl Into<String>) {
        let family = family.into();
        self.update(|s| s.font_family = family);
    }

    pub fn bold(&self) -> bool {
        self.settings.borrow().bold
    }

    pub fn set_bold(&self, bold: bool) {
        self.update(|s| s.bold = bold);
    }

    pub fn italic(&self) -> bool {
        self.settings.borrow().italic
    }

    pub fn set_italic(&self, italic: bool) {
        self.update(|s| s.italic = italic);
    }

    pub fn color_hex(&self) -> String {
        self.settings.borrow().color_hex.clone()
    }

    pub fn set_color_hex(&self, color: impl Into<String>) {
        let color = color.into();
        self.update(|s| s.color_hex = color);
    }

    pub fn size_pt(&self) -> f32 {
        self.settings.borrow().size_pt
    }

    /// Set the size from the raw text of the size field.
    pub fn set_size_text(&self, text: &str) {
        let size = parse_size(text);
        self.update(|s| s.size_pt = size);
    }

    pub fn set_size_pt(&self, size: f32) {
        let size = if size.is_finite() { size } else { DEFAULT_SIZE_PT };
        self.update(|s| s.size_pt = size);
    }

    pub fn position(&self) -> Position {
        self.settings.borrow().position
    }

    pub fn set_position(&self, position: Position) {
        if position.is_valid() {
            self.update(|s| s.position = position);
        }
    }

    /// Reposition the text from a click on the displayed preview.
    pub fn set_position_from_click(&self, offset: (f32, f32), displayed: (f32, f32)) -> Option<Position> {
        let position = Position::from_click(offset, displayed)?;
        self.set_position(position);
        Some(position)
    }

    pub fn font_stylesheet_markup(&self) -> String {
        self.settings.borrow().font_stylesheet_markup.clone()
    }

    pub fn set_font_stylesheet_markup(&self, markup: impl Into<String>) {
        let markup = markup.into();
        self.update(|s| s.font_stylesheet_markup = markup);
    }
}
