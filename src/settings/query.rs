//! Page-address encoding of [`Settings`].
//!
//! Settings travel as a flat `application/x-www-form-urlencoded` query so a
//! configured card can be shared as a plain link. String fields are written
//! verbatim; `coordinates` is a JSON array `[x, y]`.
//!
//! | Key | Field | Default |
//! |-----|-------|---------|
//! | `name` | display name | `Tan Ah Kow` |
//! | `fontFamily` | font family | `sans-serif` |
//! | `isItalic` | italic | `false` |
//! | `isBold` | bold | `false` |
//! | `fontColor` | color | `#000000` |
//! | `fontSize` | size | `14` |
//! | `fontLoadingCode` | stylesheet markup | empty |
//! | `coordinates` | position | `[0.5,0.5]` |
//!
//! Decoding never fails: a missing key or a malformed number or position
//! takes its default. Present string values are kept even when empty.

use std::collections::HashMap;
use url::form_urlencoded;

use super::{parse_size, Position, Settings};

pub const DEFAULT_NAME: &str = "Tan Ah Kow";
pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";
pub const DEFAULT_COLOR: &str = "#000000";

pub const KEY_NAME: &str = "name";
pub const KEY_FONT_FAMILY: &str = "fontFamily";
pub const KEY_ITALIC: &str = "isItalic";
pub const KEY_BOLD: &str = "isBold";
pub const KEY_COLOR: &str = "fontColor";
pub const KEY_SIZE: &str = "fontSize";
pub const KEY_FONT_CODE: &str = "fontLoadingCode";
pub const KEY_COORDINATES: &str = "coordinates";

/// Serialize settings into a query string (without the leading `?`).
pub fn encode(settings: &Settings) -> String {
    let coordinates = serde_json::to_string(&[settings.position.x, settings.position.y])
        .unwrap_or_else(|_| "[0.5,0.5]".to_string());

    form_urlencoded::Serializer::new(String::new())
        .append_pair(KEY_NAME, &settings.display_name)
        .append_pair(KEY_FONT_FAMILY, &settings.font_family)
        .append_pair(KEY_ITALIC, bool_str(settings.italic))
        .append_pair(KEY_BOLD, bool_str(settings.bold))
        .append_pair(KEY_COLOR, &settings.color_hex)
        .append_pair(KEY_SIZE, &settings.size_pt.to_string())
        .append_pair(KEY_FONT_CODE, &settings.font_stylesheet_markup)
        .append_pair(KEY_COORDINATES, &coordinates)
        .finish()
}

/// Parse a query string (with or without the leading `?`) into settings.
pub fn decode(query: &str) -> Settings {
    let params = parse_params(query);
    let text = |key: &str, default: &str| -> String {
        params.get(key).cloned().unwrap_or_else(|| default.to_string())
    };

    Settings {
        display_name: text(KEY_NAME, DEFAULT_NAME),
        font_family: text(KEY_FONT_FAMILY, DEFAULT_FONT_FAMILY),
        bold: params.get(KEY_BOLD).is_some_and(|v| v == "true"),
        italic: params.get(KEY_ITALIC).is_some_and(|v| v == "true"),
        color_hex: text(KEY_COLOR, DEFAULT_COLOR),
        size_pt: params.get(KEY_SIZE).map(|v| parse_size(v)).unwrap_or(super::DEFAULT_SIZE_PT),
        position: params
            .get(KEY_COORDINATES)
            .and_then(|v| parse_coordinates(v))
            .unwrap_or_default(),
        font_stylesheet_markup: params.get(KEY_FONT_CODE).cloned().unwrap_or_default(),
    }
}

/// True if the query carries non-empty font markup.
pub fn has_font_code(query: &str) -> bool {
    parse_params(query)
        .get(KEY_FONT_CODE)
        .is_some_and(|v| !v.trim().is_empty())
}

fn parse_params(query: &str) -> HashMap<String, String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params = HashMap::new();
    // First occurrence wins, like URLSearchParams.get
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    params
}

fn parse_coordinates(raw: &str) -> Option<Position> {
    let [x, y]: [f32; 2] = serde_json::from_str(raw).ok()?;
    let position = Position::new(x, y);
    position.is_valid().then_some(position)
}

fn bool_str(v: bool) -> &'static str {
    if v { "true" } else { "false" }
}

/// The page's shareable address.
///
/// Only the current query is kept: every write replaces the previous one,
/// so there is no history to navigate back through.
#[derive(Debug, Clone, PartialEq)]
pub struct PageAddress {
    path: String,
    query: String,
}

impl PageAddress {
    pub fn new(path: impl Into<String>, query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            path: path.into(),
            query: query.strip_prefix('?').unwrap_or(&query).to_string(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Replace the query with the encoding of `settings`.
    pub fn replace(&mut self, settings: &Settings) {
        self.query = encode(settings);
    }

    /// Path plus query, ready to paste.
    pub fn share_link(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_query_gives_defaults() {
        assert_eq!(decode(""), Settings::default());
        assert_eq!(decode("?"), Settings::default());
    }

    #[test]
    fn test_round_trip() {
        let settings = Settings {
            display_name: "Jane & John Doe".to_string(),
            font_family: "Playfair Display".to_string(),
            bold: true,
            italic: true,
            color_hex: "#a01f3c".to_string(),
            size_pt: 30.5,
            position: Position::new(0.25, 0.1),
            font_stylesheet_markup:
                r#"<link href="https://fonts.googleapis.com/css2?family=Playfair+Display&display=swap" rel="stylesheet">"#
                    .to_string(),
        };
        assert_eq!(decode(&encode(&settings)), settings);

        let cleared = Settings {
            display_name: String::new(),
            ..Default::default()
        };
        assert_eq!(decode(&encode(&cleared)), cleared);
    }

    #[test]
    fn test_only_missing_strings_default() {
        let s = decode("name=&fontFamily=");
        assert_eq!(s.display_name, "");
        assert_eq!(s.font_family, "");
        assert_eq!(s.color_hex, DEFAULT_COLOR);
    }

    #[test]
    fn test_unparsable_size_falls_back() {
        assert_eq!(decode("fontSize=abc").size_pt, 14.0);
        assert_eq!(decode("fontSize=30").size_pt, 30.0);
    }

    #[test]
    fn test_malformed_coordinates_fall_back() {
        assert_eq!(decode("coordinates=oops").position, Position::CENTER);
        assert_eq!(decode("coordinates=%5B0.2%5D").position, Position::CENTER);
        assert_eq!(decode("coordinates=%5B2%2C0.5%5D").position, Position::CENTER);
        assert_eq!(
            decode("coordinates=%5B0.2%2C0.7%5D").position,
            Position::new(0.2, 0.7)
        );
    }

    #[test]
    fn test_booleans_are_best_effort() {
        let s = decode("isBold=true&isItalic=yes");
        assert!(s.bold);
        assert!(!s.italic);
    }

    #[test]
    fn test_strings_verbatim() {
        let s = decode("name=Tan%20Ah%20Kow%20%26%20Co&fontColor=%23ff0000");
        assert_eq!(s.display_name, "Tan Ah Kow & Co");
        assert_eq!(s.color_hex, "#ff0000");
    }

    #[test]
    fn test_has_font_code() {
        assert!(!has_font_code("name=x"));
        assert!(!has_font_code("fontLoadingCode="));
        assert!(has_font_code("fontLoadingCode=%3Clink%20href%3D%22a%22%3E"));
    }

    #[test]
    fn test_page_address_replace_keeps_single_entry() {
        let mut address = PageAddress::new("/", "?name=old");
        assert_eq!(address.share_link(), "/?name=old");

        let mut settings = Settings::default();
        settings.display_name = "New".to_string();
        address.replace(&settings);
        address.replace(&settings);

        assert_eq!(decode(address.query()).display_name, "New");
        assert!(address.share_link().starts_with("/?name=New&"));
    }
}
