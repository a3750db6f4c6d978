//! Stylesheet discovery and `@font-face` parsing.
//!
//! Font providers hand out an embed snippet such as
//!
//! ```html
//! <link href="https://fonts.googleapis.com/css2?family=Lobster&display=swap" rel="stylesheet">
//! ```
//!
//! The snippet is parsed as an HTML fragment. The first `href` of a
//! `rel="stylesheet"` link is the stylesheet URL; without one, the first
//! `href` of any element is used. The stylesheet itself is scanned for
//! `@font-face` blocks; only the declarations needed to load a face
//! (`font-family`, `font-weight`, `font-style`, `src`) are read.

use scraper::{Html, Selector};
use url::Url;

use crate::error::CardError;

/// A single `@font-face` rule reduced to what loading needs.
#[derive(Debug, Clone, PartialEq)]
pub struct FontFaceRule {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
    /// Absolute URL of a TrueType/OpenType source
    pub src: String,
}

/// Return the stylesheet URL referenced by the pasted markup.
///
/// Preconnect hints come before the stylesheet link in provider
/// snippets, so stylesheet links are searched first.
pub fn extract_stylesheet_url(markup: &str) -> Result<String, CardError> {
    let fragment = Html::parse_fragment(markup);

    ["link[rel~=stylesheet][href]", "[href]"]
        .iter()
        .filter_map(|sel| Selector::parse(sel).ok())
        .find_map(|selector| {
            fragment
                .select(&selector)
                .filter_map(|node| node.value().attr("href"))
                .map(str::trim)
                .find(|href| !href.is_empty())
                .map(str::to_string)
        })
        .ok_or(CardError::StylesheetNotFound)
}

/// Parse every loadable `@font-face` rule in `css`.
///
/// Relative `url(...)` sources are resolved against `base_url`. Rules
/// without a family or without a TrueType/OpenType source are dropped,
/// since those are the only formats the rasterizer reads.
pub fn parse_font_faces(css: &str, base_url: &str) -> Vec<FontFaceRule> {
    let css = strip_comments(css);
    let base = Url::parse(base_url).ok();
    let mut rules = Vec::new();
    let mut rest = css.as_str();

    while let Some(at) = find_ignore_case(rest, "@font-face") {
        rest = &rest[at + "@font-face".len()..];
        let Some(open) = rest.find('{') else { break };
        let Some(close) = rest[open..].find('}') else { break };
        let body = &rest[open + 1..open + close];
        rest = &rest[open + close + 1..];

        if let Some(rule) = parse_block(body, base.as_ref()) {
            rules.push(rule);
        }
    }
    rules
}

fn parse_block(body: &str, base: Option<&Url>) -> Option<FontFaceRule> {
    let mut family = None;
    let mut bold = false;
    let mut italic = false;
    let mut src = None;

    for decl in body.split(';') {
        let Some((name, value)) = decl.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "font-family" => {
                let v = value.trim_matches(|c| c == '"' || c == '\'').trim();
                if !v.is_empty() {
                    family = Some(v.to_string());
                }
            }
            "font-weight" => bold = is_bold_weight(value),
            "font-style" => {
                let v = value.to_ascii_lowercase();
                italic = v.starts_with("italic") || v.starts_with("oblique");
            }
            "src" => src = pick_source(value, base),
            _ => {}
        }
    }

    Some(FontFaceRule {
        family: family?,
        bold,
        italic,
        src: src?,
    })
}

/// `bold`, `bolder`, or a numeric weight of 600 or more. For a variable
/// range like `100 900` the first number decides.
fn is_bold_weight(value: &str) -> bool {
    let v = value.to_ascii_lowercase();
    if v.starts_with("bold") {
        return true;
    }
    v.split_whitespace()
        .next()
        .and_then(|n| n.parse::<u32>().ok())
        .is_some_and(|n| n >= 600)
}

/// First `url(...)` in a `src` list that is TrueType or OpenType.
///
/// A source qualifies if its `format()` hint says so, or if it has no hint
/// and the URL does not end in a web-only extension.
fn pick_source(value: &str, base: Option<&Url>) -> Option<String> {
    for candidate in value.split(',') {
        let Some(start) = find_ignore_case(candidate, "url(") else {
            continue;
        };
        let after = &candidate[start + 4..];
        let Some(end) = after.find(')') else { continue };
        let raw = after[..end].trim().trim_matches(|c| c == '"' || c == '\'');

        let lower = candidate.to_ascii_lowercase();
        let usable = if let Some(fmt) = lower.find("format(") {
            let hint = &lower[fmt..];
            hint.contains("truetype") || hint.contains("opentype")
        } else {
            let path = raw.split(['?', '#']).next().unwrap_or(raw).to_ascii_lowercase();
            !(path.ends_with(".woff") || path.ends_with(".woff2") || path.ends_with(".eot"))
        };
        if !usable {
            continue;
        }

        let resolved = match base {
            Some(base) => base.join(raw).map(|u| u.to_string()).unwrap_or_else(|_| raw.to_string()),
            None => raw.to_string(),
        };
        return Some(resolved);
    }
    None
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GOOGLE_SNIPPET: &str = r#"<link rel="preconnect" href="https://fonts.googleapis.com">
<link href="https://fonts.googleapis.com/css2?family=Lobster&amp;display=swap" rel="stylesheet">"#;

    #[test]
    fn test_stylesheet_link_preferred() {
        assert_eq!(
            extract_stylesheet_url(GOOGLE_SNIPPET).unwrap(),
            "https://fonts.googleapis.com/css2?family=Lobster&display=swap"
        );
    }

    #[test]
    fn test_first_href_without_stylesheet_link() {
        assert_eq!(
            extract_stylesheet_url(r#"<a href="https://example.com/one.css">1</a><a href="https://example.com/two.css">2</a>"#)
                .unwrap(),
            "https://example.com/one.css"
        );
        assert_eq!(
            extract_stylesheet_url(r#"<link href="https://example.com/a.css?x=1&amp;y=2" rel="stylesheet">"#)
                .unwrap(),
            "https://example.com/a.css?x=1&y=2"
        );
    }

    #[test]
    fn test_missing_href_is_error() {
        for markup in ["", "Roboto", "<link rel=\"stylesheet\">", "<a href=\"  \">x</a>"] {
            assert!(
                matches!(extract_stylesheet_url(markup), Err(CardError::StylesheetNotFound)),
                "markup: {markup:?}"
            );
        }
    }

    #[test]
    fn test_parse_google_css() {
        let css = r#"
/* latin */
@font-face {
  font-family: 'Lobster';
  font-style: normal;
  font-weight: 400;
  font-display: swap;
  src: url(https://fonts.gstatic.com/s/lobster/v30/neILzCirqoswsqX9_oU.ttf) format('truetype');
}
@font-face {
  font-family: "Roboto";
  font-style: italic;
  font-weight: 700;
  src: url(/fonts/roboto-bi.woff2) format('woff2'), url(/fonts/roboto-bi.ttf) format("truetype");
}
"#;
        let rules = parse_font_faces(css, "https://fonts.googleapis.com/css2?family=Lobster");
        assert_eq!(
            rules,
            vec![
                FontFaceRule {
                    family: "Lobster".to_string(),
                    bold: false,
                    italic: false,
                    src: "https://fonts.gstatic.com/s/lobster/v30/neILzCirqoswsqX9_oU.ttf".to_string(),
                },
                FontFaceRule {
                    family: "Roboto".to_string(),
                    bold: true,
                    italic: true,
                    src: "https://fonts.googleapis.com/fonts/roboto-bi.ttf".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_web_only_sources_skipped() {
        let css = "@font-face { font-family: X; src: url(x.woff2) format('woff2'); }\
                   @font-face { font-family: Y; src: url(y.woff); }";
        assert!(parse_font_faces(css, "https://example.com/").is_empty());
    }

    #[test]
    fn test_variable_weight_range() {
        assert!(!is_bold_weight("100 900"));
        assert!(is_bold_weight("600"));
        assert!(is_bold_weight("bold"));
        assert!(!is_bold_weight("normal"));
    }
}
