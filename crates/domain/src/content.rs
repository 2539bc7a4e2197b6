//! Post markup formatting
//!
//! Mastodon returns post bodies as a small HTML subset. This module turns that
//! markup into styled text runs, drops the styling the server embedded, and
//! tints hyperlinks with the user's link color.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::model::Color;

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*(?:=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("attribute pattern is valid")
});

static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([-a-zA-Z]+)\s*:\s*([^;]+)").expect("style pattern is valid")
});

static RGB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*[\d.]+\s*)?\)$")
        .expect("rgb pattern is valid")
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("entity pattern is valid")
});

/// Error type for markup parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("Unterminated tag at byte {offset}")]
    UnterminatedTag { offset: usize },
    #[error("Closing tag </{tag}> has no matching open tag")]
    UnexpectedClosingTag { tag: String },
}

impl ContentError {
    /// Formatting failures fall back to raw text and are never shown
    pub fn user_message(&self) -> Option<String> {
        None
    }
}

/// Styling attached to a run of text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextAttributes {
    pub foreground: Option<Color>,
    pub font: Option<String>,
    pub kern: Option<String>,
    pub paragraph_style: Option<String>,
    pub stroke: Option<Color>,
    /// Target of the enclosing hyperlink
    pub link: Option<String>,
    pub bold: bool,
    pub italic: bool,
}

impl TextAttributes {
    fn strip_embedded(&mut self) {
        self.foreground = None;
        self.font = None;
        self.kern = None;
        self.paragraph_style = None;
        self.stroke = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub attributes: TextAttributes,
}

/// Display-ready rich text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributedContent {
    pub runs: Vec<TextRun>,
}

impl AttributedContent {
    pub fn parse(markup: &str) -> Result<Self, ContentError> {
        Parser::new(markup).run()
    }

    /// Remove foreground, font, kerning, paragraph and stroke styling
    pub fn strip_embedded_styling(&mut self) {
        for run in &mut self.runs {
            run.attributes.strip_embedded();
        }
        self.coalesce();
    }

    /// Color every hyperlink run with `color`
    pub fn tint_links(&mut self, color: Color) {
        for run in &mut self.runs {
            if run.attributes.link.is_some() {
                run.attributes.foreground = Some(color);
            }
        }
    }

    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Distinct link targets in order of appearance
    pub fn links(&self) -> Vec<&str> {
        let mut links: Vec<&str> = Vec::new();
        for link in self.runs.iter().filter_map(|r| r.attributes.link.as_deref()) {
            if !links.contains(&link) {
                links.push(link);
            }
        }
        links
    }

    fn push(&mut self, text: &str, attributes: &TextAttributes) {
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if &last.attributes == attributes => last.text.push_str(text),
            _ => self.runs.push(TextRun {
                text: text.to_string(),
                attributes: attributes.clone(),
            }),
        }
    }

    fn coalesce(&mut self) {
        let runs = std::mem::take(&mut self.runs);
        for run in runs {
            self.push(&run.text, &run.attributes);
        }
    }

    fn ends_with_whitespace(&self) -> bool {
        self.runs
            .last()
            .and_then(|r| r.text.chars().last())
            .is_none_or(char::is_whitespace)
    }

    fn trim_trailing_whitespace(&mut self) {
        while let Some(last) = self.runs.last_mut() {
            let trimmed = last.text.trim_end().len();
            last.text.truncate(trimmed);
            if last.text.is_empty() {
                self.runs.pop();
            } else {
                break;
            }
        }
    }
}

/// Parse `markup`, drop embedded styling and tint links with `link_color`.
///
/// Deterministic in `(markup, link_color)`.
pub fn format_content(markup: &str, link_color: Color) -> Result<AttributedContent, ContentError> {
    let mut content = AttributedContent::parse(markup)?;
    content.strip_embedded_styling();
    content.tint_links(link_color);
    Ok(content)
}

struct OpenTag {
    name: String,
    attributes: TextAttributes,
}

struct Parser<'a> {
    markup: &'a str,
    stack: Vec<OpenTag>,
    out: AttributedContent,
}

impl<'a> Parser<'a> {
    fn new(markup: &'a str) -> Self {
        Self {
            markup,
            stack: Vec::new(),
            out: AttributedContent::default(),
        }
    }

    fn current(&self) -> TextAttributes {
        self.stack
            .last()
            .map(|t| t.attributes.clone())
            .unwrap_or_default()
    }

    fn run(mut self) -> Result<AttributedContent, ContentError> {
        let mut pos = 0;
        while pos < self.markup.len() {
            let rest = &self.markup[pos..];
            let Some(lt) = rest.find('<') else {
                self.text(rest);
                break;
            };
            self.text(&rest[..lt]);
            let tag_start = pos + lt;

            if self.markup[tag_start..].starts_with("<!--") {
                match self.markup[tag_start..].find("-->") {
                    Some(end) => pos = tag_start + end + 3,
                    None => return Err(ContentError::UnterminatedTag { offset: tag_start }),
                }
                continue;
            }

            let Some(gt) = self.markup[tag_start..].find('>') else {
                return Err(ContentError::UnterminatedTag { offset: tag_start });
            };
            let inner = &self.markup[tag_start + 1..tag_start + gt];
            self.tag(inner)?;
            pos = tag_start + gt + 1;
        }

        self.out.trim_trailing_whitespace();
        Ok(self.out)
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let decoded = decode_entities(raw);
        let mut collapsed = String::with_capacity(decoded.len());
        let mut pending_space = false;
        for c in decoded.chars() {
            // Non-breaking spaces survive collapsing
            if c.is_whitespace() && c != '\u{a0}' {
                pending_space = true;
                continue;
            }
            if pending_space && !(collapsed.is_empty() && self.out.ends_with_whitespace()) {
                collapsed.push(' ');
            }
            pending_space = false;
            collapsed.push(c);
        }
        if pending_space && !(collapsed.is_empty() && self.out.ends_with_whitespace()) {
            collapsed.push(' ');
        }
        let attributes = self.current();
        self.out.push(&collapsed, &attributes);
    }

    fn break_line(&mut self, newlines: usize) {
        if self.out.runs.is_empty() {
            return;
        }
        self.out.trim_trailing_whitespace();
        let attributes = self.current();
        self.out.push(&"\n".repeat(newlines), &attributes);
    }

    fn tag(&mut self, inner: &str) -> Result<(), ContentError> {
        let inner = inner.trim();
        if inner.starts_with('!') || inner.starts_with('?') {
            return Ok(());
        }

        if let Some(closing) = inner.strip_prefix('/') {
            let name = closing.trim().to_ascii_lowercase();
            return self.close(&name);
        }

        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/');
        let (name, attrs) = match inner.find(char::is_whitespace) {
            Some(split) => (&inner[..split], &inner[split..]),
            None => (inner, ""),
        };
        let name = name.to_ascii_lowercase();

        match name.as_str() {
            "br" => {
                let attributes = self.current();
                self.out.trim_trailing_whitespace();
                self.out.push("\n", &attributes);
                return Ok(());
            }
            "img" | "hr" | "meta" | "link" => return Ok(()),
            "p" => self.break_line(2),
            "div" | "li" | "blockquote" => self.break_line(1),
            _ => {}
        }

        if self_closing {
            return Ok(());
        }

        let mut attributes = self.current();
        apply_tag(&name, attrs, &mut attributes);
        self.stack.push(OpenTag { name, attributes });
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), ContentError> {
        let Some(index) = self.stack.iter().rposition(|t| t.name == name) else {
            if matches!(name, "br" | "img" | "hr") {
                return Ok(());
            }
            return Err(ContentError::UnexpectedClosingTag {
                tag: name.to_string(),
            });
        };
        self.stack.truncate(index);
        Ok(())
    }
}

fn apply_tag(name: &str, attrs: &str, attributes: &mut TextAttributes) {
    let parsed = parse_attributes(attrs);
    let attr = |key: &str| {
        parsed
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    match name {
        "a" => {
            if let Some(href) = attr("href") {
                attributes.link = Some(href.to_string());
            }
        }
        "strong" | "b" => attributes.bold = true,
        "em" | "i" => attributes.italic = true,
        "font" => {
            if let Some(color) = attr("color").and_then(parse_css_color) {
                attributes.foreground = Some(color);
            }
            if let Some(face) = attr("face") {
                attributes.font = Some(face.to_string());
            }
        }
        _ => {}
    }

    if let Some(style) = attr("style") {
        apply_style(style, attributes);
    }
}

fn apply_style(style: &str, attributes: &mut TextAttributes) {
    for caps in STYLE_RE.captures_iter(style) {
        let property = caps[1].to_ascii_lowercase();
        let value = caps[2].trim();
        match property.as_str() {
            "color" => attributes.foreground = parse_css_color(value),
            "font" | "font-family" | "font-size" => attributes.font = Some(value.to_string()),
            "letter-spacing" => attributes.kern = Some(value.to_string()),
            "text-align" | "line-height" | "text-indent" => {
                attributes.paragraph_style = Some(value.to_string())
            }
            "-webkit-text-stroke" | "-webkit-text-stroke-color" => {
                attributes.stroke = value.split_whitespace().find_map(parse_css_color)
            }
            _ => {}
        }
    }
}

fn parse_attributes(attrs: &str) -> Vec<(String, String)> {
    ATTRIBUTE_RE
        .captures_iter(attrs)
        .map(|caps| {
            let key = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (key, value)
        })
        .collect()
}

fn parse_css_color(value: &str) -> Option<Color> {
    let value = value.trim();
    if value.starts_with('#') {
        return value.parse().ok();
    }
    if let Some(caps) = RGB_RE.captures(value) {
        let channel = |i: usize| caps[i].parse::<u16>().ok().map(|c| c.min(255) as u8);
        return Some(Color::rgb(channel(1)?, channel(2)?, channel(3)?));
    }
    match value.to_ascii_lowercase().as_str() {
        "black" => Some(Color::BLACK),
        "white" => Some(Color::WHITE),
        "blue" => Some(Color::rgb(0, 0, 0xff)),
        "red" => Some(Color::rgb(0xff, 0, 0)),
        "green" => Some(Color::rgb(0, 0x80, 0)),
        _ => None,
    }
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    ENTITY_RE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
