//! Plain-text transcript renderer

use async_trait::async_trait;
use std::fmt::Write;
use time::macros::format_description;
use whiff_domain::usecases::ExportState;
use whiff_domain::{Image, ImageKind, LinkStyle, Post, RenderError, Renderer};

pub const TRANSCRIPT_MEDIA_TYPE: &str = "text/plain; charset=utf-8";

const SEPARATOR: &str = "----";

/// Renders the visible thread as a text card.
///
/// The output's width and height are its longest line and line count.
#[derive(Debug, Default, Clone, Copy)]
pub struct TranscriptRenderer;

impl TranscriptRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Text of the card for `state`
    pub fn transcript(&self, state: &ExportState) -> Result<String, RenderError> {
        let root = state.post.as_ref().ok_or(RenderError::NothingToRender)?;
        let settings = &state.settings;

        let mut out = String::new();
        writeln!(
            out,
            "# text {} on {}, links {}, {} corners, {} layout",
            settings.text_color,
            settings.background_color,
            settings.link_color,
            if settings.round_corners { "round" } else { "square" },
            settings.image_style,
        )
        .map_err(backend)?;

        for (index, post) in state.visible_posts().enumerate() {
            if index > 0 {
                writeln!(out, "{}", SEPARATOR).map_err(backend)?;
            }
            self.write_post(&mut out, state, post).map_err(backend)?;
        }

        if settings.link_style == LinkStyle::InImage {
            writeln!(out, "{}", SEPARATOR).map_err(backend)?;
            writeln!(out, "{}", root.url).map_err(backend)?;
        }

        Ok(out)
    }

    fn write_post(&self, out: &mut String, state: &ExportState, post: &Post) -> std::fmt::Result {
        writeln!(out, "{}  {}", post.author.display_name, post.author.username)?;

        if state.settings.show_date {
            let format = format_description!(
                "[day] [month repr:short] [year] [hour]:[minute] UTC"
            );
            let date = post
                .created_at
                .to_offset(time::UtcOffset::UTC)
                .format(format)
                .unwrap_or_default();
            writeln!(out, "{}", date)?;
        }

        match state.attributed_content.get(&post.id) {
            Some(content) => writeln!(out, "{}", content.plain_text())?,
            None => writeln!(out, "{}", post.content)?,
        }

        let count = post.media_attachments.len();
        for (i, attachment) in post.media_attachments.iter().enumerate() {
            let url = attachment.display_url();
            writeln!(
                out,
                "[image {}/{}: {} ({})]",
                i + 1,
                count,
                url,
                image_status(state, url)
            )?;
        }

        if let Some(card) = &post.card {
            writeln!(out, "[card: {} <{}>]", card.title, card.link_url)?;
        }
        Ok(())
    }
}

fn image_status(state: &ExportState, url: &str) -> &'static str {
    match state.images.best(url) {
        Some((_, ImageKind::Remote)) => "loaded",
        Some((_, ImageKind::Blurhash)) => "placeholder",
        None => "missing",
    }
}

fn backend(e: std::fmt::Error) -> RenderError {
    RenderError::Backend(e.to_string())
}

#[async_trait]
impl Renderer for TranscriptRenderer {
    async fn render(&self, snapshot: &ExportState) -> Result<Image, RenderError> {
        let text = self.transcript(snapshot)?;
        let width = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        let height = text.lines().count();
        Ok(Image::new(
            width as u32,
            height as u32,
            TRANSCRIPT_MEDIA_TYPE,
            text.into_bytes(),
        ))
    }
}
