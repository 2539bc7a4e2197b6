//! Export command - fetch a post and render it

use anyhow::{Context, Result, bail};
use serde_json::json;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use whiff_adapters::{
    auth::StaticAuthenticator, blurhash::BlurhashDecoder, images::HttpImageLoader,
    mastodon::MastodonPostFetcher, render::TranscriptRenderer, settings::FsSettingsStore,
};
use whiff_domain::usecases::{Dependencies, ExportAction, ExportFeature, ExportState, ExportStore};
use whiff_domain::{ImageKind, Post};

use crate::args::ExportArgs;
use crate::config::AppConfig;

pub async fn execute(args: ExportArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let mut store = build_store(&config)?;

    tracing::info!(url = %args.url, "Exporting post");
    store.send(ExportAction::Requested {
        url: args.url.clone(),
    });

    if !args.show.is_empty() {
        store
            .settle_until(|s| s.context.is_some() || s.error_message.is_some())
            .await;
        fail_on_error(store.state(), &config)?;

        let extra = thread_posts(store.state(), &args.show)?;
        for post in extra {
            store.send(ExportAction::ToggledPostVisibility(post));
        }
    }

    store.settle().await;

    let state = store.state();
    fail_on_error(state, &config)?;

    let rendered = state
        .rendered
        .as_ref()
        .context("Nothing was rendered for this post")?;

    if let Some(out) = &args.out {
        fs::write(out, &rendered.data)
            .with_context(|| format!("Failed to write output: {}", out.display()))?;
        tracing::info!(path = %out.display(), bytes = rendered.len(), "Wrote card");
    }

    if args.json {
        let summary = summarize(state, args.out.as_ref())?;
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{}", json);
        return Ok(());
    }

    let mut stdout = io::stdout().lock();
    if args.out.is_none() {
        stdout
            .write_all(&rendered.data)
            .context("Failed to write card to stdout")?;
    }
    if let Some(caption) = state.share_caption() {
        writeln!(stdout, "{}", caption).context("Failed to write share caption")?;
    }

    Ok(())
}

fn build_store(config: &AppConfig) -> Result<ExportStore> {
    let post_fetcher =
        MastodonPostFetcher::new(Duration::from_secs(config.mastodon.timeout_secs))
            .context("Failed to build Mastodon client")?;
    let image_loader = HttpImageLoader::new(Duration::from_secs(config.images.timeout_secs))
        .context("Failed to build image client")?;

    let deps = Dependencies {
        post_fetcher: Arc::new(post_fetcher),
        authenticator: Arc::new(StaticAuthenticator::from_env(&config.mastodon.token_env)),
        image_loader: Arc::new(image_loader),
        hash_decoder: Arc::new(BlurhashDecoder::new()),
        renderer: Arc::new(TranscriptRenderer::new()),
        settings_store: Arc::new(FsSettingsStore::new(&config.general.settings_dir)),
    };

    Ok(ExportStore::new(ExportFeature::new(
        deps,
        config.export.to_export_config(),
    )))
}

fn fail_on_error(state: &ExportState, config: &AppConfig) -> Result<()> {
    let Some(message) = &state.error_message else {
        return Ok(());
    };
    if state.login_suggested {
        bail!(
            "{} (set {} to an access token to log in)",
            message,
            config.mastodon.token_env
        );
    }
    bail!("{}", message)
}

/// Thread posts named by `ids` that are not yet visible
fn thread_posts(state: &ExportState, ids: &[String]) -> Result<Vec<Post>> {
    let mut posts = Vec::new();
    for id in ids {
        if state.visible_post_ids.contains(id) {
            continue;
        }
        let post = state
            .context
            .as_ref()
            .and_then(|c| c.find(id))
            .with_context(|| format!("Post {} is not part of the thread", id))?;
        posts.push(post.clone());
    }
    Ok(posts)
}

fn summarize(state: &ExportState, out: Option<&PathBuf>) -> Result<serde_json::Value> {
    let post = state.post.as_ref().context("No post loaded")?;
    let created_at = post
        .created_at
        .format(&Rfc3339)
        .context("Failed to format post date")?;
    let visible: Vec<&str> = state.visible_posts().map(|p| p.id.as_str()).collect();

    Ok(json!({
        "url": post.url,
        "id": post.id,
        "author": post.author.username,
        "created_at": created_at,
        "visible_posts": visible,
        "thread_size": state.all_posts().len(),
        "images": {
            "remote": state.images.count(ImageKind::Remote),
            "placeholder": state.images.count(ImageKind::Blurhash),
        },
        "output": out.map(|p| p.display().to_string()),
        "share_caption": state.share_caption(),
    }))
}
