use std::{path::PathBuf, sync::Arc};

use {
    aggregator_common::{MediaId, PostId},
    aggregator_config::AggregatorConfig,
    aggregator_media::{
        FsMediaStore, FsTempStore, ImageDescriptor, ImageResolver, ImageSniffer, MediaStore,
        ReqwestFetcher, TempFileStore, media_url,
    },
    anyhow::{Context, Result, bail},
    tracing::info,
};

/// Descriptor source recorded for images passed on the command line.
const CLI_SOURCE: &str = "user";

fn library_dir(config: &AggregatorConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.media.library_dir {
        return Ok(dir.clone());
    }
    aggregator_config::data_dir()
        .map(|dir| dir.join("media"))
        .context("no home directory; set media.library_dir")
}

async fn open_store(config: &AggregatorConfig) -> Result<Arc<FsMediaStore>> {
    let root = library_dir(config)?;
    let store = FsMediaStore::open(&root)
        .await
        .with_context(|| format!("failed to open media library at {}", root.display()))?;
    Ok(Arc::new(store))
}

pub async fn resolve(
    config: &AggregatorConfig,
    sources: &[String],
    post: Option<PostId>,
) -> Result<()> {
    let store = open_store(config).await?;
    let temp: Arc<dyn TempFileStore> = Arc::new(FsTempStore::from_config(&config.media));
    let resolver = ImageResolver::new(
        Arc::clone(&store) as Arc<dyn MediaStore>,
        Arc::new(ReqwestFetcher::new(Arc::clone(&temp))),
        temp,
        Arc::new(ImageSniffer),
        &config.media,
    );
    info!(
        library = %store.root().display(),
        strategies = ?resolver.strategy_names(),
        "resolving {} image(s)",
        sources.len()
    );

    let mut failed = 0usize;
    for source in sources {
        let image = ImageDescriptor::new(source.as_str(), CLI_SOURCE);
        match resolver.resolve(&image, post).await {
            Ok(id) => {
                let url = store.url_of(id).await?.unwrap_or_default();
                println!("{id}\t{url}");
            },
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e}", display_source(source));
            },
        }
    }

    if failed > 0 {
        bail!("{failed} of {} image(s) could not be resolved", sources.len());
    }
    Ok(())
}

pub async fn url(config: &AggregatorConfig, id: MediaId) -> Result<()> {
    let store = open_store(config).await?;
    match media_url(store.as_ref(), id).await? {
        Some(url) => {
            println!("{url}");
            Ok(())
        },
        None => bail!("image #{id} has no URL"),
    }
}

pub async fn thumbnail(config: &AggregatorConfig, post: PostId) -> Result<()> {
    let store = open_store(config).await?;
    match ImageDescriptor::from_post_thumbnail(store.as_ref(), post).await? {
        Some(image) => {
            let id = image.id.map(|id| id.to_string()).unwrap_or_default();
            println!("{id}\t{}", image.url);
            Ok(())
        },
        None => bail!("post #{post} has no featured image"),
    }
}

/// Data URIs are shortened so a failure line stays readable.
fn display_source(source: &str) -> String {
    const MAX: usize = 64;
    match source.char_indices().nth(MAX) {
        Some((cut, _)) if source.trim_start().starts_with("data:") => {
            format!("{}...", &source[..cut])
        },
        _ => source.to_string(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_data_uris_are_shortened() {
        let uri = format!("data:image/png;base64,{}", "A".repeat(200));
        let shown = display_source(&uri);
        assert_eq!(shown.len(), 67);
        assert!(shown.ends_with("..."));

        let url = format!("https://example.com/{}.png", "a".repeat(100));
        assert_eq!(display_source(&url), url);
    }

    #[test]
    fn explicit_library_dir_wins() {
        let mut config = AggregatorConfig::default();
        config.media.library_dir = Some(PathBuf::from("/srv/media"));
        assert_eq!(library_dir(&config).unwrap(), PathBuf::from("/srv/media"));
    }

    #[tokio::test]
    async fn url_of_missing_attachment_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AggregatorConfig::default();
        config.media.library_dir = Some(dir.path().to_path_buf());

        let err = url(&config, MediaId::new(5)).await.unwrap_err();
        assert_eq!(err.to_string(), "image #5 has no URL");
        assert!(dir.path().join("uploads").is_dir());
    }

    #[tokio::test]
    async fn post_without_thumbnail_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AggregatorConfig::default();
        config.media.library_dir = Some(dir.path().to_path_buf());

        let err = thumbnail(&config, PostId::new(3)).await.unwrap_err();
        assert_eq!(err.to_string(), "post #3 has no featured image");
    }
}
