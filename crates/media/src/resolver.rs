//! Turns an [`ImageDescriptor`] into a media-library attachment.
//!
//! Resolution order, stopping at the first success:
//!
//! 1. an explicit attachment id is checked and returned as is;
//! 2. a `data:image` URI is imported by content hash, with no fallback;
//! 3. a URL already imported (by its source-URL marker) is returned without
//!    touching the network;
//! 4. the download chain runs in order, each strategy seeing the URL as
//!    rewritten by the ones before it.
//!
//! Temp files are owned by [`TempFile`](crate::temp::TempFile) guards, so no
//! exit path leaves one behind.

use std::sync::Arc;

#[cfg(feature = "metrics")]
use std::time::Instant;

use {
    aggregator_common::{MediaId, PostId},
    aggregator_config::MediaConfig,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use aggregator_metrics::{counter, histogram, labels, media as media_metrics};

use crate::{
    data_uri::{DataUri, is_data_image_uri},
    descriptor::ImageDescriptor,
    error::{Error, Result, StrategyFailure},
    ports::{HttpFetcher, MediaStore, MimeSniffer, SOURCE_URL_KEY, TempFileStore},
    single_flight::{KeyGuard, KeyedLocks},
    strategy::{
        Base64Import, BrowserFallback, BrowserSignature, DownloadStrategy, ExplicitFetch,
        FastSideload, attachment_description,
    },
};

/// Outcome of [`ImageResolver::resolve_with_sizes`].
#[derive(Debug)]
pub struct ResolvedImage {
    pub primary: Result<MediaId>,
    /// One entry per [`ImageDescriptor::sizes`] element, in the same order.
    pub sizes: Vec<Result<MediaId>>,
}

pub struct ImageResolver {
    store: Arc<dyn MediaStore>,
    inline: Base64Import,
    chain: Vec<Box<dyn DownloadStrategy>>,
    locks: Option<KeyedLocks>,
}

impl ImageResolver {
    /// Resolver with the standard chain: fast sideload, explicit fetch, then
    /// the browser fallback.
    #[must_use]
    pub fn new(
        store: Arc<dyn MediaStore>,
        fetcher: Arc<dyn HttpFetcher>,
        temp: Arc<dyn TempFileStore>,
        sniffer: Arc<dyn MimeSniffer>,
        config: &MediaConfig,
    ) -> Self {
        let chain: Vec<Box<dyn DownloadStrategy>> = vec![
            Box::new(FastSideload::new(
                Arc::clone(&fetcher),
                Arc::clone(&store),
                config.sideload_timeout(),
            )),
            Box::new(ExplicitFetch::new(
                Arc::clone(&fetcher),
                Arc::clone(&store),
                Arc::clone(&sniffer),
                config.sideload_timeout(),
            )),
            Box::new(BrowserFallback::new(
                fetcher,
                Arc::clone(&store),
                Arc::clone(&temp),
                sniffer,
                BrowserSignature::from_config(config),
                config.browser_timeout(),
            )),
        ];
        Self::with_chain(store, temp, chain).serialize_dedup_keys(config.serialize_dedup_keys)
    }

    /// Resolver with a caller-supplied download chain. Per-key serialization
    /// is on.
    #[must_use]
    pub fn with_chain(
        store: Arc<dyn MediaStore>,
        temp: Arc<dyn TempFileStore>,
        chain: Vec<Box<dyn DownloadStrategy>>,
    ) -> Self {
        Self {
            inline: Base64Import::new(Arc::clone(&store), temp),
            store,
            chain,
            locks: Some(KeyedLocks::new()),
        }
    }

    /// Serialize resolutions that share a dedup key. When off, two concurrent
    /// resolutions of the same URL may both import it.
    #[must_use]
    pub fn serialize_dedup_keys(mut self, enabled: bool) -> Self {
        self.locks = enabled.then(|| self.locks.take().unwrap_or_default());
        self
    }

    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|s| s.name()).collect()
    }

    /// Materialize `image` as an attachment. `post` only annotates the
    /// attachment description; `PostId(0)` is treated as no post.
    pub async fn resolve(&self, image: &ImageDescriptor, post: Option<PostId>) -> Result<MediaId> {
        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let result = self.resolve_inner(image, PostId::non_zero(post)).await;

        #[cfg(feature = "metrics")]
        {
            let outcome = match &result {
                Ok(_) => "ok",
                Err(e) => e.kind().as_str(),
            };
            counter!(media_metrics::RESOLUTIONS_TOTAL, labels::OUTCOME => outcome).increment(1);
            histogram!(media_metrics::RESOLVE_DURATION_SECONDS)
                .record(start.elapsed().as_secs_f64());
        }

        match &result {
            Ok(id) => debug!(id = %id, source = %image.source, "image resolved"),
            Err(e) => warn!(source = %image.source, error = %e, "image could not be resolved"),
        }
        result
    }

    /// Resolve the image and each of its alternative sizes independently.
    pub async fn resolve_with_sizes(
        &self,
        image: &ImageDescriptor,
        post: Option<PostId>,
    ) -> ResolvedImage {
        let primary = self.resolve(image, post).await;
        let mut sizes = Vec::with_capacity(image.sizes.len());
        for size in &image.sizes {
            sizes.push(self.resolve(size, post).await);
        }
        ResolvedImage { primary, sizes }
    }

    async fn resolve_inner(
        &self,
        image: &ImageDescriptor,
        post: Option<PostId>,
    ) -> Result<MediaId> {
        if let Some(id) = image.id {
            return match self.store.find_by_id(id).await? {
                Some(_) => Ok(id),
                None => Err(Error::NotFound { id }),
            };
        }

        if image.url.trim().is_empty() {
            return Err(Error::parse("image has neither an attachment id nor a URL"));
        }

        let description = attachment_description(post);

        if is_data_image_uri(&image.url) {
            let uri = DataUri::parse(&image.url)?;
            let _guard = self.lock(format!("sha256:{}", uri.sha256_hex())).await;
            return self.inline.import(&image.url, &uri, post, &description).await;
        }

        let candidates = self.url_forms(&image.url);
        let key = candidates.last().map_or(image.url.as_str(), String::as_str);
        let _guard = self.lock(format!("url:{key}")).await;

        if let Some(id) = self.find_imported(&candidates).await {
            #[cfg(feature = "metrics")]
            counter!(media_metrics::DEDUP_HITS_TOTAL, labels::KEY => "url").increment(1);
            return Ok(id);
        }

        let mut url = image.url.clone();
        let mut failures = Vec::with_capacity(self.chain.len());
        for strategy in &self.chain {
            url = strategy.prepare(&url);

            #[cfg(feature = "metrics")]
            counter!(media_metrics::STRATEGY_ATTEMPTS_TOTAL, labels::STRATEGY => strategy.name())
                .increment(1);

            match strategy.attempt(&url, post, &description).await {
                Ok(id) => {
                    self.mark_imported(id, &url).await;
                    info!(id = %id, url = %url, strategy = strategy.name(), "image imported");
                    return Ok(id);
                },
                Err(error) => {
                    #[cfg(feature = "metrics")]
                    counter!(
                        media_metrics::STRATEGY_FAILURES_TOTAL,
                        labels::STRATEGY => strategy.name()
                    )
                    .increment(1);

                    debug!(
                        url = %url,
                        strategy = strategy.name(),
                        error = %error,
                        "download strategy failed, trying next"
                    );
                    failures.push(StrategyFailure {
                        strategy: strategy.name(),
                        error,
                    });
                },
            }
        }

        Err(Error::AllStrategiesExhausted { failures })
    }

    /// The URL as given, then as each strategy in the chain would rewrite
    /// it. A marker written after any strategy succeeded matches one of these.
    fn url_forms(&self, url: &str) -> Vec<String> {
        let mut forms = vec![url.to_string()];
        let mut current = url.to_string();
        for strategy in &self.chain {
            current = strategy.prepare(&current);
            if !forms.contains(&current) {
                forms.push(current.clone());
            }
        }
        forms
    }

    /// Lookup failures count as a miss; the download chain still runs.
    async fn find_imported(&self, forms: &[String]) -> Option<MediaId> {
        for form in forms {
            match self.store.find_by_metadata(SOURCE_URL_KEY, form, 1).await {
                Ok(found) => {
                    if let Some(record) = found.into_iter().next() {
                        debug!(id = %record.id, url = %form, "image already imported");
                        return Some(record.id);
                    }
                },
                Err(e) => {
                    warn!(url = %form, error = %e, "dedup lookup failed");
                    return None;
                },
            }
        }
        None
    }

    async fn mark_imported(&self, id: MediaId, url: &str) {
        if let Err(e) = self.store.set_metadata(id, SOURCE_URL_KEY, url).await {
            warn!(id = %id, url, error = %e, "could not record source URL");
        }
    }

    async fn lock(&self, key: String) -> Option<KeyGuard> {
        match &self.locks {
            Some(locks) => Some(locks.lock(&key).await),
            None => None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{ErrorKind, store::MemoryMediaStore, temp::FsTempStore},
        async_trait::async_trait,
        std::sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    /// Strategy scripted to fail or to import a fixed file.
    struct Scripted {
        name: &'static str,
        succeed: bool,
        store: Arc<MemoryMediaStore>,
        seen: Arc<Mutex<Vec<String>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            succeed: bool,
            store: &Arc<MemoryMediaStore>,
            seen: &Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn DownloadStrategy> {
            Box::new(Self {
                name,
                succeed,
                store: Arc::clone(store),
                seen: Arc::clone(seen),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DownloadStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn prepare(&self, url: &str) -> String {
            if self.name == "decode" {
                url.replace("&amp;", "&")
            } else {
                url.to_string()
            }
        }

        async fn attempt(&self, url: &str, _post: Option<PostId>, _d: &str) -> Result<MediaId> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(format!("{}:{url}", self.name));
            if self.succeed {
                Ok(self.store.insert_file("scripted.png", b"png"))
            } else {
                Err(Error::blocked(403))
            }
        }
    }

    fn resolver(
        store: &Arc<MemoryMediaStore>,
        chain: Vec<Box<dyn DownloadStrategy>>,
    ) -> ImageResolver {
        let temp = Arc::new(FsTempStore::new(std::env::temp_dir()));
        ImageResolver::with_chain(Arc::clone(store) as Arc<dyn MediaStore>, temp, chain)
    }

    #[tokio::test]
    async fn later_strategies_see_the_rewritten_url_and_it_is_marked() {
        let store = Arc::new(MemoryMediaStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let resolver = resolver(&store, vec![
            Scripted::new("plain", false, &store, &seen),
            Scripted::new("decode", true, &store, &seen),
        ]);

        let image = ImageDescriptor::new("https://e.com/a.png?x=1&amp;y=2", "content");
        let id = resolver.resolve(&image, None).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![
            "plain:https://e.com/a.png?x=1&amp;y=2".to_string(),
            "decode:https://e.com/a.png?x=1&y=2".to_string(),
        ]);
        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.meta(SOURCE_URL_KEY), Some("https://e.com/a.png?x=1&y=2"));
        assert_eq!(image.url, "https://e.com/a.png?x=1&amp;y=2");

        // The raw form still hits the marker written for the decoded form.
        let again = resolver.resolve(&image, None).await.unwrap();
        assert_eq!(again, id);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn exhaustion_reports_every_failure_in_order() {
        let store = Arc::new(MemoryMediaStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let resolver = resolver(&store, vec![
            Scripted::new("one", false, &store, &seen),
            Scripted::new("two", false, &store, &seen),
        ]);

        let err = resolver
            .resolve(&ImageDescriptor::new("https://e.com/x.jpg", "feed"), None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "all image download attempts failed");
        let Error::AllStrategiesExhausted { failures } = err else {
            panic!("unexpected error kind");
        };
        let names: Vec<_> = failures.iter().map(|f| f.strategy).collect();
        assert_eq!(names, ["one", "two"]);
        assert!(failures.iter().all(|f| f.error.status() == Some(403)));
    }

    #[tokio::test]
    async fn empty_url_without_id_is_a_parse_error() {
        let store = Arc::new(MemoryMediaStore::new());
        let err = resolver(&store, vec![])
            .resolve(&ImageDescriptor::new("   ", "user"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[tokio::test]
    async fn malformed_data_uri_fails_fast() {
        let store = Arc::new(MemoryMediaStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let err = resolver(&store, vec![Scripted::new("never", true, &store, &seen)])
            .resolve(&ImageDescriptor::new("data:image/png,AAAA", "content"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sizes_resolve_independently() {
        let store = Arc::new(MemoryMediaStore::new());
        let existing = store.insert_file("existing.png", b"x");
        let resolver = resolver(&store, vec![]);

        let image = ImageDescriptor {
            id: Some(existing),
            ..ImageDescriptor::default()
        }
        .with_sizes(vec![
            ImageDescriptor {
                id: Some(existing),
                ..ImageDescriptor::default()
            },
            ImageDescriptor {
                id: Some(MediaId::new(404)),
                ..ImageDescriptor::default()
            },
        ]);

        let resolved = resolver.resolve_with_sizes(&image, None).await;
        assert_eq!(resolved.primary.unwrap(), existing);
        assert_eq!(resolved.sizes.len(), 2);
        assert_eq!(*resolved.sizes[0].as_ref().unwrap(), existing);
        assert_eq!(
            resolved.sizes[1].as_ref().unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn serialization_can_be_turned_off() {
        let store = Arc::new(MemoryMediaStore::new());
        let resolver = resolver(&store, vec![]).serialize_dedup_keys(false);
        assert!(resolver.locks.is_none());
        let resolver = resolver.serialize_dedup_keys(true);
        assert!(resolver.locks.is_some());
    }
}
