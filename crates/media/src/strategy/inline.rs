//! Import of inline `data:image/...;base64,...` images, deduplicated by the
//! SHA-256 of the decoded bytes.

use std::sync::Arc;

use {
    aggregator_common::{MediaId, PostId},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use aggregator_metrics::{counter, labels, media as media_metrics};

use crate::{
    data_uri::DataUri,
    error::{Error, Result},
    ports::{MediaStore, NewAttachment, SOURCE_DATA_HASH_KEY, SOURCE_URL_KEY, TempFileStore},
};

const TEMP_PREFIX: &str = "wprss-datauri";

pub struct Base64Import {
    store: Arc<dyn MediaStore>,
    temp: Arc<dyn TempFileStore>,
}

impl Base64Import {
    #[must_use]
    pub fn new(store: Arc<dyn MediaStore>, temp: Arc<dyn TempFileStore>) -> Self {
        Self { store, temp }
    }

    /// Import an already parsed URI. `raw` is the original text, stored as
    /// the source-URL marker.
    pub async fn import(
        &self,
        raw: &str,
        uri: &DataUri,
        post: Option<PostId>,
        description: &str,
    ) -> Result<MediaId> {
        let hash = uri.sha256_hex();
        if let Some(existing) = self
            .store
            .find_by_metadata(SOURCE_DATA_HASH_KEY, &hash, 1)
            .await?
            .into_iter()
            .next()
        {
            #[cfg(feature = "metrics")]
            counter!(media_metrics::DEDUP_HITS_TOTAL, labels::KEY => "hash").increment(1);
            debug!(id = %existing.id, hash = %hash, "inline image already imported");
            return Ok(existing.id);
        }

        let file = self.temp.create(TEMP_PREFIX, &uri.bytes).await?;
        let filename = format!("image-{}{}", uuid::Uuid::new_v4().simple(), uri.extension());

        let id = match self
            .store
            .create_from_local_file(NewAttachment {
                path: file.path(),
                filename: &filename,
                parent: post,
                description,
            })
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, mime = %uri.mime, "inline image rejected by media library");
                return Err(Error::upstream("failed to sideload base64 image"));
            },
        };
        drop(file);

        for (field, value) in [(SOURCE_DATA_HASH_KEY, hash.as_str()), (SOURCE_URL_KEY, raw)] {
            if let Err(e) = self.store.set_metadata(id, field, value).await {
                warn!(id = %id, field, error = %e, "could not record dedup marker");
            }
        }
        debug!(id = %id, hash = %hash, bytes = uri.bytes.len(), "inline image imported");
        Ok(id)
    }
}
