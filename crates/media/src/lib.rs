//! Image acquisition for imported feed items: resolve an image descriptor
//! (attachment id, remote URL, or inline data URI) to a deduplicated
//! media-library attachment.
//!
//! The host supplies a [`MediaStore`], [`HttpFetcher`], [`TempFileStore`] and
//! [`MimeSniffer`]; [`ImageResolver`] runs the dedup checks and the download
//! chain on top of them.

pub mod data_uri;
pub mod descriptor;
pub mod error;
pub mod http;
pub mod mime;
pub mod normalize;
pub mod ports;
pub mod resolver;
pub mod single_flight;
pub mod sniff;
pub mod store;
pub mod strategy;
pub mod temp;

pub use {
    aggregator_common::{MediaId, PostId},
    descriptor::{ImageDescriptor, ImageSource, Size, media_url},
    error::{Context, Error, ErrorKind, Result, StrategyFailure},
    http::ReqwestFetcher,
    ports::{
        HttpFetcher, HttpResponse, MediaRecord, MediaStore, MimeSniffer, NewAttachment,
        SOURCE_DATA_HASH_KEY, SOURCE_URL_KEY, TempFileStore,
    },
    resolver::{ImageResolver, ResolvedImage},
    sniff::ImageSniffer,
    store::{FsMediaStore, MemoryMediaStore},
    strategy::DownloadStrategy,
    temp::{FsTempStore, TempFile},
};
