//! CDN downloads.
//!
//! A file is stored under the asset root at its URL path, e.g.
//! `https://cdn.example/icons/1/abc.png` lands in `<root>/icons/1/abc.png`.
//! Bodies are streamed into a uniquely named `.part` file next to the target
//! and renamed once complete, so an interrupted download never leaves a
//! truncated file under the final name.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tokio::runtime::Runtime;

use crate::pull::{Asset, AssetFetcher, Fetched, SourceError, SourceResult};

use super::{runtime, transport};

/// Avatar formats tried in order; the CDN answers 415 for a format the
/// avatar does not exist in.
const AVATAR_FORMATS: [&str; 3] = ["gif", "png", "jpg"];

/// Status returned for an unavailable image format.
const UNSUPPORTED_MEDIA_TYPE: u16 = 415;

/// Candidate URLs for an asset, in the order they should be tried.
#[must_use]
pub fn asset_urls(cdn_base: &str, asset: &Asset) -> Vec<String> {
    let base = cdn_base.trim_end_matches('/');
    match asset {
        Asset::Icon { guild_id, hash } => vec![format!("{base}/icons/{guild_id}/{hash}.png")],
        Asset::Splash { guild_id, hash } => {
            vec![format!("{base}/splashes/{guild_id}/{hash}.png?size=2048")]
        }
        Asset::Avatar { user_id, hash } => AVATAR_FORMATS
            .iter()
            .map(|ext| format!("{base}/avatars/{user_id}/{hash}.{ext}"))
            .collect(),
        Asset::Emoji { id, animated } => {
            let ext = if *animated { "gif" } else { "png" };
            vec![format!("{base}/emojis/{id}.{ext}")]
        }
        Asset::Attachment { url } => vec![url.clone()],
    }
}

/// Where a URL is stored under `root`. The query is dropped, and so are
/// empty, `.` and `..` segments.
///
/// # Errors
///
/// Returns an error if `url` does not parse or has no path.
pub fn local_path(root: &Path, url: &str) -> SourceResult<PathBuf> {
    let parsed =
        Url::parse(url).map_err(|e| SourceError::Decode(format!("Invalid URL {url}: {e}")))?;

    let mut path = root.to_path_buf();
    let mut depth = 0;
    for segment in parsed.path_segments().into_iter().flatten() {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        path.push(segment);
        depth += 1;
    }

    if depth == 0 {
        return Err(SourceError::Decode(format!("URL has no path: {url}")));
    }
    Ok(path)
}

/// Blocking [`AssetFetcher`] that mirrors CDN files under a root directory.
pub struct HttpFetcher {
    runtime: Runtime,
    client: reqwest::Client,
    cdn_base: String,
    root: PathBuf,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns an error if the runtime cannot start.
    pub fn new(cdn_base: &str, root: &Path) -> SourceResult<Self> {
        Ok(Self {
            runtime: runtime()?,
            client: reqwest::Client::new(),
            cdn_base: cdn_base.to_string(),
            root: root.to_path_buf(),
        })
    }

    fn download(&self, url: &str) -> SourceResult<Fetched> {
        let target = local_path(&self.root, url)?;
        if target.exists() {
            return Ok(Fetched::AlreadyPresent);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let part = target.with_file_name(format!(
            "{file_name}.{}.part",
            uuid::Uuid::new_v4().simple()
        ));

        let result = self.runtime.block_on(self.stream_to(url, &part));
        match result {
            Ok(()) => {
                fs::rename(&part, &target)?;
                tracing::debug!(url, path = %target.display(), "stored");
                Ok(Fetched::Downloaded)
            }
            Err(e) => {
                let _ = fs::remove_file(&part);
                Err(e)
            }
        }
    }

    async fn stream_to(&self, url: &str, part: &Path) -> SourceResult<()> {
        let mut response = self.client.get(url).send().await.map_err(|e| transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Api {
                status: status.as_u16(),
                code: None,
                message: format!("{status} for {url}"),
            });
        }

        let mut file = File::create(part)?;
        while let Some(chunk) = response.chunk().await.map_err(|e| transport(&e))? {
            file.write_all(&chunk)?;
        }
        file.sync_all()?;
        Ok(())
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&mut self, asset: &Asset) -> SourceResult<Fetched> {
        let urls = asset_urls(&self.cdn_base, asset);
        let last = urls.len().saturating_sub(1);

        for (i, url) in urls.iter().enumerate() {
            match self.download(url) {
                Err(SourceError::Api { status, .. })
                    if status == UNSUPPORTED_MEDIA_TYPE && i < last =>
                {
                    tracing::trace!(url, "format unavailable, trying next");
                }
                other => return other,
            }
        }

        Err(SourceError::Decode(format!("No URL for {asset}")))
    }
}
