//! Streaming download of provider result payloads.

use std::path::Path;

use futures::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Download a URL to a file.
///
/// Streams into a `.part` temp file in the destination directory, then
/// renames into place, so a crashed download never leaves a truncated
/// asset behind the final path.
pub async fn download_to_file(
    client: &Client,
    url: &str,
    dest: impl AsRef<Path>,
) -> ProviderResult<u64> {
    let dest = dest.as_ref();

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    debug!(url, dest = %dest.display(), "Downloading asset");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProviderError::DownloadFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::DownloadFailed(format!(
            "HTTP {status} for {url}"
        )));
    }

    let tmp = dest.with_extension("part");
    let mut file = fs::File::create(&tmp).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ProviderError::DownloadFailed(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    fs::rename(&tmp, dest).await?;

    info!(dest = %dest.display(), bytes = written, "Downloaded asset");
    Ok(written)
}
