//! Result-asset retrieval.

use std::path::Path;

use reqwest::Client;
use sreel_providers::download_to_file;
use tokio::fs;

use crate::error::PipelineResult;

/// Fetch a provider result to a local destination.
///
/// Providers usually return an HTTP URL, but some return a path on shared
/// storage (and test doubles return temp files); local results are copied
/// into place instead of downloaded.
pub(crate) async fn fetch_asset(
    client: &Client,
    locator: &str,
    dest: impl AsRef<Path>,
) -> PipelineResult<()> {
    let dest = dest.as_ref();

    if locator.starts_with("http://") || locator.starts_with("https://") {
        download_to_file(client, locator, dest).await?;
        return Ok(());
    }

    let source = locator.strip_prefix("file://").unwrap_or(locator);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::copy(source, dest).await?;
    Ok(())
}
