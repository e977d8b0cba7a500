mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::table::RawTable;

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Loads a source from HTTP(S) when it looks like a URL, otherwise from the
/// local filesystem.
#[tracing::instrument(skip(client))]
pub async fn fetch_source<C: HttpClient>(client: &C, source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        fetch_bytes(client, source).await?
    } else {
        std::fs::read(source).with_context(|| format!("failed to read '{source}'"))?
    };
    debug!(bytes = bytes.len(), "Source bytes received");
    Ok(bytes)
}

/// Fetches a source and decodes it as a headed CSV table.
pub async fn fetch_table<C: HttpClient>(client: &C, source: &str) -> Result<RawTable> {
    let bytes = fetch_source(client, source).await?;
    let table = RawTable::from_csv(&bytes).with_context(|| format!("'{source}' is not a CSV table"))?;
    info!(
        source,
        columns = table.headers().len(),
        rows = table.rows().len(),
        "Table loaded"
    );
    Ok(table)
}
