//! Turning a search result into a URL a download client can fetch.

use tracing::{debug, info, warn};
use url::Url;

use crate::indexer::{IndexerClient, SearchResult};

use super::types::DownloadError;

/// Info-page hosts whose guid links carry the release id in a `guid` query
/// parameter, mapped to their direct API download endpoint.
const INFO_PAGE_HOSTS: &[(&str, &str)] = &[("nzbgeek.info", "https://nzbgeek.info/api")];

pub(crate) fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn is_localhost(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.host_str() == Some("localhost"))
        .unwrap_or(false)
}

/// Point a localhost proxy link at the configured indexer host.
fn rewrite_localhost(raw: &str, host: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    if url.host_str() != Some("localhost") {
        return None;
    }
    url.set_host(Some(host)).ok()?;
    Some(url.to_string())
}

/// API download URL for a known info-page guid link.
fn info_page_download_url(guid: &str) -> Option<String> {
    let url = Url::parse(guid).ok()?;
    let host = url.host_str()?;
    let (_, api) = INFO_PAGE_HOSTS
        .iter()
        .find(|(known, _)| host.contains(known))?;
    let (_, id) = url.query_pairs().find(|(key, _)| key == "guid")?;

    let mut api = Url::parse(api).ok()?;
    api.query_pairs_mut()
        .append_pair("t", "get")
        .append_pair("id", &id);
    Some(api.to_string())
}

/// Work out the URL to hand to the download client.
///
/// Order: a direct non-localhost URL as is; a localhost proxy link rewritten to
/// `indexer_host`; an info-page guid converted to its API link; any other http
/// guid as is; finally the indexer's own redirect resolution.
pub async fn resolve_download_url(
    result: &SearchResult,
    indexer: &dyn IndexerClient,
    indexer_host: Option<&str>,
) -> Result<String, DownloadError> {
    let mut url = result.download_url.clone();

    if is_localhost(&url) {
        if let Some(rewritten) = indexer_host.and_then(|host| rewrite_localhost(&url, host)) {
            info!(from = %url, to = %rewritten, "Rewrote localhost download URL");
            url = rewritten;
        }
    }

    if is_http(&url) && !is_localhost(&url) {
        return Ok(url);
    }

    if is_http(&result.guid) {
        if let Some(api_url) = info_page_download_url(&result.guid) {
            debug!(guid = %result.guid, url = %api_url, "Using info-page API download URL");
            return Ok(api_url);
        }
        return Ok(result.guid.clone());
    }

    match indexer
        .resolve_download_url(result.indexer_id, &result.guid)
        .await
    {
        Ok(resolved) => {
            debug!(guid = %result.guid, url = %resolved, "Indexer resolved download URL");
            Ok(resolved)
        }
        Err(e) => {
            warn!(guid = %result.guid, error = %e, "Indexer could not resolve download URL");
            Err(DownloadError::UrlResolution(format!(
                "Cannot determine download URL. download_url={}, guid={}, error={}",
                result.download_url, result.guid, e
            )))
        }
    }
}
