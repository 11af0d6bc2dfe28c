//! HTTP retrieval of filter lists.

use flate2::read::GzDecoder;
use std::io::Read;
use std::time::Duration;

use crate::error::{Error, Result};

/// Result of a conditional GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server confirmed the cached copy (304)
    NotModified,
    /// New content, already decompressed
    Fetched { body: String, etag: Option<String> },
}

/// Downloads filter-list text.
///
/// Implemented by [`HttpFetcher`]; tests and hosts with their own network
/// stack provide other implementations.
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, sending `If-None-Match` when an ETag is known.
    fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchOutcome>;
}

/// Blocking HTTP fetcher built on `ureq`.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchOutcome> {
        let mut request = self.agent.get(url);
        if let Some(etag) = etag {
            request = request.set("If-None-Match", etag);
        }

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(304, _)) => return Ok(FetchOutcome::NotModified),
            Err(ureq::Error::Status(status, _)) => {
                return Err(Error::HttpStatus {
                    status,
                    url: url.to_string(),
                })
            }
            Err(ureq::Error::Transport(t)) => return Err(Error::Download(t.to_string())),
        };

        if response.status() == 304 {
            log::debug!("Filter list not modified (304): {}", url);
            return Ok(FetchOutcome::NotModified);
        }

        let etag = response.header("ETag").map(str::to_string);
        let mut raw = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut raw)
            .map_err(|e| Error::Download(format!("failed to read response: {}", e)))?;

        let body = decode_body(raw)?;
        log::info!("Downloaded filter list {}: {} bytes", url, body.len());
        Ok(FetchOutcome::Fetched { body, etag })
    }
}

/// Check if data is gzip compressed.
pub(crate) fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// Gunzip if needed, then decode as UTF-8 (lossily; list text is ASCII in practice).
pub(crate) fn decode_body(raw: Vec<u8>) -> Result<String> {
    let bytes = if is_gzip(&raw) {
        let mut decoder = GzDecoder::new(&raw[..]);
        let mut data = Vec::new();
        decoder
            .read_to_end(&mut data)
            .map_err(|e| Error::Download(format!("gzip decompression failed: {}", e)))?;
        data
    } else {
        raw
    };

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}
