use std::io::Read;
use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::RANGE;
use reqwest::StatusCode;
use unisetup_core::UnisetupError;

const USER_AGENT: &str = concat!("unisetup/", env!("CARGO_PKG_VERSION"));

/// A response body positioned at `offset` bytes into the remote file.
pub struct RangeBody {
    pub reader: Box<dyn Read>,
    pub offset: u64,
}

/// Network seam used by the catalog, the manifest cache and the downloader.
pub trait Transport {
    fn fetch_text(&self, url: &str) -> Result<String>;

    /// Succeeds when `url` answers with a success status.
    fn probe(&self, url: &str) -> Result<()>;

    /// Opens `url` starting at byte `offset`. Servers that ignore the range
    /// answer from the start, reported as an offset of zero.
    fn open_range(&self, url: &str, offset: u64) -> Result<RangeBody>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = proxied_client_builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| anyhow::anyhow!("failed to build HTTP client: {err}"))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| UnisetupError::fetch(url, err))?;
        response
            .error_for_status()
            .map_err(|err| UnisetupError::fetch(url, err).into())
    }
}

impl Transport for HttpTransport {
    fn fetch_text(&self, url: &str) -> Result<String> {
        log::debug!("fetching {url}");
        self.get(url)?
            .text()
            .map_err(|err| UnisetupError::fetch(url, err).into())
    }

    fn probe(&self, url: &str) -> Result<()> {
        log::debug!("probing {url}");
        self.get(url).map(|_| ())
    }

    fn open_range(&self, url: &str, offset: u64) -> Result<RangeBody> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let response = request
            .send()
            .map_err(|err| UnisetupError::fetch(url, err))?
            .error_for_status()
            .map_err(|err| UnisetupError::fetch(url, err))?;

        let effective_offset = if response.status() == StatusCode::PARTIAL_CONTENT {
            offset
        } else {
            if offset > 0 {
                log::debug!("server ignored range request for {url}, restarting");
            }
            0
        };
        Ok(RangeBody {
            reader: Box::new(response),
            offset: effective_offset,
        })
    }
}

// Honours `http_proxy`/`https_proxy` style variables in any letter case.
fn proxied_client_builder() -> ClientBuilder {
    let mut builder = ClientBuilder::new();
    for (key, value) in std::env::vars() {
        let key = key.to_lowercase();
        let Some(schema) = key.strip_suffix("_proxy") else {
            continue;
        };
        let proxy = match schema {
            "http" => reqwest::Proxy::http(&value),
            "https" => reqwest::Proxy::https(&value),
            _ => continue,
        };
        match proxy {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(err) => log::warn!("ignoring invalid {key} value '{value}': {err}"),
        }
    }
    builder
}
