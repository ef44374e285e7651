use crate::error::IconGenError;
use log::debug;
use std::time::Duration;

const LOOKUP_URL: &str = "https://www.google.com/s2/favicons";
const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

pub trait FaviconFetcher: Send {
    /// Raw image bytes of the favicon for `host`.
    fn fetch(&self, host: &str) -> Result<Vec<u8>, IconGenError>;
}

/// Favicon lookup through Google's public s2 service.
pub struct GoogleFavicons {
    client: Option<reqwest::blocking::Client>,
}

impl GoogleFavicons {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("desk_grid/", env!("CARGO_PKG_VERSION")))
            .build();
        match client {
            Ok(client) => Self {
                client: Some(client),
            },
            Err(err) => {
                debug!("http client init failed: {err}");
                Self { client: None }
            }
        }
    }
}

impl Default for GoogleFavicons {
    fn default() -> Self {
        Self::new()
    }
}

impl FaviconFetcher for GoogleFavicons {
    fn fetch(&self, host: &str) -> Result<Vec<u8>, IconGenError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| IconGenError::Fetch("no http client".into()))?;
        let response = client
            .get(LOOKUP_URL)
            .query(&[("sz", "256"), ("domain", host)])
            .send()
            .map_err(|e| IconGenError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IconGenError::Fetch(format!(
                "lookup returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|e| IconGenError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Host part of a website link; a missing scheme is treated as https.
pub fn host_of(link: &str) -> Option<String> {
    let url = crate::launch::normalize_url(link)?;
    let parsed = reqwest::Url::parse(&url).ok()?;
    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_extracted_from_loose_links() {
        assert_eq!(host_of("example.com").as_deref(), Some("example.com"));
        assert_eq!(
            host_of("https://Docs.Rust-Lang.org/std/index.html").as_deref(),
            Some("docs.rust-lang.org")
        );
        assert_eq!(host_of("http://localhost:8080/x").as_deref(), Some("localhost"));
        assert_eq!(host_of("   "), None);
    }
}
