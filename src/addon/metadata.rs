use std::io::Write;

use reqwest::StatusCode;
use reqwest::blocking::Client;

use crate::{
    error::{Result, SyncError},
    types::addon::AddonMetadata,
    utils::api::{get_metadata_base_url, user_agent},
};

/// Where addon metadata and release archives come from.
pub trait AddonSource {
    /// Fetches and decodes the metadata document of one addon.
    fn fetch_metadata(&self, addon: &str) -> Result<AddonMetadata>;

    /// Streams the archive at `url` into `out`, returning the byte count.
    fn download(&self, url: &str, out: &mut dyn Write) -> Result<u64>;
}

/// Blocking HTTP client for the cfwidget metadata service.
pub struct MetadataClient {
    client: Client,
    base_url: String,
}

impl MetadataClient {
    pub fn new(base_url: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder().user_agent(user_agent()).build()?;
        Ok(MetadataClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Client for the configured metadata host (`WOWSYNC_METADATA_URL`).
    pub fn from_env() -> reqwest::Result<Self> {
        Self::new(get_metadata_base_url())
    }

    pub fn metadata_url(&self, addon: &str) -> String {
        format!("{}/wow/addons/{}", self.base_url, addon)
    }
}

impl AddonSource for MetadataClient {
    fn fetch_metadata(&self, addon: &str) -> Result<AddonMetadata> {
        let response = self
            .client
            .get(self.metadata_url(addon))
            .send()
            .map_err(|e| SyncError::MetadataTransport {
                addon: addon.to_string(),
                source: e,
            })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::ACCEPTED => {
                return Err(SyncError::MetadataQueued {
                    addon: addon.to_string(),
                });
            }
            other => {
                return Err(SyncError::MetadataStatus {
                    addon: addon.to_string(),
                    status: other.as_u16(),
                });
            }
        }

        let body = response.text().map_err(|e| SyncError::MetadataTransport {
            addon: addon.to_string(),
            source: e,
        })?;

        Ok(AddonMetadata::decode(&body))
    }

    fn download(&self, url: &str, out: &mut dyn Write) -> Result<u64> {
        let mut response =
            self.client
                .get(url)
                .send()
                .map_err(|e| SyncError::DownloadTransport {
                    url: url.to_string(),
                    source: e,
                })?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().ok();
            return Err(SyncError::DownloadStatus {
                url: url.to_string(),
                status,
                body,
            });
        }

        response
            .copy_to(out)
            .map_err(|e| SyncError::DownloadTransport {
                url: url.to_string(),
                source: e,
            })
    }
}
