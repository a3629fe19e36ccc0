//! HTTP client for the remote artifact store
//!
//! The store is an Artifactory-style repository: GET of base URL + file name
//! returns the artifact bytes or a 404, and a credentialed PUT publishes a
//! local file under that name. "Absent" and "broken" are kept distinct:
//! only a 404 means a table does not exist yet.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info};

use crate::config::Credentials;
use crate::error::{RemoteError, RemoteResult};

/// Result of asking the store for an artifact by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The artifact exists; its bytes are adopted verbatim.
    Found(Vec<u8>),
    /// The store explicitly reported the artifact as not found.
    Absent,
}

/// Client for one artifact store base URL.
#[derive(Debug)]
pub struct ArtifactStore {
    client: Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl ArtifactStore {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> RemoteResult<Self> {
        let mut base_url = Url::parse(base_url).map_err(|_| RemoteError::InvalidUrl {
            url: base_url.to_string(),
        })?;

        // Joining against a base without a trailing slash would replace the
        // last path segment instead of appending the artifact name.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    fn artifact_url(&self, name: &str) -> RemoteResult<Url> {
        self.base_url.join(name).map_err(|_| RemoteError::InvalidUrl {
            url: format!("{}{}", self.base_url, name),
        })
    }

    /// Fetch an artifact by name.
    ///
    /// 200 yields the bytes, 404 yields [`FetchOutcome::Absent`], and any
    /// other status is an error the caller must not confuse with absence.
    pub async fn fetch(&self, name: &str) -> RemoteResult<FetchOutcome> {
        let url = self.artifact_url(name)?;
        debug!(%url, "fetching artifact");

        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::OK => Ok(FetchOutcome::Found(response.bytes().await?.to_vec())),
            StatusCode::NOT_FOUND => Ok(FetchOutcome::Absent),
            status => Err(RemoteError::UnexpectedStatus {
                artifact: name.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// Publish a local file under the given artifact name.
    pub async fn publish(&self, name: &str, path: &Path) -> RemoteResult<()> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(RemoteError::CredentialsRequired)?;

        let body = tokio::fs::read(path)
            .await
            .map_err(|e| RemoteError::UnreadableArtifact {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let url = self.artifact_url(name)?;
        info!(artifact = %name, %url, "uploading artifact");

        let response = self
            .client
            .put(url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::UnexpectedStatus {
                artifact: name.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }

    /// Whether this client is able to publish.
    pub fn can_publish(&self) -> bool {
        self.credentials.is_some()
    }
}
