// src/index/pypi.rs

//! PyPI JSON API client
//!
//! Fetches `{index_url}/{name}/json` with retry support and keeps every
//! answer for the lifetime of the client.

use super::{DistributionFile, PackageIndex, PackageReleases, Release};
use crate::error::{Error, Result};
use crate::requirement::canonicalize_name;
use crate::version::Version;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default index base URL
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts per package
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    info: ProjectInfo,
    #[serde(default)]
    releases: HashMap<String, Vec<FileEntry>>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    requires_python: Option<String>,
}

/// Blocking client for the PyPI JSON API
pub struct PypiIndex {
    client: Client,
    base_url: String,
    max_retries: u32,
    cache: Mutex<HashMap<String, Arc<PackageReleases>>>,
}

impl PypiIndex {
    /// Create a client for the given base URL (e.g. `https://pypi.org/pypi`)
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("pessimist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::IndexError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: MAX_RETRIES,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn project_url(&self, name: &str) -> String {
        format!("{}/{}/json", self.base_url, name)
    }

    fn download(&self, name: &str) -> Result<ProjectResponse> {
        let url = self.project_url(name);
        debug!("Fetching {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.client.get(&url).send() {
                Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                    return Err(Error::PackageNotFound(name.to_string()));
                }
                Ok(response) if response.status().is_success() => {
                    return response.json::<ProjectResponse>().map_err(|e| {
                        Error::IndexError(format!("Failed to parse index JSON for {name}: {e}"))
                    });
                }
                Ok(response) => format!("HTTP {} from {}", response.status(), url),
                Err(e) => e.to_string(),
            };

            if attempt >= self.max_retries {
                return Err(Error::IndexError(format!(
                    "Failed to fetch {url} after {attempt} attempts: {failure}"
                )));
            }

            warn!(
                "Fetch of {} failed (attempt {}/{}): {}. Retrying...",
                url, attempt, self.max_retries, failure
            );
            thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
        }
    }
}

impl PackageIndex for PypiIndex {
    fn fetch(&self, name: &str) -> Result<Arc<PackageReleases>> {
        let key = canonicalize_name(name);

        if let Some(hit) = self
            .cache
            .lock()
            .map_err(|_| Error::IndexError("index cache poisoned".to_string()))?
            .get(&key)
        {
            return Ok(Arc::clone(hit));
        }

        let response = self.download(&key)?;
        let releases = Arc::new(convert(response));
        info!(
            "Fetched {} releases of {} from index",
            releases.releases.len(),
            releases.name
        );

        self.cache
            .lock()
            .map_err(|_| Error::IndexError("index cache poisoned".to_string()))?
            .insert(key, Arc::clone(&releases));

        Ok(releases)
    }
}

fn convert(response: ProjectResponse) -> PackageReleases {
    let mut releases = BTreeMap::new();

    for (raw, entries) in response.releases {
        let Ok(version) = Version::parse(&raw) else {
            debug!("Skipping unparseable release '{}' of {}", raw, response.info.name);
            continue;
        };

        let files = entries
            .into_iter()
            .map(|entry| DistributionFile {
                filename: entry.filename,
                requires_python: entry.requires_python,
            })
            .collect();
        releases.insert(version, Release { files });
    }

    PackageReleases {
        name: response.info.name,
        releases,
    }
}
