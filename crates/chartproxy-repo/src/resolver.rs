//! Chart identity resolution
//!
//! A chart request arrives either as a bare download URL or as a download URL
//! plus an index token of the form `<chart>--<repository>`:
//!
//! - **By URL**: every repository visible from the namespace is enumerated,
//!   its index fetched, and the first chart version listing the exact URL wins.
//! - **By index token**: chart and repository names come from the token and
//!   the version is read off the archive file name.

use std::sync::Arc;

use chartproxy_core::ChartInfo;

use crate::error::{RepoError, Result};
use crate::repository::RegisteredRepository;
use crate::store::{IndexSource, RepositoryStore};

/// Separator between chart name and repository name in an index token
pub const INDEX_ENTRY_SEPARATOR: &str = "--";

/// Maps chart requests to the repository, chart name, and version they refer to
#[derive(Clone)]
pub struct RepositoryResolver {
    repositories: Arc<dyn RepositoryStore>,
    indexes: Arc<dyn IndexSource>,
}

impl RepositoryResolver {
    /// Create a resolver over the given stores
    pub fn new(repositories: Arc<dyn RepositoryStore>, indexes: Arc<dyn IndexSource>) -> Self {
        Self {
            repositories,
            indexes,
        }
    }

    /// Resolve by index token when one is given, by URL otherwise
    pub async fn resolve(
        &self,
        url: &str,
        namespace: &str,
        index_entry: Option<&str>,
    ) -> Result<ChartInfo> {
        match index_entry.filter(|e| !e.is_empty()) {
            Some(entry) => resolve_index_entry(entry, namespace, url),
            None => self.resolve_by_url(url, namespace).await,
        }
    }

    /// Find the chart whose index entry lists `url` as a download URL
    ///
    /// Repositories are scanned namespace-scoped first, then cluster-scoped,
    /// each in listing order. A failed index fetch aborts the whole scan.
    pub async fn resolve_by_url(&self, url: &str, namespace: &str) -> Result<ChartInfo> {
        let repositories = self.visible_repositories(namespace).await?;

        for repository in repositories {
            let index = self
                .indexes
                .fetch_index(&repository)
                .await
                .map_err(|source| RepoError::IndexFetch {
                    repository: repository.name.clone(),
                    namespace: repository.namespace.clone(),
                    source,
                })?;

            if let Some((chart, entry)) = index.find_by_url(url) {
                tracing::debug!(
                    repository = %repository.name,
                    chart,
                    version = %entry.version,
                    "matched chart url"
                );
                return Ok(ChartInfo {
                    name: chart.to_string(),
                    version: entry.version.clone(),
                    repository_name: repository.name,
                    repository_namespace: repository.namespace,
                });
            }
        }

        Err(RepoError::ChartNotFoundInIndex {
            url: url.to_string(),
            namespace: namespace.to_string(),
        })
    }

    /// Enabled repositories visible from `namespace`, namespace-scoped first
    pub async fn visible_repositories(&self, namespace: &str) -> Result<Vec<RegisteredRepository>> {
        let list_error = |source| RepoError::RepositoryList {
            namespace: namespace.to_string(),
            source,
        };

        let project = self
            .repositories
            .list_project_repositories(namespace)
            .await
            .map_err(list_error)?;
        let cluster = self
            .repositories
            .list_cluster_repositories()
            .await
            .map_err(list_error)?;

        let visible: Vec<RegisteredRepository> = project
            .into_iter()
            .filter(|r| !r.spec.disabled)
            .map(RegisteredRepository::from)
            .chain(
                cluster
                    .into_iter()
                    .filter(|r| !r.spec.disabled)
                    .map(RegisteredRepository::from),
            )
            .collect();

        tracing::debug!(namespace, count = visible.len(), "listed chart repositories");
        Ok(visible)
    }
}

/// Build a [`ChartInfo`] from an index token and the chart's download URL
///
/// The repository namespace is the caller's namespace; connection config
/// resolution decides later whether the repository is really cluster-scoped.
pub fn resolve_index_entry(entry: &str, namespace: &str, url: &str) -> Result<ChartInfo> {
    let (chart, repository) = parse_index_entry(entry)?;

    let file_name = url.rsplit('/').next().unwrap_or(url);
    let version = find_chart_version(file_name).ok_or_else(|| RepoError::VersionNotDerivable {
        url: url.to_string(),
    })?;

    Ok(ChartInfo {
        name: chart.to_string(),
        version: version.to_string(),
        repository_name: repository.to_string(),
        repository_namespace: Some(namespace.to_string()),
    })
}

/// Split an index token into chart name and repository name
///
/// Only the first two `--` separated segments are used.
pub fn parse_index_entry(entry: &str) -> Result<(&str, &str)> {
    let mut parts = entry.split(INDEX_ENTRY_SEPARATOR);
    match (parts.next(), parts.next()) {
        (Some(chart), Some(repository)) if !chart.is_empty() && !repository.is_empty() => {
            Ok((chart, repository))
        }
        _ => Err(RepoError::InvalidIndexEntry {
            entry: entry.to_string(),
        }),
    }
}

/// Read the chart version out of an archive file name
///
/// The version starts at the first digit preceded by `-`. It ends two bytes
/// before the last position where two consecutive non-digits occur, which
/// strips the archive extension (`.tgz`) together with its leading dot.
///
/// This is the exact rule existing index tokens were produced against;
/// names whose version cannot be bounded that way yield `None`.
pub fn find_chart_version(file_name: &str) -> Option<&str> {
    let bytes = file_name.as_bytes();
    let start = (1..bytes.len()).find(|&i| bytes[i].is_ascii_digit() && bytes[i - 1] == b'-')?;

    let last_break = (start..bytes.len() - 1)
        .filter(|&j| !bytes[j].is_ascii_digit() && !bytes[j + 1].is_ascii_digit())
        .last()?;
    let end = last_break.checked_sub(2)?;

    if end <= start {
        return None;
    }
    file_name.get(start..end)
}
