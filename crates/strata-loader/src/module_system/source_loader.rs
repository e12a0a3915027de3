// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Where module source text comes from.

use async_trait::async_trait;
use dashmap::DashMap;
use std::io;
use url::Url;

/// Reads the source text of a module URL
#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Read the full source text of the module at `url`
    async fn read(&self, url: &Url) -> io::Result<String>;
}

/// Loads `file:` URLs from the local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceLoader;

impl FsSourceLoader {
    /// Create a new file system loader
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceLoader for FsSourceLoader {
    async fn read(&self, url: &Url) -> io::Result<String> {
        if url.scheme() != "file" {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported module scheme '{}'", url.scheme()),
            ));
        }
        let path = url.to_file_path().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' is not a local file path", url),
            )
        })?;

        tracing::trace!("Reading module source {}", path.display());
        tokio::fs::read_to_string(&path).await
    }
}

/// In-memory module sources keyed by URL.
///
/// Counts reads per URL, which makes it useful for embedding generated
/// modules as well as for checking how often a module was fetched.
#[derive(Debug, Default)]
pub struct MemorySourceLoader {
    sources: DashMap<Url, String>,
    reads: DashMap<Url, usize>,
}

impl MemorySourceLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a module
    pub fn insert(&self, url: Url, source: impl Into<String>) {
        self.sources.insert(url, source.into());
    }

    /// Builder-style [`MemorySourceLoader::insert`]
    pub fn with_module(self, url: Url, source: impl Into<String>) -> Self {
        self.insert(url, source);
        self
    }

    /// Number of times `url` has been read, including failed reads
    pub fn read_count(&self, url: &Url) -> usize {
        self.reads.get(url).map(|count| *count).unwrap_or(0)
    }

    /// Total reads across all URLs
    pub fn total_reads(&self) -> usize {
        self.reads.iter().map(|entry| *entry.value()).sum()
    }
}

#[async_trait]
impl SourceLoader for MemorySourceLoader {
    async fn read(&self, url: &Url) -> io::Result<String> {
        *self.reads.entry(url.clone()).or_insert(0) += 1;

        self.sources
            .get(url)
            .map(|source| source.value().clone())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such module: {}", url),
                )
            })
    }
}
