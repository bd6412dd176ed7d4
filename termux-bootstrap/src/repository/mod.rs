// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian repository primitives.

Termux repositories follow the Debian repository layout: package indices live
at `dists/<distribution>/<component>/binary-<arch>/Packages.xz` and each index
paragraph points at its `.deb` through the `Filename` field, relative to the
repository root. See <https://wiki.debian.org/DebianRepository/Format>.
*/

use {
    crate::{
        binary_package_control::BinaryPackageControlFile,
        config::{Architecture, BootstrapConfig},
        control::ControlParagraphReader,
        error::{BootstrapError, Result},
        io::{read_decompressed, Compression, ContentValidatingReader},
    },
    log::info,
    std::{
        collections::HashMap,
        io::{BufReader, Read},
    },
    url::Url,
};

pub mod filesystem;
#[cfg(feature = "http")]
pub mod http;

/// Generic mechanism for obtaining content at a path relative to a repository root.
///
/// Implementations only need to implement `get_path()` and `url()`.
pub trait DataResolver {
    /// Obtain the URL to which this resolver is bound.
    fn url(&self) -> Result<Url>;

    /// Get the raw content of a relative path as a reader.
    fn get_path(&self, path: &str) -> Result<Box<dyn Read>>;

    /// Obtain a reader that verifies the content size and SHA-256 digest.
    ///
    /// The digest is only compared once all content is read, so the stream must be
    /// read to completion for verification to happen.
    fn get_path_with_digest_verification(
        &self,
        path: &str,
        expected_size: u64,
        expected_sha256_hex: &str,
    ) -> Result<Box<dyn Read>> {
        Ok(Box::new(ContentValidatingReader::new(
            self.get_path(path)?,
            expected_size,
            expected_sha256_hex,
        )?))
    }

    /// Get the content of a relative path with decompression transparently applied.
    fn get_path_decoded(&self, path: &str, compression: Compression) -> Result<Box<dyn Read>> {
        read_decompressed(BufReader::new(self.get_path(path)?), compression)
    }
}

/// The binary packages advertised by a repository, keyed by package name.
#[derive(Clone, Debug, Default)]
pub struct PackageIndex {
    packages: HashMap<String, BinaryPackageControlFile<'static>>,
}

impl PackageIndex {
    /// Parse a `Packages` index from a reader.
    ///
    /// Every paragraph must have a `Package` field. A later paragraph for the same
    /// package name replaces an earlier one.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut index = Self::default();

        for paragraph in ControlParagraphReader::new(BufReader::new(reader)) {
            index.insert(BinaryPackageControlFile::from(paragraph?))?;
        }

        Ok(index)
    }

    /// Register a package, returning the entry it replaced, if any.
    pub fn insert(
        &mut self,
        package: BinaryPackageControlFile<'static>,
    ) -> Result<Option<BinaryPackageControlFile<'static>>> {
        let name = package.package()?.to_string();

        Ok(self.packages.insert(name, package))
    }

    /// Merge another index into this one.
    ///
    /// Entries from `other` win over existing entries of the same name.
    pub fn merge(&mut self, other: PackageIndex) {
        self.packages.extend(other.packages);
    }

    /// Obtain the entry for a package name.
    pub fn get(&self, name: &str) -> Option<&BinaryPackageControlFile<'static>> {
        self.packages.get(name)
    }

    /// Obtain the entry for a package name, failing if it is not advertised.
    ///
    /// The error lists every known package name to make typos and upstream renames
    /// easy to spot.
    pub fn require(&self, name: &str) -> Result<&BinaryPackageControlFile<'static>> {
        self.get(name)
            .ok_or_else(|| BootstrapError::MissingPackage {
                package: name.to_string(),
                available: self.package_names(),
            })
    }

    /// Sorted names of all packages in this index.
    pub fn package_names(&self) -> Vec<String> {
        let mut names = self.packages.keys().cloned().collect::<Vec<_>>();
        names.sort();

        names
    }

    /// Number of packages in this index.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether this index has no packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Debian repository reader bound to the root of the repository.
pub trait RepositoryRootReader: DataResolver {
    /// Fetch and parse the `Packages` index at a relative path.
    ///
    /// Compression is inferred from the filename extension.
    fn fetch_packages_index(&self, path: &str) -> Result<PackageIndex> {
        let compression = [Compression::Xz, Compression::Gzip, Compression::Zstd]
            .into_iter()
            .find(|c| path.ends_with(c.extension()))
            .unwrap_or(Compression::None);

        info!("downloading {}", self.url()?.join(path)?);

        PackageIndex::from_reader(self.get_path_decoded(path, compression)?)
    }

    /// Fetch the packages available to a bootstrap for a device architecture.
    ///
    /// This is the architecture's own index merged with the architecture independent
    /// (`all`) index. Some bootstrap packages, like `termux-tools`, are only published
    /// in the latter.
    fn fetch_bootstrap_index(
        &self,
        config: &BootstrapConfig,
        arch: Architecture,
    ) -> Result<PackageIndex> {
        let mut index = self.fetch_packages_index(&config.packages_index_path(arch))?;

        if arch != Architecture::All {
            index.merge(
                self.fetch_packages_index(&config.packages_index_path(Architecture::All))?,
            );
        }

        Ok(index)
    }

    /// Open the `.deb` file described by an index entry.
    ///
    /// If the entry advertises `Size` and `SHA256`, the returned reader verifies
    /// them once it has been read to completion.
    fn fetch_binary_package(
        &self,
        package: &BinaryPackageControlFile<'_>,
    ) -> Result<Box<dyn Read>> {
        let name = package.package()?;
        let filename = package
            .filename()
            .ok_or_else(|| BootstrapError::MissingField {
                package: name.to_string(),
                field: "Filename",
            })?;

        info!("downloading {}", self.url()?.join(filename)?);

        match (package.size(), package.sha256()) {
            (Some(size), Some(digest)) => {
                self.get_path_with_digest_verification(filename, size?, digest)
            }
            _ => self.get_path(filename),
        }
    }
}

/// Obtain a repository reader from a string.
///
/// Values containing `://` are parsed as URLs: `file://` URLs resolve to a local
/// mirror and `http://`/`https://` URLs to a remote repository. Other values are
/// interpreted as local filesystem paths.
pub fn reader_from_str(s: &str) -> Result<Box<dyn RepositoryRootReader>> {
    if s.contains("://") {
        let url = Url::parse(s)?;

        match url.scheme() {
            "file" => Ok(Box::new(filesystem::FilesystemRepositoryReader::new(
                url.to_file_path().map_err(|_| BootstrapError::Transport {
                    url: s.to_string(),
                    message: "file URL does not map to a local path".to_string(),
                })?,
            ))),
            #[cfg(feature = "http")]
            "http" | "https" => Ok(Box::new(http::HttpRepositoryClient::new(url)?)),
            scheme => Err(BootstrapError::Transport {
                url: s.to_string(),
                message: format!("unsupported URL scheme: {}", scheme),
            }),
        }
    } else {
        Ok(Box::new(filesystem::FilesystemRepositoryReader::new(s)))
    }
}
