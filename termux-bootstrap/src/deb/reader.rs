// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! .deb file reading functionality. */

use {
    crate::{
        error::{BootstrapError, Result},
        io::{read_decompressed, Compression},
    },
    std::io::Read,
};

/// A reader of .deb files.
///
/// A .deb binary package file is an ar archive with 3 entries:
///
/// 1. `debian-binary` holding the version of the binary package format.
/// 2. `control.tar` holding package metadata.
/// 3. `data.tar[.<ext>]` holding file content.
pub struct BinaryPackageReader<R: Read> {
    archive: ar::Archive<R>,
}

impl<R: Read> BinaryPackageReader<R> {
    /// Construct a new instance from a reader.
    pub fn new(reader: R) -> Self {
        Self {
            archive: ar::Archive::new(reader),
        }
    }

    /// Find the `data.tar` member and obtain a reader of its entries.
    ///
    /// Members before it are skipped. The member is decompressed as it is
    /// read, using the decompressor selected by its filename extension. The
    /// underlying reader is left inside the member, so callers wanting the
    /// rest of the stream should pass a mutable reference.
    pub fn data_tar<'a>(mut self, package: &str) -> Result<DataTarReader<'a>>
    where
        R: 'a,
    {
        let package_io = |member: &str, source: std::io::Error| BootstrapError::PackageIo {
            package: package.to_string(),
            path: member.to_string(),
            source,
        };

        let (member, compression, size) = loop {
            let entry = match self.archive.next_entry() {
                Some(entry) => entry.map_err(|e| package_io("ar archive", e))?,
                None => {
                    return Err(BootstrapError::MissingDataArchive {
                        package: package.to_string(),
                    })
                }
            };

            // We could do this in the domain of bytes. But filenames should be ASCII,
            // so converting to strings feels reasonably safe.
            let filename = String::from_utf8_lossy(entry.header().identifier()).to_string();

            if let Some(tail) = filename.strip_prefix("data.tar") {
                let compression = Compression::from_extension(tail)?;
                let size = entry.header().size();

                // Dropping the entry would consume the member.
                std::mem::forget(entry);

                break (filename, compression, size);
            }
        };

        let member_reader = self
            .archive
            .into_inner()
            .map_err(|e| package_io(&member, e))?
            .take(size);

        let decoder = read_decompressed(member_reader, compression).map_err(|e| match e {
            BootstrapError::Io(source) => package_io(&member, source),
            e => e,
        })?;

        Ok(DataTarReader {
            package: package.to_string(),
            member,
            archive: tar::Archive::new(decoder),
        })
    }
}

/// A filesystem object in a package payload.
pub enum ArchiveEntry<'a, 'r> {
    /// A regular file whose content can be read from `content`.
    RegularFile {
        path: String,
        mode: u32,
        size: u64,
        content: tar::Entry<'a, Box<dyn Read + 'r>>,
    },

    /// A directory.
    Directory { path: String },

    /// A symbolic link, with the link target as stored in the archive.
    Symlink { path: String, target: String },

    /// A hard link to another path in the archive.
    HardLink { path: String, target: String },
}

impl<'a, 'r> ArchiveEntry<'a, 'r> {
    /// The normalized path of this entry.
    pub fn path(&self) -> &str {
        match self {
            Self::RegularFile { path, .. } => path,
            Self::Directory { path } => path,
            Self::Symlink { path, .. } => path,
            Self::HardLink { path, .. } => path,
        }
    }
}

/// A reader for `data.tar` files.
///
/// Content is pulled from the package stream as entries are consumed.
pub struct DataTarReader<'r> {
    package: String,
    member: String,
    archive: tar::Archive<Box<dyn Read + 'r>>,
}

impl<'r> DataTarReader<'r> {
    /// The name of the package this payload belongs to.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The name of the ar member holding the payload.
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Obtain the entries in the `data.tar` file.
    ///
    /// This can only be called once. It is a glorified wrapper around
    /// [tar::Archive::entries()] and has the same semantics.
    pub fn entries(&mut self) -> Result<DataTarEntries<'_, 'r>> {
        let entries = self
            .archive
            .entries()
            .map_err(|e| BootstrapError::PackageIo {
                package: self.package.clone(),
                path: self.member.clone(),
                source: e,
            })?;

        Ok(DataTarEntries {
            package: &self.package,
            member: &self.member,
            entries,
        })
    }
}

/// Represents entries in a `data.tar` file.
///
/// Entries whose stored path ends in `/` are skipped.
pub struct DataTarEntries<'a, 'r> {
    package: &'a str,
    member: &'a str,
    entries: tar::Entries<'a, Box<dyn Read + 'r>>,
}

impl<'a, 'r> DataTarEntries<'a, 'r> {
    fn package_io(&self, path: &str, source: std::io::Error) -> BootstrapError {
        BootstrapError::PackageIo {
            package: self.package.to_string(),
            path: path.to_string(),
            source,
        }
    }

    fn convert(
        &self,
        entry: tar::Entry<'a, Box<dyn Read + 'r>>,
    ) -> Result<Option<ArchiveEntry<'a, 'r>>> {
        let path = match normalize_entry_path(&entry.path_bytes()) {
            Some(path) => path,
            None => return Ok(None),
        };

        if path.split('/').any(|component| component == "..") {
            return Err(BootstrapError::IllegalPath {
                package: self.package.to_string(),
                path,
            });
        }

        let link_target = entry
            .link_name_bytes()
            .map(|target| String::from_utf8_lossy(&target).to_string())
            .unwrap_or_default();

        let entry_type = entry.header().entry_type();

        Ok(Some(match entry_type {
            tar::EntryType::Regular | tar::EntryType::Continuous => ArchiveEntry::RegularFile {
                mode: entry
                    .header()
                    .mode()
                    .map_err(|e| self.package_io(&path, e))?,
                size: entry.size(),
                path,
                content: entry,
            },
            tar::EntryType::Directory => ArchiveEntry::Directory { path },
            tar::EntryType::Symlink => ArchiveEntry::Symlink {
                path,
                target: link_target,
            },
            tar::EntryType::Link => ArchiveEntry::HardLink {
                path,
                target: link_target,
            },
            tar::EntryType::XGlobalHeader => return Ok(None),
            other => {
                return Err(BootstrapError::UnsupportedEntry {
                    package: self.package.to_string(),
                    path,
                    kind: format!("{:?}", other),
                })
            }
        }))
    }
}

impl<'a, 'r> Iterator for DataTarEntries<'a, 'r> {
    type Item = Result<ArchiveEntry<'a, 'r>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(self.package_io(self.member, e))),
            };

            match self.convert(entry) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Normalize a path stored in a `data.tar` file.
///
/// Returns [None] for paths ending in `/`, which denote directories. A leading
/// `./` is replaced by `/` and relative paths are made absolute.
pub fn normalize_entry_path(raw: &[u8]) -> Option<String> {
    let path = String::from_utf8_lossy(raw);

    if path.ends_with('/') {
        return None;
    }

    let path = path.strip_prefix('.').filter(|p| p.starts_with('/')).unwrap_or(&path);

    match path {
        "" | "." => None,
        p if p.starts_with('/') => Some(p.to_string()),
        p => Some(format!("/{}", p)),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testutil::{DataTarBuilder, DebFixture},
        std::io::Cursor,
    };

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_entry_path(b"./"), None);
        assert_eq!(normalize_entry_path(b"./usr/bin/"), None);
        assert_eq!(normalize_entry_path(b"."), None);
        assert_eq!(
            normalize_entry_path(b"./usr/bin/bash"),
            Some("/usr/bin/bash".to_string())
        );
        assert_eq!(
            normalize_entry_path(b"usr/bin/bash"),
            Some("/usr/bin/bash".to_string())
        );
        assert_eq!(
            normalize_entry_path(b".profile"),
            Some("/.profile".to_string())
        );
    }

    #[test]
    fn read_entries() -> Result<()> {
        let mut data = DataTarBuilder::default();
        data.directory("./usr/")?;
        data.file("./usr/bin/bash", 0o755, b"#!bash")?;
        data.symlink("./usr/bin/sh", "bash")?;
        data.hard_link("./usr/bin/rbash", "./usr/bin/bash")?;

        let deb = DebFixture::new(data).xz().build()?;
        let reader = BinaryPackageReader::new(Cursor::new(deb));
        let mut data_tar = reader.data_tar("bash")?;
        assert_eq!(data_tar.package(), "bash");

        let mut seen = vec![];

        for entry in data_tar.entries()? {
            match entry? {
                ArchiveEntry::RegularFile {
                    path,
                    mode,
                    size,
                    mut content,
                } => {
                    let mut buf = vec![];
                    content.read_to_end(&mut buf)?;

                    assert_eq!(mode & 0o777, 0o755);
                    assert_eq!(size, 6);
                    assert_eq!(buf, b"#!bash");
                    seen.push(format!("file {}", path));
                }
                ArchiveEntry::Directory { path } => seen.push(format!("dir {}", path)),
                ArchiveEntry::Symlink { path, target } => {
                    seen.push(format!("symlink {} {}", path, target))
                }
                ArchiveEntry::HardLink { path, target } => {
                    seen.push(format!("hardlink {} {}", path, target))
                }
            }
        }

        assert_eq!(
            seen,
            vec![
                "file /usr/bin/bash",
                "symlink /usr/bin/sh bash",
                "hardlink /usr/bin/rbash ./usr/bin/bash",
            ]
        );

        Ok(())
    }

    #[test]
    fn compressions() -> Result<()> {
        for fixture in [
            DebFixture::new(DataTarBuilder::default()),
            DebFixture::new(DataTarBuilder::default()).gzip(),
            DebFixture::new(DataTarBuilder::default()).zstd(),
        ] {
            let deb = fixture.build()?;
            let reader = BinaryPackageReader::new(Cursor::new(deb));
            assert_eq!(reader.data_tar("empty")?.entries()?.count(), 0);
        }

        Ok(())
    }

    #[test]
    fn missing_data_member() -> Result<()> {
        let deb = DebFixture::new(DataTarBuilder::default())
            .without_data()
            .build()?;
        let reader = BinaryPackageReader::new(Cursor::new(deb));

        assert!(matches!(
            reader.data_tar("broken"),
            Err(BootstrapError::MissingDataArchive { package }) if package == "broken"
        ));

        Ok(())
    }

    #[test]
    fn corrupt_payload_names_package() -> Result<()> {
        let mut builder = ar::Builder::new(vec![]);
        let data: &[u8] = b"not gzip";
        builder.append(
            &ar::Header::new(b"data.tar.gz".to_vec(), data.len() as _),
            data,
        )?;
        let deb = builder.into_inner()?;

        let res = BinaryPackageReader::new(Cursor::new(deb)).data_tar("bash");
        assert!(matches!(
            res,
            Err(BootstrapError::PackageIo { package, path, .. })
                if package == "bash" && path == "data.tar.gz"
        ));

        Ok(())
    }

    #[test]
    fn parent_components_rejected() -> Result<()> {
        let mut data = DataTarBuilder::default();
        data.file("./usr/../../etc/passwd", 0o644, b"root")?;

        let deb = DebFixture::new(data).build()?;
        let reader = BinaryPackageReader::new(Cursor::new(deb));
        let mut data_tar = reader.data_tar("evil")?;
        let mut entries = data_tar.entries()?;

        assert!(matches!(
            entries.next(),
            Some(Err(BootstrapError::IllegalPath { package, path }))
                if package == "evil" && path == "/usr/../../etc/passwd"
        ));

        Ok(())
    }
}
