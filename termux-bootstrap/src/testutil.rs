// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Fixtures for building packages and repositories in tests. */

use {
    crate::{
        config::Architecture, error::Result, io::Compression,
        repository::filesystem::FilesystemRepositoryReader,
    },
    sha2::Digest,
    std::{collections::HashMap, io::Write, path::Path},
    strum::IntoEnumIterator,
    tempfile::TempDir,
};

fn new_tar_header(entry_type: tar::EntryType, mode: u32, size: u64) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_size(size);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);

    header
}

// `header.set_path()` normalizes away `./` and rejects `..`. Packages in the
// wild carry `./` prefixes, so write the raw field.
fn set_raw(buffer: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    assert!(bytes.len() < buffer.len(), "{} too long for tar header", value);

    buffer[0..bytes.len()].copy_from_slice(bytes);
}

/// Builds the `data.tar` member of a `.deb`.
pub struct DataTarBuilder {
    builder: tar::Builder<Vec<u8>>,
}

impl Default for DataTarBuilder {
    fn default() -> Self {
        Self {
            builder: tar::Builder::new(vec![]),
        }
    }
}

impl DataTarBuilder {
    fn append(
        &mut self,
        entry_type: tar::EntryType,
        path: &str,
        link_name: Option<&str>,
        mode: u32,
        data: &[u8],
    ) -> Result<()> {
        let mut header = new_tar_header(entry_type, mode, data.len() as _);
        set_raw(&mut header.as_old_mut().name, path);
        if let Some(link_name) = link_name {
            set_raw(&mut header.as_old_mut().linkname, link_name);
        }
        header.set_cksum();

        self.builder.append(&header, data)?;

        Ok(())
    }

    pub fn directory(&mut self, path: &str) -> Result<()> {
        self.append(tar::EntryType::Directory, path, None, 0o755, &[])
    }

    pub fn file(&mut self, path: &str, mode: u32, data: &[u8]) -> Result<()> {
        self.append(tar::EntryType::Regular, path, None, mode, data)
    }

    pub fn symlink(&mut self, path: &str, target: &str) -> Result<()> {
        self.append(tar::EntryType::Symlink, path, Some(target), 0o777, &[])
    }

    pub fn hard_link(&mut self, path: &str, target: &str) -> Result<()> {
        self.append(tar::EntryType::Link, path, Some(target), 0o644, &[])
    }

    pub fn fifo(&mut self, path: &str) -> Result<()> {
        self.append(tar::EntryType::Fifo, path, None, 0o644, &[])
    }

    pub fn into_tar(self) -> Result<Vec<u8>> {
        Ok(self.builder.into_inner()?)
    }
}

fn compress(data: Vec<u8>, compression: Compression) -> Result<Vec<u8>> {
    Ok(match compression {
        Compression::None => data,
        Compression::Gzip => {
            let mut encoder = libflate::gzip::Encoder::new(vec![])?;
            encoder.write_all(&data)?;
            encoder.finish().into_result()?
        }
        Compression::Xz => {
            let mut encoder = xz2::write::XzEncoder::new(vec![], 6);
            encoder.write_all(&data)?;
            encoder.finish()?
        }
        Compression::Zstd => zstd::encode_all(std::io::Cursor::new(data), 3)?,
    })
}

/// Builds a `.deb` file.
pub struct DebFixture {
    data: DataTarBuilder,
    compression: Compression,
    include_data: bool,
}

impl DebFixture {
    pub fn new(data: DataTarBuilder) -> Self {
        Self {
            data,
            compression: Compression::None,
            include_data: true,
        }
    }

    pub fn gzip(mut self) -> Self {
        self.compression = Compression::Gzip;
        self
    }

    pub fn xz(mut self) -> Self {
        self.compression = Compression::Xz;
        self
    }

    pub fn zstd(mut self) -> Self {
        self.compression = Compression::Zstd;
        self
    }

    pub fn without_data(mut self) -> Self {
        self.include_data = false;
        self
    }

    pub fn build(self) -> Result<Vec<u8>> {
        let mut ar_builder = ar::Builder::new(vec![]);

        let data: &[u8] = b"2.0\n";
        let header = ar::Header::new(b"debian-binary".to_vec(), data.len() as _);
        ar_builder.append(&header, data)?;

        let mut control = DataTarBuilder::default();
        control.file("./control", 0o644, b"Package: fixture\n")?;
        let control_tar = compress(control.into_tar()?, Compression::Gzip)?;
        let header = ar::Header::new(b"control.tar.gz".to_vec(), control_tar.len() as _);
        ar_builder.append(&header, &*control_tar)?;

        if self.include_data {
            let data_tar = compress(self.data.into_tar()?, self.compression)?;
            let header = ar::Header::new(
                format!("data.tar{}", self.compression.extension()).into_bytes(),
                data_tar.len() as _,
            );
            ar_builder.append(&header, &*data_tar)?;
        }

        Ok(ar_builder.into_inner()?)
    }
}

/// A repository on the local filesystem.
///
/// Every architecture starts with an empty `Packages.xz` index.
pub struct RepositoryFixture {
    root: TempDir,
    indices: HashMap<Architecture, String>,
}

impl RepositoryFixture {
    pub fn new() -> Result<Self> {
        let fixture = Self {
            root: tempfile::tempdir()?,
            indices: HashMap::new(),
        };

        for arch in Architecture::iter() {
            fixture.write_index(arch)?;
        }

        Ok(fixture)
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn reader(&self) -> FilesystemRepositoryReader {
        FilesystemRepositoryReader::new(self.root.path())
    }

    fn write_index(&self, arch: Architecture) -> Result<()> {
        let dir = self
            .root
            .path()
            .join(format!("dists/stable/main/binary-{}", arch));
        std::fs::create_dir_all(&dir)?;

        let content = self.indices.get(&arch).cloned().unwrap_or_default();
        std::fs::write(
            dir.join("Packages.xz"),
            compress(content.into_bytes(), Compression::Xz)?,
        )?;

        Ok(())
    }

    /// Publish a `.deb` and add its index paragraph.
    ///
    /// `control` holds the paragraph fields other than the transport fields, each
    /// line terminated by a newline.
    pub fn add_package(
        &mut self,
        arch: Architecture,
        name: &str,
        control: &str,
        deb: &[u8],
    ) -> Result<()> {
        let filename = format!("dists/stable/main/binary-{}/{}.deb", arch, name);
        std::fs::write(self.root.path().join(&filename), deb)?;

        let paragraph = format!(
            "{}Filename: {}\nSize: {}\nSHA256: {}\n\n",
            control,
            filename,
            deb.len(),
            hex::encode(sha2::Sha256::digest(deb))
        );
        self.indices.entry(arch).or_default().push_str(&paragraph);

        self.write_index(arch)
    }
}
