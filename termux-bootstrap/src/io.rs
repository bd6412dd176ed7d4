// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! I/O helpers. */

use {
    crate::error::{BootstrapError, Result},
    md5::Digest,
    std::{
        io::{BufReader, Read},
        path::Path,
    },
};

/// Compression format of a member inside a `.deb` archive.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Compression {
    /// No compression (no extension).
    None,

    /// Gzip compression (.gz extension).
    Gzip,

    /// XZ compression (.xz extension).
    Xz,

    /// Zstandard compression (.zst extension).
    Zstd,
}

impl Compression {
    /// Resolve the compression format from a filename extension, including its leading `.`.
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension {
            "" => Ok(Self::None),
            ".gz" => Ok(Self::Gzip),
            ".xz" => Ok(Self::Xz),
            ".zst" => Ok(Self::Zstd),
            _ => Err(BootstrapError::UnknownCompression(extension.to_string())),
        }
    }

    /// Filename extension for files compressed in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Xz => ".xz",
            Self::Zstd => ".zst",
        }
    }
}

/// Wrap a reader with transparent decompression.
pub fn read_decompressed<'a>(
    stream: impl Read + 'a,
    compression: Compression,
) -> Result<Box<dyn Read + 'a>> {
    Ok(match compression {
        Compression::None => Box::new(stream),
        Compression::Gzip => Box::new(libflate::gzip::Decoder::new(stream)?),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(stream)),
        Compression::Zstd => Box::new(zstd::Decoder::new(stream)?),
    })
}

/// Drain content from a reader to a black hole.
pub fn drain_reader(mut reader: impl Read) -> std::io::Result<u64> {
    std::io::copy(&mut reader, &mut std::io::sink())
}

/// A [Read] adapter that validates source size and SHA-256 digest.
///
/// Validation only occurs once the expected number of bytes has been read. Readers
/// consuming less than that see no error, so consumers should drain this reader
/// with [drain_reader()].
pub struct ContentValidatingReader<R> {
    hasher: Option<sha2::Sha256>,
    expected_size: u64,
    expected_digest: Vec<u8>,
    source: R,
    bytes_read: u64,
}

impl<R> ContentValidatingReader<R> {
    /// Create a new instance bound to a source and having expected size and hex digest.
    pub fn new(source: R, expected_size: u64, expected_sha256_hex: &str) -> Result<Self> {
        let expected_digest = hex::decode(expected_sha256_hex).map_err(|e| {
            BootstrapError::ControlParse(format!(
                "invalid SHA256 digest '{}': {}",
                expected_sha256_hex, e
            ))
        })?;

        Ok(Self {
            hasher: Some(sha2::Sha256::new()),
            expected_size,
            expected_digest,
            source,
            bytes_read: 0,
        })
    }
}

impl<R: Read> Read for ContentValidatingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let size = self.source.read(buf)?;

        if size > 0 {
            if let Some(hasher) = self.hasher.as_mut() {
                hasher.update(&buf[0..size]);
            }

            self.bytes_read += size as u64;
        }

        match self.bytes_read.cmp(&self.expected_size) {
            std::cmp::Ordering::Equal => {
                if let Some(hasher) = self.hasher.take() {
                    let got_digest = hasher.finalize();

                    if got_digest.as_slice() != self.expected_digest.as_slice() {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            format!(
                                "digest mismatch of retrieved content: expected {}, got {}",
                                hex::encode(&self.expected_digest),
                                hex::encode(got_digest)
                            ),
                        ));
                    }
                }
            }
            std::cmp::Ordering::Greater => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!(
                        "extra bytes read: expected {}; got {}",
                        self.expected_size, self.bytes_read
                    ),
                ));
            }
            std::cmp::Ordering::Less => {
                if size == 0 && !buf.is_empty() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!(
                            "content truncated: expected {} bytes; got {}",
                            self.expected_size, self.bytes_read
                        ),
                    ));
                }
            }
        }

        Ok(size)
    }
}

/// Left-pad a hex rendered digest with `0` to 32 characters.
///
/// Renderings treating the digest as a number lose leading zero nibbles. md5sums
/// lines always carry the full 32 characters.
pub fn pad_md5_hex(hex: &str) -> String {
    format!("{:0>32}", hex)
}

/// Compute the MD5 of a file, as `md5sum(1)` prints it.
pub fn md5_file_hex(path: &Path) -> Result<String> {
    let fh = std::fs::File::open(path)
        .map_err(|e| BootstrapError::IoPath(format!("{}", path.display()), e))?;
    let mut reader = BufReader::new(fh);

    let mut context = md5::Md5::new();
    let mut buffer = [0; 32768];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }

        context.update(&buffer[0..read]);
    }

    Ok(pad_md5_hex(&hex::encode(context.finalize())))
}
