// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Termux bootstrap assembly.

This crate builds the bootstrap archives of the Termux Android app. A bootstrap
is a zip file holding a minimal installation prefix (a shell, apt and dpkg) that
the app extracts on first launch. It is assembled from the binary packages of a
Termux package repository, so that the resulting installation looks to dpkg and
apt as if those packages were installed normally.

# A Tour of Functionality

The [repository] module reads Debian style repositories. The
[repository::RepositoryRootReader] trait fetches `Packages` indices into a
[repository::PackageIndex] and opens `.deb` files, verifying their size and
SHA-256 digest. [repository::http::HttpRepositoryClient] reads a repository
over HTTP and [repository::filesystem::FilesystemRepositoryReader] reads a local
mirror.

Index paragraphs are [binary_package_control::BinaryPackageControlFile], built on
the generic control file primitives in [control].

[deb::reader::BinaryPackageReader] streams the `data.tar` payload of a `.deb` as
[deb::reader::ArchiveEntry] values. [materialize::BuildContext] writes those
entries into the build tree, recording installed paths in a
[ledger::ContentLedger]. Symlinks are not created on disk. They are resolved
relative to the installation prefix by the [symlink] module and written to the
`SYMLINKS.txt` manifest, which the app replays on device.

Once all packages are extracted, [dpkg] synthesizes the dpkg database and
[publish] zips the prefix and optionally publishes the archive.
[pipeline::BootstrapBuilder] ties these steps together, configured by a
[config::BootstrapConfig].

# Crate Features

The optional and enabled-by-default `http` feature enables HTTP client support for
interacting with repositories via HTTP.
*/

pub mod binary_package_control;
pub mod config;
pub mod control;
pub mod deb;
pub mod dpkg;
pub mod error;
pub mod io;
pub mod ledger;
pub mod materialize;
pub mod pipeline;
pub mod publish;
pub mod repository;
pub mod symlink;
#[cfg(test)]
mod testutil;
