// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Interfaces for .deb package files.

The .deb file specification lives at <https://manpages.debian.org/unstable/dpkg-dev/deb.5.en.html>.

Bootstraps only need the installed payload of a package, so reading is
limited to the `data.tar` member. See [reader::BinaryPackageReader].
*/

pub mod reader;
