// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian binary package control paragraphs. */

use {
    crate::{
        control::ControlParagraph,
        error::{BootstrapError, Result},
    },
    std::ops::Deref,
};

/// Fields of a `Packages` index entry that describe how to retrieve and verify the
/// `.deb` file rather than the installed package.
///
/// dpkg's `status` database never contains these.
pub const TRANSPORT_FIELDS: &[&str] = &["Filename", "MD5sum", "SHA1", "SHA256", "SHA512", "Size"];

/// A Debian binary package control paragraph.
///
/// In this crate these come from `Packages` indices in repositories, where each
/// paragraph additionally carries transport fields such as `Filename` and `SHA256`.
///
/// [Deref] can be used to read the inner [ControlParagraph].
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BinaryPackageControlFile<'a> {
    paragraph: ControlParagraph<'a>,
}

impl<'a> Deref for BinaryPackageControlFile<'a> {
    type Target = ControlParagraph<'a>;

    fn deref(&self) -> &Self::Target {
        &self.paragraph
    }
}

impl<'a> From<ControlParagraph<'a>> for BinaryPackageControlFile<'a> {
    fn from(paragraph: ControlParagraph<'a>) -> Self {
        Self { paragraph }
    }
}

impl<'a> BinaryPackageControlFile<'a> {
    fn required_field_str(&self, field: &'static str) -> Result<&str> {
        self.field_str(field)
            .ok_or(BootstrapError::ControlRequiredFieldMissing(field))
    }

    /// The `Package` field value.
    pub fn package(&self) -> Result<&str> {
        self.required_field_str("Package")
    }

    /// The `Version` field as its original string.
    pub fn version_str(&self) -> Result<&str> {
        self.required_field_str("Version")
    }

    /// The `Architecture` field.
    pub fn architecture(&self) -> Result<&str> {
        self.required_field_str("Architecture")
    }

    /// The `Filename` field.
    ///
    /// This is the path of the `.deb` relative to the repository root.
    pub fn filename(&self) -> Option<&str> {
        self.field_str("Filename")
    }

    /// The `Size` field, parsed to a [u64].
    pub fn size(&self) -> Option<Result<u64>> {
        self.field_u64("Size")
    }

    /// The `SHA256` field.
    pub fn sha256(&self) -> Option<&str> {
        self.field_str("SHA256")
    }

    /// Obtain the paragraph as recorded in dpkg's `status` database.
    ///
    /// Transport fields are removed and `Status: install ok installed` is appended.
    pub fn to_installed_paragraph(&self) -> ControlParagraph<'a> {
        let mut paragraph = self.paragraph.without_fields(TRANSPORT_FIELDS);
        paragraph.set_field_from_string("Status".into(), "install ok installed".into());

        paragraph
    }
}
