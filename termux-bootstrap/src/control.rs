// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Defines primitives in control files.

Repository `Packages` indices and the dpkg `status` database are both series
of control paragraphs. See
<https://www.debian.org/doc/debian-policy/ch-controlfields.html> for the
canonical definition of the format.
*/

use {
    crate::error::{BootstrapError, Result},
    std::{
        borrow::Cow,
        io::{BufRead, Write},
    },
};

/// A field in a control file.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ControlField<'a> {
    name: Cow<'a, str>,
    value: Cow<'a, str>,
}

impl<'a> ControlField<'a> {
    /// Construct an instance from a field name and value.
    pub fn new(name: Cow<'a, str>, value: Cow<'a, str>) -> Self {
        Self { name, value }
    }

    /// The name of this field.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Obtain the value as a [&str].
    ///
    /// Continuation lines keep their newlines and leading whitespace.
    pub fn value_str(&self) -> &str {
        self.value.as_ref()
    }

    /// Whether this field has the given name, compared case insensitively.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Write the contents of this field to a writer.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(b": ")?;
        writer.write_all(self.value.as_ref().as_bytes())?;
        writer.write_all(b"\n")
    }
}

impl<'a> ToString for ControlField<'a> {
    fn to_string(&self) -> String {
        format!("{}: {}\n", self.name, self.value_str())
    }
}

/// A paragraph in a control file.
///
/// A paragraph is an ordered series of control fields.
///
/// Field names are case insensitive on read and case preserving on set.
/// Paragraphs can only contain a single occurrence of a field.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ControlParagraph<'a> {
    fields: Vec<ControlField<'a>>,
}

impl<'a> ControlParagraph<'a> {
    /// Whether the paragraph is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set the value of a field via a [ControlField].
    ///
    /// If a field with the same name (case insensitive compare) already exists, the old value
    /// will be replaced by the incoming value.
    pub fn set_field(&mut self, field: ControlField<'a>) {
        self.fields.retain(|cf| !cf.is_named(field.name()));
        self.fields.push(field);
    }

    /// Set the value of a field defined via strings.
    pub fn set_field_from_string(&mut self, name: Cow<'a, str>, value: Cow<'a, str>) {
        self.set_field(ControlField::new(name, value));
    }

    /// Whether a named field is present in this paragraph.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterate over fields in this paragraph.
    ///
    /// Iteration order is insertion order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &ControlField<'a>> {
        self.fields.iter()
    }

    /// Obtain the field with a given name in this paragraph.
    pub fn field(&self, name: &str) -> Option<&'_ ControlField<'a>> {
        self.fields.iter().find(|f| f.is_named(name))
    }

    /// Obtain the raw string value of the named field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value_str())
    }

    /// Obtain the named field parsed as a [u64].
    pub fn field_u64(&self, name: &str) -> Option<Result<u64>> {
        self.field_str(name)
            .map(|v| v.trim().parse::<u64>().map_err(BootstrapError::from))
    }

    /// Obtain a copy of this paragraph without the named fields.
    ///
    /// Names are compared case insensitively. Order of the remaining fields is preserved.
    pub fn without_fields(&self, names: &[&str]) -> ControlParagraph<'a> {
        ControlParagraph {
            fields: self
                .fields
                .iter()
                .filter(|f| !names.iter().any(|name| f.is_named(name)))
                .cloned()
                .collect(),
        }
    }

    /// Serialize the paragraph to a writer.
    ///
    /// A trailing newline is written as part of the final field. The blank line
    /// separating paragraphs is the caller's responsibility.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for field in &self.fields {
            field.write(writer)?;
        }

        Ok(())
    }
}

impl<'a> ToString for ControlParagraph<'a> {
    fn to_string(&self) -> String {
        self.fields.iter().map(|f| f.to_string()).collect()
    }
}

/// Holds parsing state for Debian control files.
///
/// Instances are fed lines of text and periodically emit [ControlParagraph]
/// instances as they are completed.
#[derive(Clone, Debug, Default)]
pub struct ControlFileParser {
    paragraph: ControlParagraph<'static>,
    field: Option<String>,
}

impl ControlFileParser {
    /// Write a line to the parser.
    ///
    /// If the line terminates an in-progress paragraph, that paragraph will be returned.
    /// Otherwise `Ok(None)` is returned.
    pub fn write_line(&mut self, line: &str) -> Result<Option<ControlParagraph<'static>>> {
        let is_empty_line = line.trim().is_empty();
        let is_indented = (line.starts_with(' ') || line.starts_with('\t')) && line.len() > 1;

        let current_field = self.field.take();

        // Empty lines signify the end of a paragraph.
        if is_empty_line {
            if let Some(field) = current_field {
                self.flush_field(field)?;
            }

            return Ok(if self.paragraph.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.paragraph))
            });
        }

        match (current_field, is_indented) {
            // An unindented line starts a new field.
            (Some(v), false) => {
                self.flush_field(v)?;
                self.field = Some(line.to_string());

                Ok(None)
            }
            (None, true) => Err(BootstrapError::ControlParse(format!(
                "continuation line without a field: '{}'",
                line.trim_end()
            ))),
            (None, false) => {
                self.field = Some(line.to_string());

                Ok(None)
            }
            // Value continuation.
            (Some(v), true) => {
                self.field = Some(v + line);

                Ok(None)
            }
        }
    }

    /// Finish parsing, consuming self.
    ///
    /// Returns the final paragraph if the input did not end with a blank line.
    pub fn finish(mut self) -> Result<Option<ControlParagraph<'static>>> {
        if let Some(field) = self.field.take() {
            self.flush_field(field)?;
        }

        Ok(if self.paragraph.is_empty() {
            None
        } else {
            Some(self.paragraph)
        })
    }

    fn flush_field(&mut self, v: String) -> Result<()> {
        let (name, value) = v.split_once(':').ok_or_else(|| {
            BootstrapError::ControlParse(format!("error parsing line '{}'; missing colon", v.trim_end()))
        })?;

        let name = name.trim();
        if name.is_empty() {
            return Err(BootstrapError::ControlParse(format!(
                "error parsing line '{}'; empty field name",
                v.trim_end()
            )));
        }

        self.paragraph.set_field_from_string(
            Cow::Owned(name.to_string()),
            Cow::Owned(value.trim().to_string()),
        );

        Ok(())
    }
}

/// A reader for [ControlParagraph].
///
/// Instances can be consumed as an iterator. Each call into the iterator will attempt to
/// read a full paragraph from the underlying reader.
pub struct ControlParagraphReader<R: BufRead> {
    reader: R,
    parser: Option<ControlFileParser>,
}

impl<R: BufRead> ControlParagraphReader<R> {
    /// Create a new instance bound to a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: Some(ControlFileParser::default()),
        }
    }

    fn get_next(&mut self) -> Result<Option<ControlParagraph<'static>>> {
        let mut parser = match self.parser.take() {
            Some(parser) => parser,
            None => return Ok(None),
        };

        loop {
            let mut line = String::new();

            let bytes_read = self.reader.read_line(&mut line)?;

            if bytes_read != 0 {
                if let Some(paragraph) = parser.write_line(&line)? {
                    self.parser.replace(parser);
                    return Ok(Some(paragraph));
                }
            } else {
                return parser.finish();
            }
        }
    }
}

impl<R: BufRead> Iterator for ControlParagraphReader<R> {
    type Item = Result<ControlParagraph<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next().transpose()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc};

    #[test]
    fn control_paragraph_field_semantics() {
        let mut p = ControlParagraph::default();

        // Same cased field name results in overwrite.
        p.set_field_from_string("foo".into(), "bar".into());
        p.set_field_from_string("foo".into(), "baz".into());
        assert_eq!(p.field_str("foo"), Some("baz"));

        // Different case results in overwrite.
        p.set_field_from_string("FOO".into(), "bar".into());
        assert_eq!(p.field_str("foo"), Some("bar"));
        assert_eq!(p.field_str("FOO"), Some("bar"));
        assert_eq!(p.iter_fields().count(), 1);
    }

    #[test]
    fn parse_packages_index() -> Result<()> {
        let data = indoc! {"
            Package: bash
            Architecture: aarch64
            Version: 5.0.0
            Description: A sh-compatible shell
             Bash is the GNU Project's shell.
             .
             It is intended to conform to POSIX.
            Filename: dists/stable/main/binary-aarch64/bash_5.0.0_aarch64.deb

            Package: readline
            Version: 8.0

        "};

        let paragraphs = ControlParagraphReader::new(std::io::Cursor::new(data))
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(paragraphs.len(), 2);

        let bash = &paragraphs[0];
        assert_eq!(bash.iter_fields().count(), 5);
        assert_eq!(bash.field_str("package"), Some("bash"));
        assert_eq!(
            bash.field_str("Description"),
            Some(
                "A sh-compatible shell\n Bash is the GNU Project's shell.\n .\n It is intended to conform to POSIX."
            )
        );
        assert_eq!(
            bash.iter_fields().map(|f| f.name()).collect::<Vec<_>>(),
            vec!["Package", "Architecture", "Version", "Description", "Filename"]
        );

        assert_eq!(paragraphs[1].field_str("Version"), Some("8.0"));

        Ok(())
    }

    #[test]
    fn parse_without_trailing_blank_line() -> Result<()> {
        let paragraphs = ControlParagraphReader::new(std::io::Cursor::new("Package: dash\nSize: 42"))
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].field_u64("Size").unwrap()?, 42);

        Ok(())
    }

    #[test]
    fn parse_missing_colon() {
        let res = ControlParagraphReader::new(std::io::Cursor::new("Package bash\n\n"))
            .collect::<Result<Vec<_>>>();

        assert!(matches!(res, Err(BootstrapError::ControlParse(_))));
    }

    #[test]
    fn multiline_value_round_trips() -> Result<()> {
        let data = "Package: apt\nDescription: summary\n more\n";

        let mut paragraphs = ControlParagraphReader::new(std::io::Cursor::new(data));
        let p = paragraphs.next().unwrap()?;

        let mut buffer = vec![];
        p.write(&mut buffer)?;
        assert_eq!(String::from_utf8(buffer).unwrap(), data);
        assert_eq!(p.to_string(), data);

        Ok(())
    }

    #[test]
    fn without_fields_is_case_insensitive() {
        let mut p = ControlParagraph::default();
        p.set_field_from_string("Package".into(), "dpkg".into());
        p.set_field_from_string("MD5sum".into(), "abc".into());
        p.set_field_from_string("Version".into(), "1.19".into());

        let stripped = p.without_fields(&["md5sum"]);
        assert_eq!(
            stripped.iter_fields().map(|f| f.name()).collect::<Vec<_>>(),
            vec!["Package", "Version"]
        );
    }
}
