//! Recipient ingestion.
//!
//! Turns tabular rows (header first) into [`Recipient`] records according to
//! a [`Schema`]. Every row is width-checked before any field is read.

mod model;
mod schema;

pub use model::{Recipient, RecipientFields};
pub use schema::{Field, Schema, SchemaSpec};

use crate::error::{Error, Result};
use std::io::Read;

/// Ordered recipients of one merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    recipients: Vec<Recipient>,
}

impl RecipientSet {
    /// Builds recipients from rows of fields. Row 0 is the header and is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] naming the first row whose width
    /// differs from `schema.width()`.
    pub fn from_rows<I, R, S>(schema: &Schema, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        let recipients = rows
            .into_iter()
            .enumerate()
            .skip(1)
            .map(|(row, fields)| recipient_from_row(schema, row, fields.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { recipients })
    }

    /// Reads comma-delimited rows (header first) from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceUnavailable`] if the reader fails or the text
    /// cannot be tokenized, and [`Error::MalformedInput`] for rows of the
    /// wrong width.
    pub fn from_csv<R: Read>(schema: &Schema, reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut recipients = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| Error::SourceUnavailable(e.to_string()))?;
            if row == 0 {
                continue;
            }
            let fields: Vec<&str> = record.iter().collect();
            recipients.push(recipient_from_row(schema, row, &fields)?);
        }

        tracing::debug!(count = recipients.len(), "ingested recipients");
        Ok(Self { recipients })
    }

    /// Number of recipients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    /// Returns true if there are no recipients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    /// First recipient, used for the preview.
    #[must_use]
    pub fn first(&self) -> Option<&Recipient> {
        self.recipients.first()
    }

    /// Iterates recipients in ingestion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Recipient> {
        self.recipients.iter()
    }
}

impl<'a> IntoIterator for &'a RecipientSet {
    type Item = &'a Recipient;
    type IntoIter = std::slice::Iter<'a, Recipient>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn recipient_from_row<S: AsRef<str>>(
    schema: &Schema,
    row: usize,
    fields: &[S],
) -> Result<Recipient> {
    if fields.len() != schema.width() {
        return Err(Error::MalformedInput {
            row,
            expected: schema.width(),
            found: fields.len(),
        });
    }

    let mut parts = RecipientFields::default();
    for (column, value) in schema.columns().iter().zip(fields) {
        column.assign(&mut parts, value.as_ref());
    }
    Ok(Recipient::new(parts))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const HEADER: [&str; 4] = ["First", "Last", "Email", "Country"];

    #[test]
    fn skips_header_and_keeps_order() {
        let rows = vec![
            HEADER,
            ["Ana", "Ruiz", "a@x.com", "ES"],
            ["Bo", "Lind", "b@x.com", "SE"],
        ];
        let set = RecipientSet::from_rows(&Schema::basic(), rows).unwrap();
        assert_eq!(set.len(), 2);
        let emails: Vec<&str> = set.iter().map(Recipient::email).collect();
        assert_eq!(emails, ["a@x.com", "b@x.com"]);
        assert_eq!(set.first().unwrap().lastname(), "Ruiz");
    }

    #[test]
    fn header_only_gives_empty_set() {
        let set = RecipientSet::from_rows(&Schema::basic(), vec![HEADER]).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn short_row_names_its_index() {
        let rows = vec![
            HEADER.to_vec(),
            vec!["Ana", "Ruiz", "a@x.com", "ES"],
            vec!["Bo", "Lind"],
        ];
        let err = RecipientSet::from_rows(&Schema::basic(), rows).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedInput {
                row: 2,
                expected: 4,
                found: 2
            }
        ));
    }

    #[test]
    fn long_row_is_malformed_too() {
        let rows = vec![HEADER.to_vec(), vec!["Ana", "Ruiz", "a@x.com", "ES", "extra"]];
        assert!(matches!(
            RecipientSet::from_rows(&Schema::basic(), rows),
            Err(Error::MalformedInput { row: 1, found: 5, .. })
        ));
    }

    #[test]
    fn csv_full_schema() {
        let text = "\
Firstname1,Firstname2,Lastname1,Lastname2,Nickname,Email,Country,C1,C2,C3,C4,C5
Ana,Maria,Ruiz,Gil,Anita,a@x.com,ES,gold,,,,
Bo,,Lind,,,b@x.com,SE,,,,,vip
";
        let set = RecipientSet::from_csv(&Schema::full(), text.as_bytes()).unwrap();
        assert_eq!(set.len(), 2);

        let ana = set.first().unwrap();
        assert_eq!(ana.firstname(), "Ana Maria");
        assert_eq!(ana.lastname(), "Ruiz Gil");
        assert_eq!(ana.nickname(), "Anita");
        assert_eq!(ana.custom(1), Some("gold"));

        let bo = set.iter().nth(1).unwrap();
        assert_eq!(bo.firstname(), "Bo");
        assert_eq!(bo.custom(5), Some("vip"));
    }

    #[test]
    fn csv_quoted_fields() {
        let text = "h1,h2,h3,h4\n\"Ruiz, Ana\",x,\"a@x.com\",ES\n";
        let set = RecipientSet::from_csv(&Schema::basic(), text.as_bytes()).unwrap();
        assert_eq!(set.first().unwrap().firstname(), "Ruiz, Ana");
    }

    #[test]
    fn csv_short_row() {
        let text = "h1,h2,h3,h4\nAna,Ruiz,a@x.com,ES\nBo,Lind\n";
        let err = RecipientSet::from_csv(&Schema::basic(), text.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { row: 2, .. }));
    }

    #[test]
    fn csv_skip_column() {
        let text = "n,h1,h2,h3,h4,h5,h6,h7,h8,h9,h10,h11,h12\n7,Ana,,Ruiz,,,a@x.com,ES,,,,,\n";
        let set = RecipientSet::from_csv(&Schema::full_indexed(), text.as_bytes()).unwrap();
        assert_eq!(set.first().unwrap().email(), "a@x.com");
    }

    #[test]
    fn unreadable_source() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk on fire"))
            }
        }
        assert!(matches!(
            RecipientSet::from_csv(&Schema::basic(), Failing),
            Err(Error::SourceUnavailable(_))
        ));
    }

    #[test]
    fn invalid_utf8_is_unavailable() {
        let bytes: &[u8] = b"h1,h2,h3,h4\n\xff\xfe,b,c,d\n";
        assert!(matches!(
            RecipientSet::from_csv(&Schema::basic(), bytes),
            Err(Error::SourceUnavailable(_))
        ));
    }
}
