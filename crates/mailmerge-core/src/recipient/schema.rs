//! Column layout of the recipient source.

use crate::error::{Error, Result};
use crate::recipient::RecipientFields;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Recipient attribute a column maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// First given name.
    Firstname1,
    /// Second given name.
    Firstname2,
    /// First surname.
    Lastname1,
    /// Second surname.
    Lastname2,
    /// Nickname.
    Nickname,
    /// Email address.
    Email,
    /// Country.
    Country,
    /// Custom field 1.
    C1,
    /// Custom field 2.
    C2,
    /// Custom field 3.
    C3,
    /// Custom field 4.
    C4,
    /// Custom field 5.
    C5,
    /// Column present in the source but ignored.
    Skip,
}

impl Field {
    /// Attribute name as used in templates and schema lists.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Firstname1 => "Firstname1",
            Self::Firstname2 => "Firstname2",
            Self::Lastname1 => "Lastname1",
            Self::Lastname2 => "Lastname2",
            Self::Nickname => "Nickname",
            Self::Email => "Email",
            Self::Country => "Country",
            Self::C1 => "C1",
            Self::C2 => "C2",
            Self::C3 => "C3",
            Self::C4 => "C4",
            Self::C5 => "C5",
            Self::Skip => "-",
        }
    }

    /// Stores `value` in the matching slot of `fields`.
    pub(crate) fn assign(self, fields: &mut RecipientFields, value: &str) {
        let slot = match self {
            Self::Firstname1 => &mut fields.firstname1,
            Self::Firstname2 => &mut fields.firstname2,
            Self::Lastname1 => &mut fields.lastname1,
            Self::Lastname2 => &mut fields.lastname2,
            Self::Nickname => &mut fields.nickname,
            Self::Email => &mut fields.email,
            Self::Country => &mut fields.country,
            Self::C1 => &mut fields.c1,
            Self::C2 => &mut fields.c2,
            Self::C3 => &mut fields.c3,
            Self::C4 => &mut fields.c4,
            Self::C5 => &mut fields.c5,
            Self::Skip => return,
        };
        value.clone_into(slot);
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let field = match s.trim().to_ascii_lowercase().as_str() {
            "firstname1" => Self::Firstname1,
            "firstname2" => Self::Firstname2,
            "lastname1" => Self::Lastname1,
            "lastname2" => Self::Lastname2,
            "nickname" => Self::Nickname,
            "email" => Self::Email,
            "country" => Self::Country,
            "c1" => Self::C1,
            "c2" => Self::C2,
            "c3" => Self::C3,
            "c4" => Self::C4,
            "c5" => Self::C5,
            "-" | "skip" => Self::Skip,
            "firstname" | "lastname" => {
                return Err(Error::Config(format!(
                    "column {s:?} is derived from its two parts and cannot be read directly"
                )));
            }
            _ => return Err(Error::Config(format!("unknown recipient column {s:?}"))),
        };
        Ok(field)
    }
}

/// Ordered column descriptor for recipient rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Field>,
}

const FULL: [Field; 12] = [
    Field::Firstname1,
    Field::Firstname2,
    Field::Lastname1,
    Field::Lastname2,
    Field::Nickname,
    Field::Email,
    Field::Country,
    Field::C1,
    Field::C2,
    Field::C3,
    Field::C4,
    Field::C5,
];

impl Schema {
    /// Creates a schema from an explicit column list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] unless `Email` appears exactly once and no
    /// other attribute repeats.
    pub fn new(columns: Vec<Field>) -> Result<Self> {
        let mut seen = HashSet::new();
        for field in columns.iter().filter(|f| **f != Field::Skip) {
            if !seen.insert(*field) {
                return Err(Error::Config(format!("column {field} is listed twice")));
            }
        }
        if !seen.contains(&Field::Email) {
            return Err(Error::Config("schema has no Email column".into()));
        }
        Ok(Self { columns })
    }

    /// `Firstname1, Lastname1, Email, Country`.
    #[must_use]
    pub fn basic() -> Self {
        Self {
            columns: vec![
                Field::Firstname1,
                Field::Lastname1,
                Field::Email,
                Field::Country,
            ],
        }
    }

    /// The full layout without `C5`.
    #[must_use]
    pub fn extended() -> Self {
        Self {
            columns: FULL[..11].to_vec(),
        }
    }

    /// Every recipient attribute, names first, then email, country, `C1`-`C5`.
    #[must_use]
    pub fn full() -> Self {
        Self {
            columns: FULL.to_vec(),
        }
    }

    /// A leading ignored column (e.g. a row number) followed by [`Schema::full`].
    #[must_use]
    pub fn full_indexed() -> Self {
        let mut columns = Vec::with_capacity(FULL.len() + 1);
        columns.push(Field::Skip);
        columns.extend_from_slice(&FULL);
        Self { columns }
    }

    /// Looks up a named preset.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(Self::basic()),
            "extended" => Some(Self::extended()),
            "full" => Some(Self::full()),
            "full-indexed" => Some(Self::full_indexed()),
            _ => None,
        }
    }

    /// Number of fields every row must have.
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Field] {
        &self.columns
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::full()
    }
}

impl FromStr for Schema {
    type Err = Error;

    /// Parses a preset name or a comma-separated column list.
    fn from_str(s: &str) -> Result<Self> {
        if let Some(schema) = Self::preset(s) {
            return Ok(schema);
        }
        if !s.contains(',') {
            return Err(Error::Config(format!(
                "unknown schema {s:?}: expected basic, extended, full, full-indexed or a column list"
            )));
        }
        let columns = s.split(',').map(str::parse).collect::<Result<Vec<_>>>()?;
        Self::new(columns)
    }
}

/// Schema as written in a configuration file: a preset name or a column list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SchemaSpec {
    /// Preset name or comma-separated list.
    Named(String),
    /// Explicit list of column names.
    Columns(Vec<String>),
}

impl SchemaSpec {
    /// Resolves the setting into a validated schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unknown presets or invalid column lists.
    pub fn resolve(&self) -> Result<Schema> {
        match self {
            Self::Named(name) => name.parse(),
            Self::Columns(names) => {
                let columns = names.iter().map(|n| n.parse()).collect::<Result<Vec<_>>>()?;
                Schema::new(columns)
            }
        }
    }
}

impl Default for SchemaSpec {
    fn default() -> Self {
        Self::Named("full".to_string())
    }
}
