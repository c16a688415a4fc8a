//! Recipient record.

use serde::Serialize;

/// Raw attributes of one recipient, as read from a row.
///
/// Every attribute may be empty. The combined name fields are not part of
/// this struct: they are derived when the [`Recipient`] is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientFields {
    /// First given name.
    pub firstname1: String,
    /// Second given name.
    pub firstname2: String,
    /// First surname.
    pub lastname1: String,
    /// Second surname.
    pub lastname2: String,
    /// Nickname.
    pub nickname: String,
    /// Email address.
    pub email: String,
    /// Country.
    pub country: String,
    /// Custom field 1.
    pub c1: String,
    /// Custom field 2.
    pub c2: String,
    /// Custom field 3.
    pub c3: String,
    /// Custom field 4.
    pub c4: String,
    /// Custom field 5.
    pub c5: String,
}

/// One recipient of the merge.
///
/// Immutable once built. Serializes with the attribute names templates use
/// (`Firstname`, `Lastname2`, `C1`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Recipient {
    firstname1: String,
    firstname2: String,
    firstname: String,
    lastname1: String,
    lastname2: String,
    lastname: String,
    nickname: String,
    email: String,
    country: String,
    c1: String,
    c2: String,
    c3: String,
    c4: String,
    c5: String,
}

impl Recipient {
    /// Builds a recipient, deriving `Firstname` and `Lastname`.
    #[must_use]
    pub fn new(fields: RecipientFields) -> Self {
        let firstname = join_name(&fields.firstname1, &fields.firstname2);
        let lastname = join_name(&fields.lastname1, &fields.lastname2);
        Self {
            firstname1: fields.firstname1,
            firstname2: fields.firstname2,
            firstname,
            lastname1: fields.lastname1,
            lastname2: fields.lastname2,
            lastname,
            nickname: fields.nickname,
            email: fields.email,
            country: fields.country,
            c1: fields.c1,
            c2: fields.c2,
            c3: fields.c3,
            c4: fields.c4,
            c5: fields.c5,
        }
    }

    /// Combined first name.
    #[must_use]
    pub fn firstname(&self) -> &str {
        &self.firstname
    }

    /// First given name.
    #[must_use]
    pub fn firstname1(&self) -> &str {
        &self.firstname1
    }

    /// Second given name.
    #[must_use]
    pub fn firstname2(&self) -> &str {
        &self.firstname2
    }

    /// Combined last name.
    #[must_use]
    pub fn lastname(&self) -> &str {
        &self.lastname
    }

    /// Nickname.
    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Email address, possibly empty.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Country.
    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }

    /// Custom field `n` (1 to 5).
    #[must_use]
    pub fn custom(&self, n: usize) -> Option<&str> {
        match n {
            1 => Some(&self.c1),
            2 => Some(&self.c2),
            3 => Some(&self.c3),
            4 => Some(&self.c4),
            5 => Some(&self.c5),
            _ => None,
        }
    }

    /// Returns true if the recipient has an address to deliver to.
    #[must_use]
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

fn join_name(first: &str, second: &str) -> String {
    if second.is_empty() {
        first.to_string()
    } else {
        format!("{first} {second}")
    }
}
