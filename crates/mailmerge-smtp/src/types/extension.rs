//! Capabilities advertised in the EHLO reply.

/// One EHLO capability line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// `STARTTLS`
    StartTls,
    /// `AUTH` with the mechanisms this client knows about.
    Auth(Vec<AuthMechanism>),
    /// `SIZE`, with the limit when one is given.
    Size(Option<usize>),
    /// `8BITMIME`
    EightBitMime,
    /// Anything else, kept verbatim.
    Unknown(String),
}

impl Extension {
    /// Parses one capability line (without the reply code).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (keyword, params) = line.split_once(' ').unwrap_or((line, ""));

        let is = |name: &str| keyword.eq_ignore_ascii_case(name);
        if is("STARTTLS") {
            Self::StartTls
        } else if is("AUTH") {
            Self::Auth(
                params
                    .split_whitespace()
                    .filter_map(AuthMechanism::parse)
                    .collect(),
            )
        } else if is("SIZE") {
            Self::Size(params.trim().parse().ok())
        } else if is("8BITMIME") {
            Self::EightBitMime
        } else {
            Self::Unknown(line.to_string())
        }
    }
}

/// SASL mechanism named in an `AUTH` capability that this client can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// `PLAIN`
    Plain,
}

impl AuthMechanism {
    /// Parses a mechanism name; unknown mechanisms give `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        name.eq_ignore_ascii_case("PLAIN").then_some(Self::Plain)
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_ignore_case() {
        assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
        assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        assert_eq!(Extension::parse("8bitmime"), Extension::EightBitMime);
        assert_eq!(
            Extension::parse("SMTPUTF8"),
            Extension::Unknown("SMTPUTF8".to_string())
        );
    }

    #[test]
    fn auth_keeps_known_mechanisms() {
        assert_eq!(
            Extension::parse("AUTH LOGIN PLAIN XOAUTH2 OAUTHBEARER"),
            Extension::Auth(vec![AuthMechanism::Plain])
        );
        assert_eq!(Extension::parse("AUTH"), Extension::Auth(Vec::new()));
    }

    #[test]
    fn size_limit_is_optional() {
        assert_eq!(
            Extension::parse("SIZE 35882577"),
            Extension::Size(Some(35_882_577))
        );
        assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
        assert_eq!(Extension::parse("SIZE lots"), Extension::Size(None));
    }

    #[test]
    fn unknown_lines_are_kept() {
        assert_eq!(
            Extension::parse("CHUNKING"),
            Extension::Unknown("CHUNKING".to_string())
        );
        assert_eq!(Extension::parse(""), Extension::Unknown(String::new()));
    }

    #[test]
    fn mechanism_names() {
        assert_eq!(AuthMechanism::parse("plain"), Some(AuthMechanism::Plain));
        assert_eq!(AuthMechanism::Plain.as_str(), "PLAIN");
        assert_eq!(AuthMechanism::parse("LOGIN"), None);
        assert_eq!(AuthMechanism::parse("CRAM-MD5"), None);
    }
}
