//! Prefixed, fixed-length identifiers.
//!
//! Every entity ID is a literal prefix followed by 22 characters drawn from
//! `[A-Za-z0-9]`. IDs are parsed once at the HTTP boundary (or when read back
//! from the database) and passed around as typed values afterwards.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_ID_LENGTH: usize = 22;

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn generate_id(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..DEFAULT_ID_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..ID_ALPHABET.len());
            ID_ALPHABET[idx] as char
        })
        .collect();

    format!("{prefix}{suffix}")
}

fn parse_id(raw: &str, prefix: &str, entity: &'static str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();

    if !trimmed.starts_with(prefix) {
        return Err(ValidationError::WrongIdPrefix(entity));
    }
    if trimmed.len() != prefix.len() + DEFAULT_ID_LENGTH {
        return Err(ValidationError::WrongIdSize);
    }
    if !trimmed[prefix.len()..].bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidIdCharacters);
    }

    Ok(trimmed.to_string())
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;
            pub const LENGTH: usize = $prefix.len() + DEFAULT_ID_LENGTH;

            pub fn generate() -> Self {
                Self(generate_id(Self::PREFIX))
            }

            pub fn parse(raw: &str) -> Result<Self, ValidationError> {
                parse_id(raw, Self::PREFIX, $entity).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

prefixed_id!(TagId, "tag_", "tag");
prefixed_id!(CategoryId, "cat_", "category");
prefixed_id!(UserId, "user_", "user");
prefixed_id!(
    /// A user's save of a [`UrlId`].
    UserUrlId,
    "user_url_",
    "userUrl"
);
prefixed_id!(
    /// A content-addressed saved URL, shared by every user who saved the same snapshot.
    UrlId,
    "url_",
    "url"
);
prefixed_id!(FeedId, "feed_", "feed");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_ids() {
        for raw in [
            "tag_abcdefghijkmnopqrstuvw",
            "tag_AbCdEfGhIjKlMnOpQrStUv",
            "tag_1234567890123456789012",
        ] {
            assert_eq!(TagId::parse(raw).unwrap().as_str(), raw);
        }
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let id = TagId::parse("  tag_abcdefghijkmnopqrstuvw  ").unwrap();
        assert_eq!(id.as_str(), "tag_abcdefghijkmnopqrstuvw");
    }

    #[test]
    fn rejects_foreign_prefixes_before_checking_size() {
        assert_eq!(
            TagId::parse("usr_abcdefghijkmnopqrstuvw"),
            Err(ValidationError::WrongIdPrefix("tag"))
        );
        assert_eq!(TagId::parse(""), Err(ValidationError::WrongIdPrefix("tag")));
        assert_eq!(
            CategoryId::parse("tag_abcdefghijkmnopqrstuvw"),
            Err(ValidationError::WrongIdPrefix("category"))
        );
    }

    #[test]
    fn rejects_wrong_sizes() {
        assert_eq!(TagId::parse("tag_"), Err(ValidationError::WrongIdSize));
        assert_eq!(TagId::parse("tag_short"), Err(ValidationError::WrongIdSize));
        assert_eq!(
            TagId::parse("tag_abcdefghijkmnopqrstuvwxyz123456789"),
            Err(ValidationError::WrongIdSize)
        );
        assert_eq!(TagId::parse("tag_abc!@#$%^&*()"), Err(ValidationError::WrongIdSize));
    }

    #[test]
    fn rejects_symbols_in_suffix() {
        assert_eq!(
            TagId::parse("tag_abcdefghijk-mnopqrstuv"),
            Err(ValidationError::InvalidIdCharacters)
        );
    }

    #[test]
    fn user_url_ids_are_not_user_ids() {
        let user_url = UserUrlId::generate();
        assert_eq!(UserId::parse(user_url.as_str()), Err(ValidationError::WrongIdSize));
    }

    #[test]
    fn generated_ids_round_trip_through_parse() {
        let id = CategoryId::generate();
        assert!(id.as_str().starts_with("cat_"));
        assert_eq!(id.as_str().len(), CategoryId::LENGTH);
        assert_eq!(CategoryId::parse(id.as_str()).unwrap(), id);
        assert_ne!(CategoryId::generate(), id);
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: TagId = serde_json::from_str("\"tag_abcdefghijkmnopqrstuvw\"").unwrap();
        assert_eq!(ok.to_string(), "tag_abcdefghijkmnopqrstuvw");
        assert!(serde_json::from_str::<TagId>("\"cat_abcdefghijkmnopqrstuvw\"").is_err());
    }
}
