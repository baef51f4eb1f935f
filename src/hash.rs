//! Content addressing for saved URLs.
//!
//! Two digests classify every save:
//!
//! - the compound hash (SHA-256) identifies one metadata snapshot of a link,
//! - the URL hash (SHA-1) identifies the link target regardless of metadata.
//!
//! Field order and the empty-string treatment of missing fields are part of the
//! stored data format: changing either orphans every existing `urls` row.

use std::fmt;

use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::model::Metadata;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CompoundHash(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UrlHash(String);

impl CompoundHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UrlHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompoundHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UrlHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn compound_hash(metadata: &Metadata) -> CompoundHash {
    compound_hash_of(
        metadata.url.as_str(),
        metadata.title.as_deref(),
        metadata.image_url.as_deref(),
        metadata.description.as_deref(),
    )
}

/// `sha256(trim(url + title + image_url + description))`, missing fields as "".
pub fn compound_hash_of(
    url: &str,
    title: Option<&str>,
    image_url: Option<&str>,
    description: Option<&str>,
) -> CompoundHash {
    let data = format!(
        "{}{}{}{}",
        url,
        title.unwrap_or_default(),
        image_url.unwrap_or_default(),
        description.unwrap_or_default()
    );

    CompoundHash(hex::encode(Sha256::digest(data.trim().as_bytes())))
}

pub fn url_hash(url: &str) -> UrlHash {
    UrlHash(hex::encode(Sha1::digest(url.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HttpsUrl;

    fn metadata(url: &str) -> Metadata {
        Metadata::new(HttpsUrl::parse(url).unwrap())
    }

    #[test]
    fn digests_match_reference_vectors() {
        assert_eq!(
            compound_hash_of("abc", None, None, None).as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(url_hash("abc").as_str(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn fields_are_concatenated_without_separator_in_fixed_order() {
        let split = compound_hash_of("a", Some("b"), Some("c"), None);
        assert_eq!(split, compound_hash_of("abc", None, None, None));

        let swapped = compound_hash_of("a", Some("c"), Some("b"), None);
        assert_ne!(split, swapped);
    }

    #[test]
    fn missing_fields_hash_like_empty_strings() {
        let bare = metadata("https://x.com");
        let mut explicit = metadata("https://x.com");
        explicit.title = Some(String::new());
        explicit.image_url = Some(String::new());
        explicit.description = Some(String::new());

        assert_eq!(compound_hash(&bare), compound_hash(&explicit));
    }

    #[test]
    fn concatenation_is_trimmed_as_a_whole() {
        assert_eq!(
            compound_hash_of("https://x.com", None, None, Some("   ")),
            compound_hash_of("https://x.com", None, None, None)
        );
    }

    #[test]
    fn any_single_field_change_changes_the_compound_hash() {
        let mut base = metadata("https://x.com");
        base.title = Some("T".into());
        base.image_url = Some("https://x.com/i.png".into());
        base.description = Some("D".into());
        let reference = compound_hash(&base);

        let mut other_url = base.clone();
        other_url.url = HttpsUrl::parse("https://y.com").unwrap();
        let mut other_title = base.clone();
        other_title.title = Some("T2".into());
        let mut other_image = base.clone();
        other_image.image_url = Some("https://x.com/j.png".into());
        let mut other_description = base.clone();
        other_description.description = Some("D2".into());

        for changed in [other_url, other_title, other_image, other_description] {
            assert_ne!(compound_hash(&changed), reference);
        }
    }

    #[test]
    fn fields_outside_the_contract_do_not_affect_the_compound_hash() {
        let base = metadata("https://x.com");
        let mut with_author = base.clone();
        with_author.author = Some("someone".into());

        assert_eq!(compound_hash(&base), compound_hash(&with_author));
    }

    #[test]
    fn shape_of_digests() {
        let compound = compound_hash(&metadata("https://x.com"));
        let url = url_hash("https://x.com");

        assert_eq!(compound.as_str().len(), 64);
        assert_eq!(url.as_str().len(), 40);
        assert!(compound.as_str().chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_ne!(url, url_hash("https://y.com"));
        assert_eq!(url, url_hash("https://x.com"));
    }
}
