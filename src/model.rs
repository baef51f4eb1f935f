use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{UrlId, UserId, UserUrlId};

pub const LABEL_NAME_MAX_LENGTH: usize = 30;
pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 30;
pub const MAX_URL_LENGTH: usize = 500;
/// Compared against the normalized form.
pub const RESERVED_USERNAMES: &[&str] = &["admin", "urlshare", "contact", "accounting", "security"];

/// A tag or category display name: trimmed, 1..=30 characters, no commas.
///
/// Commas are reserved because label IDs travel comma-separated in query strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelName(String);

impl LabelName {
    pub fn parse(raw: &str, entity: &'static str) -> Result<Self, ValidationError> {
        let name = raw.trim();

        if name.is_empty() {
            return Err(ValidationError::EmptyName(entity));
        }
        if name.chars().count() > LABEL_NAME_MAX_LENGTH {
            return Err(ValidationError::NameTooLong {
                entity,
                max: LABEL_NAME_MAX_LENGTH,
            });
        }
        if name.contains(',') {
            return Err(ValidationError::NameWithComma(entity));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let name = raw.trim();
        let len = name.chars().count();

        if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&len) {
            return Err(ValidationError::UsernameLength {
                min: USERNAME_MIN_LENGTH,
                max: USERNAME_MAX_LENGTH,
            });
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ValidationError::UsernameCharacters);
        }
        if RESERVED_USERNAMES.contains(&normalize_username(name).as_str()) {
            return Err(ValidationError::UsernameNotAllowed);
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The form uniqueness and lookups go through.
    pub fn normalized(&self) -> String {
        normalize_username(&self.0)
    }
}

pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl TryFrom<String> for Username {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(name: Username) -> Self {
        name.0
    }
}

/// An absolute `https://` URL of at most 500 characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HttpsUrl(String);

impl HttpsUrl {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let url = raw.trim();

        let rest = url.strip_prefix("https://").ok_or(ValidationError::UrlScheme)?;
        if url.chars().count() > MAX_URL_LENGTH {
            return Err(ValidationError::UrlTooLong(MAX_URL_LENGTH));
        }
        if url.chars().any(char::is_whitespace) {
            return Err(ValidationError::UrlWhitespace);
        }
        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() {
            return Err(ValidationError::UrlMissingHost);
        }

        Ok(Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for HttpsUrl {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HttpsUrl> for String {
    fn from(url: HttpsUrl) -> Self {
        url.0
    }
}

/// Page metadata as scraped by the browser extension, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataInput {
    pub url: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub lang: Option<String>,
    pub content_type: Option<String>,
    pub date: Option<String>,
    pub favicon_url: Option<String>,
    pub logo_url: Option<String>,
}

/// Validated page metadata. Text fields are trimmed and blank ones dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "MetadataInput")]
pub struct Metadata {
    pub url: HttpsUrl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl Metadata {
    pub fn new(url: HttpsUrl) -> Self {
        Self {
            url,
            title: None,
            image_url: None,
            description: None,
            author: None,
            publisher: None,
            lang: None,
            content_type: None,
            date: None,
            favicon_url: None,
            logo_url: None,
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn link(value: Option<String>, field: &'static str) -> Result<Option<String>, ValidationError> {
    match trimmed(value) {
        Some(v) if v.starts_with("https://") || v.starts_with("http://") => Ok(Some(v)),
        Some(_) => Err(ValidationError::InvalidLinkField(field)),
        None => Ok(None),
    }
}

impl TryFrom<MetadataInput> for Metadata {
    type Error = ValidationError;

    fn try_from(input: MetadataInput) -> Result<Self, Self::Error> {
        let date = trimmed(input.date);
        if let Some(date) = &date {
            chrono::DateTime::parse_from_rfc3339(date).map_err(|_| ValidationError::InvalidDate)?;
        }

        Ok(Self {
            url: HttpsUrl::parse(&input.url)?,
            title: trimmed(input.title),
            image_url: link(input.image_url, "imageUrl")?,
            description: trimmed(input.description),
            author: trimmed(input.author),
            publisher: trimmed(input.publisher),
            lang: trimmed(input.lang),
            content_type: trimmed(input.content_type),
            date,
            favicon_url: link(input.favicon_url, "faviconUrl")?,
            logo_url: link(input.logo_url, "logoUrl")?,
        })
    }
}

/// A tag or category as stored, with its denormalized usage count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Label<I> {
    pub id: I,
    pub name: String,
    pub usage_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedUrl {
    pub id: UrlId,
    pub url: String,
    pub compound_hash: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlHashRecord {
    pub compound_hash: String,
    pub url_hash: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlHashVariantCount {
    pub url_hash: String,
    pub compound_hashes_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUrl {
    pub id: UserUrlId,
    pub user_id: UserId,
    pub url_id: UrlId,
    pub likes_count: u32,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub urls_count: u32,
    pub likes_count: u32,
    pub liked_count: u32,
    pub followers_count: u32,
    pub following_count: u32,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub feed_id: String,
    pub created_at: String,
    pub user_url_id: UserUrlId,
    pub author_id: UserId,
    pub author_username: Option<String>,
    pub url: String,
    pub metadata: Metadata,
    pub likes_count: u32,
    pub liked: bool,
    pub category_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_names_are_trimmed_and_bounded() {
        assert_eq!(LabelName::parse("  rust  ", "Tag").unwrap().as_str(), "rust");
        assert_eq!(LabelName::parse("   ", "Tag"), Err(ValidationError::EmptyName("Tag")));
        assert!(LabelName::parse(&"a".repeat(30), "Tag").is_ok());
        assert_eq!(
            LabelName::parse(&"a".repeat(31), "Category"),
            Err(ValidationError::NameTooLong {
                entity: "Category",
                max: LABEL_NAME_MAX_LENGTH
            })
        );
        assert_eq!(LabelName::parse("a,b", "Tag"), Err(ValidationError::NameWithComma("Tag")));
    }

    #[test]
    fn label_name_length_counts_characters() {
        assert!(LabelName::parse(&"ż".repeat(30), "Tag").is_ok());
    }

    #[test]
    fn usernames() {
        assert!(Username::parse("jane_doe").is_ok());
        assert!(Username::parse("ab").is_err());
        assert_eq!(Username::parse("jane doe"), Err(ValidationError::UsernameCharacters));
        assert_eq!(Username::parse(" Jane_Doe ").unwrap().normalized(), "jane_doe");

        for reserved in ["admin", "Admin", "URLSHARE", "conTact", "accounting", "Security"] {
            assert_eq!(Username::parse(reserved), Err(ValidationError::UsernameNotAllowed));
        }
        assert!(Username::parse("admin_jane").is_ok());
    }

    #[test]
    fn only_https_urls_pass() {
        assert_eq!(HttpsUrl::parse(" https://a.com/x ").unwrap().as_str(), "https://a.com/x");
        assert_eq!(HttpsUrl::parse("http://a.com"), Err(ValidationError::UrlScheme));
        assert_eq!(HttpsUrl::parse("https:///path"), Err(ValidationError::UrlMissingHost));
        assert_eq!(HttpsUrl::parse("https://a.com/a b"), Err(ValidationError::UrlWhitespace));

        let long = format!("https://a.com/{}", "x".repeat(MAX_URL_LENGTH));
        assert_eq!(HttpsUrl::parse(&long), Err(ValidationError::UrlTooLong(MAX_URL_LENGTH)));
    }

    #[test]
    fn metadata_from_extension_payload() {
        let metadata: Metadata = serde_json::from_value(serde_json::json!({
            "url": "https://example.com/post",
            "title": "  A post ",
            "description": "   ",
            "imageUrl": "https://example.com/cover.png",
            "contentType": "text/html",
        }))
        .unwrap();

        assert_eq!(metadata.url.as_str(), "https://example.com/post");
        assert_eq!(metadata.title.as_deref(), Some("A post"));
        assert_eq!(metadata.description, None);
        assert_eq!(metadata.content_type.as_deref(), Some("text/html"));
    }

    #[test]
    fn metadata_rejects_bad_fields() {
        let bad_image = serde_json::json!({ "url": "https://a.com", "imageUrl": "cover.png" });
        assert!(serde_json::from_value::<Metadata>(bad_image).is_err());

        let bad_date = serde_json::json!({ "url": "https://a.com", "date": "yesterday" });
        assert!(serde_json::from_value::<Metadata>(bad_date).is_err());

        let missing_url = serde_json::json!({ "title": "A" });
        assert!(serde_json::from_value::<Metadata>(missing_url).is_err());
    }

    #[test]
    fn stored_metadata_reads_back() {
        let mut metadata = Metadata::new(HttpsUrl::parse("https://a.com").unwrap());
        metadata.title = Some("A".into());

        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"url":"https://a.com","title":"A"}"#);
        assert_eq!(serde_json::from_str::<Metadata>(&json).unwrap(), metadata);
    }
}
