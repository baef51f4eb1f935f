//! Tags and categories.
//!
//! Both label kinds share one storage layout (an owner-scoped table with a
//! denormalized `usage_count`, plus a join table towards `user_urls`), so they
//! share one implementation parameterized by [`LabelKind`].

mod handler;
mod routes;
mod store;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ValidationError;
use crate::id::{CategoryId, TagId};

pub use routes::{category_routes, tag_routes};
pub use store::Labels;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Tag,
    Category,
}

impl LabelKind {
    pub fn table(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tags",
            LabelKind::Category => "categories",
        }
    }

    pub fn join_table(&self) -> &'static str {
        match self {
            LabelKind::Tag => "user_url_tags",
            LabelKind::Category => "user_url_categories",
        }
    }

    pub fn join_column(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tag_id",
            LabelKind::Category => "category_id",
        }
    }

    /// Capitalized entity name used in user-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            LabelKind::Tag => "Tag",
            LabelKind::Category => "Category",
        }
    }
}

pub trait LabelId:
    Clone + PartialEq + Send + Sync + Serialize + DeserializeOwned + Into<LabelRef> + 'static
{
    const KIND: LabelKind;

    fn generate() -> Self;
    fn parse(raw: &str) -> Result<Self, ValidationError>;
    fn as_str(&self) -> &str;
}

impl LabelId for TagId {
    const KIND: LabelKind = LabelKind::Tag;

    fn generate() -> Self {
        TagId::generate()
    }

    fn parse(raw: &str) -> Result<Self, ValidationError> {
        TagId::parse(raw)
    }

    fn as_str(&self) -> &str {
        TagId::as_str(self)
    }
}

impl LabelId for CategoryId {
    const KIND: LabelKind = LabelKind::Category;

    fn generate() -> Self {
        CategoryId::generate()
    }

    fn parse(raw: &str) -> Result<Self, ValidationError> {
        CategoryId::parse(raw)
    }

    fn as_str(&self) -> &str {
        CategoryId::as_str(self)
    }
}

/// A label of either kind, as carried by write commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelRef {
    Tag(TagId),
    Category(CategoryId),
}

impl LabelRef {
    pub fn kind(&self) -> LabelKind {
        match self {
            LabelRef::Tag(_) => LabelKind::Tag,
            LabelRef::Category(_) => LabelKind::Category,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LabelRef::Tag(id) => id.as_str(),
            LabelRef::Category(id) => id.as_str(),
        }
    }
}

impl From<TagId> for LabelRef {
    fn from(id: TagId) -> Self {
        LabelRef::Tag(id)
    }
}

impl From<CategoryId> for LabelRef {
    fn from(id: CategoryId) -> Self {
        LabelRef::Category(id)
    }
}

/// Label IDs from a comma-separated query value; malformed entries are dropped.
pub fn parse_label_ids<L: LabelId>(raw: Option<&str>) -> Vec<L> {
    let Some(raw) = raw else {
        return vec![];
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| L::parse(s).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_ids_from_query_string() {
        let ids: Vec<CategoryId> = parse_label_ids(Some(
            " cat_abcdefghijkmnopqrstuvw , tag_abcdefghijkmnopqrstuvw,,cat_short,cat_1234567890123456789012",
        ));

        assert_eq!(
            ids.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
            vec!["cat_abcdefghijkmnopqrstuvw", "cat_1234567890123456789012"]
        );
        assert!(parse_label_ids::<TagId>(None).is_empty());
        assert!(parse_label_ids::<TagId>(Some("   ")).is_empty());
    }

    #[test]
    fn refs_know_their_kind() {
        let tag = TagId::generate();
        let label: LabelRef = tag.clone().into();

        assert_eq!(label.kind(), LabelKind::Tag);
        assert_eq!(label.as_str(), tag.as_str());
        assert_eq!(label.kind().join_table(), "user_url_tags");
        assert_eq!(LabelKind::Category.join_column(), "category_id");
    }
}
