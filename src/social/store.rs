use serde::Serialize;

use crate::command::{Step, plan_follow, plan_like_toggle};
use crate::db::Database;
use crate::error::StoreError;
use crate::id::{CategoryId, UserId, UserUrlId};
use crate::model::{FeedItem, UserProfile, Username, normalize_username};
use crate::url::Urls;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeStatus {
    Liked,
    Unliked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub status: LikeStatus,
    pub likes_count: u32,
    pub user_url_id: UserUrlId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    /// Everything fanned out to the user: own saves and followed users' saves.
    All,
    /// Only the user's own saves.
    Author,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    /// Whose feed to read.
    pub user_id: UserId,
    /// Who is looking; drives the `liked` flag.
    pub viewer_id: UserId,
    pub limit: u32,
    /// Only entries strictly older than this UTC timestamp.
    pub cursor: Option<String>,
    pub source: FeedSource,
    /// Entries must carry every one of these categories.
    pub category_ids: Vec<CategoryId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<String>,
}

pub struct Social<'a> {
    db: &'a Database,
}

impl<'a> Social<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn create_profile(&self, user_id: &UserId, username: &Username) -> Result<UserProfile, StoreError> {
        let tx = self.db.begin().await?;
        let result = self.create_profile_internal(user_id, username).await;
        let profile = self.db.finish(tx, result).await?;

        tracing::info!(user_id = user_id.as_str(), username = username.as_str(), "profile created");
        Ok(profile)
    }

    async fn create_profile_internal(&self, user_id: &UserId, username: &Username) -> Result<UserProfile, StoreError> {
        if self.get_profile(user_id).await?.is_some() {
            return Err(StoreError::Conflict("Profile already exists.".into()));
        }
        if !self.username_available(username).await? {
            return Err(StoreError::Conflict("Username is taken.".into()));
        }

        self.db
            .connection()
            .execute(
                "INSERT INTO profiles (user_id, username, username_normalized) VALUES (?, ?, ?)",
                libsql::params![user_id.as_str(), username.as_str(), username.normalized()],
            )
            .await?;

        self.get_profile(user_id).await?.ok_or(StoreError::NotFound("profile"))
    }

    pub async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        self.query_profile("user_id", user_id.as_str()).await
    }

    /// Case-insensitive.
    pub async fn get_profile_by_username(&self, username: &str) -> Result<Option<UserProfile>, StoreError> {
        self.query_profile("username_normalized", &normalize_username(username)).await
    }

    pub async fn username_available(&self, username: &Username) -> Result<bool, StoreError> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT 1 FROM profiles WHERE username_normalized = ?",
                libsql::params![username.normalized()],
            )
            .await?;
        Ok(rows.next().await?.is_none())
    }

    async fn query_profile(&self, column: &str, value: &str) -> Result<Option<UserProfile>, StoreError> {
        let query = format!(
            r#"
            SELECT user_id, username, urls_count, likes_count, liked_count,
                   followers_count, following_count, created_at
            FROM profiles
            WHERE {column} = ?
            "#
        );

        let mut rows = self.db.connection().query(&query, libsql::params![value]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_profile(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn followers_of(&self, user_id: &UserId) -> Result<Vec<UserId>, StoreError> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT follower_id FROM follows WHERE following_id = ? ORDER BY created_at ASC",
                libsql::params![user_id.as_str()],
            )
            .await?;

        let mut followers = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            followers.push(UserId::parse(&id)?);
        }
        Ok(followers)
    }

    pub async fn is_following(&self, follower_id: &UserId, following_id: &UserId) -> Result<bool, StoreError> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT 1 FROM follows WHERE follower_id = ? AND following_id = ?",
                libsql::params![follower_id.as_str(), following_id.as_str()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Returns whether a new follow was recorded.
    pub async fn follow(&self, follower_id: &UserId, following_id: &UserId) -> Result<bool, StoreError> {
        self.set_following(follower_id, following_id, Step::Increment).await
    }

    /// Returns whether an existing follow was removed.
    pub async fn unfollow(&self, follower_id: &UserId, following_id: &UserId) -> Result<bool, StoreError> {
        self.set_following(follower_id, following_id, Step::Decrement).await
    }

    async fn set_following(&self, follower_id: &UserId, following_id: &UserId, step: Step) -> Result<bool, StoreError> {
        if follower_id == following_id {
            return Err(StoreError::Invalid("You cannot follow yourself.".into()));
        }

        let tx = self.db.begin().await?;
        let result = self.set_following_internal(follower_id, following_id, step).await;
        let changed = self.db.finish(tx, result).await?;

        if changed {
            tracing::info!(
                follower_id = follower_id.as_str(),
                following_id = following_id.as_str(),
                step = ?step,
                "follow updated"
            );
        }
        Ok(changed)
    }

    async fn set_following_internal(
        &self,
        follower_id: &UserId,
        following_id: &UserId,
        step: Step,
    ) -> Result<bool, StoreError> {
        if self.get_profile(following_id).await?.is_none() {
            return Err(StoreError::NotFound("user"));
        }

        let following = self.is_following(follower_id, following_id).await?;
        let wanted = step == Step::Increment;
        if following == wanted {
            return Ok(false);
        }

        self.db.apply(&plan_follow(follower_id, following_id, step)).await?;
        Ok(true)
    }

    pub async fn toggle_like(&self, user_id: &UserId, user_url_id: &UserUrlId) -> Result<LikeToggle, StoreError> {
        let tx = self.db.begin().await?;
        let result = self.toggle_like_internal(user_id, user_url_id).await;
        let toggle = self.db.finish(tx, result).await?;

        tracing::info!(
            user_id = user_id.as_str(),
            user_url_id = user_url_id.as_str(),
            status = ?toggle.status,
            likes_count = toggle.likes_count,
            "like toggled"
        );
        Ok(toggle)
    }

    async fn toggle_like_internal(&self, user_id: &UserId, user_url_id: &UserUrlId) -> Result<LikeToggle, StoreError> {
        let user_url = Urls::new(self.db)
            .get_user_url(user_url_id)
            .await?
            .ok_or(StoreError::NotFound("user URL"))?;

        if &user_url.user_id == user_id {
            return Err(StoreError::Invalid("You cannot like your own URL.".into()));
        }

        let liked = {
            let mut rows = self
                .db
                .connection()
                .query(
                    "SELECT 1 FROM likes WHERE user_url_id = ? AND user_id = ?",
                    libsql::params![user_url_id.as_str(), user_id.as_str()],
                )
                .await?;
            rows.next().await?.is_some()
        };

        self.db
            .apply(&plan_like_toggle(user_url_id, &user_url.user_id, user_id, liked))
            .await?;

        let likes_count = self
            .db
            .read_counter("user_urls", "likes_count", "id", user_url_id.as_str())
            .await?
            .unwrap_or_default();

        Ok(LikeToggle {
            status: if liked { LikeStatus::Unliked } else { LikeStatus::Liked },
            likes_count,
            user_url_id: user_url_id.clone(),
        })
    }

    /// A page of feed entries, newest first.
    pub async fn feed(&self, query: &FeedQuery) -> Result<FeedPage, StoreError> {
        let _lock = self.db.lock().await;
        let mut sql = String::from(
            r#"
            SELECT f.id, f.created_at, uu.id, uu.user_id, p.username, u.url, u.metadata, uu.likes_count,
                   EXISTS (SELECT 1 FROM likes l WHERE l.user_url_id = uu.id AND l.user_id = ?) AS liked,
                   (SELECT GROUP_CONCAT(name, ', ') FROM (
                        SELECT c.name AS name
                        FROM user_url_categories uc
                        JOIN categories c ON c.id = uc.category_id
                        WHERE uc.user_url_id = uu.id
                        ORDER BY uc.position ASC
                   )) AS category_names
            FROM feeds f
            JOIN user_urls uu ON uu.id = f.user_url_id
            JOIN urls u ON u.id = uu.url_id
            LEFT JOIN profiles p ON p.user_id = uu.user_id
            WHERE f.user_id = ?
            "#,
        );
        let mut params: Vec<libsql::Value> = vec![
            query.viewer_id.as_str().into(),
            query.user_id.as_str().into(),
        ];

        if query.source == FeedSource::Author {
            sql.push_str(" AND uu.user_id = ?");
            params.push(query.user_id.as_str().into());
        }

        if let Some(cursor) = &query.cursor {
            sql.push_str(" AND f.created_at < ?");
            params.push(cursor.as_str().into());
        }

        let mut seen: Vec<&CategoryId> = Vec::new();
        for category_id in &query.category_ids {
            if seen.contains(&category_id) {
                continue;
            }
            seen.push(category_id);
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM user_url_categories fc WHERE fc.user_url_id = uu.id AND fc.category_id = ?)",
            );
            params.push(category_id.as_str().into());
        }

        sql.push_str(" ORDER BY f.created_at DESC, f.rowid DESC LIMIT ?");
        params.push(i64::from(query.limit).into());

        let mut rows = self.db.connection().query(&sql, params).await?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::row_to_feed_item(&row)?);
        }

        let next_cursor = match items.last() {
            Some(last) if items.len() as u32 == query.limit => Some(last.created_at.clone()),
            _ => None,
        };

        tracing::debug!(
            user_id = query.user_id.as_str(),
            items = items.len(),
            has_more = next_cursor.is_some(),
            "feed read"
        );
        Ok(FeedPage { items, next_cursor })
    }

    fn row_to_profile(row: &libsql::Row) -> Result<UserProfile, StoreError> {
        let user_id: String = row.get(0)?;

        Ok(UserProfile {
            user_id: UserId::parse(&user_id)?,
            username: row.get(1)?,
            urls_count: counter(row.get(2)?),
            likes_count: counter(row.get(3)?),
            liked_count: counter(row.get(4)?),
            followers_count: counter(row.get(5)?),
            following_count: counter(row.get(6)?),
            created_at: row.get(7)?,
        })
    }

    fn row_to_feed_item(row: &libsql::Row) -> Result<FeedItem, StoreError> {
        let user_url_id: String = row.get(2)?;
        let author_id: String = row.get(3)?;
        let metadata: String = row.get(6)?;
        let liked: i64 = row.get(8)?;
        let category_names: Option<String> = row.get(9)?;

        Ok(FeedItem {
            feed_id: row.get(0)?,
            created_at: row.get(1)?,
            user_url_id: UserUrlId::parse(&user_url_id)?,
            author_id: UserId::parse(&author_id)?,
            author_username: row.get(4)?,
            url: row.get(5)?,
            metadata: serde_json::from_str(&metadata)?,
            likes_count: counter(row.get(7)?),
            liked: liked != 0,
            // Names never contain commas, so the separator is unambiguous.
            category_names: category_names
                .map(|names| names.split(", ").map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }
}

fn counter(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
