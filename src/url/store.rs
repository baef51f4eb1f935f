use serde::Serialize;

use crate::command::{SaveOutcome, SavePlan, plan_save, plan_user_url};
use crate::db::Database;
use crate::error::StoreError;
use crate::hash::{CompoundHash, UrlHash, compound_hash, url_hash};
use crate::id::{CategoryId, TagId, UrlId, UserId, UserUrlId};
use crate::label::{LabelId, Labels};
use crate::model::{Label, Metadata, SavedUrl, UrlHashRecord, UrlHashVariantCount, UserUrl};
use crate::reconcile::{AssociationDelta, reconcile};
use crate::social::Social;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedUrl {
    pub user_url_id: UserUrlId,
    pub url_id: UrlId,
    pub outcome: SaveOutcome,
}

pub struct Urls<'a> {
    db: &'a Database,
}

impl<'a> Urls<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn add_url(
        &self,
        user_id: &UserId,
        metadata: &Metadata,
        tag_ids: &[TagId],
        category_ids: &[CategoryId],
    ) -> Result<AddedUrl, StoreError> {
        let compound = compound_hash(metadata);
        let narrow = url_hash(metadata.url.as_str());

        let tx = self.db.begin().await?;
        let result = self
            .add_url_internal(user_id, metadata, &compound, &narrow, tag_ids, category_ids)
            .await;
        let added = self.db.finish(tx, result).await?;

        tracing::info!(
            user_id = user_id.as_str(),
            user_url_id = added.user_url_id.as_str(),
            url_id = added.url_id.as_str(),
            compound_hash = compound.as_str(),
            outcome = ?added.outcome,
            "url saved"
        );
        Ok(added)
    }

    async fn add_url_internal(
        &self,
        user_id: &UserId,
        metadata: &Metadata,
        compound: &CompoundHash,
        narrow: &UrlHash,
        tag_ids: &[TagId],
        category_ids: &[CategoryId],
    ) -> Result<AddedUrl, StoreError> {
        let labels = Labels::new(self.db);
        labels.ensure_owned(user_id, tag_ids).await?;
        labels.ensure_owned(user_id, category_ids).await?;

        let existing = self.find_url_id(compound).await?;
        let variants_known = self.url_hash_variants(narrow).await?.is_some();
        let plan = plan_save(existing, variants_known, metadata, compound, narrow);
        let plan = self.store_snapshot(plan, metadata, compound, narrow).await?;

        let followers = Social::new(self.db).followers_of(user_id).await?;
        let user_url_id = UserUrlId::generate();
        let commands = plan_user_url(&user_url_id, user_id, &plan.url_id, tag_ids, category_ids, &followers);
        self.db.apply(&commands).await?;

        Ok(AddedUrl {
            user_url_id,
            url_id: plan.url_id,
            outcome: plan.outcome,
        })
    }

    /// Applies a save plan. When the insert finds the compound hash already stored,
    /// the save switches to reusing that row.
    async fn store_snapshot(
        &self,
        plan: SavePlan,
        metadata: &Metadata,
        compound: &CompoundHash,
        narrow: &UrlHash,
    ) -> Result<SavePlan, StoreError> {
        if plan.outcome == SaveOutcome::Reused {
            self.db.apply(&plan.commands).await?;
            return Ok(plan);
        }

        // InsertUrl leads the plan.
        let (insert, rest) = plan
            .commands
            .split_first()
            .ok_or_else(|| StoreError::Invalid("empty save plan".into()))?;

        if self.db.apply_command(insert).await? > 0 {
            self.db.apply(rest).await?;
            return Ok(plan);
        }

        tracing::debug!(compound_hash = compound.as_str(), "snapshot already stored, reusing");
        let url_id = self.find_url_id(compound).await?.ok_or(StoreError::NotFound("url"))?;
        let reuse = plan_save(Some(url_id), true, metadata, compound, narrow);
        self.db.apply(&reuse.commands).await?;
        Ok(reuse)
    }

    /// Replaces the labels of kind `L` on a saved URL owned by `user_id`.
    pub async fn update_labels<L: LabelId>(
        &self,
        user_id: &UserId,
        user_url_id: &UserUrlId,
        ids: &[L],
    ) -> Result<AssociationDelta<L>, StoreError> {
        let tx = self.db.begin().await?;
        let result = self.update_labels_internal(user_id, user_url_id, ids).await;
        let delta = self.db.finish(tx, result).await?;

        tracing::info!(
            kind = L::KIND.table(),
            user_url_id = user_url_id.as_str(),
            attached = delta.to_attach.len(),
            detached = delta.to_detach.len(),
            "labels reconciled"
        );
        Ok(delta)
    }

    async fn update_labels_internal<L: LabelId>(
        &self,
        user_id: &UserId,
        user_url_id: &UserUrlId,
        ids: &[L],
    ) -> Result<AssociationDelta<L>, StoreError> {
        self.owned_user_url(user_id, user_url_id).await?;

        let labels = Labels::new(self.db);
        labels.ensure_owned(user_id, ids).await?;

        let (current, max_position) = labels.linked_ids::<L>(user_url_id).await?;
        let delta = reconcile(&current, ids);
        if !delta.is_empty() {
            self.db.apply(&delta.to_commands(user_url_id, max_position)).await?;
        }

        Ok(delta)
    }

    pub async fn list_labels<L: LabelId>(
        &self,
        user_id: &UserId,
        user_url_id: &UserUrlId,
    ) -> Result<Vec<Label<L>>, StoreError> {
        let _lock = self.db.lock().await;
        self.owned_user_url(user_id, user_url_id).await?;
        Labels::new(self.db).for_user_url::<L>(user_url_id).await
    }

    pub async fn get_user_url(&self, id: &UserUrlId) -> Result<Option<UserUrl>, StoreError> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT id, user_id, url_id, likes_count, created_at FROM user_urls WHERE id = ?",
                libsql::params![id.as_str()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let url_id: String = row.get(2)?;
        let likes_count: i64 = row.get(3)?;

        Ok(Some(UserUrl {
            id: UserUrlId::parse(&id)?,
            user_id: UserId::parse(&user_id)?,
            url_id: UrlId::parse(&url_id)?,
            likes_count: u32::try_from(likes_count.max(0)).unwrap_or(u32::MAX),
            created_at: row.get(4)?,
        }))
    }

    async fn owned_user_url(&self, user_id: &UserId, id: &UserUrlId) -> Result<UserUrl, StoreError> {
        match self.get_user_url(id).await? {
            Some(user_url) if &user_url.user_id == user_id => Ok(user_url),
            _ => Err(StoreError::NotFound("user URL")),
        }
    }

    pub async fn find_url_by_compound_hash(&self, compound: &CompoundHash) -> Result<Option<SavedUrl>, StoreError> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT id, url, compound_hash, metadata FROM urls WHERE compound_hash = ?",
                libsql::params![compound.as_str()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let id: String = row.get(0)?;
        let metadata: String = row.get(3)?;

        Ok(Some(SavedUrl {
            id: UrlId::parse(&id)?,
            url: row.get(1)?,
            compound_hash: row.get(2)?,
            metadata: serde_json::from_str(&metadata)?,
        }))
    }

    async fn find_url_id(&self, compound: &CompoundHash) -> Result<Option<UrlId>, StoreError> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT id FROM urls WHERE compound_hash = ?",
                libsql::params![compound.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let id: String = row.get(0)?;
                Ok(Some(UrlId::parse(&id)?))
            }
            None => Ok(None),
        }
    }

    pub async fn url_hash_record(&self, compound: &CompoundHash) -> Result<Option<UrlHashRecord>, StoreError> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT compound_hash, url_hash, count FROM url_hashes WHERE compound_hash = ?",
                libsql::params![compound.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get(2)?;
                Ok(Some(UrlHashRecord {
                    compound_hash: row.get(0)?,
                    url_hash: row.get(1)?,
                    count: u32::try_from(count.max(0)).unwrap_or(u32::MAX),
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn url_hash_variants(&self, narrow: &UrlHash) -> Result<Option<UrlHashVariantCount>, StoreError> {
        let count = self
            .db
            .read_counter("url_hash_variants", "compound_hashes_count", "url_hash", narrow.as_str())
            .await?;

        Ok(count.map(|compound_hashes_count| UrlHashVariantCount {
            url_hash: narrow.as_str().to_string(),
            compound_hashes_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpsUrl, LabelName};

    fn snapshot(title: &str) -> Metadata {
        let mut metadata = Metadata::new(HttpsUrl::parse("https://a.com").unwrap());
        metadata.title = Some(title.to_string());
        metadata
    }

    async fn usage(labels: &Labels<'_>, user: &UserId, id: &TagId) -> u32 {
        labels.get(user, id).await.unwrap().unwrap().usage_count
    }

    async fn count_rows(db: &Database, table: &str) -> i64 {
        let mut rows = db
            .connection()
            .query(&format!("SELECT COUNT(*) FROM {table}"), ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }

    #[tokio::test]
    async fn content_addressing_across_saves() {
        let db = Database::open_in_memory().await.unwrap();
        let urls = Urls::new(&db);
        let user = UserId::generate();

        let first = urls.add_url(&user, &snapshot("A"), &[], &[]).await.unwrap();
        assert_eq!(first.outcome, SaveOutcome::Created);

        let hash_a = compound_hash(&snapshot("A"));
        let narrow = url_hash("https://a.com");
        let record = urls.url_hash_record(&hash_a).await.unwrap().unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.url_hash, narrow.as_str());
        assert_eq!(
            urls.url_hash_variants(&narrow).await.unwrap().unwrap().compound_hashes_count,
            1
        );

        // Metadata drift: same link, new snapshot.
        let drift = urls.add_url(&user, &snapshot("B"), &[], &[]).await.unwrap();
        assert_eq!(drift.outcome, SaveOutcome::CreatedVariant);
        assert_ne!(drift.url_id, first.url_id);
        let hash_b = compound_hash(&snapshot("B"));
        assert_eq!(urls.url_hash_record(&hash_b).await.unwrap().unwrap().url_hash, narrow.as_str());
        assert_eq!(
            urls.url_hash_variants(&narrow).await.unwrap().unwrap().compound_hashes_count,
            2
        );

        // Identical re-save reuses the row.
        let again = urls.add_url(&user, &snapshot("A"), &[], &[]).await.unwrap();
        assert_eq!(again.outcome, SaveOutcome::Reused);
        assert_eq!(again.url_id, first.url_id);
        assert_eq!(urls.url_hash_record(&hash_a).await.unwrap().unwrap().count, 2);
        assert_eq!(
            urls.url_hash_variants(&narrow).await.unwrap().unwrap().compound_hashes_count,
            2
        );

        assert_eq!(count_rows(&db, "urls").await, 2);
        assert_eq!(count_rows(&db, "user_urls").await, 3);

        let saved = urls.find_url_by_compound_hash(&hash_b).await.unwrap().unwrap();
        assert_eq!(saved.metadata.title.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn insert_conflict_falls_back_to_reuse() {
        let db = Database::open_in_memory().await.unwrap();
        let urls = Urls::new(&db);
        let user = UserId::generate();
        let metadata = snapshot("A");
        let compound = compound_hash(&metadata);
        let narrow = url_hash("https://a.com");

        // Planned as if nothing were stored, then another save lands first.
        let stale = plan_save(None, false, &metadata, &compound, &narrow);
        let stored = urls.add_url(&user, &metadata, &[], &[]).await.unwrap();

        let tx = db.begin().await.unwrap();
        let result = urls.store_snapshot(stale, &metadata, &compound, &narrow).await;
        let plan = db.finish(tx, result).await.unwrap();

        assert_eq!(plan.outcome, SaveOutcome::Reused);
        assert_eq!(plan.url_id, stored.url_id);
        assert_eq!(urls.url_hash_record(&compound).await.unwrap().unwrap().count, 2);
        assert_eq!(
            urls.url_hash_variants(&narrow).await.unwrap().unwrap().compound_hashes_count,
            1
        );
        assert_eq!(count_rows(&db, "urls").await, 1);
    }

    #[tokio::test]
    async fn label_updates_track_usage_and_order() {
        let db = Database::open_in_memory().await.unwrap();
        let urls = Urls::new(&db);
        let labels = Labels::new(&db);
        let user = UserId::generate();

        let mut tags = Vec::new();
        for name in ["a", "b", "c", "d"] {
            let tag = labels
                .create::<TagId>(&user, &LabelName::parse(name, "Tag").unwrap())
                .await
                .unwrap();
            tags.push(tag.id);
        }
        let [a, b, c, d] = [tags[0].clone(), tags[1].clone(), tags[2].clone(), tags[3].clone()];

        let saved = urls
            .add_url(&user, &snapshot("A"), &[a.clone(), b.clone()], &[])
            .await
            .unwrap();

        let delta = urls
            .update_labels(&user, &saved.user_url_id, &[b.clone(), c.clone(), d.clone()])
            .await
            .unwrap();
        assert_eq!(delta.to_attach, vec![c.clone(), d.clone()]);
        assert_eq!(delta.to_detach, vec![a.clone()]);

        let listed = urls.list_labels::<TagId>(&user, &saved.user_url_id).await.unwrap();
        assert_eq!(
            listed.iter().map(|l| l.id.clone()).collect::<Vec<_>>(),
            vec![b.clone(), c.clone(), d.clone()]
        );

        assert_eq!(usage(&labels, &user, &a).await, 0);
        assert_eq!(usage(&labels, &user, &b).await, 1);
        assert_eq!(usage(&labels, &user, &c).await, 1);

        // Narrowing to one tag detaches the rest; duplicates collapse.
        let narrowed = urls
            .update_labels(&user, &saved.user_url_id, &[b.clone(), b.clone()])
            .await
            .unwrap();
        assert_eq!(narrowed.to_detach, vec![c.clone(), d.clone()]);
        assert!(narrowed.to_attach.is_empty());
        assert_eq!(usage(&labels, &user, &d).await, 0);

        let unchanged = urls.update_labels(&user, &saved.user_url_id, &[b]).await.unwrap();
        assert!(unchanged.is_empty());
    }

    #[tokio::test]
    async fn foreign_labels_and_urls_are_rejected_atomically() {
        let db = Database::open_in_memory().await.unwrap();
        let urls = Urls::new(&db);
        let labels = Labels::new(&db);
        let (owner, other) = (UserId::generate(), UserId::generate());

        let foreign = labels
            .create::<CategoryId>(&other, &LabelName::parse("theirs", "Category").unwrap())
            .await
            .unwrap();

        let rejected = urls.add_url(&owner, &snapshot("A"), &[], &[foreign.id.clone()]).await;
        assert!(matches!(rejected, Err(StoreError::Invalid(_))));
        assert_eq!(count_rows(&db, "urls").await, 0);

        let saved = urls.add_url(&owner, &snapshot("A"), &[], &[]).await.unwrap();
        let intruder = urls
            .update_labels::<CategoryId>(&other, &saved.user_url_id, &[foreign.id])
            .await;
        assert!(matches!(intruder, Err(StoreError::NotFound("user URL"))));
    }
}
