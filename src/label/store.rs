use crate::db::Database;
use crate::error::StoreError;
use crate::id::{UserId, UserUrlId};
use crate::model::{Label, LabelName};

use super::LabelId;

pub struct Labels<'a> {
    db: &'a Database,
}

impl<'a> Labels<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn list<L: LabelId>(&self, user_id: &UserId) -> Result<Vec<Label<L>>, StoreError> {
        let _lock = self.db.lock().await;
        let query = format!(
            "SELECT id, name, usage_count FROM {} WHERE user_id = ? ORDER BY name ASC",
            L::KIND.table()
        );

        let mut rows = self
            .db
            .connection()
            .query(&query, libsql::params![user_id.as_str()])
            .await?;
        let mut labels = Vec::new();

        while let Some(row) = rows.next().await? {
            labels.push(Self::row_to_label(&row)?);
        }

        Ok(labels)
    }

    pub async fn get<L: LabelId>(&self, user_id: &UserId, id: &L) -> Result<Option<Label<L>>, StoreError> {
        let query = format!(
            "SELECT id, name, usage_count FROM {} WHERE id = ? AND user_id = ?",
            L::KIND.table()
        );

        let mut rows = self
            .db
            .connection()
            .query(&query, libsql::params![id.as_str(), user_id.as_str()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_label(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn create<L: LabelId>(&self, user_id: &UserId, name: &LabelName) -> Result<Label<L>, StoreError> {
        let tx = self.db.begin().await?;
        let result = self.create_internal::<L>(user_id, name).await;
        self.db.finish(tx, result).await
    }

    async fn create_internal<L: LabelId>(&self, user_id: &UserId, name: &LabelName) -> Result<Label<L>, StoreError> {
        let kind = L::KIND;

        if self.name_taken::<L>(user_id, name, None).await? {
            tracing::info!(kind = kind.table(), name = name.as_str(), "label name exists");
            return Err(StoreError::Conflict(format!(
                "{} name exists. Use different {} name.",
                kind.display_name(),
                kind.display_name().to_lowercase()
            )));
        }

        let id = L::generate();
        let query = format!("INSERT INTO {} (id, user_id, name) VALUES (?, ?, ?)", kind.table());
        self.db
            .connection()
            .execute(&query, libsql::params![id.as_str(), user_id.as_str(), name.as_str()])
            .await?;

        tracing::info!(kind = kind.table(), id = id.as_str(), name = name.as_str(), "label created");

        Ok(Label {
            id,
            name: name.as_str().to_string(),
            usage_count: 0,
        })
    }

    pub async fn rename<L: LabelId>(
        &self,
        user_id: &UserId,
        id: &L,
        name: &LabelName,
    ) -> Result<Label<L>, StoreError> {
        let tx = self.db.begin().await?;
        let result = self.rename_internal(user_id, id, name).await;
        self.db.finish(tx, result).await
    }

    async fn rename_internal<L: LabelId>(
        &self,
        user_id: &UserId,
        id: &L,
        name: &LabelName,
    ) -> Result<Label<L>, StoreError> {
        let kind = L::KIND;

        let Some(existing) = self.get(user_id, id).await? else {
            return Err(StoreError::NotFound(kind.table()));
        };

        if self.name_taken::<L>(user_id, name, Some(id)).await? {
            return Err(StoreError::Conflict(format!(
                "{} name exists. Use different {} name.",
                kind.display_name(),
                kind.display_name().to_lowercase()
            )));
        }

        let query = format!(
            "UPDATE {} SET name = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
            kind.table()
        );
        self.db
            .connection()
            .execute(&query, libsql::params![name.as_str(), id.as_str()])
            .await?;

        tracing::info!(kind = kind.table(), id = id.as_str(), name = name.as_str(), "label renamed");

        Ok(Label {
            name: name.as_str().to_string(),
            ..existing
        })
    }

    /// Deletes the label and its associations.
    pub async fn delete<L: LabelId>(&self, user_id: &UserId, id: &L) -> Result<(), StoreError> {
        let tx = self.db.begin().await?;
        let result = self.delete_internal(user_id, id).await;
        self.db.finish(tx, result).await
    }

    async fn delete_internal<L: LabelId>(&self, user_id: &UserId, id: &L) -> Result<(), StoreError> {
        let kind = L::KIND;

        if self.get(user_id, id).await?.is_none() {
            return Err(StoreError::NotFound(kind.table()));
        }

        let unlink = format!("DELETE FROM {} WHERE {} = ?", kind.join_table(), kind.join_column());
        self.db
            .connection()
            .execute(&unlink, libsql::params![id.as_str()])
            .await?;

        let delete = format!("DELETE FROM {} WHERE id = ?", kind.table());
        self.db
            .connection()
            .execute(&delete, libsql::params![id.as_str()])
            .await?;

        tracing::info!(kind = kind.table(), id = id.as_str(), "label deleted");
        Ok(())
    }

    /// Fails unless every id names a label of this kind owned by `user_id`.
    pub async fn ensure_owned<L: LabelId>(&self, user_id: &UserId, ids: &[L]) -> Result<(), StoreError> {
        for id in ids {
            if self.get(user_id, id).await?.is_none() {
                return Err(StoreError::Invalid(format!(
                    "{} ({}) doesn't exist.",
                    L::KIND.display_name(),
                    id.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Labels attached to a saved URL, in display order.
    pub async fn for_user_url<L: LabelId>(&self, user_url_id: &UserUrlId) -> Result<Vec<Label<L>>, StoreError> {
        let kind = L::KIND;
        let query = format!(
            r#"
            SELECT labels.id, labels.name, labels.usage_count
            FROM {join} AS links
            JOIN {table} AS labels ON labels.id = links.{column}
            WHERE links.user_url_id = ?
            ORDER BY links.position ASC
            "#,
            join = kind.join_table(),
            table = kind.table(),
            column = kind.join_column(),
        );

        let mut rows = self
            .db
            .connection()
            .query(&query, libsql::params![user_url_id.as_str()])
            .await?;
        let mut labels = Vec::new();

        while let Some(row) = rows.next().await? {
            labels.push(Self::row_to_label(&row)?);
        }

        Ok(labels)
    }

    /// Linked label ids in display order, plus the highest position in use.
    pub(crate) async fn linked_ids<L: LabelId>(&self, user_url_id: &UserUrlId) -> Result<(Vec<L>, u32), StoreError> {
        let kind = L::KIND;
        let query = format!(
            "SELECT {} , position FROM {} WHERE user_url_id = ? ORDER BY position ASC",
            kind.join_column(),
            kind.join_table()
        );

        let mut rows = self
            .db
            .connection()
            .query(&query, libsql::params![user_url_id.as_str()])
            .await?;
        let mut ids = Vec::new();
        let mut max_position = 0u32;

        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let position: i64 = row.get(1)?;
            ids.push(L::parse(&id)?);
            max_position = max_position.max(u32::try_from(position.max(0)).unwrap_or(u32::MAX));
        }

        Ok((ids, max_position))
    }

    async fn name_taken<L: LabelId>(
        &self,
        user_id: &UserId,
        name: &LabelName,
        except: Option<&L>,
    ) -> Result<bool, StoreError> {
        let query = format!(
            "SELECT 1 FROM {} WHERE user_id = ? AND name = ? AND id <> ? LIMIT 1",
            L::KIND.table()
        );
        let except = except.map(|id| id.as_str()).unwrap_or_default();

        let mut rows = self
            .db
            .connection()
            .query(&query, libsql::params![user_id.as_str(), name.as_str(), except])
            .await?;
        Ok(rows.next().await?.is_some())
    }

    fn row_to_label<L: LabelId>(row: &libsql::Row) -> Result<Label<L>, StoreError> {
        let id: String = row.get(0)?;
        let usage_count: i64 = row.get(2)?;

        Ok(Label {
            id: L::parse(&id)?,
            name: row.get(1)?,
            usage_count: u32::try_from(usage_count.max(0)).unwrap_or(u32::MAX),
        })
    }
}
