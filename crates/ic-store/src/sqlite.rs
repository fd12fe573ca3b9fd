use async_trait::async_trait;
use ic_common::{Item, ItemDraft, ItemId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::{parse_status, ItemStore, Result};

pub struct SqliteItemStore {
    pool: SqlitePool,
}

impl SqliteItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                email TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        info!("SQLite item schema ready");
        Ok(())
    }

    fn map_row(row: &SqliteRow) -> Result<Item> {
        let id: i64 = row.get("id");
        let status: String = row.get("status");
        Ok(Item {
            id,
            name: row.get("name"),
            description: row.get("description"),
            status: parse_status(id, &status)?,
            email: row.get("email"),
        })
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn find_all(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query("SELECT id, name, description, status, email FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn find_by_id(&self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query("SELECT id, name, description, status, email FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn find_all_ids(&self) -> Result<Vec<ItemId>> {
        let rows = sqlx::query("SELECT id FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<i64, _>("id")).collect())
    }

    async fn create(&self, draft: ItemDraft) -> Result<Item> {
        let result = sqlx::query(
            "INSERT INTO items (name, description, status, email) VALUES (?, ?, ?, ?)",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.status.as_str())
        .bind(&draft.email)
        .execute(&self.pool)
        .await?;

        let item = Item::from_draft(result.last_insert_rowid(), draft);
        debug!(item_id = item.id, "Created item (SQLite)");
        Ok(item)
    }

    async fn save(&self, item: Item) -> Result<Item> {
        sqlx::query(
            r#"
            INSERT INTO items (id, name, description, status, email)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                status = excluded.status,
                email = excluded.email
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.status.as_str())
        .bind(&item.email)
        .execute(&self.pool)
        .await?;
        Ok(item)
    }

    async fn delete_by_id(&self, id: ItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
