use async_trait::async_trait;
use ic_common::{Item, ItemDraft, ItemId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::{parse_status, ItemStore, Result};

pub struct PostgresItemStore {
    pool: PgPool,
}

impl PostgresItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                email TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        info!("PostgreSQL item schema ready");
        Ok(())
    }

    fn map_row(row: &PgRow) -> Result<Item> {
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
impl ItemStore for PostgresItemStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find_all(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query("SELECT id, name, description, status, email FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn find_by_id(&self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query("SELECT id, name, description, status, email FROM items WHERE id = $1")
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
        let row = sqlx::query(
            "INSERT INTO items (name, description, status, email) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.status.as_str())
        .bind(&draft.email)
        .fetch_one(&self.pool)
        .await?;

        let item = Item::from_draft(row.get::<i64, _>("id"), draft);
        debug!(item_id = item.id, "Created item (PostgreSQL)");
        Ok(item)
    }

    async fn save(&self, item: Item) -> Result<Item> {
        // xmax = 0 only for freshly inserted tuples
        let row = sqlx::query(
            r#"
            INSERT INTO items (id, name, description, status, email)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                status = EXCLUDED.status,
                email = EXCLUDED.email
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.status.as_str())
        .bind(&item.email)
        .fetch_one(&self.pool)
        .await?;

        if row.get::<bool, _>("inserted") {
            // Explicit ids bypass BIGSERIAL; move the sequence past them
            sqlx::query(
                "SELECT setval(pg_get_serial_sequence('items', 'id'), (SELECT MAX(id) FROM items))",
            )
            .execute(&self.pool)
            .await?;
        }
        Ok(item)
    }

    async fn delete_by_id(&self, id: ItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
