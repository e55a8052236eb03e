use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use super::{DeleteOutcome, LinkStore, PutOutcome, StoreResult};
use crate::models::{UrlRecord, UserRecord};

/// SQLite-backed store. One pool per process, opened at startup.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `database_url` and run the
    /// embedded migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(
                database_url
                    .parse::<SqliteConnectOptions>()?
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal),
            )
            .await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying migrations.
    pub async fn from_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
        Ok(Self { pool })
    }
}

#[async_trait]
impl LinkStore for SqliteStore {
    async fn get_url(&self, short_code: &str) -> StoreResult<Option<UrlRecord>> {
        let record: Option<UrlRecord> = sqlx::query_as(
            "SELECT short_code, original_url, owner_id, created_at, visit_count
             FROM urls WHERE short_code = ?1",
        )
        .bind(short_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn put_url_if_absent(&self, record: &UrlRecord) -> StoreResult<PutOutcome> {
        let affected = sqlx::query(
            "INSERT INTO urls (short_code, original_url, owner_id, created_at, visit_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (short_code) DO NOTHING",
        )
        .bind(&record.short_code)
        .bind(&record.original_url)
        .bind(record.owner_id)
        .bind(record.created_at)
        .bind(record.visit_count)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(if affected == 1 {
            PutOutcome::Created
        } else {
            PutOutcome::AlreadyExists
        })
    }

    async fn put_url(&self, record: &UrlRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO urls (short_code, original_url, owner_id, created_at, visit_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (short_code) DO UPDATE SET
                 original_url = excluded.original_url,
                 owner_id     = excluded.owner_id,
                 created_at   = excluded.created_at,
                 visit_count  = excluded.visit_count",
        )
        .bind(&record.short_code)
        .bind(&record.original_url)
        .bind(record.owner_id)
        .bind(record.created_at)
        .bind(record.visit_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn increment_visits(&self, short_code: &str) -> StoreResult<Option<i64>> {
        let count: Option<i64> = sqlx::query_scalar(
            "UPDATE urls SET visit_count = visit_count + 1
             WHERE short_code = ?1
             RETURNING visit_count",
        )
        .bind(short_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete_url(&self, short_code: &str) -> StoreResult<DeleteOutcome> {
        let affected = sqlx::query("DELETE FROM urls WHERE short_code = ?1")
            .bind(short_code)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(if affected > 0 {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }

    async fn urls_by_owner(&self, owner_id: i64) -> StoreResult<Vec<UrlRecord>> {
        // INDEXED BY turns a missing index into an error instead of a scan.
        let records: Vec<UrlRecord> = sqlx::query_as(
            "SELECT short_code, original_url, owner_id, created_at, visit_count
             FROM urls INDEXED BY idx_urls_owner_id
             WHERE owner_id = ?1
             ORDER BY created_at",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<UserRecord>> {
        let user: Option<UserRecord> = sqlx::query_as(
            "SELECT user_id, name, email, password, created_at
             FROM users WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn put_user_if_absent(&self, user: &UserRecord) -> StoreResult<PutOutcome> {
        let affected = sqlx::query(
            "INSERT INTO users (user_id, name, email, password, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user.user_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(if affected == 1 {
            PutOutcome::Created
        } else {
            PutOutcome::AlreadyExists
        })
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<DeleteOutcome> {
        let affected = sqlx::query("DELETE FROM users WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(if affected > 0 {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        // A single connection, otherwise every pooled connection gets its own
        // private in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::from_pool(pool).await.unwrap()
    }

    fn record(code: &str, url: &str, owner: Option<i64>) -> UrlRecord {
        UrlRecord::new(code.into(), url.into(), owner)
    }

    #[tokio::test]
    async fn conditional_put_only_writes_once() {
        let store = store().await;
        let first = record("abc", "https://a.example", None);
        let second = record("abc", "https://b.example", None);

        assert_eq!(
            store.put_url_if_absent(&first).await.unwrap(),
            PutOutcome::Created
        );
        assert_eq!(
            store.put_url_if_absent(&second).await.unwrap(),
            PutOutcome::AlreadyExists
        );

        let stored = store.get_url("abc").await.unwrap().unwrap();
        assert_eq!(stored.original_url, "https://a.example");
    }

    #[tokio::test]
    async fn increment_returns_new_count_and_none_when_absent() {
        let store = store().await;
        store
            .put_url_if_absent(&record("abc", "https://a.example", None))
            .await
            .unwrap();

        assert_eq!(store.increment_visits("abc").await.unwrap(), Some(1));
        assert_eq!(store.increment_visits("abc").await.unwrap(), Some(2));
        assert_eq!(store.increment_visits("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_url_overwrites() {
        let store = store().await;
        let mut rec = record("abc", "https://a.example", Some(1));
        store.put_url_if_absent(&rec).await.unwrap();

        rec.visit_count = 42;
        store.put_url(&rec).await.unwrap();

        assert_eq!(store.get_url("abc").await.unwrap().unwrap().visit_count, 42);
    }

    #[tokio::test]
    async fn owner_index_query_and_delete() {
        let store = store().await;
        store
            .put_url_if_absent(&record("a", "https://a.example", Some(7)))
            .await
            .unwrap();
        store
            .put_url_if_absent(&record("b", "https://b.example", Some(7)))
            .await
            .unwrap();
        store
            .put_url_if_absent(&record("c", "https://c.example", Some(8)))
            .await
            .unwrap();
        store
            .put_url_if_absent(&record("d", "https://d.example", None))
            .await
            .unwrap();

        let mut codes: Vec<String> = store
            .urls_by_owner(7)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.short_code)
            .collect();
        codes.sort();
        assert_eq!(codes, vec!["a", "b"]);

        assert_eq!(store.delete_url("a").await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete_url("a").await.unwrap(), DeleteOutcome::NotFound);
        assert_eq!(store.urls_by_owner(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn user_round_trip() {
        let store = store().await;
        let user = UserRecord {
            user_id: 7,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "$argon2id$stub".into(),
            created_at: chrono::Utc::now(),
        };

        assert_eq!(
            store.put_user_if_absent(&user).await.unwrap(),
            PutOutcome::Created
        );
        assert_eq!(
            store.put_user_if_absent(&user).await.unwrap(),
            PutOutcome::AlreadyExists
        );
        assert_eq!(store.get_user(7).await.unwrap().unwrap().email, "ada@example.com");
        assert_eq!(store.delete_user(7).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete_user(7).await.unwrap(), DeleteOutcome::NotFound);
        assert!(store.get_user(7).await.unwrap().is_none());
    }
}
