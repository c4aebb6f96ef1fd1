//! Transaction handle with rollback on drop
//!
//! A [`TransactionGuard`] is the "produce a transaction handle" half of the command
//! collaborator. Commands run through the guard share the database connection.

use super::cursor::SequentialRowCursor;
use super::database::Database;
use super::error::{DatabaseError, Result};
use super::value::DatabaseValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Transaction handle that rolls back on drop unless committed
///
/// # Example
///
/// ```ignore
/// use rust_data_reader::prelude::*;
///
/// async fn transfer(db: Arc<SqliteDatabase>) -> Result<()> {
///     let tx = TransactionGuard::begin(Arc::clone(&db)).await?;
///     tx.execute("UPDATE accounts SET balance = balance - ?1 WHERE id = 1", &[100.into()]).await?;
///     tx.execute("UPDATE accounts SET balance = balance + ?1 WHERE id = 2", &[100.into()]).await?;
///     tx.commit().await
/// }
/// ```
pub struct TransactionGuard<D: Database + 'static> {
    db: Arc<D>,
    committed: AtomicBool,
    rolled_back: AtomicBool,
}

impl<D: Database + 'static> TransactionGuard<D> {
    /// Begin a new transaction
    ///
    /// # Errors
    ///
    /// Fails when the database is not connected or a transaction is already active.
    pub async fn begin(db: Arc<D>) -> Result<Self> {
        db.begin_transaction().await?;

        Ok(Self {
            db,
            committed: AtomicBool::new(false),
            rolled_back: AtomicBool::new(false),
        })
    }

    fn ensure_active(&self) -> Result<()> {
        if self.committed.load(Ordering::Acquire) {
            return Err(DatabaseError::transaction("transaction already committed"));
        }
        if self.rolled_back.load(Ordering::Acquire) {
            return Err(DatabaseError::transaction("transaction already rolled back"));
        }
        Ok(())
    }

    /// Execute a command within the transaction
    pub async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64> {
        self.ensure_active()?;
        self.db.execute(sql, params).await
    }

    /// Open a cursor within the transaction
    pub async fn execute_reader(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<SequentialRowCursor<D::Reader>> {
        self.ensure_active()?;
        self.db.execute_reader(sql, params).await
    }

    /// Commit the transaction
    pub async fn commit(self) -> Result<()> {
        self.ensure_active()?;
        self.db.commit().await?;
        self.committed.store(true, Ordering::Release);
        Ok(())
    }

    /// Roll the transaction back
    pub async fn rollback(self) -> Result<()> {
        self.ensure_active()?;
        self.db.rollback().await?;
        self.rolled_back.store(true, Ordering::Release);
        Ok(())
    }

    /// Check if the transaction has been committed
    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::Acquire)
    }

    /// Check if the transaction has been rolled back
    pub fn is_rolled_back(&self) -> bool {
        self.rolled_back.load(Ordering::Acquire)
    }
}

impl<D: Database + 'static> Drop for TransactionGuard<D> {
    fn drop(&mut self) {
        if self.committed.load(Ordering::Acquire) || self.rolled_back.load(Ordering::Acquire) {
            return;
        }
        self.rolled_back.store(true, Ordering::Release);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let db = Arc::clone(&self.db);
                handle.spawn(async move {
                    if let Err(e) = db.rollback().await {
                        tracing::error!(error = %e, "automatic transaction rollback failed");
                    }
                });
                tracing::warn!("transaction guard dropped without commit or rollback; rollback scheduled");
            }
            Err(_) => {
                tracing::warn!(
                    "transaction guard dropped outside a tokio runtime; \
                     the backend rolls back when the connection closes"
                );
            }
        }
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backends::SqliteDatabase;
    use std::time::Duration;

    async fn setup() -> Result<Arc<SqliteDatabase>> {
        let db = Arc::new(SqliteDatabase::new());
        db.connect(":memory:").await?;
        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, value TEXT)", &[])
            .await?;
        Ok(db)
    }

    async fn count(db: &SqliteDatabase) -> Result<i64> {
        db.execute_scalar("SELECT COUNT(*) FROM test", &[]).await
    }

    #[tokio::test]
    async fn test_transaction_guard_commit() -> Result<()> {
        let db = setup().await?;

        let tx = TransactionGuard::begin(Arc::clone(&db)).await?;
        tx.execute("INSERT INTO test (value) VALUES (?1)", &["one".into()])
            .await?;
        tx.commit().await?;

        assert_eq!(count(&db).await?, 1);
        assert!(!db.in_transaction());
        Ok(())
    }

    #[tokio::test]
    async fn test_transaction_guard_rollback_on_drop() -> Result<()> {
        let db = setup().await?;

        {
            let tx = TransactionGuard::begin(Arc::clone(&db)).await?;
            tx.execute("INSERT INTO test (value) VALUES ('dropped')", &[])
                .await?;
        }

        for _ in 0..100 {
            if !db.in_transaction() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_transaction_guard_explicit_rollback() -> Result<()> {
        let db = setup().await?;

        let tx = TransactionGuard::begin(Arc::clone(&db)).await?;
        tx.execute("INSERT INTO test (value) VALUES ('undone')", &[])
            .await?;
        let mut cursor = tx.execute_reader("SELECT value FROM test", &[]).await?;
        assert!(cursor.read_async().await?);
        assert_eq!(cursor.get::<String>("value")?, "undone");
        cursor.dispose();
        tx.rollback().await?;

        assert_eq!(count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_nested_begin_fails() -> Result<()> {
        let db = setup().await?;

        let tx = TransactionGuard::begin(Arc::clone(&db)).await?;
        assert!(matches!(
            TransactionGuard::begin(Arc::clone(&db)).await,
            Err(DatabaseError::TransactionError(_))
        ));
        tx.rollback().await?;
        Ok(())
    }
}
