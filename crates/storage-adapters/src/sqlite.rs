//! # SQLite storage
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `domains` models.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use domains::{
    Comment, CommentId, CommentRepository, Mode, NewComment, PreferenceStore, StorageError,
    Thread, ThreadId, Voters,
};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

// Comments reachable from the thread's roots, each with its nesting depth
// (top level = 1). Binds: uri, max depth.
const TREE_CTE: &str = "WITH RECURSIVE tree(id, depth) AS (
        SELECT c.id, 1 FROM comments c JOIN threads t ON c.tid = t.id
        WHERE t.uri = ? AND c.parent IS NULL
        UNION ALL
        SELECT c.id, tree.depth + 1 FROM comments c JOIN tree ON c.parent = tree.id
        WHERE tree.depth < ?
    )";

const COMMENT_COLUMNS: &str = "c.tid, c.id, c.parent, c.created, c.modified, c.mode, \
     c.remote_addr, c.text, c.author, c.email, c.website, c.likes, c.dislikes, c.voters, \
     c.notification";

#[derive(Clone)]
pub struct SqliteCommentRepo {
    pool: SqlitePool,
}

fn backend(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            tracing::debug!(constraint = db.message(), "unique constraint hit");
            return StorageError::UniqueViolation(db.message().to_string());
        }
    }
    tracing::warn!(error = %err, "sqlite operation failed");
    StorageError::Backend(err.to_string())
}

impl SqliteCommentRepo {
    /// Opens (creating if missing) the database file at `path` and applies migrations.
    pub async fn connect(path: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(1))
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(backend)?;
        let repo = Self { pool };
        repo.migrate().await?;
        tracing::info!(path, max_connections, "sqlite database ready");
        Ok(repo)
    }

    /// A private in-memory database on a single, never-recycled connection.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(backend)?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(backend)?;
        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "migrations failed");
                StorageError::Backend(e.to_string())
            })
    }

    pub async fn check_ready(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn thread_from_row(row: &SqliteRow) -> Result<Thread, sqlx::Error> {
    Ok(Thread {
        id: row.try_get("id")?,
        uri: row.try_get("uri")?,
        title: row.try_get("title")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment, StorageError> {
    let mode: i64 = row.try_get("mode").map_err(backend)?;
    let mode = Mode::from_i64(mode)
        .ok_or_else(|| StorageError::Backend(format!("unknown comment mode {mode}")))?;
    Ok(Comment {
        id: row.try_get("id").map_err(backend)?,
        thread_id: row.try_get("tid").map_err(backend)?,
        parent: row.try_get("parent").map_err(backend)?,
        created: row.try_get("created").map_err(backend)?,
        modified: row.try_get("modified").map_err(backend)?,
        mode,
        remote_addr: row.try_get("remote_addr").map_err(backend)?,
        text: row.try_get("text").map_err(backend)?,
        author: row.try_get("author").map_err(backend)?,
        email: row.try_get("email").map_err(backend)?,
        website: row.try_get("website").map_err(backend)?,
        likes: row.try_get("likes").map_err(backend)?,
        dislikes: row.try_get("dislikes").map_err(backend)?,
        voters: Voters::from_bytes(row.try_get("voters").map_err(backend)?),
        notification: row.try_get("notification").map_err(backend)?,
    })
}

#[async_trait]
impl CommentRepository for SqliteCommentRepo {
    async fn thread_by_uri(&self, uri: &str) -> Result<Option<Thread>, StorageError> {
        let row = sqlx::query("SELECT id, uri, title FROM threads WHERE uri = ?")
            .bind(uri)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(thread_from_row).transpose().map_err(backend)
    }

    async fn create_thread(
        &self,
        uri: &str,
        title: Option<String>,
    ) -> Result<Thread, StorageError> {
        let result = sqlx::query("INSERT INTO threads (uri, title) VALUES (?, ?)")
            .bind(uri)
            .bind(&title)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(Thread {
            id: result.last_insert_rowid(),
            uri: uri.to_string(),
            title,
        })
    }

    async fn insert_comment(
        &self,
        thread_id: ThreadId,
        comment: NewComment,
    ) -> Result<Comment, StorageError> {
        let result = sqlx::query(
            "INSERT INTO comments (tid, parent, created, modified, mode, remote_addr, \
             text, author, email, website, voters, notification) \
             VALUES (?, ?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(thread_id)
        .bind(comment.parent)
        .bind(comment.created)
        .bind(comment.mode.as_i64())
        .bind(&comment.remote_addr)
        .bind(&comment.text)
        .bind(&comment.author)
        .bind(&comment.email)
        .bind(&comment.website)
        .bind(comment.voters.as_bytes())
        .bind(comment.notification)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            thread_id,
            parent: comment.parent,
            created: comment.created,
            modified: None,
            mode: comment.mode,
            remote_addr: comment.remote_addr,
            text: comment.text,
            author: comment.author,
            email: comment.email,
            website: comment.website,
            likes: 0,
            dislikes: 0,
            voters: comment.voters,
            notification: comment.notification,
        })
    }

    async fn comment_by_id(&self, id: CommentId) -> Result<Option<Comment>, StorageError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(comment_from_row).transpose()
    }

    async fn has_approved_comment_since(
        &self,
        email: &str,
        since: f64,
    ) -> Result<bool, StorageError> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM comments WHERE email = ? AND mode = ? AND created > ?)",
        )
        .bind(email)
        .bind(Mode::Approved.as_i64())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(found != 0)
    }

    async fn count_replies(
        &self,
        uri: &str,
        max_depth: u32,
        after: f64,
    ) -> Result<HashMap<CommentId, i64>, StorageError> {
        let sql = format!(
            "{TREE_CTE}
            SELECT COALESCE(c.parent, 0) AS parent_key, COUNT(*) AS replies
            FROM comments c JOIN tree ON c.id = tree.id
            WHERE (c.mode & ?) != 0 AND c.created > ?
            GROUP BY parent_key"
        );
        let rows = sqlx::query(&sql)
            .bind(uri)
            .bind(max_depth)
            .bind(Mode::PUBLIC_MASK)
            .bind(after)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|row| {
                Ok::<(CommentId, i64), sqlx::Error>((
                    row.try_get("parent_key")?,
                    row.try_get("replies")?,
                ))
            })
            .collect::<Result<HashMap<_, _>, sqlx::Error>>()
            .map_err(backend)
    }

    async fn fetch_grouped(
        &self,
        uri: &str,
        max_depth: u32,
    ) -> Result<HashMap<CommentId, Vec<Comment>>, StorageError> {
        let sql = format!(
            "{TREE_CTE}
            SELECT {COMMENT_COLUMNS}
            FROM comments c JOIN tree ON c.id = tree.id
            WHERE (c.mode & ?) != 0
            ORDER BY c.id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(uri)
            .bind(max_depth)
            .bind(Mode::PUBLIC_MASK)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut groups: HashMap<CommentId, Vec<Comment>> = HashMap::new();
        for row in &rows {
            let comment = comment_from_row(row)?;
            groups.entry(comment.parent_key()).or_default().push(comment);
        }
        Ok(groups)
    }

    async fn count_comments(&self, uris: &[String]) -> Result<Vec<i64>, StorageError> {
        if uris.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT t.uri AS uri, COUNT(c.id) AS total \
             FROM threads t JOIN comments c ON c.tid = t.id WHERE c.mode = ",
        );
        query.push_bind(Mode::Approved.as_i64());
        query.push(" AND t.uri IN (");
        let mut separated = query.separated(", ");
        for uri in uris {
            separated.push_bind(uri);
        }
        separated.push_unseparated(") GROUP BY t.uri");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        let mut by_uri = HashMap::with_capacity(rows.len());
        for row in &rows {
            let uri: String = row.try_get("uri").map_err(backend)?;
            let total: i64 = row.try_get("total").map_err(backend)?;
            by_uri.insert(uri, total);
        }
        Ok(uris
            .iter()
            .map(|uri| by_uri.get(uri).copied().unwrap_or(0))
            .collect())
    }
}

#[async_trait]
impl PreferenceStore for SqliteCommentRepo {
    async fn get_preference(&self, key: &str) -> Result<Option<String>, StorageError> {
        sqlx::query_scalar("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn insert_preference_if_absent(
        &self,
        key: &str,
        value: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("INSERT OR IGNORE INTO preferences (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() == 1)
    }
}
