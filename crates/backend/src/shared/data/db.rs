use once_cell::sync::OnceCell;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};
use std::path::Path;

static DB_CONN: OnceCell<DatabaseConnection> = OnceCell::new();

const CREATE_RETURNS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS a001_marketplace_returns (
        id TEXT PRIMARY KEY NOT NULL,
        account_id TEXT NOT NULL,
        order_id TEXT NOT NULL DEFAULT '',
        claim_id TEXT NOT NULL DEFAULT '',
        product_title TEXT NOT NULL DEFAULT '',
        sku TEXT NOT NULL DEFAULT '',
        claim_type TEXT,
        status_devolucao TEXT,
        priority TEXT,
        moderation_status TEXT,
        escalated_to_marketplace INTEGER NOT NULL DEFAULT 0,
        in_mediation INTEGER NOT NULL DEFAULT 0,
        seller_action_required INTEGER NOT NULL DEFAULT 0,
        unread_messages INTEGER,
        attachments_count INTEGER,
        retained_value REAL,
        shipping_cost REAL,
        compensation_value REAL,
        avg_response_time REAL,
        total_resolution_time REAL,
        satisfaction REAL,
        created_at TEXT NOT NULL,
        action_due_at TEXT,
        tracking_code TEXT,
        automatic_tags TEXT,
        claim_data TEXT,
        order_data TEXT,
        return_data TEXT,
        messages_data TEXT
    );
"#;

const CREATE_RETURNS_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_a001_returns_account ON a001_marketplace_returns (account_id);",
    "CREATE INDEX IF NOT EXISTS idx_a001_returns_created ON a001_marketplace_returns (created_at);",
];

const CREATE_SYSTEM_LOG_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS system_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        source TEXT NOT NULL,
        category TEXT NOT NULL,
        message TEXT NOT NULL
    );
"#;

/// URL подключения SQLite для файла базы
fn sqlite_url(db_file: &Path) -> anyhow::Result<String> {
    let absolute_path = if db_file.is_absolute() {
        db_file.to_path_buf()
    } else {
        std::env::current_dir()?.join(db_file)
    };
    // Windows: C:\... -> /C:/...
    let normalized = absolute_path.to_string_lossy().replace('\\', "/");
    let needs_leading_slash = !normalized.starts_with('/') && normalized.contains(':');
    let prefix = if needs_leading_slash { "/" } else { "" };
    Ok(format!("sqlite://{}{}?mode=rwc", prefix, normalized))
}

async fn execute(conn: &DatabaseConnection, sql: &str) -> anyhow::Result<()> {
    conn.execute(Statement::from_string(DatabaseBackend::Sqlite, sql.to_string()))
        .await?;
    Ok(())
}

/// Таблицы и индексы (идемпотентно)
pub async fn create_schema(conn: &DatabaseConnection) -> anyhow::Result<()> {
    execute(conn, CREATE_RETURNS_TABLE).await?;
    for sql in CREATE_RETURNS_INDEXES {
        execute(conn, sql).await?;
    }
    execute(conn, CREATE_SYSTEM_LOG_TABLE).await
}

/// Подключение к базе и создание таблиц, если их нет
pub async fn initialize_database(db_file: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db_url = sqlite_url(db_file)?;
    tracing::info!("Connecting to database: {}", db_url);
    let conn = Database::connect(&db_url).await?;
    create_schema(&conn).await?;
    tracing::info!("Database schema is ready");

    DB_CONN
        .set(conn)
        .map_err(|_| anyhow::anyhow!("Failed to set DB_CONN"))?;
    Ok(())
}

pub fn is_initialized() -> bool {
    DB_CONN.get().is_some()
}

pub fn get_connection() -> &'static DatabaseConnection {
    DB_CONN
        .get()
        .expect("Database connection has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_url_for_absolute_path() {
        let url = sqlite_url(Path::new("/var/data/app.db")).unwrap();
        assert_eq!(url, "sqlite:///var/data/app.db?mode=rwc");
    }
}
