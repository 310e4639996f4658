// ==========================================
// 表格批量导入管道 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 集中维护任务库 schema（import_jobs / config_kv）
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 任务库 schema
///
/// 说明：
/// - import_jobs 只保存任务元数据，业务数据写入独立的数据库
/// - 处理阶段的事务持有数据库写锁，进度写入必须落在另一个库文件，
///   否则会被自身事务阻塞
const IMPORT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS import_jobs (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL DEFAULT 'UPLOADING',
    original_name TEXT,
    tag TEXT,
    format TEXT NOT NULL DEFAULT 'xlsx',
    total_rows INTEGER,
    validated_rows INTEGER,
    errors_count INTEGER,
    processed_rows INTEGER,
    owner_ref TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_import_jobs_owner
    ON import_jobs(owner_ref, created_at);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 创建任务库表结构（幂等）
pub fn init_import_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(IMPORT_SCHEMA)
}

/// 打开业务数据库（处理阶段事务所在的库）
pub fn open_data_store(db_path: &str) -> rusqlite::Result<Arc<Mutex<Connection>>> {
    let conn = open_sqlite_connection(db_path)?;
    Ok(Arc::new(Mutex::new(conn)))
}
