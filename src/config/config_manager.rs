// ==========================================
// 表格批量导入管道 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::config::import_settings::{
    default_storage_dir, DEFAULT_ACTION_COLUMN, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CONCURRENT_JOBS,
    DEFAULT_SHEET_NAME, DEFAULT_VALIDATION_COLUMN,
};
use crate::db::{configure_sqlite_connection, init_import_schema, open_sqlite_connection};
use crate::importer::error::{ImportError, ImportResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 任务库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_import_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ImportResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| ImportError::LockError(e.to_string()))?;
            configure_sqlite_connection(&conn_guard)?;
            init_import_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> ImportResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self.get_conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ImportResult<String> {
        let conn = self.get_conn()?;

        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&config_map).map_err(|e| ImportError::InternalError(e.to_string()))
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ImportResult<String> {
        Ok(self
            .get_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取正整数配置
    fn get_positive_usize(&self, key: &str, default: usize) -> ImportResult<usize> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        match value.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            Ok(_) => Err(config_value_error(key, &value, "必须大于等于 1")),
            Err(e) => Err(config_value_error(key, &value, &e.to_string())),
        }
    }
}

fn config_value_error(key: &str, value: &str, message: &str) -> ImportError {
    ImportError::ConfigValueError {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_chunk_size(&self) -> ImportResult<usize> {
        self.get_positive_usize(config_keys::CHUNK_SIZE, DEFAULT_CHUNK_SIZE)
    }

    fn get_action_column(&self) -> ImportResult<String> {
        self.get_config_or_default(config_keys::ACTION_COLUMN, DEFAULT_ACTION_COLUMN)
    }

    fn get_validation_column(&self) -> ImportResult<String> {
        self.get_config_or_default(config_keys::VALIDATION_COLUMN, DEFAULT_VALIDATION_COLUMN)
    }

    fn get_sheet_name(&self) -> ImportResult<String> {
        self.get_config_or_default(config_keys::SHEET_NAME, DEFAULT_SHEET_NAME)
    }

    fn get_use_transaction(&self) -> ImportResult<bool> {
        let value = self.get_config_or_default(config_keys::USE_TRANSACTION, "true")?;
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(config_value_error(
                config_keys::USE_TRANSACTION,
                &value,
                "必须为 true 或 false",
            )),
        }
    }

    fn get_max_concurrent_jobs(&self) -> ImportResult<usize> {
        self.get_positive_usize(config_keys::MAX_CONCURRENT_JOBS, DEFAULT_MAX_CONCURRENT_JOBS)
    }

    fn get_storage_dir(&self) -> ImportResult<PathBuf> {
        Ok(self
            .get_config_value(config_keys::STORAGE_DIR)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_storage_dir))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 分块
    pub const CHUNK_SIZE: &str = "import.chunk_size";

    // 列名
    pub const ACTION_COLUMN: &str = "import.action_column";
    pub const VALIDATION_COLUMN: &str = "import.validation_column";

    // Excel
    pub const SHEET_NAME: &str = "import.sheet_name";

    // 处理
    pub const USE_TRANSACTION: &str = "import.use_transaction";
    pub const MAX_CONCURRENT_JOBS: &str = "import.max_concurrent_jobs";

    // 存储
    pub const STORAGE_DIR: &str = "import.storage_dir";
}
