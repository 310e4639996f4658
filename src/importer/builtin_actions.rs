// ==========================================
// 表格批量导入管道 - 内置键值动作
// ==========================================
// 动作:
// - put: 以键列为主键写入整行（JSON），返回 status=ok
// - delete: 按键列删除，返回 status=deleted / missing
// 存储: 业务库 import_records 表
// ==========================================

use crate::domain::RowValues;
use crate::importer::row_action::{ActionRegistry, HandlerError, RowHandler};
use crate::importer::validation_rules::{FieldRule, RuleSet};
use rusqlite::{params, Connection};

pub const PUT_ACTION: &str = "put";
pub const DELETE_ACTION: &str = "delete";
/// 默认键列
pub const DEFAULT_KEY_COLUMN: &str = "key";

const RECORDS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS import_records (
    record_key TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// 创建 import_records 表（幂等）
pub fn ensure_records_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(RECORDS_SCHEMA)
}

fn record_key(row: &RowValues, key_column: &str) -> Result<String, HandlerError> {
    row.get(key_column)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| HandlerError::InvalidRow(format!("{} 为空", key_column)))
}

/// put: 写入或覆盖一条记录
pub struct PutRecordHandler {
    key_column: String,
    // 不写入 payload 的列（动作列、标注列）
    skip_columns: Vec<String>,
}

impl PutRecordHandler {
    pub fn new(key_column: &str, skip_columns: &[&str]) -> Self {
        Self {
            key_column: key_column.to_string(),
            skip_columns: skip_columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl RowHandler for PutRecordHandler {
    fn process(&self, conn: &Connection, row: &RowValues) -> Result<RowValues, HandlerError> {
        let key = record_key(row, &self.key_column)?;

        let payload: RowValues = RowValues::from_pairs(
            row.iter()
                .filter(|(column, _)| !self.skip_columns.iter().any(|s| s == column)),
        );
        let payload = serde_json::to_string(&payload)?;

        conn.execute(
            "INSERT INTO import_records (record_key, payload, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(record_key) DO UPDATE SET payload = ?2, updated_at = datetime('now')",
            params![key, payload],
        )?;

        Ok(RowValues::from_pairs([("status", "ok")]))
    }
}

/// delete: 删除一条记录（不存在不算失败）
pub struct DeleteRecordHandler {
    key_column: String,
}

impl DeleteRecordHandler {
    pub fn new(key_column: &str) -> Self {
        Self {
            key_column: key_column.to_string(),
        }
    }
}

impl RowHandler for DeleteRecordHandler {
    fn process(&self, conn: &Connection, row: &RowValues) -> Result<RowValues, HandlerError> {
        let key = record_key(row, &self.key_column)?;
        let affected = conn.execute(
            "DELETE FROM import_records WHERE record_key = ?1",
            params![key],
        )?;

        let status = if affected > 0 { "deleted" } else { "missing" };
        Ok(RowValues::from_pairs([("status", status)]))
    }
}

/// 键值动作的校验规则：键列必填，长度不超过 128
pub fn key_value_rules(key_column: &str) -> RuleSet {
    RuleSet::new().field(
        key_column,
        vec![FieldRule::Required, FieldRule::MaxLength(128)],
    )
}

/// 注册 put / delete 动作
///
/// # 参数
/// - registry: 动作注册表
/// - key_column: 键列
/// - skip_columns: 不写入 payload 的列
pub fn register_key_value_actions(
    registry: ActionRegistry,
    key_column: &str,
    skip_columns: &[&str],
) -> ActionRegistry {
    let put_key = key_column.to_string();
    let delete_key = key_column.to_string();

    registry
        .with_rules(PUT_ACTION, move || key_value_rules(&put_key))
        .with_rules(DELETE_ACTION, move || key_value_rules(&delete_key))
        .with_handler(PUT_ACTION, PutRecordHandler::new(key_column, skip_columns))
        .with_handler(DELETE_ACTION, DeleteRecordHandler::new(key_column))
}
