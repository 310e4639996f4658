// ==========================================
// 表格批量导入管道 - 导入任务 Repository 实现
// ==========================================
// 职责: 实现 import_jobs 表的数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::{init_import_schema, open_sqlite_connection};
use crate::domain::{ImportFilter, ImportFormat, ImportJob, ImportStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_job_repo::ImportJobStore;
use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// 状态/格式以大写字符串存储，与 serde 格式一致
impl ToSql for ImportStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ImportStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for ImportFormat {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ImportFormat {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

const SELECT_COLUMNS: &str = r#"
    id, status, format, original_name, tag, owner_ref,
    total_rows, validated_rows, errors_count, processed_rows,
    created_at, updated_at
"#;

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<ImportJob> {
    Ok(ImportJob {
        id: row.get(0)?,
        status: row.get(1)?,
        format: row.get(2)?,
        original_name: row.get(3)?,
        tag: row.get(4)?,
        owner_ref: row.get(5)?,
        total_rows: row.get(6)?,
        validated_rows: row.get(7)?,
        errors_count: row.get(8)?,
        processed_rows: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

// ==========================================
// ImportJobRepository - 导入任务仓储
// ==========================================
/// 导入任务仓储
/// 职责: 管理 import_jobs 表的 CRUD 操作
pub struct ImportJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportJobRepository {
    /// 创建新的 ImportJobRepository 实例（自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_import_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例（自动建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            init_import_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn not_found(id: &str) -> RepositoryError {
        RepositoryError::NotFound {
            entity: "ImportJob".to_string(),
            id: id.to_string(),
        }
    }
}

impl ImportJobStore for ImportJobRepository {
    fn insert(&self, job: &ImportJob) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_jobs (
                id, status, format, original_name, tag, owner_ref,
                total_rows, validated_rows, errors_count, processed_rows,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                job.id,
                job.status,
                job.format,
                job.original_name,
                job.tag,
                job.owner_ref,
                job.total_rows,
                job.validated_rows,
                job.errors_count,
                job.processed_rows,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    }

    fn load(&self, id: &str) -> RepositoryResult<ImportJob> {
        self.find(id)?.ok_or_else(|| Self::not_found(id))
    }

    fn find(&self, id: &str) -> RepositoryResult<Option<ImportJob>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM import_jobs WHERE id = ?1", SELECT_COLUMNS);
        let job = conn.query_row(&sql, params![id], map_job_row).optional()?;
        Ok(job)
    }

    fn save(&self, job: &ImportJob) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE import_jobs SET
                status = ?2,
                total_rows = ?3,
                validated_rows = ?4,
                errors_count = ?5,
                processed_rows = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                job.id,
                job.status,
                job.total_rows,
                job.validated_rows,
                job.errors_count,
                job.processed_rows,
                Utc::now(),
            ],
        )?;
        if affected == 0 {
            return Err(Self::not_found(&job.id));
        }
        Ok(())
    }

    fn save_progress(&self, job: &ImportJob) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE import_jobs SET
                total_rows = ?2,
                validated_rows = ?3,
                errors_count = ?4,
                processed_rows = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
            params![
                job.id,
                job.total_rows,
                job.validated_rows,
                job.errors_count,
                job.processed_rows,
                Utc::now(),
            ],
        )?;
        if affected == 0 {
            return Err(Self::not_found(&job.id));
        }
        Ok(())
    }

    fn refresh_status(&self, id: &str) -> RepositoryResult<ImportStatus> {
        let conn = self.get_conn()?;
        conn.query_row(
            "SELECT status FROM import_jobs WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| Self::not_found(id))
    }

    fn compare_and_set_status(
        &self,
        id: &str,
        expected: ImportStatus,
        new: ImportStatus,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE import_jobs SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
            params![id, expected, new, Utc::now()],
        )?;
        Ok(affected == 1)
    }

    fn list(&self, filter: &ImportFilter) -> RepositoryResult<Vec<ImportJob>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(owner) = &filter.owner_ref {
            clauses.push("owner_ref = ?");
            values.push(owner.clone());
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(status.as_str().to_string());
        }
        if let Some(name) = &filter.original_name {
            clauses.push("original_name LIKE ?");
            values.push(format!("%{}%", name));
        }
        if let Some(tag) = &filter.tag {
            clauses.push("tag = ?");
            values.push(tag.trim().to_lowercase());
        }

        let mut sql = format!("SELECT {} FROM import_jobs", SELECT_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC, id");
        sql.push_str(&format!(
            " LIMIT {} OFFSET {}",
            filter.limit.unwrap_or(100).clamp(1, 1000),
            filter.offset.unwrap_or(0).max(0)
        ));

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params_from_iter(values.iter()), map_job_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }
}
