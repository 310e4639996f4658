// ==========================================
// 表格批量导入管道 - 导入任务领域模型
// ==========================================
// 对齐: import_jobs 表
// 红线: 计数器只增不减；每次运行开始时重置为 NULL
// ==========================================

use crate::domain::types::{ImportFormat, ImportStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ==========================================
// ImportJob - 导入任务记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    // ===== 主键 =====
    pub id: String, // 对外标识（UUID v4），创建后不可变

    // ===== 状态 =====
    pub status: ImportStatus,
    pub format: ImportFormat, // 输入/输出文件格式（创建时确定）

    // ===== 描述信息（创建后不可变）=====
    pub original_name: Option<String>,
    pub tag: Option<String>,
    pub owner_ref: Option<String>, // 提交人（仅用于查询过滤）

    // ===== 进度计数器 =====
    pub total_rows: Option<i64>,
    pub validated_rows: Option<i64>,
    pub errors_count: Option<i64>,
    pub processed_rows: Option<i64>,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// 创建已上传的导入任务
    pub fn new_uploaded(
        format: ImportFormat,
        original_name: Option<String>,
        tag: Option<String>,
        owner_ref: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            status: ImportStatus::Uploaded,
            format,
            original_name,
            tag: tag.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty()),
            owner_ref,
            total_rows: None,
            validated_rows: None,
            errors_count: None,
            processed_rows: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 输入文件名: {id}.{format}
    pub fn input_file_name(&self) -> String {
        format!("{}.{}", self.id, self.format.as_str())
    }

    /// 结果文件名: {id}.result.{ext}
    pub fn output_file_name(&self) -> String {
        format!("{}.result.{}", self.id, self.format.output_extension())
    }

    pub fn input_path(&self, imports_dir: &Path) -> PathBuf {
        imports_dir.join(self.input_file_name())
    }

    pub fn output_path(&self, imports_dir: &Path) -> PathBuf {
        imports_dir.join(self.output_file_name())
    }

    /// 下载时展示的文件名（扩展名与结果文件一致）
    pub fn download_file_name(&self) -> String {
        let base = self
            .original_name
            .clone()
            .unwrap_or_else(|| self.input_file_name());
        Path::new(&base)
            .with_extension(self.format.output_extension())
            .to_string_lossy()
            .to_string()
    }

    /// 开始读取输入文件：写入总行数，其余计数器置空
    pub fn reset_counters(&mut self, total_rows: usize) {
        self.total_rows = Some(total_rows as i64);
        self.validated_rows = None;
        self.errors_count = None;
        self.processed_rows = None;
    }

    /// 累加一个分块的校验进度
    pub fn add_validation_progress(&mut self, validated: usize, errors: usize) {
        self.validated_rows = Some(self.validated_rows.unwrap_or(0) + validated as i64);
        self.errors_count = Some(self.errors_count.unwrap_or(0) + errors as i64);
    }

    /// 累加一个分块的处理进度
    pub fn add_processed(&mut self, processed: usize) {
        self.processed_rows = Some(self.processed_rows.unwrap_or(0) + processed as i64);
    }

    pub fn snapshot(&self) -> ImportSnapshot {
        ImportSnapshot {
            id: self.id.clone(),
            status: self.status,
            format: self.format,
            original_name: self.original_name.clone(),
            tag: self.tag.clone(),
            total_rows: self.total_rows,
            validated_rows: self.validated_rows,
            errors_count: self.errors_count,
            processed_rows: self.processed_rows,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ==========================================
// ImportSnapshot - 对外可见的任务快照
// ==========================================
// 不暴露 owner_ref
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSnapshot {
    pub id: String,
    pub status: ImportStatus,
    pub format: ImportFormat,
    pub original_name: Option<String>,
    pub tag: Option<String>,
    pub total_rows: Option<i64>,
    pub validated_rows: Option<i64>,
    pub errors_count: Option<i64>,
    pub processed_rows: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// ImportFilter - 列表查询条件
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportFilter {
    pub owner_ref: Option<String>,
    pub status: Option<ImportStatus>,
    pub original_name: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uploaded_job() {
        let job = ImportJob::new_uploaded(
            ImportFormat::Xlsx,
            Some("orders.xlsx".to_string()),
            Some(" Orders ".to_string()),
            Some("user-1".to_string()),
        );

        assert_eq!(job.status, ImportStatus::Uploaded);
        assert_eq!(job.tag.as_deref(), Some("orders"));
        assert!(job.total_rows.is_none());
        assert_eq!(job.input_file_name(), format!("{}.xlsx", job.id));
        assert_eq!(job.output_file_name(), format!("{}.result.xlsx", job.id));
    }

    #[test]
    fn test_counters_accumulate_from_null() {
        let mut job = ImportJob::new_uploaded(ImportFormat::Csv, None, None, None);
        job.validated_rows = Some(7);
        job.reset_counters(10);
        assert_eq!(job.total_rows, Some(10));
        assert!(job.validated_rows.is_none());

        job.add_validation_progress(3, 1);
        job.add_validation_progress(2, 0);
        assert_eq!(job.validated_rows, Some(5));
        assert_eq!(job.errors_count, Some(1));

        job.add_processed(4);
        assert_eq!(job.processed_rows, Some(4));
    }

    #[test]
    fn test_download_file_name_follows_output_format() {
        let job = ImportJob::new_uploaded(
            ImportFormat::Xls,
            Some("legacy.xls".to_string()),
            None,
            None,
        );
        assert_eq!(job.download_file_name(), "legacy.xlsx");
    }
}
