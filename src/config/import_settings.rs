// ==========================================
// 表格批量导入管道 - 导入运行参数
// ==========================================
// 职责: 一次运行所需参数的快照（从 config_kv 读取后传入管道）
// ==========================================

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_ACTION_COLUMN: &str = "row_action";
pub const DEFAULT_VALIDATION_COLUMN: &str = "row_validation";
pub const DEFAULT_SHEET_NAME: &str = "DATA";
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;

/// 默认存储目录：<用户数据目录>/sheet-import
pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sheet-import")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub chunk_size: usize,
    pub action_column: String,
    pub validation_column: String,
    pub sheet_name: String,
    pub use_transaction: bool,
    pub max_concurrent_jobs: usize,
    pub storage_dir: PathBuf,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            action_column: DEFAULT_ACTION_COLUMN.to_string(),
            validation_column: DEFAULT_VALIDATION_COLUMN.to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            use_transaction: true,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            storage_dir: default_storage_dir(),
        }
    }
}

impl ImportSettings {
    pub fn with_storage_dir(mut self, storage_dir: impl AsRef<Path>) -> Self {
        self.storage_dir = storage_dir.as_ref().to_path_buf();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// 输入/结果文件目录
    pub fn imports_dir(&self) -> PathBuf {
        self.storage_dir.join("imports")
    }
}
