// ==========================================
// 表格批量导入管道 - 领域模型层
// ==========================================
// 职责: 定义导入任务、行数据、状态类型
// 红线: 不含数据访问逻辑,不含管道逻辑
// ==========================================

pub mod import_job;
pub mod row;
pub mod types;

// 重导出核心类型
pub use import_job::{ImportFilter, ImportJob, ImportSnapshot};
pub use row::RowValues;
pub use types::{ImportFormat, ImportStatus};
