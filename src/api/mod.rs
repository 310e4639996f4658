// ==========================================
// 表格批量导入管道 - API 层
// ==========================================
// 职责: 对外提供导入任务的业务接口
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportDownload};
