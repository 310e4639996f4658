// ==========================================
// 表格批量导入管道 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + calamine/csv/rust_xlsxwriter
// 定位: 表格文件分块校验 → 事务内逐行处理 → 带标注的结果文件
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 任务记录访问
pub mod repository;

// 导入层 - 校验/处理管道
pub mod importer;

// 配置层 - 运行参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{ImportFilter, ImportFormat, ImportJob, ImportSnapshot, ImportStatus, RowValues};

// 导入管道
pub use importer::{
    ActionRegistry, FieldRule, ImportError, ImportResult, ImportWorker, JobController,
    JobDescriptor, RowHandler, RuleSet, RunOutcome, RunSummary,
};

// 仓储
pub use repository::{ImportJobRepository, ImportJobStore};

// 配置
pub use config::{ConfigManager, ImportConfigReader, ImportSettings};

// API
pub use api::{ApiError, ApiResult, ImportApi, ImportDownload};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "表格批量导入管道";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
