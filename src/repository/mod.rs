// ==========================================
// 表格批量导入管道 - 数据仓储层
// ==========================================
// 职责: 导入任务记录的数据访问
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

pub mod error;
pub mod import_job_repo;
pub mod import_job_repo_impl;

// 重导出核心类型
pub use error::{RepositoryError, RepositoryResult};
pub use import_job_repo::ImportJobStore;
pub use import_job_repo_impl::ImportJobRepository;
