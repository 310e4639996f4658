// ==========================================
// 表格批量导入管道 - 导入任务 Repository Trait
// ==========================================
// 职责: 定义导入任务记录的数据访问接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::{ImportFilter, ImportJob, ImportStatus};
use crate::repository::error::RepositoryResult;

// ==========================================
// ImportJobStore Trait
// ==========================================
// 用途: 导入任务记录的持久化（运行中的 worker 与外部请求共享）
// 实现者: ImportJobRepository（使用 rusqlite）
pub trait ImportJobStore: Send + Sync {
    /// 插入新任务
    fn insert(&self, job: &ImportJob) -> RepositoryResult<()>;

    /// 按 ID 加载任务
    ///
    /// # 返回
    /// - Err(NotFound): 任务不存在
    fn load(&self, id: &str) -> RepositoryResult<ImportJob>;

    /// 按 ID 查找任务（不存在返回 None）
    fn find(&self, id: &str) -> RepositoryResult<Option<ImportJob>>;

    /// 写回状态与计数器
    fn save(&self, job: &ImportJob) -> RepositoryResult<()>;

    /// 只写回计数器（分块边界使用，不覆盖外部写入的状态）
    fn save_progress(&self, job: &ImportJob) -> RepositoryResult<()>;

    /// 读取最新状态
    fn refresh_status(&self, id: &str) -> RepositoryResult<ImportStatus>;

    /// 条件更新状态
    ///
    /// # 返回
    /// - Ok(true): 当前状态等于 expected，已更新为 new
    /// - Ok(false): 状态已被其他方修改，未更新
    fn compare_and_set_status(
        &self,
        id: &str,
        expected: ImportStatus,
        new: ImportStatus,
    ) -> RepositoryResult<bool>;

    /// 按条件列出任务（按创建时间倒序）
    fn list(&self, filter: &ImportFilter) -> RepositoryResult<Vec<ImportJob>>;
}
