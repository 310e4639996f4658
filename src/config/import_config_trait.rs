// ==========================================
// 表格批量导入管道 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::import_settings::ImportSettings;
use crate::importer::error::ImportResult;
use std::path::PathBuf;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader: Send + Sync {
    /// 分块大小
    ///
    /// # 默认值
    /// - 100（必须 >= 1）
    fn get_chunk_size(&self) -> ImportResult<usize>;

    /// 行动作列名
    ///
    /// # 默认值
    /// - row_action
    fn get_action_column(&self) -> ImportResult<String>;

    /// 校验标注列名
    ///
    /// # 默认值
    /// - row_validation
    fn get_validation_column(&self) -> ImportResult<String>;

    /// Excel 优先读取的工作表
    ///
    /// # 默认值
    /// - DATA（不存在时读取第一个工作表）
    fn get_sheet_name(&self) -> ImportResult<String>;

    /// 处理阶段是否包在单个事务内
    ///
    /// # 默认值
    /// - true
    fn get_use_transaction(&self) -> ImportResult<bool>;

    /// 同时运行的任务数上限
    ///
    /// # 默认值
    /// - 2
    fn get_max_concurrent_jobs(&self) -> ImportResult<usize>;

    /// 文件存储根目录
    fn get_storage_dir(&self) -> ImportResult<PathBuf>;

    /// 读取完整运行参数
    fn load_settings(&self) -> ImportResult<ImportSettings> {
        Ok(ImportSettings {
            chunk_size: self.get_chunk_size()?,
            action_column: self.get_action_column()?,
            validation_column: self.get_validation_column()?,
            sheet_name: self.get_sheet_name()?,
            use_transaction: self.get_use_transaction()?,
            max_concurrent_jobs: self.get_max_concurrent_jobs()?,
            storage_dir: self.get_storage_dir()?,
        })
    }
}
