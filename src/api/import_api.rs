// ==========================================
// 表格批量导入管道 - 导入API
// ==========================================
// 职责: 上传登记、启动/取消/停止、状态查询、结果下载
// 说明: 提供 owner 时只允许访问本人的任务（不匹配按不存在处理）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{ImportFilter, ImportFormat, ImportJob, ImportSnapshot, ImportStatus};
use crate::importer::{JobController, JobDescriptor, RunSummary};
use crate::repository::ImportJobStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// 结果文件下载内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDownload {
    /// 展示文件名（原始文件名 + 结果扩展名）
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// 导入API
pub struct ImportApi {
    store: Arc<dyn ImportJobStore>,
    controller: Arc<JobController>,
}

impl ImportApi {
    /// 创建新的ImportApi实例（任务库与控制器共用同一个 store）
    pub fn new(controller: Arc<JobController>) -> Self {
        Self {
            store: Arc::clone(controller.store()),
            controller,
        }
    }

    pub fn controller(&self) -> &Arc<JobController> {
        &self.controller
    }

    /// 登记上传文件
    ///
    /// # 参数
    /// - source_path: 已上传的临时文件
    /// - original_name: 原始文件名（用于识别格式与下载命名）
    /// - tag: 分类标签（可选）
    /// - owner: 提交人（可选）
    ///
    /// # 返回
    /// - Ok(ImportJob): 状态为 UPLOADED 的新任务
    /// - Err(ApiError::UnsupportedFormat): 扩展名不是 xls/xlsx/csv
    pub fn register_upload(
        &self,
        source_path: &Path,
        original_name: &str,
        tag: Option<&str>,
        owner: Option<&str>,
    ) -> ApiResult<ImportJob> {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let format = ImportFormat::from_extension(ext)
            .ok_or_else(|| ApiError::UnsupportedFormat(original_name.to_string()))?;

        if !source_path.is_file() {
            return Err(ApiError::InvalidInput(format!(
                "上传文件不存在: {}",
                source_path.display()
            )));
        }

        let job = ImportJob::new_uploaded(
            format,
            Some(original_name.to_string()),
            tag.map(str::to_string),
            owner.map(str::to_string),
        );

        let imports_dir = self.controller.settings().imports_dir();
        fs::create_dir_all(&imports_dir)
            .map_err(|e| ApiError::ImportError(format!("创建存储目录失败: {}", e)))?;
        fs::copy(source_path, job.input_path(&imports_dir))
            .map_err(|e| ApiError::ImportError(format!("保存上传文件失败: {}", e)))?;

        self.store.insert(&job)?;

        tracing::info!(
            job_id = %job.id,
            format = %job.format,
            original_name = original_name,
            "上传文件已登记"
        );
        Ok(job)
    }

    /// 运行导入任务（阻塞至任务结束）
    pub fn start_import(&self, id: &str, default_action: Option<&str>) -> ApiResult<RunSummary> {
        Ok(self.controller.run(&JobDescriptor::new(id, default_action))?)
    }

    /// 取消任务（仅 UPLOADED）
    pub fn cancel(&self, id: &str, owner: Option<&str>) -> ApiResult<ImportSnapshot> {
        self.request_transition(id, owner, ImportStatus::Uploaded, ImportStatus::Canceled)
    }

    /// 停止任务（仅 VALIDATING，下一个分块边界生效）
    pub fn stop(&self, id: &str, owner: Option<&str>) -> ApiResult<ImportSnapshot> {
        self.request_transition(id, owner, ImportStatus::Validating, ImportStatus::Stopped)
    }

    /// 查询任务状态与计数
    pub fn get_status(&self, id: &str) -> ApiResult<ImportSnapshot> {
        Ok(self.owned_job(id, None)?.snapshot())
    }

    /// 按条件列出任务（按创建时间倒序）
    pub fn list_imports(&self, filter: &ImportFilter) -> ApiResult<Vec<ImportSnapshot>> {
        Ok(self
            .store
            .list(filter)?
            .iter()
            .map(ImportJob::snapshot)
            .collect())
    }

    /// 下载结果文件
    pub fn download_result(&self, id: &str, owner: Option<&str>) -> ApiResult<ImportDownload> {
        let job = self.owned_job(id, owner)?;
        let path = job.output_path(&self.controller.settings().imports_dir());

        if !path.is_file() {
            return Err(ApiError::NotFound(format!("结果文件(id={})不存在", id)));
        }

        let bytes =
            fs::read(&path).map_err(|e| ApiError::ImportError(format!("读取结果文件失败: {}", e)))?;

        Ok(ImportDownload {
            file_name: job.download_file_name(),
            content_type: job.format.output_content_type().to_string(),
            bytes,
        })
    }

    fn owned_job(&self, id: &str, owner: Option<&str>) -> ApiResult<ImportJob> {
        let not_found = || ApiError::NotFound(format!("ImportJob(id={})不存在", id));

        let job = self.store.find(id)?.ok_or_else(not_found)?;
        match owner {
            Some(owner) if job.owner_ref.as_deref() != Some(owner) => Err(not_found()),
            _ => Ok(job),
        }
    }

    fn request_transition(
        &self,
        id: &str,
        owner: Option<&str>,
        expected: ImportStatus,
        new: ImportStatus,
    ) -> ApiResult<ImportSnapshot> {
        self.owned_job(id, owner)?;

        if !self.store.compare_and_set_status(id, expected, new)? {
            let status = self.store.refresh_status(id)?;
            return Err(ApiError::StateForbidden {
                id: id.to_string(),
                status,
            });
        }

        tracing::info!(job_id = id, from = %expected, to = %new, "任务状态已更新");
        Ok(self.store.load(id)?.snapshot())
    }
}
