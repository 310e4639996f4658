// ==========================================
// 表格批量导入管道 - 导入执行器
// ==========================================
// 职责: 在 tokio 运行时上并发执行导入任务
// 并发: 信号量限制同时运行的任务数，单个任务在阻塞线程池上运行
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::job_controller::{JobController, JobDescriptor, RunSummary};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

pub struct ImportWorker {
    controller: Arc<JobController>,
    permits: Arc<Semaphore>,
}

impl ImportWorker {
    /// 创建执行器
    ///
    /// # 参数
    /// - controller: 任务控制器（所有任务共享）
    /// - max_concurrent: 同时运行的任务数上限（最小为 1）
    pub fn new(controller: Arc<JobController>, max_concurrent: usize) -> Self {
        Self {
            controller,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn controller(&self) -> &Arc<JobController> {
        &self.controller
    }

    /// 提交任务，返回的句柄在任务结束时给出运行结果
    pub fn submit(&self, descriptor: JobDescriptor) -> JoinHandle<ImportResult<RunSummary>> {
        let controller = Arc::clone(&self.controller);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| ImportError::InternalError(format!("执行器已关闭: {}", e)))?;

            let job_id = descriptor.job_id.clone();
            tracing::info!(job_id = %job_id, "导入任务开始执行");

            let result = tokio::task::spawn_blocking(move || controller.run(&descriptor))
                .await
                .map_err(|e| ImportError::InternalError(format!("导入任务执行中断: {}", e)))?;

            match &result {
                Ok(summary) => {
                    tracing::info!(job_id = %job_id, outcome = ?summary.outcome, "导入任务结束")
                }
                Err(e) => tracing::error!(job_id = %job_id, error = %e, "导入任务失败"),
            }

            result
        })
    }

    /// 提交多个任务并等待全部结束（结果顺序与提交顺序一致）
    pub async fn run_all(&self, descriptors: Vec<JobDescriptor>) -> Vec<ImportResult<RunSummary>> {
        let handles: Vec<_> = descriptors.into_iter().map(|d| self.submit(d)).collect();

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(ImportError::InternalError(format!("导入任务执行中断: {}", e)))
                })
            })
            .collect()
    }
}
