// ==========================================
// 表格批量导入管道 - 任务控制器
// ==========================================
// 职责: 任务生命周期编排
// 流程: 加载任务 → 取消检查 → 打开输入/结果文件 → 校验 → 处理
// 状态:
//   UPLOADED → {CANCELED | VALIDATING}
//   VALIDATING → {STOPPED | INVALID | PROCESSING}
//   PROCESSING → {PROCESSED | PROCESS_FAILED}
// 说明: 控制器发起的状态切换使用条件更新，外部停止/取消请求不会被覆盖
// ==========================================

use crate::config::ImportSettings;
use crate::domain::{ImportJob, ImportSnapshot, ImportStatus};
use crate::importer::codec::{open_for_chunked_read, open_for_write};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::processing_phase::{ProcessingOutcome, ProcessingPhase};
use crate::importer::row_action::{ActionRegistry, RowActionResolver};
use crate::importer::validation_phase::{ValidationOutcome, ValidationPhase};
use crate::repository::ImportJobStore;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::instrument;

/// 一次运行请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    /// 任务级默认动作（行动作列为空时使用）
    pub default_action: Option<String>,
}

impl JobDescriptor {
    pub fn new(job_id: impl Into<String>, default_action: Option<&str>) -> Self {
        Self {
            job_id: job_id.into(),
            default_action: default_action.map(str::to_string),
        }
    }
}

/// 运行结局
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    Canceled,
    Stopped,
    Invalid,
    Processed,
    ProcessFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub job: ImportSnapshot,
}

pub struct JobController {
    store: Arc<dyn ImportJobStore>,
    data_store: Arc<Mutex<Connection>>,
    registry: Arc<ActionRegistry>,
    settings: ImportSettings,
}

impl JobController {
    /// 创建控制器
    ///
    /// # 参数
    /// - store: 任务库
    /// - data_store: 业务数据库（处理阶段事务所在的库，须与任务库分开）
    /// - registry: 动作注册表
    /// - settings: 运行参数
    pub fn new(
        store: Arc<dyn ImportJobStore>,
        data_store: Arc<Mutex<Connection>>,
        registry: Arc<ActionRegistry>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            store,
            data_store,
            registry,
            settings,
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn ImportJobStore> {
        &self.store
    }

    /// 运行一个导入任务（阻塞）
    #[instrument(skip(self), fields(job_id = %descriptor.job_id))]
    pub fn run(&self, descriptor: &JobDescriptor) -> ImportResult<RunSummary> {
        let mut job = self.store.load(&descriptor.job_id)?;

        match job.status {
            ImportStatus::Canceled => {
                tracing::info!("任务已取消，跳过运行");
                return Ok(Self::summary(RunOutcome::Canceled, &job));
            }
            ImportStatus::Uploaded => {}
            status => {
                return Err(ImportError::InvalidState {
                    job_id: job.id.clone(),
                    status,
                })
            }
        }

        let imports_dir = self.settings.imports_dir();
        let input_path = job.input_path(&imports_dir);
        let output_path = job.output_path(&imports_dir);
        let sheet_name = self.settings.sheet_name.as_str();

        let mut source = open_for_chunked_read(&input_path, job.format, sheet_name)?;
        job.reset_counters(source.total_rows());
        self.store.save_progress(&job)?;

        let mut writer = open_for_write(&input_path, &output_path, job.format, sheet_name)?;
        writer.flush()?;

        tracing::info!(
            total_rows = source.total_rows(),
            format = %job.format,
            "开始导入"
        );

        // UPLOADED → VALIDATING
        if !self.transition(&mut job, ImportStatus::Uploaded, ImportStatus::Validating)? {
            return self.settle_external(&mut job);
        }

        let mut resolver = RowActionResolver::new(
            Arc::clone(&self.registry),
            &self.settings.action_column,
            descriptor.default_action.as_deref(),
        );

        let validation = ValidationPhase::new(
            self.store.as_ref(),
            self.settings.chunk_size,
            &self.settings.validation_column,
        )
        .run(&mut job, source.as_mut(), writer.as_mut(), &mut resolver)?;

        match validation.outcome {
            ValidationOutcome::Stopped => {
                tracing::info!(validated = validation.validated_rows, "任务已停止");
                return Ok(Self::summary(RunOutcome::Stopped, &job));
            }
            ValidationOutcome::Invalid => {
                if !self.transition(&mut job, ImportStatus::Validating, ImportStatus::Invalid)? {
                    return self.settle_external(&mut job);
                }
                tracing::info!(errors = validation.errors_count, "校验未通过");
                return Ok(Self::summary(RunOutcome::Invalid, &job));
            }
            ValidationOutcome::Valid => {
                if !self.transition(&mut job, ImportStatus::Validating, ImportStatus::Processing)? {
                    return self.settle_external(&mut job);
                }
            }
        }

        let processing = ProcessingPhase::new(
            self.store.as_ref(),
            Arc::clone(&self.data_store),
            self.settings.chunk_size,
            self.settings.use_transaction,
        )
        .run(&mut job, source.as_mut(), writer.as_mut(), &mut resolver)?;

        let outcome = match processing.outcome {
            ProcessingOutcome::Processed => RunOutcome::Processed,
            ProcessingOutcome::Failed { reason } => RunOutcome::ProcessFailed { reason },
        };

        Ok(Self::summary(outcome, &job))
    }

    /// 条件切换状态，成功时同步到内存中的任务
    fn transition(
        &self,
        job: &mut ImportJob,
        expected: ImportStatus,
        new: ImportStatus,
    ) -> ImportResult<bool> {
        let switched = self.store.compare_and_set_status(&job.id, expected, new)?;
        if switched {
            job.status = new;
        }
        Ok(switched)
    }

    /// 状态切换被外部请求抢先时，按最新状态收尾
    fn settle_external(&self, job: &mut ImportJob) -> ImportResult<RunSummary> {
        let live_status = self.store.refresh_status(&job.id)?;
        job.status = live_status;

        tracing::info!(status = %live_status, "状态已被外部修改");

        match live_status {
            ImportStatus::Canceled => Ok(Self::summary(RunOutcome::Canceled, job)),
            ImportStatus::Stopped => Ok(Self::summary(RunOutcome::Stopped, job)),
            status => Err(ImportError::InvalidState {
                job_id: job.id.clone(),
                status,
            }),
        }
    }

    fn summary(outcome: RunOutcome, job: &ImportJob) -> RunSummary {
        RunSummary {
            outcome,
            job: job.snapshot(),
        }
    }
}
