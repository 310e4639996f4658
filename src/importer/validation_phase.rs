// ==========================================
// 表格批量导入管道 - 校验阶段
// ==========================================
// 职责: 分块校验全部行，失败行写入标注列
// 规则:
// - 无动作的行跳过，不计入 validated_rows
// - 分块结束: 刷新状态 → 累加计数 → 写回计数（不写状态）
// - 分块内有失败行时 flush 结果文件
// - 刷新到 STOPPED 时退出循环
// ==========================================

use crate::domain::{ImportJob, ImportStatus};
use crate::importer::chunk_cursor::ChunkCursor;
use crate::importer::codec::{RowSource, RowWriter};
use crate::importer::error::ImportResult;
use crate::importer::row_action::RowActionResolver;
use crate::importer::validation_rules::RuleSet;
use crate::repository::ImportJobStore;

/// 校验结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// 无失败行
    Valid,
    /// 存在失败行
    Invalid,
    /// 被外部停止
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub outcome: ValidationOutcome,
    pub validated_rows: i64,
    pub errors_count: i64,
    pub chunks: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors_count == 0
    }
}

pub struct ValidationPhase<'a> {
    store: &'a dyn ImportJobStore,
    chunk_size: usize,
    validation_column: String,
}

impl<'a> ValidationPhase<'a> {
    pub fn new(store: &'a dyn ImportJobStore, chunk_size: usize, validation_column: &str) -> Self {
        Self {
            store,
            chunk_size,
            validation_column: validation_column.to_string(),
        }
    }

    /// 执行校验
    ///
    /// # 参数
    /// - job: 当前任务（状态应已切换为 VALIDATING）
    /// - source: 输入表格
    /// - writer: 结果表格
    /// - resolver: 本次运行的动作解析器
    pub fn run(
        &self,
        job: &mut ImportJob,
        source: &mut dyn RowSource,
        writer: &mut dyn RowWriter,
        resolver: &mut RowActionResolver,
    ) -> ImportResult<ValidationReport> {
        job.status = ImportStatus::Validating;
        job.validated_rows = Some(0);
        job.errors_count = Some(0);
        self.store.save_progress(job)?;

        let mut chunks = 0;
        let mut stopped = false;

        for window in ChunkCursor::new(source.total_rows(), self.chunk_size) {
            let rows = source.rows(window.start_index, window.length)?;
            let mut chunk_validated = 0;
            let mut chunk_errors = 0;

            // 跳过与前一窗口重叠的行
            for (offset, row) in rows.into_iter().enumerate().skip(window.overlap) {
                let index = window.start_index + offset;

                let Some(action) = resolver.resolve_action(&row) else {
                    continue;
                };
                chunk_validated += 1;

                let Some(rules) = resolver.rules_for(&action) else {
                    continue;
                };
                let violations = rules.validate(&row);
                if violations.is_empty() {
                    continue;
                }

                chunk_errors += 1;
                let mut annotated = row;
                annotated.set(self.validation_column.as_str(), RuleSet::annotation(&violations));
                writer.write_row(index, &annotated)?;
            }

            chunks += 1;
            let live_status = self.store.refresh_status(&job.id)?;
            job.status = live_status;
            job.add_validation_progress(chunk_validated, chunk_errors);
            self.store.save_progress(job)?;

            tracing::debug!(
                job_id = %job.id,
                chunk_start = window.start_index,
                validated = chunk_validated,
                errors = chunk_errors,
                status = %live_status,
                "校验分块完成"
            );

            if chunk_errors > 0 {
                writer.flush()?;
            }

            if live_status == ImportStatus::Stopped {
                stopped = true;
                break;
            }
        }

        let validated_rows = job.validated_rows.unwrap_or(0);
        let errors_count = job.errors_count.unwrap_or(0);
        let outcome = if stopped {
            ValidationOutcome::Stopped
        } else if errors_count > 0 {
            ValidationOutcome::Invalid
        } else {
            ValidationOutcome::Valid
        };

        tracing::info!(
            job_id = %job.id,
            validated = validated_rows,
            errors = errors_count,
            chunks,
            outcome = ?outcome,
            "校验阶段结束"
        );

        Ok(ValidationReport {
            outcome,
            validated_rows,
            errors_count,
            chunks,
        })
    }
}
