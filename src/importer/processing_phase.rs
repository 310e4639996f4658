// ==========================================
// 表格批量导入管道 - 处理阶段
// ==========================================
// 职责: 在单个数据库事务内逐行调用处理器，结果合并写回
// 规则:
// - 无动作/无处理器的行跳过，不计入 processed_rows
// - 任何一行失败 → 整体回滚 → PROCESS_FAILED
// - 进度写入任务库（不在数据事务内）
// ==========================================

use crate::domain::{ImportJob, ImportStatus};
use crate::importer::chunk_cursor::ChunkCursor;
use crate::importer::codec::{RowSource, RowWriter};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::row_action::RowActionResolver;
use crate::repository::ImportJobStore;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// 处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    Processed,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingReport {
    pub outcome: ProcessingOutcome,
    pub processed_rows: i64,
}

pub struct ProcessingPhase<'a> {
    store: &'a dyn ImportJobStore,
    data_store: Arc<Mutex<Connection>>,
    chunk_size: usize,
    use_transaction: bool,
}

impl<'a> ProcessingPhase<'a> {
    pub fn new(
        store: &'a dyn ImportJobStore,
        data_store: Arc<Mutex<Connection>>,
        chunk_size: usize,
        use_transaction: bool,
    ) -> Self {
        Self {
            store,
            data_store,
            chunk_size,
            use_transaction,
        }
    }

    /// 执行处理（仅在校验通过后调用）
    pub fn run(
        &self,
        job: &mut ImportJob,
        source: &mut dyn RowSource,
        writer: &mut dyn RowWriter,
        resolver: &mut RowActionResolver,
    ) -> ImportResult<ProcessingReport> {
        job.status = ImportStatus::Processing;
        job.processed_rows = Some(0);
        self.store.save(job)?;

        let result = source
            .rewind()
            .and_then(|_| self.run_in_data_store(job, source, writer, resolver));

        match result {
            Ok(()) => {
                job.status = ImportStatus::Processed;
                self.store.save(job)?;
                writer.flush()?;

                tracing::info!(
                    job_id = %job.id,
                    processed = job.processed_rows.unwrap_or(0),
                    "处理阶段完成"
                );

                Ok(ProcessingReport {
                    outcome: ProcessingOutcome::Processed,
                    processed_rows: job.processed_rows.unwrap_or(0),
                })
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(job_id = %job.id, error = %reason, "处理阶段失败，已回滚");

                job.status = ImportStatus::ProcessFailed;
                self.store.save(job)?;

                // 失败时仍写出结果文件供排查
                if let Err(flush_err) = writer.flush() {
                    tracing::warn!(job_id = %job.id, error = %flush_err, "结果文件写出失败");
                }

                Ok(ProcessingReport {
                    outcome: ProcessingOutcome::Failed { reason },
                    processed_rows: job.processed_rows.unwrap_or(0),
                })
            }
        }
    }

    fn run_in_data_store(
        &self,
        job: &mut ImportJob,
        source: &mut dyn RowSource,
        writer: &mut dyn RowWriter,
        resolver: &mut RowActionResolver,
    ) -> ImportResult<()> {
        let mut conn = self
            .data_store
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))?;

        if !self.use_transaction {
            return self.process_rows(&conn, job, source, writer, resolver);
        }

        let tx = conn
            .transaction()
            .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;

        match self.process_rows(&tx, job, source, writer, resolver) {
            Ok(()) => tx
                .commit()
                .map_err(|e| ImportError::DatabaseTransactionError(e.to_string())),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!(job_id = %job.id, error = %rollback_err, "事务回滚失败");
                }
                Err(e)
            }
        }
    }

    fn process_rows(
        &self,
        conn: &Connection,
        job: &mut ImportJob,
        source: &mut dyn RowSource,
        writer: &mut dyn RowWriter,
        resolver: &mut RowActionResolver,
    ) -> ImportResult<()> {
        for window in ChunkCursor::new(source.total_rows(), self.chunk_size) {
            let rows = source.rows(window.start_index, window.length)?;
            let mut chunk_processed = 0;

            for (offset, row) in rows.into_iter().enumerate().skip(window.overlap) {
                let index = window.start_index + offset;

                let Some(action) = resolver.resolve_action(&row) else {
                    continue;
                };
                let Some(handler) = resolver.handler_for(&action) else {
                    continue;
                };

                let result = handler
                    .process(conn, &row)
                    .map_err(|e| ImportError::HandlerFailed {
                        // 表格行号（含表头，1 基）
                        row_number: index + 2,
                        action: action.clone(),
                        message: e.to_string(),
                    })?;

                let mut merged = row;
                merged.merge(result);
                writer.write_row(index, &merged)?;
                chunk_processed += 1;
            }

            let live_status = self.store.refresh_status(&job.id)?;
            job.add_processed(chunk_processed);
            self.store.save_progress(job)?;

            tracing::debug!(
                job_id = %job.id,
                chunk_start = window.start_index,
                processed = chunk_processed,
                status = %live_status,
                "处理分块完成"
            );
        }

        Ok(())
    }
}
