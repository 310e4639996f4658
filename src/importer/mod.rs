// ==========================================
// 表格批量导入管道 - 导入层
// ==========================================
// 职责: 表格文件分块校验、事务内逐行处理、结果文件写出
// 支持: Excel (.xlsx/.xls), CSV (.csv)
// ==========================================

// 模块声明
pub mod builtin_actions;
pub mod chunk_cursor;
pub mod codec;
pub mod error;
pub mod file_parser;
pub mod job_controller;
pub mod output_writer;
pub mod processing_phase;
pub mod row_action;
pub mod validation_phase;
pub mod validation_rules;
pub mod worker;

// 重导出核心类型
pub use builtin_actions::{
    ensure_records_table, register_key_value_actions, DeleteRecordHandler, PutRecordHandler,
};
pub use chunk_cursor::{ChunkCursor, ChunkWindow};
pub use codec::{open_for_chunked_read, open_for_write, RowSource, RowWriter};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvRowSource, ExcelRowSource};
pub use job_controller::{JobController, JobDescriptor, RunOutcome, RunSummary};
pub use output_writer::OutputWorkbook;
pub use processing_phase::{ProcessingOutcome, ProcessingPhase, ProcessingReport};
pub use row_action::{ActionRegistry, HandlerError, RowActionResolver, RowHandler};
pub use validation_phase::{ValidationOutcome, ValidationPhase, ValidationReport};
pub use validation_rules::{FieldRule, FieldViolation, RuleSet};
pub use worker::ImportWorker;
