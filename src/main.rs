// ==========================================
// 表格批量导入管道 - 命令行入口
// ==========================================
// 用法:
//   sheet-import <file> [default_action] [db_path] [data_db_path]
// 说明: 登记文件 → 使用内置 put/delete 动作运行 → 输出最终快照（JSON）
// ==========================================

use anyhow::Context;
use sheet_import::config::{ConfigManager, ImportConfigReader};
use sheet_import::db::open_data_store;
use sheet_import::importer::builtin_actions::DEFAULT_KEY_COLUMN;
use sheet_import::importer::{ensure_records_table, register_key_value_actions};
use sheet_import::{
    logging, ActionRegistry, ImportApi, ImportJobRepository, ImportJobStore, ImportWorker,
    JobController, JobDescriptor,
};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let file = args
        .next()
        .context("用法: sheet-import <file> [default_action] [db_path] [data_db_path]")?;
    let default_action = args
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let db_path = args
        .next()
        .unwrap_or_else(|| "sheet_import_jobs.db".to_string());
    let data_db_path = args
        .next()
        .unwrap_or_else(|| "sheet_import_data.db".to_string());

    tracing::info!("==================================================");
    tracing::info!("{} v{}", sheet_import::APP_NAME, sheet_import::VERSION);
    tracing::info!("任务库: {}, 数据库: {}", db_path, data_db_path);
    tracing::info!("==================================================");

    let settings = ConfigManager::new(&db_path)?.load_settings()?;
    let store: Arc<dyn ImportJobStore> = Arc::new(ImportJobRepository::new(&db_path)?);

    let data_store = open_data_store(&data_db_path)?;
    {
        let conn = data_store
            .lock()
            .map_err(|e| anyhow::anyhow!("数据库锁获取失败: {}", e))?;
        ensure_records_table(&conn)?;
    }

    let registry = register_key_value_actions(
        ActionRegistry::new(),
        DEFAULT_KEY_COLUMN,
        &[
            settings.action_column.as_str(),
            settings.validation_column.as_str(),
        ],
    );

    let controller = Arc::new(JobController::new(
        store,
        data_store,
        Arc::new(registry),
        settings.clone(),
    ));
    let api = ImportApi::new(Arc::clone(&controller));

    let path = Path::new(&file);
    let original_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file.as_str());
    let job = api.register_upload(path, original_name, None, None)?;

    let worker = ImportWorker::new(controller, settings.max_concurrent_jobs);
    let summary = worker
        .submit(JobDescriptor::new(job.id.clone(), default_action.as_deref()))
        .await??;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
