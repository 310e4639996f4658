// ==========================================
// 导入管道集成测试
// ==========================================
// 覆盖: 校验/处理两阶段、停止/取消、事务回滚、计数器单调性、Excel 结果
// ==========================================


use rust_xlsxwriter::Workbook;
use sheet_import::domain::ImportFilter;
use sheet_import::importer::{ExcelRowSource, HandlerError, RowSource};
use sheet_import::repository::RepositoryResult;
use sheet_import::{
    ImportError, ImportJob, ImportJobRepository, ImportJobStore, ImportStatus, JobDescriptor,
    RowValues, RunOutcome,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use test_helpers::{as_strs, key_name_lines, key_value_registry, read_csv_rows, TestEnv};

// ==========================================
// 测试用 store 包装
// ==========================================

/// 第 N 次刷新状态时模拟外部停止请求
struct StopOnRefreshStore {
    inner: Arc<ImportJobRepository>,
    stop_on: usize,
    refreshes: AtomicUsize,
}

/// 记录每次写回的计数器
struct RecordingStore {
    inner: Arc<ImportJobRepository>,
    writes: Mutex<Vec<(Option<i64>, Option<i64>, Option<i64>)>>,
}

impl RecordingStore {
    fn record(&self, job: &ImportJob) {
        self.writes
            .lock()
            .unwrap()
            .push((job.validated_rows, job.errors_count, job.processed_rows));
    }
}

impl ImportJobStore for StopOnRefreshStore {
    fn insert(&self, job: &ImportJob) -> RepositoryResult<()> {
        self.inner.insert(job)
    }

    fn load(&self, id: &str) -> RepositoryResult<ImportJob> {
        self.inner.load(id)
    }

    fn find(&self, id: &str) -> RepositoryResult<Option<ImportJob>> {
        self.inner.find(id)
    }

    fn save(&self, job: &ImportJob) -> RepositoryResult<()> {
        self.inner.save(job)
    }

    fn save_progress(&self, job: &ImportJob) -> RepositoryResult<()> {
        self.inner.save_progress(job)
    }

    fn refresh_status(&self, id: &str) -> RepositoryResult<ImportStatus> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.stop_on {
            self.inner
                .compare_and_set_status(id, ImportStatus::Validating, ImportStatus::Stopped)?;
        }
        self.inner.refresh_status(id)
    }

    fn compare_and_set_status(
        &self,
        id: &str,
        expected: ImportStatus,
        new: ImportStatus,
    ) -> RepositoryResult<bool> {
        self.inner.compare_and_set_status(id, expected, new)
    }

    fn list(&self, filter: &ImportFilter) -> RepositoryResult<Vec<ImportJob>> {
        self.inner.list(filter)
    }
}

impl ImportJobStore for RecordingStore {
    fn insert(&self, job: &ImportJob) -> RepositoryResult<()> {
        self.inner.insert(job)
    }

    fn load(&self, id: &str) -> RepositoryResult<ImportJob> {
        self.inner.load(id)
    }

    fn find(&self, id: &str) -> RepositoryResult<Option<ImportJob>> {
        self.inner.find(id)
    }

    fn save(&self, job: &ImportJob) -> RepositoryResult<()> {
        self.record(job);
        self.inner.save(job)
    }

    fn save_progress(&self, job: &ImportJob) -> RepositoryResult<()> {
        self.record(job);
        self.inner.save_progress(job)
    }

    fn refresh_status(&self, id: &str) -> RepositoryResult<ImportStatus> {
        self.inner.refresh_status(id)
    }

    fn compare_and_set_status(
        &self,
        id: &str,
        expected: ImportStatus,
        new: ImportStatus,
    ) -> RepositoryResult<bool> {
        self.inner.compare_and_set_status(id, expected, new)
    }

    fn list(&self, filter: &ImportFilter) -> RepositoryResult<Vec<ImportJob>> {
        self.inner.list(filter)
    }
}

// ==========================================
// 两阶段主流程
// ==========================================

#[test]
fn test_five_rows_chunk_two_all_processed() {
    let env = TestEnv::new(2).unwrap();
    let api = env.api();
    let lines = key_name_lines(5);
    let job = env.upload_csv(&api, &as_strs(&lines));

    let summary = api.start_import(&job.id, Some("put")).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Processed);
    assert_eq!(summary.job.status, ImportStatus::Processed);
    assert_eq!(summary.job.total_rows, Some(5));
    assert_eq!(summary.job.validated_rows, Some(5));
    assert_eq!(summary.job.errors_count, Some(0));
    assert_eq!(summary.job.processed_rows, Some(5));

    // 任务库中的状态与返回一致
    let stored = api.get_status(&job.id).unwrap();
    assert_eq!(stored.status, ImportStatus::Processed);
    assert_eq!(stored.processed_rows, Some(5));

    // 每行追加 status=ok
    let rows = read_csv_rows(&env.output_path(&job));
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.get("status") == Some("ok")));
    assert_eq!(rows[4].get("key"), Some("K5"));

    assert_eq!(env.record_count(), 5);
}

#[test]
fn test_missing_required_field_marks_invalid() {
    let env = TestEnv::new(100).unwrap();
    let api = env.api();
    let job = env.upload_csv(&api, &["key,name", "K1,甲", ",乙", "K3,丙"]);

    let summary = api.start_import(&job.id, Some("put")).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Invalid);
    assert_eq!(summary.job.status, ImportStatus::Invalid);
    assert_eq!(summary.job.errors_count, Some(1));
    assert_eq!(summary.job.validated_rows, Some(3));
    assert_eq!(summary.job.processed_rows, None);

    let rows = read_csv_rows(&env.output_path(&job));
    assert_eq!(rows[0].get("row_validation"), Some(""));
    assert_eq!(rows[1].get("row_validation"), Some("key 为必填项"));
    assert_eq!(rows[2].get("row_validation"), Some(""));

    // 校验未通过不进入处理
    assert_eq!(env.record_count(), 0);
}

#[test]
fn test_all_rows_invalid() {
    let env = TestEnv::new(2).unwrap();
    let api = env.api();
    let job = env.upload_csv(&api, &["key,name", ",a", ",b", ",c", ",d"]);

    let summary = api.start_import(&job.id, Some("put")).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Invalid);
    assert_eq!(summary.job.errors_count, summary.job.validated_rows);
    assert_eq!(summary.job.errors_count, Some(4));
    assert_eq!(env.record_count(), 0);
}

#[test]
fn test_inert_and_unbound_rows() {
    let env = TestEnv::new(2).unwrap();
    let api = env.api();
    let job = env.upload_csv(
        &api,
        &[
            "row_action,key,name",
            "put,K1,a",
            ",K2,b",   // 无动作（未指定默认动作）
            ",,",      // 空白行
            "DELETE,K9,x",
            "noop,K5,y", // 动作未绑定规则与处理器
        ],
    );

    let summary = api.start_import(&job.id, None).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Processed);
    assert_eq!(summary.job.total_rows, Some(5));
    assert_eq!(summary.job.validated_rows, Some(3));
    assert_eq!(summary.job.errors_count, Some(0));
    assert_eq!(summary.job.processed_rows, Some(2));

    let rows = read_csv_rows(&env.output_path(&job));
    assert_eq!(rows[0].get("status"), Some("ok"));
    assert_eq!(rows[1].get("status"), Some(""));
    assert_eq!(rows[3].get("status"), Some("missing"));
    assert_eq!(rows[4].get("status"), Some(""));
    assert_eq!(env.record_count(), 1);
}

#[test]
fn test_handler_failure_rolls_back() {
    let env = TestEnv::new(2).unwrap();
    let registry = key_value_registry().with_handler(
        "boom",
        |_conn: &rusqlite::Connection, row: &RowValues| -> Result<RowValues, HandlerError> {
            Err(HandlerError::InvalidRow(format!(
                "拒绝处理 {}",
                row.get("key").unwrap_or("")
            )))
        },
    );
    let controller = env.controller(env.repository(), registry);
    let api = sheet_import::ImportApi::new(controller);

    let job = env.upload_csv(
        &api,
        &[
            "row_action,key",
            "put,K1",
            "put,K2",
            "put,K3",
            "put,K4",
            "boom,K5",
            "put,K6",
        ],
    );

    let summary = api.start_import(&job.id, None).unwrap();

    match &summary.outcome {
        RunOutcome::ProcessFailed { reason } => assert!(reason.contains("K5")),
        other => panic!("Expected ProcessFailed, got {:?}", other),
    }
    assert_eq!(summary.job.status, ImportStatus::ProcessFailed);
    // 第一个分块（3 行）已写回，失败分块不计入
    assert_eq!(summary.job.processed_rows, Some(3));
    assert_eq!(api.get_status(&job.id).unwrap().processed_rows, Some(3));

    // 整体回滚
    assert_eq!(env.record_count(), 0);
    assert!(env.output_path(&job).exists());
}

#[test]
fn test_handler_failure_restores_existing_records() {
    let env = TestEnv::new(2).unwrap();
    env.seed_record("K1", r#"{"key":"K1","name":"原值"}"#, "2024-01-01 00:00:00");
    env.seed_record("K2", r#"{"key":"K2","name":"保留"}"#, "2024-01-02 00:00:00");

    let registry = key_value_registry().with_handler(
        "boom",
        |_conn: &rusqlite::Connection, _row: &RowValues| -> Result<RowValues, HandlerError> {
            Err(HandlerError::InvalidRow("boom".to_string()))
        },
    );
    let api = sheet_import::ImportApi::new(env.controller(env.repository(), registry));
    let job = env.upload_csv(
        &api,
        &[
            "row_action,key,name",
            "put,K1,改写",
            "delete,K2,",
            "put,K3,新增",
            "boom,K4,",
        ],
    );

    let summary = api.start_import(&job.id, None).unwrap();

    assert!(matches!(summary.outcome, RunOutcome::ProcessFailed { .. }));
    // 更新、删除、新增全部回滚
    assert_eq!(
        env.stored_record("K1"),
        Some((
            r#"{"key":"K1","name":"原值"}"#.to_string(),
            "2024-01-01 00:00:00".to_string()
        ))
    );
    assert_eq!(
        env.stored_record("K2"),
        Some((
            r#"{"key":"K2","name":"保留"}"#.to_string(),
            "2024-01-02 00:00:00".to_string()
        ))
    );
    assert_eq!(env.stored_record("K3"), None);
    assert_eq!(env.record_count(), 2);
}

#[test]
fn test_without_transaction_keeps_rows_before_failure() {
    let mut env = TestEnv::new(2).unwrap();
    env.settings.use_transaction = false;

    let registry = key_value_registry().with_handler(
        "boom",
        |_conn: &rusqlite::Connection, _row: &RowValues| -> Result<RowValues, HandlerError> {
            Err(HandlerError::InvalidRow("boom".to_string()))
        },
    );
    let api = sheet_import::ImportApi::new(env.controller(env.repository(), registry));
    let job = env.upload_csv(&api, &["row_action,key", "put,K1", "put,K2", "boom,K3"]);

    let summary = api.start_import(&job.id, None).unwrap();

    assert!(matches!(summary.outcome, RunOutcome::ProcessFailed { .. }));
    assert_eq!(env.record_count(), 2);
}

// ==========================================
// 停止 / 取消
// ==========================================

#[test]
fn test_stop_mid_validation() {
    let env = TestEnv::new(2).unwrap();
    let store = Arc::new(StopOnRefreshStore {
        inner: env.repository(),
        stop_on: 2,
        refreshes: AtomicUsize::new(0),
    });
    let api = sheet_import::ImportApi::new(env.controller(store, key_value_registry()));

    // 第 9 行缺少键，停止后不应被校验
    let mut lines = key_name_lines(10);
    lines[9] = ",name-9".to_string();
    let job = env.upload_csv(&api, &as_strs(&lines));

    let summary = api.start_import(&job.id, Some("put")).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(summary.job.status, ImportStatus::Stopped);
    // 分块 [0,3) + [3,5)
    assert_eq!(summary.job.validated_rows, Some(5));
    assert_eq!(summary.job.errors_count, Some(0));
    assert_eq!(summary.job.processed_rows, None);

    let stored = api.get_status(&job.id).unwrap();
    assert_eq!(stored.status, ImportStatus::Stopped);
    assert_eq!(stored.validated_rows, Some(5));

    let rows = read_csv_rows(&env.output_path(&job));
    assert!(rows.iter().all(|r| r.get("row_validation").is_none()));
    assert_eq!(env.record_count(), 0);
}

#[test]
fn test_canceled_job_never_opens_artifacts() {
    let env = TestEnv::new(2).unwrap();
    let api = env.api();
    let lines = key_name_lines(3);
    let job = env.upload_csv(&api, &as_strs(&lines));

    api.cancel(&job.id, None).unwrap();
    let summary = api.start_import(&job.id, Some("put")).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Canceled);
    assert_eq!(summary.job.status, ImportStatus::Canceled);
    assert_eq!(summary.job.total_rows, None);
    assert!(!env.output_path(&job).exists());
}

#[test]
fn test_terminal_job_cannot_be_restarted() {
    let env = TestEnv::new(2).unwrap();
    let controller = env.controller(env.repository(), key_value_registry());
    let api = sheet_import::ImportApi::new(Arc::clone(&controller));
    let lines = key_name_lines(2);
    let job = env.upload_csv(&api, &as_strs(&lines));

    let descriptor = JobDescriptor::new(job.id.clone(), Some("put"));
    controller.run(&descriptor).unwrap();

    let err = controller.run(&descriptor).unwrap_err();
    assert!(matches!(
        err,
        ImportError::InvalidState {
            status: ImportStatus::Processed,
            ..
        }
    ));
}

#[test]
fn test_unknown_job() {
    let env = TestEnv::new(2).unwrap();
    let controller = env.controller(env.repository(), key_value_registry());
    let err = controller
        .run(&JobDescriptor::new("missing-job", Some("put")))
        .unwrap_err();
    assert!(matches!(err, ImportError::JobNotFound(_)));
}

// ==========================================
// 计数器
// ==========================================

#[test]
fn test_counters_never_decrease() {
    let env = TestEnv::new(2).unwrap();
    let store = Arc::new(RecordingStore {
        inner: env.repository(),
        writes: Mutex::new(Vec::new()),
    });
    let dyn_store: Arc<dyn ImportJobStore> = Arc::clone(&store) as Arc<dyn ImportJobStore>;
    let api = sheet_import::ImportApi::new(env.controller(dyn_store, key_value_registry()));
    let lines = key_name_lines(7);
    let job = env.upload_csv(&api, &as_strs(&lines));

    let summary = api.start_import(&job.id, Some("put")).unwrap();
    assert_eq!(summary.job.processed_rows, Some(7));

    let writes = store.writes.lock().unwrap();
    // 首次写回为运行开始时的重置
    assert_eq!(writes[0], (None, None, None));

    let mut last = (0, 0, 0);
    for (validated, errors, processed) in writes.iter().skip(1) {
        let current = (
            validated.unwrap_or(0),
            errors.unwrap_or(0),
            processed.unwrap_or(0),
        );
        assert!(current.0 >= last.0, "validated_rows 回退: {:?}", *writes);
        assert!(current.1 >= last.1, "errors_count 回退: {:?}", *writes);
        assert!(current.2 >= last.2, "processed_rows 回退: {:?}", *writes);
        last = current;
    }
    assert_eq!(last, (7, 0, 7));
}

// ==========================================
// Excel
// ==========================================

#[test]
fn test_xlsx_input_produces_xlsx_result() {
    let env = TestEnv::new(2).unwrap();
    let api = env.api();

    let upload = env.dir.path().join("upload.xlsx");
    {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("DATA").unwrap();
        sheet.write_string(0, 0, "key").unwrap();
        sheet.write_string(0, 1, "name").unwrap();
        for i in 1..=3u32 {
            sheet.write_string(i, 0, format!("K{}", i)).unwrap();
            sheet.write_string(i, 1, format!("name-{}", i)).unwrap();
        }
        workbook.save(&upload).unwrap();
    }

    let job = api
        .register_upload(&upload, "Orders.XLSX", Some("Weekly"), None)
        .unwrap();
    assert_eq!(job.tag.as_deref(), Some("weekly"));

    let summary = api.start_import(&job.id, Some("put")).unwrap();
    assert_eq!(summary.outcome, RunOutcome::Processed);
    assert_eq!(summary.job.processed_rows, Some(3));

    let output = env.output_path(&job);
    assert!(output.to_string_lossy().ends_with(".result.xlsx"));

    let mut result = ExcelRowSource::open(&output, "DATA").unwrap();
    let rows = result.rows(0, 10).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.get("status") == Some("ok")));
    assert_eq!(env.record_count(), 3);
}
