// ==========================================
// 导入执行器并发测试
// ==========================================


use sheet_import::{ImportError, ImportStatus, ImportWorker, JobDescriptor, RunOutcome};
use std::sync::Arc;
use test_helpers::{as_strs, key_name_lines, key_value_registry, TestEnv};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_all_processes_jobs_concurrently() {
    let env = TestEnv::new(4).unwrap();
    let controller = env.controller(env.repository(), key_value_registry());
    let api = sheet_import::ImportApi::new(Arc::clone(&controller));

    // 三个任务的键互不重叠
    let mut descriptors = Vec::new();
    for batch in 0..3 {
        let mut lines = vec!["key,name".to_string()];
        for i in 0..10 {
            lines.push(format!("B{}-K{},name", batch, i));
        }
        let upload = env.write_upload(&format!("batch-{}.csv", batch), &as_strs(&lines));
        let job = api
            .register_upload(&upload, &format!("batch-{}.csv", batch), None, None)
            .unwrap();
        descriptors.push(JobDescriptor::new(job.id, Some("put")));
    }

    let worker = ImportWorker::new(controller, 2);
    let results = worker.run_all(descriptors.clone()).await;

    assert_eq!(results.len(), 3);
    for (result, descriptor) in results.iter().zip(&descriptors) {
        let summary = result.as_ref().unwrap();
        assert_eq!(summary.outcome, RunOutcome::Processed);
        assert_eq!(summary.job.id, descriptor.job_id);
        assert_eq!(summary.job.processed_rows, Some(10));
    }
    assert_eq!(env.record_count(), 30);
}

#[tokio::test]
async fn test_submit_reports_errors_per_job() {
    let env = TestEnv::new(2).unwrap();
    let controller = env.controller(env.repository(), key_value_registry());
    let api = sheet_import::ImportApi::new(Arc::clone(&controller));
    let lines = key_name_lines(3);
    let job = env.upload_csv(&api, &as_strs(&lines));

    let worker = ImportWorker::new(controller, 1);
    let ok = worker
        .submit(JobDescriptor::new(job.id.clone(), Some("put")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ok.job.status, ImportStatus::Processed);

    let missing = worker
        .submit(JobDescriptor::new("missing", Some("put")))
        .await
        .unwrap();
    assert!(matches!(missing, Err(ImportError::JobNotFound(_))));
}
