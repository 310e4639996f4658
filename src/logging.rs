// ==========================================
// 表格批量导入管道 - 日志初始化
// ==========================================
// 环境变量:
// - RUST_LOG: 过滤器（默认 info，例如 sheet_import::importer=debug）
// - SHEET_IMPORT_LOG_FORMAT: text（默认）/ json
// 说明: 分块日志带 job_id、chunk_start 等结构化字段，json 格式便于汇入日志平台
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量
pub const LOG_FORMAT_ENV: &str = "SHEET_IMPORT_LOG_FORMAT";

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// 解析格式名（大小写不敏感，未知值按 text 处理）
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or(LogFormat::Text)
    }
}

/// 初始化命令行日志
///
/// ```no_run
/// sheet_import::logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(true);

    let installed = match LogFormat::from_env() {
        LogFormat::Json => builder
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
        LogFormat::Text => builder.with_line_number(true).try_init(),
    };

    if let Err(e) = installed {
        eprintln!("日志初始化失败: {}", e);
    }
}

/// 测试日志：导入模块输出 debug 级分块日志，写入测试捕获的输出
///
/// 可重复调用，只有第一次生效。
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sheet_import=debug"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
    }

    #[test]
    fn test_init_test_is_idempotent() {
        init_test();
        init_test();
        tracing::debug!(job_id = "J001", "日志已初始化");
    }
}
