// ==========================================
// 表格批量导入管道 - 领域类型定义
// ==========================================
// 职责: 导入任务状态机、文件格式
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 导入任务状态 (Import Status)
// ==========================================
// 状态流转:
// UPLOADING → UPLOADED → {CANCELED | VALIDATING}
// VALIDATING → {STOPPED | INVALID | PROCESSING}
// PROCESSING → {PROCESSED | PROCESS_FAILED}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Uploading,     // 上传中
    Uploaded,      // 已上传，等待执行
    Canceled,      // 校验开始前被取消
    Validating,    // 校验中
    Stopped,       // 校验过程中被停止
    Invalid,       // 校验未通过
    Processing,    // 校验通过，处理中
    Processed,     // 处理成功
    ProcessFailed, // 处理失败（已回滚）
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Uploading => "UPLOADING",
            ImportStatus::Uploaded => "UPLOADED",
            ImportStatus::Canceled => "CANCELED",
            ImportStatus::Validating => "VALIDATING",
            ImportStatus::Stopped => "STOPPED",
            ImportStatus::Invalid => "INVALID",
            ImportStatus::Processing => "PROCESSING",
            ImportStatus::Processed => "PROCESSED",
            ImportStatus::ProcessFailed => "PROCESS_FAILED",
        }
    }

    /// 是否为终态（单次运行内不再流转）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportStatus::Canceled
                | ImportStatus::Stopped
                | ImportStatus::Invalid
                | ImportStatus::Processed
                | ImportStatus::ProcessFailed
        )
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "UPLOADING" => Ok(ImportStatus::Uploading),
            "UPLOADED" => Ok(ImportStatus::Uploaded),
            "CANCELED" => Ok(ImportStatus::Canceled),
            "VALIDATING" => Ok(ImportStatus::Validating),
            "STOPPED" => Ok(ImportStatus::Stopped),
            "INVALID" => Ok(ImportStatus::Invalid),
            "PROCESSING" => Ok(ImportStatus::Processing),
            "PROCESSED" => Ok(ImportStatus::Processed),
            "PROCESS_FAILED" => Ok(ImportStatus::ProcessFailed),
            other => Err(format!("未知的导入状态: {}", other)),
        }
    }
}

// ==========================================
// 文件格式 (Import Format)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    Csv,
    Xlsx,
    Xls,
}

impl ImportFormat {
    /// 允许上传的格式
    pub const ALL: [ImportFormat; 3] = [ImportFormat::Xls, ImportFormat::Xlsx, ImportFormat::Csv];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportFormat::Csv => "csv",
            ImportFormat::Xlsx => "xlsx",
            ImportFormat::Xls => "xls",
        }
    }

    /// 根据扩展名识别格式（大小写不敏感）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_lowercase().as_str() {
            "csv" => Some(ImportFormat::Csv),
            "xlsx" => Some(ImportFormat::Xlsx),
            "xls" => Some(ImportFormat::Xls),
            _ => None,
        }
    }

    /// 结果文件扩展名
    ///
    /// 旧版 .xls 无法写出，结果统一为 .xlsx
    pub fn output_extension(&self) -> &'static str {
        match self {
            ImportFormat::Csv => "csv",
            ImportFormat::Xlsx | ImportFormat::Xls => "xlsx",
        }
    }

    /// 结果文件的 Content-Type
    pub fn output_content_type(&self) -> &'static str {
        match self {
            ImportFormat::Csv => "text/csv",
            ImportFormat::Xlsx | ImportFormat::Xls => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn is_excel(&self) -> bool {
        !matches!(self, ImportFormat::Csv)
    }
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImportFormat::from_extension(s).ok_or_else(|| format!("未知的文件格式: {}", s))
    }
}
