// ==========================================
// 表格批量导入管道 - 表格读写接口
// ==========================================
// 职责: 分块读取输入表格 / 按行覆盖写出结果表格
// 支持: CSV (.csv) / Excel (.xlsx/.xls)
// ==========================================

use crate::domain::{ImportFormat, RowValues};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{CsvRowSource, ExcelRowSource};
use crate::importer::output_writer::OutputWorkbook;
use std::path::Path;

/// 输入表格（按 0 基数据行下标读取，不含表头）
pub trait RowSource: Send {
    /// 表头（已去除首尾空白）
    fn headers(&self) -> &[String];

    /// 数据行总数
    fn total_rows(&self) -> usize;

    /// 读取 [start, start + len) 范围内的行（越界部分截断）
    fn rows(&mut self, start: usize, len: usize) -> ImportResult<Vec<RowValues>>;

    /// 回到第 0 行
    fn rewind(&mut self) -> ImportResult<()>;
}

/// 结果表格
pub trait RowWriter: Send {
    /// 覆盖指定行（可带新列，新列追加到表头末尾）
    fn write_row(&mut self, index: usize, row: &RowValues) -> ImportResult<()>;

    /// 写出到结果文件（未覆盖的行保持输入内容）
    fn flush(&mut self) -> ImportResult<()>;

    fn output_path(&self) -> &Path;
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

/// 打开输入表格用于分块读取
///
/// # 参数
/// - path: 输入文件
/// - format: 文件格式
/// - sheet_name: Excel 优先读取的工作表（不存在时取第一个）
pub fn open_for_chunked_read(
    path: &Path,
    format: ImportFormat,
    sheet_name: &str,
) -> ImportResult<Box<dyn RowSource>> {
    ensure_exists(path)?;

    match format {
        ImportFormat::Csv => Ok(Box::new(CsvRowSource::open(path)?)),
        ImportFormat::Xlsx | ImportFormat::Xls => {
            Ok(Box::new(ExcelRowSource::open(path, sheet_name)?))
        }
    }
}

/// 打开结果表格（以输入表格为底稿）
///
/// xls 输入写出为 xlsx。
pub fn open_for_write(
    input: &Path,
    output: &Path,
    format: ImportFormat,
    sheet_name: &str,
) -> ImportResult<Box<dyn RowWriter>> {
    ensure_exists(input)?;
    Ok(Box::new(OutputWorkbook::open(
        input, output, format, sheet_name,
    )?))
}
