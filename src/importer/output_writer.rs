// ==========================================
// 表格批量导入管道 - 结果表格写出
// ==========================================
// 职责: 记录被覆盖的行，flush 时以输入表格为底稿整表重写
// 说明: 先写临时文件再 rename，下载方不会读到写了一半的文件
// ==========================================

use crate::domain::{ImportFormat, RowValues};
use crate::importer::codec::{open_for_chunked_read, RowSource, RowWriter};
use crate::importer::error::{ImportError, ImportResult};
use rust_xlsxwriter::Workbook;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Excel 单表行上限（含表头）
const EXCEL_MAX_ROWS: usize = 1_048_576;
/// Excel 单表列上限
const EXCEL_MAX_COLS: usize = 16_384;
/// flush 时重读输入的批大小
const FLUSH_BATCH_ROWS: usize = 1_000;

/// 可按数字写出的单元格值
///
/// 前导零（如 `007`）、正号、`inf`/`NaN` 等保持文本。
fn numeric_value(value: &str) -> Option<f64> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.") {
        return None;
    }
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub struct OutputWorkbook {
    input_path: PathBuf,
    output_path: PathBuf,
    input_format: ImportFormat,
    sheet_name: String,
    headers: Vec<String>,
    overrides: BTreeMap<usize, RowValues>,
}

impl OutputWorkbook {
    pub fn open(
        input: &Path,
        output: &Path,
        format: ImportFormat,
        sheet_name: &str,
    ) -> ImportResult<Self> {
        let source = open_for_chunked_read(input, format, sheet_name)?;

        Ok(Self {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            input_format: format,
            sheet_name: sheet_name.to_string(),
            headers: source.headers().to_vec(),
            overrides: BTreeMap::new(),
        })
    }

    /// 当前表头（输入表头 + 新增列）
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn partial_path(&self) -> PathBuf {
        let mut name = self
            .output_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".partial");
        self.output_path.with_file_name(name)
    }

    /// 按表头展开一行（缺失列补空）
    fn line_for(&self, index: usize, original: &RowValues) -> Vec<String> {
        let row = self.overrides.get(&index).unwrap_or(original);
        self.headers
            .iter()
            .map(|h| row.get(h).unwrap_or("").to_string())
            .collect()
    }

    /// 逐批回调输入行（已应用覆盖）
    fn for_each_line<F>(&self, source: &mut dyn RowSource, mut emit: F) -> ImportResult<()>
    where
        F: FnMut(usize, Vec<String>) -> ImportResult<()>,
    {
        let total = source.total_rows();
        let mut start = 0;
        while start < total {
            let batch = source.rows(start, FLUSH_BATCH_ROWS)?;
            if batch.is_empty() {
                break;
            }
            for (offset, row) in batch.iter().enumerate() {
                let index = start + offset;
                emit(index, self.line_for(index, row))?;
            }
            start += batch.len();
        }
        Ok(())
    }

    fn write_csv(&self, source: &mut dyn RowSource, target: &Path) -> ImportResult<()> {
        let mut writer = csv::Writer::from_path(target)
            .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
        writer
            .write_record(&self.headers)
            .map_err(|e| ImportError::FileWriteError(e.to_string()))?;

        self.for_each_line(source, |_, line| {
            writer
                .write_record(&line)
                .map_err(|e| ImportError::FileWriteError(e.to_string()))
        })?;

        writer
            .flush()
            .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
        Ok(())
    }

    fn write_xlsx(&self, source: &mut dyn RowSource, target: &Path) -> ImportResult<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.sheet_name)?;

        if self.headers.len() > EXCEL_MAX_COLS {
            tracing::warn!(
                columns = self.headers.len(),
                "结果列数超过 Excel 上限，超出部分被截断"
            );
        }

        for (col, header) in self.headers.iter().take(EXCEL_MAX_COLS).enumerate() {
            worksheet.write_string(0, col as u16, header.as_str())?;
        }

        let mut truncated = false;
        self.for_each_line(source, |index, line| {
            let row_num = index + 1;
            if row_num >= EXCEL_MAX_ROWS {
                truncated = true;
                return Ok(());
            }
            for (col, value) in line.iter().take(EXCEL_MAX_COLS).enumerate() {
                if value.is_empty() {
                    continue;
                }
                match numeric_value(value) {
                    Some(number) => worksheet.write_number(row_num as u32, col as u16, number)?,
                    None => worksheet.write_string(row_num as u32, col as u16, value.as_str())?,
                };
            }
            Ok(())
        })?;

        if truncated {
            tracing::warn!(
                output = %self.output_path.display(),
                "结果行数超过 Excel 上限，超出部分被截断"
            );
        }

        workbook.save(target)?;
        Ok(())
    }
}

impl RowWriter for OutputWorkbook {
    fn write_row(&mut self, index: usize, row: &RowValues) -> ImportResult<()> {
        for column in row.columns() {
            if !self.headers.iter().any(|h| h == column) {
                self.headers.push(column.to_string());
            }
        }
        self.overrides.insert(index, row.clone());
        Ok(())
    }

    fn flush(&mut self) -> ImportResult<()> {
        let mut source = open_for_chunked_read(&self.input_path, self.input_format, &self.sheet_name)?;

        if let Some(parent) = self.output_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
        }

        let partial = self.partial_path();
        let written = if self.input_format.is_excel() {
            self.write_xlsx(source.as_mut(), &partial)
        } else {
            self.write_csv(source.as_mut(), &partial)
        };

        if let Err(e) = written {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }

        fs::rename(&partial, &self.output_path)
            .map_err(|e| ImportError::FileWriteError(e.to_string()))?;

        tracing::debug!(
            output = %self.output_path.display(),
            overridden_rows = self.overrides.len(),
            "结果文件已写出"
        );
        Ok(())
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::file_parser::{CsvRowSource, ExcelRowSource};
    use calamine::{open_workbook_auto, Data, Reader};
    use tempfile::TempDir;

    fn write_input(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_flush_without_overrides_copies_input() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "in.csv", "key,name\nK1,甲\nK2,乙\n");
        let output = dir.path().join("out.csv");

        let mut writer = OutputWorkbook::open(&input, &output, ImportFormat::Csv, "DATA").unwrap();
        writer.flush().unwrap();

        let mut result = CsvRowSource::open(&output).unwrap();
        assert_eq!(result.total_rows(), 2);
        assert_eq!(result.rows(1, 1).unwrap()[0].get("name"), Some("乙"));
    }

    #[test]
    fn test_override_adds_columns_and_keeps_other_rows() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "in.csv", "key,name\nK1,甲\nK2,乙\nK3,丙\n");
        let output = dir.path().join("out.csv");

        let mut writer = OutputWorkbook::open(&input, &output, ImportFormat::Csv, "DATA").unwrap();
        let mut row = RowValues::from_pairs([("key", "K2"), ("name", "乙")]);
        row.set("row_validation", "name 不能为空");
        writer.write_row(1, &row).unwrap();
        writer.flush().unwrap();

        assert_eq!(writer.headers().last().map(String::as_str), Some("row_validation"));

        let mut result = CsvRowSource::open(&output).unwrap();
        let rows = result.rows(0, 10).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("row_validation"), Some(""));
        assert_eq!(rows[1].get("row_validation"), Some("name 不能为空"));
        assert_eq!(rows[2].get("name"), Some("丙"));
        assert!(!dir.path().join("out.csv.partial").exists());
    }

    #[test]
    fn test_xlsx_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.xlsx");
        {
            let mut workbook = Workbook::new();
            let sheet = workbook.add_worksheet();
            sheet.set_name("DATA").unwrap();
            sheet.write_string(0, 0, "key").unwrap();
            sheet.write_string(1, 0, "K1").unwrap();
            workbook.save(&input).unwrap();
        }
        let output = dir.path().join("out.xlsx");

        let mut writer = OutputWorkbook::open(&input, &output, ImportFormat::Xlsx, "DATA").unwrap();
        writer
            .write_row(0, &RowValues::from_pairs([("key", "K1"), ("status", "ok")]))
            .unwrap();
        writer.flush().unwrap();

        let mut result = ExcelRowSource::open(&output, "DATA").unwrap();
        let rows = result.rows(0, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("status"), Some("ok"));
    }

    #[test]
    fn test_duplicate_headers_survive_flush() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "in.csv", "key,note,note\nK1,first,second\n");
        let output = dir.path().join("out.csv");

        let mut writer = OutputWorkbook::open(&input, &output, ImportFormat::Csv, "DATA").unwrap();
        writer.flush().unwrap();

        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "key,note,note_2\nK1,first,second\n"
        );
    }

    #[test]
    fn test_numeric_value_detection() {
        assert_eq!(numeric_value("42"), Some(42.0));
        assert_eq!(numeric_value("-3.5"), Some(-3.5));
        assert_eq!(numeric_value("0.25"), Some(0.25));
        assert_eq!(numeric_value("0"), Some(0.0));
        assert_eq!(numeric_value("007"), None);
        assert_eq!(numeric_value("+1"), None);
        assert_eq!(numeric_value("inf"), None);
        assert_eq!(numeric_value("K1"), None);
        assert_eq!(numeric_value("2024-03-01"), None);
    }

    #[test]
    fn test_xlsx_output_keeps_numeric_cells() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.xlsx");
        {
            let mut workbook = Workbook::new();
            let sheet = workbook.add_worksheet();
            sheet.set_name("DATA").unwrap();
            sheet.write_string(0, 0, "key").unwrap();
            sheet.write_string(0, 1, "qty").unwrap();
            sheet.write_string(0, 2, "code").unwrap();
            sheet.write_string(1, 0, "K1").unwrap();
            sheet.write_number(1, 1, 12.5).unwrap();
            sheet.write_string(1, 2, "007").unwrap();
            workbook.save(&input).unwrap();
        }
        let output = dir.path().join("out.xlsx");

        let mut writer = OutputWorkbook::open(&input, &output, ImportFormat::Xlsx, "DATA").unwrap();
        writer.flush().unwrap();

        let mut workbook = open_workbook_auto(&output).unwrap();
        let range = workbook.worksheet_range("DATA").unwrap();
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(12.5)));
        assert_eq!(range.get_value((1, 2)), Some(&Data::String("007".to_string())));
    }
}
