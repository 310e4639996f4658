// ==========================================
// 表格批量导入管道 - 输入表格解析
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 说明: CSV 流式读取（向后读取时重新打开），Excel 整表加载
// ==========================================

use crate::domain::RowValues;
use crate::importer::codec::RowSource;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::{NaiveDateTime, Timelike};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

/// 表头去重
///
/// 重名列追加 `_2`、`_3` 后缀，空表头命名为 `column_{序号}`；
/// 行数据按列名寻址，重名会导致后一列覆盖前一列。
fn unique_headers<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .enumerate()
        .map(|(position, header)| {
            let base = if header.is_empty() {
                format!("column_{}", position + 1)
            } else {
                header
            };
            let mut name = base.clone();
            let mut suffix = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}

fn row_from_cells<I>(headers: &[String], cells: I) -> RowValues
where
    I: IntoIterator<Item = String>,
{
    let mut cells = cells.into_iter();
    RowValues::from_pairs(
        headers
            .iter()
            .map(|header| (header.clone(), cells.next().unwrap_or_default())),
    )
}

// ==========================================
// CSV 实现
// ==========================================
pub struct CsvRowSource {
    path: PathBuf,
    headers: Vec<String>,
    total_rows: usize,
    reader: csv::Reader<File>,
    next_index: usize,
}

impl CsvRowSource {
    pub fn open(path: &Path) -> ImportResult<Self> {
        let (mut counter, headers) = Self::open_reader(path)?;

        // 预扫描行数
        let mut total_rows = 0;
        let mut record = csv::ByteRecord::new();
        while counter.read_byte_record(&mut record)? {
            total_rows += 1;
        }

        let (reader, _) = Self::open_reader(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            total_rows,
            reader,
            next_index: 0,
        })
    }

    fn open_reader(path: &Path) -> ImportResult<(csv::Reader<File>, Vec<String>)> {
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers = unique_headers(reader.headers()?.iter().map(|h| h.trim().to_string()));

        Ok((reader, headers))
    }
}

impl RowSource for CsvRowSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn total_rows(&self) -> usize {
        self.total_rows
    }

    fn rows(&mut self, start: usize, len: usize) -> ImportResult<Vec<RowValues>> {
        if start < self.next_index {
            self.rewind()?;
        }

        let end = start.saturating_add(len).min(self.total_rows);
        let mut rows = Vec::with_capacity(end.saturating_sub(start));
        let mut record = StringRecord::new();

        while self.next_index < end {
            if !self.reader.read_record(&mut record)? {
                break;
            }
            let index = self.next_index;
            self.next_index += 1;

            if index >= start {
                rows.push(row_from_cells(
                    &self.headers,
                    record.iter().map(|v| v.trim().to_string()),
                ));
            }
        }

        Ok(rows)
    }

    fn rewind(&mut self) -> ImportResult<()> {
        let (reader, _) = Self::open_reader(&self.path)?;
        self.reader = reader;
        self.next_index = 0;
        Ok(())
    }
}

// ==========================================
// Excel 实现
// ==========================================
pub struct ExcelRowSource {
    sheet_name: String,
    headers: Vec<String>,
    range: Range<Data>,
}

/// 日期单元格文本：无时间部分输出 `%Y-%m-%d`，否则带时分秒
fn datetime_text(value: NaiveDateTime) -> String {
    if value.num_seconds_from_midnight() == 0 {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// 单元格转文本（整数值浮点去掉小数部分，日期按日历格式输出）
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::DateTime(dt) if dt.is_datetime() => match dt.as_datetime() {
            Some(value) => datetime_text(value),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(iso) => cell
            .as_datetime()
            .map(datetime_text)
            .unwrap_or_else(|| iso.trim().to_string()),
        other => other.to_string().trim().to_string(),
    }
}

impl ExcelRowSource {
    /// 打开工作簿
    ///
    /// 优先读取名为 `preferred_sheet` 的工作表（大小写不敏感），否则读取第一个。
    pub fn open(path: &Path, preferred_sheet: &str) -> ImportResult<Self> {
        let mut workbook = open_workbook_auto(path)?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .iter()
            .find(|name| name.eq_ignore_ascii_case(preferred_sheet))
            .or_else(|| sheet_names.first())
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        let headers = range
            .rows()
            .next()
            .map(|header_row| unique_headers(header_row.iter().map(cell_text)))
            .unwrap_or_default();

        tracing::debug!(
            path = %path.display(),
            sheet = %sheet_name,
            rows = range.height(),
            "已加载 Excel 工作表"
        );

        Ok(Self {
            sheet_name,
            headers,
            range,
        })
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }
}

impl RowSource for ExcelRowSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn total_rows(&self) -> usize {
        self.range.height().saturating_sub(1)
    }

    fn rows(&mut self, start: usize, len: usize) -> ImportResult<Vec<RowValues>> {
        Ok(self
            .range
            .rows()
            .skip(1 + start)
            .take(len)
            .map(|cells| row_from_cells(&self.headers, cells.iter().map(cell_text)))
            .collect())
    }

    fn rewind(&mut self) -> ImportResult<()> {
        Ok(())
    }
}
