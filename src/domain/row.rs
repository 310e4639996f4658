// ==========================================
// 表格批量导入管道 - 行数据模型
// ==========================================
// 职责: 列名 → 值 的有序映射，在解析器/校验器/处理器之间按值传递
// ==========================================

use serde::ser::{Serialize, SerializeMap, Serializer};

/// 单行数据（保留列顺序）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowValues {
    cells: Vec<(String, String)>,
}

impl RowValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 (列名, 值) 序列构建
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (column, value) in pairs {
            row.set(column, value);
        }
        row
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// 写入列值：同名列原位覆盖，新列追加到末尾
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    /// 合并处理结果（结果字段覆盖同名输入字段，新字段追加）
    pub fn merge(&mut self, other: RowValues) {
        for (column, value) in other.cells {
            self.set(column, value);
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 整行所有值均为空白
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, value)| value.trim().is_empty())
    }
}

impl Serialize for RowValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
