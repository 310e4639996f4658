// ==========================================
// 表格批量导入管道 - 行校验规则
// ==========================================
// 职责: 声明式列校验规则 + 字段级错误信息
// 说明: 除 Required 外，其他规则对空值不校验
// ==========================================

use crate::domain::RowValues;
use crate::importer::error::{ImportError, ImportResult};
use chrono::NaiveDate;
use regex::Regex;

/// 单列校验规则
#[derive(Debug, Clone)]
pub enum FieldRule {
    /// 非空
    Required,
    /// 整数
    Integer,
    /// 数字
    Numeric,
    /// 数值下限（含）
    Min(f64),
    /// 数值上限（含）
    Max(f64),
    /// 最少字符数
    MinLength(usize),
    /// 最多字符数
    MaxLength(usize),
    /// 枚举值（大小写不敏感）
    OneOf(Vec<String>),
    /// 正则匹配
    Pattern(Regex),
    /// 日期格式（chrono 格式串）
    Date(String),
}

impl FieldRule {
    /// 构建正则规则
    pub fn pattern(expr: &str) -> ImportResult<Self> {
        Regex::new(expr)
            .map(FieldRule::Pattern)
            .map_err(|e| ImportError::InvalidRule {
                rule: "pattern".to_string(),
                expr: expr.to_string(),
                message: e.to_string(),
            })
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldRule::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// 校验单个值，失败返回错误信息
    fn check(&self, field: &str, value: &str) -> Option<String> {
        let value = value.trim();

        if let FieldRule::Required = self {
            return value
                .is_empty()
                .then(|| format!("{} 为必填项", field));
        }
        if value.is_empty() {
            return None;
        }

        match self {
            FieldRule::Required => None,
            FieldRule::Integer => value
                .parse::<i64>()
                .is_err()
                .then(|| format!("{} 必须为整数", field)),
            FieldRule::Numeric => value
                .parse::<f64>()
                .is_err()
                .then(|| format!("{} 必须为数字", field)),
            FieldRule::Min(min) => match value.parse::<f64>() {
                Ok(v) if v >= *min => None,
                Ok(_) => Some(format!("{} 不能小于 {}", field, min)),
                Err(_) => Some(format!("{} 必须为数字", field)),
            },
            FieldRule::Max(max) => match value.parse::<f64>() {
                Ok(v) if v <= *max => None,
                Ok(_) => Some(format!("{} 不能大于 {}", field, max)),
                Err(_) => Some(format!("{} 必须为数字", field)),
            },
            FieldRule::MinLength(n) => (value.chars().count() < *n)
                .then(|| format!("{} 长度不能少于 {} 个字符", field, n)),
            FieldRule::MaxLength(n) => (value.chars().count() > *n)
                .then(|| format!("{} 长度不能超过 {} 个字符", field, n)),
            FieldRule::OneOf(allowed) => (!allowed
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(value)))
            .then(|| format!("{} 必须为以下值之一: {}", field, allowed.join(", "))),
            FieldRule::Pattern(re) => (!re.is_match(value))
                .then(|| format!("{} 格式不正确", field)),
            FieldRule::Date(fmt) => NaiveDate::parse_from_str(value, fmt)
                .is_err()
                .then(|| format!("{} 不是有效日期（格式 {}）", field, fmt)),
        }
    }
}

/// 单列的校验失败信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub messages: Vec<String>,
}

/// 一个动作绑定的规则集（按列声明顺序校验）
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: Vec<(String, Vec<FieldRule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为列追加规则
    pub fn field(mut self, column: impl Into<String>, rules: Vec<FieldRule>) -> Self {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => existing.extend(rules),
            None => self.fields.push((column, rules)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(|(_, rules)| rules.is_empty())
    }

    /// 校验一行，返回所有失败列（缺失的列按空值处理）
    pub fn validate(&self, row: &RowValues) -> Vec<FieldViolation> {
        self.fields
            .iter()
            .filter_map(|(column, rules)| {
                let value = row.get(column).unwrap_or("");
                let messages: Vec<String> = rules
                    .iter()
                    .filter_map(|rule| rule.check(column, value))
                    .collect();
                (!messages.is_empty()).then(|| FieldViolation {
                    field: column.clone(),
                    messages,
                })
            })
            .collect()
    }

    /// 合并为单条标注文本（列内、列间均以 "; " 分隔）
    pub fn annotation(violations: &[FieldViolation]) -> String {
        violations
            .iter()
            .map(|v| v.messages.join("; "))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_rules() -> RuleSet {
        RuleSet::new()
            .field("key", vec![FieldRule::Required, FieldRule::MaxLength(8)])
            .field("qty", vec![FieldRule::Integer, FieldRule::Min(1.0)])
            .field("kind", vec![FieldRule::one_of(["A", "B"])])
    }

    #[test]
    fn test_valid_row_has_no_violation() {
        let row = RowValues::from_pairs([("key", "K1"), ("qty", "3"), ("kind", "a")]);
        assert!(order_rules().validate(&row).is_empty());
    }

    #[test]
    fn test_missing_column_counts_as_empty() {
        let row = RowValues::from_pairs([("qty", "3")]);
        let violations = order_rules().validate(&row);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "key");
        assert_eq!(violations[0].messages, vec!["key 为必填项".to_string()]);
    }

    #[test]
    fn test_optional_rules_skip_empty_values() {
        let row = RowValues::from_pairs([("key", "K1"), ("qty", ""), ("kind", "")]);
        assert!(order_rules().validate(&row).is_empty());
    }

    #[test]
    fn test_annotation_joins_messages() {
        let row = RowValues::from_pairs([("key", "TOO-LONG-KEY"), ("qty", "x"), ("kind", "C")]);
        let violations = order_rules().validate(&row);
        assert_eq!(violations.len(), 3);

        let text = RuleSet::annotation(&violations);
        assert_eq!(
            text,
            "key 长度不能超过 8 个字符; qty 必须为整数; qty 必须为数字; kind 必须为以下值之一: A, B"
        );
    }

    #[test]
    fn test_pattern_and_date_rules() {
        let rules = RuleSet::new()
            .field("code", vec![FieldRule::pattern(r"^[A-Z]{3}\d{2}$").unwrap()])
            .field("due", vec![FieldRule::Date("%Y-%m-%d".to_string())]);

        let ok = RowValues::from_pairs([("code", "ABC12"), ("due", "2024-02-29")]);
        assert!(rules.validate(&ok).is_empty());

        let bad = RowValues::from_pairs([("code", "abc12"), ("due", "2023-02-29")]);
        assert_eq!(rules.validate(&bad).len(), 2);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        match FieldRule::pattern("(unclosed") {
            Err(ImportError::InvalidRule { rule, expr, .. }) => {
                assert_eq!(rule, "pattern");
                assert_eq!(expr, "(unclosed");
            }
            other => panic!("Expected InvalidRule, got {:?}", other.map(|_| ())),
        }
    }
}
