// ==========================================
// 表格批量导入管道 - 行动作解析
// ==========================================
// 职责:
// - ActionRegistry: 动作名 → (规则集提供者, 处理器工厂)，启动时构建一次
// - RowActionResolver: 解析行动作，并在单次运行内缓存规则集/处理器
// ==========================================

use crate::domain::RowValues;
use crate::importer::validation_rules::RuleSet;
use rusqlite::Connection;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ==========================================
// RowHandler - 行处理器
// ==========================================

/// 行处理错误（任何一行失败都会回滚整个处理阶段）
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("数据库操作失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("行数据无效: {0}")]
    InvalidRow(String),

    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 行处理器
///
/// `conn` 为处理阶段的事务连接，处理器的所有数据写入都在该事务内。
/// 返回的字段会合并回行数据并写入结果文件（可为空）。
pub trait RowHandler: Send + Sync {
    fn process(&self, conn: &Connection, row: &RowValues) -> Result<RowValues, HandlerError>;
}

impl<F> RowHandler for F
where
    F: Fn(&Connection, &RowValues) -> Result<RowValues, HandlerError> + Send + Sync,
{
    fn process(&self, conn: &Connection, row: &RowValues) -> Result<RowValues, HandlerError> {
        self(conn, row)
    }
}

type RuleProvider = Arc<dyn Fn() -> RuleSet + Send + Sync>;
type HandlerFactory = Arc<dyn Fn() -> Arc<dyn RowHandler> + Send + Sync>;

// ==========================================
// ActionRegistry - 动作注册表
// ==========================================
#[derive(Clone, Default)]
pub struct ActionRegistry {
    rule_providers: HashMap<String, RuleProvider>,
    handler_factories: HashMap<String, HandlerFactory>,
}

fn normalize_action(action: &str) -> String {
    action.trim().to_lowercase()
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册动作的规则集提供者
    pub fn with_rules<F>(mut self, action: &str, provider: F) -> Self
    where
        F: Fn() -> RuleSet + Send + Sync + 'static,
    {
        self.rule_providers
            .insert(normalize_action(action), Arc::new(provider));
        self
    }

    /// 注册动作的处理器工厂
    pub fn with_handler_factory<F>(mut self, action: &str, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn RowHandler> + Send + Sync + 'static,
    {
        self.handler_factories
            .insert(normalize_action(action), Arc::new(factory));
        self
    }

    /// 注册共享的处理器实例
    pub fn with_handler<H>(self, action: &str, handler: H) -> Self
    where
        H: RowHandler + 'static,
    {
        let handler: Arc<dyn RowHandler> = Arc::new(handler);
        self.with_handler_factory(action, move || Arc::clone(&handler))
    }

    /// 已注册的动作名（排序后）
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .rule_providers
            .keys()
            .chain(self.handler_factories.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn build_rules(&self, action: &str) -> Option<RuleSet> {
        self.rule_providers.get(action).map(|provider| provider())
    }

    fn build_handler(&self, action: &str) -> Option<Arc<dyn RowHandler>> {
        self.handler_factories.get(action).map(|factory| factory())
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions())
            .finish()
    }
}

// ==========================================
// RowActionResolver - 单次运行的动作解析器
// ==========================================
pub struct RowActionResolver {
    registry: Arc<ActionRegistry>,
    action_column: String,
    default_action: Option<String>,
    // 未命中也缓存，保证同一绑定只构建一次
    rule_cache: HashMap<String, Option<Arc<RuleSet>>>,
    handler_cache: HashMap<String, Option<Arc<dyn RowHandler>>>,
}

impl RowActionResolver {
    /// 创建解析器
    ///
    /// # 参数
    /// - registry: 动作注册表
    /// - action_column: 行动作所在列
    /// - default_action: 任务级默认动作（可被行动作覆盖）
    pub fn new(
        registry: Arc<ActionRegistry>,
        action_column: &str,
        default_action: Option<&str>,
    ) -> Self {
        Self {
            registry,
            action_column: action_column.to_string(),
            default_action: default_action
                .map(normalize_action)
                .filter(|a| !a.is_empty()),
            rule_cache: HashMap::new(),
            handler_cache: HashMap::new(),
        }
    }

    /// 解析行动作
    ///
    /// # 返回
    /// - Some(action): 行动作列（优先）或默认动作，已转小写
    /// - None: 整行空白，或两者都没有（该行不参与校验和处理）
    pub fn resolve_action(&self, row: &RowValues) -> Option<String> {
        if row.is_blank() {
            return None;
        }

        row.get(&self.action_column)
            .map(normalize_action)
            .filter(|a| !a.is_empty())
            .or_else(|| self.default_action.clone())
    }

    /// 动作绑定的规则集（None 表示无条件通过）
    pub fn rules_for(&mut self, action: &str) -> Option<Arc<RuleSet>> {
        let registry = &self.registry;
        self.rule_cache
            .entry(action.to_string())
            .or_insert_with(|| registry.build_rules(action).map(Arc::new))
            .clone()
    }

    /// 动作绑定的处理器（None 表示只校验不处理）
    pub fn handler_for(&mut self, action: &str) -> Option<Arc<dyn RowHandler>> {
        let registry = &self.registry;
        self.handler_cache
            .entry(action.to_string())
            .or_insert_with(|| registry.build_handler(action))
            .clone()
    }

    pub fn action_column(&self) -> &str {
        &self.action_column
    }

    pub fn default_action(&self) -> Option<&str> {
        self.default_action.as_deref()
    }
}
