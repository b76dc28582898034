use std::collections::HashMap;

use diff::{EntityType, SnapshotOptions, Trackable};
use parking_lot::RwLock;

use crate::error::{HistoryError, Result};

/// 注册参数：快照包含哪些字段
///
/// `fields` 与 `exclude` 只能二选一，同时设置会在注册时报错。
/// 空的 `fields` 列表视为未设置。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    fields: Option<Vec<String>>,
    exclude: Vec<String>,
}

impl Registration {
    /// 全部字段
    pub fn all() -> Self {
        Self::default()
    }

    pub fn exclude<I, S>(exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::all().with_exclude(exclude)
    }

    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::all().with_fields(fields)
    }

    pub fn with_exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(exclude.into_iter().map(Into::into));
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.get_or_insert_with(Vec::new).extend(fields.into_iter().map(Into::into));
        self
    }

    /// 校验并转换为快照选项，再合并全局默认排除项
    pub fn into_options(self, entity_type: &EntityType, default_exclude: &[String]) -> Result<SnapshotOptions> {
        let options = SnapshotOptions::new(entity_type, self.fields, self.exclude)?;
        Ok(options.merge_exclude(default_exclude.iter().cloned()))
    }
}

/// 实体类型 -> 快照选项
///
/// 只有注册过的类型才会响应生命周期信号。
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<HashMap<EntityType, SnapshotOptions>>,
    default_exclude: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有注册都会额外排除这些字段
    pub fn with_default_exclude<I, S>(default_exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_exclude: default_exclude.into_iter().map(Into::into).collect(),
        }
    }

    pub fn register<T: Trackable>(&self, registration: Registration) -> Result<()> {
        self.register_type(T::entity_type(), registration)
    }

    /// # 错误
    /// - `AlreadyRegistered`: 该类型已注册
    /// - `Entity(ConflictingFieldOptions)`: 同时设置了 fields 与 exclude
    pub fn register_type(&self, entity_type: EntityType, registration: Registration) -> Result<()> {
        let options = registration.into_options(&entity_type, &self.default_exclude)?;

        let mut entries = self.entries.write();
        if entries.contains_key(&entity_type) {
            return Err(HistoryError::AlreadyRegistered(entity_type));
        }
        tracing::info!(entity_type = %entity_type, ?options, "registered for history tracking");
        entries.insert(entity_type, options);
        Ok(())
    }

    /// 取消注册；未注册的类型返回 `false`
    pub fn unregister<T: Trackable>(&self) -> bool {
        self.unregister_type(&T::entity_type())
    }

    pub fn unregister_type(&self, entity_type: &EntityType) -> bool {
        let removed = self.entries.write().remove(entity_type).is_some();
        if removed {
            tracing::info!(entity_type = %entity_type, "unregistered from history tracking");
        }
        removed
    }

    pub fn is_registered<T: Trackable>(&self) -> bool {
        self.entries.read().contains_key(&T::entity_type())
    }

    pub fn options_for(&self, entity_type: &EntityType) -> Option<SnapshotOptions> {
        self.entries.read().get(entity_type).cloned()
    }

    /// 已注册类型，按 `app_label.model` 排序
    pub fn registered_types(&self) -> Vec<EntityType> {
        let mut types: Vec<_> = self.entries.read().keys().cloned().collect();
        types.sort();
        types
    }
}
