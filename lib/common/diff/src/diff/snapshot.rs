use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::diff_types::{json_kind, EntityError, EntityType, FieldMap, Trackable};

/// 快照字段选择
///
/// - 两者都不设置：序列化输出的全部字段
/// - `fields`：只保留列出的字段
/// - `exclude`：去掉列出的字段
///
/// 用户侧只能二选一；`merge_exclude` 合并全局默认排除项时不受此限制，
/// 此时先按 `fields` 选取再去掉 `exclude`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotOptions {
    fields: Option<BTreeSet<String>>,
    exclude: BTreeSet<String>,
}

impl SnapshotOptions {
    /// 全部字段
    pub fn all() -> Self {
        Self::default()
    }

    /// 校验后构造，`fields` 和 `exclude` 同时非空时报错
    ///
    /// 空的 `fields` 列表等同于未设置，即全部字段。
    pub fn new<F, E, S>(
        entity_type: &EntityType,
        fields: Option<F>,
        exclude: E,
    ) -> Result<Self, EntityError>
    where
        F: IntoIterator<Item = S>,
        E: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = non_empty(fields.map(|f| f.into_iter().map(Into::into).collect()));
        let exclude: BTreeSet<String> = exclude.into_iter().map(Into::into).collect();

        if fields.is_some() && !exclude.is_empty() {
            return Err(EntityError::ConflictingFieldOptions(entity_type.label()));
        }
        Ok(Self { fields, exclude })
    }

    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: non_empty(Some(fields.into_iter().map(Into::into).collect())),
            exclude: BTreeSet::new(),
        }
    }

    pub fn excluding<I, S>(exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { fields: None, exclude: exclude.into_iter().map(Into::into).collect() }
    }

    /// 追加排除字段（配置中的全局默认排除项）
    pub fn merge_exclude<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(extra.into_iter().map(Into::into));
        self
    }

    pub fn is_all(&self) -> bool {
        self.fields.is_none() && self.exclude.is_empty()
    }

    pub fn fields(&self) -> Option<&BTreeSet<String>> {
        self.fields.as_ref()
    }

    pub fn exclude(&self) -> &BTreeSet<String> {
        &self.exclude
    }

    /// 字段是否进入快照
    pub fn includes(&self, name: &str) -> bool {
        let selected = self.fields.as_ref().map_or(true, |f| f.contains(name));
        selected && !self.exclude.contains(name)
    }

    /// 按选项过滤一份完整的字段映射
    pub fn apply(&self, mut fields: FieldMap) -> FieldMap {
        if !self.is_all() {
            fields.retain(|name, _| self.includes(name));
        }
        fields
    }
}

fn non_empty(fields: Option<BTreeSet<String>>) -> Option<BTreeSet<String>> {
    fields.filter(|f| !f.is_empty())
}

/// 把实体序列化为字段快照
pub fn snapshot<T: Trackable>(entity: &T, options: &SnapshotOptions) -> Result<FieldMap, EntityError> {
    let value = serde_json::to_value(entity)
        .map_err(|e| EntityError::SerializationError(e.to_string()))?;
    snapshot_value(&T::entity_type(), value, options)
}

/// 对已经序列化好的值做字段选择
pub fn snapshot_value(
    entity_type: &EntityType,
    value: Value,
    options: &SnapshotOptions,
) -> Result<FieldMap, EntityError> {
    match value {
        Value::Object(fields) => Ok(options.apply(fields)),
        other => Err(EntityError::NotAnObject {
            entity_type: format!("{} ({})", entity_type.label(), json_kind(&other)),
        }),
    }
}
