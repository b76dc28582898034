use std::fmt;

use chrono::{DateTime, Utc};
use immutable_derive::immutable;
use serde::{Deserialize, Serialize};

use super::diff_types::{EntityType, FieldMap, SourceKey};

// ============================================================================
// History - 每个被追踪实体一条
// ============================================================================

/// 审计头记录
///
/// 对每个 (app_label, model, source_id) 唯一。创建后只有
/// `last_modified_at` 会变化；源实体删除后 `source_type` 置空，记录本身保留。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    pub id: u64,
    pub app_label: String,
    pub model: String,
    /// 指向源实体类型的引用；源实体删除后为 None
    pub source_type: Option<EntityType>,
    pub source_id: u64,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
}

impl History {
    /// 新建的 History，app_label / model 取自实体类型
    pub fn new(id: u64, key: &SourceKey, now: DateTime<Utc>) -> Self {
        Self {
            id,
            app_label: key.entity_type.app_label.to_string(),
            model: key.entity_type.model.to_string(),
            source_type: Some(key.entity_type.clone()),
            source_id: key.source_id,
            created_at: now,
            last_modified_at: now,
        }
    }

    /// 不依赖 `source_type` 的唯一键
    pub fn source_key(&self) -> SourceKey {
        SourceKey::new(EntityType::new(self.app_label.clone(), self.model.clone()), self.source_id)
    }

    pub fn is_detached(&self) -> bool {
        self.source_type.is_none()
    }

    pub fn matches(&self, key: &SourceKey) -> bool {
        self.source_id == key.source_id
            && self.app_label == key.entity_type.app_label
            && self.model == key.entity_type.model
    }

    /// 展示标签
    ///
    /// 能拿到源实体描述时为 `"{source} [app.model id]"`，否则 `"app.model id"`
    pub fn label(&self, source: Option<&str>) -> String {
        match source {
            Some(source) if !self.is_detached() => {
                format!("{source} [{}.{} {}]", self.app_label, self.model, self.source_id)
            }
            _ => format!("{}.{} {}", self.app_label, self.model, self.source_id),
        }
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label(None))
    }
}

// ============================================================================
// LogEntry - 只追加的变更记录
// ============================================================================

/// 一次变更的日志行
///
/// `fields` 为当时的完整快照，`updated` 为相对上一行的旧值。
/// 写入后不可修改，所以字段全部私有、只暴露 getter。
#[immutable]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    id: u64,
    history_id: u64,
    fields: FieldMap,
    updated: FieldMap,
    created_at: DateTime<Utc>,
    last_modified_at: DateTime<Utc>,
}

impl LogEntry {
    /// 首行日志的 diff 为空
    pub fn is_initial(&self) -> bool {
        self.updated.is_empty()
    }

    /// 展示标签，`source` 为源实体描述，取不到时用 History 自身的标签
    pub fn label(&self, history: &History, source: Option<&str>) -> String {
        let obj = source.map_or_else(|| history.label(None), str::to_string);
        format!("History for {obj} at {}", history.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> SourceKey {
        SourceKey::new(EntityType::new_static("auth", "user"), 42)
    }

    #[test]
    fn test_history_label_with_and_without_source() {
        let now = Utc::now();
        let mut history = History::new(1, &key(), now);

        assert_eq!(history.label(Some("alice")), "alice [auth.user 42]");
        assert_eq!(history.to_string(), "auth.user 42");

        // 源实体删除后不再显示源描述
        history.source_type = None;
        assert_eq!(history.label(Some("alice")), "auth.user 42");
        assert!(history.matches(&key()));
    }

    #[test]
    fn test_log_entry_getters() {
        let now = Utc::now();
        let mut fields = FieldMap::new();
        fields.insert("username".into(), json!("alice"));

        let entry = LogEntry::new(3, 1, fields.clone(), FieldMap::new(), now, now);
        assert_eq!(*entry.id(), 3);
        assert_eq!(*entry.history_id(), 1);
        assert_eq!(entry.fields(), &fields);
        assert!(entry.is_initial());
    }
}
