use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// 错误类型
// ============================================================================

/// 快照与字段映射相关的错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    /// 实体序列化失败
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// 实体序列化结果不是 JSON 对象，无法拆成字段
    #[error("Snapshot of {entity_type} is not a JSON object")]
    NotAnObject { entity_type: String },
    /// 读回的字段 JSON 不合法
    #[error("Malformed field JSON: {0}")]
    MalformedJson(String),
    /// `fields` 与 `exclude` 不能同时指定
    #[error("Cannot set both 'fields' and 'exclude' for {0}")]
    ConflictingFieldOptions(String),
}

// ============================================================================
// 字段映射
// ============================================================================

/// 字段名 -> 字段值
///
/// serde_json 默认的 Map 基于 BTreeMap，键天然有序，
/// 落库和展示时都是 sort_keys 的效果。
pub type FieldMap = serde_json::Map<String, Value>;

/// 以 2 空格缩进、键有序的形式渲染字段映射
pub fn pretty_json(fields: &FieldMap) -> String {
    // Map<String, Value> 的序列化不会失败
    serde_json::to_string_pretty(fields).unwrap_or_else(|_| String::from("{}"))
}

/// 从存储的文本读回字段映射
///
/// 空字符串视为空映射；不是 JSON 对象时返回 `MalformedJson`
pub fn parse_field_map(text: &str) -> Result<FieldMap, EntityError> {
    if text.trim().is_empty() {
        return Ok(FieldMap::new());
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(EntityError::MalformedJson(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(EntityError::MalformedJson(e.to_string())),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// 实体类型与实体标识
// ============================================================================

/// 被追踪实体的类型（app_label + model）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityType {
    pub app_label: Cow<'static, str>,
    pub model: Cow<'static, str>,
}

impl EntityType {
    pub fn new(app_label: impl Into<Cow<'static, str>>, model: impl Into<Cow<'static, str>>) -> Self {
        Self { app_label: app_label.into(), model: model.into() }
    }

    /// 静态字符串构造（零分配），derive 宏生成的代码使用此方法
    #[inline]
    pub const fn new_static(app_label: &'static str, model: &'static str) -> Self {
        Self { app_label: Cow::Borrowed(app_label), model: Cow::Borrowed(model) }
    }

    /// 形如 `auth.user` 的标签
    pub fn label(&self) -> String {
        format!("{}.{}", self.app_label, self.model)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model)
    }
}

/// 一个被追踪实体实例的唯一键：(类型, id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceKey {
    pub entity_type: EntityType,
    pub source_id: u64,
}

impl SourceKey {
    pub fn new(entity_type: EntityType, source_id: u64) -> Self {
        Self { entity_type, source_id }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.entity_type, self.source_id)
    }
}

// ============================================================================
// 核心 Trait
// ============================================================================

/// Trackable - 可被审计追踪的实体
///
/// 字段快照直接取自 `Serialize` 的输出，因此实体必须序列化为 JSON 对象。
///
/// # 示例
/// ```ignore
/// #[derive(Serialize, entity_derive::Trackable)]
/// #[trackable(app_label = "auth", model = "user")]
/// struct User {
///     id: u64,
///     username: String,
/// }
/// ```
pub trait Trackable: Serialize {
    /// 实体类型
    fn entity_type() -> EntityType
    where
        Self: Sized;

    /// 实体主键
    fn source_id(&self) -> u64;

    fn source_key(&self) -> SourceKey
    where
        Self: Sized,
    {
        SourceKey::new(Self::entity_type(), self.source_id())
    }
}

// ============================================================================
// 时间戳提供者
// ============================================================================

/// 时间戳提供者 trait
pub trait TimestampProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimestampProvider;

impl TimestampProvider for SystemTimestampProvider {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动推进的时钟，测试里用来得到确定的时间戳
///
/// 内部以微秒存储，和落库精度一致
#[derive(Debug)]
pub struct FixedTimestampProvider {
    micros: AtomicI64,
}

impl FixedTimestampProvider {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { micros: AtomicI64::new(start.timestamp_micros()) }
    }

    /// 从 Unix 纪元起的秒数开始
    pub fn from_secs(secs: i64) -> Self {
        Self { micros: AtomicI64::new(secs.saturating_mul(1_000_000)) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.micros.store(at.timestamp_micros(), Ordering::Release);
    }

    pub fn advance(&self, by: chrono::Duration) {
        let delta = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(delta, Ordering::AcqRel);
    }
}

impl TimestampProvider for FixedTimestampProvider {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.micros.load(Ordering::Acquire);
        DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_default()
    }
}
