pub mod diff;
pub use diff::{diff_types, engine, history_types, snapshot};
// 重新导出核心类型，方便使用
pub use diff::diff_types::{
    // 错误
    EntityError,
    // 实体标识
    EntityType,
    // 字段映射
    FieldMap,
    FixedTimestampProvider,
    SourceKey,
    SystemTimestampProvider,
    // 时间戳提供者
    TimestampProvider,
    // 核心 trait
    Trackable,
    parse_field_map,
    pretty_json,
};
pub use diff::engine::{diff_fields, has_changes};
pub use diff::history_types::{History, LogEntry};
pub use diff::snapshot::{snapshot, snapshot_value, SnapshotOptions};

// Trackable derive 宏从 entity_derive crate 导入
// 使用方法: #[derive(entity_derive::Trackable)]
