pub mod admin;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod signals;
pub mod tracker;

pub use admin::{render_pre, HistoryAdmin, HistoryDetail, LogRow};
pub use config::{AdminConfig, HistoryConfig};
pub use error::{ConfigError, HistoryError, Result};
pub use registry::{Registration, Registry};
pub use signals::{Dispatch, HistorySite, M2MAction, Signal};
pub use tracker::{HistoryTracker, LogOutcome};

// 常用类型一并导出，使用方只需依赖本 crate
pub use db_repo::{HistoryFilter, MemHistoryRepo, MySqlHistoryRepo, PageRequest, PageResult};
pub use diff::{pretty_json, EntityType, FieldMap, History, LogEntry, SnapshotOptions, Trackable};
