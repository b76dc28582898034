pub mod adapter;
pub mod core;

// 导出核心仓储接口和分页类型
pub use core::db_repo::{
    HistoryCmdRepo, HistoryFilter, HistoryQueryRepo, HistoryTx, PageRequest, PageResult, RepoError,
};

// 导出适配器实现
pub use adapter::mem_repo::MemHistoryRepo;
pub use adapter::mysql_db_repo::MySqlHistoryRepo;
