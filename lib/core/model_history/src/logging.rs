//! tracing 初始化

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// 构造过滤器：`RUST_LOG` 存在时优先，否则用配置中的指令
pub fn env_filter(configured: &str) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(configured).map_err(|e| ConfigError::LogFilter(e.to_string())),
    }
}

/// 安装全局 fmt subscriber
///
/// 已经安装过时返回 `false`（测试里多次调用不会 panic）
pub fn init(configured: &str) -> Result<bool, ConfigError> {
    let filter = env_filter(configured)?;
    Ok(tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok())
}
