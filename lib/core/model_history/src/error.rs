use std::path::PathBuf;

use db_repo::RepoError;
use diff::{EntityError, EntityType};
use thiserror::Error;

/// model_history 的统一错误类型
#[derive(Debug, Error)]
pub enum HistoryError {
    /// 同一实体类型重复注册
    #[error("{0} is already registered for history tracking")]
    AlreadyRegistered(EntityType),

    #[error("entity error: {0}")]
    Entity(#[from] EntityError),

    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("environment variable not found: {0}")]
    MissingEnvVar(String),

    #[error("invalid log filter: {0}")]
    LogFilter(String),
}

pub type Result<T> = std::result::Result<T, HistoryError>;
