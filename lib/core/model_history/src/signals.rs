use std::sync::Arc;

use db_repo::{HistoryCmdRepo, HistoryQueryRepo};
use diff::{History, LogEntry, SystemTimestampProvider, TimestampProvider, Trackable};

use crate::config::HistoryConfig;
use crate::error::Result;
use crate::registry::{Registration, Registry};
use crate::tracker::{HistoryTracker, LogOutcome};

/// 多对多关系变更的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum M2MAction {
    PreAdd,
    PostAdd,
    PreRemove,
    PostRemove,
    PreClear,
    PostClear,
}

impl M2MAction {
    /// 变更已经落库
    pub fn is_post(self) -> bool {
        matches!(self, M2MAction::PostAdd | M2MAction::PostRemove | M2MAction::PostClear)
    }
}

/// 宿主发出的实体生命周期信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    PostSave { created: bool },
    PreDelete,
    PostDelete,
    M2MChanged(M2MAction),
}

/// 信号处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// 类型未注册或信号不需要处理
    Ignored,
    Logged(LogOutcome),
    /// 源实体已删除，返回置空引用后的 History（从未记录过时为 None）
    Detached(Option<History>),
}

/// 注册表 + 维护器，作为宿主生命周期信号的接收端
///
/// 所有写入在调用方线程里同步完成，错误原样返回给调用方。
pub struct HistorySite<R, C = SystemTimestampProvider> {
    registry: Registry,
    tracker: HistoryTracker<R, C>,
}

impl<R> HistorySite<R, SystemTimestampProvider>
where
    R: HistoryCmdRepo + HistoryQueryRepo,
{
    /// 按配置创建，`default_exclude` 作用于每次注册
    pub fn from_config(repo: Arc<R>, config: &HistoryConfig) -> Self {
        Self::new(
            Registry::with_default_exclude(config.default_exclude.iter().cloned()),
            HistoryTracker::new(repo),
        )
    }
}

impl<R, C> HistorySite<R, C>
where
    R: HistoryCmdRepo + HistoryQueryRepo,
    C: TimestampProvider,
{
    pub fn new(registry: Registry, tracker: HistoryTracker<R, C>) -> Self {
        Self { registry, tracker }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tracker(&self) -> &HistoryTracker<R, C> {
        &self.tracker
    }

    pub fn register<T: Trackable>(&self, registration: Registration) -> Result<()> {
        self.registry.register::<T>(registration)
    }

    pub fn unregister<T: Trackable>(&self) -> bool {
        self.registry.unregister::<T>()
    }

    /// 分发一个生命周期信号
    pub fn send<T: Trackable>(&self, signal: Signal, instance: &T) -> Result<Dispatch> {
        let Some(options) = self.registry.options_for(&T::entity_type()) else {
            return Ok(Dispatch::Ignored);
        };

        match signal {
            Signal::PostSave { .. } | Signal::PreDelete => {
                Ok(Dispatch::Logged(self.tracker.log(instance, &options)?))
            }
            Signal::M2MChanged(action) if action.is_post() => {
                Ok(Dispatch::Logged(self.tracker.log(instance, &options)?))
            }
            Signal::M2MChanged(_) => Ok(Dispatch::Ignored),
            Signal::PostDelete => Ok(Dispatch::Detached(self.tracker.detach(&instance.source_key())?)),
        }
    }

    /// 实例对应的 History
    pub fn fetch<T: Trackable>(&self, instance: &T) -> Result<Option<History>> {
        self.tracker.fetch(instance)
    }

    /// 实例的全部日志，最新在前
    pub fn logs<T: Trackable>(&self, instance: &T) -> Result<Vec<LogEntry>> {
        self.tracker.logs(instance)
    }
}
