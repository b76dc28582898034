use std::sync::Arc;

use diff::{
    diff_fields, snapshot, FieldMap, History, LogEntry, SnapshotOptions, SourceKey,
    SystemTimestampProvider, TimestampProvider, Trackable,
};
use db_repo::{HistoryCmdRepo, HistoryQueryRepo};

use crate::error::Result;

/// 一次 `log` 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    /// 首条日志（diff 为空）
    Created { history: History, entry: LogEntry },
    /// 有字段变化，追加了一条日志
    Changed { history: History, entry: LogEntry },
    /// 快照与上一条日志相同，没有写入
    Unchanged { history: History },
}

impl LogOutcome {
    pub fn history(&self) -> &History {
        match self {
            LogOutcome::Created { history, .. }
            | LogOutcome::Changed { history, .. }
            | LogOutcome::Unchanged { history } => history,
        }
    }

    pub fn entry(&self) -> Option<&LogEntry> {
        match self {
            LogOutcome::Created { entry, .. } | LogOutcome::Changed { entry, .. } => Some(entry),
            LogOutcome::Unchanged { .. } => None,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, LogOutcome::Unchanged { .. })
    }
}

/// History 维护器：每个实体一条 History，每次变化一条日志
///
/// 查找/创建 History 与追加日志在同一个事务里完成，
/// 并发首存由 (app_label, model, source_id) 唯一约束兜底。
pub struct HistoryTracker<R, C = SystemTimestampProvider> {
    repo: Arc<R>,
    clock: C,
}

impl<R> HistoryTracker<R, SystemTimestampProvider>
where
    R: HistoryCmdRepo + HistoryQueryRepo,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self::with_clock(repo, SystemTimestampProvider)
    }
}

impl<R, C> HistoryTracker<R, C>
where
    R: HistoryCmdRepo + HistoryQueryRepo,
    C: TimestampProvider,
{
    pub fn with_clock(repo: Arc<R>, clock: C) -> Self {
        Self { repo, clock }
    }

    pub fn repo(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// 记录实例当前状态
    pub fn log<T: Trackable>(&self, instance: &T, options: &SnapshotOptions) -> Result<LogOutcome> {
        self.log_with(&instance.source_key(), || Ok(snapshot(instance, options)?))
    }

    /// 记录一份已经生成好的快照
    pub fn log_fields(&self, key: &SourceKey, current: FieldMap) -> Result<LogOutcome> {
        self.log_with(key, || Ok(current))
    }

    fn log_with<S>(&self, key: &SourceKey, current: S) -> Result<LogOutcome>
    where
        S: FnOnce() -> Result<FieldMap>,
    {
        self.repo.atomic(|tx| -> Result<LogOutcome> {
            // 1. 查找或创建 History
            let existing = tx.find_history(key)?;
            // 必须在事务锁内取时间，保证同一实体的时间戳随日志 id 单调
            let now = self.clock.now();
            let (mut history, created) = match existing {
                Some(mut history) => {
                    if history.is_detached() {
                        tx.attach_source(history.id, &key.entity_type)?;
                        history.source_type = Some(key.entity_type.clone());
                        tracing::debug!(source = %key, history_id = history.id, "re-attached history");
                    }
                    (history, false)
                }
                None => (tx.insert_history(key, now)?, true),
            };

            // 2. 当前快照
            let current = current()?;

            // 3. 上一份快照；没有日志的 History 按首条处理
            let previous = if created { None } else { tx.latest_log(history.id)? };
            let first = previous.is_none();
            let updated =
                previous.map_or_else(FieldMap::new, |prev| diff_fields(prev.fields(), &current));

            if !first && updated.is_empty() {
                tracing::debug!(source = %key, history_id = history.id, "no field changed");
                return Ok(LogOutcome::Unchanged { history });
            }

            // 4. 追加日志并刷新 last_modified_at
            let entry = tx.append_log(history.id, current, updated, now)?;
            tx.touch_history(history.id, now)?;
            history.last_modified_at = now;

            tracing::debug!(
                source = %key,
                history_id = history.id,
                log_id = *entry.id(),
                changed = entry.updated().len(),
                "appended history entry"
            );

            Ok(if first {
                LogOutcome::Created { history, entry }
            } else {
                LogOutcome::Changed { history, entry }
            })
        })
    }

    /// 实例对应的 History
    pub fn fetch<T: Trackable>(&self, instance: &T) -> Result<Option<History>> {
        Ok(self.repo.find_history(&instance.source_key())?)
    }

    /// 实例的全部日志，最新在前；未记录过时为空
    pub fn logs<T: Trackable>(&self, instance: &T) -> Result<Vec<LogEntry>> {
        match self.fetch(instance)? {
            Some(history) => Ok(self.repo.logs_for(history.id)?),
            None => Ok(Vec::new()),
        }
    }

    /// 源实体已删除：置空引用，保留 History 与日志
    pub fn detach(&self, key: &SourceKey) -> Result<Option<History>> {
        let history = self.repo.detach_source(key)?;
        if history.is_some() {
            tracing::debug!(source = %key, "history detached from deleted source");
        }
        Ok(history)
    }
}
