use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use diff::{EntityType, FieldMap, History, LogEntry, SourceKey};
use parking_lot::Mutex;

use crate::core::db_repo::{
    HistoryCmdRepo, HistoryFilter, HistoryQueryRepo, HistoryTx, PageRequest, PageResult, RepoError,
};

type UniqueKey = (String, String, u64);

fn unique_key(key: &SourceKey) -> UniqueKey {
    (key.entity_type.app_label.to_string(), key.entity_type.model.to_string(), key.source_id)
}

#[derive(Debug, Default)]
struct MemState {
    histories: BTreeMap<u64, History>,
    /// (app_label, model, source_id) -> history id
    unique: HashMap<UniqueKey, u64>,
    logs: BTreeMap<u64, LogEntry>,
    /// history id -> 日志 id，按写入顺序
    logs_by_history: HashMap<u64, Vec<u64>>,
    last_history_id: u64,
    last_log_id: u64,
}

impl MemState {
    fn history_mut(&mut self, id: u64) -> Result<&mut History, RepoError> {
        self.histories.get_mut(&id).ok_or(RepoError::HistoryNotFound(id))
    }

    fn find(&self, key: &SourceKey) -> Option<&History> {
        self.unique.get(&unique_key(key)).and_then(|id| self.histories.get(id))
    }
}

/// 基于内存的 History 仓储
///
/// 一把锁串行化所有事务；事务内的写入记入撤销日志，
/// 闭包返回 `Err`（或 panic 展开）时按逆序撤销。
/// 唯一索引与数据库实现一致：(app_label, model, source_id)。
#[derive(Debug, Default)]
pub struct MemHistoryRepo {
    state: Mutex<MemState>,
}

impl MemHistoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 撤销日志条目
#[derive(Debug)]
enum Undo {
    InsertedHistory { id: u64, key: UniqueKey },
    UpdatedHistory(History),
    AppendedLog { id: u64, history_id: u64 },
}

struct MemTx<'a> {
    state: &'a mut MemState,
    journal: Vec<Undo>,
}

impl<'a> MemTx<'a> {
    fn new(state: &'a mut MemState) -> Self {
        Self { state, journal: Vec::new() }
    }

    fn commit(mut self) {
        self.journal.clear();
    }

    fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::InsertedHistory { id, key } => {
                    self.state.histories.remove(&id);
                    self.state.unique.remove(&key);
                    self.state.logs_by_history.remove(&id);
                }
                Undo::UpdatedHistory(previous) => {
                    self.state.histories.insert(previous.id, previous);
                }
                Undo::AppendedLog { id, history_id } => {
                    self.state.logs.remove(&id);
                    if let Some(ids) = self.state.logs_by_history.get_mut(&history_id) {
                        ids.retain(|log_id| *log_id != id);
                    }
                }
            }
        }
    }

    fn remember(&mut self, history_id: u64) -> Result<&mut History, RepoError> {
        let previous = self.state.history_mut(history_id)?.clone();
        self.journal.push(Undo::UpdatedHistory(previous));
        self.state.history_mut(history_id)
    }
}

impl Drop for MemTx<'_> {
    fn drop(&mut self) {
        if !self.journal.is_empty() {
            tracing::warn!(writes = self.journal.len(), "rolling back in-memory history transaction");
            self.rollback();
        }
    }
}

impl HistoryTx for MemTx<'_> {
    fn find_history(&mut self, key: &SourceKey) -> Result<Option<History>, RepoError> {
        Ok(self.state.find(key).cloned())
    }

    fn insert_history(&mut self, key: &SourceKey, now: DateTime<Utc>) -> Result<History, RepoError> {
        let unique = unique_key(key);
        if self.state.unique.contains_key(&unique) {
            return Err(RepoError::unique_violation(key));
        }

        self.state.last_history_id += 1;
        let id = self.state.last_history_id;
        let history = History::new(id, key, now);

        self.state.histories.insert(id, history.clone());
        self.state.unique.insert(unique.clone(), id);
        self.journal.push(Undo::InsertedHistory { id, key: unique });
        Ok(history)
    }

    fn attach_source(&mut self, history_id: u64, entity_type: &EntityType) -> Result<(), RepoError> {
        self.remember(history_id)?.source_type = Some(entity_type.clone());
        Ok(())
    }

    fn latest_log(&mut self, history_id: u64) -> Result<Option<LogEntry>, RepoError> {
        let latest = self
            .state
            .logs_by_history
            .get(&history_id)
            .and_then(|ids| ids.last())
            .and_then(|id| self.state.logs.get(id))
            .cloned();
        Ok(latest)
    }

    fn append_log(
        &mut self,
        history_id: u64,
        fields: FieldMap,
        updated: FieldMap,
        now: DateTime<Utc>,
    ) -> Result<LogEntry, RepoError> {
        if !self.state.histories.contains_key(&history_id) {
            return Err(RepoError::HistoryNotFound(history_id));
        }

        self.state.last_log_id += 1;
        let id = self.state.last_log_id;
        let entry = LogEntry::new(id, history_id, fields, updated, now, now);

        self.state.logs.insert(id, entry.clone());
        self.state.logs_by_history.entry(history_id).or_default().push(id);
        self.journal.push(Undo::AppendedLog { id, history_id });
        Ok(entry)
    }

    fn touch_history(&mut self, history_id: u64, now: DateTime<Utc>) -> Result<(), RepoError> {
        self.remember(history_id)?.last_modified_at = now;
        Ok(())
    }
}

impl HistoryCmdRepo for MemHistoryRepo {
    fn atomic<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn HistoryTx) -> Result<R, E>,
        E: From<RepoError>,
    {
        let mut state = self.state.lock();
        let mut tx = MemTx::new(&mut state);
        let result = f(&mut tx);
        if result.is_ok() {
            tx.commit();
        }
        // 未提交的 tx 在 drop 时回滚
        result
    }

    fn detach_source(&self, key: &SourceKey) -> Result<Option<History>, RepoError> {
        let mut state = self.state.lock();
        let Some(id) = state.unique.get(&unique_key(key)).copied() else {
            return Ok(None);
        };
        let history = state.history_mut(id)?;
        history.source_type = None;
        Ok(Some(history.clone()))
    }
}

impl HistoryQueryRepo for MemHistoryRepo {
    fn find_history_by_id(&self, id: u64) -> Result<Option<History>, RepoError> {
        Ok(self.state.lock().histories.get(&id).cloned())
    }

    fn find_history(&self, key: &SourceKey) -> Result<Option<History>, RepoError> {
        Ok(self.state.lock().find(key).cloned())
    }

    fn list_histories(
        &self,
        filter: &HistoryFilter,
        page_req: PageRequest,
    ) -> Result<PageResult<History>, RepoError> {
        let state = self.state.lock();
        let mut matched: Vec<&History> =
            state.histories.values().filter(|h| filter.matches(h)).collect();
        // 创建时间倒序，同一时刻按 id 倒序
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matched.len() as u64;
        let content = matched
            .into_iter()
            .skip(usize::try_from(page_req.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page_req.limit()).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(PageResult::new(content, total, page_req.page, page_req.page_size))
    }

    fn logs_for(&self, history_id: u64) -> Result<Vec<LogEntry>, RepoError> {
        let state = self.state.lock();
        let Some(ids) = state.logs_by_history.get(&history_id) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().rev().filter_map(|id| state.logs.get(id)).cloned().collect())
    }

    fn count_histories(&self) -> Result<u64, RepoError> {
        Ok(self.state.lock().histories.len() as u64)
    }

    fn count_logs(&self, history_id: u64) -> Result<u64, RepoError> {
        Ok(self.state.lock().logs_by_history.get(&history_id).map_or(0, |ids| ids.len() as u64))
    }
}
