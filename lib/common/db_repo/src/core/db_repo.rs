use std::fmt;

use chrono::{DateTime, Utc};
use diff::{EntityType, FieldMap, History, LogEntry, SourceKey};

/// 分页参数
///
/// 0-based 页号，便于数据库实现 LIMIT/OFFSET
///
/// # 示例
/// ```ignore
/// let page_req = PageRequest::new(0, 20);  // 第一页，每页20条
/// let page = repo.list_histories(&HistoryFilter::default(), page_req)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 分页号（0-based，第一页为 0）
    pub page: u64,
    /// 每页记录数
    pub page_size: u64,
}

impl PageRequest {
    /// 创建分页请求，`page_size` 为 0 时按 1 处理
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page, page_size: page_size.max(1) }
    }

    /// LIMIT/OFFSET 中的 OFFSET
    #[inline]
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.page_size)
    }

    /// LIMIT/OFFSET 中的 LIMIT
    #[inline]
    pub fn limit(&self) -> u64 {
        self.page_size
    }

    #[inline]
    pub fn next_page(&self) -> Self {
        Self { page: self.page + 1, page_size: self.page_size }
    }

    #[inline]
    pub fn prev_page(&self) -> Option<Self> {
        self.page.checked_sub(1).map(|page| Self { page, page_size: self.page_size })
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, 20)
    }
}

impl fmt::Display for PageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page={}, page_size={}", self.page, self.page_size)
    }
}

/// 分页结果
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    /// 当前页的数据
    pub content: Vec<T>,
    /// 符合条件的总记录数
    pub total_elements: u64,
    /// 当前页号（0-based）
    pub page: u64,
    /// 每页记录数
    pub page_size: u64,
}

impl<T> PageResult<T> {
    pub fn new(content: Vec<T>, total_elements: u64, page: u64, page_size: u64) -> Self {
        Self { content, total_elements, page, page_size }
    }

    /// 空结果
    pub fn empty(page_req: PageRequest) -> Self {
        Self::new(Vec::new(), 0, page_req.page, page_req.page_size)
    }

    /// 总页数
    #[inline]
    pub fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(self.page_size.max(1))
    }

    #[inline]
    pub fn has_next(&self) -> bool {
        (self.page + 1) < self.total_pages()
    }

    #[inline]
    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    /// 转换分页结果的数据类型
    pub fn map<U, F>(self, f: F) -> PageResult<U>
    where
        F: FnMut(T) -> U,
    {
        PageResult {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// History 列表的过滤条件
///
/// - `app_label` / `model`：精确匹配
/// - `search`：等于 source_id，或出现在 `app_label.model` 中（不区分大小写）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub app_label: Option<String>,
    pub model: Option<String>,
    pub search: Option<String>,
}

impl HistoryFilter {
    pub fn is_empty(&self) -> bool {
        self.app_label.is_none() && self.model.is_none() && self.search.is_none()
    }

    pub fn matches(&self, history: &History) -> bool {
        if self.app_label.as_deref().is_some_and(|a| a != history.app_label) {
            return false;
        }
        if self.model.as_deref().is_some_and(|m| m != history.model) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                term == history.source_id.to_string()
                    || format!("{}.{}", history.app_label, history.model)
                        .to_lowercase()
                        .contains(&term.to_lowercase())
            }
        }
    }
}

// ============================================================================
// 仓储接口
// ============================================================================

/// 单个事务内可用的写操作
///
/// 所有方法在同一个原子单元里执行，由 `HistoryCmdRepo::atomic` 提供。
pub trait HistoryTx {
    /// 按 (app_label, model, source_id) 查找 History（不看 source_type 是否已置空）
    fn find_history(&mut self, key: &SourceKey) -> Result<Option<History>, RepoError>;

    /// 插入新 History
    ///
    /// # 错误
    /// - `UniqueViolation`: 同一实体已有 History（并发首存时由唯一约束拦截）
    fn insert_history(&mut self, key: &SourceKey, now: DateTime<Utc>) -> Result<History, RepoError>;

    /// 重新挂上源实体引用
    fn attach_source(&mut self, history_id: u64, entity_type: &EntityType) -> Result<(), RepoError>;

    /// 最新一条日志
    fn latest_log(&mut self, history_id: u64) -> Result<Option<LogEntry>, RepoError>;

    /// 追加日志行
    fn append_log(
        &mut self,
        history_id: u64,
        fields: FieldMap,
        updated: FieldMap,
        now: DateTime<Utc>,
    ) -> Result<LogEntry, RepoError>;

    /// 只更新 History 的 last_modified_at
    fn touch_history(&mut self, history_id: u64, now: DateTime<Utc>) -> Result<(), RepoError>;
}

/// History 写仓储
pub trait HistoryCmdRepo: Send + Sync {
    /// 在一个事务里执行 `f`
    ///
    /// `f` 返回 `Ok` 时提交，返回 `Err` 时回滚其间的全部写入。
    fn atomic<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn HistoryTx) -> Result<R, E>,
        E: From<RepoError>;

    /// 源实体被删除：置空 source_type，保留 History 与全部日志
    ///
    /// 返回更新后的 History；该实体从未被记录过时返回 `None`
    fn detach_source(&self, key: &SourceKey) -> Result<Option<History>, RepoError>;
}

/// History 只读仓储（后台浏览用）
pub trait HistoryQueryRepo: Send + Sync {
    fn find_history_by_id(&self, id: u64) -> Result<Option<History>, RepoError>;

    fn find_history(&self, key: &SourceKey) -> Result<Option<History>, RepoError>;

    /// 按创建时间倒序分页
    fn list_histories(
        &self,
        filter: &HistoryFilter,
        page_req: PageRequest,
    ) -> Result<PageResult<History>, RepoError>;

    /// 某个 History 的全部日志，按创建时间倒序
    fn logs_for(&self, history_id: u64) -> Result<Vec<LogEntry>, RepoError>;

    fn count_histories(&self) -> Result<u64, RepoError> {
        Ok(self.list_histories(&HistoryFilter::default(), PageRequest::new(0, 1))?.total_elements)
    }

    fn count_logs(&self, history_id: u64) -> Result<u64, RepoError> {
        Ok(self.logs_for(history_id)?.len() as u64)
    }
}

/// 仓储错误类型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    /// 唯一约束冲突
    #[error("history for {app_label}.{model} {source_id} already exists")]
    UniqueViolation { app_label: String, model: String, source_id: u64 },
    /// History 不存在
    #[error("history {0} not found")]
    HistoryNotFound(u64),
    /// 读回的 JSON 列不合法
    #[error("malformed JSON in column `{column}`: {reason}")]
    MalformedJson { column: &'static str, reason: String },
    /// 读回的非 JSON 列不合法（时间戳越界、source_type 格式错误）
    #[error("malformed value in column `{column}`: {reason}")]
    MalformedRow { column: &'static str, reason: String },
    /// 连接失败
    #[error("connection error: {0}")]
    Connection(String),
    /// 语句执行失败
    #[error("query error: {0}")]
    Query(String),
}

impl RepoError {
    pub fn unique_violation(key: &SourceKey) -> Self {
        RepoError::UniqueViolation {
            app_label: key.entity_type.app_label.to_string(),
            model: key.entity_type.model.to_string(),
            source_id: key.source_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(id: u64, app_label: &str, model: &str, source_id: u64) -> History {
        let key = SourceKey::new(EntityType::new(app_label.to_string(), model.to_string()), source_id);
        History::new(id, &key, Utc::now())
    }

    #[test]
    fn test_page_request_offsets() {
        let page_req = PageRequest::new(2, 20);
        assert_eq!(page_req.offset(), 40);
        assert_eq!(page_req.limit(), 20);
        assert_eq!(page_req.prev_page(), Some(PageRequest::new(1, 20)));
        assert_eq!(PageRequest::new(0, 20).prev_page(), None);
        // page_size 为 0 时按 1 处理
        assert_eq!(PageRequest::new(0, 0).page_size, 1);
    }

    #[test]
    fn test_page_result_pages() {
        let result = PageResult::new(vec![1, 2], 5, 0, 2);
        assert_eq!(result.total_pages(), 3);
        assert!(result.has_next());
        assert!(!result.has_previous());

        let last = PageResult::new(vec![5], 5, 2, 2);
        assert!(!last.has_next());
        assert_eq!(last.map(|x| x * 10).content, vec![50]);
    }

    #[test]
    fn test_history_filter_matches() {
        let h = history(1, "auth", "user", 42);

        assert!(HistoryFilter::default().matches(&h));
        assert!(HistoryFilter { app_label: Some("auth".into()), ..Default::default() }.matches(&h));
        assert!(!HistoryFilter { model: Some("group".into()), ..Default::default() }.matches(&h));
        assert!(HistoryFilter { search: Some("42".into()), ..Default::default() }.matches(&h));
        assert!(HistoryFilter { search: Some("Auth.U".into()), ..Default::default() }.matches(&h));
        assert!(!HistoryFilter { search: Some("4".into()), ..Default::default() }.matches(&h));
    }
}
