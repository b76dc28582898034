//! 只读后台浏览

use std::sync::Arc;

use chrono::{DateTime, Utc};
use db_repo::{HistoryFilter, HistoryQueryRepo, PageRequest, PageResult};
use diff::{pretty_json, FieldMap, History, LogEntry};
use serde::Serialize;

use crate::config::AdminConfig;
use crate::error::Result;

/// 日志行的展示形式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRow {
    pub id: u64,
    pub label: String,
    pub created_at: DateTime<Utc>,
    /// 排序 + 2 空格缩进的 JSON
    pub fields: String,
    pub updated: String,
    /// `render_pre` 渲染后的 HTML
    pub fields_html: String,
    pub updated_html: String,
}

impl LogRow {
    fn new(history: &History, entry: &LogEntry) -> Self {
        Self {
            id: *entry.id(),
            label: entry.label(history, None),
            created_at: *entry.created_at(),
            fields: pretty_json(entry.fields()),
            updated: pretty_json(entry.updated()),
            fields_html: render_pre(entry.fields()),
            updated_html: render_pre(entry.updated()),
        }
    }
}

/// History 详情：头记录 + 日志（最新在前）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryDetail {
    pub history: History,
    pub label: String,
    pub rows: Vec<LogRow>,
}

/// 只读浏览，不提供任何写操作
pub struct HistoryAdmin<Q> {
    repo: Arc<Q>,
    config: AdminConfig,
}

impl<Q: HistoryQueryRepo> HistoryAdmin<Q> {
    pub fn new(repo: Arc<Q>, config: AdminConfig) -> Self {
        Self { repo, config }
    }

    /// 默认分页
    pub fn page(&self, page: u64) -> PageRequest {
        PageRequest::new(page, self.config.page_size)
    }

    /// 按 app_label / model 过滤、按 source_id 或 `app_label.model` 搜索，创建时间倒序
    pub fn list(&self, filter: &HistoryFilter, page_req: PageRequest) -> Result<PageResult<History>> {
        Ok(self.repo.list_histories(filter, page_req)?)
    }

    /// 单个 History 与全部日志；不存在时为 None
    pub fn detail(&self, history_id: u64) -> Result<Option<HistoryDetail>> {
        let Some(history) = self.repo.find_history_by_id(history_id)? else {
            return Ok(None);
        };
        let rows = self.repo.logs_for(history_id)?.iter().map(|e| LogRow::new(&history, e)).collect();
        Ok(Some(HistoryDetail { label: history.label(None), history, rows }))
    }
}

/// 以 `<pre>` 包裹的 HTML 片段，内容已转义
pub fn render_pre(fields: &FieldMap) -> String {
    format!(r#"<pre style="white-space: pre-wrap;">{}</pre>"#, escape_html(&pretty_json(fields)))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
