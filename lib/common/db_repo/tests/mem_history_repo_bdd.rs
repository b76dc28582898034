//! MemHistoryRepo BDD 测试
//!
//! 场景：在事务里写入 History 与日志行，验证提交、回滚、唯一约束与查询排序

use chrono::{DateTime, Duration, TimeZone, Utc};
use db_repo::{
    HistoryCmdRepo, HistoryFilter, HistoryQueryRepo, MemHistoryRepo, PageRequest, RepoError,
};
use diff::{EntityType, FieldMap, SourceKey};
use serde_json::json;

// ============================================================================
// 测试辅助
// ============================================================================

fn user(id: u64) -> SourceKey {
    SourceKey::new(EntityType::new_static("auth", "user"), id)
}

fn group(id: u64) -> SourceKey {
    SourceKey::new(EntityType::new_static("auth", "group"), id)
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn fields(name: &str) -> FieldMap {
    let mut map = FieldMap::new();
    map.insert("username".into(), json!(name));
    map
}

// ============================================================================
// BDD 场景 1：事务提交后 History 与日志可查
// ============================================================================

#[test]
fn scenario_commit_makes_rows_visible() {
    // ========== Given（给定）==========
    let repo = MemHistoryRepo::new();

    // ========== When（当）==========
    let history = repo
        .atomic(|tx| {
            let history = tx.insert_history(&user(1), t0())?;
            tx.append_log(history.id, fields("alice"), FieldMap::new(), t0())?;
            Ok::<_, RepoError>(history)
        })
        .unwrap();

    // ========== Then（那么）==========
    assert_eq!(repo.find_history(&user(1)).unwrap(), Some(history.clone()));
    assert_eq!(repo.find_history_by_id(history.id).unwrap(), Some(history.clone()));
    assert_eq!(repo.count_logs(history.id).unwrap(), 1);
    assert_eq!(repo.logs_for(history.id).unwrap()[0].fields(), &fields("alice"));
}

// ============================================================================
// BDD 场景 2：闭包返回 Err 时全部写入回滚
// ============================================================================

#[test]
fn scenario_error_rolls_back_every_write() {
    // ========== Given（给定）==========
    // 已有一条提交过的 History
    let repo = MemHistoryRepo::new();
    let existing = repo
        .atomic(|tx| {
            let h = tx.insert_history(&user(1), t0())?;
            tx.append_log(h.id, fields("alice"), FieldMap::new(), t0())?;
            Ok::<_, RepoError>(h)
        })
        .unwrap();

    // ========== When（当）==========
    // 在同一事务里：新建 History、追加日志、touch 旧记录，然后失败
    let result: Result<(), RepoError> = repo.atomic(|tx| {
        let h = tx.insert_history(&user(2), t0())?;
        tx.append_log(h.id, fields("bob"), FieldMap::new(), t0())?;
        tx.append_log(existing.id, fields("alice2"), fields("alice"), t0())?;
        tx.touch_history(existing.id, t0() + Duration::hours(1))?;
        Err(RepoError::Query("boom".into()))
    });

    // ========== Then（那么）==========
    assert_eq!(result, Err(RepoError::Query("boom".into())));
    assert_eq!(repo.find_history(&user(2)).unwrap(), None);
    assert_eq!(repo.count_histories().unwrap(), 1);
    assert_eq!(repo.count_logs(existing.id).unwrap(), 1);
    assert_eq!(repo.find_history(&user(1)).unwrap(), Some(existing));
}

// ============================================================================
// BDD 场景 3：唯一约束拦截重复 History
// ============================================================================

#[test]
fn scenario_unique_constraint_rejects_duplicate() {
    // ========== Given（给定）==========
    let repo = MemHistoryRepo::new();
    repo.atomic(|tx| tx.insert_history(&user(1), t0()).map(|_| ())).unwrap();

    // ========== When（当）==========
    let result = repo.atomic(|tx| tx.insert_history(&user(1), t0()));

    // ========== Then（那么）==========
    assert_eq!(
        result,
        Err(RepoError::UniqueViolation { app_label: "auth".into(), model: "user".into(), source_id: 1 })
    );
    // 不同模型、相同 id 不冲突
    assert!(repo.atomic(|tx| tx.insert_history(&group(1), t0())).is_ok());
    assert_eq!(repo.count_histories().unwrap(), 2);
}

// ============================================================================
// BDD 场景 4：detach_source 置空引用但保留日志
// ============================================================================

#[test]
fn scenario_detach_keeps_trail() {
    // ========== Given（给定）==========
    let repo = MemHistoryRepo::new();
    let history = repo
        .atomic(|tx| {
            let h = tx.insert_history(&user(1), t0())?;
            tx.append_log(h.id, fields("alice"), FieldMap::new(), t0())?;
            Ok::<_, RepoError>(h)
        })
        .unwrap();

    // ========== When（当）==========
    let detached = repo.detach_source(&user(1)).unwrap().unwrap();

    // ========== Then（那么）==========
    assert!(detached.is_detached());
    assert_eq!(repo.count_logs(history.id).unwrap(), 1);
    // 从未记录过的实体返回 None
    assert_eq!(repo.detach_source(&user(99)).unwrap(), None);

    // 重新挂上源引用
    repo.atomic(|tx| tx.attach_source(history.id, &EntityType::new_static("auth", "user"))).unwrap();
    assert!(!repo.find_history_by_id(history.id).unwrap().unwrap().is_detached());
}

// ============================================================================
// BDD 场景 5：列表倒序分页与过滤
// ============================================================================

#[test]
fn scenario_list_newest_first_with_filter() {
    // ========== Given（给定）==========
    // 三个用户、一个组，创建时间依次递增
    let repo = MemHistoryRepo::new();
    let keys = [user(1), user(2), group(7), user(3)];
    for (i, key) in keys.iter().enumerate() {
        let now = t0() + Duration::minutes(i as i64);
        repo.atomic(|tx| tx.insert_history(key, now).map(|_| ())).unwrap();
    }

    // ========== When（当）==========
    let first = repo.list_histories(&HistoryFilter::default(), PageRequest::new(0, 2)).unwrap();
    let second = repo.list_histories(&HistoryFilter::default(), PageRequest::new(1, 2)).unwrap();
    let users = repo
        .list_histories(
            &HistoryFilter { model: Some("user".into()), ..Default::default() },
            PageRequest::default(),
        )
        .unwrap();
    let by_id = repo
        .list_histories(
            &HistoryFilter { search: Some("7".into()), ..Default::default() },
            PageRequest::default(),
        )
        .unwrap();

    // ========== Then（那么）==========
    let ids: Vec<u64> = first.content.iter().map(|h| h.source_id).collect();
    assert_eq!(ids, vec![3, 7]);
    assert_eq!(first.total_elements, 4);
    assert!(first.has_next());
    assert!(!second.has_next());

    assert_eq!(users.total_elements, 3);
    assert_eq!(by_id.content.len(), 1);
    assert_eq!(by_id.content[0].model, "group");
}

// ============================================================================
// BDD 场景 6：日志按写入倒序返回，latest_log 取最新一行
// ============================================================================

#[test]
fn scenario_logs_newest_first() {
    // ========== Given（给定）==========
    let repo = MemHistoryRepo::new();
    let history = repo.atomic(|tx| tx.insert_history(&user(1), t0())).unwrap();

    // ========== When（当）==========
    for name in ["a", "b", "c"] {
        repo.atomic(|tx| tx.append_log(history.id, fields(name), FieldMap::new(), t0()).map(|_| ()))
            .unwrap();
    }
    let latest = repo.atomic(|tx| tx.latest_log(history.id)).unwrap().unwrap();

    // ========== Then（那么）==========
    let names: Vec<_> = repo
        .logs_for(history.id)
        .unwrap()
        .iter()
        .map(|e| e.fields()["username"].clone())
        .collect();
    assert_eq!(names, vec![json!("c"), json!("b"), json!("a")]);
    assert_eq!(latest.fields(), &fields("c"));

    // 不存在的 History 不能追加日志
    let missing = repo.atomic(|tx| tx.append_log(999, FieldMap::new(), FieldMap::new(), t0()));
    assert_eq!(missing.map(|_| ()), Err(RepoError::HistoryNotFound(999)));
}
