//! 配置文件加载与只读后台浏览

use std::io::Write;
use std::sync::Arc;

use db_repo::{HistoryFilter, MemHistoryRepo};
use model_history::{ConfigError, HistoryAdmin, HistoryConfig, HistorySite, Registration, Signal};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize, entity_derive::Trackable)]
#[trackable(app_label = "auth", model = "user")]
struct User {
    id: u64,
    username: String,
    password: String,
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "log_filter: model_history=debug\ndefault_exclude:\n  - password\nadmin:\n  page_size: 5"
    )
    .unwrap();

    let config = HistoryConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.log_filter, "model_history=debug");
    assert_eq!(config.default_exclude, vec!["password"]);
    assert_eq!(config.admin.page_size, 5);
}

#[test]
fn test_load_config_missing_file() {
    let err = HistoryConfig::load_from_file("/nonexistent/history.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_admin_list_and_detail() {
    // Given: 按配置排除 password，三个用户，其中一个改过名
    let config = HistoryConfig::from_yaml_str("default_exclude: [password]\nadmin:\n  page_size: 2\n").unwrap();
    let repo = Arc::new(MemHistoryRepo::new());
    let site = HistorySite::from_config(repo.clone(), &config);
    site.register::<User>(Registration::all()).unwrap();

    for id in 1..=3 {
        let user = User { id, username: format!("user{id}"), password: "x".into() };
        site.send(Signal::PostSave { created: true }, &user).unwrap();
    }
    let renamed = User { id: 2, username: "<admin>".into(), password: "y".into() };
    site.send(Signal::PostSave { created: false }, &renamed).unwrap();

    // When
    let admin = HistoryAdmin::new(repo, config.admin.clone());
    let page = admin.list(&HistoryFilter::default(), admin.page(0)).unwrap();
    let searched = admin
        .list(&HistoryFilter { search: Some("2".into()), ..Default::default() }, admin.page(0))
        .unwrap();
    let history_id = searched.content[0].id;
    let detail = admin.detail(history_id).unwrap().unwrap();

    // Then
    assert_eq!(page.total_elements, 3);
    assert_eq!(page.content.len(), 2);
    assert_eq!(page.total_pages(), 2);

    assert_eq!(searched.total_elements, 1);
    assert_eq!(detail.label, "auth.user 2");
    assert_eq!(detail.rows.len(), 2);
    // 最新在前，diff 为旧值
    assert_eq!(detail.rows[0].updated, "{\n  \"username\": \"user2\"\n}");
    assert_eq!(
        detail.rows[0].fields,
        serde_json::to_string_pretty(&json!({"id": 2, "username": "<admin>"})).unwrap()
    );
    assert!(detail.rows[0].label.starts_with("History for auth.user 2 at "));
    assert_eq!(detail.rows[1].updated, "{}");

    assert!(admin.detail(999).unwrap().is_none());
}
