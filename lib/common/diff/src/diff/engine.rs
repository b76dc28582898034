use super::diff_types::FieldMap;

/// 比较前后两份快照，返回变更字段的旧值（before-image）
///
/// - 旧快照有、新快照没有的字段：记录旧值
/// - 两边都有但值不同的字段：记录旧值
/// - 只在新快照出现的字段不记录
///
/// 返回空映射表示没有变化
pub fn diff_fields(previous: &FieldMap, current: &FieldMap) -> FieldMap {
    previous
        .iter()
        .filter(|(name, old)| current.get(name.as_str()) != Some(*old))
        .map(|(name, old)| (name.clone(), old.clone()))
        .collect()
}

/// 是否存在需要记录的变化
#[inline]
pub fn has_changes(previous: &FieldMap, current: &FieldMap) -> bool {
    previous.iter().any(|(name, old)| current.get(name.as_str()) != Some(old))
}
