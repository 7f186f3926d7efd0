//! 从不稳定的响应包络中提取记录数组。
//!
//! 厂商不保证包络稳定：记录数组的位置随固件版本、随查询与搜索两种
//! 响应格式漂移。提取先按已知结构路径逐一尝试，再退回深度优先搜索
//! 第一个数组节点。

use contracts::{RawPage, RawRecord};
use serde_json::Value;

/// 已知包络路径，按顺序尝试。靠前的是文档化的形态，靠后的是现场
/// 观察到的变体。
const RECORD_PATHS: &[&[&str]] = &[
    &["SearchResult", "AcsEvent", "InfoList"],
    &["AcsEvent", "InfoList"],
    &["AcsEvent", "Events"],
    &["AcsEventSearchResult", "MatchList"],
    &["AcsEventSearchResult", "Items", "Item"],
    &["data", "list"],
    &["list"],
    &["Events"],
    &["infos"],
    &["rows"],
];

/// 把原始响应体解析为一页。空体或无法解析的体产出空页而不是错误，
/// 保证窗口推进单调。
pub fn parse_body(body: &str) -> RawPage {
    if body.trim().is_empty() {
        return RawPage::default();
    }
    match serde_json::from_str::<Value>(body) {
        Ok(root) => parse_page(&root),
        Err(_) => RawPage::default(),
    }
}

/// 从解码后的响应树提取记录与分页元数据
pub fn parse_page(root: &Value) -> RawPage {
    let records = locate_records(root);

    // 分页计数器与记录同级，要么在 SearchResult 包络下，要么在顶层
    let envelope = match root.get("SearchResult") {
        Some(node) if node.is_object() => node,
        _ => root,
    };

    let total_matches = envelope
        .get("totalMatches")
        .and_then(coerce_u64)
        .filter(|&t| t > 0);
    let num_matches = envelope
        .get("numOfMatches")
        .and_then(coerce_u64)
        .unwrap_or(records.len() as u64);
    let search_position = envelope.get("searchResultPosition").and_then(coerce_u64);

    RawPage {
        records,
        total_matches,
        num_matches,
        search_position,
    }
}

/// 定位记录数组：先按已知路径，再 DFS 兜底。
fn locate_records(root: &Value) -> Vec<RawRecord> {
    for path in RECORD_PATHS {
        let mut node = root;
        let mut matched = true;
        for seg in *path {
            match node.get(seg) {
                Some(next) => node = next,
                None => {
                    matched = false;
                    break;
                }
            }
        }
        if !matched {
            continue;
        }
        match node {
            Value::Array(items) => return records_from(items),
            // 部分固件把单条命中折叠成裸对象
            Value::Object(map) => return vec![map.clone()],
            _ => {}
        }
    }

    match first_array_dfs(root) {
        Some(items) => records_from(items),
        None => Vec::new(),
    }
}

/// 深度优先搜索第一个数组节点
fn first_array_dfs(node: &Value) -> Option<&Vec<Value>> {
    match node {
        Value::Array(items) => Some(items),
        Value::Object(map) => {
            for child in map.values() {
                if let Some(found) = first_array_dfs(child) {
                    return Some(found);
                }
            }
            None
        }
        _ => None,
    }
}

fn records_from(items: &[Value]) -> Vec<RawRecord> {
    items
        .iter()
        .filter_map(|item| item.as_object().cloned())
        .collect()
}

/// 计数器在部分固件上是整数，在另一些上是带引号的字符串
fn coerce_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
