//! Canonicalization of decoded plans into the five-bucket hierarchy
//!
//! The generation model is asked for a fixed JSON shape but routinely
//! improvises: strings where objects belong, goal/output pairs instead of
//! task lists, week labels in half a dozen spellings. This module accepts
//! all of it and produces one canonical [`TaskHierarchy`], deriving concrete
//! calendar dates for daily tasks from the plan start date.
//!
//! Normalization is idempotent: feeding a canonical hierarchy back through
//! with the same start date reproduces it.

use chrono::{Datelike, Days, NaiveDate};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{TaskHierarchy, TaskNode};

/// Default effort for a monthly bucket when the model omits hours
const MONTHLY_DEFAULT_HOURS: f64 = 40.0;

/// Default effort for a quarterly bucket
const QUARTERLY_DEFAULT_HOURS: f64 = 120.0;

/// Default effort for a weekly bucket
const WEEKLY_DEFAULT_HOURS: f64 = 10.0;

/// Weeks per month when grouping weeks into composite daily keys
const WEEKS_PER_MONTH: u32 = 4;

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The decoded document parsed but yielded no tasks in any bucket.
    /// Recoverable upstream via the fallback hierarchy.
    #[error("Decoded plan contained no usable tasks in any bucket")]
    EmptyHierarchy,
}

/// Normalize a decoded plan document into the canonical hierarchy
pub fn normalize(doc: &serde_json::Value, start: NaiveDate) -> Result<TaskHierarchy, NormalizeError> {
    debug!(%start, "normalize: called");

    let mut hierarchy = TaskHierarchy::default();

    match doc.get("yearly") {
        Some(serde_json::Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                hierarchy.yearly.push(node_from_value(item, "y", "年度", i, None));
            }
        }
        Some(serde_json::Value::String(text)) if !text.trim().is_empty() => {
            hierarchy.yearly.push(synthesized_node("y-1", text));
        }
        _ => {}
    }

    hierarchy.quarterly = normalize_level(doc.get("quarterly"), "q", QUARTERLY_DEFAULT_HOURS);
    hierarchy.monthly = normalize_level(doc.get("monthly"), "m", MONTHLY_DEFAULT_HOURS);
    hierarchy.weekly = normalize_level(doc.get("weekly"), "w", WEEKLY_DEFAULT_HOURS);
    hierarchy.daily = normalize_daily(doc.get("daily"), start);

    if hierarchy.is_empty() {
        warn!("normalize: document decoded but every bucket was empty");
        return Err(NormalizeError::EmptyHierarchy);
    }

    debug!(
        monthly = hierarchy.monthly.len(),
        weekly = hierarchy.weekly.len(),
        daily_weeks = hierarchy.daily.len(),
        "normalize: done"
    );
    Ok(hierarchy)
}

/// Normalize one labeled level (quarterly/monthly/weekly)
///
/// Accepts three shapes per label: a goal/output object (one node), an array
/// of task items, or a bare scalar (one synthesized node).
fn normalize_level(
    level: Option<&serde_json::Value>,
    prefix: &str,
    default_hours: f64,
) -> IndexMap<String, Vec<TaskNode>> {
    let mut out = IndexMap::new();

    let Some(serde_json::Value::Object(entries)) = level else {
        return out;
    };

    for (label, entry) in entries {
        let nodes: Vec<TaskNode> = match entry {
            serde_json::Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| node_from_value(item, prefix, label, i, Some(default_hours)))
                .collect(),
            serde_json::Value::Object(obj) if !obj.contains_key("title") => {
                // goal/output shorthand: one node for the whole bucket
                let title = string_field(obj, &["goal", "task", "name"]).unwrap_or_else(|| label.clone());
                let description = string_field(obj, &["output", "description"]).unwrap_or_default();
                vec![TaskNode {
                    id: format!("{prefix}-{label}"),
                    title,
                    description,
                    estimated_hours: hours_field(obj).or(Some(default_hours)),
                    ..Default::default()
                }]
            }
            other => vec![node_from_value(other, prefix, label, 0, Some(default_hours))],
        };

        if !nodes.is_empty() {
            out.insert(label.clone(), nodes);
        }
    }

    out
}

/// Normalize the daily bucket, grouping weeks under composite month-week
/// keys and deriving a calendar date label for every day
fn normalize_daily(
    daily: Option<&serde_json::Value>,
    start: NaiveDate,
) -> IndexMap<String, IndexMap<String, Vec<TaskNode>>> {
    let mut out: IndexMap<String, IndexMap<String, Vec<TaskNode>>> = IndexMap::new();

    let Some(serde_json::Value::Object(weeks)) = daily else {
        return out;
    };

    for (week_label, days) in weeks {
        let ordinal = week_ordinal(week_label);
        let month = (ordinal - 1) / WEEKS_PER_MONTH + 1;
        let composite = format!("第{month}个月-第{ordinal}周");
        let week_days = out.entry(composite).or_default();

        match days {
            serde_json::Value::Object(entries) => {
                for (offset, (_, day_value)) in entries.iter().enumerate() {
                    push_day(week_days, start, ordinal, offset, day_value);
                }
            }
            serde_json::Value::Array(items) => {
                for (offset, day_value) in items.iter().enumerate() {
                    push_day(week_days, start, ordinal, offset, day_value);
                }
            }
            _ => {}
        }
    }

    out.retain(|_, days| !days.is_empty());
    out
}

/// Append one day's tasks under its derived calendar-date label
fn push_day(
    week_days: &mut IndexMap<String, Vec<TaskNode>>,
    start: NaiveDate,
    week_ordinal: u32,
    offset: usize,
    day_value: &serde_json::Value,
) {
    let days_from_start = u64::from(week_ordinal - 1) * 7 + offset as u64;
    let Some(date) = start.checked_add_days(Days::new(days_from_start)) else {
        warn!(week_ordinal, offset, "push_day: date overflow, skipping");
        return;
    };
    let date_label = format!("{}月{}日", date.month(), date.day());

    let mut node = match day_value {
        serde_json::Value::Object(obj) => {
            let title =
                string_field(obj, &["title", "task", "goal", "name"]).unwrap_or_else(|| "机动日".to_string());
            TaskNode {
                id: string_field(obj, &["id"]).unwrap_or_else(|| format!("d-{week_ordinal}-{}", offset + 1)),
                title,
                description: string_field(obj, &["description", "output"]).unwrap_or_default(),
                output: string_field(obj, &["output"]),
                estimated_hours: hours_field(obj).or(Some(1.0)),
                ..Default::default()
            }
        }
        serde_json::Value::Array(items) => {
            // A day can itself be a task list; flatten it in order.
            for (i, item) in items.iter().enumerate() {
                let mut n = node_from_value(item, "d", &format!("{week_ordinal}-{}", offset + 1), i, Some(1.0));
                n.start_date = Some(date);
                n.end_date = Some(date);
                week_days.entry(date_label.clone()).or_default().push(n);
            }
            return;
        }
        other => {
            let mut n = synthesized_node(&format!("d-{week_ordinal}-{}", offset + 1), &scalar_title(other));
            n.estimated_hours = Some(1.0);
            n
        }
    };

    node.start_date = Some(date);
    node.end_date = Some(date);
    week_days.entry(date_label).or_default().push(node);
}

/// Build a task node from one list item, tolerating scalars
fn node_from_value(
    value: &serde_json::Value,
    prefix: &str,
    label: &str,
    index: usize,
    default_hours: Option<f64>,
) -> TaskNode {
    let fallback_id = format!("{prefix}-{label}-{}", index + 1);

    if let serde_json::Value::Object(obj) = value {
        let mut node: TaskNode = serde_json::from_value(value.clone()).unwrap_or_default();
        if node.title.trim().is_empty() {
            node.title = string_field(obj, &["goal", "task", "name"]).unwrap_or_else(|| label.to_string());
        }
        if node.id.trim().is_empty() {
            node.id = fallback_id;
        }
        if node.estimated_hours.is_none() {
            node.estimated_hours = hours_field(obj).or(default_hours);
        }
        node
    } else {
        let mut node = synthesized_node(&fallback_id, &scalar_title(value));
        node.estimated_hours = default_hours;
        node
    }
}

fn synthesized_node(id: &str, title: &str) -> TaskNode {
    TaskNode {
        id: id.to_string(),
        title: title.to_string(),
        ..Default::default()
    }
}

fn scalar_title(value: &serde_json::Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

fn string_field(obj: &serde_json::Map<String, serde_json::Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(|v| v.as_str()))
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
}

fn hours_field(obj: &serde_json::Map<String, serde_json::Value>) -> Option<f64> {
    ["hours", "estimated_hours"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(|v| v.as_f64()))
}

/// Extract the week ordinal from a label like `第3周` or `第1个月-第2周`
///
/// Takes the digits immediately before the last `周`; composite labels keep
/// the month part from shadowing the week number. Falls back to the first
/// integer anywhere in the label, then to week 1.
fn week_ordinal(label: &str) -> u32 {
    if let Some(pos) = label.rfind('周') {
        let digits: Vec<char> = label[..pos]
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let digits: String = digits.into_iter().rev().collect();
        if let Ok(n) = digits.parse::<u32>()
            && n >= 1
        {
            return n;
        }
    }

    let mut run = String::new();
    for c in label.chars() {
        if c.is_ascii_digit() {
            run.push(c);
        } else if !run.is_empty() {
            break;
        }
    }
    run.parse().ok().filter(|&n| n >= 1).unwrap_or(1)
}

/// Minimal single-week hierarchy used when generation output is unusable
///
/// Keeps the pipeline's output contract intact so the caller always gets a
/// plan it can render and regenerate from.
pub fn fallback_hierarchy(daily_hours: f64, start: NaiveDate) -> TaskHierarchy {
    warn!(daily_hours, %start, "fallback_hierarchy: substituting minimal plan");

    let mut hierarchy = TaskHierarchy::default();

    hierarchy.monthly.insert(
        "第1个月 - 基础学习".to_string(),
        vec![TaskNode {
            id: "m1-1".to_string(),
            title: "学习基础知识".to_string(),
            description: "掌握领域核心概念，建立知识框架".to_string(),
            estimated_hours: Some(daily_hours * 10.0),
            ..Default::default()
        }],
    );

    hierarchy.weekly.insert(
        "第1周 - 入门".to_string(),
        vec![TaskNode {
            id: "w1-1".to_string(),
            title: "了解基础概念".to_string(),
            description: "完成入门资料的阅读和整理".to_string(),
            estimated_hours: Some(daily_hours * 5.0),
            ..Default::default()
        }],
    );

    let date_label = format!("{}月{}日", start.month(), start.day());
    let mut first_week = IndexMap::new();
    first_week.insert(
        date_label,
        vec![TaskNode {
            id: "d-1-1".to_string(),
            title: "环境准备".to_string(),
            description: "安装工具，收集学习资料".to_string(),
            estimated_hours: Some(daily_hours),
            start_date: Some(start),
            end_date: Some(start),
            ..Default::default()
        }],
    );
    hierarchy.daily.insert("第1个月-第1周".to_string(), first_week);

    hierarchy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    #[test]
    fn test_week_ordinal_forms() {
        assert_eq!(week_ordinal("第1周"), 1);
        assert_eq!(week_ordinal("第12周"), 12);
        assert_eq!(week_ordinal("第2个月-第5周"), 5);
        assert_eq!(week_ordinal("week 3"), 3);
        assert_eq!(week_ordinal("机动周"), 1);
    }

    #[test]
    fn test_normalize_canonical_document() {
        let doc = serde_json::json!({
            "yearly": ["完成网页开发入门并上线个人站点"],
            "monthly": {
                "第1个月": {"goal": "HTML与CSS基础", "output": "三个静态页面"},
                "第2个月": {"goal": "JavaScript入门", "output": "交互组件"}
            },
            "weekly": {
                "第1周": [{"id": "w1-1", "title": "学习HTML常用标签", "estimated_hours": 8}]
            },
            "daily": {
                "第1周": {
                    "Day1": {"title": "搭建开发环境", "hours": 2},
                    "Day2": {"title": "HTML文档结构", "hours": 2}
                }
            }
        });

        let h = normalize(&doc, start()).unwrap();

        assert_eq!(h.yearly[0].title, "完成网页开发入门并上线个人站点");
        assert_eq!(h.monthly["第1个月"][0].title, "HTML与CSS基础");
        assert_eq!(h.monthly["第1个月"][0].description, "三个静态页面");
        assert_eq!(h.monthly["第1个月"][0].estimated_hours, Some(40.0));
        assert_eq!(h.weekly["第1周"][0].estimated_hours, Some(8.0));

        let week = &h.daily["第1个月-第1周"];
        assert_eq!(week["1月5日"][0].title, "搭建开发环境");
        assert_eq!(week["1月6日"][0].title, "HTML文档结构");
        assert_eq!(week["1月5日"][0].start_date, Some(start()));
    }

    #[test]
    fn test_normalize_daily_week_offset_dates() {
        let doc = serde_json::json!({
            "daily": {
                "第5周": {"Day1": {"title": "复盘"}}
            }
        });

        let h = normalize(&doc, start()).unwrap();

        // Week 5 starts 28 days after 2026-01-05, and groups into month 2.
        let week = &h.daily["第2个月-第5周"];
        assert_eq!(week["2月2日"][0].title, "复盘");
        assert_eq!(week["2月2日"][0].estimated_hours, Some(1.0));
    }

    #[test]
    fn test_normalize_degraded_shapes() {
        let doc = serde_json::json!({
            "monthly": {"第1个月": "打好基础"},
            "weekly": {"第1周": ["看教程", {"title": "做练习"}]},
            "daily": {"第1周": ["装环境", "读文档"]}
        });

        let h = normalize(&doc, start()).unwrap();

        assert_eq!(h.monthly["第1个月"][0].title, "打好基础");
        assert_eq!(h.monthly["第1个月"][0].id, "m-第1个月-1");
        assert_eq!(h.weekly["第1周"][0].title, "看教程");
        assert_eq!(h.weekly["第1周"][1].title, "做练习");
        assert_eq!(h.weekly["第1周"][1].id, "w-第1周-2");

        let week = &h.daily["第1个月-第1周"];
        assert_eq!(week["1月5日"][0].title, "装环境");
        assert_eq!(week["1月6日"][0].title, "读文档");
    }

    #[test]
    fn test_normalize_empty_is_error() {
        let doc = serde_json::json!({"notes": "模型输出了别的东西"});
        assert!(matches!(normalize(&doc, start()), Err(NormalizeError::EmptyHierarchy)));
    }

    #[test]
    fn test_normalize_idempotent_on_canonical_output() {
        let doc = serde_json::json!({
            "yearly": ["上线个人站点"],
            "monthly": {"第1个月": {"goal": "基础", "output": "页面"}},
            "weekly": {"第1周": [{"id": "w1-1", "title": "HTML"}]},
            "daily": {
                "第1周": {"Day1": {"title": "装环境", "hours": 2}},
                "第2周": {"Day1": {"title": "写页面"}}
            }
        });

        let first = normalize(&doc, start()).unwrap();
        let reencoded = serde_json::to_value(&first).unwrap();
        let second = normalize(&reencoded, start()).unwrap();

        assert_eq!(
            serde_json::to_value(&second).unwrap(),
            serde_json::to_value(&first).unwrap()
        );
    }

    #[test]
    fn test_fallback_hierarchy_contract() {
        let h = fallback_hierarchy(2.0, start());

        assert!(!h.is_empty());
        assert_eq!(h.monthly["第1个月 - 基础学习"][0].estimated_hours, Some(20.0));
        assert_eq!(h.daily["第1个月-第1周"]["1月5日"][0].title, "环境准备");
        assert_eq!(h.daily["第1个月-第1周"]["1月5日"][0].estimated_hours, Some(2.0));
    }
}
