//! Query intent and day-section helpers for itinerary answers.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

fn day_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Day\s*\d+\s*[:：]").expect("valid day marker pattern"))
}

fn trip_length() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9]+|[一二两三四五六七八九]?十[一二三四五六七八九]?|[一二两三四五六七八九])\s*(?:日游|天)")
            .expect("valid trip length pattern")
    })
}

const PLAN_KEYWORDS: &[&str] = &["行程", "日游", "安排", "路线", "规划", "几天", "怎么玩"];

const LOOKUP_KEYWORDS: &[&str] = &[
    "门票", "票价", "开放时间", "营业时间", "几点", "怎么去", "交通", "地址", "在哪", "预约",
    "多少钱", "电话", "哪家", "正宗", "特色",
];

/// Trip length asked for in `text`, e.g. `3` for "承德3日游" or "两天".
/// A bare `日` is a date, not a length.
pub fn requested_days(text: &str) -> Option<u32> {
    let caps = trip_length().captures(text)?;
    let raw = caps.get(1)?.as_str();
    let days = match raw.parse::<u32>() {
        Ok(n) => n,
        Err(_) => chinese_number(raw)?,
    };
    (days > 0).then_some(days)
}

fn chinese_digit(c: char) -> Option<u32> {
    "一二三四五六七八九"
        .chars()
        .position(|d| d == c)
        .map(|i| i as u32 + 1)
        .or_else(|| (c == '两').then_some(2))
}

/// Numerals up to 九十九, e.g. 十二 or 二十.
fn chinese_number(raw: &str) -> Option<u32> {
    match raw.split_once('十') {
        Some((tens, ones)) => {
            let tens = match tens.chars().next() {
                Some(c) => chinese_digit(c)?,
                None => 1,
            };
            let ones = match ones.chars().next() {
                Some(c) => chinese_digit(c)?,
                None => 0,
            };
            Some(tens * 10 + ones)
        }
        None => chinese_digit(raw.chars().next()?),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// A trip plan, rendered day by day.
    Itinerary,
    /// A direct factual question such as a ticket price.
    Lookup,
}

impl QueryIntent {
    pub fn classify(query: &str) -> Self {
        let asks_plan =
            requested_days(query).is_some() || PLAN_KEYWORDS.iter().any(|k| query.contains(k));
        if asks_plan {
            return QueryIntent::Itinerary;
        }
        if LOOKUP_KEYWORDS.iter().any(|k| query.contains(k)) {
            return QueryIntent::Lookup;
        }
        QueryIntent::Itinerary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySection {
    /// Marker as written, e.g. `Day 1：`.
    pub title: String,
    pub body: String,
}

/// Split an answer at `Day N:` markers. Text before the first marker is
/// not part of any section; an answer without markers yields no sections.
pub fn split_days(answer: &str) -> Vec<DaySection> {
    let marks: Vec<_> = day_marker().find_iter(answer).collect();
    marks
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let end = marks.get(i + 1).map_or(answer.len(), |next| next.start());
            DaySection {
                title: m.as_str().trim().to_string(),
                body: answer[m.end()..end].trim().to_string(),
            }
        })
        .collect()
}
