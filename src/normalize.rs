//! Adapters from heterogeneous upstream result payloads to [`DrawResult`].
//!
//! Upstreams disagree on field names, number representation (six discrete
//! fields vs. one array), date format and whether a prize-tier breakdown is
//! present at all. Each known shape gets its own adapter, selected by an
//! explicit [`SourceKind`] tag. Adapters translate structure and apply
//! defensive defaults only; missing informational fields become zeros, never
//! inferred values.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::{DrawResult, MAX_NUMBER, MIN_NUMBER, NUMBER_COUNT};

/// Highest prize tier kept in `DrawResult::prize_amounts`.
const PRIZE_TIER_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// dhlottery `common.do` JSON: six discrete `drwtNo1..6` fields.
    OfficialJson,
    /// smok95 GitHub mirror JSON: `numbers` array plus `divisions` tiers.
    MirrorJson,
    /// dhlottery `gameResult.do` HTML page.
    ScrapedHtml,
    /// Locally maintained snapshot file of official-shape records per round.
    CachedFile,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("upstream reported failure: {0}")]
    UpstreamFailure(String),
    #[error("round {0} not present in cached data")]
    RoundNotCached(u32),
    #[error("fewer than {NUMBER_COUNT} valid winning numbers in payload")]
    MissingNumbers,
    #[error("no resolvable bonus number in payload")]
    MissingBonus,
}

/// Converts one raw upstream payload into the canonical result record.
///
/// `round` is the round the payload was requested for; shapes that do not
/// carry their own round number (scraped HTML, cache lookups) take it from
/// here. Fails hard when fewer than six valid winning numbers or no bonus can
/// be extracted — a partial `DrawResult` is never produced.
pub fn normalize(raw: &str, kind: SourceKind, round: u32) -> Result<DrawResult, NormalizeError> {
    match kind {
        SourceKind::OfficialJson => from_official_json(raw),
        SourceKind::MirrorJson => from_mirror_json(raw),
        SourceKind::ScrapedHtml => from_scraped_html(raw, round),
        SourceKind::CachedFile => from_cached_file(raw, round),
    }
}

#[derive(Debug, Deserialize)]
struct OfficialDraw {
    #[serde(rename = "drwNo")]
    round: u32,
    #[serde(rename = "drwNoDate", default)]
    draw_date: String,
    #[serde(rename = "drwtNo1")]
    no1: i64,
    #[serde(rename = "drwtNo2")]
    no2: i64,
    #[serde(rename = "drwtNo3")]
    no3: i64,
    #[serde(rename = "drwtNo4")]
    no4: i64,
    #[serde(rename = "drwtNo5")]
    no5: i64,
    #[serde(rename = "drwtNo6")]
    no6: i64,
    #[serde(rename = "bnusNo")]
    bonus: i64,
    #[serde(rename = "totSellamnt", default)]
    total_sales: u64,
    #[serde(rename = "firstWinamnt", default)]
    first_prize_amount: u64,
    #[serde(rename = "firstPrzwnerCo", default)]
    first_prize_winner_count: u64,
}

fn from_official_json(raw: &str) -> Result<DrawResult, NormalizeError> {
    let value: Value = serde_json::from_str(raw)?;
    from_official_value(&value)
}

fn from_official_value(value: &Value) -> Result<DrawResult, NormalizeError> {
    // Failure responses carry none of the number fields, so gate on the
    // status marker before deserializing the full shape.
    let status = value.get("returnValue").and_then(Value::as_str);
    if status != Some("success") {
        return Err(NormalizeError::UpstreamFailure(format!(
            "returnValue = {}",
            status.unwrap_or("<missing>")
        )));
    }
    let draw: OfficialDraw = serde_json::from_value(value.clone())?;

    let winning = canonical_winning(
        [draw.no1, draw.no2, draw.no3, draw.no4, draw.no5, draw.no6]
            .into_iter()
            .filter_map(valid_number)
            .collect(),
    )?;
    let bonus = valid_number(draw.bonus).ok_or(NormalizeError::MissingBonus)?;

    let mut prize_amounts = BTreeMap::new();
    if draw.first_prize_amount > 0 {
        prize_amounts.insert(1, draw.first_prize_amount);
    }

    Ok(DrawResult {
        round: draw.round,
        draw_date: parse_draw_date(&draw.draw_date),
        winning_numbers: winning,
        bonus_number: bonus,
        total_sales: draw.total_sales,
        first_prize_amount: draw.first_prize_amount,
        first_prize_winner_count: draw.first_prize_winner_count,
        prize_amounts,
    })
}

#[derive(Debug, Deserialize)]
struct MirrorDraw {
    draw_no: u32,
    #[serde(default)]
    date: String,
    #[serde(default)]
    numbers: Vec<i64>,
    bonus_no: Option<i64>,
    #[serde(default)]
    total_sales_amount: u64,
    #[serde(default)]
    divisions: Vec<MirrorDivision>,
}

#[derive(Debug, Deserialize)]
struct MirrorDivision {
    #[serde(default)]
    prize: u64,
    #[serde(default)]
    winners: u64,
}

fn from_mirror_json(raw: &str) -> Result<DrawResult, NormalizeError> {
    let draw: MirrorDraw = serde_json::from_str(raw)?;

    let winning = canonical_winning(
        draw.numbers
            .iter()
            .copied()
            .filter_map(valid_number)
            .collect(),
    )?;
    let bonus = draw
        .bonus_no
        .and_then(valid_number)
        .ok_or(NormalizeError::MissingBonus)?;

    // Tiers are indexed 0..n; keep at most the first PRIZE_TIER_LIMIT.
    let prize_amounts: BTreeMap<u8, u64> = draw
        .divisions
        .iter()
        .take(PRIZE_TIER_LIMIT)
        .enumerate()
        .filter(|(_, division)| division.prize > 0)
        .map(|(idx, division)| (idx as u8 + 1, division.prize))
        .collect();

    let first = draw.divisions.first();

    Ok(DrawResult {
        round: draw.draw_no,
        draw_date: parse_draw_date(&draw.date),
        winning_numbers: winning,
        bonus_number: bonus,
        total_sales: draw.total_sales_amount,
        first_prize_amount: first.map(|d| d.prize).unwrap_or(0),
        first_prize_winner_count: first.map(|d| d.winners).unwrap_or(0),
        prize_amounts,
    })
}

fn from_scraped_html(raw: &str, round: u32) -> Result<DrawResult, NormalizeError> {
    let document = Html::parse_document(raw);
    let win_selector = Selector::parse("div.num.win span.ball_645").unwrap();
    let bonus_selector = Selector::parse("div.num.bonus span.ball_645").unwrap();
    let any_ball_selector = Selector::parse("span.ball_645").unwrap();

    let mut winning: Vec<u8> = document.select(&win_selector).filter_map(ball_value).collect();
    let mut bonus = document.select(&bonus_selector).filter_map(ball_value).next();

    // Older page markups lack the win/bonus wrappers; fall back to document
    // order, where the seventh ball is the bonus.
    if winning.len() < NUMBER_COUNT || bonus.is_none() {
        let balls: Vec<u8> = document
            .select(&any_ball_selector)
            .filter_map(ball_value)
            .collect();
        if balls.len() > NUMBER_COUNT {
            winning = balls[..NUMBER_COUNT].to_vec();
            bonus = Some(balls[NUMBER_COUNT]);
        }
    }

    let winning = canonical_winning(winning)?;
    let bonus = bonus.ok_or(NormalizeError::MissingBonus)?;

    let text = page_text(&document);
    let draw_date = parse_korean_date(&text)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let total_sales = number_after(&text, "총 판매금액").unwrap_or(0);
    let (first_prize_amount, first_prize_winner_count) = first_prize_info(&text);

    let mut prize_amounts = BTreeMap::new();
    if first_prize_amount > 0 {
        prize_amounts.insert(1, first_prize_amount);
    }

    Ok(DrawResult {
        round,
        draw_date,
        winning_numbers: winning,
        bonus_number: bonus,
        total_sales,
        first_prize_amount,
        first_prize_winner_count,
        prize_amounts,
    })
}

#[derive(Debug, Deserialize)]
struct CachedResults {
    #[serde(default)]
    results: BTreeMap<String, Value>,
}

fn from_cached_file(raw: &str, round: u32) -> Result<DrawResult, NormalizeError> {
    let file: CachedResults = serde_json::from_str(raw)?;
    let entry = file
        .results
        .get(&round.to_string())
        .ok_or(NormalizeError::RoundNotCached(round))?;
    from_official_value(entry)
}

fn valid_number(n: i64) -> Option<u8> {
    u8::try_from(n)
        .ok()
        .filter(|n| (MIN_NUMBER..=MAX_NUMBER).contains(n))
}

/// Requires six distinct in-range numbers; returns them ascending.
fn canonical_winning(mut numbers: Vec<u8>) -> Result<Vec<u8>, NormalizeError> {
    if numbers.len() != NUMBER_COUNT {
        return Err(NormalizeError::MissingNumbers);
    }
    numbers.sort_unstable();
    if numbers.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(NormalizeError::MissingNumbers);
    }
    Ok(numbers)
}

fn ball_value(element: ElementRef) -> Option<u8> {
    element
        .text()
        .collect::<String>()
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(valid_number)
}

fn page_text(document: &Html) -> String {
    document.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Tolerates an ISO datetime (truncated to its date part) or localized
/// "YYYY년 M월 D일" text. Unparseable input yields an empty string.
pub fn parse_draw_date(raw: &str) -> String {
    let date_part = raw.split('T').next().unwrap_or("");
    if NaiveDate::parse_from_str(date_part, "%Y-%m-%d").is_ok() {
        return date_part.to_string();
    }
    parse_korean_date(raw)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Extracts the first "YYYY년 M월 D일" occurrence from free text.
fn parse_korean_date(text: &str) -> Option<NaiveDate> {
    let (mut year, mut month, mut day) = (None, None, None);
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        match ch {
            '년' if year.is_none() => year = digits.parse().ok(),
            '월' if year.is_some() && month.is_none() => month = digits.parse().ok(),
            '일' if month.is_some() && day.is_none() => day = digits.parse().ok(),
            _ => {}
        }
        digits.clear();
        if day.is_some() {
            break;
        }
    }
    NaiveDate::from_ymd_opt(year?, month?, day?)
}

/// First comma-grouped number following `marker` in `text`.
fn number_after(text: &str, marker: &str) -> Option<u64> {
    let tail = &text[text.find(marker)? + marker.len()..];
    let start = tail.find(|c: char| c.is_ascii_digit())?;
    let digits: String = tail[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Comma-grouped number immediately preceding `marker`, allowing whitespace
/// between the number and the marker.
fn number_before(text: &str, marker: char) -> Option<u64> {
    let head = &text[..text.find(marker)?];
    let run: String = head
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || c.is_whitespace())
        .collect();
    let digits: String = run.chars().rev().filter(char::is_ascii_digit).collect();
    if digits.is_empty() { None } else { digits.parse().ok() }
}

/// Best-effort first-prize amount and winner count from page text; zeros when
/// the figures cannot be located.
fn first_prize_info(text: &str) -> (u64, u64) {
    let Some(pos) = text.find("1등") else {
        return (0, 0);
    };
    let tail = &text[pos..];
    (
        number_before(tail, '원').unwrap_or(0),
        number_before(tail, '명').unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFICIAL: &str = r#"{
        "returnValue": "success",
        "drwNo": 1153,
        "drwNoDate": "2025-01-04",
        "drwtNo1": 3, "drwtNo2": 12, "drwtNo3": 25,
        "drwtNo4": 33, "drwtNo5": 40, "drwtNo6": 45,
        "bnusNo": 7,
        "totSellamnt": 118628568000,
        "firstWinamnt": 2208128394,
        "firstPrzwnerCo": 12
    }"#;

    const MIRROR: &str = r#"{
        "draw_no": 1153,
        "date": "2025-01-04T20:45:00+09:00",
        "numbers": [3, 12, 25, 33, 40, 45],
        "bonus_no": 7,
        "total_sales_amount": 118628568000,
        "divisions": [
            {"prize": 2208128394, "winners": 12},
            {"prize": 54372914, "winners": 81},
            {"prize": 1480552, "winners": 2975},
            {"prize": 50000, "winners": 147823},
            {"prize": 5000, "winners": 2485172}
        ]
    }"#;

    #[test]
    fn official_json_normalizes() {
        let result = normalize(OFFICIAL, SourceKind::OfficialJson, 1153).unwrap();
        assert_eq!(result.round, 1153);
        assert_eq!(result.draw_date, "2025-01-04");
        assert_eq!(result.winning_numbers, vec![3, 12, 25, 33, 40, 45]);
        assert_eq!(result.bonus_number, 7);
        assert_eq!(result.total_sales, 118628568000);
        assert_eq!(result.first_prize_winner_count, 12);
        assert_eq!(result.prize_amounts.get(&1), Some(&2208128394));
    }

    #[test]
    fn mirror_json_normalizes_with_tiers() {
        let result = normalize(MIRROR, SourceKind::MirrorJson, 1153).unwrap();
        assert_eq!(result.round, 1153);
        assert_eq!(result.draw_date, "2025-01-04");
        assert_eq!(result.first_prize_amount, 2208128394);
        // Tier breakdown right-sized to ranks 1..=3.
        assert_eq!(result.prize_amounts.len(), 3);
        assert_eq!(result.prize_amounts.get(&3), Some(&1480552));
        assert_eq!(result.prize_amounts.get(&4), None);
    }

    #[test]
    fn array_and_named_fields_yield_identical_numbers() {
        let official = normalize(OFFICIAL, SourceKind::OfficialJson, 1153).unwrap();
        let mirror = normalize(MIRROR, SourceKind::MirrorJson, 1153).unwrap();
        assert_eq!(official.winning_numbers, mirror.winning_numbers);
        assert_eq!(official.bonus_number, mirror.bonus_number);
    }

    #[test]
    fn official_failure_status_is_rejected() {
        let raw = r#"{"returnValue": "fail"}"#;
        assert!(matches!(
            normalize(raw, SourceKind::OfficialJson, 9999),
            Err(NormalizeError::UpstreamFailure(_))
        ));
    }

    #[test]
    fn too_few_numbers_fails_hard() {
        let raw = r#"{
            "draw_no": 1153,
            "numbers": [3, 12, 25],
            "bonus_no": 7
        }"#;
        assert!(matches!(
            normalize(raw, SourceKind::MirrorJson, 1153),
            Err(NormalizeError::MissingNumbers)
        ));
    }

    #[test]
    fn missing_bonus_fails_hard() {
        let raw = r#"{
            "draw_no": 1153,
            "numbers": [3, 12, 25, 33, 40, 45],
            "bonus_no": null
        }"#;
        assert!(matches!(
            normalize(raw, SourceKind::MirrorJson, 1153),
            Err(NormalizeError::MissingBonus)
        ));
    }

    #[test]
    fn scraped_html_normalizes() {
        let html = r#"
            <html><body>
            <div class="win_result">
                <h4>제1153회</h4>
                <p class="desc">(2025년 1월 4일 추첨)</p>
                <div class="nums">
                    <div class="num win">
                        <span class="ball_645 lrg ball1">3</span>
                        <span class="ball_645 lrg ball2">12</span>
                        <span class="ball_645 lrg ball3">25</span>
                        <span class="ball_645 lrg ball4">33</span>
                        <span class="ball_645 lrg ball5">40</span>
                        <span class="ball_645 lrg ball5">45</span>
                    </div>
                    <div class="num bonus">
                        <span class="ball_645 lrg ball1">7</span>
                    </div>
                </div>
            </div>
            <ul><li>총 판매금액 : 118,628,568,000원</li></ul>
            <table><tr><td>1등</td><td>2,208,128,394원</td><td>12명</td></tr></table>
            </body></html>
        "#;
        let result = normalize(html, SourceKind::ScrapedHtml, 1153).unwrap();
        assert_eq!(result.round, 1153);
        assert_eq!(result.winning_numbers, vec![3, 12, 25, 33, 40, 45]);
        assert_eq!(result.bonus_number, 7);
        assert_eq!(result.draw_date, "2025-01-04");
        assert_eq!(result.total_sales, 118628568000);
        assert_eq!(result.first_prize_amount, 2208128394);
        assert_eq!(result.first_prize_winner_count, 12);
    }

    #[test]
    fn scraped_html_without_wrappers_uses_document_order() {
        let html = r#"
            <html><body>
            <span class="ball_645">3</span>
            <span class="ball_645">12</span>
            <span class="ball_645">25</span>
            <span class="ball_645">33</span>
            <span class="ball_645">40</span>
            <span class="ball_645">45</span>
            <span class="ball_645">7</span>
            </body></html>
        "#;
        let result = normalize(html, SourceKind::ScrapedHtml, 1000).unwrap();
        assert_eq!(result.winning_numbers, vec![3, 12, 25, 33, 40, 45]);
        assert_eq!(result.bonus_number, 7);
        // No date anywhere on the page: empty, not an error.
        assert_eq!(result.draw_date, "");
    }

    #[test]
    fn scraped_html_with_too_few_balls_fails() {
        let html = r#"<span class="ball_645">3</span><span class="ball_645">12</span>"#;
        assert!(matches!(
            normalize(html, SourceKind::ScrapedHtml, 1000),
            Err(NormalizeError::MissingNumbers)
        ));
    }

    #[test]
    fn cached_file_lookup_by_round() {
        let raw = format!(r#"{{"lastUpdated": "2025-01-05", "results": {{"1153": {OFFICIAL}}}}}"#);
        let result = normalize(&raw, SourceKind::CachedFile, 1153).unwrap();
        assert_eq!(result.round, 1153);
        assert_eq!(result.winning_numbers, vec![3, 12, 25, 33, 40, 45]);

        assert!(matches!(
            normalize(&raw, SourceKind::CachedFile, 1154),
            Err(NormalizeError::RoundNotCached(1154))
        ));
    }

    #[test]
    fn draw_date_tolerates_both_formats() {
        assert_eq!(parse_draw_date("2025-01-04"), "2025-01-04");
        assert_eq!(parse_draw_date("2025-01-04T20:45:00+09:00"), "2025-01-04");
        assert_eq!(parse_draw_date("2025년 1월 4일"), "2025-01-04");
        assert_eq!(parse_draw_date("garbage"), "");
        assert_eq!(parse_draw_date(""), "");
    }
}
