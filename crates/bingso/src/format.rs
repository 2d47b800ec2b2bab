//! Display helpers for phone numbers, dates, resident numbers and family
//! listings.
//!
//! Everything here is a pure transform over strings and timestamps.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

use crate::model::FamilyMember;

/// Label shown for a schedule entry with no time set.
pub const UNSCHEDULED: &str = "시간미정";

/// Maximum number of digits kept in a phone number.
const MAX_PHONE_DIGITS: usize = 11;

/// Format a phone number as the user types it.
///
/// Non-digits are dropped and at most 11 digits are kept. Groups follow
/// the length: up to 3 digits stay as they are, up to 7 become `3-rest`,
/// up to 10 become `3-3-rest` and 11 become `3-4-4`.
#[must_use]
pub fn format_phone(value: &str) -> String {
    let digits: String = value
        .chars()
        .filter(char::is_ascii_digit)
        .take(MAX_PHONE_DIGITS)
        .collect();

    match digits.len() {
        0..=3 => digits,
        4..=7 => format!("{}-{}", &digits[..3], &digits[3..]),
        8..=10 => format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        _ => format!("{}-{}-{}", &digits[..3], &digits[3..7], &digits[7..]),
    }
}

fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "일",
        Weekday::Mon => "월",
        Weekday::Tue => "화",
        Weekday::Wed => "수",
        Weekday::Thu => "목",
        Weekday::Fri => "금",
        Weekday::Sat => "토",
    }
}

/// 오전/오후 and the 12-hour clock hour, with midnight shown as 12.
fn twelve_hour(hour: u32) -> (&'static str, u32) {
    let period = if hour < 12 { "오전" } else { "오후" };
    let display = match hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    (period, display)
}

fn is_midnight(value: &NaiveDateTime) -> bool {
    value.hour() == 0 && value.minute() == 0
}

/// Short schedule label used on the dashboard and status board.
///
/// `1월 18일 (토) 오전 7:00`; the time part is left out at midnight and
/// a missing value renders as [`UNSCHEDULED`].
#[must_use]
pub fn schedule_label(value: Option<&NaiveDateTime>) -> String {
    let Some(value) = value else {
        return UNSCHEDULED.to_string();
    };

    let mut label = format!(
        "{}월 {}일 ({})",
        value.month(),
        value.day(),
        weekday_label(value.weekday())
    );
    if !is_midnight(value) {
        let (period, hour) = twelve_hour(value.hour());
        label.push_str(&format!(" {period} {hour}:{:02}", value.minute()));
    }
    label
}

/// Long date label used on the obituary page.
///
/// `2025년 1월 18일 (토) 오전 7시`, with ` 30분` appended when minutes are
/// non-zero. A missing value renders as an empty string.
#[must_use]
pub fn obituary_label(value: Option<&NaiveDateTime>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    let mut label = format!(
        "{}년 {}월 {}일 ({})",
        value.year(),
        value.month(),
        value.day(),
        weekday_label(value.weekday())
    );
    if !is_midnight(value) {
        let (period, hour) = twelve_hour(value.hour());
        label.push_str(&format!(" {period} {hour}시"));
        if value.minute() > 0 {
            label.push_str(&format!(" {}분", value.minute()));
        }
    }
    label
}

/// Render a value for an HTML `datetime-local` input, or an empty string.
#[must_use]
pub fn datetime_local(value: Option<&NaiveDateTime>) -> String {
    value.map(crate::model::wall_clock::render).unwrap_or_default()
}

/// Split a resident registration number at its hyphen.
///
/// Values without a hyphen yield two empty parts, leaving the caller to
/// keep the raw value.
#[must_use]
pub fn split_resident_number(value: &str) -> (String, String) {
    match value.split_once('-') {
        Some((front, back)) => (front.to_string(), back.to_string()),
        None => (String::new(), String::new()),
    }
}

/// Join the two parts of a resident registration number.
///
/// When either part is empty the `fallback` (the previously stored full
/// value) is returned unchanged.
#[must_use]
pub fn join_resident_number(front: &str, back: &str, fallback: &str) -> String {
    if front.is_empty() || back.is_empty() {
        fallback.to_string()
    } else {
        format!("{front}-{back}")
    }
}

/// Symbol shown next to the deceased name for a religion.
#[must_use]
pub fn religion_symbol(religion: &str) -> &'static str {
    match religion {
        "기독교" | "천주교" => "✝",
        "불교" => "卍",
        "원불교" => "◉",
        "유교" => "⚊",
        _ => "",
    }
}

/// Honorific titles offered for a religion.
#[must_use]
pub fn religion_titles(religion: &str) -> &'static [&'static str] {
    match religion {
        "불교" => &["법명", "법호"],
        "기독교" => &["세례명", "성도", "권사", "집사", "장로"],
        "천주교" => &["세례명", "영명"],
        "원불교" => &["법명"],
        "유교" => &["시호"],
        _ => &[],
    }
}

/// Term used for a death in the given religion.
#[must_use]
pub fn death_term(religion: &str) -> &'static str {
    match religion {
        "불교" => "입적",
        "기독교" => "소천",
        "천주교" => "선종",
        "원불교" => "법신귀일",
        _ => "별세",
    }
}

/// Precedence of a family relation in listings; unknown relations sort last.
#[must_use]
pub fn relation_rank(relation: &str) -> u32 {
    match relation {
        "상주" => 1,
        "배우자" => 2,
        "아들" => 3,
        "며느리" => 4,
        "딸" => 5,
        "사위" => 6,
        "손자" => 7,
        "손녀" => 8,
        "형제" => 9,
        "자매" => 10,
        _ => 999,
    }
}

/// Family members with a name and relation, in relation precedence order.
///
/// The sort is stable, so members sharing a rank keep their form order.
#[must_use]
pub fn sorted_family(members: &[FamilyMember]) -> Vec<FamilyMember> {
    let mut listed: Vec<FamilyMember> = members
        .iter()
        .filter(|m| m.is_listed())
        .cloned()
        .collect();
    listed.sort_by_key(|m| relation_rank(&m.relation));
    listed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_format_phone_full_numbers() {
        assert_eq!(format_phone("01012345678"), "010-1234-5678");
        assert_eq!(format_phone("0101234567"), "010-123-4567");
    }

    #[test]
    fn test_format_phone_partial_input() {
        assert_eq!(format_phone(""), "");
        assert_eq!(format_phone("010"), "010");
        assert_eq!(format_phone("0101"), "010-1");
        assert_eq!(format_phone("0101234"), "010-1234");
        assert_eq!(format_phone("01012345"), "010-123-45");
    }

    #[test]
    fn test_format_phone_strips_and_truncates() {
        assert_eq!(format_phone("010-1234-5678"), "010-1234-5678");
        assert_eq!(format_phone("(010) 1234 5678 99"), "010-1234-5678");
        assert_eq!(format_phone("abc"), "");
    }

    #[test]
    fn test_schedule_label_midnight_has_no_time() {
        // 2025-01-18 is a Saturday.
        assert_eq!(schedule_label(Some(&at(2025, 1, 18, 0, 0))), "1월 18일 (토)");
    }

    #[test]
    fn test_schedule_label_with_time() {
        assert_eq!(
            schedule_label(Some(&at(2025, 1, 18, 7, 0))),
            "1월 18일 (토) 오전 7:00"
        );
        assert_eq!(
            schedule_label(Some(&at(2025, 1, 18, 14, 5))),
            "1월 18일 (토) 오후 2:05"
        );
        assert_eq!(
            schedule_label(Some(&at(2025, 1, 18, 12, 30))),
            "1월 18일 (토) 오후 12:30"
        );
        assert_eq!(
            schedule_label(Some(&at(2025, 1, 18, 0, 15))),
            "1월 18일 (토) 오전 12:15"
        );
    }

    #[test]
    fn test_schedule_label_missing() {
        assert_eq!(schedule_label(None), UNSCHEDULED);
    }

    #[test]
    fn test_obituary_label() {
        assert_eq!(
            obituary_label(Some(&at(2025, 1, 18, 7, 0))),
            "2025년 1월 18일 (토) 오전 7시"
        );
        assert_eq!(
            obituary_label(Some(&at(2025, 1, 18, 13, 30))),
            "2025년 1월 18일 (토) 오후 1시 30분"
        );
        assert_eq!(
            obituary_label(Some(&at(2025, 1, 18, 0, 0))),
            "2025년 1월 18일 (토)"
        );
        assert_eq!(obituary_label(None), "");
    }

    #[test]
    fn test_datetime_local() {
        assert_eq!(datetime_local(Some(&at(2025, 1, 18, 7, 0))), "2025-01-18T07:00");
        assert_eq!(datetime_local(None), "");
    }

    #[test]
    fn test_resident_number_split_join_round_trip() {
        let full = "450101-1234567";
        let (front, back) = split_resident_number(full);
        assert_eq!(front, "450101");
        assert_eq!(back, "1234567");
        assert_eq!(join_resident_number(&front, &back, ""), full);
    }

    #[test]
    fn test_resident_number_without_hyphen() {
        assert_eq!(
            split_resident_number("4501011234567"),
            (String::new(), String::new())
        );
        assert_eq!(
            join_resident_number("", "", "4501011234567"),
            "4501011234567"
        );
    }

    #[test]
    fn test_religion_helpers() {
        assert_eq!(religion_symbol("천주교"), "✝");
        assert_eq!(religion_symbol("불교"), "卍");
        assert_eq!(religion_symbol("무교"), "");
        assert_eq!(death_term("천주교"), "선종");
        assert_eq!(death_term(""), "별세");
        assert!(religion_titles("기독교").contains(&"장로"));
        assert!(religion_titles("무교").is_empty());
    }

    #[test]
    fn test_sorted_family_precedence() {
        let members = vec![
            FamilyMember::new("딸", "홍영희", ""),
            FamilyMember::new("상주", "홍철수", ""),
            FamilyMember::new("아들", "홍민수", ""),
        ];
        let relations: Vec<String> = sorted_family(&members)
            .into_iter()
            .map(|m| m.relation)
            .collect();
        assert_eq!(relations, vec!["상주", "아들", "딸"]);
    }

    #[test]
    fn test_sorted_family_unknown_last_and_stable() {
        let members = vec![
            FamilyMember::new("조카", "가", ""),
            FamilyMember::new("아들", "나", ""),
            FamilyMember::new("친구", "다", ""),
            FamilyMember::new("조카", "라", ""),
            FamilyMember::new("", "빈칸", ""),
        ];
        let names: Vec<String> = sorted_family(&members)
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["나", "가", "다", "라"]);
    }
}
