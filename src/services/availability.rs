use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDateTime, Weekday};

use crate::models::Provider;

pub const DEFAULT_HORIZON_DAYS: i64 = 14;
pub const DEFAULT_STEP_MINUTES: i64 = 30;
pub const DEFAULT_DAILY_CAP: usize = 8;

const DEFAULT_START_MINUTE: u32 = 9 * 60;
const DEFAULT_END_MINUTE: u32 = 17 * 60;

const DAY_ORDER: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Day tokens accepted in schedule strings and in a user's selected day:
/// single letters (M, T, W, Th, F, S, Su), three-letter abbreviations, or
/// full names.
pub fn weekday_from_name(token: &str) -> Option<Weekday> {
    match token.trim().to_lowercase().as_str() {
        "m" | "mon" | "monday" => Some(Weekday::Mon),
        "t" | "tu" | "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "w" | "wed" | "wednesday" => Some(Weekday::Wed),
        "th" | "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thu),
        "f" | "fri" | "friday" => Some(Weekday::Fri),
        "s" | "sa" | "sat" | "saturday" => Some(Weekday::Sat),
        "su" | "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Wall-clock token ("9:00am", "5:00pm", "16:30", "9am") to minute-of-day.
pub fn parse_clock(s: &str) -> Option<u32> {
    let t = s.trim().to_lowercase();
    let (body, pm) = if let Some(b) = t.strip_suffix("am") {
        (b.trim_end(), Some(false))
    } else if let Some(b) = t.strip_suffix("pm") {
        (b.trim_end(), Some(true))
    } else {
        (t.as_str(), None)
    };

    let (hour_str, minute_str) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None => (body, "0"),
    };
    let hour: u32 = hour_str.trim().parse().ok()?;
    let minute: u32 = minute_str.trim().parse().ok()?;
    if minute > 59 {
        return None;
    }

    let hour = match pm {
        Some(true) if hour < 12 => hour + 12,
        Some(false) if hour == 12 => 0,
        _ => hour,
    };
    if hour > 23 {
        return None;
    }
    Some(hour * 60 + minute)
}

/// Turn a free-form weekly recurrence ("M-F 9:00am-5:00pm",
/// "Mon,Wed,Fri 10:00-16:00", full day names) into a weekday -> open-minutes
/// map. Degrades rather than fails: no recognizable time range means
/// 9:00-17:00, no recognizable days means Monday-Friday.
pub fn parse_weekly_schedule(text: &str) -> HashMap<Weekday, (u32, u32)> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    // A schedule carries a single time range shared by every listed day; the
    // range is the last token whose halves both parse as clock times.
    let mut hours: Option<(u32, u32)> = None;
    let mut time_token: Option<usize> = None;
    for (i, tok) in tokens.iter().enumerate().rev() {
        if let Some((a, b)) = tok.split_once('-') {
            if let (Some(start), Some(end)) = (parse_clock(a), parse_clock(b)) {
                hours = Some((start, end));
                time_token = Some(i);
                break;
            }
        }
    }
    let (start_m, end_m) = hours.unwrap_or((DEFAULT_START_MINUTE, DEFAULT_END_MINUTE));

    let mut days: Vec<Weekday> = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        if Some(i) == time_token {
            continue;
        }
        for piece in tok.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if let Some((a, b)) = piece.split_once('-') {
                if let (Some(from), Some(to)) = (weekday_from_name(a), weekday_from_name(b)) {
                    let (from, to) = (day_index(from), day_index(to));
                    if from <= to {
                        days.extend(DAY_ORDER[from..=to].iter().copied());
                    }
                }
            } else if let Some(day) = weekday_from_name(piece) {
                days.push(day);
            }
        }
    }
    if days.is_empty() {
        days.extend(DAY_ORDER[..5].iter().copied());
    }

    days.into_iter().map(|d| (d, (start_m, end_m))).collect()
}

/// Candidate appointment start times over `[now, now + horizon_days]`.
/// Lazy and finite; re-invoking with the same inputs yields the same
/// sequence. Each day starts at the later of the configured opening and
/// one minute from now, so nothing lands in the past.
pub fn generate_slots<'a>(
    schedule: &'a HashMap<Weekday, (u32, u32)>,
    now: NaiveDateTime,
    horizon_days: i64,
    step_minutes: i64,
    daily_cap: usize,
) -> impl Iterator<Item = NaiveDateTime> + 'a {
    (0..=horizon_days).flat_map(move |offset| {
        let date = now.date() + Duration::days(offset);
        let mut day_slots = Vec::new();
        if let Some(&(start_m, end_m)) = schedule.get(&date.weekday()) {
            if let (Some(day_start), Some(day_end)) = (
                date.and_hms_opt(start_m / 60, start_m % 60, 0),
                date.and_hms_opt(end_m / 60, end_m % 60, 0),
            ) {
                let mut ptr = day_start.max(now + Duration::minutes(1));
                while ptr + Duration::minutes(step_minutes) <= day_end
                    && day_slots.len() < daily_cap
                {
                    day_slots.push(ptr);
                    ptr += Duration::minutes(step_minutes);
                }
            }
        }
        day_slots
    })
}

/// The first `max_slots` open slots for a provider, skipping anything in
/// `booked`, in chronological order.
pub fn next_free_slots(
    provider: &Provider,
    booked: &HashSet<String>,
    max_slots: usize,
    now: NaiveDateTime,
) -> Vec<String> {
    let schedule = parse_weekly_schedule(&provider.weekly_schedule);
    generate_slots(
        &schedule,
        now,
        DEFAULT_HORIZON_DAYS,
        DEFAULT_STEP_MINUTES,
        DEFAULT_DAILY_CAP,
    )
    .map(format_slot)
    .filter(|slot| !booked.contains(slot))
    .take(max_slots)
    .collect()
}

pub fn format_slot(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

pub fn day_names(schedule: &HashMap<Weekday, (u32, u32)>) -> Vec<String> {
    DAY_ORDER
        .iter()
        .copied()
        .filter(|d| schedule.contains_key(d))
        .map(|d| day_name(d).to_string())
        .collect()
}

/// Human-readable open hours, e.g. "9:00 AM - 5:00 PM". Every entry shares
/// the same range, so any one of them serves.
pub fn hours_label(schedule: &HashMap<Weekday, (u32, u32)>) -> String {
    schedule
        .values()
        .next()
        .map(|&(start, end)| format!("{} - {}", fmt_minute(start), fmt_minute(end)))
        .unwrap_or_else(|| format!("{} - {}", fmt_minute(DEFAULT_START_MINUTE), fmt_minute(DEFAULT_END_MINUTE)))
}

fn day_index(w: Weekday) -> usize {
    w.num_days_from_monday() as usize
}

fn day_name(w: Weekday) -> &'static str {
    match w {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn fmt_minute(minute_of_day: u32) -> String {
    let h24 = minute_of_day / 60;
    let minute = minute_of_day % 60;
    let (h12, ap) = match h24 {
        0 => (12, "AM"),
        1..=11 => (h24, "AM"),
        12 => (12, "PM"),
        _ => (h24 - 12, "PM"),
    };
    format!("{h12}:{minute:02} {ap}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn weekdays(schedule: &HashMap<Weekday, (u32, u32)>) -> Vec<Weekday> {
        DAY_ORDER
            .iter()
            .copied()
            .filter(|d| schedule.contains_key(d))
            .collect()
    }

    #[test]
    fn test_parse_day_range_with_ampm_hours() {
        let schedule = parse_weekly_schedule("M-F 9:00am-5:00pm");
        assert_eq!(
            weekdays(&schedule),
            vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
        );
        assert_eq!(schedule[&Weekday::Mon], (540, 1020));
    }

    #[test]
    fn test_parse_day_list_with_24h_hours() {
        let schedule = parse_weekly_schedule("Mon,Wed,Fri 10:00-16:00");
        assert_eq!(
            weekdays(&schedule),
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
        assert_eq!(schedule[&Weekday::Wed], (600, 960));
    }

    #[test]
    fn test_parse_full_day_names() {
        let schedule = parse_weekly_schedule("Tuesday-Thursday 8:30am-12:30pm");
        assert_eq!(
            weekdays(&schedule),
            vec![Weekday::Tue, Weekday::Wed, Weekday::Thu]
        );
        assert_eq!(schedule[&Weekday::Tue], (510, 750));
    }

    #[test]
    fn test_parse_weekend_tokens() {
        let schedule = parse_weekly_schedule("S,Su 10:00am-2:00pm");
        assert_eq!(weekdays(&schedule), vec![Weekday::Sat, Weekday::Sun]);
    }

    #[test]
    fn test_parse_no_time_range_defaults_hours() {
        let schedule = parse_weekly_schedule("Mon-Wed");
        assert_eq!(
            weekdays(&schedule),
            vec![Weekday::Mon, Weekday::Tue, Weekday::Wed]
        );
        assert_eq!(schedule[&Weekday::Mon], (540, 1020));
    }

    #[test]
    fn test_parse_no_days_defaults_weekdays() {
        let schedule = parse_weekly_schedule("10:00-16:00");
        assert_eq!(weekdays(&schedule).len(), 5);
        assert_eq!(schedule[&Weekday::Fri], (600, 960));
    }

    #[test]
    fn test_parse_malformed_degrades_to_default() {
        for text in ["", "   ", "gibberish", "open whenever", "?? !!"] {
            let schedule = parse_weekly_schedule(text);
            assert_eq!(weekdays(&schedule).len(), 5, "input: {text:?}");
            assert_eq!(schedule[&Weekday::Mon], (540, 1020), "input: {text:?}");
        }
    }

    #[test]
    fn test_parse_clock_variants() {
        assert_eq!(parse_clock("9:00am"), Some(540));
        assert_eq!(parse_clock("5:00pm"), Some(1020));
        assert_eq!(parse_clock("12:00pm"), Some(720));
        assert_eq!(parse_clock("12:00am"), Some(0));
        assert_eq!(parse_clock("16:30"), Some(990));
        assert_eq!(parse_clock("9am"), Some(540));
        assert_eq!(parse_clock("10:00 AM"), Some(600));
        assert_eq!(parse_clock("25:00"), None);
        assert_eq!(parse_clock("9:75"), None);
        assert_eq!(parse_clock("noonish"), None);
    }

    #[test]
    fn test_generate_slots_starts_at_opening() {
        let schedule = parse_weekly_schedule("M-F 9:00am-5:00pm");
        // 2025-06-16 is a Monday; well before opening
        let slots: Vec<_> = generate_slots(&schedule, dt("2025-06-16 06:00"), 1, 30, 8).collect();
        assert_eq!(slots[0], dt("2025-06-16 09:00"));
        assert_eq!(slots[1], dt("2025-06-16 09:30"));
    }

    #[test]
    fn test_generate_slots_never_in_past() {
        let schedule = parse_weekly_schedule("M-F 9:00am-5:00pm");
        let now = dt("2025-06-16 12:00");
        let slots: Vec<_> = generate_slots(&schedule, now, 14, 30, 8).collect();
        assert!(!slots.is_empty());
        assert!(slots.iter().all(|s| *s > now));
        // mid-day start begins one minute from now, not on the half-hour grid
        assert_eq!(slots[0], dt("2025-06-16 12:01"));
    }

    #[test]
    fn test_generate_slots_daily_cap_and_day_filter() {
        let schedule = parse_weekly_schedule("Mon 9:00am-5:00pm");
        let slots: Vec<_> = generate_slots(&schedule, dt("2025-06-16 06:00"), 14, 30, 8).collect();
        // an inclusive 14-day horizon from a Monday holds three Mondays, capped at 8 each
        assert_eq!(slots.len(), 24);
        assert!(slots.iter().all(|s| s.weekday() == Weekday::Mon));
    }

    #[test]
    fn test_generate_slots_respects_day_end() {
        let schedule = parse_weekly_schedule("Mon 9:00am-10:00am");
        let slots: Vec<_> = generate_slots(&schedule, dt("2025-06-16 06:00"), 1, 30, 8).collect();
        // 9:00 and 9:30 fit; a 10:00 slot would end past closing
        assert_eq!(slots, vec![dt("2025-06-16 09:00"), dt("2025-06-16 09:30")]);
    }

    #[test]
    fn test_generate_slots_restartable() {
        let schedule = parse_weekly_schedule("M-F 9:00am-5:00pm");
        let now = dt("2025-06-16 06:00");
        let first: Vec<_> = generate_slots(&schedule, now, 14, 30, 8).collect();
        let second: Vec<_> = generate_slots(&schedule, now, 14, 30, 8).collect();
        assert_eq!(first, second);
    }

    fn test_provider() -> Provider {
        Provider::new("d001", "Dr. Maya Patel", "Cardiology", "Downtown Clinic", None, "M-F 9:00am-5:00pm")
    }

    #[test]
    fn test_next_free_slots_skips_booked() {
        let mut booked = HashSet::new();
        booked.insert("2025-06-16 09:00".to_string());
        let slots = next_free_slots(&test_provider(), &booked, 6, dt("2025-06-16 06:00"));
        assert_eq!(slots.len(), 6);
        assert!(!slots.contains(&"2025-06-16 09:00".to_string()));
        assert_eq!(slots[0], "2025-06-16 09:30");
    }

    #[test]
    fn test_next_free_slots_bounds() {
        let booked = HashSet::new();
        let now = dt("2025-06-16 11:42");
        let slots = next_free_slots(&test_provider(), &booked, 6, now);
        assert_eq!(slots.len(), 6);
        let parsed: Vec<_> = slots
            .iter()
            .map(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap())
            .collect();
        assert!(parsed.iter().all(|s| *s > now));
        assert!(parsed.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_hours_label() {
        let schedule = parse_weekly_schedule("M-F 9:00am-5:00pm");
        assert_eq!(hours_label(&schedule), "9:00 AM - 5:00 PM");
        let schedule = parse_weekly_schedule("Mon 10:00-16:00");
        assert_eq!(hours_label(&schedule), "10:00 AM - 4:00 PM");
    }

    #[test]
    fn test_day_names_ordered() {
        let schedule = parse_weekly_schedule("Fri,Mon 9:00am-5:00pm");
        assert_eq!(day_names(&schedule), vec!["Monday", "Friday"]);
    }
}
