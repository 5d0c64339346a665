//! services/client/src/ics.rs
//!
//! Local iCalendar (`.ics`) import. Reads the VEVENTs of a course calendar feed,
//! keeps the ones that look like assignments or exams and matches each to one of
//! the user's classes by course code, for display on the calendar view.
//!
//! Supported subset of RFC 5545: line folding, parameters, text escapes,
//! `DTSTART`/`DUE` as DATE, UTC, floating or `TZID` times, and `RRULE`
//! (DAILY/WEEKLY/MONTHLY/YEARLY with INTERVAL, COUNT, UNTIL) plus `EXDATE`.
//! `TZID`s are IANA names resolved with the bundled tz database; floating times,
//! all-day dates and unknown `TZID`s use the configured local zone. Recurrences
//! are expanded in wall-clock time, so a 10:00 class stays at 10:00 across DST.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use study_buddy_core::domain::{AssignmentKind, ClassCollection};
use study_buddy_core::validate::classify_assignment;
use tracing::debug;

/// Upper bound on occurrences produced from one recurring event.
pub const MAX_OCCURRENCES: usize = 128;

const ASSIGNMENT_CUES: &[&str] = &[
    "assignment", "homework", "hw", "quiz", "exam", "midterm", "final", "project", "lab",
    "paper", "essay", "discussion", "reading", "due", "submission", "submit", "checkpoint",
];
const NON_ASSIGNMENT_CUES: &[&str] = &[
    "office hour", "lecture", "class meeting", "zoom", "recitation", "review session",
    "lab meeting", "seminar", "holiday",
];

#[derive(Debug, thiserror::Error)]
pub enum IcsError {
    #[error("calendar file is empty")]
    Empty,
    #[error("not an iCalendar file (missing BEGIN:VCALENDAR)")]
    NotACalendar,
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

fn malformed(line: usize, reason: impl Into<String>) -> IcsError {
    IcsError::Malformed {
        line,
        reason: reason.into(),
    }
}

//=========================================================================================
// Content Lines
//=========================================================================================

#[derive(Debug, Clone)]
struct Property {
    name: String,
    params: Vec<(String, String)>,
    value: String,
    line: usize,
}

impl Property {
    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Joins folded lines; each logical line keeps the number of its first physical line.
fn unfold(text: &str) -> Vec<(usize, String)> {
    let mut out: Vec<(usize, String)> = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(continuation) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some((_, current)) = out.last_mut() {
                current.push_str(continuation);
                continue;
            }
        }
        if !raw.trim().is_empty() {
            out.push((i + 1, raw.to_string()));
        }
    }
    out
}

fn parse_property(line: usize, content: &str) -> Result<Property, IcsError> {
    // The value starts at the first ':' outside a quoted parameter value.
    let mut in_quotes = false;
    let split = content.char_indices().find_map(|(i, c)| match c {
        '"' => {
            in_quotes = !in_quotes;
            None
        }
        ':' if !in_quotes => Some(i),
        _ => None,
    });
    let split = split.ok_or_else(|| malformed(line, "missing ':' in content line"))?;
    let (head, value) = (&content[..split], &content[split + 1..]);

    let mut parts = head.split(';');
    let name = parts.next().unwrap_or_default().trim().to_ascii_uppercase();
    if name.is_empty() {
        return Err(malformed(line, "empty property name"));
    }
    let params = parts
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| (k.trim().to_ascii_uppercase(), v.trim_matches('"').to_string()))
        .collect();

    Ok(Property {
        name,
        params,
        value: value.to_string(),
        line,
    })
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

//=========================================================================================
// Date & Time Values
//=========================================================================================

/// A `DTSTART`/`DUE` value: wall-clock time in a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct When {
    local: NaiveDateTime,
    zone: Tz,
    all_day: bool,
}

impl When {
    fn at(&self) -> Option<DateTime<Utc>> {
        resolve(self.local, self.zone)
    }
}

fn is_utc_zone(tzid: &str) -> bool {
    matches!(
        tzid.to_ascii_uppercase().as_str(),
        "UTC" | "Z" | "GMT" | "ETC/UTC" | "ETC/GMT" | "ETC/ZULU"
    )
}

/// Maps a wall-clock time to an instant. Ambiguous times (DST fall-back) take the
/// earlier instant; times inside a spring-forward gap move past it.
fn resolve(local: NaiveDateTime, zone: Tz) -> Option<DateTime<Utc>> {
    let zoned = match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => zone
            .from_local_datetime(&local.checked_add_signed(Duration::hours(1))?)
            .earliest()?,
    };
    Some(zoned.with_timezone(&Utc))
}

fn zone_for(tzid: Option<&str>, local_zone: Tz) -> Tz {
    let Some(tzid) = tzid.map(|t| t.trim().trim_start_matches('/')) else {
        return local_zone;
    };
    if is_utc_zone(tzid) {
        return Tz::UTC;
    }
    tzid.parse::<Tz>().unwrap_or_else(|_| {
        debug!(tzid, "Unknown TZID, using the local zone");
        local_zone
    })
}

/// Parses one date or date-time value under the property's parameters.
fn parse_when(
    raw: &str,
    value_type: Option<&str>,
    tzid: Option<&str>,
    local_zone: Tz,
) -> Option<When> {
    let raw = raw.trim();
    let is_date = value_type.is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || (raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()));

    let when = if is_date {
        // All-day items land at local noon so they never show on the previous day.
        let date = NaiveDate::parse_from_str(raw, "%Y%m%d").ok()?;
        When {
            local: date.and_time(NaiveTime::from_hms_opt(12, 0, 0)?),
            zone: local_zone,
            all_day: true,
        }
    } else if let Some(utc) = raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        When {
            local: parse_naive(utc)?,
            zone: Tz::UTC,
            all_day: false,
        }
    } else {
        When {
            local: parse_naive(raw)?,
            zone: zone_for(tzid, local_zone),
            all_day: false,
        }
    };
    when.at().map(|_| when)
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M"))
        .ok()
}

fn property_when(prop: &Property, local_zone: Tz) -> Result<When, IcsError> {
    parse_when(&prop.value, prop.param("VALUE"), prop.param("TZID"), local_zone).ok_or_else(|| {
        malformed(
            prop.line,
            format!("invalid {} value '{}'", prop.name, prop.value),
        )
    })
}

//=========================================================================================
// Recurrence
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freq {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone)]
struct Rule {
    freq: Freq,
    interval: u32,
    count: Option<usize>,
    until: Option<DateTime<Utc>>,
}

fn parse_rule(prop: &Property, local_zone: Tz) -> Result<Rule, IcsError> {
    let mut freq = None;
    let mut interval = 1;
    let mut count = None;
    let mut until = None;
    for part in prop.value.split(';').filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| malformed(prop.line, format!("bad RRULE part '{}'", part)))?;
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => {
                freq = Some(match value.to_ascii_uppercase().as_str() {
                    "DAILY" => Freq::Daily,
                    "WEEKLY" => Freq::Weekly,
                    "MONTHLY" => Freq::Monthly,
                    "YEARLY" => Freq::Yearly,
                    other => {
                        return Err(malformed(prop.line, format!("unsupported FREQ '{}'", other)))
                    }
                })
            }
            "INTERVAL" => {
                interval = value
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| malformed(prop.line, "INTERVAL must be a positive integer"))?
            }
            "COUNT" => {
                count = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| malformed(prop.line, "COUNT must be an integer"))?,
                )
            }
            "UNTIL" => {
                until = Some(
                    parse_when(value, None, None, local_zone)
                        .and_then(|w| w.at())
                        .ok_or_else(|| malformed(prop.line, "invalid UNTIL"))?,
                )
            }
            // BYDAY, WKST and friends narrow the set further; not supported.
            _ => {}
        }
    }
    let freq = freq.ok_or_else(|| malformed(prop.line, "RRULE without FREQ"))?;
    Ok(Rule {
        freq,
        interval,
        count,
        until,
    })
}

/// Candidates examined per series before giving up on finding more dates.
const MAX_STEPS: u32 = MAX_OCCURRENCES as u32 * 12;

/// The n-th candidate of a series, or `None` when that date does not exist (the
/// 31st in a short month, Feb 29 outside leap years). Such dates are skipped.
fn nth_candidate(start: NaiveDateTime, rule: &Rule, n: u32) -> Option<NaiveDateTime> {
    let k = rule.interval.checked_mul(n)?;
    match rule.freq {
        Freq::Daily => start.checked_add_signed(Duration::days(i64::from(k))),
        Freq::Weekly => start.checked_add_signed(Duration::weeks(i64::from(k))),
        Freq::Monthly => shift_months(start, k),
        Freq::Yearly => shift_months(start, k.checked_mul(12)?),
    }
}

fn shift_months(start: NaiveDateTime, months: u32) -> Option<NaiveDateTime> {
    let index = (start.year() * 12 + start.month0() as i32)
        .checked_add(i32::try_from(months).ok()?)?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    let date = NaiveDate::from_ymd_opt(index.div_euclid(12), month, start.day())?;
    Some(date.and_time(start.time()))
}

fn expand(start: When, rule: Option<&Rule>, exdates: &[DateTime<Utc>]) -> Vec<DateTime<Utc>> {
    let Some(rule) = rule else {
        return start.at().into_iter().collect();
    };
    let limit = rule.count.unwrap_or(MAX_OCCURRENCES).min(MAX_OCCURRENCES);
    let mut produced = 0;
    let mut out = Vec::new();
    for n in 0..MAX_STEPS {
        if produced >= limit {
            break;
        }
        let Some(at) = nth_candidate(start.local, rule, n).and_then(|l| resolve(l, start.zone))
        else {
            continue;
        };
        if rule.until.is_some_and(|until| at > until) {
            break;
        }
        // Excluded dates still count toward COUNT.
        produced += 1;
        if !exdates.contains(&at) {
            out.push(at);
        }
    }
    out
}

//=========================================================================================
// Events
//=========================================================================================

/// One occurrence of a VEVENT.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub uid: Option<String>,
    pub summary: String,
    pub description: String,
    pub categories: Vec<String>,
    pub start: Option<DateTime<Utc>>,
    pub all_day: bool,
}

#[derive(Default)]
struct EventBuilder {
    props: Vec<Property>,
}

impl EventBuilder {
    fn build(self, local_zone: Tz) -> Result<Vec<CalendarEvent>, IcsError> {
        let mut uid = None;
        let mut summary = String::new();
        let mut description = String::new();
        let mut categories = Vec::new();
        let mut start: Option<When> = None;
        let mut due: Option<When> = None;
        let mut rule = None;
        let mut exdates = Vec::new();

        for prop in &self.props {
            match prop.name.as_str() {
                "UID" => uid = Some(prop.value.trim().to_string()),
                "SUMMARY" => summary = unescape(&prop.value).trim().to_string(),
                "DESCRIPTION" => description = unescape(&prop.value).trim().to_string(),
                "CATEGORIES" => categories.extend(
                    prop.value
                        .split(',')
                        .map(|c| unescape(c).trim().to_string())
                        .filter(|c| !c.is_empty()),
                ),
                "DTSTART" => start = Some(property_when(prop, local_zone)?),
                "DUE" => due = Some(property_when(prop, local_zone)?),
                "RRULE" => rule = Some(parse_rule(prop, local_zone)?),
                "EXDATE" => {
                    for raw in prop.value.split(',') {
                        let at = parse_when(raw, prop.param("VALUE"), prop.param("TZID"), local_zone)
                            .and_then(|w| w.at())
                            .ok_or_else(|| malformed(prop.line, "invalid EXDATE"))?;
                        exdates.push(at);
                    }
                }
                _ => {}
            }
        }

        let when = start.or(due);
        let base = CalendarEvent {
            uid,
            summary,
            description,
            categories,
            start: None,
            all_day: when.map(|w| w.all_day).unwrap_or(false),
        };
        let Some(when) = when else {
            return Ok(vec![base]);
        };
        Ok(expand(when, rule.as_ref(), &exdates)
            .into_iter()
            .map(|at| CalendarEvent {
                start: Some(at),
                ..base.clone()
            })
            .collect())
    }
}

/// Parses every VEVENT occurrence in a calendar, in file order.
pub fn parse_events(text: &str, local_zone: Tz) -> Result<Vec<CalendarEvent>, IcsError> {
    if text.trim().is_empty() {
        return Err(IcsError::Empty);
    }
    let lines = unfold(text.trim_start_matches('\u{feff}'));
    match lines.first() {
        Some((_, first)) if first.trim().eq_ignore_ascii_case("BEGIN:VCALENDAR") => {}
        _ => return Err(IcsError::NotACalendar),
    }

    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<EventBuilder> = None;
    let mut events = Vec::new();

    for (line, content) in &lines {
        let prop = parse_property(*line, content)?;
        match prop.name.as_str() {
            "BEGIN" => {
                let component = prop.value.trim().to_ascii_uppercase();
                if component == "VEVENT" && stack.last().map(String::as_str) == Some("VCALENDAR") {
                    current = Some(EventBuilder::default());
                }
                stack.push(component);
            }
            "END" => {
                let component = prop.value.trim().to_ascii_uppercase();
                match stack.pop() {
                    Some(open) if open == component => {}
                    Some(open) => {
                        return Err(malformed(
                            *line,
                            format!("END:{} closes BEGIN:{}", component, open),
                        ))
                    }
                    None => return Err(malformed(*line, format!("unexpected END:{}", component))),
                }
                if component == "VEVENT" && stack.last().map(String::as_str) == Some("VCALENDAR") {
                    if let Some(builder) = current.take() {
                        events.extend(builder.build(local_zone)?);
                    }
                }
            }
            _ => {
                // Only properties directly inside the VEVENT count (not its VALARMs).
                if stack.last().map(String::as_str) == Some("VEVENT") {
                    if let Some(builder) = current.as_mut() {
                        builder.props.push(prop);
                    }
                }
            }
        }
    }

    if let Some(open) = stack.pop() {
        return Err(malformed(
            lines.last().map(|(l, _)| *l).unwrap_or(0),
            format!("BEGIN:{} is never closed", open),
        ));
    }
    Ok(events)
}

//=========================================================================================
// Assignment Import
//=========================================================================================

fn course_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)([A-Z]{2,}(?:_[A-Z]{2,})?-\d{3,4})").expect("course code pattern")
    })
}

/// The first course code (e.g. `CMP_SC-4540`) in the text, upper-cased.
pub fn extract_course_code(text: &str) -> Option<String> {
    course_code_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

/// Maps course codes in class names to class ids, with the INFOTC/INFOC alias.
fn class_code_map(classes: &[ClassCollection]) -> HashMap<String, &ClassCollection> {
    let mut map = HashMap::new();
    for class in classes {
        let Some(code) = extract_course_code(&class.name) else {
            continue;
        };
        if let Some(rest) = code.strip_prefix("INFOTC-") {
            map.insert(format!("INFOC-{}", rest), class);
        } else if let Some(rest) = code.strip_prefix("INFOC-") {
            map.insert(format!("INFOTC-{}", rest), class);
        }
        map.insert(code, class);
    }
    map
}

fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keeps only events that look like coursework.
pub fn is_assignment_like(event: &CalendarEvent) -> bool {
    let blob = normalize(&format!(
        "{} {} {}",
        event.summary,
        event.description,
        event.categories.join(",")
    ));
    if NON_ASSIGNMENT_CUES.iter().any(|cue| blob.contains(cue)) {
        return false;
    }
    ASSIGNMENT_CUES.iter().any(|cue| blob.contains(cue))
}

/// An assignment or exam ready for calendar display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEntry {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub course_code: Option<String>,
    pub class_id: Option<String>,
    pub class_name: Option<String>,
    pub kind: AssignmentKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportPreview {
    pub entries: Vec<CalendarEntry>,
    pub total_events: usize,
    pub filtered_out: usize,
    pub unmatched: usize,
}

/// Parses a calendar and turns its coursework events into entries, sorted by due
/// date (undated entries last).
pub fn preview_import(
    text: &str,
    classes: &[ClassCollection],
    local_zone: Tz,
) -> Result<ImportPreview, IcsError> {
    let events = parse_events(text, local_zone)?;
    let codes = class_code_map(classes);
    let total_events = events.len();

    let mut filtered_out = 0;
    let mut unmatched = 0;
    let mut entries = Vec::new();
    for event in events {
        if !is_assignment_like(&event) {
            filtered_out += 1;
            continue;
        }
        let course_code = extract_course_code(&format!("{}\n{}", event.summary, event.description));
        let class = course_code.as_ref().and_then(|c| codes.get(c).copied());
        if class.is_none() {
            unmatched += 1;
        }
        let title: String = if event.summary.is_empty() {
            "Untitled".to_string()
        } else {
            event.summary.chars().take(200).collect()
        };
        entries.push(CalendarEntry {
            kind: classify_assignment(&title),
            title,
            description: Some(event.description).filter(|d| !d.is_empty()),
            due_date: event.start,
            all_day: event.all_day,
            course_code,
            class_id: class.map(|c| c.id.clone()),
            class_name: class.map(|c| c.name.clone()),
        });
    }
    entries.sort_by_key(|e| (e.due_date.is_none(), e.due_date));

    debug!(
        total_events,
        kept = entries.len(),
        filtered_out,
        unmatched,
        "Parsed calendar import"
    );
    Ok(ImportPreview {
        entries,
        total_events,
        filtered_out,
        unmatched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chicago() -> Tz {
        chrono_tz::America::Chicago
    }

    fn starts(events: &[CalendarEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| e.start.unwrap().format("%Y-%m-%dT%H:%MZ").to_string())
            .collect()
    }

    fn class(id: &str, name: &str) -> ClassCollection {
        ClassCollection {
            id: id.into(),
            name: name.into(),
            created_at: None,
            syllabus: None,
        }
    }

    fn calendar(body: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Canvas//EN\r\n{}END:VCALENDAR\r\n",
            body
        )
    }

    #[test]
    fn unfolds_and_unescapes() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Homework 1\\, part A\r\nDESCRIPTION:Read chapter\r\n  one\\nthen submit\r\nDTSTART:20250301T235900Z\r\nEND:VEVENT\r\n",
        );
        let events = parse_events(&text, chicago()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Homework 1, part A");
        assert_eq!(events[0].description, "Read chapter one\nthen submit");
        assert_eq!(
            events[0].start.unwrap().to_rfc3339(),
            "2025-03-01T23:59:00+00:00"
        );
    }

    #[test]
    fn all_day_dates_land_at_local_noon() {
        let text = calendar(concat!(
            "BEGIN:VEVENT\r\nSUMMARY:Essay due\r\nDTSTART;VALUE=DATE:20250115\r\nEND:VEVENT\r\n",
            "BEGIN:VEVENT\r\nSUMMARY:Lab report\r\nDTSTART;VALUE=DATE:20250710\r\nEND:VEVENT\r\n",
        ));
        let events = parse_events(&text, chicago()).unwrap();
        assert!(events.iter().all(|e| e.all_day));
        assert_eq!(starts(&events), vec!["2025-01-15T18:00Z", "2025-07-10T17:00Z"]);
    }

    #[test]
    fn floating_and_tzid_times() {
        let text = calendar(concat!(
            "BEGIN:VEVENT\r\nSUMMARY:A\r\nDTSTART:20250310T090000\r\nEND:VEVENT\r\n",
            "BEGIN:VEVENT\r\nSUMMARY:B\r\nDTSTART;TZID=Etc/UTC:20250310T090000\r\nEND:VEVENT\r\n",
            "BEGIN:VEVENT\r\nSUMMARY:C\r\nDTSTART;TZID=\"America/Chicago\":20250310T090000\r\nEND:VEVENT\r\n",
            "BEGIN:VEVENT\r\nSUMMARY:D\r\nDTSTART;TZID=America/New_York:20250115T233000\r\nEND:VEVENT\r\n",
            "BEGIN:VEVENT\r\nSUMMARY:E\r\nDTSTART;TZID=Central Standard Time:20250115T090000\r\nEND:VEVENT\r\n",
        ));
        let events = parse_events(&text, chicago()).unwrap();
        assert_eq!(
            starts(&events),
            vec![
                "2025-03-10T14:00Z",
                "2025-03-10T09:00Z",
                "2025-03-10T14:00Z",
                "2025-01-16T04:30Z",
                "2025-01-15T15:00Z",
            ]
        );
    }

    #[test]
    fn times_inside_the_spring_gap_move_forward() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Quiz\r\nDTSTART;TZID=America/Chicago:20250309T023000\r\nEND:VEVENT\r\n",
        );
        let events = parse_events(&text, chicago()).unwrap();
        assert_eq!(starts(&events), vec!["2025-03-09T08:30Z"]);
    }

    #[test]
    fn weekly_series_keeps_wall_clock_across_dst() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Weekly quiz\r\nDTSTART;TZID=America/Chicago:20250303T100000\r\nRRULE:FREQ=WEEKLY;COUNT=2\r\nEND:VEVENT\r\n",
        );
        let events = parse_events(&text, chicago()).unwrap();
        assert_eq!(starts(&events), vec!["2025-03-03T16:00Z", "2025-03-10T15:00Z"]);
    }

    #[test]
    fn monthly_series_skips_missing_days() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Project checkpoint\r\nDTSTART:20250131T120000Z\r\nRRULE:FREQ=MONTHLY;COUNT=3\r\nEND:VEVENT\r\n",
        );
        let events = parse_events(&text, chicago()).unwrap();
        assert_eq!(
            starts(&events),
            vec!["2025-01-31T12:00Z", "2025-03-31T12:00Z", "2025-05-31T12:00Z"]
        );
    }

    #[test]
    fn yearly_leap_day_only_recurs_in_leap_years() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Essay\r\nDTSTART:20240229T120000Z\r\nRRULE:FREQ=YEARLY;COUNT=2\r\nEND:VEVENT\r\n",
        );
        let events = parse_events(&text, chicago()).unwrap();
        assert_eq!(starts(&events), vec!["2024-02-29T12:00Z", "2028-02-29T12:00Z"]);
    }

    #[test]
    fn weekly_rule_with_count_and_exdate() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Weekly quiz\r\nDTSTART:20250106T150000Z\r\nRRULE:FREQ=WEEKLY;COUNT=4\r\nEXDATE:20250113T150000Z\r\nEND:VEVENT\r\n",
        );
        let events = parse_events(&text, chicago()).unwrap();
        let days: Vec<String> = events
            .iter()
            .map(|e| e.start.unwrap().format("%Y-%m-%d").to_string())
            .collect();
        assert_eq!(days, vec!["2025-01-06", "2025-01-20", "2025-01-27"]);
    }

    #[test]
    fn daily_rule_stops_at_until() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Reading\r\nDTSTART:20250101T120000Z\r\nRRULE:FREQ=DAILY;INTERVAL=2;UNTIL=20250107T120000Z\r\nEND:VEVENT\r\n",
        );
        assert_eq!(parse_events(&text, chicago()).unwrap().len(), 4);
    }

    #[test]
    fn unbounded_rule_is_capped() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Lab\r\nDTSTART:20250101T120000Z\r\nRRULE:FREQ=DAILY\r\nEND:VEVENT\r\n",
        );
        assert_eq!(parse_events(&text, chicago()).unwrap().len(), MAX_OCCURRENCES);
    }

    #[test]
    fn alarm_properties_do_not_leak_into_event() {
        let text = calendar(
            "BEGIN:VEVENT\r\nSUMMARY:Project\r\nBEGIN:VALARM\r\nDESCRIPTION:Reminder\r\nEND:VALARM\r\nEND:VEVENT\r\n",
        );
        let events = parse_events(&text, chicago()).unwrap();
        assert_eq!(events[0].description, "");
        assert_eq!(events[0].start, None);
    }

    #[test]
    fn structural_errors_are_reported() {
        assert!(matches!(parse_events("   ", chicago()), Err(IcsError::Empty)));
        assert!(matches!(
            parse_events("hello\r\n", chicago()),
            Err(IcsError::NotACalendar)
        ));
        let unbalanced = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nEND:VCALENDAR\r\n";
        assert!(matches!(
            parse_events(unbalanced, chicago()),
            Err(IcsError::Malformed { line: 3, .. })
        ));
        let bad_date = calendar("BEGIN:VEVENT\r\nDTSTART:tomorrow\r\nEND:VEVENT\r\n");
        assert!(matches!(
            parse_events(&bad_date, chicago()),
            Err(IcsError::Malformed { .. })
        ));
        let bad_rule = calendar(
            "BEGIN:VEVENT\r\nDTSTART:20250101T120000Z\r\nRRULE:FREQ=HOURLY\r\nEND:VEVENT\r\n",
        );
        assert!(parse_events(&bad_rule, chicago()).is_err());
    }

    #[test]
    fn extracts_course_codes() {
        assert_eq!(
            extract_course_code("Quiz 2 [cmp_sc-4540-01]"),
            Some("CMP_SC-4540".into())
        );
        assert_eq!(extract_course_code("no code here"), None);
    }

    #[test]
    fn preview_filters_matches_and_sorts() {
        let text = calendar(concat!(
            "BEGIN:VEVENT\r\nSUMMARY:Final Exam [INFOC-4400]\r\nDTSTART:20250501T150000Z\r\nEND:VEVENT\r\n",
            "BEGIN:VEVENT\r\nSUMMARY:Lecture 4\r\nDTSTART:20250102T150000Z\r\nEND:VEVENT\r\n",
            "BEGIN:VEVENT\r\nSUMMARY:Homework 2\r\nDESCRIPTION:CMP_SC-4540\r\nDTSTART:20250201T150000Z\r\nEND:VEVENT\r\n",
            "BEGIN:VEVENT\r\nSUMMARY:Essay draft\r\nDTSTART:20250301T150000Z\r\nEND:VEVENT\r\n",
        ));
        let classes = [
            class("c1", "INFOTC-4400 Networking"),
            class("c2", "CMP_SC-4540 Algorithms"),
        ];
        let preview = preview_import(&text, &classes, chicago()).unwrap();

        assert_eq!(preview.total_events, 4);
        assert_eq!(preview.filtered_out, 1);
        assert_eq!(preview.unmatched, 1);
        let titles: Vec<&str> = preview.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Homework 2", "Essay draft", "Final Exam [INFOC-4400]"]);
        assert_eq!(preview.entries[0].class_id.as_deref(), Some("c2"));
        assert_eq!(preview.entries[2].class_id.as_deref(), Some("c1"));
        assert_eq!(preview.entries[2].kind, AssignmentKind::Exam);
        assert_eq!(preview.entries[1].class_id, None);
    }
}
