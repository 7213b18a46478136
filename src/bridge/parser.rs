//! Game chat log line classification.
//!
//! Turns raw log lines such as `[08:00:00]: [Say] (KU_ab12) Alice: hello`
//! into [`GameMessage`]s. Lines without a time token are dropped, never
//! reported as errors.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use tracing::debug;

use crate::common::types::{GameMessage, MessageKind};

/// Author used for lines that do not name a speaker.
pub const SYSTEM_AUTHOR: &str = "System";

/// Separator between speaker and text in chat lines.
const AUTHOR_SEPARATOR: &str = ": ";

/// Lines stamped at or after this hour may belong to the day before the floor time.
const LATE_NIGHT_HOUR: u32 = 20;

/// Floor times at or before this hour accept late-night lines from the previous day.
const EARLY_MORNING_HOUR: u32 = 4;

const JOIN_MARKER: &str = "[Join Announcement]";
const LEAVE_MARKER: &str = "[Leave Announcement]";
const DEATH_MARKER: &str = "[Death Announcement]";

/// Channel tags the server puts in front of chat lines.
const CHANNEL_TAGS: [&str; 3] = ["[Say]", "[Whisper]", "[Announcement]"];

/// Parse one raw log line fetched from `cluster_id`/`world_id`.
///
/// With a `floor_time`, lines stamped strictly earlier are treated as
/// history from before the bridge started and dropped, except late-night
/// lines seen shortly after midnight.
pub fn parse(
    raw_line: &str,
    cluster_id: &str,
    world_id: &str,
    floor_time: Option<NaiveDateTime>,
) -> Option<GameMessage> {
    let (timestamp, rest) = split_time_token(raw_line)?;

    if let Some(floor) = floor_time {
        if predates_floor(timestamp, floor) {
            debug!(
                cluster = cluster_id,
                world = world_id,
                "Skipping line from before start: {} < {}",
                timestamp,
                floor.time()
            );
            return None;
        }
    }

    let body = rest.trim_start_matches(':').trim();
    if body.is_empty() {
        return None;
    }

    let (kind, author, content) = classify(body);

    Some(GameMessage::new(
        timestamp, cluster_id, world_id, author, content, kind, raw_line,
    ))
}

/// Whether a line stamped `timestamp` falls before the floor time.
fn predates_floor(timestamp: NaiveTime, floor: NaiveDateTime) -> bool {
    if timestamp >= floor.time() {
        return false;
    }
    // Started just after midnight: late lines are from "today" in log terms.
    let crosses_midnight = timestamp.hour() >= LATE_NIGHT_HOUR && floor.hour() <= EARLY_MORNING_HOUR;
    !crosses_midnight
}

/// Find the first `[HH:MM:SS]` token; return the time and the text after it.
fn split_time_token(line: &str) -> Option<(NaiveTime, &str)> {
    for (start, _) in line.match_indices('[') {
        let Some(token) = line.get(start + 1..start + 9) else {
            continue;
        };
        if line.as_bytes().get(start + 9) != Some(&b']') {
            continue;
        }
        if let Ok(time) = NaiveTime::parse_from_str(token, "%H:%M:%S") {
            return Some((time, &line[start + 10..]));
        }
    }
    None
}

/// Decide kind, author and content for the text after the time token.
fn classify(body: &str) -> (MessageKind, String, String) {
    if let Some(rest) = body.strip_prefix(JOIN_MARKER) {
        let name = rest.trim();
        return (MessageKind::Join, name.to_string(), name.to_string());
    }
    if let Some(rest) = body.strip_prefix(LEAVE_MARKER) {
        let name = rest.trim();
        return (MessageKind::Leave, name.to_string(), name.to_string());
    }
    if let Some(rest) = body.strip_prefix(DEATH_MARKER) {
        let text = rest.trim();
        let victim = text.split_whitespace().next().unwrap_or(SYSTEM_AUTHOR);
        return (MessageKind::Death, victim.to_string(), text.to_string());
    }

    let speech = strip_user_id(strip_channel_tag(body));
    if let Some((author, content)) = speech.split_once(AUTHOR_SEPARATOR) {
        let author = author.trim();
        if !author.is_empty() {
            return (MessageKind::Chat, author.to_string(), content.trim().to_string());
        }
    }

    (MessageKind::System, SYSTEM_AUTHOR.to_string(), body.to_string())
}

fn strip_channel_tag(body: &str) -> &str {
    CHANNEL_TAGS
        .iter()
        .find_map(|tag| body.strip_prefix(tag))
        .map(str::trim_start)
        .unwrap_or(body)
}

/// Drop a leading `(KU_xxxx)` platform user id.
fn strip_user_id(body: &str) -> &str {
    if let Some(rest) = body.strip_prefix("(KU_") {
        if let Some(close) = rest.find(')') {
            return rest[close + 1..].trim_start();
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_plain_chat_line() {
        let msg = parse("[08:00:00] Alice: hello", "c1", "w1", None).unwrap();
        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.author, "Alice");
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.time_str(), "08:00:00");
        assert_eq!(msg.cluster_id, "c1");
        assert_eq!(msg.world_id, "w1");
        assert_eq!(msg.raw_line, "[08:00:00] Alice: hello");
    }

    #[test]
    fn test_server_chat_line_with_tag_and_user_id() {
        let msg = parse("[12:34:56]: [Say] (KU_abc123) Wilson: anyone got flint?", "c", "w", None).unwrap();
        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.author, "Wilson");
        assert_eq!(msg.content, "anyone got flint?");
    }

    #[test]
    fn test_content_keeps_later_separators() {
        let msg = parse("[08:00:00] Alice: note: bring torches", "c", "w", None).unwrap();
        assert_eq!(msg.author, "Alice");
        assert_eq!(msg.content, "note: bring torches");
    }

    #[test]
    fn test_missing_time_token_is_dropped() {
        assert!(parse("Alice: hello", "c", "w", None).is_none());
        assert!(parse("[8:00] Alice: hello", "c", "w", None).is_none());
        assert!(parse("", "c", "w", None).is_none());
    }

    #[test]
    fn test_invalid_time_is_dropped() {
        assert!(parse("[25:61:00] Alice: hello", "c", "w", None).is_none());
    }

    #[test]
    fn test_time_token_after_other_brackets() {
        let msg = parse("[info] [09:15:00] Bob: hi", "c", "w", None).unwrap();
        assert_eq!(msg.author, "Bob");
    }

    #[test]
    fn test_line_without_separator_is_system() {
        let msg = parse("[08:00:00] Server is shutting down", "c", "w", None).unwrap();
        assert_eq!(msg.kind, MessageKind::System);
        assert_eq!(msg.author, SYSTEM_AUTHOR);
        assert_eq!(msg.content, "Server is shutting down");
    }

    #[test]
    fn test_empty_body_is_dropped() {
        assert!(parse("[08:00:00]:   ", "c", "w", None).is_none());
    }

    #[test]
    fn test_announcements() {
        let join = parse("[08:00:00]: [Join Announcement] Willow", "c", "w", None).unwrap();
        assert_eq!(join.kind, MessageKind::Join);
        assert_eq!(join.author, "Willow");

        let leave = parse("[08:00:00]: [Leave Announcement] Willow", "c", "w", None).unwrap();
        assert_eq!(leave.kind, MessageKind::Leave);

        let death = parse("[08:00:00]: [Death Announcement] Wes was killed by Spider.", "c", "w", None).unwrap();
        assert_eq!(death.kind, MessageKind::Death);
        assert_eq!(death.author, "Wes");
        assert_eq!(death.content, "Wes was killed by Spider.");
    }

    #[test]
    fn test_floor_time_drops_earlier_lines() {
        let floor = Some(at(8, 0, 0));
        assert!(parse("[07:59:59] Alice: old", "c", "w", floor).is_none());
        assert!(parse("[08:00:01] Alice: new", "c", "w", floor).is_some());
        assert!(parse("[08:00:00] Alice: same second", "c", "w", floor).is_some());
    }

    #[test]
    fn test_floor_time_day_boundary() {
        let floor = Some(at(0, 0, 5));
        assert!(parse("[23:59:50] Alice: late", "c", "w", floor).is_some());
        assert!(parse("[00:00:01] Alice: early", "c", "w", floor).is_none());
    }

    #[test]
    fn test_floor_time_boundary_only_near_midnight() {
        // Afternoon start: an evening-looking stamp is still history.
        let floor = Some(at(15, 0, 0));
        assert!(parse("[14:00:00] Alice: old", "c", "w", floor).is_none());
        let floor = Some(at(23, 0, 0));
        assert!(parse("[21:00:00] Alice: old", "c", "w", floor).is_none());
    }

    #[test]
    fn test_multibyte_content_does_not_panic() {
        let msg = parse("[10:00:00] 威尔逊: 你好", "c", "w", None).unwrap();
        assert_eq!(msg.author, "威尔逊");
        assert_eq!(msg.content, "你好");
        assert!(parse("[威尔逊威尔逊] hi", "c", "w", None).is_none());
    }
}
