//! Sport detection for queries that do not name their sports explicitly

use common::{Sport, UserQuery};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SPORT_PATTERNS: Vec<(Sport, Regex)> = vec![
        (
            Sport::Basketball,
            Regex::new(r"(?i)\b(?:basketball|nba|wnba|ncaab|march madness|hoops|three[- ]pointers?)\b")
                .expect("valid basketball pattern"),
        ),
        (
            Sport::Hockey,
            Regex::new(r"(?i)\b(?:hockey|nhl|stanley cup|puck|power[- ]play)\b")
                .expect("valid hockey pattern"),
        ),
        (
            Sport::Football,
            Regex::new(r"(?i)\b(?:football|nfl|ncaaf|super bowl|touchdowns?|quarterbacks?)\b")
                .expect("valid football pattern"),
        ),
        (
            Sport::Baseball,
            Regex::new(r"(?i)\b(?:baseball|mlb|world series|innings?|home runs?|pitchers?)\b")
                .expect("valid baseball pattern"),
        ),
        (
            Sport::Soccer,
            Regex::new(r"(?i)\b(?:soccer|mls|epl|premier league|champions league|la liga|serie a|bundesliga)\b")
                .expect("valid soccer pattern"),
        ),
    ];
}

/// Sports mentioned in free text, in order of first mention
pub fn detect_sports(text: &str) -> Vec<Sport> {
    let mut found: Vec<(usize, Sport)> = SPORT_PATTERNS
        .iter()
        .filter_map(|(sport, pattern)| pattern.find(text).map(|m| (m.start(), *sport)))
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, sport)| sport).collect()
}

/// Sports to dispatch for a query: the explicit list with duplicates collapsed,
/// or whatever the text mentions when the list is empty
pub fn requested_sports(query: &UserQuery) -> Vec<Sport> {
    if query.sports.is_empty() {
        return detect_sports(&query.query_text);
    }

    let mut sports = Vec::with_capacity(query.sports.len());
    for sport in &query.sports {
        if !sports.contains(sport) {
            sports.push(*sport);
        }
    }
    sports
}
