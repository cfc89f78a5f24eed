use std::fs;
use std::path::PathBuf;

use slate_grader::scores_fetch::{
    TeamDirectory, event_to_game_result, final_score, parse_scores_json,
};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_scores_fixture() {
    let raw = read_fixture("theoddsapi_scores.json");
    let events = parse_scores_json(&raw).expect("fixture should parse");
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].id, "evt1001");
    assert!(events[0].completed);
    assert!(!events[1].completed);
}

#[test]
fn final_score_requires_matching_team_names() {
    let raw = read_fixture("theoddsapi_scores.json");
    let events = parse_scores_json(&raw).expect("fixture should parse");

    assert_eq!(final_score(&events[0]), Some((27, 20)));
    // In progress: no score yet.
    assert_eq!(final_score(&events[1]), None);
    // Completed but the home entry name does not match the event's home team.
    assert_eq!(final_score(&events[2]), None);
}

#[test]
fn null_body_is_empty() {
    assert!(parse_scores_json("null").expect("null should parse").is_empty());
}

#[test]
fn reshapes_events_into_game_results() {
    let raw = read_fixture("theoddsapi_scores.json");
    let events = parse_scores_json(&raw).expect("fixture should parse");

    let mut teams = TeamDirectory::default();
    teams.insert("Kansas City Chiefs", "KC");
    teams.insert("Buffalo Bills", "BUF");

    let result = event_to_game_result(&events[0], "nfl", &teams);
    assert_eq!(result.league, "nfl");
    assert_eq!(result.game_id, "evt1001");
    assert_eq!(result.home_team, "KC");
    assert_eq!(result.away_team, "BUF");
    assert_eq!(result.final_score(), Some((27, 20)));
    assert_eq!(
        result.start_time.map(|dt| dt.to_rfc3339()),
        Some("2026-08-01T17:00:00+00:00".to_string())
    );

    // Incomplete game keeps its row but stays unscored.
    let pending = event_to_game_result(&events[1], "nfl", &teams);
    assert!(!pending.completed);
    assert_eq!(pending.final_score(), None);
    assert_eq!(pending.home_team, "Philadelphia Eagles");
}
