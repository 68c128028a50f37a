//! End-to-end exercise of the pure goal pipeline: period creation, weekly
//! edits, history derivation, and the tracking overview, all through the
//! public library API.

use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use kpiserver::achievement::{average_percent, status_bucket, StatusBucket};
use kpiserver::auth::session::{decode_token, issue_token};
use kpiserver::auth::SessionProfile;
use kpiserver::operational::progress::{diff_history, set_weekly_achieved, NOTE_WEEKLY};
use kpiserver::operational::tracking::tracking_rows;
use kpiserver::operational::{
    build_periods, OperationalGoal, PeriodInput, Quarter, TrackingMethod, TrackingQuery,
};
use kpiserver::shared::config::SessionConfig;
use kpiserver::users::types::Role;

fn goal_with(progress: Vec<kpiserver::operational::PeriodProgress>) -> OperationalGoal {
    let now = Utc::now();
    OperationalGoal {
        id: Uuid::new_v4(),
        goal: "Raise patient satisfaction".to_string(),
        strategic_goal_id: None,
        strategic_goal_text: Some("Service excellence".to_string()),
        department_id: None,
        indicator: Some("Survey score".to_string()),
        tracking_method: TrackingMethod::Weekly,
        weight: 1.0,
        exclude_from_calculation: false,
        is_reverse: false,
        calculation_method: None,
        display_options: vec![],
        icon: None,
        progress,
        history: vec![],
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn weekly_goal_lifecycle_produces_history_and_overview() {
    // A weekly goal with one Q1 period targeting 130.
    let periods = build_periods(
        &[PeriodInput {
            year: "2025".to_string(),
            quarter: Quarter::Q1,
            target: 130.0,
            achieved_type_id: None,
        }],
        &[],
        TrackingMethod::Weekly,
        None,
    )
    .unwrap();

    let mut goal = goal_with(periods);

    // An editor fills in three weeks.
    let mut edited = goal.progress.clone();
    set_weekly_achieved(&mut edited, "2025", Quarter::Q1, 1, 20.0).unwrap();
    set_weekly_achieved(&mut edited, "2025", Quarter::Q1, 2, 25.0).unwrap();
    set_weekly_achieved(&mut edited, "2025", Quarter::Q1, 3, 20.0).unwrap();

    let editor = Uuid::new_v4();
    let now = Utc::now();
    let entries = diff_history(&goal.progress, &edited, goal.tracking_method, editor, now);

    // One period changed, so one entry, weekly note, total 65.
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].note, NOTE_WEEKLY);
    assert_eq!(entries[0].old_value, 0.0);
    assert_eq!(entries[0].new_value, 65.0);

    goal.progress = edited;
    goal.history.extend(entries);

    // 65 of 130 is 50 percent, which lands in the orange bucket.
    let type_names: HashMap<Uuid, String> = HashMap::new();
    let avg = average_percent(&goal.progress, goal.tracking_method, &type_names);
    assert_eq!(avg, 50.0);
    assert_eq!(status_bucket(avg, false), StatusBucket::Orange);

    // The tracking overview reports the same numbers.
    let query = TrackingQuery {
        search: Some("satisfaction".to_string()),
        department_id: None,
        quarter: Some(Quarter::Q1),
        method: Some(TrackingMethod::Weekly),
        week: None,
    };
    let rows = tracking_rows(vec![goal], &HashMap::new(), &type_names, &query);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].avg_percent, 50.0);
    assert_eq!(rows[0].status, StatusBucket::Orange);
}

#[test]
fn session_token_round_trips_the_profile() {
    let config = SessionConfig {
        secret: "integration-test-secret".to_string(),
        ttl_seconds: 86400,
        remember_ttl_seconds: 2592000,
    };
    let profile = SessionProfile {
        uid: Uuid::new_v4(),
        email: "manager@example.org".to_string(),
        name: "Manager".to_string(),
        role: Role::Manager,
        department_ids: vec![Uuid::new_v4()],
    };

    let token = issue_token(&profile, &config, config.ttl_seconds).unwrap();
    let decoded = decode_token(&token, &config).unwrap();
    assert_eq!(decoded.uid, profile.uid);
    assert_eq!(decoded.email, profile.email);
    assert!(decoded.is_manager());
    assert!(decoded.can_edit_department(Some(profile.department_ids[0])));
}
