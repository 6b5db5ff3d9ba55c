use chrono::{DateTime, Duration, TimeZone, Utc};
use remindkit_core::db::open_db_in_memory;
use remindkit_core::model::counter::CounterValidationError;
use remindkit_core::service::counter_service::TIME_COUNTERS_KEY;
use remindkit_core::{
    CounterService, CounterServiceError, PreferenceRepository, RepoError,
    SqlitePreferenceRepository,
};
use serde::{Deserialize, Serialize};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 24, 18, 0, 0).unwrap()
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct ThemeChoice {
    name: String,
    high_contrast: bool,
}

#[test]
fn preference_values_can_be_set_replaced_and_removed() {
    let conn = open_db_in_memory().unwrap();
    let prefs = SqlitePreferenceRepository::new(&conn);

    assert_eq!(prefs.get("locale").unwrap(), None);
    prefs.set("locale", "en-GB").unwrap();
    prefs.set(" locale ", "de-DE").unwrap();
    prefs.set("sound", "chime").unwrap();

    assert_eq!(prefs.get("locale").unwrap().as_deref(), Some("de-DE"));
    assert_eq!(prefs.list_keys().unwrap(), vec!["locale", "sound"]);

    assert!(prefs.remove("sound").unwrap());
    assert!(!prefs.remove("sound").unwrap());
    assert_eq!(prefs.list_keys().unwrap(), vec!["locale"]);
}

#[test]
fn preference_keys_must_not_be_blank() {
    let conn = open_db_in_memory().unwrap();
    let prefs = SqlitePreferenceRepository::new(&conn);
    let err = prefs.set("  ", "value").unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn json_preferences_round_trip_and_reject_garbage() {
    let conn = open_db_in_memory().unwrap();
    let prefs = SqlitePreferenceRepository::new(&conn);
    let theme = ThemeChoice {
        name: "dusk".to_string(),
        high_contrast: true,
    };

    prefs.set_json("theme", &theme).unwrap();
    assert_eq!(prefs.get_json::<ThemeChoice>("theme").unwrap(), Some(theme));

    prefs.set("theme", "{not json").unwrap();
    let err = prefs.get_json::<ThemeChoice>("theme").unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn counters_are_stored_under_one_preference_key() {
    let conn = open_db_in_memory().unwrap();
    let service = CounterService::new(SqlitePreferenceRepository::new(&conn));

    let launch = service
        .add_counter("launch", Some("  v2 release ".to_string()), base_time())
        .unwrap();
    let holiday = service
        .add_counter("holiday", None, base_time() + Duration::days(7))
        .unwrap();

    assert_eq!(launch.description.as_deref(), Some("v2 release"));
    assert_eq!(service.list_counters().unwrap(), vec![launch.clone(), holiday.clone()]);

    let prefs = SqlitePreferenceRepository::new(&conn);
    assert_eq!(prefs.list_keys().unwrap(), vec![TIME_COUNTERS_KEY]);

    service.remove_counter(launch.id).unwrap();
    assert_eq!(service.list_counters().unwrap(), vec![holiday]);

    let err = service.remove_counter(launch.id).unwrap_err();
    assert!(matches!(err, CounterServiceError::CounterNotFound(id) if id == launch.id));
}

#[test]
fn counters_require_a_title() {
    let conn = open_db_in_memory().unwrap();
    let service = CounterService::new(SqlitePreferenceRepository::new(&conn));

    let err = service.add_counter("   ", None, base_time()).unwrap_err();
    assert!(matches!(
        err,
        CounterServiceError::Validation(CounterValidationError::EmptyTitle)
    ));
    assert!(service.list_counters().unwrap().is_empty());
}

#[test]
fn board_splits_and_orders_counters() {
    let conn = open_db_in_memory().unwrap();
    let service = CounterService::new(SqlitePreferenceRepository::new(&conn));
    let now = base_time();

    let far = service.add_counter("far", None, now + Duration::days(30)).unwrap();
    let old = service.add_counter("old", None, now - Duration::days(10)).unwrap();
    let soon = service
        .add_counter("soon", None, now + Duration::hours(1) + Duration::seconds(5))
        .unwrap();
    let recent = service.add_counter("recent", None, now - Duration::minutes(3)).unwrap();

    let board = service.board(now).unwrap();
    let coming_up: Vec<_> = board.coming_up.iter().map(|view| view.counter.id).collect();
    let elapsed: Vec<_> = board.elapsed.iter().map(|view| view.counter.id).collect();
    assert_eq!(coming_up, vec![soon.id, far.id]);
    assert_eq!(elapsed, vec![recent.id, old.id]);

    assert_eq!(board.coming_up[0].parts.to_string(), "01:00:05");
    assert!(!board.coming_up[0].parts.elapsed);
    assert_eq!(board.elapsed[1].parts.to_string(), "10d 00:00:00");
    assert!(board.elapsed[1].parts.elapsed);
}

#[test]
fn corrupted_counter_list_is_reported() {
    let conn = open_db_in_memory().unwrap();
    SqlitePreferenceRepository::new(&conn)
        .set(TIME_COUNTERS_KEY, "[{\"broken\": true}]")
        .unwrap();
    let service = CounterService::new(SqlitePreferenceRepository::new(&conn));

    let err = service.list_counters().unwrap_err();
    assert!(matches!(err, CounterServiceError::Repo(RepoError::InvalidData(_))));
}
