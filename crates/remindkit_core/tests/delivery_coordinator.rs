use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use remindkit_core::db::{open_db, open_db_in_memory};
use remindkit_core::{
    CustomUnit, DeliveryCoordinator, ManualClock, MemoryNotifier, NotificationPermission,
    Reminder, ReminderState, ReminderStore, RepeatRule, SqliteReminderStore,
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()
}

fn seeded_coordinator(
    reminders: &[Reminder],
    notifier: MemoryNotifier,
) -> DeliveryCoordinator<SqliteReminderStore, MemoryNotifier> {
    let mut store = SqliteReminderStore::try_new(open_db_in_memory().unwrap()).unwrap();
    store.save(reminders).unwrap();
    DeliveryCoordinator::new(store, notifier)
}

fn stored(
    coordinator: &DeliveryCoordinator<SqliteReminderStore, MemoryNotifier>,
    reminder: &Reminder,
) -> Reminder {
    coordinator
        .store()
        .get_reminder(reminder.id, false)
        .unwrap()
        .unwrap()
}

#[test]
fn empty_store_poll_is_a_noop() {
    let notifier = MemoryNotifier::new();
    let mut coordinator = seeded_coordinator(&[], notifier.clone());

    let report = coordinator.poll_at(base_time()).unwrap();
    assert!(report.is_noop());
    assert_eq!(report.checked, 0);
    assert_eq!(report.persisted, None);
    assert_eq!(notifier.delivered_count(), 0);
}

#[test]
fn future_reminders_are_left_untouched() {
    let reminder = Reminder::new("later", None, base_time() + Duration::hours(1), RepeatRule::Daily);
    let notifier = MemoryNotifier::new();
    let mut coordinator = seeded_coordinator(&[reminder.clone()], notifier.clone());

    let report = coordinator.poll_at(base_time()).unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.owed, 0);
    assert!(report.is_noop());
    assert_eq!(stored(&coordinator, &reminder), reminder);
}

#[test]
fn one_shot_reminder_fires_exactly_once() {
    let reminder = Reminder::new(
        "dentist",
        Some("bring insurance card".to_string()),
        base_time(),
        RepeatRule::None,
    );
    let notifier = MemoryNotifier::new();
    let mut coordinator = seeded_coordinator(&[reminder.clone()], notifier.clone());

    let report = coordinator.poll_at(base_time() + Duration::seconds(1)).unwrap();
    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].occurrence, base_time());
    assert_eq!(report.fired[0].next_due_at, None);
    assert!(report.fired[0].delivered);

    let delivered = notifier.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].title, "dentist");
    assert_eq!(delivered[0].body.as_deref(), Some("bring insurance card"));
    assert_eq!(delivered[0].reminder_id, Some(reminder.id));

    let after = stored(&coordinator, &reminder);
    assert!(after.notified);
    assert_eq!(after.due_at, base_time());
    assert_eq!(after.revision, 1);

    for hours in [1, 24, 24 * 365] {
        let report = coordinator.poll_at(base_time() + Duration::hours(hours)).unwrap();
        assert!(report.is_noop());
    }
    assert_eq!(notifier.delivered_count(), 1);
}

#[test]
fn polling_twice_at_the_same_instant_is_idempotent() {
    let reminder = Reminder::new("standup", None, base_time(), RepeatRule::Daily);
    let notifier = MemoryNotifier::new();
    let mut coordinator = seeded_coordinator(&[reminder.clone()], notifier.clone());
    let now = base_time() + Duration::minutes(2);

    let first = coordinator.poll_at(now).unwrap();
    let snapshot = coordinator.store().load().unwrap();
    let second = coordinator.poll_at(now).unwrap();

    assert_eq!(first.fired.len(), 1);
    assert!(second.is_noop());
    assert_eq!(coordinator.store().load().unwrap(), snapshot);
    assert_eq!(notifier.delivered_count(), 1);
}

#[test]
fn daily_reminder_catches_up_with_a_single_notification() {
    let reminder = Reminder::new("vitamins", None, base_time(), RepeatRule::Daily);
    let notifier = MemoryNotifier::new();
    let mut coordinator = seeded_coordinator(&[reminder.clone()], notifier.clone());
    let now = base_time() + Duration::days(10) + Duration::hours(1);

    let report = coordinator.poll_at(now).unwrap();
    assert_eq!(report.fired.len(), 1);
    assert_eq!(notifier.delivered_count(), 1);

    let after = stored(&coordinator, &reminder);
    assert_eq!(after.due_at, base_time() + Duration::days(11));
    assert!(!after.notified);
    assert_eq!(after.state_at(now), ReminderState::Waiting);
}

#[test]
fn custom_rule_skips_missed_steps() {
    let rule = RepeatRule::Custom {
        interval: 15,
        unit: CustomUnit::Minutes,
    };
    let reminder = Reminder::new("stretch", None, base_time(), rule);
    let notifier = MemoryNotifier::new();
    let mut coordinator = seeded_coordinator(&[reminder.clone()], notifier.clone());

    coordinator.poll_at(base_time() + Duration::minutes(47)).unwrap();
    let after = stored(&coordinator, &reminder);
    assert_eq!(after.due_at, base_time() + Duration::minutes(60));
}

#[test]
fn monthly_rule_clamps_to_month_end_in_calendar_offset() {
    // 23:30 on Jan 31 at UTC+2 is 21:30 UTC.
    let calendar = FixedOffset::east_opt(2 * 3600).unwrap();
    let due = Utc.with_ymd_and_hms(2024, 1, 31, 21, 30, 0).unwrap();
    let reminder = Reminder::new("rent", None, due, RepeatRule::Monthly);
    let notifier = MemoryNotifier::new();
    let mut coordinator = seeded_coordinator(&[reminder.clone()], notifier).with_calendar(calendar);

    coordinator.poll_at(due + Duration::minutes(1)).unwrap();
    let after = stored(&coordinator, &reminder);
    assert_eq!(after.due_at, Utc.with_ymd_and_hms(2024, 2, 29, 21, 30, 0).unwrap());
}

#[test]
fn missing_permission_skips_the_tick_and_keeps_reminders_owed() {
    let reminder = Reminder::new("call back", None, base_time(), RepeatRule::None);
    let notifier = MemoryNotifier::with_permission(NotificationPermission::Denied);
    let mut coordinator = seeded_coordinator(&[reminder.clone()], notifier.clone());
    let now = base_time() + Duration::minutes(1);

    let report = coordinator.poll_at(now).unwrap();
    assert!(report.permission_blocked);
    assert_eq!(report.permission, Some(NotificationPermission::Denied));
    assert_eq!(report.owed, 1);
    assert!(report.fired.is_empty());
    assert_eq!(report.persisted, None);
    assert_eq!(stored(&coordinator, &reminder), reminder);

    notifier.set_permission(NotificationPermission::Prompt);
    assert!(coordinator.poll_at(now).unwrap().permission_blocked);

    notifier.set_permission(NotificationPermission::Granted);
    let report = coordinator.poll_at(now + Duration::minutes(1)).unwrap();
    assert!(!report.permission_blocked);
    assert_eq!(report.fired.len(), 1);
    assert_eq!(notifier.delivered_count(), 1);
    assert!(stored(&coordinator, &reminder).notified);
}

#[test]
fn delivery_failure_still_advances_the_reminder() {
    let reminder = Reminder::new("stand up", None, base_time(), RepeatRule::Hourly);
    let notifier = MemoryNotifier::new();
    notifier.set_fail_deliveries(true);
    let mut coordinator = seeded_coordinator(&[reminder.clone()], notifier.clone());

    let report = coordinator.poll_at(base_time() + Duration::minutes(5)).unwrap();
    assert_eq!(report.delivery_failures, 1);
    assert_eq!(report.fired.len(), 1);
    assert!(!report.fired[0].delivered);
    assert_eq!(notifier.failed_attempts(), 1);
    assert_eq!(notifier.delivered_count(), 0);

    let after = stored(&coordinator, &reminder);
    assert_eq!(after.due_at, base_time() + Duration::hours(1));
    assert_eq!(after.revision, 1);
}

#[test]
fn mixed_collection_only_fires_owed_reminders() {
    let owed = Reminder::new("owed", None, base_time(), RepeatRule::Weekly);
    let waiting = Reminder::new("waiting", None, base_time() + Duration::days(1), RepeatRule::None);
    let mut inert = Reminder::new("inert", None, base_time() - Duration::days(1), RepeatRule::None);
    inert.notified = true;
    inert.revision = 1;

    let notifier = MemoryNotifier::new();
    let mut coordinator =
        seeded_coordinator(&[owed.clone(), waiting.clone(), inert.clone()], notifier.clone());

    let report = coordinator.poll_at(base_time()).unwrap();
    assert_eq!(report.checked, 3);
    assert_eq!(report.owed, 1);
    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].id, owed.id);
    let summary = report.persisted.unwrap();
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.skipped, 2);

    assert_eq!(stored(&coordinator, &waiting), waiting);
    assert_eq!(stored(&coordinator, &inert), inert);
    assert_eq!(
        stored(&coordinator, &owed).due_at,
        base_time() + Duration::weeks(1)
    );
}

#[test]
fn deleted_reminders_never_fire() {
    let reminder = Reminder::new("cancelled", None, base_time(), RepeatRule::Daily);
    let notifier = MemoryNotifier::new();
    let mut coordinator = seeded_coordinator(&[reminder.clone()], notifier.clone());
    coordinator
        .store_mut()
        .soft_delete_reminder(reminder.id)
        .unwrap();

    let report = coordinator.poll_at(base_time() + Duration::days(3)).unwrap();
    assert!(report.is_noop());
    assert_eq!(report.checked, 0);
    assert_eq!(notifier.delivered_count(), 0);
}

#[test]
fn pollers_sharing_a_file_deliver_each_occurrence_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let reminder = Reminder::new("shared", None, base_time(), RepeatRule::Daily);

    let foreground_notifier = MemoryNotifier::new();
    let background_notifier = MemoryNotifier::new();
    let mut foreground = DeliveryCoordinator::new(
        SqliteReminderStore::open(&path).unwrap(),
        foreground_notifier.clone(),
    );
    let mut background = DeliveryCoordinator::new(
        SqliteReminderStore::try_new(open_db(&path).unwrap()).unwrap(),
        background_notifier.clone(),
    );
    foreground.store().create_reminder(&reminder).unwrap();

    let clock = ManualClock::new(base_time() + Duration::minutes(1));
    foreground.poll(&clock).unwrap();
    assert!(background.poll(&clock).unwrap().is_noop());

    clock.advance(Duration::days(1));
    background.poll(&clock).unwrap();
    assert!(foreground.poll(&clock).unwrap().is_noop());

    assert_eq!(foreground_notifier.delivered_count(), 1);
    assert_eq!(background_notifier.delivered_count(), 1);

    let after = background.store().get_reminder(reminder.id, false).unwrap().unwrap();
    assert_eq!(after.revision, 2);
    assert_eq!(after.due_at, base_time() + Duration::days(2));
}
