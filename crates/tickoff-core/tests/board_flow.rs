use chrono::{DateTime, Duration, TimeZone, Utc};
use tickoff_core::datetime::FixedClock;
use tickoff_core::{
    Board, BoardCounts, DateFilter, MemoryBackend, SortKey, StatusFilter, TaskStore, Theme,
    ViewQuery,
};

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0)
        .single()
        .expect("valid instant")
}

async fn empty_board() -> Board<MemoryBackend, FixedClock> {
    let store = TaskStore::with_clock(MemoryBackend::new(), FixedClock::new(noon()), chrono_tz::UTC);
    Board::open(store, ViewQuery::default())
        .await
        .expect("open board")
}

fn texts(board: &Board<MemoryBackend, FixedClock>) -> Vec<String> {
    board.visible().into_iter().map(|task| task.text).collect()
}

#[tokio::test]
async fn overdue_task_leaves_the_overdue_view_once_done() {
    let mut board = empty_board().await;
    let late = board
        .add_task("File taxes", Some("2026-06-10T11:00"), Some("high"))
        .await
        .expect("add late");
    board
        .add_task("Plan trip", Some("2026-06-12"), None)
        .await
        .expect("add future");

    board.set_date_filter(DateFilter::Overdue);
    assert_eq!(texts(&board), vec!["File taxes"]);
    assert_eq!(board.counts().overdue, 1);

    let toggled = board
        .toggle_task(late.id)
        .await
        .expect("toggle")
        .expect("task exists");
    assert!(toggled.completed);
    assert!(texts(&board).is_empty());
    assert_eq!(board.counts().overdue, 0);
}

#[tokio::test]
async fn filters_and_sort_compose_over_the_snapshot() {
    let mut board = empty_board().await;
    let clock_step = Duration::minutes(5);

    board.add_task("low", None, Some("low")).await.expect("add");
    board.store().clock().advance(clock_step);
    let medium = board.add_task("medium", None, None).await.expect("add");
    board.store().clock().advance(clock_step);
    board.add_task("high", None, Some("HIGH")).await.expect("add");

    assert_eq!(texts(&board), vec!["high", "medium", "low"]);

    board.set_sort(SortKey::DateAsc);
    assert_eq!(texts(&board), vec!["low", "medium", "high"]);

    board.set_sort(SortKey::Priority);
    assert_eq!(texts(&board), vec!["high", "medium", "low"]);

    board.toggle_task(medium.id).await.expect("toggle");
    board.set_status_filter(StatusFilter::Active);
    assert_eq!(texts(&board), vec!["high", "low"]);

    board.set_status_filter(StatusFilter::Completed);
    assert_eq!(texts(&board), vec!["medium"]);

    // Undated tasks never pass a date filter.
    board.set_query(ViewQuery {
        status: StatusFilter::All,
        due: DateFilter::Week,
        sort: SortKey::DateDesc,
    });
    assert!(texts(&board).is_empty());

    assert_eq!(
        board.counts(),
        BoardCounts {
            total: 3,
            active: 2,
            completed: 1,
            overdue: 0,
        }
    );
}

#[tokio::test]
async fn delete_confirmation_targets_the_last_request() {
    let mut board = empty_board().await;
    let first = board.add_task("first", None, None).await.expect("add");
    let second = board.add_task("second", None, None).await.expect("add");

    assert!(board.request_delete(first.id));
    assert!(board.request_delete(second.id));
    assert_eq!(
        board.pending_delete().map(|task| task.id),
        Some(second.id)
    );

    let deleted = board.confirm_delete().await.expect("confirm");
    assert_eq!(deleted, Some(second.id));
    assert!(board.pending_delete().is_none());
    assert_eq!(texts(&board), vec!["first"]);

    assert!(board.request_delete(first.id));
    assert_eq!(board.cancel_delete().map(|task| task.id), Some(first.id));
    assert_eq!(board.confirm_delete().await.expect("idle confirm"), None);
    assert_eq!(board.tasks().len(), 1);
}

#[tokio::test]
async fn unknown_ids_are_no_ops() {
    let mut board = empty_board().await;
    board.add_task("only", None, None).await.expect("add");
    let stranger = uuid::Uuid::new_v4();

    assert!(!board.request_delete(stranger));
    assert!(board.pending_delete().is_none());
    assert_eq!(board.toggle_task(stranger).await.expect("toggle"), None);
    assert_eq!(board.tasks().len(), 1);
}

#[tokio::test]
async fn theme_toggle_round_trips_through_the_store() {
    let mut board = empty_board().await;
    assert_eq!(board.theme(), Theme::Light);
    assert!(!board.dark_mode());

    assert_eq!(board.toggle_theme().await.expect("toggle"), Theme::Dark);
    assert_eq!(board.set_theme(Theme::Dark).await.expect("set"), Theme::Dark);
    assert_eq!(board.toggle_theme().await.expect("toggle"), Theme::Light);

    let mut store = board.into_store();
    assert!(!store.get_theme_preference().await.expect("get"));
}

#[tokio::test]
async fn blank_text_changes_nothing() {
    let mut board = empty_board().await;
    let err = board
        .add_task("   ", Some("tomorrow"), Some("high"))
        .await
        .expect_err("blank text");
    assert!(!err.is_storage());
    assert!(board.tasks().is_empty());
}
