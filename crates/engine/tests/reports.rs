use chrono::NaiveDate;
use sea_orm::Database;

use engine::{Engine, LedgerError, Money, Role, Session};
use migration::MigratorTrait;

async fn engine_with_admin() -> (Engine, Session) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build();
    let admin = engine.login("admin", "admin").await.unwrap();
    (engine, admin)
}

async fn new_user(engine: &Engine, admin: &Session, name: &str) -> Session {
    engine
        .add_user(admin, name, "password", Role::User)
        .await
        .unwrap();
    engine.login(name, "password").await.unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn seed_taxonomy(engine: &Engine, admin: &Session) {
    engine.add_category(admin, "food").await.unwrap();
    engine.add_category(admin, "travel").await.unwrap();
    engine.add_payment_method(admin, "cash").await.unwrap();
    engine.add_payment_method(admin, "card").await.unwrap();
}

async fn spend(
    engine: &Engine,
    session: &Session,
    minor: i64,
    category: &str,
    method: &str,
    day: &str,
) {
    engine
        .add_expense(
            session,
            Money::new(minor),
            category,
            method,
            date(day),
            None,
            &[],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn top_n_returns_largest_in_order() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;

    for minor in [1_000, 5_000, 3_000, 9_000, 2_000] {
        spend(&engine, &alice, minor, "food", "cash", "2026-02-10").await;
    }

    let rows = engine
        .top_expenses(&alice, 3, date("2026-02-01"), date("2026-02-28"))
        .await
        .unwrap();
    let amounts: Vec<i64> = rows.iter().map(|r| r.amount.minor()).collect();
    assert_eq!(amounts, vec![9_000, 5_000, 3_000]);
}

#[tokio::test]
async fn top_n_range_is_inclusive_and_validated() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;

    spend(&engine, &admin, 1_000, "food", "cash", "2026-02-01").await;
    spend(&engine, &admin, 2_000, "food", "cash", "2026-02-28").await;
    spend(&engine, &admin, 4_000, "food", "cash", "2026-03-01").await;

    let rows = engine
        .top_expenses(&admin, 10, date("2026-02-01"), date("2026-02-28"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let err = engine
        .top_expenses(&admin, 10, date("2026-02-28"), date("2026-02-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn above_average_is_strict_and_per_category() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;

    // food mean is 20.00; only the 30.00 expense sits strictly above it.
    spend(&engine, &alice, 1_000, "food", "cash", "2026-02-01").await;
    spend(&engine, &alice, 2_000, "food", "cash", "2026-02-02").await;
    spend(&engine, &alice, 3_000, "food", "cash", "2026-02-03").await;

    let rows = engine.above_average_expenses(&alice).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, Money::new(3_000));
}

#[tokio::test]
async fn above_average_mean_spans_all_users() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;
    let bob = new_user(&engine, &admin, "bob").await;

    // Category mean includes bob's large expense, pushing it to 55.00;
    // none of alice's rows clear that bar.
    spend(&engine, &alice, 1_000, "food", "cash", "2026-02-01").await;
    spend(&engine, &bob, 10_000, "food", "cash", "2026-02-01").await;

    let rows = engine.above_average_expenses(&alice).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn category_spending_distinguishes_none_from_zero() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;

    assert_eq!(engine.category_spending(&admin, "food").await.unwrap(), None);

    spend(&engine, &admin, 2_500, "food", "cash", "2026-02-01").await;
    assert_eq!(
        engine.category_spending(&admin, "food").await.unwrap(),
        Some(Money::new(2_500))
    );

    let err = engine
        .category_spending(&admin, "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn frequent_category_reports_all_ties() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;

    for day in ["2026-02-01", "2026-02-02", "2026-02-03"] {
        spend(&engine, &alice, 1_000, "food", "cash", day).await;
        spend(&engine, &alice, 1_000, "travel", "card", day).await;
    }
    spend(&engine, &alice, 1_000, "food", "cash", "2026-02-04").await;
    spend(&engine, &alice, 1_000, "travel", "card", "2026-02-04").await;

    let entries = engine.frequent_categories(&alice).await.unwrap();
    let mut names: Vec<&str> = entries.iter().map(|e| e.category.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["food", "travel"]);
    assert!(entries.iter().all(|e| e.count == 4));
}

#[tokio::test]
async fn monthly_category_spending_groups_by_month() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;

    spend(&engine, &alice, 1_000, "food", "cash", "2026-01-15").await;
    spend(&engine, &alice, 2_000, "food", "cash", "2026-01-20").await;
    spend(&engine, &alice, 5_000, "travel", "card", "2026-02-01").await;

    let entries = engine.monthly_category_spending(&alice).await.unwrap();
    assert_eq!(entries.len(), 2);
    // Months descend, so February leads.
    assert_eq!(entries[0].month, "2026-02");
    assert_eq!(entries[0].category, "travel");
    assert_eq!(entries[0].total, Money::new(5_000));
    assert_eq!(entries[1].month, "2026-01");
    assert_eq!(entries[1].total, Money::new(3_000));
    assert_eq!(entries[1].count, 2);
}

#[tokio::test]
async fn highest_spender_is_admin_only_and_breaks_ties_by_name() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;
    let bob = new_user(&engine, &admin, "bob").await;

    spend(&engine, &alice, 5_000, "food", "cash", "2026-01-10").await;
    spend(&engine, &bob, 5_000, "food", "cash", "2026-01-12").await;
    spend(&engine, &bob, 9_000, "travel", "card", "2026-02-12").await;

    let err = engine.highest_spender_per_month(&alice).await.unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let entries = engine.highest_spender_per_month(&admin).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].month, "2026-02");
    assert_eq!(entries[0].username, "bob");
    // January is a 50.00 tie; alice wins lexicographically.
    assert_eq!(entries[1].month, "2026-01");
    assert_eq!(entries[1].username, "alice");
}

#[tokio::test]
async fn payment_method_usage_sums_and_counts() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;

    spend(&engine, &admin, 1_000, "food", "cash", "2026-02-01").await;
    spend(&engine, &admin, 2_000, "food", "cash", "2026-02-02").await;
    spend(&engine, &admin, 9_000, "travel", "card", "2026-02-03").await;

    let entries = engine.payment_method_usage(&admin).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].payment_method, "card");
    assert_eq!(entries[0].total, Money::new(9_000));
    assert_eq!(entries[1].payment_method, "cash");
    assert_eq!(entries[1].total, Money::new(3_000));
    assert_eq!(entries[1].count, 2);
}

#[tokio::test]
async fn tag_counts_cover_only_the_callers_tags() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;
    let bob = new_user(&engine, &admin, "bob").await;

    engine
        .add_expense(
            &alice,
            Money::new(1_000),
            "food",
            "cash",
            date("2026-02-01"),
            None,
            &["lunch".to_string(), "work".to_string()],
        )
        .await
        .unwrap();
    engine
        .add_expense(
            &bob,
            Money::new(1_000),
            "food",
            "cash",
            date("2026-02-01"),
            None,
            &["other".to_string()],
        )
        .await
        .unwrap();

    let entries = engine.tag_expense_counts(&alice).await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.tag.as_str()).collect();
    assert_eq!(names, vec!["lunch", "work"]);
}

#[tokio::test]
async fn group_reports_respect_membership() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;
    let bob = new_user(&engine, &admin, "bob").await;
    let dave = new_user(&engine, &admin, "dave").await;

    engine.create_group(&alice, "trip", None).await.unwrap();
    engine
        .add_user_to_group(&alice, "bob", "trip")
        .await
        .unwrap();
    engine
        .add_group_expense(
            &alice,
            Money::new(9_000),
            "trip",
            "food",
            "cash",
            date("2026-02-01"),
            None,
            &["holiday".to_string()],
            &["bob".to_string()],
        )
        .await
        .unwrap();

    let err = engine
        .group_member_spending(&dave, "trip")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let spending = engine.group_member_spending(&bob, "trip").await.unwrap();
    assert_eq!(spending.len(), 2);
    assert_eq!(
        spending.iter().map(|m| m.total.minor()).sum::<i64>(),
        9_000
    );

    let total = engine
        .group_category_spending(&bob, "trip", "food")
        .await
        .unwrap();
    assert_eq!(total, Some(Money::new(9_000)));
    assert_eq!(
        engine
            .group_category_spending(&bob, "trip", "travel")
            .await
            .unwrap(),
        None
    );

    let tags = engine.group_tag_usage(&bob, "trip").await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].tag, "holiday");
    assert_eq!(tags[0].count, 1);
}
