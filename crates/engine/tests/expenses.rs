use chrono::NaiveDate;
use sea_orm::Database;

use engine::{Engine, ExpenseField, ExpenseFilter, LedgerError, Money, Role, Session};
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
    engine.add_payment_method(admin, "cash").await.unwrap();
}

#[tokio::test]
async fn login_rejects_bad_credentials_uniformly() {
    let (engine, _admin) = engine_with_admin().await;

    let unknown = engine.login("nobody", "password").await.unwrap_err();
    let wrong = engine.login("admin", "wrong").await.unwrap_err();

    assert_eq!(
        unknown,
        LedgerError::Forbidden("invalid credentials".to_string())
    );
    assert_eq!(unknown, wrong);
}

#[tokio::test]
async fn add_user_requires_admin() {
    let (engine, admin) = engine_with_admin().await;
    let alice = new_user(&engine, &admin, "alice").await;

    let err = engine
        .add_user(&alice, "bob", "password", Role::User)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
}

#[tokio::test]
async fn taxonomy_lookup_is_case_insensitive() {
    let (engine, admin) = engine_with_admin().await;
    engine.add_category(&admin, "Food").await.unwrap();
    engine.add_payment_method(&admin, "cash").await.unwrap();

    // Lookup under a different casing resolves to the same category.
    engine
        .add_expense(
            &admin,
            Money::new(1250),
            "food",
            "Cash",
            date("2026-03-01"),
            Some("groceries"),
            &[],
        )
        .await
        .unwrap();

    let err = engine.add_category(&admin, "food").await.unwrap_err();
    assert_eq!(err, LedgerError::Duplicate("food".to_string()));
}

#[tokio::test]
async fn ownership_gate_blocks_non_owner() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;
    let bob = new_user(&engine, &admin, "bob").await;

    let id = engine
        .add_expense(
            &alice,
            Money::new(500),
            "food",
            "cash",
            date("2026-03-02"),
            Some("lunch"),
            &["work".to_string()],
        )
        .await
        .unwrap();

    let before = engine.list_expenses(&alice, &[]).await.unwrap();

    let update = engine
        .update_expense(&bob, id, ExpenseField::Amount, "9.99")
        .await
        .unwrap_err();
    let delete = engine.delete_expense(&bob, id).await.unwrap_err();
    assert!(matches!(update, LedgerError::Forbidden(_)));
    assert!(matches!(delete, LedgerError::Forbidden(_)));

    let after = engine.list_expenses(&alice, &[]).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn listing_is_idempotent() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;

    for (amount, day) in [(1000, "2026-01-01"), (2000, "2026-01-02"), (1500, "2026-01-03")] {
        engine
            .add_expense(
                &alice,
                Money::new(amount),
                "food",
                "cash",
                date(day),
                None,
                &[],
            )
            .await
            .unwrap();
    }

    let first = engine.list_expenses(&alice, &[]).await.unwrap();
    let second = engine.list_expenses(&alice, &[]).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn update_expense_replaces_tag_set() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;

    let id = engine
        .add_expense(
            &admin,
            Money::new(800),
            "food",
            "cash",
            date("2026-04-01"),
            None,
            &["old".to_string(), "shared".to_string()],
        )
        .await
        .unwrap();

    engine
        .update_expense(&admin, id, ExpenseField::Tags, "shared,new")
        .await
        .unwrap();

    let rows = engine.list_expenses(&admin, &[]).await.unwrap();
    assert_eq!(rows[0].tags, vec!["new".to_string(), "shared".to_string()]);
}

#[tokio::test]
async fn update_expense_rejects_unknown_category() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;

    let id = engine
        .add_expense(
            &admin,
            Money::new(800),
            "food",
            "cash",
            date("2026-04-01"),
            None,
            &[],
        )
        .await
        .unwrap();

    let err = engine
        .update_expense(&admin, id, ExpenseField::Category, "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn add_expense_rejects_non_positive_amount() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;

    let err = engine
        .add_expense(
            &admin,
            Money::new(0),
            "food",
            "cash",
            date("2026-04-01"),
            None,
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn filters_combine_conjunctively() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    engine.add_category(&admin, "travel").await.unwrap();

    engine
        .add_expense(
            &admin,
            Money::new(3000),
            "food",
            "cash",
            date("2026-05-01"),
            None,
            &["trip".to_string()],
        )
        .await
        .unwrap();
    engine
        .add_expense(
            &admin,
            Money::new(7000),
            "travel",
            "cash",
            date("2026-05-01"),
            None,
            &["trip".to_string()],
        )
        .await
        .unwrap();

    let rows = engine
        .list_expenses(
            &admin,
            &[
                ExpenseFilter::Tag("trip".to_string()),
                ExpenseFilter::MinAmount(Money::new(5000)),
            ],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category, "travel");
}

#[tokio::test]
async fn unknown_tag_filter_matches_nothing() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    engine
        .add_expense(
            &admin,
            Money::new(100),
            "food",
            "cash",
            date("2026-05-01"),
            None,
            &[],
        )
        .await
        .unwrap();

    let rows = engine
        .list_expenses(&admin, &[ExpenseFilter::Tag("ghost".to_string())])
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn delete_tag_prunes_associations() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;

    engine
        .add_expense(
            &admin,
            Money::new(100),
            "food",
            "cash",
            date("2026-05-01"),
            None,
            &["seasonal".to_string(), "keep".to_string()],
        )
        .await
        .unwrap();

    engine.delete_tag(&admin, "seasonal").await.unwrap();

    let rows = engine.list_expenses(&admin, &[]).await.unwrap();
    assert_eq!(rows[0].tags, vec!["keep".to_string()]);
    assert!(!engine
        .list_tags(&admin)
        .await
        .unwrap()
        .contains(&"seasonal".to_string()));
}

#[tokio::test]
async fn delete_user_removes_personal_ledger() {
    let (engine, admin) = engine_with_admin().await;
    seed_taxonomy(&engine, &admin).await;
    let alice = new_user(&engine, &admin, "alice").await;

    engine
        .add_expense(
            &alice,
            Money::new(100),
            "food",
            "cash",
            date("2026-05-01"),
            None,
            &["tagged".to_string()],
        )
        .await
        .unwrap();

    engine.delete_user(&admin, "alice").await.unwrap();

    let users = engine.list_users(&admin).await.unwrap();
    assert!(!users.iter().any(|(name, _)| name == "alice"));
    let err = engine.login("alice", "password").await.unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
}
