use chrono::NaiveDate;
use sea_orm::{Database, DatabaseConnection, EntityTrait};

use engine::{Engine, LedgerError, Money, Role, Session};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection, Session) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build();
    let admin = engine.login("admin", "admin").await.unwrap();
    (engine, db, admin)
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

/// alice creates "trip" with bob and carol as members, taxonomy seeded.
async fn trip_group(engine: &Engine, admin: &Session) -> (Session, Session, Session) {
    seed_taxonomy(engine, admin).await;
    let alice = new_user(engine, admin, "alice").await;
    let bob = new_user(engine, admin, "bob").await;
    let carol = new_user(engine, admin, "carol").await;
    engine
        .create_group(&alice, "trip", Some("summer trip"))
        .await
        .unwrap();
    engine
        .add_user_to_group(&alice, "bob", "trip")
        .await
        .unwrap();
    engine
        .add_user_to_group(&alice, "carol", "trip")
        .await
        .unwrap();
    (alice, bob, carol)
}

#[tokio::test]
async fn equal_split_reconciles_with_remainder_on_first_named() {
    let (engine, _db, admin) = engine_with_db().await;
    let (alice, _bob, _carol) = trip_group(&engine, &admin).await;

    // 100.00 over three participants: 33.34 + 33.33 + 33.33.
    engine
        .add_group_expense(
            &alice,
            Money::new(10_000),
            "trip",
            "food",
            "cash",
            date("2026-06-01"),
            Some("dinner"),
            &[],
            &["bob".to_string(), "carol".to_string()],
        )
        .await
        .unwrap();

    let rows = engine.list_group_expenses(&alice, "trip", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    let splits = &rows[0].splits;
    assert_eq!(splits.len(), 3);
    assert_eq!(
        splits.iter().map(|(_, share)| share.minor()).sum::<i64>(),
        10_000
    );
    let bob_share = splits
        .iter()
        .find(|(name, _)| name == "bob")
        .map(|(_, share)| share.minor())
        .unwrap();
    assert_eq!(bob_share, 3_334);
}

#[tokio::test]
async fn membership_closure_rejects_non_member_participant() {
    let (engine, _db, admin) = engine_with_db().await;
    let (alice, _bob, _carol) = trip_group(&engine, &admin).await;
    new_user(&engine, &admin, "dave").await;

    // dave exists globally but is not in "trip".
    let err = engine
        .add_group_expense(
            &alice,
            Money::new(1_000),
            "trip",
            "food",
            "cash",
            date("2026-06-01"),
            None,
            &[],
            &["dave".to_string()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Consistency(_)));

    let rows = engine.list_group_expenses(&alice, "trip", &[]).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn group_expense_needs_two_participants() {
    let (engine, _db, admin) = engine_with_db().await;
    let (alice, _bob, _carol) = trip_group(&engine, &admin).await;

    let err = engine
        .add_group_expense(
            &alice,
            Money::new(1_000),
            "trip",
            "food",
            "cash",
            date("2026-06-01"),
            None,
            &[],
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Consistency(_)));
}

#[tokio::test]
async fn creator_is_always_a_participant() {
    let (engine, _db, admin) = engine_with_db().await;
    let (alice, bob, _carol) = trip_group(&engine, &admin).await;

    // bob names only alice; bob joins the split anyway.
    engine
        .add_group_expense(
            &bob,
            Money::new(2_000),
            "trip",
            "food",
            "cash",
            date("2026-06-02"),
            None,
            &[],
            &["alice".to_string()],
        )
        .await
        .unwrap();

    let rows = engine.list_group_expenses(&alice, "trip", &[]).await.unwrap();
    let mut names: Vec<&str> = rows[0].splits.iter().map(|(n, _)| n.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["alice", "bob"]);
    assert_eq!(rows[0].created_by, "bob");
}

#[tokio::test]
async fn non_member_cannot_touch_group() {
    let (engine, _db, admin) = engine_with_db().await;
    let (_alice, _bob, _carol) = trip_group(&engine, &admin).await;
    let dave = new_user(&engine, &admin, "dave").await;

    let expense = engine
        .add_group_expense(
            &dave,
            Money::new(1_000),
            "trip",
            "food",
            "cash",
            date("2026-06-01"),
            None,
            &[],
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(expense, LedgerError::Forbidden(_)));

    let listing = engine.list_group_expenses(&dave, "trip", &[]).await.unwrap_err();
    assert!(matches!(listing, LedgerError::Forbidden(_)));

    assert!(!engine.check_group_permission(&dave, "trip").await.unwrap());
}

#[tokio::test]
async fn admin_override_flag_gates_admin_access() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    let permissive = Engine::builder().database(db.clone()).build();
    let strict = Engine::builder()
        .database(db.clone())
        .admin_group_override(false)
        .build();

    let admin = permissive.login("admin", "admin").await.unwrap();
    let alice = new_user(&permissive, &admin, "alice").await;
    permissive
        .create_group(&alice, "trip", None)
        .await
        .unwrap();

    assert!(permissive
        .check_group_permission(&admin, "trip")
        .await
        .unwrap());
    assert!(!strict.check_group_permission(&admin, "trip").await.unwrap());

    let err = strict
        .list_group_expenses(&admin, "trip", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
}

#[tokio::test]
async fn delete_group_cascades_to_expenses_and_splits() {
    let (engine, db, admin) = engine_with_db().await;
    let (alice, _bob, _carol) = trip_group(&engine, &admin).await;

    engine
        .add_group_expense(
            &alice,
            Money::new(3_000),
            "trip",
            "food",
            "cash",
            date("2026-06-03"),
            None,
            &["holiday".to_string()],
            &["bob".to_string()],
        )
        .await
        .unwrap();

    engine.delete_group(&alice, "trip").await.unwrap();

    assert!(engine::groups::Entity::find().all(&db).await.unwrap().is_empty());
    assert!(engine::group_expenses::Entity::find()
        .all(&db)
        .await
        .unwrap()
        .is_empty());
    assert!(engine::group_expense_tags::Entity::find()
        .all(&db)
        .await
        .unwrap()
        .is_empty());
    assert!(engine::split_shares::Entity::find()
        .all(&db)
        .await
        .unwrap()
        .is_empty());
    assert!(engine::group_memberships::Entity::find()
        .all(&db)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn empty_group_accepts_first_joiner_without_membership() {
    let (engine, _db, admin) = engine_with_db().await;
    let bob = new_user(&engine, &admin, "bob").await;
    let carol = new_user(&engine, &admin, "carol").await;
    let temp = new_user(&engine, &admin, "temp").await;

    engine.create_group(&temp, "club", None).await.unwrap();
    // Deleting the only member leaves the group empty.
    engine.delete_user(&admin, "temp").await.unwrap();

    // bob is not a member, yet the empty group accepts the bootstrap join.
    engine.add_user_to_group(&bob, "bob", "club").await.unwrap();

    // With a member present the usual gate applies again.
    let err = engine
        .add_user_to_group(&carol, "carol", "club")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
}

#[tokio::test]
async fn duplicate_group_name_is_rejected() {
    let (engine, _db, admin) = engine_with_db().await;
    let alice = new_user(&engine, &admin, "alice").await;

    engine.create_group(&alice, "trip", None).await.unwrap();
    let err = engine.create_group(&alice, "trip", None).await.unwrap_err();
    assert_eq!(err, LedgerError::Duplicate("trip".to_string()));
}

#[tokio::test]
async fn delete_user_refused_while_split_shares_reference_them() {
    let (engine, _db, admin) = engine_with_db().await;
    let (alice, _bob, _carol) = trip_group(&engine, &admin).await;

    engine
        .add_group_expense(
            &alice,
            Money::new(1_000),
            "trip",
            "food",
            "cash",
            date("2026-06-04"),
            None,
            &[],
            &["bob".to_string()],
        )
        .await
        .unwrap();

    let err = engine.delete_user(&admin, "bob").await.unwrap_err();
    assert!(matches!(err, LedgerError::Consistency(_)));

    // bob is still there and can log in.
    engine.login("bob", "password").await.unwrap();
}
