//! PostgreSQL order store integration tests using testcontainers.
//!
//! Run with: cargo test --test storage_postgres -- --nocapture
//!
//! Each test starts PostgreSQL in a container, runs the migrations and
//! drives `PgOrderStore` through `OrderWorkflow`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    GenericImage, ImageExt,
};

use buyv_backend::domain::aggregates::{NewOrder, NewOrderItem, OrderDraft, OrderStatus};
use buyv_backend::publisher::EventPublisher;
use buyv_backend::store::{OrderStore, PgOrderStore};
use buyv_backend::workflow::OrderWorkflow;
use buyv_backend::BuyvError;

async fn start_postgres() -> (testcontainers::ContainerAsync<GenericImage>, String) {
    // The ready line is printed once during init and again when the server is up.
    let image = GenericImage::new("postgres", "16")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stdout("database system is ready to accept connections"));

    let container = image
        .with_env_var("POSTGRES_USER", "buyv")
        .with_env_var("POSTGRES_PASSWORD", "buyv")
        .with_env_var("POSTGRES_DB", "buyv")
        .with_startup_timeout(Duration::from_secs(60))
        .start()
        .await
        .expect("Failed to start postgres container");

    tokio::time::sleep(Duration::from_secs(1)).await;

    let port = container.get_host_port_ipv4(5432).await.expect("Failed to get mapped port");
    let host = container.get_host().await.expect("Failed to get container host");
    (container, format!("postgres://buyv:buyv@{}:{}/buyv", host, port))
}

async fn connect_and_migrate(connection_string: &str) -> PgPool {
    let pool = PgPool::connect(connection_string).await.expect("Failed to connect to PostgreSQL");
    sqlx::migrate!("./migrations").run(&pool).await.expect("Failed to run migrations");
    pool
}

async fn insert_user(pool: &PgPool, uid: &str) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO users (uid, email, username, display_name, password_hash) VALUES ($1, $2, $1, $1, 'unused') RETURNING id")
        .bind(uid).bind(format!("{}@buyv.test", uid.to_lowercase()))
        .fetch_one(pool).await.expect("Failed to insert user");
    id
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool).await.expect("Failed to count rows");
    n
}

fn promoted(cents: i64, qty: i32, promoter: &str) -> NewOrderItem {
    NewOrderItem {
        product_id: format!("P-{}", cents), product_name: "Sneaker".into(), price: Decimal::new(cents, 2),
        quantity: qty, is_promoted_product: true, promoter_id: Some(promoter.into()), ..Default::default()
    }
}

fn plain(cents: i64, qty: i32) -> NewOrderItem {
    NewOrderItem { product_id: "P-plain".into(), price: Decimal::new(cents, 2), quantity: qty, ..Default::default() }
}

struct Fixture {
    _container: testcontainers::ContainerAsync<GenericImage>,
    pool: PgPool,
    store: Arc<PgOrderStore>,
    workflow: OrderWorkflow,
    buyer: i64,
    u1: i64,
    u2: i64,
}

async fn fixture() -> Fixture {
    let (container, connection_string) = start_postgres().await;
    let pool = connect_and_migrate(&connection_string).await;
    let buyer = insert_user(&pool, "BUYER").await;
    let u1 = insert_user(&pool, "U1").await;
    let u2 = insert_user(&pool, "U2").await;
    let store = Arc::new(PgOrderStore::new(pool.clone()));
    let workflow = OrderWorkflow::new(store.clone(), EventPublisher::disabled());
    Fixture { _container: container, pool, store, workflow, buyer, u1, u2 }
}

#[tokio::test]
async fn test_postgres_order_creation_derives_commissions() {
    let f = fixture().await;
    let wf = &f.workflow;

    let order = NewOrder { items: vec![promoted(1000, 2, "U1")], total: Decimal::new(2000, 2), ..Default::default() };
    let placed = wf.place(f.buyer, order).await.unwrap();
    assert_eq!(placed.order.total, Decimal::new(2000, 2));
    assert_eq!(placed.commissions.len(), 1);
    assert_eq!(placed.commissions[0].commission_amount, Decimal::new(20, 2));
    assert_eq!(placed.commissions[0].status, "pending");
    assert_eq!(placed.commissions[0].user_id, Some(f.u1));

    let order = NewOrder {
        items: vec![promoted(1999, 3, "U1"), promoted(550, 1, "U2"), plain(300, 4), promoted(1234, 2, "ghost")],
        ..Default::default()
    };
    let placed = wf.place(f.buyer, order).await.unwrap();
    assert_eq!(placed.items.len(), 4);
    assert_eq!(placed.commissions.len(), 3);
    for c in &placed.commissions {
        let item = placed.items.iter().find(|i| i.id == c.order_item_id).unwrap();
        let expected = (item.price * Decimal::from(item.quantity) * Decimal::new(1, 2)).round_dp(2);
        assert_eq!(c.commission_amount, expected);
    }
    let orphan = placed.commissions.iter().find(|c| c.user_uid == "ghost").unwrap();
    assert_eq!(orphan.user_id, None);

    let mut sub_cent = promoted(0, 100, "U2");
    sub_cent.price = Decimal::new(1005, 3);
    let placed = wf.place(f.buyer, NewOrder { items: vec![sub_cent], ..Default::default() }).await.unwrap();
    let stored = wf.get(f.buyer, placed.order.id).await.unwrap();
    let expected = (stored.items[0].price * Decimal::from(stored.items[0].quantity) * Decimal::new(1, 2)).round_dp(2);
    assert_eq!(stored.commissions[0].commission_amount, expected);

    let empty = wf.place(f.buyer, NewOrder::default()).await.unwrap();
    assert!(empty.items.is_empty() && empty.commissions.is_empty());

    assert_eq!(wf.promoter_commissions(f.u1, None).await.unwrap().len(), 2);
    assert_eq!(wf.promoter_commissions(f.u2, Some("pending")).await.unwrap().len(), 2);
    assert_eq!(count(&f.pool, "commissions").await, 5);
}

#[tokio::test]
async fn test_postgres_status_cascade() {
    let f = fixture().await;
    let wf = &f.workflow;

    let placed = wf.place(f.buyer, NewOrder { items: vec![promoted(1000, 2, "U1")], ..Default::default() }).await.unwrap();
    let shipped = wf.change_status(f.buyer, placed.order.id, "shipped").await.unwrap();
    assert_eq!(shipped.commissions[0].status, "pending");

    let first = wf.change_status(f.buyer, placed.order.id, "delivered").await.unwrap();
    assert_eq!(first.order.status, "delivered");
    assert_eq!(first.commissions[0].status, "paid");
    assert!(first.commissions[0].paid_at.is_some());
    let second = wf.change_status(f.buyer, placed.order.id, "delivered").await.unwrap();
    assert_eq!(second.commissions.len(), 1);
    assert_eq!(first.commissions[0].paid_at, second.commissions[0].paid_at);
    assert_eq!(count(&f.pool, "commissions").await, 1);

    let err = wf.change_status(f.buyer, placed.order.id, "pending").await.unwrap_err();
    assert!(matches!(err, BuyvError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Pending }));

    let other = wf.place(f.buyer, NewOrder { items: vec![promoted(1000, 1, "U1"), promoted(500, 1, "U2")], ..Default::default() }).await.unwrap();
    let canceled = wf.cancel(f.buyer, other.order.id).await.unwrap();
    assert_eq!(canceled.order.status, "canceled");
    assert!(canceled.commissions.iter().all(|c| c.status == "canceled" && c.paid_at.is_none()));

    let listed = wf.list(f.buyer, Some("canceled")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].commissions.len(), 2);
    assert_eq!(listed[0].items.len(), 2);
    assert_eq!(wf.list(f.buyer, None).await.unwrap().len(), 2);

    let tracked = wf.update_tracking(f.buyer, other.order.id, "TRK-1").await.unwrap();
    assert_eq!(tracked.tracking_number.as_deref(), Some("TRK-1"));
}

#[tokio::test]
async fn test_postgres_legacy_status_can_be_canceled() {
    let f = fixture().await;
    let wf = &f.workflow;

    let placed = wf.place(f.buyer, NewOrder { items: vec![promoted(1000, 1, "U1")], ..Default::default() }).await.unwrap();
    sqlx::query("UPDATE orders SET status = 'awaiting_pickup' WHERE id = $1")
        .bind(placed.order.id).execute(&f.pool).await.unwrap();

    let canceled = wf.cancel(f.buyer, placed.order.id).await.unwrap();
    assert_eq!(canceled.order.status, "canceled");
    assert_eq!(canceled.commissions[0].status, "canceled");
}

#[tokio::test]
async fn test_postgres_ownership_and_failures() {
    let f = fixture().await;
    let wf = &f.workflow;

    let placed = wf.place(f.buyer, NewOrder { items: vec![plain(100, 1)], ..Default::default() }).await.unwrap();
    assert!(matches!(wf.get(f.u1, placed.order.id).await, Err(BuyvError::NotFound("Order"))));
    assert!(matches!(wf.change_status(f.u1, placed.order.id, "delivered").await, Err(BuyvError::NotFound("Order"))));
    assert!(matches!(wf.update_tracking(f.u1, placed.order.id, "TRK").await, Err(BuyvError::NotFound("Order"))));

    let numbered = || NewOrder { order_number: Some("ORD-1".into()), ..Default::default() };
    wf.place(f.buyer, numbered()).await.unwrap();
    assert!(matches!(wf.place(f.buyer, numbered()).await, Err(BuyvError::Validation(_))));

    let mut huge = plain(0, 1);
    huge.price = Decimal::new(1_000_000_000_000, 0);
    assert!(matches!(wf.place(f.buyer, NewOrder { items: vec![huge], ..Default::default() }).await, Err(BuyvError::Validation(_))));
    assert_eq!(count(&f.pool, "orders").await, 2);

    // The zero-quantity line fails the CHECK constraint after the order and
    // the first line were written; nothing may survive.
    let order = NewOrder { items: vec![promoted(1000, 1, "U1"), plain(100, 0)], ..Default::default() };
    let draft = OrderDraft::prepare(f.buyer, order, Utc::now()).unwrap();
    assert!(f.store.create(draft).await.is_err());
    assert_eq!(count(&f.pool, "orders").await, 2);
    assert_eq!(count(&f.pool, "order_items").await, 1);
    assert_eq!(count(&f.pool, "commissions").await, 0);
}
