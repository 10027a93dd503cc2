// Each test file is compiled as a separate crate, so not every helper is used everywhere.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use data_api::dialect::SqliteDriver;
use data_api::model::Access;
use data_api::sql::{SqlValue, Statement};
use data_api::trail::MemorySink;
use data_api::{
    app, AppState, Driver, ListFilter, MemoryAuditStore, ModelConfig, RegistryBuilder,
    RoleAccess, SchemaRegistry, Settings, Trail, User,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const FORWARDED_FOR: &str = "203.0.113.7";

/// Portable DDL and rows: same statements on SQLite, PostgreSQL and MySQL.
pub const FIXTURE: &[&str] = &[
    "DROP TABLE IF EXISTS book_tag",
    "DROP TABLE IF EXISTS book",
    "DROP TABLE IF EXISTS author",
    "DROP TABLE IF EXISTS tag",
    "CREATE TABLE author (id INTEGER PRIMARY KEY, name VARCHAR(100) NOT NULL, email VARCHAR(100))",
    "CREATE TABLE book (id INTEGER PRIMARY KEY, title VARCHAR(200) NOT NULL, author_id INTEGER, \
     tenant_id INTEGER NOT NULL, price DOUBLE PRECISION, in_print BOOLEAN NOT NULL)",
    "CREATE TABLE tag (id INTEGER PRIMARY KEY, label VARCHAR(50) NOT NULL)",
    "CREATE TABLE book_tag (book_id INTEGER NOT NULL, tag_id INTEGER NOT NULL)",
    "INSERT INTO author (id, name, email) VALUES (1, 'Frank Herbert', 'frank@example.com'), \
     (2, 'Ursula K. Le Guin', 'ursula@example.com'), (3, 'Iain Banks', NULL)",
    "INSERT INTO book (id, title, author_id, tenant_id, price, in_print) VALUES \
     (1, 'Dune', 1, 5, 9.99, TRUE), (2, 'Dune Messiah', 1, 5, 8.5, TRUE), \
     (3, 'The Dispossessed', 2, 5, 7.25, FALSE), (4, 'A Wizard of Earthsea', 2, 7, 6.0, TRUE), \
     (5, 'Consider Phlebas', 3, 5, 10.0, TRUE), (6, 'Dune', 1, 7, 9.99, TRUE)",
    "INSERT INTO tag (id, label) VALUES (1, 'scifi'), (2, 'fantasy'), (3, 'classic')",
    "INSERT INTO book_tag (book_id, tag_id) VALUES (1, 1), (1, 3), (2, 1), (3, 1), (4, 2), (5, 1)",
];

pub async fn seed(driver: &dyn Driver) {
    for sql in FIXTURE {
        driver
            .run(&Statement {
                sql: sql.to_string(),
                args: vec![],
            })
            .await
            .unwrap_or_else(|e| panic!("fixture failed: {sql}: {e}"));
    }
}

pub fn model_configs() -> Vec<ModelConfig> {
    serde_json::from_value(json!([
        {"name": "Author", "sensitive_fields": ["email"], "fields": [
            {"name": "id", "type": "int", "nullable": false},
            {"name": "name"},
            {"name": "email"},
            {"name": "books", "relation": {"kind": "one_to_many", "target": "Book", "foreign_key": "authorId"}}
        ]},
        {"name": "Book", "fields": [
            {"name": "id", "type": "int", "nullable": false},
            {"name": "title"},
            {"name": "authorId", "type": "int"},
            {"name": "tenantId", "type": "int"},
            {"name": "price", "type": "float"},
            {"name": "inPrint", "type": "bool"},
            {"name": "author", "relation": {"kind": "one_to_one", "target": "Author", "foreign_key": "authorId"}},
            {"name": "tags", "relation": {"kind": "many_to_many", "target": "Tag"}}
        ]},
        {"name": "Tag", "fields": [{"name": "id", "type": "int"}, {"name": "label"}]},
        {"name": "Ghost", "fields": [{"name": "id", "type": "int"}]}
    ]))
    .expect("fixture models")
}

/// Book rows are scoped to the user's tenant; Author and Ghost are public; Tag goes through roles
/// and is disabled while the `x-maintenance` header is present.
pub fn registry() -> SchemaRegistry {
    RegistryBuilder::new()
        .register_all(model_configs())
        .configure("Book", |r| {
            r.list_modifier(|_, user| match user.and_then(|u| u.tenant_id) {
                Some(t) => ListFilter::new("tenant_id = ?", vec![SqlValue::Int(t)]),
                None => ListFilter::new("1 = 0", vec![]),
            })
        })
        .and_then(|b| b.configure("Author", |r| r.public_read(|_| true)))
        .and_then(|b| b.configure("Ghost", |r| r.public_read(|_| true)))
        .and_then(|b| b.configure("Tag", |r| r.disabled_read(|ctx| ctx.headers.contains_key("x-maintenance"))))
        .and_then(|b| b.build())
        .expect("fixture registry")
}

pub fn roles() -> Arc<RoleAccess> {
    let roles = RoleAccess::new();
    roles.grant_group("readers", "Book", Access { read: true, write: false });
    roles.grant_group("readers", "Tag", Access { read: true, write: false });
    Arc::new(roles)
}

pub fn alice() -> User {
    User {
        id: 1,
        username: "alice".into(),
        tenant_id: Some(5),
        admin: false,
        groups: vec!["readers".into()],
    }
}

pub fn bob() -> User {
    User {
        id: 2,
        username: "bob".into(),
        tenant_id: Some(7),
        admin: false,
        groups: vec![],
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub audit: Arc<MemoryAuditStore>,
    pub trail: Arc<MemorySink>,
}

impl TestApp {
    pub async fn with_driver(driver: Arc<dyn Driver>) -> TestApp {
        seed(driver.as_ref()).await;
        let audit = Arc::new(MemoryAuditStore::new());
        let trail = Arc::new(MemorySink::new());
        let settings = Settings {
            debug_db: true,
            ..Settings::default()
        };
        let state = AppState::new(
            driver,
            registry(),
            roles(),
            audit.clone(),
            settings,
            Trail::new(data_api::Level::Debug, trail.clone()),
        );
        TestApp {
            app: app(state.clone()),
            state,
            audit,
            trail,
        }
    }

    pub async fn sqlite() -> TestApp {
        let driver = SqliteDriver::connect("sqlite::memory:", 1).await.expect("sqlite in memory");
        Self::with_driver(Arc::new(driver)).await
    }

    pub async fn get(&self, uri: &str, user: Option<User>) -> (StatusCode, Value) {
        self.get_with(uri, user, &[]).await
    }

    pub async fn get_with(&self, uri: &str, user: Option<User>, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri).header("X-Forwarded-For", FORWARDED_FOR);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let mut req = builder.body(Body::empty()).expect("request");
        if let Some(user) = user {
            req.extensions_mut().insert(user);
        }
        let res = self.app.clone().oneshot(req).await.expect("response");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub fn sql_lines(&self) -> Vec<String> {
        self.trail
            .lines()
            .into_iter()
            .filter(|(_, m)| m.starts_with("SQL: "))
            .map(|(_, m)| m)
            .collect()
    }
}

/// Ids of a list result, in order.
pub fn ids(body: &Value) -> Vec<i64> {
    body["result"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["id"].as_i64()).collect())
        .unwrap_or_default()
}
