//! End-to-end reads through the router against an in-memory SQLite database.

mod common;

use axum::http::StatusCode;
use common::{alice, bob, ids, TestApp, FORWARDED_FOR};
use data_api::audit::AuditAction;
use data_api::Level;
use serde_json::{json, Value};

#[tokio::test]
async fn list_without_filters_returns_scoped_rows_in_table_order() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Book", Some(alice())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(ids(&body), vec![1, 2, 3, 5]);
    assert_eq!(
        body["result"][0],
        json!({"id": 1, "title": "Dune", "authorId": 1, "tenantId": 5, "price": 9.99, "inPrint": true})
    );
}

#[tokio::test]
async fn model_name_is_case_insensitive() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/book", Some(alice())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body).len(), 4);
}

#[tokio::test]
async fn pagination_returns_at_most_limit_rows() {
    let t = TestApp::sqlite().await;
    let (_, body) = t.get("/Book?$limit=10&$offset=0", Some(alice())).await;
    assert_eq!(ids(&body), vec![1, 2, 3, 5]);

    let (_, body) = t.get("/Book?$order=id&$limit=2&$offset=1", Some(alice())).await;
    assert_eq!(ids(&body), vec![2, 3]);

    let (_, body) = t.get("/Book?$order=id&$offset=3", Some(alice())).await;
    assert_eq!(ids(&body), vec![5]);
}

#[tokio::test]
async fn tenant_scope_is_appended_to_user_filters() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Book?title=Dune", Some(alice())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1]);

    let sql = t.sql_lines();
    assert!(
        sql.contains(&"SQL: SELECT * FROM book WHERE title = ? AND tenant_id = ?\nARGS: [\"Dune\",5]".to_string()),
        "{sql:?}"
    );
}

#[tokio::test]
async fn filter_operators() {
    let t = TestApp::sqlite().await;
    let cases: &[(&str, Vec<i64>)] = &[
        ("/Book?title__icontains=DUNE&$order=id", vec![1, 2]),
        ("/Book?title__startswith=The", vec![3]),
        ("/Book?price__gte=9&$order=id", vec![1, 5]),
        ("/Book?inPrint=0", vec![3]),
        ("/Book?id__in=1,3,4&$order=-id", vec![3, 1]),
        ("/Book?id__between=2,3&$order=id", vec![2, 3]),
        ("/Book?authorId__isnull=1", vec![]),
        ("/Book?author.name=Iain%20Banks", vec![5]),
    ];
    for (uri, expected) in cases {
        let (status, body) = t.get(uri, Some(alice())).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {body}");
        assert_eq!(&ids(&body), expected, "{uri}");
    }
}

#[tokio::test]
async fn like_wildcards_in_values_are_literal() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Book?title__contains=%25", Some(alice())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), Vec::<i64>::new());
}

#[tokio::test]
async fn custom_projection_returns_columns_as_named() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Book?$f=title,author.name&$order=id&$limit=2", Some(alice())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["result"],
        json!([
            {"title": "Dune", "author__name": "Frank Herbert"},
            {"title": "Dune Messiah", "author__name": "Frank Herbert"}
        ])
    );
}

#[tokio::test]
async fn aggregates_with_group_by() {
    let t = TestApp::sqlite().await;
    let (status, body) = t
        .get("/Book?$f=authorId,count__id&$groupby=authorId&$order=authorId", Some(alice()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["result"],
        json!([
            {"author_id": 1, "count__id": 2},
            {"author_id": 2, "count__id": 1},
            {"author_id": 3, "count__id": 1}
        ])
    );
}

#[tokio::test]
async fn distinct_projection() {
    let t = TestApp::sqlite().await;
    let (_, body) = t.get("/Book?$f=authorId&$distinct=1&$order=authorId", Some(alice())).await;
    assert_eq!(body["result"], json!([{"author_id": 1}, {"author_id": 2}, {"author_id": 3}]));
}

#[tokio::test]
async fn sensitive_fields_are_hidden_and_not_selectable() {
    let t = TestApp::sqlite().await;
    let (_, body) = t.get("/Author/1", None).await;
    assert_eq!(body["result"], json!({"id": 1, "name": "Frank Herbert"}));

    let (status, body) = t.get("/Author?$f=email", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = t.get("/Book?$f=author.email", Some(alice())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sensitive_fields_cannot_be_filtered_or_ordered_on() {
    let t = TestApp::sqlite().await;
    for (uri, user) in [
        ("/Author?email__startswith=frank", None),
        ("/Author?email=frank@example.com", None),
        ("/Author?$order=-email", None),
        ("/Book?author.email__startswith=ursula", Some(alice())),
        ("/Book?$order=author.email", Some(alice())),
    ] {
        let (status, body) = t.get(uri, user).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {body}");
    }
    assert!(t.sql_lines().is_empty());
}

#[tokio::test]
async fn filters_through_to_many_relations_return_each_row_once() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Book?tags.label__in=scifi,classic&$order=id", Some(alice())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ids(&body), vec![1, 2, 3, 5]);

    let (_, body) = t.get("/Book?tags.label=classic", Some(alice())).await;
    assert_eq!(ids(&body), vec![1]);

    let (status, body) = t.get("/Author?books.title__startswith=Dune&$order=id", None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ids(&body), vec![1]);

    let (_, body) = t.get("/Author?books.inPrint=1&$order=-id", None).await;
    assert_eq!(ids(&body), vec![3, 2, 1]);

    t.state.audit.flush().await;
    let first: Value = serde_json::from_str(&t.audit.entries()[0].activity).expect("activity json");
    assert_eq!(first["rows_count"], 4);
}

#[tokio::test]
async fn model_rows_cannot_be_grouped_or_ordered_through_to_many() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Book?$groupby=authorId", Some(alice())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = t.get("/Author?$order=books.title", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn undecodable_query_is_rejected() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Book?title=%FF", Some(alice())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(t.sql_lines().is_empty());
}

#[tokio::test]
async fn single_fetch_of_missing_or_unparsable_id_is_null() {
    let t = TestApp::sqlite().await;
    for uri in ["/Book/999", "/Book/abc", "/Book/4"] {
        let (status, body) = t.get(uri, Some(alice())).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, json!({"status": "ok", "result": null}), "{uri}");
    }
}

#[tokio::test]
async fn single_fetch_with_preload() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Book/1?$preload=1", Some(alice())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["title"], "Dune");
    assert_eq!(body["result"]["author"], json!({"id": 1, "name": "Frank Herbert"}));
    assert!(body["result"].get("tags").is_none());
}

#[tokio::test]
async fn one_to_many_preload_applies_target_scope() {
    let t = TestApp::sqlite().await;
    let (_, body) = t.get("/Author/1?$preload=1", Some(alice())).await;
    let books: Vec<i64> = body["result"]["books"]
        .as_array()
        .expect("books array")
        .iter()
        .filter_map(|b| b["id"].as_i64())
        .collect();
    assert_eq!(books, vec![1, 2]);
}

#[tokio::test]
async fn list_preload_uses_one_query_per_relation() {
    let t = TestApp::sqlite().await;
    let (_, body) = t.get("/Book?$preload=1", Some(alice())).await;
    let authors: Vec<Value> = body["result"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|b| b["author"]["name"].clone())
        .collect();
    assert_eq!(
        authors,
        vec![json!("Frank Herbert"), json!("Frank Herbert"), json!("Ursula K. Le Guin"), json!("Iain Banks")]
    );
    let author_queries = t.sql_lines().iter().filter(|s| s.contains("FROM author")).count();
    assert_eq!(author_queries, 1);
}

#[tokio::test]
async fn many_to_many_ids_and_fill() {
    let t = TestApp::sqlite().await;
    let (_, body) = t.get("/Book/1?$m2m=1", Some(alice())).await;
    assert_eq!(body["result"]["tags"], json!([1, 3]));

    let (_, body) = t.get("/Book/1?$m2m=fill", Some(alice())).await;
    assert_eq!(
        body["result"]["tags"],
        json!([{"id": 1, "label": "scifi"}, {"id": 3, "label": "classic"}])
    );

    let (_, body) = t.get("/Book?$m2m=1&$order=id", Some(alice())).await;
    let tags: Vec<Value> = body["result"].as_array().expect("rows").iter().map(|b| b["tags"].clone()).collect();
    assert_eq!(tags, vec![json!([1, 3]), json!([1]), json!([1]), json!([1])]);
}

#[tokio::test]
async fn permission_denied_without_user_or_role() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Book", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"status": "error", "err_msg": "Permission denied"}));

    let (status, _) = t.get("/Book/1", Some(bob())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t.get("/Author", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn disable_hook_overrides_roles() {
    let t = TestApp::sqlite().await;
    let (status, _) = t.get("/Tag", Some(alice())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.get_with("/Tag", Some(alice()), &[("x-maintenance", "1")]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_paths_and_unknown_models_are_not_found() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Book/1/extra", Some(alice())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": "error", "err_msg": "invalid format (/Book/1/extra)"}));

    let (status, body) = t.get("/Nope", Some(alice())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn bad_parameters_are_rejected_before_sql() {
    let t = TestApp::sqlite().await;
    for uri in [
        "/Book?id%3B%20DROP%20TABLE%20x=1",
        "/Book?nope=1",
        "/Book?id=abc",
        "/Book?$limit=-1",
        "/Book?$bogus=1",
        "/Book?price__contains=1",
        "/Book?$order=title,",
    ] {
        let (status, body) = t.get(uri, Some(alice())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {body}");
        assert_eq!(body["status"], "error");
    }
    assert!(t.sql_lines().is_empty());
    t.state.audit.flush().await;
    assert!(t.audit.entries().is_empty());
}

#[tokio::test]
async fn execution_failure_is_reported_and_trailed() {
    let t = TestApp::sqlite().await;
    let (status, body) = t.get("/Ghost", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["err_msg"].as_str().is_some_and(|m| m.starts_with("Unable to execute SQL.")),
        "{body}"
    );
    let errors: Vec<String> = t
        .trail
        .lines()
        .into_iter()
        .filter(|(level, _)| *level == Level::Error)
        .map(|(_, m)| m)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("SQL: SELECT * FROM ghost"), "{}", errors[0]);
}

#[tokio::test]
async fn reads_are_audited_with_params_count_and_address() {
    let t = TestApp::sqlite().await;
    t.get("/Book?title=Dune", Some(alice())).await;
    t.get("/Book/2", Some(alice())).await;
    t.get("/Book/abc", Some(alice())).await;
    t.state.audit.flush().await;

    let entries = t.audit.entries();
    assert_eq!(entries.len(), 3);
    for e in &entries {
        assert_eq!(e.username, "alice");
        assert_eq!(e.action, AuditAction::Read);
        assert_eq!(e.table_name, "book");
    }

    let list: Value = serde_json::from_str(&entries[0].activity).expect("activity json");
    assert_eq!(entries[0].table_id, 0);
    assert_eq!(list, json!({"params": {"title": "Dune"}, "rows_count": 1, "_IP": FORWARDED_FOR}));

    let one: Value = serde_json::from_str(&entries[1].activity).expect("activity json");
    assert_eq!(entries[1].table_id, 2);
    assert_eq!(one["params"], json!({"id": "2"}));
    assert_eq!(one["rows_count"], 1);

    let missing: Value = serde_json::from_str(&entries[2].activity).expect("activity json");
    assert_eq!(entries[2].table_id, 0);
    assert_eq!(missing["params"], json!({"id": "abc"}));
    assert_eq!(missing["rows_count"], 0);
}

#[tokio::test]
async fn denied_reads_are_not_audited() {
    let t = TestApp::sqlite().await;
    t.get("/Book", None).await;
    t.get("/Book", Some(bob())).await;
    t.state.audit.flush().await;
    assert!(t.audit.entries().is_empty());
}

#[tokio::test]
async fn ready_and_info_report_the_engine() {
    let t = TestApp::sqlite().await;
    let (status, _) = t.get("/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = t.get("/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dialect"], "sqlite");
}
