mod support;

use sqlx_context_db::driver::ResultSet;
use sqlx_context_db::{
    execute_write, insert, params, select_all, select_int, select_one, select_rows,
    select_scalar, with_connection, with_transaction, Error, Value,
};
use support::{rows, run, Event, Script};

#[tokio::test]
async fn select_one_without_match_is_none() {
    let script = Script::new();
    script.respond(rows(&["id", "name"], vec![]));
    let record = run(script.clone(), select_one("select * from user where id = ?", &params![9]))
        .await
        .unwrap();

    assert!(record.is_none());
    assert_eq!(
        script.statements(),
        [("select * from user where id = %s".to_string(), params![9])]
    );
}

#[tokio::test]
async fn select_one_maps_columns() {
    let script = Script::new();
    script.respond(rows(
        &["id", "name"],
        vec![
            vec![Value::Int(1), Value::from("a")],
            vec![Value::Int(2), Value::from("b")],
        ],
    ));
    let record = run(script.clone(), select_one("select * from user", &[]))
        .await
        .unwrap()
        .expect("one row");

    assert_eq!(record.names(), ["id", "name"]);
    assert_eq!(record["id"], Value::Int(1));
    assert_eq!(record.get_as::<String>("name").unwrap(), "a");
}

#[tokio::test]
async fn select_all_keeps_row_order() {
    let script = Script::new();
    script.respond(rows(
        &["id"],
        vec![vec![Value::Int(3)], vec![Value::Int(1)], vec![Value::Int(2)]],
    ));
    let records = run(script.clone(), select_all("select id from user", &[]))
        .await
        .unwrap();

    let ids: Vec<i64> = records
        .iter()
        .map(|r| r.get_as::<i64>("id").unwrap())
        .collect();
    assert_eq!(ids, [3, 1, 2]);
}

#[tokio::test]
async fn select_all_without_match_is_empty() {
    let script = Script::new();
    script.respond(rows(&["id"], vec![]));
    let records = run(script.clone(), select_all("select id from user", &[]))
        .await
        .unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn select_scalar_rejects_two_columns() {
    let script = Script::new();
    script.respond(rows(&["id", "name"], vec![vec![Value::Int(1), Value::from("a")]]));
    let result = run(script.clone(), select_scalar("select id, name from user", &[])).await;

    assert!(matches!(result, Err(Error::MultipleColumns(2))));
    assert_eq!(script.closes(), 1);
}

#[tokio::test]
async fn select_scalar_tells_no_row_from_null() {
    let script = Script::new();
    script.respond(rows(&["name"], vec![]));
    script.respond(rows(&["name"], vec![vec![Value::Null]]));
    let (missing, null) = run(script.clone(), async {
        let missing = select_scalar("select name from user where id = ?", &params![9]).await?;
        let null = select_scalar("select name from user where id = ?", &params![1]).await?;
        Ok::<_, Error>((missing, null))
    })
    .await
    .unwrap();

    assert_eq!(missing, None);
    assert_eq!(null, Some(Value::Null));
}

#[tokio::test]
async fn select_int_reads_count() {
    let script = Script::new();
    script.respond(rows(&["count(*)"], vec![vec![Value::Int(42)]]));
    let count = run(script.clone(), select_int("select count(*) from user", &[]))
        .await
        .unwrap();

    assert_eq!(count, Some(42));
}

#[tokio::test]
async fn select_int_without_row_is_none_and_null_is_rejected() {
    let script = Script::new();
    script.respond(rows(&["age"], vec![]));
    script.respond(rows(&["age"], vec![vec![Value::Null]]));
    let missing = run(script.clone(), select_int("select age from user where id = ?", &params![9]))
        .await
        .unwrap();
    let null = run(script.clone(), select_int("select age from user where id = ?", &params![1])).await;

    assert_eq!(missing, None);
    assert!(matches!(
        null,
        Err(Error::TypeMismatch { expected: "int", found: "null" })
    ));
}

#[tokio::test]
async fn select_does_not_commit() {
    let script = Script::new();
    script.respond(rows(&["id"], vec![vec![Value::Int(1)]]));
    run(script.clone(), select_one("select id from user", &[]))
        .await
        .unwrap();

    assert_eq!(script.commits(), 0);
}

#[tokio::test]
async fn select_rows_needs_a_scope() {
    let script = Script::new();
    let result = run(script.clone(), select_rows("select 1", true, &[])).await;

    assert!(matches!(result, Err(Error::NoContext)));
    assert!(script.events().is_empty());
}

#[tokio::test]
async fn insert_builds_statement_and_reports_affected_rows() {
    let script = Script::new();
    script.respond(ResultSet::affected(1));
    let affected = run(
        script.clone(),
        insert("user", [("id", Value::from(1)), ("name", Value::from("a"))]),
    )
    .await
    .unwrap();

    assert_eq!(affected, 1);
    assert_eq!(
        script.events(),
        [
            Event::Connect(1),
            Event::Execute(
                1,
                "insert into user (id,name) values (%s,%s)".into(),
                vec![Value::Int(1), Value::Text("a".into())],
            ),
            Event::Commit(1),
            Event::Close(1),
        ]
    );
}

#[tokio::test]
async fn write_outside_transaction_commits_immediately() {
    let script = Script::new();
    script.respond(ResultSet::affected(3));
    script.respond(ResultSet::affected(0));
    run(script.clone(), async {
        with_connection(|| async {
            assert_eq!(execute_write("delete from user where age > ?", &params![90]).await?, 3);
            assert_eq!(script.commits(), 1);
            assert_eq!(execute_write("delete from user where age > ?", &params![99]).await?, 0);
            assert_eq!(script.commits(), 2);
            Ok::<_, Error>(())
        })
        .await
    })
    .await
    .unwrap();

    assert_eq!(script.connects(), 1);
}

#[tokio::test]
async fn write_inside_transaction_waits_for_outermost() {
    let script = Script::new();
    run(script.clone(), async {
        with_transaction(|| async {
            execute_write("update user set name = ? where id = ?", &params!["a", 1]).await?;
            with_transaction(|| async { execute_write("update user set name = ?", &params!["b"]).await }).await?;
            assert_eq!(script.commits(), 0);
            Ok::<_, Error>(())
        })
        .await
    })
    .await
    .unwrap();

    assert_eq!(script.commits(), 1);
    assert_eq!(script.statements().len(), 2);
}

#[tokio::test]
async fn failed_statement_propagates_driver_error() {
    let script = Script::new();
    script.fail_next("Duplicate entry '1' for key 'PRIMARY'");
    let result = run(
        script.clone(),
        insert("user", [("id", Value::from(1))]),
    )
    .await;

    match result {
        Err(Error::Database(sqlx::Error::Protocol(msg))) => assert!(msg.starts_with("Duplicate")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(script.commits(), 0);
    assert_eq!(script.closes(), 1);
}
