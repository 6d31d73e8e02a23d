use reqwest::StatusCode;
use span_gateway::{config::GatewayConfig, db::PgConnector};
use sqlx::{Connection, PgConnection};
use testcontainers_modules::{postgres::Postgres, testcontainers::runners::AsyncRunner};


use test_utils::start_test_server;

async fn seed_spans(url: &str) {
    let mut conn = PgConnection::connect(url).await.unwrap();
    sqlx::query("CREATE TABLE spans (id BIGINT PRIMARY KEY, span TEXT NOT NULL)")
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query("INSERT INTO spans (id, span) VALUES (42, '7b7d'), (43, 'not-hex')")
        .execute(&mut conn)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore] // Requires a container runtime
async fn should_serve_spans_from_postgres() {
    let postgres_instance = Postgres::default().start().await.unwrap();
    let host = postgres_instance.get_host().await.unwrap().to_string();
    let port = postgres_instance.get_host_port_ipv4(5432).await.unwrap();
    seed_spans(&format!("postgres://postgres:postgres@{host}:{port}/postgres")).await;

    let config = GatewayConfig::from_yaml(&format!(
        r#"
config_version: 1
database_host: {host}
database_port: {port}
database_username: postgres
database_password: postgres
database_dbname: postgres
listen_addr: 127.0.0.1:0
"#
    ))
    .unwrap();
    config.validate().unwrap();

    let (base_url, cell) = start_test_server(PgConnector::new(config.connect_options())).await;

    let resp = reqwest::get(format!("{base_url}/bor/span/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"{}");

    let resp = reqwest::get(format!("{base_url}/bor/span/9999")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.text().await.unwrap().contains("span not found for id"));

    let resp = reqwest::get(format!("{base_url}/bor/span/43")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let resp = reqwest::get(format!("{base_url}/bor/span/abc")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(cell.publications(), 1);
}

#[tokio::test]
#[ignore] // Requires a container runtime
async fn should_reconnect_after_postgres_restart() {
    let postgres_instance = Postgres::default().start().await.unwrap();
    let host = postgres_instance.get_host().await.unwrap().to_string();
    let port = postgres_instance.get_host_port_ipv4(5432).await.unwrap();
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");
    seed_spans(&url).await;

    let options = url.parse().unwrap();
    let (base_url, cell) = start_test_server(PgConnector::new(options)).await;

    let resp = reqwest::get(format!("{base_url}/bor/span/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Kill the gateway's backend session; its handle is now broken
    let mut admin = PgConnection::connect(&url).await.unwrap();
    sqlx::query(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE pid <> pg_backend_pid() AND datname = 'postgres'",
    )
    .execute(&mut admin)
    .await
    .unwrap();

    let resp = reqwest::get(format!("{base_url}/bor/span/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let resp = reqwest::get(format!("{base_url}/bor/span/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"{}");
    assert_eq!(cell.publications(), 2);
}
