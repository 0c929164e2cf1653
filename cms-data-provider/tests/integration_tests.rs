use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use cms_data_provider::token::SharedToken;
use cms_data_provider::Configuration;
use cms_data_provider::CrudFilter;
use cms_data_provider::DataProvider;
use cms_data_provider::GetListParams;
use cms_data_provider::HttpError;
use cms_data_provider::MetaQuery;
use cms_data_provider::Pagination;
use cms_data_provider::SortOrder;
use cms_data_provider::Sorter;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_log::test;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

async fn provider(mock_server: &MockServer, token: &str) -> DataProvider {
    let configuration: Configuration = format!(
        "url: {}/graphql\ntoken: {token}\ntransport:\n  timeout: 5s\n  headers:\n    x-tenant: acme",
        mock_server.uri()
    )
    .parse()
    .unwrap();
    DataProvider::from_configuration(&configuration).unwrap()
}

#[test(tokio::test)]
async fn list_over_http() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer secret"))
        .and(header("x-tenant", "acme"))
        .and(body_partial_json(json!({
            "operationName": "GetProducts",
            "variables": {
                "where": {"title": {"contains": "lamp"}},
                "sort": {"price": "ASC"},
                "page": 2,
                "size": 20
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "productList": [{"id": "1", "data": {"title": "Desk lamp"}}],
                "productListCount": {"total": 21}
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = provider(&mock_server, "secret")
        .await
        .get_list(
            "product",
            GetListParams {
                pagination: Some(Pagination::new(2, 20)),
                filters: vec![CrudFilter::new("data.title", "contains", "lamp")],
                sorters: vec![Sorter::new("price", SortOrder::Asc)],
                meta: MetaQuery::default(),
            },
        )
        .await
        .unwrap();
    assert_eq!(result.data, vec![json!({"id": "1", "data": {"title": "Desk lamp"}})]);
    assert_eq!(result.total, 21);
}

#[test(tokio::test)]
async fn forbidden_response_expires_the_session() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errors": [{"message": "Field 'product' is not allowed"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let provider = provider(&mock_server, "expired")
        .await
        .with_session_expired(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let error = provider
        .get_one("product", "1", MetaQuery::default())
        .await
        .unwrap_err();
    assert_eq!(
        error,
        HttpError::new("Token expired. Please login again.", 403)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test(tokio::test)]
async fn server_errors_are_network_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let error = provider(&mock_server, "secret")
        .await
        .delete_one("product", "1")
        .await
        .unwrap_err();
    assert_eq!(
        error,
        HttpError::new("Network error: Response failed with status code 502", 502)
    );
}

#[test(tokio::test)]
async fn graphql_errors_in_a_successful_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "Unknown field 'sku'"}, {"message": "Unknown type 'X'"}]
        })))
        .mount(&mock_server)
        .await;

    let error = provider(&mock_server, "secret")
        .await
        .get_one("product", "1", MetaQuery::default())
        .await
        .unwrap_err();
    assert_eq!(
        error,
        HttpError::new("Unknown field 'sku', Unknown type 'X'", 400)
    );
}

#[test(tokio::test)]
async fn authentication_errors_are_recognized_by_message() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "Invalid token"}]
        })))
        .mount(&mock_server)
        .await;

    let error = provider(&mock_server, "secret")
        .await
        .create("product", json!({"title": "Lamp"}), MetaQuery::default())
        .await
        .unwrap_err();
    assert_eq!(
        error,
        HttpError::new("Authentication failed. Please login again.", 403)
    );
}

#[test(tokio::test)]
async fn mutations_carry_the_latest_token() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer refreshed"))
        .and(body_partial_json(json!({
            "operationName": "UpdateProduct",
            "variables": {"id": "5", "payload": {"price": 3}, "deltaUpdate": false}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"updateProduct": {"data": {"id": "5", "data": {"price": 3}}}}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = SharedToken::new(Some("stale".to_string()));
    let provider = provider(&mock_server, "unused")
        .await
        .with_token_provider(token.clone());
    token.set("refreshed");

    let result = provider
        .update("product", "5", json!({"price": 3}), MetaQuery::default())
        .await
        .unwrap();
    assert_eq!(result.data, json!({"id": "5", "data": {"price": 3}}));
}

#[test(tokio::test)]
async fn unreachable_backend() {
    // nothing listens on the discard port
    let configuration: Configuration = "url: http://127.0.0.1:9/graphql".parse().unwrap();
    let error = DataProvider::from_configuration(&configuration)
        .unwrap()
        .get_one("product", "1", MetaQuery::default())
        .await
        .unwrap_err();
    assert_eq!(error.status_code, 503);
    assert!(error.message.starts_with("Network error: "));
}

#[test(tokio::test)]
async fn successful_status_with_a_body_that_is_not_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let error = provider(&mock_server, "secret")
        .await
        .get_one("product", "1", MetaQuery::default())
        .await
        .unwrap_err();
    assert_eq!(error.status_code, 500);
    assert!(error.message.starts_with("response was malformed: "));
}

#[test(tokio::test)]
async fn successful_status_with_a_truncated_body() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buffer = [0u8; 4096];
        // read the whole request so closing the socket does not reset it
        loop {
            let read = socket.read(&mut buffer).await.unwrap();
            request.extend_from_slice(&buffer[..read]);
            let text = String::from_utf8_lossy(&request).to_lowercase();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|length| length.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
            if read == 0 {
                break;
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"data\"")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let configuration: Configuration = format!("url: http://{address}/graphql").parse().unwrap();
    let error = DataProvider::from_configuration(&configuration)
        .unwrap()
        .get_one("product", "1", MetaQuery::default())
        .await
        .unwrap_err();
    assert_eq!(error.status_code, 503);
    assert!(error
        .message
        .starts_with("Network error: could not read response: "));
}
