mod common;

use common::{call_tool, StubResponse, StubServer};
use serde_json::json;

#[tokio::test]
async fn post_sends_query_and_variables_as_json() {
    let server =
        StubServer::spawn(vec![StubResponse::json(200, r#"{"data":{"viewer":{"id":"u1"}}}"#)])
            .await;

    let envelope = call_tool(
        "rest_api_graphql",
        json!({
            "url": server.url("/graphql"),
            "query": "query Viewer($id: ID!) { viewer(id: $id) { id } }",
            "variables": {"id": "u1"},
            "operationName": "Viewer",
        }),
    )
    .await;

    assert_eq!(envelope["status"], 200);
    assert_eq!(envelope["data"]["data"]["viewer"]["id"], "u1");

    let requests = server.requests().await;
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.header("content-type"), Some("application/json"));
    let sent: serde_json::Value = serde_json::from_str(&req.body).expect("json body");
    assert_eq!(
        sent["query"],
        "query Viewer($id: ID!) { viewer(id: $id) { id } }"
    );
    assert_eq!(sent["variables"]["id"], "u1");
    assert_eq!(sent["operationName"], "Viewer");
}

#[tokio::test]
async fn get_serializes_the_operation_into_query_parameters() {
    let server = StubServer::spawn(vec![StubResponse::json(200, r#"{"data":{"a":1}}"#)]).await;

    let envelope = call_tool(
        "rest_api_graphql",
        json!({
            "url": server.url("/graphql"),
            "httpMethod": "GET",
            "query": "{ a }",
            "variables": {"limit": 5},
        }),
    )
    .await;

    assert_eq!(envelope["status"], 200);

    let requests = server.requests().await;
    let req = &requests[0];
    assert_eq!(req.method, "GET");
    assert!(req.body.is_empty());
    assert!(req.path.starts_with("/graphql?"));
    assert!(req.path.contains("query=%7B+a+%7D"));
    // Variables travel as one JSON-encoded parameter.
    assert!(req.path.contains("variables=%7B%22limit%22%3A5%7D"));
}

#[tokio::test]
async fn graphql_calls_honor_bearer_auth() {
    let server = StubServer::spawn(vec![StubResponse::json(200, r#"{"data":{}}"#)]).await;

    call_tool(
        "rest_api_graphql",
        json!({
            "url": server.url("/graphql"),
            "query": "{ me { id } }",
            "authType": "bearer",
            "bearerToken": "gql-token",
        }),
    )
    .await;

    let requests = server.requests().await;
    assert_eq!(requests[0].header("authorization"), Some("Bearer gql-token"));
}

#[tokio::test]
async fn unsupported_transport_method_is_rejected() {
    let envelope = call_tool(
        "rest_api_graphql",
        json!({
            "url": "https://api.test/graphql",
            "httpMethod": "DELETE",
            "query": "{ a }",
        }),
    )
    .await;

    assert_eq!(envelope["error"], true);
    assert!(envelope["message"].as_str().expect("message").len() > 0);
}
