// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0
//! S3 token middleware against a fake identity service.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{Value, json};
use std::collections::HashMap;
use tower::ServiceExt;

use openstack_s3token::S3Token;
use openstack_s3token::config::{S3TokenSection, TlsVerify};
use openstack_s3token::error::S3TokenError;
use openstack_s3token::s3token::client::KeystoneClient;
use openstack_s3token::s3token::error::S3ErrorCode;


use common::{echo_app, good_response};

fn conf(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Middleware in front of the echo application talking to the fake identity service.
fn middleware(server: &MockServer) -> Router {
    let filter = S3Token::filter_factory(
        &HashMap::new(),
        &conf(&[("www_authenticate_uri", server.url("/identity").as_str())]),
    )
    .unwrap();
    filter(echo_app())
}

fn s3_request(uri: &str, authorization: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", authorization)
        .header("x-storage-token", "token")
        .body(Body::empty())
        .unwrap()
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn good_keystone(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/identity/v3/s3tokens");
            then.status(201).json_body(good_response());
        })
        .await
}

#[tokio::test]
async fn test_no_path_request() {
    let server = MockServer::start_async().await;
    let mock = good_keystone(&server).await;

    let (status, _) = call(
        middleware(&server),
        Request::builder().uri("/").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_without_authorization() {
    let server = MockServer::start_async().await;
    let mock = good_keystone(&server).await;

    let (status, body) = call(
        middleware(&server),
        Request::builder()
            .uri("/v1/AUTH_cfa/c/o")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!("/v1/AUTH_cfa/c/o", body["path"]);
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_without_auth_storage_token() {
    let server = MockServer::start_async().await;
    good_keystone(&server).await;

    let (status, _) = call(
        middleware(&server),
        Request::builder()
            .uri("/v1/AUTH_cfa/c/o")
            .header("authorization", "badboy")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
}

#[tokio::test]
async fn test_authorized() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/identity/v3/s3tokens")
                .json_body(json!({"credentials": {
                    "access": "access", "token": "token", "signature": "signature"
                }}));
            then.status(201).json_body(good_response());
        })
        .await;

    let (status, body) = call(
        middleware(&server),
        s3_request("/v1/AUTH_cfa/c/o", "access:signature"),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(
        body["path"]
            .as_str()
            .unwrap()
            .starts_with("/v1/AUTH_TENANT_ID")
    );
    assert_eq!("TOKEN_ID", body["x-auth-token"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_authorized_http() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v3/s3tokens");
            then.status(201).json_body(good_response());
        })
        .await;

    let port = server.port().to_string();
    let filter = S3Token::filter_factory(
        &HashMap::new(),
        &conf(&[
            ("auth_protocol", "http"),
            ("auth_host", "127.0.0.1"),
            ("auth_port", port.as_str()),
        ]),
    )
    .unwrap();

    let (status, body) = call(
        filter(echo_app()),
        s3_request("/v1/AUTH_cfa/c/o", "access:signature"),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(
        body["path"]
            .as_str()
            .unwrap()
            .starts_with("/v1/AUTH_TENANT_ID")
    );
    assert_eq!("TOKEN_ID", body["x-auth-token"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_authorization_nova_toconnect() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/identity/v3/s3tokens")
                .json_body_partial(r#"{"credentials": {"access": "access"}}"#);
            then.status(201).json_body(good_response());
        })
        .await;

    let (status, body) = call(
        middleware(&server),
        s3_request(
            "/v1/AUTH_swiftint/c/o",
            "access:FORCED_TENANT_ID:signature",
        ),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(
        body["path"]
            .as_str()
            .unwrap()
            .starts_with("/v1/AUTH_FORCED_TENANT_ID")
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unicode_path() {
    let server = MockServer::start_async().await;
    good_keystone(&server).await;

    let (status, body) = call(
        middleware(&server),
        s3_request("/v1/AUTH_cfa/c/euro%E2%82%AC", "access:signature"),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!("/v1/AUTH_TENANT_ID/c/euro%E2%82%AC", body["path"]);
}

#[tokio::test]
async fn test_unauthorized_token() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/identity/v3/s3tokens");
            then.status(403).json_body(json!({"error": {
                "message": "EC2 access key not found.",
                "code": 401,
                "title": "Unauthorized"
            }}));
        })
        .await;

    let (status, body) = call(
        middleware(&server),
        s3_request("/v1/AUTH_cfa/c/o", "access:signature"),
    )
    .await;
    assert_eq!(S3ErrorCode::AccessDenied.status(), status);
    assert_eq!(S3ErrorCode::AccessDenied.body().into_bytes(), body);
}

#[tokio::test]
async fn test_bogus_authorization() {
    let server = MockServer::start_async().await;
    let mock = good_keystone(&server).await;

    let (status, body) = call(middleware(&server), s3_request("/v1/AUTH_cfa/c/o", "badboy")).await;
    assert_eq!(StatusCode::BAD_REQUEST, status);
    assert_eq!(S3ErrorCode::InvalidURI.status(), status);
    assert_eq!(S3ErrorCode::InvalidURI.body().into_bytes(), body);
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_fail_to_connect_to_keystone() {
    let filter = S3Token::filter_factory(
        &HashMap::new(),
        &conf(&[
            ("www_authenticate_uri", "http://127.0.0.1:1/identity"),
            ("http_timeout", "2"),
        ]),
    )
    .unwrap();

    let (status, body) = call(
        filter(echo_app()),
        s3_request("/v1/AUTH_cfa/c/o", "access:signature"),
    )
    .await;
    assert_eq!(S3ErrorCode::InvalidURI.status(), status);
    assert_eq!(S3ErrorCode::InvalidURI.body().into_bytes(), body);
}

#[tokio::test]
async fn test_bad_reply() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/identity/v3/s3tokens");
            then.status(201).body("<badreply>");
        })
        .await;

    let (status, body) = call(
        middleware(&server),
        s3_request("/v1/AUTH_cfa/c/o", "access:signature"),
    )
    .await;
    assert_eq!(S3ErrorCode::InvalidURI.status(), status);
    assert_eq!(S3ErrorCode::InvalidURI.body().into_bytes(), body);
}

#[tokio::test]
async fn test_reply_missing_tenant() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/identity/v3/s3tokens");
            then.status(200)
                .json_body(json!({"access": {"token": {"id": "TOKEN_ID"}}}));
        })
        .await;

    let (status, body) = call(
        middleware(&server),
        s3_request("/v1/AUTH_cfa/c/o", "access:signature"),
    )
    .await;
    assert_eq!(S3ErrorCode::InvalidURI.status(), status);
    assert_eq!(S3ErrorCode::InvalidURI.body().into_bytes(), body);
}

#[tokio::test]
async fn test_deprecated_auth_uri() {
    let server = MockServer::start_async().await;
    let mock = good_keystone(&server).await;

    let filter = S3Token::filter_factory(
        &HashMap::new(),
        &conf(&[("auth_uri", server.url("/identity").as_str())]),
    )
    .unwrap();

    let (status, _) = call(
        filter.clone()(echo_app()),
        Request::builder().uri("/").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    let (status, body) = call(
        filter(echo_app()),
        s3_request("/v1/AUTH_cfa/c/o", "access:signature"),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!("/v1/AUTH_TENANT_ID/c/o", body["path"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_insecure() {
    let server = MockServer::start_async().await;
    let mock = good_keystone(&server).await;

    let uri = server.url("/identity");
    let local_conf = conf(&[("insecure", "True"), ("www_authenticate_uri", uri.as_str())]);

    let client =
        KeystoneClient::new(&S3TokenSection::from_conf(&HashMap::new(), &local_conf).unwrap())
            .unwrap();
    assert_eq!(&TlsVerify::Insecure, client.verify());

    let filter = S3Token::filter_factory(&HashMap::new(), &local_conf).unwrap();
    let (status, body) = call(
        filter(echo_app()),
        s3_request("/v1/AUTH_cfa/c/o", "access:signature"),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!("/v1/AUTH_TENANT_ID/c/o", body["path"]);
    assert_eq!("TOKEN_ID", body["x-auth-token"]);
    mock.assert_async().await;
}

#[test]
fn test_insecure_missing_uri() {
    assert!(matches!(
        S3Token::filter_factory(&HashMap::new(), &conf(&[("insecure", "True")])),
        Err(S3TokenError::MissingAuthUri)
    ));
}

#[tokio::test]
async fn test_empty_force_tenant() {
    let server = MockServer::start_async().await;
    good_keystone(&server).await;

    let (status, body) = call(
        middleware(&server),
        s3_request("/v1/AUTH_cfa/c/o", "access::signature"),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!("/v1/AUTH_TENANT_ID/c/o", body["path"]);
}

#[tokio::test]
async fn test_tenant_with_query_char() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/identity/v3/s3tokens");
            then.status(201)
                .json_body(json!({"access": {"token": {"id": "TOKEN_ID", "tenant": {"id": "TEN?ANT"}}}}));
        })
        .await;

    let (status, body) = call(
        middleware(&server),
        s3_request("/v1/AUTH_cfa/c/o", "access:signature"),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!("/v1/AUTH_TEN%3FANT/c/o", body["path"]);
}

#[tokio::test]
async fn test_numeric_identifiers() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/identity/v3/s3tokens");
            then.status(201)
                .json_body(json!({"access": {"token": {"id": 42, "tenant": {"id": 1234}}}}));
        })
        .await;

    let (status, body) = call(
        middleware(&server),
        s3_request("/v1/AUTH_cfa/c/o", "access:signature"),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!("/v1/AUTH_1234/c/o", body["path"]);
    assert_eq!("42", body["x-auth-token"]);
}
