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
//! S3 token authentication middleware
//!
//! Translates S3 `Authorization` headers into a Keystone `s3tokens` request and points the
//! request at the account of the resolved tenant. Requests without S3 credentials pass through
//! untouched.

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Uri, header, uri::PathAndQuery},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub mod client;
pub mod error;
pub mod path;
pub mod types;

use crate::config::S3TokenSection;
use crate::error::S3TokenError;
use client::{KeystoneClient, S3TokenApi};
use error::{S3ErrorCode, deny_request};
use path::SwiftPath;
use types::S3Authorization;

/// Identity headers a client must never be able to inject.
pub const KEYSTONE_AUTH_HEADERS: &[&str] = &[
    "x-identity-status",
    "x-service-identity-status",
    "x-domain-id",
    "x-service-domain-id",
    "x-domain-name",
    "x-service-domain-name",
    "x-project-id",
    "x-service-project-id",
    "x-project-name",
    "x-service-project-name",
    "x-project-domain-id",
    "x-service-project-domain-id",
    "x-project-domain-name",
    "x-service-project-domain-name",
    "x-user-id",
    "x-service-user-id",
    "x-user-name",
    "x-service-user-name",
    "x-user-domain-id",
    "x-service-user-domain-id",
    "x-user-domain-name",
    "x-service-user-domain-name",
    "x-roles",
    "x-service-roles",
    "x-is-admin-project",
    "x-service-catalog",
    // deprecated
    "x-tenant-id",
    "x-tenant-name",
    "x-tenant",
    "x-user",
    "x-role",
];

pub const X_AUTH_TOKEN: &str = "x-auth-token";
pub const X_STORAGE_TOKEN: &str = "x-storage-token";

/// Token information attached to the request by an auth middleware running earlier in the
/// pipeline. When present the identity headers are trusted and left alone.
#[derive(Clone, Debug, Default)]
pub struct KeystoneTokenInfo(pub serde_json::Value);

pub struct S3Token {
    reseller_prefix: String,
    client: Box<dyn S3TokenApi>,
}

impl S3Token {
    pub fn new(config: &S3TokenSection) -> Result<Self, S3TokenError> {
        debug!("Starting the s3token component");
        Ok(Self::with_client(config, KeystoneClient::new(config)?))
    }

    pub fn with_client<C: S3TokenApi + 'static>(config: &S3TokenSection, client: C) -> Self {
        Self {
            reseller_prefix: config.reseller_prefix.clone(),
            client: Box::new(client),
        }
    }

    /// Build the middleware from paste style configuration maps.
    ///
    /// Returns a function placing the middleware in front of the given router.
    pub fn filter_factory(
        global_conf: &HashMap<String, String>,
        local_conf: &HashMap<String, String>,
    ) -> Result<impl Fn(Router) -> Router + Clone + use<>, S3TokenError> {
        let config = S3TokenSection::from_conf(global_conf, local_conf)?;
        let state = Arc::new(Self::new(&config)?);
        Ok(move |app: Router| state.clone().wrap(app))
    }

    /// Place the middleware in front of the router.
    pub fn wrap<S>(self: Arc<Self>, app: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        app.layer(middleware::from_fn_with_state(self, s3_token))
    }

    /// Account name of the tenant.
    pub fn account<T: AsRef<str>>(&self, tenant: T) -> String {
        format!("{}{}", self.reseller_prefix, tenant.as_ref())
    }
}

fn storage_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_AUTH_TOKEN)
        .or_else(|| headers.get(X_STORAGE_TOKEN))
        .and_then(|val| val.to_str().ok())
        .filter(|val| !val.is_empty())
        .map(Into::into)
}

fn with_path(uri: &Uri, path: &str) -> Result<Uri, axum::http::Error> {
    let path_and_query: PathAndQuery = match uri.query() {
        Some(query) => format!("{path}?{query}").parse()?,
        None => path.parse()?,
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Ok(Uri::from_parts(parts)?)
}

/// Authenticate the S3 request and send it downstream.
pub async fn s3_token(State(state): State<Arc<S3Token>>, mut req: Request, next: Next) -> Response {
    debug!("Calling S3Token middleware.");

    if req.extensions().get::<KeystoneTokenInfo>().is_none() {
        let headers = req.headers_mut();
        for name in KEYSTONE_AUTH_HEADERS {
            headers.remove(*name);
        }
    }

    let path = req.uri().path().to_string();
    let swift_path = match SwiftPath::parse(&path) {
        Ok(swift_path) => swift_path,
        Err(_) => {
            debug!("Not a path query: {}, skipping.", path);
            return next.run(req).await;
        }
    };

    let Some(auth_header) = req.headers().get(header::AUTHORIZATION).cloned() else {
        debug!("No Authorization header. skipping.");
        return next.run(req).await;
    };

    let Some(token) = storage_token(req.headers()) else {
        debug!("You did not specify an auth or a storage token. skipping.");
        return next.run(req).await;
    };

    let Some(auth) = auth_header
        .to_str()
        .ok()
        .and_then(|val| S3Authorization::parse(val))
    else {
        debug!("You have an invalid Authorization header: {:?}", auth_header);
        return deny_request(S3ErrorCode::InvalidURI);
    };

    let force_tenant = auth.force_tenant.clone();
    let reply = match state.client.authenticate(&auth.into_request(token)).await {
        Ok(reply) => reply,
        Err(err) => {
            debug!("Received error, exiting middleware with error: {}", err);
            return err.into_response();
        }
    };

    let Ok(token_id) = HeaderValue::from_str(&reply.access.token.id) else {
        debug!("Error on keystone reply: token id is not a valid header value");
        return deny_request(S3ErrorCode::InvalidURI);
    };
    req.headers_mut().insert(X_AUTH_TOKEN, token_id);

    let tenant = force_tenant.unwrap_or(reply.access.token.tenant.id);
    debug!("Connecting with tenant: {}", tenant);
    if swift_path.account.is_some() {
        match with_path(req.uri(), &swift_path.with_account(&state.account(&tenant))) {
            Ok(uri) => *req.uri_mut() = uri,
            Err(err) => {
                debug!("Cannot rewrite path {} for tenant {}: {}", path, tenant, err);
                return deny_request(S3ErrorCode::InvalidURI);
            }
        }
    }

    next.run(req).await
}
