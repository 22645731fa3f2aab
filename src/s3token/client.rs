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
//! Identity service client

use async_trait::async_trait;
#[cfg(test)]
use mockall::mock;
use reqwest::{Certificate, Client, Identity};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

use crate::config::{S3TokenSection, TlsVerify};
use crate::error::S3TokenError;
use crate::s3token::error::S3TokenServiceError;
use crate::s3token::types::{S3TokenReply, S3TokenRequest};

/// Exchange of S3 credentials for a Keystone token.
#[async_trait]
pub trait S3TokenApi: Send + Sync {
    async fn authenticate(
        &self,
        request: &S3TokenRequest,
    ) -> Result<S3TokenReply, S3TokenServiceError>;
}

#[cfg(test)]
mock! {
    pub S3TokenClient {}

    #[async_trait]
    impl S3TokenApi for S3TokenClient {
        async fn authenticate(
            &self,
            request: &S3TokenRequest,
        ) -> Result<S3TokenReply, S3TokenServiceError>;
    }
}

/// `POST /v3/s3tokens` over HTTP.
#[derive(Clone, Debug)]
pub struct KeystoneClient {
    client: Client,
    endpoint: Url,
    verify: TlsVerify,
}

fn read_file(path: &Path) -> Result<Vec<u8>, S3TokenError> {
    std::fs::read(path).map_err(|source| S3TokenError::FileRead {
        source,
        path: path.to_path_buf(),
    })
}

impl KeystoneClient {
    pub fn new(config: &S3TokenSection) -> Result<Self, S3TokenError> {
        let base = config.request_uri()?;
        let endpoint = format!("{}/v3/s3tokens", base.as_str().trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint).map_err(|source| S3TokenError::InvalidUri {
            uri: endpoint.clone(),
            source,
        })?;

        let verify = config.verify();
        let mut builder = Client::builder().timeout(config.timeout()?);
        builder = match &verify {
            TlsVerify::System => builder,
            TlsVerify::Insecure => builder.danger_accept_invalid_certs(true),
            TlsVerify::CaFile(path) => {
                builder.add_root_certificate(Certificate::from_pem(&read_file(path)?)?)
            }
            TlsVerify::ClientCert { certfile, keyfile } => {
                let mut pem = read_file(certfile)?;
                if !pem.ends_with(b"\n") {
                    pem.push(b'\n');
                }
                pem.extend_from_slice(&read_file(keyfile)?);
                builder.identity(Identity::from_pem(&pem)?)
            }
        };

        Ok(Self {
            client: builder.build()?,
            endpoint,
            verify,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Certificate verification mode the HTTP client was built with.
    pub fn verify(&self) -> &TlsVerify {
        &self.verify
    }
}

#[async_trait]
impl S3TokenApi for KeystoneClient {
    #[tracing::instrument(
        level = "debug",
        skip(self, request),
        fields(access = %request.credentials.access)
    )]
    async fn authenticate(
        &self,
        request: &S3TokenRequest,
    ) -> Result<S3TokenReply, S3TokenServiceError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .inspect_err(|err| info!("HTTP connection exception: {}", err))?;

        let status = response.status();
        if !status.is_success() {
            debug!(
                "Keystone reply error: status={} reason={}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            );
            return Err(S3TokenServiceError::Rejected { status });
        }

        let body = response.bytes().await?;
        debug!(
            "Keystone Reply: Status: {}, Output: {}",
            status.as_u16(),
            String::from_utf8_lossy(&body)
        );
        serde_json::from_slice(&body).map_err(|err| {
            debug!(
                "Error on keystone reply: {} {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            );
            err.into()
        })
    }
}
