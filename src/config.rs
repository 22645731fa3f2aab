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

use config::{File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::error::S3TokenError;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    /// S3 token middleware options
    #[serde(default)]
    pub s3token: S3TokenSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3TokenSection {
    /// Identity service base URI
    pub www_authenticate_uri: Option<String>,

    /// Deprecated alias of `www_authenticate_uri`
    pub auth_uri: Option<String>,

    /// Deprecated, identity service host
    pub auth_host: Option<String>,

    /// Deprecated, identity service port
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,

    /// Deprecated, identity service protocol
    #[serde(default = "default_auth_protocol")]
    pub auth_protocol: String,

    /// Prefix of the account segment written into the request path
    #[serde(default = "default_reseller_prefix")]
    pub reseller_prefix: String,

    /// Disable server certificate verification. Parsed with [`bool_from_string`].
    pub insecure: Option<String>,

    pub certfile: Option<PathBuf>,
    pub keyfile: Option<PathBuf>,

    /// Identity request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout: f64,
}

impl Default for S3TokenSection {
    fn default() -> Self {
        Self {
            www_authenticate_uri: None,
            auth_uri: None,
            auth_host: None,
            auth_port: default_auth_port(),
            auth_protocol: default_auth_protocol(),
            reseller_prefix: default_reseller_prefix(),
            insecure: None,
            certfile: None,
            keyfile: None,
            http_timeout: default_http_timeout(),
        }
    }
}

/// How the identity service certificate is verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsVerify {
    /// Use the system trust roots.
    System,
    /// Verify against the given CA bundle.
    CaFile(PathBuf),
    /// Present a client identity built from certificate and key.
    ClientCert { certfile: PathBuf, keyfile: PathBuf },
    /// Do not verify the server certificate.
    Insecure,
}

fn default_auth_port() -> u16 {
    35357
}

fn default_auth_protocol() -> String {
    "https".into()
}

fn default_reseller_prefix() -> String {
    "AUTH_".into()
}

fn default_http_timeout() -> f64 {
    10.0
}

fn non_empty(val: &Option<String>) -> Option<&str> {
    val.as_deref().map(str::trim).filter(|x| !x.is_empty())
}

fn non_empty_path(val: &Option<PathBuf>) -> Option<&PathBuf> {
    val.as_ref().filter(|x| !x.as_os_str().is_empty())
}

/// Interpret a configuration string as boolean.
///
/// Anything not recognized as true, including garbage, is false.
pub fn bool_from_string<S: AsRef<str>>(val: S) -> bool {
    matches!(
        val.as_ref().trim().to_lowercase().as_str(),
        "1" | "t" | "true" | "on" | "y" | "yes"
    )
}

impl S3TokenSection {
    /// Build options from paste style `global_conf` and `local_conf` maps.
    ///
    /// Values of `local_conf` take precedence.
    pub fn from_conf(
        global_conf: &HashMap<String, String>,
        local_conf: &HashMap<String, String>,
    ) -> Result<Self, S3TokenError> {
        let mut builder = config::Config::builder();
        for (key, value) in global_conf.iter().chain(local_conf.iter()) {
            builder = builder.set_override(key.as_str(), value.as_str())?;
        }
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Identity service base URI, honoring the deprecated options.
    pub fn request_uri(&self) -> Result<Url, S3TokenError> {
        let uri = if let Some(uri) = non_empty(&self.www_authenticate_uri) {
            uri.to_string()
        } else if let Some(uri) = non_empty(&self.auth_uri) {
            warn!(
                "Use of the auth_uri option was deprecated in the Queens release in favor of \
                www_authenticate_uri. This option will be removed in the S release."
            );
            uri.to_string()
        } else {
            warn!(
                "Use of the auth_host, auth_port, and auth_protocol configuration options was \
                deprecated in the Newton release in favor of www_authenticate_uri. These options \
                may be removed in a future release."
            );
            let host = non_empty(&self.auth_host).ok_or(S3TokenError::MissingAuthUri)?;
            format!("{}://{}:{}", self.auth_protocol, host, self.auth_port)
        };
        Url::parse(&uri).map_err(|source| S3TokenError::InvalidUri { uri, source })
    }

    /// Certificate verification mode for the identity requests.
    pub fn verify(&self) -> TlsVerify {
        if self.insecure.as_ref().is_some_and(bool_from_string) {
            return TlsVerify::Insecure;
        }
        match (non_empty_path(&self.certfile), non_empty_path(&self.keyfile)) {
            (Some(certfile), Some(keyfile)) => TlsVerify::ClientCert {
                certfile: certfile.clone(),
                keyfile: keyfile.clone(),
            },
            (Some(certfile), None) => TlsVerify::CaFile(certfile.clone()),
            _ => TlsVerify::System,
        }
    }

    pub fn timeout(&self) -> Result<Duration, S3TokenError> {
        Duration::try_from_secs_f64(self.http_timeout)
            .map_err(|_| S3TokenError::InvalidTimeout(self.http_timeout))
    }
}

impl Config {
    pub fn new(path: PathBuf) -> Result<Self, S3TokenError> {
        let mut builder = config::Config::builder();

        if std::path::Path::new(&path).is_file() {
            builder = builder.add_source(File::from(path).format(FileFormat::Ini));
        }

        Ok(builder.build()?.try_deserialize()?)
    }
}
