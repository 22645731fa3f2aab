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

use thiserror::Error;

/// Errors raised while setting up the middleware.
///
/// Request time failures never surface as this type: they are turned into S3 error responses.
#[derive(Debug, Error)]
pub enum S3TokenError {
    /// Configuration could not be read or deserialized.
    #[error("configuration error: {}", source)]
    Config {
        /// The source of the error.
        #[from]
        source: config::ConfigError,
    },

    /// Neither `www_authenticate_uri`, `auth_uri` nor `auth_host` are set.
    #[error("identity service location is not configured, set www_authenticate_uri")]
    MissingAuthUri,

    /// Identity service URI can not be parsed.
    #[error("invalid identity service uri {uri}: {}", source)]
    InvalidUri {
        /// The configured value.
        uri: String,
        /// The source of the error.
        source: url::ParseError,
    },

    /// `http_timeout` is negative or not finite.
    #[error("invalid http_timeout {0}")]
    InvalidTimeout(f64),

    /// Certificate or key file read error.
    #[error("cannot read {}: {}", path.display(), source)]
    FileRead {
        /// The source of the error.
        source: std::io::Error,
        /// File name.
        path: std::path::PathBuf,
    },

    /// HTTP client setup error.
    #[error("http client error: {}", source)]
    HttpClient {
        /// The source of the error.
        #[from]
        source: reqwest::Error,
    },
}
