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

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

/// S3 error codes the middleware may answer with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum S3ErrorCode {
    AccessDenied,
    InvalidURI,
}

impl S3ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AccessDenied => StatusCode::UNAUTHORIZED,
            Self::InvalidURI => StatusCode::BAD_REQUEST,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access denied",
            Self::InvalidURI => "Could not parse the specified URI",
        }
    }

    /// S3 style XML error document.
    pub fn body(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n<Error>\r\n  <Code>{}</Code>\r\n  <Message>{}</Message>\r\n</Error>\r\n",
            self,
            self.message()
        )
    }
}

impl fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessDenied => f.write_str("AccessDenied"),
            Self::InvalidURI => f.write_str("InvalidURI"),
        }
    }
}

impl IntoResponse for S3ErrorCode {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/xml")],
            self.body(),
        )
            .into_response()
    }
}

/// Build the response rejecting a request with the given S3 error code.
pub fn deny_request(code: S3ErrorCode) -> Response {
    code.into_response()
}

/// Identity service call failures.
#[derive(Debug, Error)]
pub enum S3TokenServiceError {
    /// Identity service is not reachable or the request failed in transit.
    #[error("identity service connection error: {}", source)]
    Connection {
        /// The source of the error.
        #[from]
        source: reqwest::Error,
    },

    /// Identity service rejected the credentials.
    #[error("identity service replied with {status}")]
    Rejected { status: StatusCode },

    /// Identity service reply can not be interpreted.
    #[error("unexpected identity service reply: {}", source)]
    BadReply {
        /// The source of the error.
        #[from]
        source: serde_json::Error,
    },
}

impl S3TokenServiceError {
    /// S3 error code reported to the client.
    pub fn code(&self) -> S3ErrorCode {
        match self {
            Self::Rejected { .. } => S3ErrorCode::AccessDenied,
            Self::Connection { .. } | Self::BadReply { .. } => S3ErrorCode::InvalidURI,
        }
    }
}

impl IntoResponse for S3TokenServiceError {
    fn into_response(self) -> Response {
        deny_request(self.code())
    }
}
