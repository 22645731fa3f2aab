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
//! S3 token request and reply structures

use serde::{Deserialize, Deserializer, Serialize};

/// Body of the `POST /v3/s3tokens` request.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct S3TokenRequest {
    pub credentials: S3Credentials,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct S3Credentials {
    /// EC2 access key
    pub access: String,
    pub token: String,
    pub signature: String,
}

/// The part of the identity reply the middleware relies on.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct S3TokenReply {
    pub access: Access,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Access {
    pub token: Token,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Token {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub tenant: Tenant,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Tenant {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Identifier {
    String(String),
    Number(serde_json::Number),
}

/// Identifiers are normally strings, numbers are accepted in their decimal form.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Identifier::deserialize(deserializer)? {
        Identifier::String(val) => val,
        Identifier::Number(val) => val.to_string(),
    })
}

/// Credentials carried by the S3 `Authorization` header.
#[derive(Clone, Debug, PartialEq)]
pub struct S3Authorization {
    pub access: String,
    pub signature: String,
    /// Tenant to connect to instead of the one owning the credentials.
    pub force_tenant: Option<String>,
}

impl S3Authorization {
    /// Parse `AWS access:signature` (the scheme is optional) or
    /// `access:tenant:signature`.
    pub fn parse<S: AsRef<str>>(header: S) -> Option<Self> {
        let value = header.as_ref().rsplit(' ').next()?;
        let (access, signature) = value.rsplit_once(':')?;
        let (access, force_tenant) = match access.split_once(':') {
            Some((_, tenant)) if tenant.contains(':') => return None,
            Some((access, tenant)) => (
                access,
                Some(tenant.to_string()).filter(|x| !x.is_empty()),
            ),
            None => (access, None),
        };
        Some(Self {
            access: access.into(),
            signature: signature.into(),
            force_tenant,
        })
    }

    pub fn into_request<T: Into<String>>(self, token: T) -> S3TokenRequest {
        S3TokenRequest {
            credentials: S3Credentials {
                access: self.access,
                token: token.into(),
                signature: self.signature,
            },
        }
    }
}
