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
//! Object storage request path handling

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("invalid path: {0}")]
pub struct InvalidPath(pub String);

/// Split a request path into at most `maxsegs` segments.
///
/// The last segment keeps the rest of the path including slashes. At least `minsegs` leading
/// segments must be present and non empty. Absent trailing segments are `None`.
pub fn split_path(
    path: &str,
    minsegs: usize,
    maxsegs: usize,
) -> Result<Vec<Option<&str>>, InvalidPath> {
    if minsegs > maxsegs {
        return Err(InvalidPath(path.into()));
    }
    let segs: Vec<&str> = path.splitn(maxsegs + 1, '/').collect();
    if !segs[0].is_empty()
        || segs.len() < minsegs + 1
        || segs[1..=minsegs].iter().any(|x| x.is_empty())
    {
        return Err(InvalidPath(path.into()));
    }
    let mut res: Vec<Option<&str>> = segs[1..].iter().copied().map(Some).collect();
    res.resize(maxsegs, None);
    Ok(res)
}

/// `/version/account/container/object` storage path.
#[derive(Debug, PartialEq)]
pub struct SwiftPath<'a> {
    pub version: &'a str,
    pub account: Option<&'a str>,
    pub container: Option<&'a str>,
    pub object: Option<&'a str>,
}

impl<'a> SwiftPath<'a> {
    pub fn parse(path: &'a str) -> Result<Self, InvalidPath> {
        let segs = split_path(path, 1, 4)?;
        Ok(Self {
            version: segs[0].unwrap_or_default(),
            account: segs[1],
            container: segs[2],
            object: segs[3],
        })
    }

    /// Path with the account segment replaced. The account is percent-encoded.
    pub fn with_account(&self, account: &str) -> String {
        let mut path = format!("/{}/{}", self.version, urlencoding::encode(account));
        for seg in [self.container, self.object].into_iter().flatten() {
            path.push('/');
            path.push_str(seg);
        }
        path
    }
}
