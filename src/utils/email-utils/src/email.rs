// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidateEmail;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(s: &str) -> Result<Email, InvalidEmailError> {
        if ValidateEmail::validate_email(&s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidEmailError { s: s.to_string() })
        }
    }

    /// Parses a recipients list separated by commas or semicolons, the way
    /// notification settings are usually written by hand. Blank entries are
    /// skipped.
    pub fn parse_list(s: &str) -> Result<Vec<Email>, InvalidEmailError> {
        s.split([',', ';'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Email::parse)
            .collect()
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl TryFrom<String> for Email {
    type Error = InvalidEmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Email::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Error)]
#[error("{s} is not a valid email")]
pub struct InvalidEmailError {
    s: String,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
