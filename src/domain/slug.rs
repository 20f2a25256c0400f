use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::{Error, Result};

const MAX_LEN: usize = 50;

/// URL-safe identifier of a newsletter or a message
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Slug(String);

impl FromStr for Slug {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        lazy_static::lazy_static! {
            static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9_-]+$").unwrap();
        }

        if value.is_empty() {
            return Err(Error::ParsingError("Slug cannot be empty".into()));
        }
        if value.len() > MAX_LEN {
            return Err(Error::ParsingError("Slug too long".into()));
        }
        if !SLUG_REGEX.is_match(value) {
            return Err(Error::ParsingError(format!(
                "Slug {:?} may only contain lowercase letters, digits, '-' and '_'",
                value
            )));
        }

        Ok(Self(value.to_string()))
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
