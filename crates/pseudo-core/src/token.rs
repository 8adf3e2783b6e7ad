//! Placeholder tokens (`ENT_0007`, `ENT_0018_2`)

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Minimum width of the zero-padded numeric part
pub const NUMBER_WIDTH: usize = 4;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"^([A-Z]+)_(\d+)(?:_(\d+))?$").unwrap();
}

/// Opaque placeholder substituted for an entity span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token {
    prefix: String,
    number: u32,
    variant: Option<u32>,
}

impl Token {
    pub fn new(prefix: impl Into<String>, number: u32) -> Self {
        Self {
            prefix: prefix.into(),
            number,
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: u32) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn variant(&self) -> Option<u32> {
        self.variant
    }

    /// The token without its variant suffix
    pub fn base(&self) -> Token {
        Token::new(self.prefix.clone(), self.number)
    }

    /// True when `s` is exactly one token and nothing else.
    pub fn is_token(s: &str) -> bool {
        TOKEN_RE.is_match(s.trim())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:0width$}", self.prefix, self.number, width = NUMBER_WIDTH)?;
        if let Some(variant) = self.variant {
            write!(f, "_{}", variant)?;
        }
        Ok(())
    }
}

impl FromStr for Token {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = TOKEN_RE
            .captures(s)
            .ok_or_else(|| CoreError::MalformedToken(s.to_string()))?;
        let number = caps[2]
            .parse()
            .map_err(|_| CoreError::MalformedToken(s.to_string()))?;
        let variant = match caps.get(3) {
            Some(m) => Some(
                m.as_str()
                    .parse()
                    .map_err(|_| CoreError::MalformedToken(s.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            prefix: caps[1].to_string(),
            number,
            variant,
        })
    }
}

impl TryFrom<String> for Token {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.to_string()
    }
}
