//! A-share code normalisation
//!
//! Codes arrive as `600519`, `600519.SH`, `sh600519` or with stray spaces.
//! Upstream calls want the bare six digits plus the exchange.

use tracing::warn;

/// Mainland exchange of an A-share code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// Shanghai Stock Exchange
    Shanghai,
    /// Shenzhen Stock Exchange
    Shenzhen,
    /// Beijing Stock Exchange
    Beijing,
}

impl Exchange {
    /// Suffix used in `code.SUFFIX` form
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Shanghai => "SH",
            Self::Shenzhen => "SZ",
            Self::Beijing => "BJ",
        }
    }

    /// Market id East Money expects in `secid`
    pub fn market_id(self) -> u8 {
        match self {
            Self::Shanghai => 1,
            Self::Shenzhen | Self::Beijing => 0,
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_uppercase().as_str() {
            "SH" | "SS" => Some(Self::Shanghai),
            "SZ" => Some(Self::Shenzhen),
            "BJ" => Some(Self::Beijing),
            _ => None,
        }
    }

    /// Exchange implied by the code's prefix
    pub fn from_code(code: &str) -> Option<Self> {
        const SHENZHEN: [&str; 5] = ["000", "001", "002", "003", "300"];
        const SHANGHAI: [&str; 5] = ["600", "601", "603", "605", "688"];

        if SHENZHEN.iter().any(|p| code.starts_with(p)) {
            Some(Self::Shenzhen)
        } else if SHANGHAI.iter().any(|p| code.starts_with(p)) {
            Some(Self::Shanghai)
        } else if code.starts_with("430") || code.starts_with("83") {
            Some(Self::Beijing)
        } else {
            None
        }
    }
}

/// A parsed A-share code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZhCode {
    /// Bare code without exchange, e.g. `600519`
    pub code: String,
    /// Exchange, from the suffix or the code prefix
    pub exchange: Exchange,
}

impl ZhCode {
    /// Parse any accepted spelling of a code.
    ///
    /// An explicit suffix or prefix wins. Otherwise the exchange follows the
    /// code prefix, and unknown prefixes default to Shenzhen with a warning.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim().to_ascii_uppercase();

        if let Some((code, suffix)) = trimmed.split_once('.') {
            if let Some(exchange) = Exchange::from_suffix(suffix) {
                return Self { code: code.to_string(), exchange };
            }
        }

        for (prefix, exchange) in [
            ("SH", Exchange::Shanghai),
            ("SZ", Exchange::Shenzhen),
            ("BJ", Exchange::Beijing),
        ] {
            if let Some(code) = trimmed.strip_prefix(prefix) {
                if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
                    return Self { code: code.to_string(), exchange };
                }
            }
        }

        let code = trimmed.split('.').next().unwrap_or_default().to_string();
        let exchange = Exchange::from_code(&code).unwrap_or_else(|| {
            warn!(code = %code, "unrecognised A-share code prefix, assuming Shenzhen");
            Exchange::Shenzhen
        });
        Self { code, exchange }
    }

    /// `600519.SH` form
    pub fn normalized(&self) -> String {
        format!("{}.{}", self.code, self.exchange.suffix())
    }

    /// East Money `secid`, e.g. `1.600519`
    pub fn secid(&self) -> String {
        format!("{}.{}", self.exchange.market_id(), self.code)
    }
}
