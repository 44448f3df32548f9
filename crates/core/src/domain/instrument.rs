use serde::{Deserialize, Serialize};

/// Codes with these leading digits are exchange-listed funds even when the
/// caller hinted at an index.
const FUND_CODE_PREFIXES: [&str; 3] = ["15", "51", "16"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentKind {
    Etf,
    Index,
}

impl InstrumentKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETF" => Some(Self::Etf),
            "INDEX" => Some(Self::Index),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Etf => "ETF",
            Self::Index => "INDEX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    Beijing,
}

impl Exchange {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "sh" => Some(Self::Shanghai),
            "sz" => Some(Self::Shenzhen),
            "bj" => Some(Self::Beijing),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Shanghai => "sh",
            Self::Shenzhen => "sz",
            Self::Beijing => "bj",
        }
    }
}

/// A numeric security code with exchange decoration and annotations removed.
///
/// `"sh588000"`, `"588000.SH"` and `"588000 (note)"` all share the code `588000`;
/// only the first two remember which exchange they were written against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityCode {
    pub code: String,
    pub exchange: Option<Exchange>,
}

impl SecurityCode {
    pub fn parse(symbol: &str) -> Self {
        let token = symbol.split_whitespace().next().unwrap_or("");

        let (prefix_exchange, rest) = match token.get(..2).and_then(Exchange::from_tag) {
            Some(ex) => (Some(ex), &token[2..]),
            None => (None, token),
        };

        let (code, suffix_exchange) = match rest.rsplit_once('.') {
            Some((code, tag)) => match Exchange::from_tag(tag) {
                Some(ex) => (code, Some(ex)),
                None => (rest, None),
            },
            None => (rest, None),
        };

        Self {
            code: code.to_string(),
            exchange: prefix_exchange.or(suffix_exchange),
        }
    }

    pub fn is_fund_code(&self) -> bool {
        FUND_CODE_PREFIXES.iter().any(|p| self.code.starts_with(p))
    }

    pub fn is_numeric(&self) -> bool {
        !self.code.is_empty() && self.code.chars().all(|c| c.is_ascii_digit())
    }
}

/// Canonical deduplication key for a lookup symbol or display code.
pub fn canonical_code(symbol: &str) -> String {
    SecurityCode::parse(symbol).code
}

/// Everything the market-data collaborator needs to locate one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityRef {
    pub code: SecurityCode,
    pub kind: InstrumentKind,
}

impl SecurityRef {
    /// Resolves the fetch type: an ETF hint wins, otherwise fund-like codes are
    /// still treated as funds.
    pub fn classify(symbol: &str, hint: InstrumentKind) -> Self {
        let code = SecurityCode::parse(symbol);
        let kind = if hint == InstrumentKind::Etf || code.is_fund_code() {
            InstrumentKind::Etf
        } else {
            InstrumentKind::Index
        };
        Self { code, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldPosition {
    pub name: String,
    #[serde(rename = "code")]
    pub symbol: String,
    /// 0 means "unset": the latest close stands in for the cost basis.
    pub cost: f64,
    /// 0 means the position is tracked but not capitalized.
    pub principal: f64,
    #[serde(rename = "type")]
    pub kind: InstrumentKind,
}

impl HeldPosition {
    pub fn canonical_code(&self) -> String {
        canonical_code(&self.symbol)
    }

    pub fn is_capitalized(&self) -> bool {
        self.principal > 0.0
    }

    pub fn resolved_cost(&self, current_price: f64) -> f64 {
        if self.cost > 0.0 {
            self.cost
        } else {
            current_price
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCandidate {
    pub name: String,
    pub symbol: String,
    /// The tradable code shown to the user; may differ from `symbol`, which is
    /// often the tracked index.
    pub display_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<InstrumentKind>,
}

impl ScanCandidate {
    pub fn canonical_display_code(&self) -> String {
        canonical_code(&self.display_code)
    }

    pub fn kind_hint(&self) -> InstrumentKind {
        self.kind.unwrap_or(InstrumentKind::Index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_and_annotation() {
        assert_eq!(canonical_code("sz159509 (景顺)"), "159509");
        assert_eq!(canonical_code("159509 (景顺)"), "159509");
        assert_eq!(canonical_code("sh588000"), "588000");
        assert_eq!(canonical_code("SH588000"), "588000");
        assert_eq!(canonical_code("588000.SH"), "588000");
        assert_eq!(canonical_code("  512480 "), "512480");
        assert_eq!(canonical_code(""), "");
    }

    #[test]
    fn remembers_exchange_when_written() {
        let c = SecurityCode::parse("sz399006");
        assert_eq!(c.exchange, Some(Exchange::Shenzhen));
        assert_eq!(c.code, "399006");

        let c = SecurityCode::parse("000688.SH");
        assert_eq!(c.exchange, Some(Exchange::Shanghai));

        assert_eq!(SecurityCode::parse("515030").exchange, None);
    }

    #[test]
    fn fund_prefixes_override_index_hint() {
        assert_eq!(
            SecurityRef::classify("sz159819", InstrumentKind::Index).kind,
            InstrumentKind::Etf
        );
        assert_eq!(
            SecurityRef::classify("sh513500", InstrumentKind::Index).kind,
            InstrumentKind::Etf
        );
        assert_eq!(
            SecurityRef::classify("sh000990", InstrumentKind::Index).kind,
            InstrumentKind::Index
        );
        assert_eq!(
            SecurityRef::classify("sh000990", InstrumentKind::Etf).kind,
            InstrumentKind::Etf
        );
    }

    #[test]
    fn unset_cost_falls_back_to_price() {
        let p = HeldPosition {
            name: "STAR 50".to_string(),
            symbol: "sh588000".to_string(),
            cost: 0.0,
            principal: 4000.0,
            kind: InstrumentKind::Etf,
        };
        assert_eq!(p.resolved_cost(12.0), 12.0);
        assert_eq!(p.canonical_code(), "588000");

        let p = HeldPosition { cost: 10.0, ..p };
        assert_eq!(p.resolved_cost(12.0), 10.0);
    }
}
