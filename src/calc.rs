use serde::{Deserialize, Serialize};

/// Half-up rounding to the nearest 0.5: `Int(2*x + 0.5) / 2`.
pub fn round_nearest_half(x: f64) -> f64 {
    ((2.0 * x) + 0.5).floor() / 2.0
}

/// Half-up rounding to the nearest integer.
pub fn round_nearest(x: f64) -> f64 {
    (x + 0.5).floor()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOffRule {
    #[default]
    None,
    Ceiling,
    Floor,
    Nearest,
    NearestHalf,
}

impl RoundOffRule {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "ceiling" => Some(Self::Ceiling),
            "floor" => Some(Self::Floor),
            "nearest" => Some(Self::Nearest),
            "nearest_half" => Some(Self::NearestHalf),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ceiling => "ceiling",
            Self::Floor => "floor",
            Self::Nearest => "nearest",
            Self::NearestHalf => "nearest_half",
        }
    }
}

pub fn apply_round_off(value: f64, rule: RoundOffRule) -> f64 {
    match rule {
        RoundOffRule::None => value,
        RoundOffRule::Ceiling => value.ceil(),
        RoundOffRule::Floor => value.floor(),
        RoundOffRule::Nearest => round_nearest(value),
        RoundOffRule::NearestHalf => round_nearest_half(value),
    }
}

/// Division that treats an empty denominator as a zero result.
pub(crate) fn ratio_or_zero(num: f64, denom: f64) -> f64 {
    if denom > 0.0 {
        num / denom
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for CalcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CalcError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_half_rounds_quarters_up() {
        assert_eq!(round_nearest_half(23.75), 24.0);
        assert_eq!(round_nearest_half(23.74), 23.5);
        assert_eq!(round_nearest_half(23.25), 23.5);
        assert_eq!(round_nearest_half(23.24), 23.0);
        assert_eq!(round_nearest_half(0.0), 0.0);
    }

    #[test]
    fn nearest_half_is_idempotent() {
        for i in 0..400 {
            let x = i as f64 * 0.137;
            let once = round_nearest_half(x);
            assert_eq!(round_nearest_half(once), once, "x={}", x);
        }
    }

    #[test]
    fn apply_round_off_covers_every_rule() {
        assert_eq!(apply_round_off(7.3, RoundOffRule::None), 7.3);
        assert_eq!(apply_round_off(7.3, RoundOffRule::Ceiling), 8.0);
        assert_eq!(apply_round_off(7.7, RoundOffRule::Floor), 7.0);
        assert_eq!(apply_round_off(7.5, RoundOffRule::Nearest), 8.0);
        assert_eq!(apply_round_off(7.49, RoundOffRule::Nearest), 7.0);
        assert_eq!(apply_round_off(7.3, RoundOffRule::NearestHalf), 7.5);
        assert_eq!(apply_round_off(7.2, RoundOffRule::NearestHalf), 7.0);
    }

    #[test]
    fn round_off_rule_strings_match_storage_names() {
        for rule in [
            RoundOffRule::None,
            RoundOffRule::Ceiling,
            RoundOffRule::Floor,
            RoundOffRule::Nearest,
            RoundOffRule::NearestHalf,
        ] {
            assert_eq!(RoundOffRule::parse(rule.as_str()), Some(rule));
        }
        assert_eq!(RoundOffRule::parse("banker"), None);
    }
}
