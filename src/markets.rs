use std::fmt;

/// Bet types graded by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Market {
    Moneyline,
    Spread,
    Total,
}

impl Market {
    pub const ALL: [Market; 3] = [Market::Moneyline, Market::Spread, Market::Total];

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Moneyline => "moneyline",
            Market::Spread => "spread",
            Market::Total => "total",
        }
    }

    pub fn parse(raw: &str) -> Option<Market> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "moneyline" => Some(Market::Moneyline),
            "spread" => Some(Market::Spread),
            "total" => Some(Market::Total),
            _ => None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickSide {
    Home,
    Away,
    Over,
    Under,
}

impl PickSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickSide::Home => "HOME",
            PickSide::Away => "AWAY",
            PickSide::Over => "OVER",
            PickSide::Under => "UNDER",
        }
    }

    pub fn parse(raw: &str) -> Option<PickSide> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HOME" => Some(PickSide::Home),
            "AWAY" => Some(PickSide::Away),
            "OVER" => Some(PickSide::Over),
            "UNDER" => Some(PickSide::Under),
            _ => None,
        }
    }
}

impl fmt::Display for PickSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pick string reduced to its structured form. Moneyline picks carry no
/// line; spread and total picks carry the numeric line from the pick text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPick {
    pub side: PickSide,
    pub line: Option<f64>,
}

impl NormalizedPick {
    /// Re-serialize into the canonical pick text. Normalizing the output
    /// yields an equivalent (side, line) pair.
    pub fn serialize(&self) -> String {
        match self.line {
            Some(line) => format!("{} {}", self.side.as_str(), line),
            None => self.side.as_str().to_string(),
        }
    }
}

/// Parse a free-text pick for the given market.
///
/// moneyline: `HOME` | `AWAY` (case-insensitive)
/// spread:    `HOME -3`, `AWAY +7.5`
/// total:     `Over 45.5`, `UNDER 8`
///
/// Anything malformed returns None; downstream treats that as a
/// non-gradeable pick, never as a loss.
pub fn normalize_pick(raw: &str, market: Market) -> Option<NormalizedPick> {
    // Upstream sources occasionally emit a unicode en-dash for the minus sign.
    let text = raw.trim().replace('\u{2013}', "-").to_ascii_uppercase();
    if text.is_empty() {
        return None;
    }

    match market {
        Market::Moneyline => {
            let side = PickSide::parse(&text)?;
            if !matches!(side, PickSide::Home | PickSide::Away) {
                return None;
            }
            Some(NormalizedPick { side, line: None })
        }
        Market::Spread => {
            let (side, token) = split_two_tokens(&text)?;
            if !matches!(side, PickSide::Home | PickSide::Away) {
                return None;
            }
            let line = parse_signed_line(token)?;
            Some(NormalizedPick {
                side,
                line: Some(line),
            })
        }
        Market::Total => {
            let (side, token) = split_two_tokens(&text)?;
            if !matches!(side, PickSide::Over | PickSide::Under) {
                return None;
            }
            let line = parse_line(token)?;
            Some(NormalizedPick {
                side,
                line: Some(line),
            })
        }
    }
}

fn split_two_tokens(text: &str) -> Option<(PickSide, &str)> {
    let mut tokens = text.split_whitespace();
    let side = PickSide::parse(tokens.next()?)?;
    let value = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }
    Some((side, value))
}

fn parse_line(token: &str) -> Option<f64> {
    let value = token.trim_start_matches('+').parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

// The stored line is negative iff the raw token carried a leading minus.
fn parse_signed_line(token: &str) -> Option<f64> {
    let value = parse_line(token)?;
    if token.starts_with('-') {
        Some(-value.abs())
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Market, NormalizedPick, PickSide, normalize_pick};

    #[test]
    fn moneyline_accepts_only_home_or_away() {
        let pick = normalize_pick("away", Market::Moneyline).expect("away should parse");
        assert_eq!(pick.side, PickSide::Away);
        assert_eq!(pick.line, None);
        assert!(normalize_pick("OVER", Market::Moneyline).is_none());
        assert!(normalize_pick("HOME -3", Market::Moneyline).is_none());
    }

    #[test]
    fn spread_sign_follows_raw_token() {
        let minus = normalize_pick("HOME -3", Market::Spread).expect("should parse");
        assert_eq!(minus.line, Some(-3.0));
        let plus = normalize_pick("away +7.5", Market::Spread).expect("should parse");
        assert_eq!(plus.side, PickSide::Away);
        assert_eq!(plus.line, Some(7.5));
        let en_dash = normalize_pick("HOME \u{2013}4.5", Market::Spread).expect("should parse");
        assert_eq!(en_dash.line, Some(-4.5));
    }

    #[test]
    fn malformed_picks_are_unparseable() {
        assert!(normalize_pick("HOME -3 -4", Market::Spread).is_none());
        assert!(normalize_pick("HOME abc", Market::Spread).is_none());
        assert!(normalize_pick("OVER 45.5", Market::Spread).is_none());
        assert!(normalize_pick("HOME 45.5", Market::Total).is_none());
        assert!(normalize_pick("", Market::Total).is_none());
    }

    #[test]
    fn serialize_round_trips() {
        for (raw, market) in [
            ("HOME", Market::Moneyline),
            ("AWAY -3", Market::Spread),
            ("home +2.5", Market::Spread),
            ("Over 45.5", Market::Total),
            ("UNDER 8", Market::Total),
        ] {
            let pick = normalize_pick(raw, market).expect("well-formed pick");
            let again = normalize_pick(&pick.serialize(), market).expect("serialized pick");
            assert_eq!(pick, again, "round trip failed for {raw}");
        }
    }

    #[test]
    fn serialize_moneyline_has_no_line() {
        let pick = NormalizedPick {
            side: PickSide::Home,
            line: None,
        };
        assert_eq!(pick.serialize(), "HOME");
    }
}
