use crate::domain::instrument::{HeldPosition, ScanCandidate};
use crate::domain::recommendation::RecommendationEntry;
use crate::domain::signal::{Action, SignalResult};
use std::collections::HashSet;

pub const DIGEST_SIZE: usize = 5;
/// Raw score a scan candidate needs before it is recommended.
pub const CANDIDATE_MIN_SCORE: u8 = 80;
/// Added to the sort key of held positions flagged SELL so stop-loss alerts
/// outrank fresh buy signals.
pub const SELL_ALERT_BONUS: u16 = 15;

/// Held entries are always emitted, whatever their score.
pub fn holding_entry(position: &HeldPosition, signal: &SignalResult) -> RecommendationEntry {
    let bonus = if signal.action == Action::Sell {
        SELL_ALERT_BONUS
    } else {
        0
    };
    RecommendationEntry {
        name: position.name.clone(),
        code: position.symbol.clone(),
        signal: signal.label,
        action: signal.action,
        score: signal.score,
        rank_score: u16::from(signal.score) + bonus,
        is_holding: true,
        pct_change: signal.pct_change,
    }
}

/// `None` when the candidate is not strong enough to recommend.
pub fn candidate_entry(
    candidate: &ScanCandidate,
    signal: &SignalResult,
) -> Option<RecommendationEntry> {
    (signal.score >= CANDIDATE_MIN_SCORE).then(|| RecommendationEntry {
        name: candidate.name.clone(),
        code: candidate.display_code.clone(),
        signal: signal.label,
        action: signal.action,
        score: signal.score,
        rank_score: u16::from(signal.score),
        is_holding: false,
        pct_change: signal.pct_change,
    })
}

/// Canonical codes of every held position, whether or not its data resolved.
pub fn held_codes(positions: &[HeldPosition]) -> HashSet<String> {
    positions.iter().map(HeldPosition::canonical_code).collect()
}

pub fn is_held(candidate: &ScanCandidate, held: &HashSet<String>) -> bool {
    held.contains(&candidate.canonical_display_code())
}

/// Sorts descending by `rank_score`, keeping encounter order for ties, and
/// returns the sorted list together with its top `DIGEST_SIZE` prefix.
pub fn rank(
    mut entries: Vec<RecommendationEntry>,
) -> (Vec<RecommendationEntry>, Vec<RecommendationEntry>) {
    // `sort_by` is stable.
    entries.sort_by(|a, b| b.rank_score.cmp(&a.rank_score));
    let digest = entries.iter().take(DIGEST_SIZE).cloned().collect();
    (entries, digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::InstrumentKind;
    use crate::domain::signal::TrendLabel;

    fn signal(score: u8, action: Action) -> SignalResult {
        SignalResult {
            price: 1.0,
            pct_change: 0.5,
            label: TrendLabel::MildUptrend,
            score,
            action,
            volume_ratio: 1.0,
        }
    }

    fn position(symbol: &str) -> HeldPosition {
        HeldPosition {
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            cost: 0.0,
            principal: 0.0,
            kind: InstrumentKind::Etf,
        }
    }

    fn candidate(name: &str, display_code: &str) -> ScanCandidate {
        ScanCandidate {
            name: name.to_string(),
            symbol: format!("sh{display_code}"),
            display_code: display_code.to_string(),
            kind: None,
        }
    }

    #[test]
    fn sell_bonus_only_touches_sort_key() {
        let e = holding_entry(&position("sh588000"), &signal(85, Action::Sell));
        assert_eq!(e.score, 85);
        assert_eq!(e.rank_score, 100);
        assert!(e.is_holding);

        let e = holding_entry(&position("sh588000"), &signal(40, Action::Hold));
        assert_eq!(e.rank_score, 40);
    }

    #[test]
    fn candidate_floor() {
        assert!(candidate_entry(&candidate("a", "512480"), &signal(79, Action::Hold)).is_none());
        let e = candidate_entry(&candidate("a", "512480"), &signal(80, Action::Buy)).unwrap();
        assert_eq!(e.code, "512480");
        assert!(!e.is_holding);
    }

    #[test]
    fn held_code_excludes_other_formats() {
        let held = held_codes(&[position("sh588000")]);
        assert!(is_held(&candidate("STAR 50", "588000"), &held));
        assert!(is_held(&candidate("STAR 50", "588000 (note)"), &held));
        assert!(!is_held(&candidate("Chips", "512480"), &held));
    }

    #[test]
    fn ties_keep_encounter_order_and_digest_is_capped() {
        let mut entries = Vec::new();
        for (i, score) in [90u8, 100, 90, 85, 90, 100, 80].into_iter().enumerate() {
            let c = candidate(&format!("c{i}"), &format!("51000{i}"));
            entries.push(candidate_entry(&c, &signal(score, Action::Buy)).unwrap());
        }

        let (sorted, digest) = rank(entries);
        let names: Vec<&str> = sorted.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c1", "c5", "c0", "c2", "c4", "c3", "c6"]);
        assert_eq!(digest.len(), 5);
        assert_eq!(digest[..], sorted[..5]);
    }

    #[test]
    fn digest_shorter_than_five() {
        let c = candidate("only", "512480");
        let (sorted, digest) = rank(vec![candidate_entry(&c, &signal(90, Action::Buy)).unwrap()]);
        assert_eq!(sorted.len(), 1);
        assert_eq!(digest.len(), 1);
        assert!(rank(vec![]).1.is_empty());
    }
}
