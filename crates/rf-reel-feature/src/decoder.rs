//! Outcome Decoder — raw payload to typed mutations
//!
//! Decoding is pure. Problems that do not invalidate the whole payload are
//! logged and collected on `Outcome::diagnostics` instead of failing.

use rf_stage::ReplacementKind;

use crate::error::{EngineError, EngineResult};
use crate::outcome::{
    CreditTables, Mutation, Outcome, RawOutcome, RawReevaluation, RawSymbolPayout,
    ReplacementMap, RespinOutcome, RewardSymbol, SymbolAward, SymbolCreditMap,
};
use crate::symbols::{Credits, Symbol};

/// Modifier export type carrying a dedicated credit table
pub const SYMBOL_CREDIT_VALUES: &str = "symbol_credit_values";

/// Decode a JSON payload
pub fn decode_json(json: &str) -> EngineResult<Outcome> {
    let raw = RawOutcome::from_json(json)?;
    Ok(decode(&raw))
}

/// Decode a parsed payload
pub fn decode(raw: &RawOutcome) -> Outcome {
    let mut outcome = Outcome::new(raw.reels.clone());
    outcome.multiplier = raw.multiplier;
    outcome.wager_multiplier = raw.wager_multiplier;
    outcome.base_credits = raw.base_credits;

    let mut replacement = ReplacementMap::default();
    let mut tables = CreditTables::new();

    for (i, value) in raw.reevaluations.iter().enumerate() {
        let entry = match serde_json::from_value::<RawReevaluation>(value.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                let kind = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("<missing>");
                log::warn!("[Decoder] Skipping reevaluation {} ({}): {}", i, kind, e);
                outcome.diagnostics.push(EngineError::Payload(format!(
                    "reevaluation {i} of type {kind} skipped: {e}"
                )));
                continue;
            }
        };

        match entry {
            RawReevaluation::RetriggerAndMultiplyFromPickGameReevaluator {
                multiplier,
                free_spins,
            } => {
                outcome.multiplier = outcome.multiplier.saturating_mul(multiplier);
                if free_spins > 0 {
                    outcome.mutations.push(Mutation::SymbolAward(SymbolAward {
                        free_spins_awarded: free_spins,
                        ..Default::default()
                    }));
                }
            }
            RawReevaluation::SymbolPayoutOnPayline {
                reels,
                paytable,
                key_name,
                symbol_payouts,
                symbol_value_upgrade,
            } => {
                union_into(&mut tables, key_name.as_deref(), &symbol_payouts);
                let index = outcome.reevaluations.len() as u32;
                outcome.reevaluations.push(RespinOutcome {
                    index,
                    grid: reels,
                    paytable,
                    upgrades: symbol_value_upgrade.iter().map(|u| u.to_upgrade()).collect(),
                });
            }
            RawReevaluation::SymbolLandingAwardCredits {
                symbol_payouts,
                total_credits,
                key_name,
            } => {
                union_into(&mut tables, key_name.as_deref(), &symbol_payouts);
                let per_symbol = to_credit_map(&symbol_payouts);
                let total = total_credits.unwrap_or_else(|| per_symbol.values().copied().sum());
                outcome.mutations.push(Mutation::SymbolAward(SymbolAward {
                    per_symbol_credits: per_symbol,
                    total_credits_awarded: total,
                    free_spins_awarded: 0,
                }));
            }
            RawReevaluation::SymbolLandingAwardFreeSpins {
                free_spins,
                symbol_payouts,
                key_name,
            } => {
                union_into(&mut tables, key_name.as_deref(), &symbol_payouts);
                let per_symbol = to_credit_map(&symbol_payouts);
                let total = per_symbol.values().copied().sum();
                outcome.mutations.push(Mutation::SymbolAward(SymbolAward {
                    per_symbol_credits: per_symbol,
                    total_credits_awarded: total,
                    free_spins_awarded: free_spins,
                }));
            }
            RawReevaluation::SymbolReplaceMulti {
                replacement_symbols,
                mega_replacement_symbols,
            } => {
                merge_replacements(
                    &mut replacement.normal,
                    replacement_symbols,
                    "normal",
                    &mut outcome.diagnostics,
                );
                merge_replacements(
                    &mut replacement.mega,
                    mega_replacement_symbols,
                    "mega",
                    &mut outcome.diagnostics,
                );
            }
        }
    }

    // Dedicated exports are applied after every embedded list so they win on conflict
    let (dedicated, embedded): (Vec<_>, Vec<_>) = raw
        .modifier_exports
        .iter()
        .partition(|e| e.kind == SYMBOL_CREDIT_VALUES);
    for export in embedded {
        log::debug!(
            "[Decoder] Harvesting symbol_payouts from {} export",
            export.kind
        );
        union_into(&mut tables, export.key_name.as_deref(), &export.symbol_payouts);
    }
    for export in dedicated {
        union_into(&mut tables, export.key_name.as_deref(), &export.symbol_payouts);
    }

    if !replacement.is_empty() {
        outcome.mutations.insert(0, Mutation::ReplacementMap(replacement));
    }

    for up in &raw.symbol_value_upgrade {
        outcome
            .mutations
            .push(Mutation::SymbolValueUpgrade(up.to_upgrade()));
    }

    for reward in &raw.reward_symbols {
        outcome.mutations.push(Mutation::RewardSymbol(RewardSymbol {
            reel: reward.reel,
            position: reward.pos,
            symbol: reward.symbol.clone(),
        }));
    }

    outcome.credit_tables = tables;

    log::debug!(
        "[Decoder] Decoded outcome: {} mutations, {} reevaluations, {} diagnostics",
        outcome.mutations.len(),
        outcome.reevaluations.len(),
        outcome.diagnostics.len()
    );

    outcome
}

/// The single replacement target for `symbol`, preferring mega over normal
///
/// Fails closed: a missing map or key is a configuration error and no
/// replacement happens.
pub fn active_replacement(
    outcome: &Outcome,
    symbol: &Symbol,
) -> EngineResult<(Symbol, ReplacementKind)> {
    let Some(map) = outcome.replacement_map() else {
        log::warn!("[Decoder] No replacement map for {}", symbol);
        return Err(EngineError::configuration(format!(
            "outcome carries no replacement map for {symbol}"
        )));
    };

    if let Some(target) = map.mega.get(symbol) {
        return Ok((target.clone(), ReplacementKind::Mega));
    }
    if let Some(target) = map.normal.get(symbol) {
        return Ok((target.clone(), ReplacementKind::Normal));
    }

    log::warn!("[Decoder] Replacement map has no entry for {}", symbol);
    Err(EngineError::configuration(format!(
        "replacement map has no entry for {symbol}"
    )))
}

fn to_credit_map(payouts: &[RawSymbolPayout]) -> SymbolCreditMap {
    payouts
        .iter()
        .map(|p| (p.symbol_name.clone(), p.value))
        .collect()
}

fn union_into(tables: &mut CreditTables, key: Option<&str>, payouts: &[RawSymbolPayout]) {
    let key = key.unwrap_or("");
    for payout in payouts {
        tables.insert(key, payout.symbol_name.clone(), payout.value);
    }
}

fn merge_replacements(
    into: &mut std::collections::BTreeMap<Symbol, Symbol>,
    from: std::collections::BTreeMap<Symbol, Symbol>,
    label: &str,
    diagnostics: &mut Vec<EngineError>,
) {
    for (source, target) in from {
        match into.get(&source) {
            Some(existing) if *existing != target => {
                log::warn!(
                    "[Decoder] Conflicting {} replacement for {}: keeping {}, ignoring {}",
                    label,
                    source,
                    existing,
                    target
                );
                diagnostics.push(EngineError::configuration(format!(
                    "conflicting {label} replacement for {source}: {existing} vs {target}"
                )));
            }
            Some(_) => {}
            None => {
                into.insert(source, target);
            }
        }
    }
}

/// Total credits the awards of an outcome carry
pub fn award_total(outcome: &Outcome) -> Credits {
    outcome.awards().map(|a| a.total_credits_awarded).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Cell;

    const PAYLOAD: &str = r#"{
        "reels": [["H1","SC","A"],["MY","B","SC"],["A","A","A"]],
        "multiplier": 2,
        "base_credits": 40,
        "reevaluations": [
            {"type": "symbol_replace_multi",
             "replacement_symbols": {"MY": "SC"},
             "mega_replacement_symbols": {}},
            {"type": "symbol_payout_on_payline",
             "reels": [["H1","SC","A"],["MY","B","SC"],["SC","A","A"]],
             "paytable": "main",
             "symbol_payouts": [{"symbol_name": "SC", "value": 10}]},
            {"type": "mystery_wheel", "segments": 12},
            {"type": "symbol_landing_award_credits",
             "symbol_payouts": [{"symbol_name": "SC", "value": 10}, {"symbol_name": "SC_MINI", "value": 5}]},
            {"type": "retrigger_and_multiply_from_pick_game_reevaluator",
             "multiplier": 3, "free_spins": 5}
        ],
        "modifier_exports": [
            {"type": "symbol_credit_values", "key_name": "buffalo_base_payout",
             "symbol_payouts": [{"symbol_name": "SC", "value": 12}]},
            {"type": "jackpot_meter",
             "symbol_payouts": [{"symbol_name": "SC", "value": 11}]}
        ],
        "symbol_value_upgrade": [{"reel": 0, "pos": 1, "symbol": "SC", "before": 10, "after": 25}],
        "reward_symbols": [{"reel": 1, "pos": 2, "symbol": "SC"}]
    }"#;

    #[test]
    fn test_decode_full_payload() {
        let outcome = decode_json(PAYLOAD).unwrap();

        assert_eq!(outcome.multiplier, 6);
        assert_eq!(outcome.base_credits, Credits(40));
        assert_eq!(outcome.reevaluations.len(), 1);
        assert_eq!(outcome.reevaluations[0].paytable.as_deref(), Some("main"));
        assert_eq!(
            outcome.reevaluations[0].grid.get(Cell::new(2, 0)),
            Some(&Symbol::from("SC"))
        );

        let awards: Vec<_> = outcome.awards().collect();
        assert_eq!(awards.len(), 2);
        assert_eq!(awards[0].total_credits_awarded, Credits(15));
        assert_eq!(awards[1].free_spins_awarded, 5);

        assert_eq!(outcome.upgrades().count(), 1);
        assert_eq!(outcome.reward_symbols().count(), 1);
    }

    #[test]
    fn test_unsupported_reevaluation_is_skipped() {
        let outcome = decode_json(PAYLOAD).unwrap();
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].to_string().contains("mystery_wheel"));
    }

    #[test]
    fn test_credit_tables_union() {
        let outcome = decode_json(PAYLOAD).unwrap();
        let anon = outcome.credit_tables.anonymous().unwrap();
        // Embedded lists first, then the anonymous export overrides
        assert_eq!(anon.get(&Symbol::from("SC")), Some(&Credits(11)));
        assert_eq!(anon.get(&Symbol::from("SC_MINI")), Some(&Credits(5)));
        let keyed = outcome.credit_tables.get("buffalo_base_payout").unwrap();
        assert_eq!(keyed.get(&Symbol::from("SC")), Some(&Credits(12)));
    }

    #[test]
    fn test_dedicated_export_wins_over_later_embedded() {
        let json = r#"{
            "reels": [["SC"]],
            "modifier_exports": [
                {"type": "symbol_credit_values", "key_name": "buffalo_base_payout",
                 "symbol_payouts": [{"symbol_name": "SC", "value": 12}]},
                {"type": "jackpot_meter", "key_name": "buffalo_base_payout",
                 "symbol_payouts": [{"symbol_name": "SC", "value": 99},
                                    {"symbol_name": "SC_MINI", "value": 4}]}
            ]
        }"#;
        let outcome = decode_json(json).unwrap();
        let keyed = outcome.credit_tables.get("buffalo_base_payout").unwrap();
        assert_eq!(keyed.get(&Symbol::from("SC")), Some(&Credits(12)));
        assert_eq!(keyed.get(&Symbol::from("SC_MINI")), Some(&Credits(4)));
    }

    #[test]
    fn test_active_replacement_prefers_mega() {
        let json = r#"{
            "reels": [["MY"]],
            "reevaluations": [
                {"type": "symbol_replace_multi",
                 "replacement_symbols": {"MY": "SC"},
                 "mega_replacement_symbols": {"MY": "SC_MEGA"}}
            ]
        }"#;
        let outcome = decode_json(json).unwrap();
        let (target, kind) = active_replacement(&outcome, &"MY".into()).unwrap();
        assert_eq!(target, Symbol::from("SC_MEGA"));
        assert_eq!(kind, ReplacementKind::Mega);
    }

    #[test]
    fn test_active_replacement_fails_closed() {
        let outcome = decode_json(PAYLOAD).unwrap();
        assert!(matches!(
            active_replacement(&outcome, &"H1".into()),
            Err(EngineError::Configuration(_))
        ));

        let bare = decode_json(r#"{"reels": [["MY"]]}"#).unwrap();
        assert!(active_replacement(&bare, &"MY".into()).is_err());
    }

    #[test]
    fn test_conflicting_replacement_keeps_first() {
        let json = r#"{
            "reels": [["MY"]],
            "reevaluations": [
                {"type": "symbol_replace_multi", "replacement_symbols": {"MY": "SC"}},
                {"type": "symbol_replace_multi", "replacement_symbols": {"MY": "H1"}}
            ]
        }"#;
        let outcome = decode_json(json).unwrap();
        let (target, _) = active_replacement(&outcome, &"MY".into()).unwrap();
        assert_eq!(target, Symbol::from("SC"));
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(
            outcome
                .mutations
                .iter()
                .filter(|m| matches!(m, Mutation::ReplacementMap(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(matches!(
            decode_json(r#"{"reels": 5}"#),
            Err(EngineError::Payload(_))
        ));
    }

    #[test]
    fn test_award_total() {
        let outcome = decode_json(PAYLOAD).unwrap();
        assert_eq!(award_total(&outcome), Credits(15));
    }
}
