use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tilemint::{GeneratedIdentifier, LastIssued, LookupPredicate, LotSummary, Side};

use crate::like;

/// The persisted history: every lot table with its units, and the lot
/// summaries in insertion order (oldest first).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Records {
    pub lots: BTreeMap<String, Vec<GeneratedIdentifier>>,
    pub summaries: Vec<LotSummary>,
}

impl Records {
    /// Newest front summary of `customer` whose terminal identifier matches
    /// `predicate`.
    pub fn find_last_issued(&self, customer: &str, predicate: &LookupPredicate) -> Option<LastIssued> {
        self.summaries
            .iter()
            .rev()
            .find(|s| {
                s.side == Side::Front
                    && s.customer == customer
                    && like(predicate.as_str(), &s.terminal)
            })
            .map(|s| LastIssued {
                lot: s.lot.clone(),
                terminal: s.terminal.clone(),
                serial: Some(s.final_serial.clone()),
            })
    }

    /// The lot holding `candidate`, searched in the newest lot of
    /// `customer` whose first identifier has `length` characters and sorts at
    /// or before `candidate`.
    pub fn historical_duplicate(&self, length: usize, customer: &str, candidate: &str) -> Option<String> {
        let summary = self.summaries.iter().rev().find(|s| {
            s.customer == customer
                && s.first.chars().count() == length
                && s.first.as_str() <= candidate
        })?;
        self.lots
            .get(&summary.lot)
            .is_some_and(|units| units.iter().any(|unit| unit.holds(candidate)))
            .then(|| summary.lot.clone())
    }

    /// Creates the lot table if it does not exist, then appends.
    pub fn append_batch(&mut self, lot: &str, units: &[GeneratedIdentifier]) {
        self.lots
            .entry(lot.to_owned())
            .or_default()
            .extend_from_slice(units);
    }

    pub fn push_summary(&mut self, summary: LotSummary) {
        self.summaries.push(summary);
    }

    /// Applies the writes staged in `staged`, in order.
    pub fn merge(&mut self, staged: Records) {
        for (lot, units) in staged.lots {
            self.lots.entry(lot).or_default().extend(units);
        }
        self.summaries.extend(staged.summaries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(tiles: &[&str]) -> GeneratedIdentifier {
        GeneratedIdentifier {
            primary: tiles[0].to_owned(),
            tile_fields: tiles.iter().map(|t| (*t).to_owned()).collect(),
            ..Default::default()
        }
    }

    fn summary(lot: &str, customer: &str, side: Side, first: &str, terminal: &str) -> LotSummary {
        LotSummary {
            lot: lot.into(),
            customer: customer.into(),
            product_name: "P-TOP".into(),
            side,
            first: first.into(),
            terminal: terminal.into(),
            final_serial: format!("{lot}-serial"),
            count: 1,
            created_date: String::new(),
            created_time: String::new(),
        }
    }

    #[test]
    fn last_issued_is_newest_front_match() {
        let mut records = Records::default();
        records.push_summary(summary("L1", "C1", Side::Front, "AB001", "AB009"));
        records.push_summary(summary("L2", "C1", Side::Front, "AB010", "AB019"));
        records.push_summary(summary("BL2", "C1", Side::Back, "AB010", "AB019"));
        records.push_summary(summary("L3", "C2", Side::Front, "AB100", "AB109"));
        records.push_summary(summary("L4", "C1", Side::Front, "XY001", "XY009"));

        let found = records
            .find_last_issued("C1", &LookupPredicate::new("AB%"))
            .unwrap();
        assert_eq!(found.lot, "L2");
        assert_eq!(found.serial.as_deref(), Some("L2-serial"));

        assert!(records
            .find_last_issued("C3", &LookupPredicate::new("%"))
            .is_none());
    }

    #[test]
    fn duplicate_scan_uses_newest_eligible_lot() {
        let mut records = Records::default();
        records.append_batch("L1", &[unit(&["AB001", "Q1"]), unit(&["AB002", "Q2"])]);
        records.push_summary(summary("L1", "C1", Side::Front, "AB001", "Q2"));
        records.append_batch("L2", &[unit(&["AB100"])]);
        records.push_summary(summary("L2", "C1", Side::Front, "AB100", "AB100"));

        // L2 sorts after the candidate, so L1 is scanned
        assert_eq!(records.historical_duplicate(5, "C1", "AB002"), Some("L1".into()));
        // any tile field counts
        assert_eq!(records.historical_duplicate(2, "C1", "Q2"), None);
        assert_eq!(records.historical_duplicate(5, "C1", "AB003"), None);
        assert_eq!(records.historical_duplicate(5, "C2", "AB002"), None);
        assert_eq!(records.historical_duplicate(6, "C1", "AB002"), None);
    }

    #[test]
    fn append_creates_then_extends() {
        let mut records = Records::default();
        records.append_batch("L1", &[unit(&["A"])]);
        records.append_batch("L1", &[unit(&["B"])]);
        assert_eq!(records.lots["L1"].len(), 2);

        let mut staged = Records::default();
        staged.append_batch("L1", &[unit(&["C"])]);
        staged.append_batch("L2", &[unit(&["D"])]);
        records.merge(staged);
        assert_eq!(records.lots["L1"].len(), 3);
        assert_eq!(records.lots["L2"].len(), 1);
    }
}
