//! Lead deduplication
//!
//! Walk the stored leads followed by the incoming ones, keyed by lowercase
//! profile URL. A key keeps the position of its first occurrence in that
//! walk; its content is the last record seen with that key. Ids stay unique:
//! a lead whose id is already held by an earlier lead gets a new one.

use std::collections::{HashMap, HashSet};

use crate::domain::{LeadRecord, ensure_unique_id};

/// Merge `incoming` into `existing` (first-seen position, last-write-wins content)
pub fn merge_leads(existing: Vec<LeadRecord>, incoming: &[LeadRecord]) -> Vec<LeadRecord> {
    let mut merged: Vec<LeadRecord> = Vec::with_capacity(existing.len() + incoming.len());
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(merged.capacity());

    for lead in existing.into_iter().chain(incoming.iter().cloned()) {
        let key = lead.dedupe_key();
        match positions.get(&key) {
            Some(&pos) => merged[pos] = lead,
            None => {
                positions.insert(key, merged.len());
                merged.push(lead);
            }
        }
    }

    let mut ids: HashSet<String> = HashSet::with_capacity(merged.len());
    for lead in &mut merged {
        if ids.contains(&lead.id) {
            lead.id = ensure_unique_id(lead.id.clone(), "lead", &lead.full_name, |id| ids.contains(id));
        }
        ids.insert(lead.id.clone());
    }

    merged
}
