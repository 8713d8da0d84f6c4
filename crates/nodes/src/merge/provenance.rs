//! Provenance (`pairedItem`) bookkeeping for merged items.

use std::collections::HashSet;

use crate::{Item, PairedItem};

/// Union of several provenance lists: stable order (earlier lists first),
/// duplicates dropped.
pub fn combine(sources: &[&[PairedItem]]) -> Vec<PairedItem> {
    let mut seen = HashSet::new();
    sources
        .iter()
        .flat_map(|list| list.iter().copied())
        .filter(|paired| seen.insert(*paired))
        .collect()
}

/// Provenance an item contributes to a merge.
///
/// Items without provenance of their own are attributed to their position
/// on the merge input so the merged item still traces back to them.
pub fn lineage(item: &Item, input: usize, index: usize) -> Vec<PairedItem> {
    if item.paired_item.is_empty() {
        vec![PairedItem::new(input, index)]
    } else {
        item.paired_item.clone()
    }
}
