//! The pairing strategies behind each merge mode.
//!
//! Every function takes fully materialised branches and returns the single
//! output stream. Input items are only read; merged items are new values.

use std::collections::HashMap;

use serde_json::Value;

use super::clash::ClashHandling;
use super::config::{
    ChooseBranchOutput, JoinMode, KeyMatchConfig, KeyMatchMode, MatchFieldsConfig,
    OutputDataFrom, Overwrite,
};
use super::key::{composite_key, FieldKey};
use super::provenance::{combine, lineage};
use crate::{InputBranch, Item};

const INPUT_1: usize = 0;
const INPUT_2: usize = 1;

/// Merge the `i`-th item of input 1 with the `j`-th item of input 2.
fn merge_pair(input1: &[Item], i: usize, input2: &[Item], j: usize, clash: &ClashHandling) -> Item {
    let (a, b) = (&input1[i], &input2[j]);
    Item {
        json: clash.merge_json(&a.json, &b.json),
        binary: clash.merge_binary(&a.binary, &b.binary),
        paired_item: combine(&[&lineage(a, INPUT_1, i), &lineage(b, INPUT_2, j)]),
    }
}

fn pick(items: &[Item], indices: impl IntoIterator<Item = usize>) -> Vec<Item> {
    indices.into_iter().map(|i| items[i].clone()).collect()
}

// ---------------------------------------------------------------------------
// append / multiplex / matchPositions / chooseBranch
// ---------------------------------------------------------------------------

/// Every branch in order, items untouched.
pub fn append(branches: impl IntoIterator<Item = InputBranch>) -> Vec<Item> {
    branches.into_iter().flatten().collect()
}

/// Cross join, input 1 major.
pub fn multiplex(input1: &[Item], input2: &[Item], clash: &ClashHandling) -> Vec<Item> {
    let mut out = Vec::with_capacity(input1.len() * input2.len());
    for i in 0..input1.len() {
        for j in 0..input2.len() {
            out.push(merge_pair(input1, i, input2, j, clash));
        }
    }
    out
}

/// Pair items sharing an index. Leftovers of the longer input follow the
/// pairs, unchanged, when `include_unpaired` is set.
pub fn match_positions(
    input1: &[Item],
    input2: &[Item],
    include_unpaired: bool,
    clash: &ClashHandling,
) -> Vec<Item> {
    let paired = input1.len().min(input2.len());
    let mut out: Vec<Item> = (0..paired)
        .map(|i| merge_pair(input1, i, input2, i, clash))
        .collect();

    if include_unpaired {
        let longer = if input1.len() > paired { input1 } else { input2 };
        out.extend_from_slice(&longer[paired..]);
    }
    out
}

pub fn choose_branch(input1: Vec<Item>, input2: Vec<Item>, output: ChooseBranchOutput) -> Vec<Item> {
    match output {
        ChooseBranchOutput::Input1 => input1,
        ChooseBranchOutput::Input2 => input2,
        ChooseBranchOutput::Empty => vec![Item::empty()],
    }
}

// ---------------------------------------------------------------------------
// matchFields
// ---------------------------------------------------------------------------

/// Field join between the two inputs. Each input 1 item may match any
/// number of input 2 items; every match is its own pair.
pub fn match_fields(input1: &[Item], input2: &[Item], config: &MatchFieldsConfig) -> Vec<Item> {
    let keys1: Vec<FieldKey> = input1
        .iter()
        .map(|item| {
            composite_key(
                &item.json,
                config.fields.iter().map(|f| f.input1.as_str()),
                config.dot_notation,
            )
        })
        .collect();
    let keys2: Vec<FieldKey> = input2
        .iter()
        .map(|item| {
            composite_key(
                &item.json,
                config.fields.iter().map(|f| f.input2.as_str()),
                config.dot_notation,
            )
        })
        .collect();

    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (j, key) in keys2.iter().enumerate() {
        if let Some(key) = key.as_key() {
            index.entry(key).or_default().push(j);
        }
    }

    // matches1[i]: input 2 positions paired with input 1 item i (and the
    // inverse for input 2), both in ascending order.
    let matches1: Vec<Vec<usize>> = keys1
        .iter()
        .map(|key| {
            key.as_key()
                .and_then(|k| index.get(k))
                .cloned()
                .unwrap_or_default()
        })
        .collect();
    let mut matches2: Vec<Vec<usize>> = vec![Vec::new(); input2.len()];
    for (i, js) in matches1.iter().enumerate() {
        for &j in js {
            matches2[j].push(i);
        }
    }

    let matched1 = |i: &usize| !matches1[*i].is_empty();
    let matched2 = |j: &usize| !matches2[*j].is_empty();
    let clash = &config.clash;

    match config.join {
        JoinMode::KeepMatches(from) => match from {
            OutputDataFrom::Input1 => pick(input1, (0..input1.len()).filter(matched1)),
            OutputDataFrom::Input2 => pick(input2, (0..input2.len()).filter(matched2)),
            OutputDataFrom::Both => matches1
                .iter()
                .enumerate()
                .flat_map(|(i, js)| js.iter().map(move |&j| (i, j)))
                .map(|(i, j)| merge_pair(input1, i, input2, j, clash))
                .collect(),
        },
        JoinMode::KeepNonMatches(from) => {
            let unmatched1 = || pick(input1, (0..input1.len()).filter(|i| !matched1(i)));
            let unmatched2 = || pick(input2, (0..input2.len()).filter(|j| !matched2(j)));
            match from {
                OutputDataFrom::Input1 => unmatched1(),
                OutputDataFrom::Input2 => unmatched2(),
                OutputDataFrom::Both => {
                    let mut out = unmatched1();
                    out.extend(unmatched2());
                    out
                }
            }
        }
        JoinMode::EnrichInput1 => {
            let mut out = Vec::with_capacity(input1.len());
            for (i, js) in matches1.iter().enumerate() {
                if js.is_empty() {
                    out.push(input1[i].clone());
                }
                for &j in js {
                    out.push(merge_pair(input1, i, input2, j, clash));
                }
            }
            out
        }
        JoinMode::EnrichInput2 => {
            let mut out = Vec::with_capacity(input2.len());
            for (j, is) in matches2.iter().enumerate() {
                if is.is_empty() {
                    out.push(input2[j].clone());
                }
                for &i in is {
                    out.push(merge_pair(input1, i, input2, j, clash));
                }
            }
            out
        }
    }
}

// ---------------------------------------------------------------------------
// keepKeyMatches / removeKeyMatches / mergeByKey
// ---------------------------------------------------------------------------

/// Single-property comparison against input 2. When several input 2 items
/// share a key, the last one is used.
pub fn key_match(input1: &[Item], input2: &[Item], config: &KeyMatchConfig) -> Vec<Item> {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (j, item) in input2.iter().enumerate() {
        if let FieldKey::Key(key) =
            composite_key(&item.json, [config.property2.as_str()], config.dot_notation)
        {
            index.insert(key, j);
        }
    }

    let mut out = Vec::new();
    for (i, item) in input1.iter().enumerate() {
        let key = composite_key(&item.json, [config.property1.as_str()], config.dot_notation);
        let found = key.as_key().and_then(|k| index.get(k)).copied();

        match (config.mode, found) {
            (KeyMatchMode::Keep, Some(_)) => out.push(item.clone()),
            (KeyMatchMode::Keep, None) => {}
            (KeyMatchMode::Remove, Some(_)) => {}
            (KeyMatchMode::Remove, None) => out.push(item.clone()),
            (KeyMatchMode::MergeByKey(overwrite), Some(j)) => {
                out.push(copy_fields(item, i, &input2[j], j, &config.property2, overwrite));
            }
            (KeyMatchMode::MergeByKey(_), None) => {
                // Items without a usable key are dropped; keyed items with
                // no partner pass through unchanged.
                if matches!(key, FieldKey::Key(_)) {
                    out.push(item.clone());
                }
            }
        }
    }
    out
}

/// Clone `target` and copy `source`'s fields onto it per `overwrite`.
fn copy_fields(
    target: &Item,
    target_index: usize,
    source: &Item,
    source_index: usize,
    skip_key: &str,
    overwrite: Overwrite,
) -> Item {
    let mut merged = target.clone();
    for (key, value) in &source.json {
        if key == skip_key {
            continue;
        }
        let write = match overwrite {
            Overwrite::Always => true,
            Overwrite::IfUndefined => !merged.json.contains_key(key),
            Overwrite::IfBlank => match merged.json.get(key) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            },
        };
        if write {
            merged.json.insert(key.clone(), value.clone());
        }
    }
    merged.paired_item = combine(&[
        &lineage(target, INPUT_1, target_index),
        &lineage(source, INPUT_2, source_index),
    ]);
    merged
}
