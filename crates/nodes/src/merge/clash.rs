//! Key-collision policy and merge depth for combining two JSON objects.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::BinaryData;

/// Which side survives when both objects carry the same key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClashPolicy {
    /// Input 1 values always win.
    PreferInput1,
    /// Input 2 values win (the later merge argument overwrites).
    #[default]
    PreferInput2,
    /// Colliding keys are renamed `<key>1` / `<key>2` so nothing is overwritten.
    /// A suffixed name that is already in use gets a numbered tail.
    AddSuffix,
}

/// How deep a merge reaches into nested values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum MergeDepth {
    /// Nested objects are merged key by key, arrays index by index.
    #[default]
    #[serde(rename = "deepMerge")]
    Deep,
    /// Top-level assignment; nested values are replaced wholesale.
    #[serde(rename = "shallowMerge")]
    Shallow,
}

/// Clash policy plus merge depth, as configured under `options.clashHandling`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClashHandling {
    pub policy: ClashPolicy,
    pub depth: MergeDepth,
}

impl ClashPolicy {
    /// Turn the two inputs into a clash-free `(base, overlay)` pair: merging
    /// `overlay` into `base` yields the result the policy asks for.
    ///
    /// The outcome only depends on which argument is input 1, never on which
    /// object the caller later treats as the merge target.
    pub fn resolve(
        self,
        input1: &Map<String, Value>,
        input2: &Map<String, Value>,
    ) -> (Map<String, Value>, Map<String, Value>) {
        match self {
            Self::PreferInput2 => (input1.clone(), input2.clone()),
            Self::PreferInput1 => (input2.clone(), input1.clone()),
            Self::AddSuffix => {
                let renames = SuffixRenames::new(input1.keys(), input2.keys());
                (renames.apply(input1, INPUT_1), renames.apply(input2, INPUT_2))
            }
        }
    }
}

const INPUT_1: usize = 0;
const INPUT_2: usize = 1;

/// New names for the keys both sides share: `<key>1` on input 1 and
/// `<key>2` on input 2. A name already used by either side gets a numbered
/// tail (`<key>1_1`, `<key>1_2`, ...), so every key of the two renamed maps
/// is distinct.
struct SuffixRenames {
    by_input: [HashMap<String, String>; 2],
}

impl SuffixRenames {
    fn new<'a>(
        keys1: impl Iterator<Item = &'a String>,
        keys2: impl Iterator<Item = &'a String>,
    ) -> Self {
        let keys1: Vec<&String> = keys1.collect();
        let keys2: HashSet<&String> = keys2.collect();
        let mut taken: HashSet<String> = keys1
            .iter()
            .chain(keys2.iter())
            .map(|key| (*key).clone())
            .collect();

        let shared: Vec<&String> = keys1.into_iter().filter(|key| keys2.contains(key)).collect();
        let mut by_input: [HashMap<String, String>; 2] = Default::default();
        for (renames, suffix) in by_input.iter_mut().zip(["1", "2"]) {
            for key in &shared {
                let mut name = format!("{key}{suffix}");
                let mut n = 1;
                while taken.contains(&name) {
                    name = format!("{key}{suffix}_{n}");
                    n += 1;
                }
                taken.insert(name.clone());
                renames.insert((*key).clone(), name);
            }
        }
        Self { by_input }
    }

    fn apply<'a, V, M>(
        &self,
        entries: impl IntoIterator<Item = (&'a String, &'a V)>,
        input: usize,
    ) -> M
    where
        V: Clone + 'a,
        M: FromIterator<(String, V)>,
    {
        let renames = &self.by_input[input];
        entries
            .into_iter()
            .map(|(key, value)| {
                let key = renames.get(key).unwrap_or(key).clone();
                (key, value.clone())
            })
            .collect()
    }
}

impl MergeDepth {
    /// Merge `overlay` into `base`; on collision `overlay` wins.
    pub fn merge(
        self,
        mut base: Map<String, Value>,
        overlay: Map<String, Value>,
    ) -> Map<String, Value> {
        match self {
            Self::Shallow => base.extend(overlay),
            Self::Deep => {
                for (key, value) in overlay {
                    match base.get_mut(&key) {
                        Some(existing) => deep_merge(existing, value),
                        None => {
                            base.insert(key, value);
                        }
                    }
                }
            }
        }
        base
    }
}

/// Recursive merge: objects by key, arrays by index, anything else replaced.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => {
            for (index, value) in source.into_iter().enumerate() {
                match target.get_mut(index) {
                    Some(existing) => deep_merge(existing, value),
                    None => target.push(value),
                }
            }
        }
        (target, source) => *target = source,
    }
}

impl ClashHandling {
    /// Merge the json of an input 1 item with that of an input 2 item.
    pub fn merge_json(
        &self,
        input1: &Map<String, Value>,
        input2: &Map<String, Value>,
    ) -> Map<String, Value> {
        let (base, overlay) = self.policy.resolve(input1, input2);
        self.depth.merge(base, overlay)
    }

    /// Union of both binary maps. On a name collision the preferred input
    /// wins, or under `AddSuffix` both files are kept under suffixed names.
    pub fn merge_binary(
        &self,
        input1: &BTreeMap<String, BinaryData>,
        input2: &BTreeMap<String, BinaryData>,
    ) -> BTreeMap<String, BinaryData> {
        let (base, overlay) = match self.policy {
            ClashPolicy::PreferInput2 => (input1, input2),
            ClashPolicy::PreferInput1 => (input2, input1),
            ClashPolicy::AddSuffix => {
                let renames = SuffixRenames::new(input1.keys(), input2.keys());
                let mut merged: BTreeMap<String, BinaryData> = renames.apply(input1, INPUT_1);
                let renamed2: Vec<(String, BinaryData)> = renames.apply(input2, INPUT_2);
                merged.extend(renamed2);
                return merged;
            }
        };
        let mut merged = base.clone();
        merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}
