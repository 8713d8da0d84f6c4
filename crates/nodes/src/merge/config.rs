//! Resolution of raw node parameters into a typed [`MergeConfiguration`].
//!
//! Parameters arrive as the JSON object stored on the node definition, with
//! every expression already evaluated. Each mode only carries the
//! parameters it uses; anything missing or contradictory is reported as a
//! [`NodeError::Configuration`] naming the offending parameter.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::clash::{ClashHandling, ClashPolicy, MergeDepth};
use crate::NodeError;

// ---------------------------------------------------------------------------
// Typed configuration
// ---------------------------------------------------------------------------

/// Fully resolved configuration of one merge invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeConfiguration {
    /// All items of input 1, then input 2 (then further inputs).
    Append,
    /// Every combination of input 1 and input 2 items.
    Multiplex { clash: ClashHandling },
    /// Pair items by position.
    MatchPositions {
        include_unpaired: bool,
        clash: ClashHandling,
    },
    /// Pair items with equal field values.
    MatchFields(MatchFieldsConfig),
    /// Wait for both inputs, then emit one of them (or an empty item).
    ChooseBranch { output: ChooseBranchOutput },
    /// Single-property key comparison modes.
    KeyMatch(KeyMatchConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPair {
    pub input1: String,
    pub input2: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFieldsConfig {
    pub fields: Vec<FieldPair>,
    pub join: JoinMode,
    pub clash: ClashHandling,
    pub dot_notation: bool,
}

/// How matched and unmatched items of a field join are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Inner join.
    KeepMatches(OutputDataFrom),
    /// Anti-join.
    KeepNonMatches(OutputDataFrom),
    /// Left join.
    EnrichInput1,
    /// Right join.
    EnrichInput2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputDataFrom {
    #[default]
    Input1,
    Input2,
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChooseBranchOutput {
    Input1,
    Input2,
    #[default]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMatchConfig {
    pub mode: KeyMatchMode,
    pub property1: String,
    pub property2: String,
    pub dot_notation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatchMode {
    /// Keep input 1 items whose key appears in input 2.
    Keep,
    /// Keep input 1 items whose key does not appear in input 2.
    Remove,
    /// Copy matching input 2 fields onto input 1 items.
    MergeByKey(Overwrite),
}

/// When `mergeByKey` copies a field onto the input 1 item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Overwrite {
    #[default]
    #[serde(rename = "always")]
    Always,
    /// Only if the key is absent.
    #[serde(rename = "undefined")]
    IfUndefined,
    /// Only if the key is absent, null or the empty string.
    #[serde(rename = "blank")]
    IfBlank,
}

// ---------------------------------------------------------------------------
// Raw parameter shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Mode {
    #[default]
    Append,
    Multiplex,
    MatchPositions,
    MatchFields,
    ChooseBranch,
    KeepKeyMatches,
    RemoveKeyMatches,
    MergeByKey,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
enum RawJoinMode {
    KeepMatches,
    KeepNonMatches,
    EnrichInput1,
    EnrichInput2,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ChooseBranchMode {
    #[default]
    WaitForBoth,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClashHandling {
    resolve_clash: Option<ClashPolicy>,
    merge_mode: Option<MergeDepth>,
    values: Option<Box<RawClashHandling>>,
}

impl RawClashHandling {
    fn resolve(self) -> ClashHandling {
        if let Some(inner) = self.values {
            return inner.resolve();
        }
        ClashHandling {
            policy: self.resolve_clash.unwrap_or_default(),
            depth: self.merge_mode.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFieldPair {
    #[serde(default)]
    input1_field_name: String,
    #[serde(default)]
    input2_field_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMatchFields {
    List(Vec<RawFieldPair>),
    Wrapped { values: Vec<RawFieldPair> },
}

// ---------------------------------------------------------------------------
// Parameter access
// ---------------------------------------------------------------------------

/// Read-only view over a node's parameter object.
struct Parameters<'a> {
    raw: &'a Map<String, Value>,
}

impl<'a> Parameters<'a> {
    /// Look up a dotted path (`options.clashHandling`). `null` counts as unset.
    fn get(&self, path: &str) -> Option<&'a Value> {
        let mut segments = path.split('.');
        let mut current = self.raw.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        (!current.is_null()).then_some(current)
    }

    fn optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, NodeError> {
        self.get(path)
            .map(|value| {
                T::deserialize(value)
                    .map_err(|e| NodeError::configuration(path, e.to_string()))
            })
            .transpose()
    }

    fn required<T: DeserializeOwned>(&self, path: &str) -> Result<T, NodeError> {
        self.optional(path)?
            .ok_or_else(|| NodeError::configuration(path, "required parameter is missing"))
    }

    fn non_empty_string(&self, path: &str) -> Result<String, NodeError> {
        let value: String = self.required(path)?;
        if value.trim().is_empty() {
            return Err(NodeError::configuration(path, "must not be empty"));
        }
        Ok(value)
    }

    fn clash_handling(&self) -> Result<ClashHandling, NodeError> {
        Ok(self
            .optional::<RawClashHandling>("options.clashHandling")?
            .unwrap_or_default()
            .resolve())
    }

    fn dot_notation(&self) -> Result<bool, NodeError> {
        Ok(!self
            .optional::<bool>("options.disableDotNotation")?
            .unwrap_or(false))
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

impl MergeConfiguration {
    /// Resolve a configuration from the node's parameter object.
    ///
    /// `null` parameters are treated as an empty object, i.e. `append`.
    pub fn from_parameters(parameters: &Value) -> Result<Self, NodeError> {
        let empty = Map::new();
        let raw = match parameters {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return Err(NodeError::configuration(
                    "parameters",
                    "expected a JSON object",
                ))
            }
        };
        let params = Parameters { raw };

        let mode: Mode = params.optional("mode")?.unwrap_or_default();
        let config = match mode {
            Mode::Append => Self::Append,
            Mode::Multiplex => Self::Multiplex {
                clash: params.clash_handling()?,
            },
            Mode::MatchPositions => Self::MatchPositions {
                include_unpaired: params.optional("includeUnpaired")?.unwrap_or(false),
                clash: params.clash_handling()?,
            },
            Mode::MatchFields => Self::MatchFields(resolve_match_fields(&params)?),
            Mode::ChooseBranch => {
                let branch_mode: ChooseBranchMode =
                    params.optional("chooseBranchMode")?.unwrap_or_default();
                match branch_mode {
                    ChooseBranchMode::WaitForBoth => Self::ChooseBranch {
                        output: params.optional("output")?.unwrap_or_default(),
                    },
                }
            }
            Mode::KeepKeyMatches => Self::KeyMatch(resolve_key_match(&params, KeyMatchMode::Keep)?),
            Mode::RemoveKeyMatches => {
                Self::KeyMatch(resolve_key_match(&params, KeyMatchMode::Remove)?)
            }
            Mode::MergeByKey => {
                let overwrite = params.optional("overwrite")?.unwrap_or_default();
                Self::KeyMatch(resolve_key_match(&params, KeyMatchMode::MergeByKey(overwrite))?)
            }
        };
        Ok(config)
    }

    /// Parameter-style name of the mode, for logging.
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Multiplex { .. } => "multiplex",
            Self::MatchPositions { .. } => "matchPositions",
            Self::MatchFields(_) => "matchFields",
            Self::ChooseBranch { .. } => "chooseBranch",
            Self::KeyMatch(cfg) => match cfg.mode {
                KeyMatchMode::Keep => "keepKeyMatches",
                KeyMatchMode::Remove => "removeKeyMatches",
                KeyMatchMode::MergeByKey(_) => "mergeByKey",
            },
        }
    }
}

fn resolve_match_fields(params: &Parameters<'_>) -> Result<MatchFieldsConfig, NodeError> {
    let raw = match params.required::<RawMatchFields>("matchFields")? {
        RawMatchFields::List(list) | RawMatchFields::Wrapped { values: list } => list,
    };
    if raw.is_empty() {
        return Err(NodeError::configuration(
            "matchFields",
            "at least one pair of fields to match is required",
        ));
    }

    let mut fields = Vec::with_capacity(raw.len());
    for (index, pair) in raw.into_iter().enumerate() {
        if pair.input1_field_name.trim().is_empty() {
            return Err(NodeError::configuration(
                format!("matchFields[{index}].input1FieldName"),
                "field name must not be empty",
            ));
        }
        if pair.input2_field_name.trim().is_empty() {
            return Err(NodeError::configuration(
                format!("matchFields[{index}].input2FieldName"),
                "field name must not be empty",
            ));
        }
        fields.push(FieldPair {
            input1: pair.input1_field_name,
            input2: pair.input2_field_name,
        });
    }

    let output: Option<OutputDataFrom> = params.optional("outputDataFrom")?;
    let join = match params.optional("joinMode")?.unwrap_or(RawJoinMode::KeepMatches) {
        RawJoinMode::KeepMatches => JoinMode::KeepMatches(output.unwrap_or_default()),
        RawJoinMode::KeepNonMatches => JoinMode::KeepNonMatches(output.unwrap_or_default()),
        enrich @ (RawJoinMode::EnrichInput1 | RawJoinMode::EnrichInput2) => {
            if output.is_some() {
                return Err(NodeError::configuration(
                    "outputDataFrom",
                    "only applies to the keepMatches and keepNonMatches join modes",
                ));
            }
            if matches!(enrich, RawJoinMode::EnrichInput1) {
                JoinMode::EnrichInput1
            } else {
                JoinMode::EnrichInput2
            }
        }
    };

    Ok(MatchFieldsConfig {
        fields,
        join,
        clash: params.clash_handling()?,
        dot_notation: params.dot_notation()?,
    })
}

fn resolve_key_match(
    params: &Parameters<'_>,
    mode: KeyMatchMode,
) -> Result<KeyMatchConfig, NodeError> {
    Ok(KeyMatchConfig {
        mode,
        property1: params.non_empty_string("propertyName1")?,
        property2: params.non_empty_string("propertyName2")?,
        dot_notation: params.dot_notation()?,
    })
}
