//! The `Merge` node: combines the items of two (or more) input branches
//! into a single output stream.
//!
//! Configuration is resolved once per invocation from the node parameters
//! ([`MergeConfiguration::from_parameters`]); [`execute`] then runs exactly
//! one pairing strategy over the materialised branches.

pub mod clash;
pub mod config;
pub mod key;
pub mod provenance;
pub mod strategies;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{traits::ExecutionContext, ExecutableNode, Item, NodeError, NodeInputs};

pub use clash::{ClashHandling, ClashPolicy, MergeDepth};
pub use config::{
    ChooseBranchOutput, FieldPair, JoinMode, KeyMatchConfig, KeyMatchMode, MatchFieldsConfig,
    MergeConfiguration, OutputDataFrom, Overwrite,
};

/// Run the strategy selected by `config`. Missing branches count as empty.
pub fn execute(config: &MergeConfiguration, inputs: NodeInputs) -> Vec<Item> {
    let mut branches = inputs.into_iter();
    let input1 = branches.next().unwrap_or_default();
    let input2 = branches.next().unwrap_or_default();

    match config {
        MergeConfiguration::Append => {
            strategies::append([input1, input2].into_iter().chain(branches))
        }
        MergeConfiguration::Multiplex { clash } => strategies::multiplex(&input1, &input2, clash),
        MergeConfiguration::MatchPositions {
            include_unpaired,
            clash,
        } => strategies::match_positions(&input1, &input2, *include_unpaired, clash),
        MergeConfiguration::MatchFields(cfg) => strategies::match_fields(&input1, &input2, cfg),
        MergeConfiguration::ChooseBranch { output } => {
            strategies::choose_branch(input1, input2, *output)
        }
        MergeConfiguration::KeyMatch(cfg) => strategies::key_match(&input1, &input2, cfg),
    }
}

/// Node type `merge`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeNode;

#[async_trait]
impl ExecutableNode for MergeNode {
    #[instrument(skip_all, fields(node_id = %ctx.node_id))]
    async fn execute(
        &self,
        inputs: NodeInputs,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Item>, NodeError> {
        let config = MergeConfiguration::from_parameters(&ctx.parameters)?;
        let sizes: Vec<usize> = inputs.iter().map(Vec::len).collect();

        let output = execute(&config, inputs);
        debug!(
            mode = config.mode_name(),
            ?sizes,
            produced = output.len(),
            "merged input branches"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PairedItem;
    use serde_json::{json, Value};

    fn branch(input: usize, values: Vec<Value>) -> Vec<Item> {
        Item::branch_from_values(input, values)
    }

    fn resolve(parameters: Value) -> MergeConfiguration {
        MergeConfiguration::from_parameters(&parameters).expect("valid parameters")
    }

    fn jsons(items: &[Item]) -> Vec<Value> {
        items.iter().map(|i| Value::Object(i.json.clone())).collect()
    }

    fn match_on_id(join_mode: &str, extra: Value) -> MergeConfiguration {
        let mut params = json!({
            "mode": "matchFields",
            "matchFields": [{ "input1FieldName": "id", "input2FieldName": "id" }],
            "joinMode": join_mode
        });
        if let (Some(p), Some(e)) = (params.as_object_mut(), extra.as_object()) {
            p.extend(e.clone());
        }
        resolve(params)
    }

    // ------------------------------------------------------------------
    // append
    // ------------------------------------------------------------------

    #[test]
    fn append_concatenates_all_branches_in_order() {
        let a = branch(0, vec![json!({ "a": 1 }), json!({ "a": 2 })]);
        let b = branch(1, vec![json!({ "b": 1 })]);
        let c = branch(2, vec![json!({ "c": 1 })]);

        let out = execute(&MergeConfiguration::Append, vec![a.clone(), b.clone(), c.clone()]);

        assert_eq!(out.len(), 4);
        assert_eq!(out[..2], a[..]);
        assert_eq!(out[2], b[0]);
        assert_eq!(out[3], c[0]);
    }

    // ------------------------------------------------------------------
    // multiplex
    // ------------------------------------------------------------------

    #[test]
    fn multiplex_is_a_cross_join_input1_major() {
        let a = branch(0, vec![json!({ "a": 1 }), json!({ "a": 2 })]);
        let b = branch(1, vec![json!({ "b": 1 }), json!({ "b": 2 }), json!({ "b": 3 })]);

        let out = execute(&resolve(json!({ "mode": "multiplex" })), vec![a, b]);

        assert_eq!(out.len(), 6);
        assert_eq!(Value::Object(out[1].json.clone()), json!({ "a": 1, "b": 2 }));
        assert_eq!(Value::Object(out[3].json.clone()), json!({ "a": 2, "b": 1 }));
        for (n, item) in out.iter().enumerate() {
            assert_eq!(
                item.paired_item,
                vec![PairedItem::new(0, n / 3), PairedItem::new(1, n % 3)]
            );
        }
    }

    #[test]
    fn multiplex_with_an_empty_branch_yields_nothing() {
        let a = branch(0, vec![json!({ "a": 1 })]);
        let config = resolve(json!({ "mode": "multiplex" }));
        assert!(execute(&config, vec![a.clone(), vec![]]).is_empty());
        assert!(execute(&config, vec![vec![], a]).is_empty());
        assert!(execute(&config, vec![]).is_empty());
    }

    // ------------------------------------------------------------------
    // matchPositions
    // ------------------------------------------------------------------

    #[test]
    fn match_positions_appends_unpaired_leftovers() {
        let a = branch(0, vec![json!({ "a": 0 }), json!({ "a": 1 }), json!({ "a": 2 })]);
        let b = branch(1, vec![json!({ "b": 0 }), json!({ "b": 1 })]);

        let out = execute(
            &resolve(json!({ "mode": "matchPositions", "includeUnpaired": true })),
            vec![a.clone(), b],
        );

        assert_eq!(
            jsons(&out),
            vec![json!({ "a": 0, "b": 0 }), json!({ "a": 1, "b": 1 }), json!({ "a": 2 })]
        );
        assert_eq!(out[1].paired_item, vec![PairedItem::new(0, 1), PairedItem::new(1, 1)]);
        assert_eq!(out[2], a[2]);
    }

    #[test]
    fn match_positions_without_unpaired_stops_at_shorter_branch() {
        let a = branch(0, vec![json!({ "a": 0 }), json!({ "a": 1 }), json!({ "a": 2 })]);
        let b = branch(1, vec![json!({ "b": 0 })]);
        let out = execute(&resolve(json!({ "mode": "matchPositions" })), vec![a, b]);
        assert_eq!(jsons(&out), vec![json!({ "a": 0, "b": 0 })]);
    }

    #[test]
    fn match_positions_with_one_empty_branch() {
        let b = branch(1, vec![json!({ "b": 0 }), json!({ "b": 1 })]);

        let out = execute(
            &resolve(json!({ "mode": "matchPositions", "includeUnpaired": true })),
            vec![vec![], b.clone()],
        );
        assert_eq!(out, b);

        let out = execute(&resolve(json!({ "mode": "matchPositions" })), vec![vec![], b]);
        assert!(out.is_empty());
    }

    #[test]
    fn match_positions_unions_binary() {
        let file = |data: &str| crate::BinaryData {
            data: data.into(),
            mime_type: "application/pdf".into(),
            file_name: Some(format!("{data}.pdf")),
            file_extension: Some("pdf".into()),
        };
        let a = vec![Item::from_json(json!({ "a": 1 })).with_binary("invoice", file("inv"))];
        let b = vec![Item::from_json(json!({ "b": 1 })).with_binary("receipt", file("rec"))];

        let out = execute(&resolve(json!({ "mode": "matchPositions" })), vec![a, b]);

        assert_eq!(out[0].binary.len(), 2);
        assert_eq!(
            out[0].paired_item,
            vec![PairedItem::new(0, 0), PairedItem::new(1, 0)]
        );
    }

    // ------------------------------------------------------------------
    // matchFields
    // ------------------------------------------------------------------

    #[test]
    fn keep_matches_single_pair_references_both_sources() {
        let a = branch(0, vec![json!({ "id": 7, "name": "a" })]);
        let b = branch(1, vec![json!({ "id": "7", "email": "e" })]);

        let out = execute(
            &match_on_id("keepMatches", json!({ "outputDataFrom": "both" })),
            vec![a, b],
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].paired_item, vec![PairedItem::new(0, 0), PairedItem::new(1, 0)]);
        assert_eq!(
            Value::Object(out[0].json.clone()),
            json!({ "id": "7", "name": "a", "email": "e" })
        );
    }

    #[test]
    fn keep_matches_is_a_full_join_not_first_match() {
        let a = branch(0, vec![json!({ "id": 1 }), json!({ "id": 2 })]);
        let b = branch(1, vec![json!({ "id": 1, "n": "x" }), json!({ "id": 1, "n": "y" })]);

        let both = execute(
            &match_on_id("keepMatches", json!({ "outputDataFrom": "both" })),
            vec![a.clone(), b.clone()],
        );
        assert_eq!(
            jsons(&both),
            vec![json!({ "id": 1, "n": "x" }), json!({ "id": 1, "n": "y" })]
        );

        let only1 = execute(&match_on_id("keepMatches", json!({})), vec![a.clone(), b.clone()]);
        assert_eq!(only1, vec![a[0].clone()]);

        let only2 = execute(
            &match_on_id("keepMatches", json!({ "outputDataFrom": "input2" })),
            vec![a, b.clone()],
        );
        assert_eq!(only2, b);
    }

    #[test]
    fn keep_non_matches_emits_unmatched_sides() {
        let a = branch(0, vec![json!({ "id": 1 }), json!({ "id": 2 }), json!({ "other": true })]);
        let b = branch(1, vec![json!({ "id": 1 }), json!({ "id": 3 })]);

        let out = execute(
            &match_on_id("keepNonMatches", json!({ "outputDataFrom": "both" })),
            vec![a.clone(), b.clone()],
        );

        assert_eq!(out, vec![a[1].clone(), a[2].clone(), b[1].clone()]);
    }

    #[test]
    fn unset_and_object_keys_never_match() {
        let a = branch(0, vec![json!({ "name": "no id" }), json!({ "id": { "nested": 1 } })]);
        let b = branch(1, vec![json!({ "name": "no id" }), json!({ "id": { "nested": 1 } })]);

        let matches = execute(
            &match_on_id("keepMatches", json!({ "outputDataFrom": "both" })),
            vec![a.clone(), b.clone()],
        );
        assert!(matches.is_empty());

        let non_matches = execute(&match_on_id("keepNonMatches", json!({})), vec![a.clone(), b]);
        assert_eq!(non_matches, a);
    }

    #[test]
    fn enrich_input1_clash_policies() {
        let a = branch(0, vec![json!({ "id": 1, "x": 1 })]);
        let b = branch(1, vec![json!({ "id": 1, "x": 2 })]);

        let preferred = execute(
            &match_on_id(
                "enrichInput1",
                json!({ "options": { "clashHandling": { "resolveClash": "preferInput1" } } }),
            ),
            vec![a.clone(), b.clone()],
        );
        assert_eq!(preferred[0].json["x"], json!(1));

        let default = execute(&match_on_id("enrichInput1", json!({})), vec![a, b]);
        assert_eq!(default[0].json["x"], json!(2));
    }

    #[test]
    fn enrich_input1_keeps_unmatched_items_unchanged() {
        let a = branch(0, vec![json!({ "id": 1 }), json!({ "id": 2 })]);
        let b = branch(1, vec![json!({ "id": 2, "extra": true })]);

        let out = execute(&match_on_id("enrichInput1", json!({})), vec![a.clone(), b]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], a[0]);
        assert_eq!(Value::Object(out[1].json.clone()), json!({ "id": 2, "extra": true }));
        assert_eq!(out[1].paired_item, vec![PairedItem::new(0, 1), PairedItem::new(1, 0)]);
    }

    #[test]
    fn enrich_input2_uses_input2_as_base() {
        let a = branch(0, vec![json!({ "id": 1, "from": "a" })]);
        let b = branch(1, vec![json!({ "id": 3 }), json!({ "id": 1 })]);

        let out = execute(&match_on_id("enrichInput2", json!({})), vec![a.clone(), b.clone()]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], b[0]);
        assert_eq!(Value::Object(out[1].json.clone()), json!({ "id": 1, "from": "a" }));

        // An empty input 1 leaves every input 2 item as it was.
        assert_eq!(execute(&match_on_id("enrichInput2", json!({})), vec![vec![], b.clone()]), b);
    }

    #[test]
    fn add_suffix_keeps_both_values() {
        let a = branch(0, vec![json!({ "id": 1, "x": "a" })]);
        let b = branch(1, vec![json!({ "id": 1, "x": "b" })]);

        let out = execute(
            &match_on_id(
                "keepMatches",
                json!({
                    "outputDataFrom": "both",
                    "options": { "clashHandling": { "resolveClash": "addSuffix" } }
                }),
            ),
            vec![a, b],
        );

        assert_eq!(
            Value::Object(out[0].json.clone()),
            json!({ "id1": 1, "x1": "a", "id2": 1, "x2": "b" })
        );
    }

    #[test]
    fn shallow_merge_replaces_nested_objects() {
        let a = branch(0, vec![json!({ "id": 1, "a": { "p": 1 } })]);
        let b = branch(1, vec![json!({ "id": 1, "a": { "q": 2 } })]);
        let both = |mode: &str| {
            match_on_id(
                "keepMatches",
                json!({
                    "outputDataFrom": "both",
                    "options": { "clashHandling": { "mergeMode": mode } }
                }),
            )
        };

        let deep = execute(&both("deepMerge"), vec![a.clone(), b.clone()]);
        assert_eq!(deep[0].json["a"], json!({ "p": 1, "q": 2 }));

        let shallow = execute(&both("shallowMerge"), vec![a, b]);
        assert_eq!(shallow[0].json["a"], json!({ "q": 2 }));
    }

    #[test]
    fn composite_keys_over_several_fields() {
        let config = resolve(json!({
            "mode": "matchFields",
            "matchFields": [
                { "input1FieldName": "first", "input2FieldName": "given" },
                { "input1FieldName": "address.city", "input2FieldName": "city" }
            ],
            "joinMode": "keepMatches",
            "outputDataFrom": "both"
        }));
        let a = branch(0, vec![
            json!({ "first": "Ada", "address": { "city": "London" } }),
            json!({ "first": "Ada", "address": { "city": "Paris" } }),
        ]);
        let b = branch(1, vec![json!({ "given": "Ada", "city": "Paris", "score": 3 })]);

        let out = execute(&config, vec![a, b]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].json["score"], json!(3));
        assert_eq!(out[0].paired_item, vec![PairedItem::new(0, 1), PairedItem::new(1, 0)]);
    }

    // ------------------------------------------------------------------
    // chooseBranch
    // ------------------------------------------------------------------

    #[test]
    fn choose_branch_empty_always_yields_one_empty_item() {
        let config = resolve(json!({
            "mode": "chooseBranch",
            "chooseBranchMode": "waitForBoth",
            "output": "empty"
        }));
        let a = branch(0, vec![json!({ "a": 1 })]);
        let b = branch(1, vec![json!({ "b": 1 }), json!({ "b": 2 })]);

        for inputs in [vec![a.clone(), b.clone()], vec![], vec![vec![], b.clone()]] {
            let out = execute(&config, inputs);
            assert_eq!(out.len(), 1);
            assert!(out[0].json.is_empty());
        }

        let out = execute(&resolve(json!({ "mode": "chooseBranch", "output": "input2" })), vec![a, b.clone()]);
        assert_eq!(out, b);
    }

    // ------------------------------------------------------------------
    // legacy key modes
    // ------------------------------------------------------------------

    fn key_mode(mode: &str, overwrite: &str) -> MergeConfiguration {
        resolve(json!({
            "mode": mode,
            "propertyName1": "id",
            "propertyName2": "key",
            "overwrite": overwrite
        }))
    }

    #[test]
    fn keep_and_remove_key_matches_partition_input1() {
        let a = branch(0, vec![json!({ "id": 1 }), json!({ "id": 2 }), json!({ "x": 0 })]);
        let b = branch(1, vec![json!({ "key": 2 })]);

        let kept = execute(&key_mode("keepKeyMatches", "always"), vec![a.clone(), b.clone()]);
        assert_eq!(kept, vec![a[1].clone()]);

        let removed = execute(&key_mode("removeKeyMatches", "always"), vec![a.clone(), b]);
        assert_eq!(removed, vec![a[0].clone(), a[2].clone()]);
    }

    #[test]
    fn merge_by_key_overwrite_policies() {
        let a = branch(0, vec![json!({ "id": 1, "name": "", "city": "Oslo" }), json!({ "id": 9 })]);
        let b = branch(1, vec![json!({ "key": 1, "name": "Kari", "city": "Bergen", "age": 30 })]);

        let always = execute(&key_mode("mergeByKey", "always"), vec![a.clone(), b.clone()]);
        assert_eq!(
            jsons(&always),
            vec![
                json!({ "id": 1, "name": "Kari", "city": "Bergen", "age": 30 }),
                json!({ "id": 9 })
            ]
        );
        assert_eq!(always[0].paired_item, vec![PairedItem::new(0, 0), PairedItem::new(1, 0)]);
        assert_eq!(always[1], a[1]);

        let undefined = execute(&key_mode("mergeByKey", "undefined"), vec![a.clone(), b.clone()]);
        assert_eq!(
            Value::Object(undefined[0].json.clone()),
            json!({ "id": 1, "name": "", "city": "Oslo", "age": 30 })
        );

        let blank = execute(&key_mode("mergeByKey", "blank"), vec![a.clone(), b]);
        assert_eq!(
            Value::Object(blank[0].json.clone()),
            json!({ "id": 1, "name": "Kari", "city": "Oslo", "age": 30 })
        );

        // Sources are never mutated.
        assert_eq!(a[0].json["name"], json!(""));
    }

    #[test]
    fn merge_by_key_drops_items_without_the_property() {
        let a = branch(0, vec![json!({ "other": 1 })]);
        let b = branch(1, vec![json!({ "key": 1 })]);
        assert!(execute(&key_mode("mergeByKey", "always"), vec![a, b]).is_empty());
    }

    // ------------------------------------------------------------------
    // node
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn node_reports_configuration_errors() {
        let ctx = ExecutionContext::standalone("merge", json!({ "mode": "matchFields" }));
        let err = MergeNode.execute(vec![vec![], vec![]], &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::Configuration { ref parameter, .. } if parameter == "matchFields"
        ));
    }

    #[tokio::test]
    async fn node_merges_with_its_parameters() {
        let ctx = ExecutionContext::standalone("merge", json!({ "mode": "multiplex" }));
        let out = MergeNode
            .execute(
                vec![branch(0, vec![json!({ "a": 1 })]), branch(1, vec![json!({ "b": 1 })])],
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(jsons(&out), vec![json!({ "a": 1, "b": 1 })]);
    }
}
