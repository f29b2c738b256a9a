//! Change-set model built from a plan document.
//!
//! A plan document is the JSON printed by `terraform show -json <planfile>`.
//! Only `resource_changes[].address` and `resource_changes[].change.actions`
//! are read; every other field is ignored.

use crate::error::{DocumentKind, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Module key for resources declared in the root module.
pub const ROOT_MODULE: &str = "root";

/// One verb from a change's action list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// Resource will be created
    Create,
    /// Resource will be updated in place
    Update,
    /// Resource will be destroyed
    Delete,
    /// Resource will be replaced
    Replace,
    /// Nothing to do
    NoOp,
    /// Any other verb (e.g. `read`), kept verbatim
    Other(String),
}

impl Action {
    /// Parse an action verb as it appears in the plan document.
    pub fn parse(verb: &str) -> Self {
        match verb {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "replace" => Self::Replace,
            "no-op" => Self::NoOp,
            other => Self::Other(other.to_string()),
        }
    }

    /// The verb as written in the plan document.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Replace => "replace",
            Self::NoOp => "no-op",
            Self::Other(verb) => verb,
        }
    }

    /// Whether this action has a counter in [`ActionCounts`].
    pub fn is_counted(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update | Self::Delete | Self::Replace
        )
    }
}

impl From<String> for Action {
    fn from(verb: String) -> Self {
        Self::parse(&verb)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-action tallies over a whole plan.
///
/// Counting is additive: a change listing both `delete` and `create` bumps
/// both counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    /// Changes listing `create`
    pub create: usize,
    /// Changes listing `update`
    pub update: usize,
    /// Changes listing `delete`
    pub delete: usize,
    /// Changes listing `replace`
    pub replace: usize,
}

impl ActionCounts {
    fn record(&mut self, action: &Action) {
        match action {
            Action::Create => self.create += 1,
            Action::Update => self.update += 1,
            Action::Delete => self.delete += 1,
            Action::Replace => self.replace += 1,
            Action::NoOp | Action::Other(_) => {}
        }
    }

    /// Sum of all counters.
    pub fn total(&self) -> usize {
        self.create + self.update + self.delete + self.replace
    }

    /// Check if the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// The single action used to label a change in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayAction {
    /// Lists `create`
    Create,
    /// Lists `delete` but not `create`
    Delete,
    /// Lists `replace` only among create/delete/replace
    Replace,
    /// Lists `update` and nothing of higher priority
    Update,
    /// No-op, unrecognized verbs only, or an empty action list
    Unknown,
}

impl DisplayAction {
    /// Lowercase name of the action.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Replace => "replace",
            Self::Update => "update",
            Self::Unknown => "unknown",
        }
    }
}

/// One entry of the plan's `resource_changes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    address: String,
    actions: Vec<Action>,
    module: String,
}

impl ChangeRecord {
    /// Full resource address, e.g. `module.network.aws_vpc.main`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Actions in document order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Key of the module group this record belongs to.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Label by priority: create, then delete, then replace, then update.
    pub fn display_action(&self) -> DisplayAction {
        let has = |wanted: &Action| self.actions.contains(wanted);
        if has(&Action::Create) {
            DisplayAction::Create
        } else if has(&Action::Delete) {
            DisplayAction::Delete
        } else if has(&Action::Replace) {
            DisplayAction::Replace
        } else if has(&Action::Update) {
            DisplayAction::Update
        } else {
            DisplayAction::Unknown
        }
    }
}

/// Module key for a resource address.
///
/// `"root"` unless the address starts with `module.`, in which case the first
/// two dot-separated segments (`module.<name>`). Nested modules group under
/// their outermost module.
pub fn module_key(address: &str) -> &str {
    if !address.starts_with("module.") {
        return ROOT_MODULE;
    }
    match address.match_indices('.').nth(1) {
        Some((end, _)) => &address[..end],
        None => address,
    }
}

/// Changes belonging to one module, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleGroup {
    key: String,
    changes: Vec<ChangeRecord>,
}

impl ModuleGroup {
    /// Module key, `root` or `module.<name>`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Changes in document order.
    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    /// Number of changes in the module.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether the module has no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Normalized, read-only view of a plan.
///
/// Module groups appear in the order their first change appears in the
/// document. A new plan load builds a new model; models are never updated in
/// place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSetModel {
    counts: ActionCounts,
    groups: Vec<ModuleGroup>,
}

impl ChangeSetModel {
    /// Build the model from a parsed plan document.
    ///
    /// Returns [`Error::MalformedDocument`] when the document is not an
    /// object, `resource_changes` is missing or not an array, an entry lacks
    /// a string `address`, or an action is not a string.
    pub fn build(document: &Value) -> Result<Self> {
        let changes = PlanDocument::from_value(document)?;

        let mut counts = ActionCounts::default();
        let mut groups: Vec<ModuleGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for raw in changes {
            let actions = raw.change.and_then(|c| c.actions).unwrap_or_default();
            for action in &actions {
                counts.record(action);
            }

            let module = module_key(&raw.address).to_string();
            let slot = match index.get(&module) {
                Some(&slot) => slot,
                None => {
                    groups.push(ModuleGroup {
                        key: module.clone(),
                        changes: Vec::new(),
                    });
                    index.insert(module.clone(), groups.len() - 1);
                    groups.len() - 1
                }
            };

            groups[slot].changes.push(ChangeRecord {
                address: raw.address,
                actions,
                module,
            });
        }

        Ok(Self { counts, groups })
    }

    /// Parse plan JSON text and build the model.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::malformed(DocumentKind::Plan, &e))?;
        Self::build(&value)
    }

    /// Parse plan JSON bytes and build the model.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| Error::malformed(DocumentKind::Plan, &e))?;
        Self::build(&value)
    }

    /// Per-action counters.
    pub fn counts(&self) -> &ActionCounts {
        &self.counts
    }

    /// Module groups in first-seen order.
    pub fn groups(&self) -> &[ModuleGroup] {
        &self.groups
    }

    /// Look up a module group by key.
    pub fn group(&self, key: &str) -> Option<&ModuleGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// All change records, module by module.
    pub fn records(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.groups.iter().flat_map(|g| g.changes.iter())
    }

    /// Number of change records.
    pub fn len(&self) -> usize {
        self.groups.iter().map(ModuleGroup::len).sum()
    }

    /// Whether the plan lists no changes.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ============================================================================
// Raw document shape
// ============================================================================

#[derive(Deserialize)]
struct PlanDocument {
    resource_changes: Vec<Value>,
}

impl PlanDocument {
    fn from_value(document: &Value) -> Result<Vec<RawChange>> {
        if !document.is_object() {
            return Err(not_an_object("plan document"));
        }
        let plan =
            Self::deserialize(document).map_err(|e| Error::malformed(DocumentKind::Plan, &e))?;

        plan.resource_changes
            .iter()
            .map(|entry| {
                if !entry.is_object() {
                    return Err(not_an_object("resource change"));
                }
                RawChange::deserialize(entry).map_err(|e| Error::malformed(DocumentKind::Plan, &e))
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct RawChange {
    address: String,
    #[serde(default)]
    change: Option<RawChangeBody>,
}

#[derive(Deserialize)]
struct RawChangeBody {
    #[serde(default)]
    actions: Option<Vec<Action>>,
}

fn not_an_object(what: &str) -> Error {
    Error::MalformedDocument {
        kind: DocumentKind::Plan,
        message: format!("{what} is not a JSON object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "format_version": "1.2",
            "resource_changes": [
                {"address": "aws_instance.web", "change": {"actions": ["create"]}},
                {"address": "module.network.aws_vpc.main", "change": {"actions": ["update"]}},
                {"address": "aws_s3_bucket.logs", "change": {"actions": ["delete", "create"]}},
                {"address": "module.network.aws_subnet.a", "change": {"actions": ["no-op"]}},
                {"address": "module.db.aws_db_instance.main", "change": {"actions": ["replace"]}},
                {"address": "data.aws_ami.ubuntu", "change": {"actions": ["read"]}}
            ]
        })
    }

    #[test]
    fn test_counts_are_additive() {
        let model = ChangeSetModel::build(&sample()).unwrap();
        let counts = model.counts();

        assert_eq!(counts.create, 2);
        assert_eq!(counts.update, 1);
        assert_eq!(counts.delete, 1);
        assert_eq!(counts.replace, 1);

        let pairs: usize = model
            .records()
            .map(|r| r.actions().iter().filter(|a| a.is_counted()).count())
            .sum();
        assert_eq!(counts.total(), pairs);
    }

    #[test]
    fn test_unrecognized_actions_are_kept_but_not_counted() {
        let model = ChangeSetModel::build(&sample()).unwrap();
        let read = model
            .records()
            .find(|r| r.address() == "data.aws_ami.ubuntu")
            .unwrap();

        assert_eq!(read.actions(), [Action::Other("read".to_string())]);
        assert_eq!(read.display_action(), DisplayAction::Unknown);
    }

    #[test]
    fn test_module_key() {
        assert_eq!(module_key("aws_instance.web"), "root");
        assert_eq!(module_key("module.network.aws_vpc.main"), "module.network");
        assert_eq!(module_key("module.a.module.b.aws_vpc.main"), "module.a");
        assert_eq!(module_key("module.lonely"), "module.lonely");
        assert_eq!(module_key("modules.x.y"), "root");
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let model = ChangeSetModel::build(&sample()).unwrap();
        let keys: Vec<&str> = model.groups().iter().map(ModuleGroup::key).collect();
        assert_eq!(keys, vec!["root", "module.network", "module.db"]);

        let root: Vec<&str> = model
            .group("root")
            .unwrap()
            .changes()
            .iter()
            .map(ChangeRecord::address)
            .collect();
        assert_eq!(
            root,
            vec!["aws_instance.web", "aws_s3_bucket.logs", "data.aws_ami.ubuntu"]
        );
    }

    #[test]
    fn test_every_record_in_exactly_one_group() {
        let model = ChangeSetModel::build(&sample()).unwrap();
        assert_eq!(model.len(), 6);

        for group in model.groups() {
            for record in group.changes() {
                assert_eq!(record.module(), group.key());
                assert_eq!(module_key(record.address()), group.key());
            }
        }

        // Concatenating a group's records keeps their document order.
        let network: Vec<&str> = model
            .group("module.network")
            .unwrap()
            .changes()
            .iter()
            .map(ChangeRecord::address)
            .collect();
        assert_eq!(
            network,
            vec!["module.network.aws_vpc.main", "module.network.aws_subnet.a"]
        );
    }

    #[test]
    fn test_display_priority() {
        let model = ChangeSetModel::parse(
            r#"{"resource_changes": [
                {"address": "a.replaced", "change": {"actions": ["delete", "create"]}},
                {"address": "a.b", "change": {"actions": ["update", "replace"]}},
                {"address": "a.c", "change": {"actions": ["update", "delete"]}},
                {"address": "a.d", "change": {"actions": ["update"]}}
            ]}"#,
        )
        .unwrap();

        let labels: Vec<DisplayAction> = model.records().map(ChangeRecord::display_action).collect();
        assert_eq!(
            labels,
            vec![
                DisplayAction::Create,
                DisplayAction::Replace,
                DisplayAction::Delete,
                DisplayAction::Update
            ]
        );
    }

    #[test]
    fn test_missing_change_means_no_actions() {
        let model = ChangeSetModel::build(&json!({
            "resource_changes": [
                {"address": "null_resource.a"},
                {"address": "null_resource.b", "change": {}},
                {"address": "null_resource.c", "change": null}
            ]
        }))
        .unwrap();

        assert_eq!(model.len(), 3);
        assert!(model.counts().is_empty());
        for record in model.records() {
            assert!(record.actions().is_empty());
            assert_eq!(record.display_action(), DisplayAction::Unknown);
        }
    }

    #[test]
    fn test_empty_resource_changes() {
        let model = ChangeSetModel::parse(r#"{"resource_changes": []}"#).unwrap();
        assert_eq!(*model.counts(), ActionCounts::default());
        assert!(model.groups().is_empty());
        assert!(model.is_empty());
    }

    #[test]
    fn test_malformed_documents() {
        let cases = [
            "not json",
            "[]",
            r#"{"format_version": "1.2"}"#,
            r#"{"resource_changes": null}"#,
            r#"{"resource_changes": {"a": 1}}"#,
            r#"{"resource_changes": [["aws_instance.web"]]}"#,
            r#"{"resource_changes": [{"change": {"actions": ["create"]}}]}"#,
            r#"{"resource_changes": [{"address": 7}]}"#,
            r#"{"resource_changes": [{"address": "a.b", "change": {"actions": [1]}}]}"#,
        ];

        for case in cases {
            let err = ChangeSetModel::parse(case).unwrap_err();
            assert!(
                matches!(
                    err,
                    Error::MalformedDocument {
                        kind: DocumentKind::Plan,
                        ..
                    }
                ),
                "{case} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_from_slice() {
        let bytes = serde_json::to_vec(&sample()).unwrap();
        let model = ChangeSetModel::from_slice(&bytes).unwrap();
        assert_eq!(model.groups().len(), 3);
    }

    #[test]
    fn test_build_is_idempotent() {
        let doc = sample();
        assert_eq!(
            ChangeSetModel::build(&doc).unwrap(),
            ChangeSetModel::build(&doc).unwrap()
        );
    }

    #[test]
    fn test_action_round_trip_names() {
        assert_eq!(Action::parse("no-op"), Action::NoOp);
        assert_eq!(Action::parse("read").as_str(), "read");
        assert_eq!(Action::Replace.to_string(), "replace");
        assert!(!Action::NoOp.is_counted());
    }
}
