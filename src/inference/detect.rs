use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde_json::{Map, Number, Value};

use super::unify::{ConflictPolicy, Unifier};
use crate::error::{Diagnostic, InferError, SourcePath};
use crate::ir::{Shape, TypeNode, TypePath, normalize_name};

/// Walks one decoded sample and builds its Type Node tree.
///
/// Array elements are homogenized on the way down through the owned
/// [`Unifier`], which also collects every diagnostic of the walk.
#[derive(Debug, Default)]
pub struct Detector {
    unifier: Unifier,
}

impl Detector {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { unifier: Unifier::new(policy) }
    }

    pub fn unifier_mut(&mut self) -> &mut Unifier {
        &mut self.unifier
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.unifier.diagnostics()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.unifier.into_diagnostics()
    }

    /// Detect the type of `value`, naming the resulting node `name` and
    /// placing it under `parent`. The name is used as given.
    pub fn detect(
        &mut self,
        value: &Value,
        name: &str,
        parent: &TypePath,
    ) -> Result<TypeNode, InferError> {
        self.detect_node(&SourcePath::root(), value, name, name, parent)
    }

    fn detect_node(
        &mut self,
        at: &SourcePath,
        value: &Value,
        declared_name: &str,
        original_key: &str,
        parent: &TypePath,
    ) -> Result<TypeNode, InferError> {
        let shape = match value {
            Value::Null => Shape::Any,
            Value::Bool(_) => Shape::Boolean,
            Value::Number(n) => number_shape(n),
            Value::String(_) => Shape::String,
            Value::Array(items) => {
                let element = self.detect_elements(at, items, &parent.child(declared_name))?;
                Shape::Array { element: Box::new(element) }
            }
            Value::Object(map) => {
                let fields = self.detect_fields(at, map, &parent.child(declared_name))?;
                Shape::Map { fields }
            }
        };
        Ok(TypeNode::new(declared_name, original_key, parent.clone(), shape))
    }

    /// Detect the first element, then fold every later element into it.
    fn detect_elements(
        &mut self,
        at: &SourcePath,
        items: &[Value],
        parent: &TypePath,
    ) -> Result<TypeNode, InferError> {
        let at = at.element();
        let mut items = items.iter();
        let Some(first) = items.next() else {
            return Ok(TypeNode::new("", "", parent.clone(), Shape::Any));
        };
        let mut element = self.detect_node(&at, first, "", "", parent)?;
        for item in items {
            let next = self.detect_node(&at, item, "", "", parent)?;
            self.unifier.unify_at(&at, &mut element, next)?;
        }
        Ok(element)
    }

    /// Keys normalizing to the same declared name collide. The smallest
    /// literal key wins, whatever the input order, and only its value is
    /// detected.
    fn detect_fields(
        &mut self,
        at: &SourcePath,
        map: &Map<String, Value>,
        parent: &TypePath,
    ) -> Result<BTreeMap<String, TypeNode>, InferError> {
        let mut winners: BTreeMap<String, (&String, &Value)> = BTreeMap::new();
        let mut dropped: BTreeMap<String, Vec<&String>> = BTreeMap::new();
        for (key, value) in map {
            match winners.entry(normalize_name(key)) {
                Entry::Vacant(slot) => {
                    slot.insert((key, value));
                }
                Entry::Occupied(mut slot) => {
                    let loser = if key < slot.get().0 {
                        slot.insert((key, value)).0
                    } else {
                        key
                    };
                    dropped.entry(slot.key().clone()).or_default().push(loser);
                }
            }
        }

        let mut fields = BTreeMap::new();
        for (declared, (key, value)) in winners {
            if let Some(mut losers) = dropped.remove(&declared) {
                losers.sort();
                for loser in losers {
                    self.unifier.record(Diagnostic::NameCollision {
                        path: at.clone(),
                        declared: declared.clone(),
                        kept: key.clone(),
                        dropped: loser.clone(),
                    });
                }
            }
            let field = self.detect_node(&at.key(key), value, &declared, key, parent)?;
            fields.insert(declared, field);
        }
        Ok(fields)
    }
}

/// `Integer` when the number is whole and fits in an `i64`, `Float` otherwise.
/// Whole numbers past that range (`u64` above `i64::MAX`, `1e20`) would not
/// fit a Go `int`.
fn number_shape(n: &Number) -> Shape {
    if n.is_i64() {
        return Shape::Integer;
    }
    // 2^63; every f64 below it rounds to a representable i64
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f) => Shape::Integer,
        _ => Shape::Float,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Kind;
    use serde_json::json;

    fn detect(value: Value) -> TypeNode {
        Detector::new(ConflictPolicy::Abort)
            .detect(&value, "Root", &TypePath::root())
            .unwrap()
    }

    #[test]
    fn scalars_map_to_their_kinds() {
        assert_eq!(detect(json!(null)).kind(), Kind::Any);
        assert_eq!(detect(json!(true)).kind(), Kind::Boolean);
        assert_eq!(detect(json!("x")).kind(), Kind::String);
        assert_eq!(detect(json!(3)).kind(), Kind::Integer);
        assert_eq!(detect(json!(-3)).kind(), Kind::Integer);
        assert_eq!(detect(json!(i64::MAX)).kind(), Kind::Integer);
        assert_eq!(detect(json!(i64::MIN)).kind(), Kind::Integer);
        assert_eq!(detect(json!(3.0)).kind(), Kind::Integer);
        assert_eq!(detect(json!(3.5)).kind(), Kind::Float);
    }

    #[test]
    fn whole_numbers_outside_int_range_are_floats() {
        assert_eq!(detect(json!(u64::MAX)).kind(), Kind::Float);
        assert_eq!(detect(json!(i64::MAX as u64 + 1)).kind(), Kind::Float);
        assert_eq!(detect(json!(1e20)).kind(), Kind::Float);
        assert_eq!(detect(json!(-1e20)).kind(), Kind::Float);
        assert_eq!(detect(json!(1e300)).kind(), Kind::Float);
        assert_eq!(detect(json!(-9.2e18)).kind(), Kind::Integer);
    }

    #[test]
    fn objects_key_children_by_declared_name() {
        let root = detect(json!({"user_id": 5, "name": "Al"}));
        assert_eq!(root.kind(), Kind::Map);
        assert_eq!(root.declared_name, "Root");
        assert!(root.parent_path.is_empty());

        let user_id = root.field("Userid").unwrap();
        assert_eq!(user_id.kind(), Kind::Integer);
        assert_eq!(user_id.original_key, "user_id");
        assert_eq!(user_id.parent_path, TypePath::from_segments(["Root"]));
        assert_eq!(root.field("Name").unwrap().original_key, "name");
    }

    #[test]
    fn nested_maps_extend_the_parent_path() {
        let root = detect(json!({"a": {"b": {"c": 1}}}));
        let b = root.field("A").unwrap().field("B").unwrap();
        assert_eq!(b.parent_path, TypePath::from_segments(["Root", "A"]));
        assert_eq!(b.field("C").unwrap().parent_path, TypePath::from_segments(["Root", "A", "B"]));
    }

    #[test]
    fn arrays_fold_elements_with_promotion() {
        let root = detect(json!([1, 2, 3.5]));
        assert_eq!(root.kind(), Kind::Array);
        assert_eq!(root.element().unwrap().kind(), Kind::Float);

        let root = detect(json!([1, 2, 3]));
        assert_eq!(root.element().unwrap().kind(), Kind::Integer);
    }

    #[test]
    fn empty_array_has_any_element() {
        let root = detect(json!([]));
        assert_eq!(root.element().unwrap().kind(), Kind::Any);
    }

    #[test]
    fn array_elements_live_under_the_array_name() {
        let root = detect(json!({"items": [{"id": 1}, {"id": 2, "label": "x"}]}));
        let element = root.field("Items").unwrap().element().unwrap();
        assert_eq!(element.declared_name, "");
        assert_eq!(element.parent_path, TypePath::from_segments(["Root", "Items"]));
        assert!(element.field("Id").is_some());
        assert!(element.field("Label").is_some());
        assert_eq!(
            element.field("Label").unwrap().parent_path,
            TypePath::from_segments(["Root", "Items"])
        );
    }

    #[test]
    fn mixed_array_aborts_or_skips_by_policy() {
        let value = json!({"xs": [1, "a"]});
        let error = Detector::new(ConflictPolicy::Abort)
            .detect(&value, "Root", &TypePath::root())
            .unwrap_err();
        assert_eq!(error.to_string(), "type conflict at `xs[]`: integer vs string");

        let mut detector = Detector::new(ConflictPolicy::Skip);
        let root = detector.detect(&value, "Root", &TypePath::root()).unwrap();
        assert_eq!(root.field("Xs").unwrap().element().unwrap().kind(), Kind::Integer);
        assert_eq!(detector.diagnostics().len(), 1);
    }

    #[test]
    fn name_collisions_keep_smallest_literal_key() {
        for value in [json!({"ab": 1, "a_b": "s"}), json!({"a_b": "s", "ab": 1})] {
            let mut detector = Detector::new(ConflictPolicy::Abort);
            let root = detector.detect(&value, "Root", &TypePath::root()).unwrap();
            let field = root.field("Ab").unwrap();
            assert_eq!(field.original_key, "a_b");
            assert_eq!(field.kind(), Kind::String);
            assert_eq!(
                detector.diagnostics(),
                [Diagnostic::NameCollision {
                    path: SourcePath::root(),
                    declared: "Ab".into(),
                    kept: "a_b".into(),
                    dropped: "ab".into(),
                }]
            );
        }
    }

    #[test]
    fn dropped_collision_keys_are_never_detected() {
        for value in [json!({"a_b": 1, "ab": [1, "x"]}), json!({"ab": [1, "x"], "a_b": 1})] {
            let root = detect(value.clone());
            assert_eq!(root.field("Ab").unwrap().kind(), Kind::Integer);

            let mut detector = Detector::new(ConflictPolicy::Skip);
            detector.detect(&value, "Root", &TypePath::root()).unwrap();
            assert!(matches!(
                detector.diagnostics(),
                [Diagnostic::NameCollision { dropped, .. }] if dropped == "ab"
            ));
        }
    }

    #[test]
    fn three_way_collision_reports_final_winner() {
        let mut detector = Detector::new(ConflictPolicy::Abort);
        let root = detector
            .detect(&json!({"ab": 1, "a_b": 2, "_ab": 3}), "Root", &TypePath::root())
            .unwrap();
        assert_eq!(root.field("Ab").unwrap().original_key, "_ab");
        let dropped: Vec<_> = detector
            .diagnostics()
            .iter()
            .map(|d| match d {
                Diagnostic::NameCollision { kept, dropped, .. } => (kept.as_str(), dropped.as_str()),
                other => panic!("unexpected diagnostic {other}"),
            })
            .collect();
        assert_eq!(dropped, [("_ab", "a_b"), ("_ab", "ab")]);
    }
}
