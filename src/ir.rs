//! Type Node model: the inferred structural type at one position of a sample.
//!
//! A node is created by the detector, widened in place by the unifier and
//! only ever read by codegen. Children exist exactly for maps and arrays; the
//! [`Shape`] enum carries them so the invariant holds by construction.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Child key under which an array reports its unified element type.
pub const ARRAY_ELEMENT_KEY: &str = "0";

// ————————————————————————————————————————————————————————————————————————————
// KIND
// ————————————————————————————————————————————————————————————————————————————

/// Closed set of structural categories a node can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    String,
    Integer,
    Float,
    Boolean,
    Map,
    Array,
    Any,
}

impl Kind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Integer | Kind::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::Boolean => "boolean",
            Kind::Map => "map",
            Kind::Array => "array",
            Kind::Any => "any",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PATHS & IDENTITY
// ————————————————————————————————————————————————————————————————————————————

/// Ancestor declared names of a node, one segment per named ancestor.
///
/// Held as segments rather than a joined string so that `["Foo", "Bar"]` and
/// `["FooBar"]` stay distinct keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TypePath(Vec<String>);

impl TypePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self::root();
        for segment in segments {
            path.push(segment.into());
        }
        path
    }

    /// Path of the children of a node named `name` that lives at `self`.
    /// Array elements carry an empty name and add no segment.
    pub fn child(&self, name: &str) -> Self {
        let mut path = self.clone();
        path.push(name.to_string());
        path
    }

    fn push(&mut self, segment: String) {
        if !segment.is_empty() {
            self.0.push(segment);
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn concat(&self) -> String {
        self.0.concat()
    }
}

/// Identity of a map declaration: where it sits plus what it is called.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdentity {
    pub path: TypePath,
    pub name: String,
}

impl TypeIdentity {
    /// Flat declaration name, e.g. `RootUserAddress`. Different identities
    /// can flatten to the same text; codegen disambiguates those.
    pub fn rendered(&self) -> String {
        let mut out = self.path.concat();
        out.push_str(&self.name);
        out
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NODES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    String,
    Integer,
    Float,
    Boolean,
    Any,
    Map { fields: BTreeMap<String, TypeNode> },
    Array { element: Box<TypeNode> },
}

impl Shape {
    pub fn kind(&self) -> Kind {
        match self {
            Shape::String => Kind::String,
            Shape::Integer => Kind::Integer,
            Shape::Float => Kind::Float,
            Shape::Boolean => Kind::Boolean,
            Shape::Any => Kind::Any,
            Shape::Map { .. } => Kind::Map,
            Shape::Array { .. } => Kind::Array,
        }
    }

    /// Childless shape for a scalar kind; `None` for maps and arrays.
    pub fn scalar(kind: Kind) -> Option<Self> {
        match kind {
            Kind::String => Some(Shape::String),
            Kind::Integer => Some(Shape::Integer),
            Kind::Float => Some(Shape::Float),
            Kind::Boolean => Some(Shape::Boolean),
            Kind::Any => Some(Shape::Any),
            Kind::Map | Kind::Array => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeNode {
    /// Exported identifier, see [`normalize_name`]. Empty for array elements.
    pub declared_name: String,
    /// Literal key from the sample, used for the serialization tag.
    pub original_key: String,
    pub parent_path: TypePath,
    #[serde(flatten)]
    pub shape: Shape,
}

impl TypeNode {
    pub fn new(
        declared_name: impl Into<String>,
        original_key: impl Into<String>,
        parent_path: TypePath,
        shape: Shape,
    ) -> Self {
        Self {
            declared_name: declared_name.into(),
            original_key: original_key.into(),
            parent_path,
            shape,
        }
    }

    pub fn kind(&self) -> Kind {
        self.shape.kind()
    }

    pub fn identity(&self) -> TypeIdentity {
        TypeIdentity {
            path: self.parent_path.clone(),
            name: self.declared_name.clone(),
        }
    }

    /// Parent path handed to this node's own children.
    pub fn child_path(&self) -> TypePath {
        self.parent_path.child(&self.declared_name)
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, TypeNode>> {
        match &self.shape {
            Shape::Map { fields } => Some(fields),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&TypeNode> {
        self.fields().and_then(|fields| fields.get(name))
    }

    pub fn element(&self) -> Option<&TypeNode> {
        match &self.shape {
            Shape::Array { element } => Some(element),
            _ => None,
        }
    }

    /// Children keyed the way they are addressed: field names for maps, the
    /// [`ARRAY_ELEMENT_KEY`] sentinel for an array's element.
    pub fn children(&self) -> Vec<(&str, &TypeNode)> {
        match &self.shape {
            Shape::Map { fields } => fields.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            Shape::Array { element } => vec![(ARRAY_ELEMENT_KEY, element.as_ref())],
            _ => Vec::new(),
        }
    }
}

/// Turn a JSON key into an exported Go identifier: drop every `_`, then
/// uppercase the first remaining character. Lossy; the literal key is kept
/// separately on the node.
pub fn normalize_name(key: &str) -> String {
    let mut chars = key.chars().filter(|c| *c != '_');
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_underscores_and_exports() {
        assert_eq!(normalize_name("user_id"), "Userid");
        assert_eq!(normalize_name("__private"), "Private");
        assert_eq!(normalize_name("name"), "Name");
        assert_eq!(normalize_name("ID"), "ID");
        assert_eq!(normalize_name("écran"), "Écran");
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("___"), "");
    }

    #[test]
    fn paths_keep_segments_apart() {
        let split = TypeIdentity {
            path: TypePath::from_segments(["Root", "Foo"]),
            name: "Bar".into(),
        };
        let joined = TypeIdentity {
            path: TypePath::from_segments(["Root"]),
            name: "FooBar".into(),
        };
        assert_ne!(split, joined);
        assert_eq!(split.rendered(), joined.rendered());
    }

    #[test]
    fn empty_names_add_no_segment() {
        let path = TypePath::from_segments(["Root"]).child("").child("Items");
        assert_eq!(path.segments(), ["Root", "Items"]);
    }

    #[test]
    fn array_children_use_sentinel_key() {
        let element = TypeNode::new("", "", TypePath::root(), Shape::Integer);
        let node = TypeNode::new(
            "Ids",
            "ids",
            TypePath::root(),
            Shape::Array { element: Box::new(element) },
        );
        let children = node.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, ARRAY_ELEMENT_KEY);
        assert_eq!(children[0].1.kind(), Kind::Integer);
        assert!(TypeNode::new("X", "x", TypePath::root(), Shape::Boolean).children().is_empty());
    }
}
