//! Go declaration emitter.
//!
//! Renders a Type Node tree as `type <Name> struct { ... }` declarations.
//! Named mode emits every distinct map identity once, dependencies first;
//! anonymous mode emits one declaration with nested maps inlined. Fields are
//! always in sorted order of their declared names so output is diff-stable.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::ir::{Kind, Shape, TypeIdentity, TypeNode};

const INDENT: &str = "    ";

#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Inline nested maps instead of declaring them at top level.
    pub anonymous: bool,
    /// Struct tag key, `json` gives `json:"<key>"`.
    pub tag_name: String,
    /// Used when a declaration would otherwise have an empty name.
    pub fallback_name: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            anonymous: false,
            tag_name: "json".to_string(),
            fallback_name: "Root".to_string(),
        }
    }
}

pub struct Codegen {
    options: EmitOptions,
    out: String,
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

impl Codegen {
    pub fn new() -> Self {
        Self::with_options(EmitOptions::default())
    }

    pub fn with_options(options: EmitOptions) -> Self {
        Self { options, out: String::new() }
    }

    /// Emit `package <name>` ahead of the declarations.
    pub fn package(&mut self, name: &str) {
        self.separate();
        let _ = writeln!(self.out, "package {name}");
    }

    pub fn emit(&mut self, root: &TypeNode) {
        self.separate();

        let mut target = root;
        while let Some(element) = target.element() {
            target = element;
        }

        if target.kind() != Kind::Map {
            // no declarations to make; the type expression is the whole answer
            let names = NameTable::default();
            let expr = self.type_expr(root, &names, 0);
            self.out.push_str(&expr);
            self.out.push('\n');
            return;
        }

        if self.options.anonymous {
            let names = NameTable::assign([target.identity()].iter(), &self.options.fallback_name);
            self.push_declaration(target, &names);
            return;
        }

        let mut visited = HashSet::new();
        let mut arena = IndexMap::new();
        collect(target, &mut visited, &mut arena);
        let names = NameTable::assign(arena.keys(), &self.options.fallback_name);
        for (i, node) in arena.values().enumerate() {
            if i > 0 {
                self.out.push('\n');
            }
            self.push_declaration(node, &names);
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn separate(&mut self) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
    }

    fn push_declaration(&mut self, node: &TypeNode, names: &NameTable) {
        let name = names.name_of(&node.identity());
        let body = self.struct_body(node, names, 0);
        let _ = writeln!(self.out, "type {name} {body}");
    }

    /// `struct { ... }` with fields one level deeper than `depth`.
    fn struct_body(&self, node: &TypeNode, names: &NameTable, depth: usize) -> String {
        let fields = match node.fields() {
            Some(fields) if !fields.is_empty() => fields,
            _ => return "struct {}".to_string(),
        };
        let mut out = String::from("struct {\n");
        for (name, field) in fields {
            let pointer = if field.kind() == Kind::Map { "*" } else { "" };
            let _ = writeln!(
                out,
                "{}{name} {pointer}{} {}",
                INDENT.repeat(depth + 1),
                self.type_expr(field, names, depth + 1),
                self.tag(&field.original_key),
            );
        }
        out.push_str(&INDENT.repeat(depth));
        out.push('}');
        out
    }

    fn type_expr(&self, node: &TypeNode, names: &NameTable, depth: usize) -> String {
        match &node.shape {
            Shape::Map { .. } if self.options.anonymous => self.struct_body(node, names, depth),
            Shape::Map { .. } => names.name_of(&node.identity()),
            Shape::Array { element } => format!("[]{}", self.type_expr(element, names, depth)),
            Shape::String => "string".to_string(),
            Shape::Integer => "int".to_string(),
            Shape::Float => "float64".to_string(),
            Shape::Boolean => "bool".to_string(),
            Shape::Any => "interface{}".to_string(),
        }
    }

    /// Struct tag carrying the literal key. Raw string unless the key holds a
    /// backtick, which a raw string cannot express.
    fn tag(&self, key: &str) -> String {
        let value = format!("{}:{}", self.options.tag_name, quote_go(key));
        if value.contains('`') {
            quote_go(&value)
        } else {
            format!("`{value}`")
        }
    }
}

/// Render declarations for `node`.
pub fn render(node: &TypeNode, anonymous: bool) -> String {
    let mut cg = Codegen::with_options(EmitOptions { anonymous, ..EmitOptions::default() });
    cg.emit(node);
    cg.into_string()
}

/// Post-order walk: a map's field types land in the arena before the map.
fn collect<'a>(
    node: &'a TypeNode,
    visited: &mut HashSet<TypeIdentity>,
    arena: &mut IndexMap<TypeIdentity, &'a TypeNode>,
) {
    match &node.shape {
        Shape::Array { element } => collect(element, visited, arena),
        Shape::Map { fields } => {
            let identity = node.identity();
            if !visited.insert(identity.clone()) {
                return;
            }
            for field in fields.values() {
                collect(field, visited, arena);
            }
            arena.insert(identity, node);
        }
        _ => {}
    }
}

/// Declaration names per identity. Identities flattening to the same text
/// get numeric suffixes in emission order.
#[derive(Default)]
struct NameTable {
    names: HashMap<TypeIdentity, String>,
}

impl NameTable {
    fn assign<'a, I>(identities: I, fallback: &str) -> Self
    where
        I: Iterator<Item = &'a TypeIdentity>,
    {
        let mut taken = HashSet::new();
        let mut names = HashMap::new();
        for identity in identities {
            let base = match identity.rendered() {
                rendered if rendered.is_empty() => fallback.to_string(),
                rendered => rendered,
            };
            let mut candidate = base.clone();
            let mut suffix = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{base}{suffix}");
                suffix += 1;
            }
            names.insert(identity.clone(), candidate);
        }
        Self { names }
    }

    fn name_of(&self, identity: &TypeIdentity) -> String {
        self.names
            .get(identity)
            .cloned()
            .unwrap_or_else(|| identity.rendered())
    }
}

/// Go interpreted string literal.
fn quote_go(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
