//! Purpose: Call graph and inheritance graph over a workspace snapshot.
//! Exports: `MethodRef`, `CallGraph`, `InheritanceGraph`.
//! Role: Backs `/analysis/call-graph` and `/analysis/inheritance`.
//! Invariants: Graphs are built from one consistent snapshot and are immutable afterwards.
//! Invariants: Call edges only point at methods declared somewhere in the workspace;
//! virtual targets resolve through the superclass chain.
//! Invariants: Edge lists keep first-seen order and hold no duplicates.
//! Invariants: Transitive parent/child lists exclude the class itself and terminate on cycles.
//! Invariants: Call trees never expand more than `MAX_CALL_DEPTH` levels.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::{Value, json};

use crate::engine::model::{ClassInfo, Instruction, Workspace};

/// Deepest call tree `CallGraph::describe` renders; larger requests are clamped.
pub const MAX_CALL_DEPTH: i64 = 32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MethodRef {
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    fn to_json(&self) -> Value {
        json!({"owner": self.owner, "name": self.name, "descriptor": self.descriptor})
    }
}

#[derive(Debug, Default)]
pub struct CallGraph {
    methods_by_class: HashMap<String, Vec<MethodRef>>,
    calls: HashMap<MethodRef, Vec<MethodRef>>,
    callers: HashMap<MethodRef, Vec<MethodRef>>,
}

impl CallGraph {
    pub fn build(workspace: &Workspace) -> Self {
        let classes = all_classes(workspace);
        let by_name: HashMap<&str, &ClassInfo> =
            classes.iter().map(|class| (class.name.as_str(), class)).collect();

        let mut graph = CallGraph::default();
        for class in &classes {
            let refs = class
                .methods
                .iter()
                .map(|method| MethodRef::new(&class.name, &method.name, &method.descriptor))
                .collect();
            graph.methods_by_class.insert(class.name.clone(), refs);
        }

        for class in &classes {
            for method in &class.methods {
                let from = MethodRef::new(&class.name, &method.name, &method.descriptor);
                for insn in &method.instructions {
                    let Instruction::Method {
                        owner, name, desc, ..
                    } = insn
                    else {
                        continue;
                    };
                    if let Some(to) = resolve(&by_name, owner, name, desc) {
                        graph.link(from.clone(), to);
                    }
                }
            }
        }
        graph
    }

    pub fn methods_of(&self, class_name: &str) -> Option<&[MethodRef]> {
        self.methods_by_class.get(class_name).map(Vec::as_slice)
    }

    pub fn calls(&self, method: &MethodRef) -> &[MethodRef] {
        self.calls.get(method).map_or(&[], Vec::as_slice)
    }

    pub fn callers(&self, method: &MethodRef) -> &[MethodRef] {
        self.callers.get(method).map_or(&[], Vec::as_slice)
    }

    /// Renders `root` with callees expanded up to `depth` levels and callers listed flat.
    /// A method already on the current path, or reached with no depth left, renders
    /// as a truncated node. `depth` is clamped to `MAX_CALL_DEPTH`.
    pub fn describe(&self, root: &MethodRef, depth: i64) -> Value {
        let mut path = HashSet::new();
        self.describe_inner(root, depth.min(MAX_CALL_DEPTH), &mut path)
    }

    fn describe_inner(&self, node: &MethodRef, depth: i64, path: &mut HashSet<MethodRef>) -> Value {
        let mut value = node.to_json();
        if depth <= 0 || path.contains(node) {
            value["truncated"] = json!(true);
            return value;
        }
        path.insert(node.clone());
        let calls: Vec<Value> = self
            .calls(node)
            .iter()
            .map(|callee| self.describe_inner(callee, depth - 1, path))
            .collect();
        let callers: Vec<Value> = self.callers(node).iter().map(MethodRef::to_json).collect();
        path.remove(node);
        value["calls"] = json!(calls);
        value["callers"] = json!(callers);
        value
    }

    fn link(&mut self, from: MethodRef, to: MethodRef) {
        let calls = self.calls.entry(from.clone()).or_default();
        if !calls.contains(&to) {
            calls.push(to.clone());
        }
        let callers = self.callers.entry(to).or_default();
        if !callers.contains(&from) {
            callers.push(from);
        }
    }
}

fn resolve(
    classes: &HashMap<&str, &ClassInfo>,
    owner: &str,
    name: &str,
    desc: &str,
) -> Option<MethodRef> {
    let mut cursor = Some(owner);
    let mut seen = HashSet::new();
    while let Some(class_name) = cursor {
        if !seen.insert(class_name) {
            return None;
        }
        let class = classes.get(class_name)?;
        if class.method(name, desc).is_some() {
            return Some(MethodRef::new(class_name, name, desc));
        }
        cursor = class.super_name.as_deref();
    }
    None
}

fn all_classes(workspace: &Workspace) -> Vec<ClassInfo> {
    let mut classes = workspace.snapshot().classes;
    for resource in workspace.supporting() {
        for class in &resource.classes {
            if !classes.iter().any(|known| known.name == class.name) {
                classes.push(class.clone());
            }
        }
    }
    classes
}

#[derive(Debug, Default)]
pub struct InheritanceGraph {
    parents: HashMap<String, Vec<String>>,
    children: HashMap<String, Vec<String>>,
}

impl InheritanceGraph {
    pub fn build(workspace: &Workspace) -> Self {
        let mut graph = InheritanceGraph::default();
        for class in all_classes(workspace) {
            let direct: Vec<String> = class
                .super_name
                .iter()
                .chain(class.interfaces.iter())
                .cloned()
                .collect();
            for parent in &direct {
                let children = graph.children.entry(parent.clone()).or_default();
                if !children.contains(&class.name) {
                    children.push(class.name.clone());
                }
            }
            graph.parents.insert(class.name, direct);
        }
        graph
    }

    /// Only classes present in the workspace have a vertex.
    pub fn contains(&self, class_name: &str) -> bool {
        self.parents.contains_key(class_name)
    }

    pub fn direct_parents(&self, class_name: &str) -> &[String] {
        self.parents.get(class_name).map_or(&[], Vec::as_slice)
    }

    pub fn direct_children(&self, class_name: &str) -> &[String] {
        self.children.get(class_name).map_or(&[], Vec::as_slice)
    }

    pub fn all_parents(&self, class_name: &str) -> Vec<String> {
        walk(class_name, |name| self.direct_parents(name))
    }

    pub fn all_children(&self, class_name: &str) -> Vec<String> {
        walk(class_name, |name| self.direct_children(name))
    }
}

fn walk<'g>(start: &str, next: impl Fn(&str) -> &'g [String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::from([start.to_string()]);
    let mut queue: VecDeque<String> = VecDeque::from([start.to_string()]);
    while let Some(name) = queue.pop_front() {
        for neighbour in next(&name) {
            if seen.insert(neighbour.clone()) {
                out.push(neighbour.clone());
                queue.push_back(neighbour.clone());
            }
        }
    }
    out
}
