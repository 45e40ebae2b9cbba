//! Purpose: Workspace search over string constants, references and declarations.
//! Exports: `SearchQuery`, `SearchHit`, `PathType`, `search`.
//! Role: Backs `/search`; pure reads of the primary resource.
//! Invariants: Matching is case-sensitive substring containment.
//! Invariants: Hits come out in class, then member, then instruction order, without duplicates.
//! Invariants: At most `max_results` hits are produced; scanning stops once reached.

use std::collections::HashSet;

use serde_json::{Map, Value, json};

use crate::engine::bytecode::MemberKind;
use crate::engine::model::{ClassInfo, Instruction, MethodMember, Workspace, descriptor_types};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchQuery<'a> {
    /// String constants loaded by any method.
    Strings(&'a str),
    /// Types referenced by supertypes, descriptors or instructions.
    ClassReference(&'a str),
    /// Member references by name; `None` matches both methods and fields.
    MemberReference(&'a str, Option<MemberKind>),
    /// Declared class names (`class`) and declared member names (`member`).
    Declaration { class: &'a str, member: &'a str },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathType {
    Class,
    Member,
    Instruction,
}

impl PathType {
    pub fn as_str(self) -> &'static str {
        match self {
            PathType::Class => "class",
            PathType::Member => "member",
            PathType::Instruction => "instruction",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SearchHit {
    pub class: String,
    pub member: Option<(String, String)>,
    pub path_type: PathType,
}

impl SearchHit {
    fn class(class: &ClassInfo) -> Self {
        Self {
            class: class.name.clone(),
            member: None,
            path_type: PathType::Class,
        }
    }

    fn member(class: &ClassInfo, name: &str, descriptor: &str, path_type: PathType) -> Self {
        Self {
            class: class.name.clone(),
            member: Some((name.to_string(), descriptor.to_string())),
            path_type,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut item = Map::new();
        item.insert("class".to_string(), json!(self.class));
        if let Some((name, descriptor)) = &self.member {
            item.insert("member".to_string(), json!(name));
            item.insert("descriptor".to_string(), json!(descriptor));
        }
        item.insert("pathType".to_string(), json!(self.path_type.as_str()));
        Value::Object(item)
    }
}

struct Collector {
    hits: Vec<SearchHit>,
    seen: HashSet<SearchHit>,
    limit: usize,
}

impl Collector {
    fn full(&self) -> bool {
        self.hits.len() >= self.limit
    }

    fn push(&mut self, hit: SearchHit) {
        if !self.full() && self.seen.insert(hit.clone()) {
            self.hits.push(hit);
        }
    }
}

pub fn search(workspace: &Workspace, query: SearchQuery<'_>, max_results: usize) -> Vec<SearchHit> {
    let mut collector = Collector {
        hits: Vec::new(),
        seen: HashSet::new(),
        limit: max_results,
    };
    workspace.read(|resource| {
        for class in &resource.classes {
            if collector.full() {
                break;
            }
            match query {
                SearchQuery::Strings(text) => search_strings(class, text, &mut collector),
                SearchQuery::ClassReference(text) => search_types(class, text, &mut collector),
                SearchQuery::MemberReference(text, kind) => {
                    search_members(class, text, kind, &mut collector)
                }
                SearchQuery::Declaration { class: name, member } => {
                    search_declarations(class, name, member, &mut collector)
                }
            }
        }
    });
    collector.hits
}

fn for_each_instruction(
    class: &ClassInfo,
    collector: &mut Collector,
    mut matches: impl FnMut(&Instruction) -> bool,
) {
    for method in &class.methods {
        if method.instructions.iter().any(&mut matches) {
            collector.push(instruction_hit(class, method));
        }
    }
}

fn instruction_hit(class: &ClassInfo, method: &MethodMember) -> SearchHit {
    SearchHit::member(class, &method.name, &method.descriptor, PathType::Instruction)
}

fn search_strings(class: &ClassInfo, text: &str, collector: &mut Collector) {
    for_each_instruction(class, collector, |insn| {
        matches!(insn, Instruction::Ldc { value, value_type } if value_type == "String" && value.contains(text))
    });
}

fn search_types(class: &ClassInfo, text: &str, collector: &mut Collector) {
    let mentions = |descriptor: &str| descriptor_types(descriptor).iter().any(|t| t.contains(text));

    let supertype_match = class
        .super_name
        .iter()
        .chain(class.interfaces.iter())
        .any(|name| name.contains(text));
    if supertype_match {
        collector.push(SearchHit::class(class));
    }
    for field in &class.fields {
        if mentions(&field.descriptor) {
            collector.push(SearchHit::member(class, &field.name, &field.descriptor, PathType::Member));
        }
    }
    for method in &class.methods {
        if mentions(&method.descriptor) {
            collector.push(SearchHit::member(class, &method.name, &method.descriptor, PathType::Member));
        }
    }
    for_each_instruction(class, collector, |insn| match insn {
        Instruction::Type { desc, .. } => desc.contains(text),
        Instruction::Field { owner, desc, .. } | Instruction::Method { owner, desc, .. } => {
            owner.contains(text) || mentions(desc)
        }
        Instruction::InvokeDynamic { desc, .. } => mentions(desc),
        Instruction::Ldc { value, value_type } => value_type == "Type" && mentions(value),
        _ => false,
    });
}

fn search_members(
    class: &ClassInfo,
    text: &str,
    kind: Option<MemberKind>,
    collector: &mut Collector,
) {
    let wants = |candidate: MemberKind| kind.is_none_or(|kind| kind == candidate);
    for_each_instruction(class, collector, |insn| match insn {
        Instruction::Field { name, .. } => wants(MemberKind::Field) && name.contains(text),
        Instruction::Method { name, .. } | Instruction::InvokeDynamic { name, .. } => {
            wants(MemberKind::Method) && name.contains(text)
        }
        _ => false,
    });
}

fn search_declarations(class: &ClassInfo, name: &str, member: &str, collector: &mut Collector) {
    if class.name.contains(name) {
        collector.push(SearchHit::class(class));
    }
    for field in &class.fields {
        if field.name.contains(member) {
            collector.push(SearchHit::member(class, &field.name, &field.descriptor, PathType::Member));
        }
    }
    for method in &class.methods {
        if method.name.contains(member) {
            collector.push(SearchHit::member(class, &method.name, &method.descriptor, PathType::Member));
        }
    }
}
