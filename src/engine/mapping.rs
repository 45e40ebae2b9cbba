//! Purpose: Symbol renaming over the primary resource and mapping export formats.
//! Exports: `ClassMapping`, `MemberMapping`, `IntermediateMappings`, `AggregatedMappings`,
//! `MappingFormat`, `apply_mappings`, `remap_descriptor`.
//! Role: Backs `/mapping/rename` and `/mapping/export`.
//! Invariants: Intermediate mappings are expressed in the names current at apply time.
//! Invariants: Aggregated mappings are keyed by original names and never hold identity entries.
//! Invariants: Member renames match the exact owner, name and descriptor.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::engine::model::{ClassInfo, Instruction, Workspace};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassMapping {
    pub original: String,
    pub renamed: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberMapping {
    pub owner: String,
    pub descriptor: String,
    pub original: String,
    pub renamed: String,
}

/// One batch of renames to apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntermediateMappings {
    classes: Vec<ClassMapping>,
    fields: Vec<MemberMapping>,
    methods: Vec<MemberMapping>,
}

impl IntermediateMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, old: &str, new: &str) {
        self.classes.push(ClassMapping {
            original: old.to_string(),
            renamed: new.to_string(),
        });
    }

    pub fn add_field(&mut self, owner: &str, descriptor: &str, old: &str, new: &str) {
        self.fields.push(member(owner, descriptor, old, new));
    }

    pub fn add_method(&mut self, owner: &str, descriptor: &str, old: &str, new: &str) {
        self.methods.push(member(owner, descriptor, old, new));
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.fields.is_empty() && self.methods.is_empty()
    }

    fn remap_class(&self, class: &ClassInfo) -> ClassInfo {
        let classes: HashMap<&str, &str> = self
            .classes
            .iter()
            .map(|m| (m.original.as_str(), m.renamed.as_str()))
            .collect();
        let name = |internal: &str| -> String {
            classes
                .get(internal)
                .map_or_else(|| internal.to_string(), |renamed| renamed.to_string())
        };
        let desc = |descriptor: &str| remap_descriptor(descriptor, |n| classes.get(n).copied());

        let mut out = class.clone();
        for field in &mut out.fields {
            if let Some(renamed) = find(&self.fields, &class.name, &field.name, &field.descriptor) {
                field.name = renamed.to_string();
            }
            field.descriptor = desc(&field.descriptor);
        }
        for method in &mut out.methods {
            if let Some(renamed) = find(&self.methods, &class.name, &method.name, &method.descriptor)
            {
                method.name = renamed.to_string();
            }
            method.descriptor = desc(&method.descriptor);
            for insn in &mut method.instructions {
                self.remap_instruction(insn, &name, &desc);
            }
            for block in &mut method.try_catch_blocks {
                if let Some(catch_type) = &mut block.catch_type {
                    *catch_type = name(catch_type);
                }
            }
            for local in &mut method.local_variables {
                local.desc = desc(&local.desc);
            }
        }
        out.name = name(&class.name);
        out.super_name = class.super_name.as_deref().map(&name);
        out.interfaces = class.interfaces.iter().map(|i| name(i)).collect();
        out
    }

    fn remap_instruction(
        &self,
        insn: &mut Instruction,
        name: &impl Fn(&str) -> String,
        desc: &impl Fn(&str) -> String,
    ) {
        match insn {
            Instruction::Type { desc: target, .. } => {
                *target = if target.starts_with('[') {
                    desc(target)
                } else {
                    name(target)
                };
            }
            Instruction::Field {
                owner,
                name: member,
                desc: descriptor,
                ..
            } => {
                if let Some(renamed) = find(&self.fields, owner, member, descriptor) {
                    *member = renamed.to_string();
                }
                *owner = name(owner);
                *descriptor = desc(descriptor);
            }
            Instruction::Method {
                owner,
                name: member,
                desc: descriptor,
                ..
            } => {
                if let Some(renamed) = find(&self.methods, owner, member, descriptor) {
                    *member = renamed.to_string();
                }
                *owner = name(owner);
                *descriptor = desc(descriptor);
            }
            Instruction::InvokeDynamic {
                desc: descriptor, ..
            } => *descriptor = desc(descriptor),
            Instruction::Ldc { value, value_type } if *value_type == "Type" => *value = desc(value),
            _ => {}
        }
    }
}

fn member(owner: &str, descriptor: &str, old: &str, new: &str) -> MemberMapping {
    MemberMapping {
        owner: owner.to_string(),
        descriptor: descriptor.to_string(),
        original: old.to_string(),
        renamed: new.to_string(),
    }
}

fn find<'m>(
    mappings: &'m [MemberMapping],
    owner: &str,
    name: &str,
    descriptor: &str,
) -> Option<&'m str> {
    mappings
        .iter()
        .find(|m| m.owner == owner && m.original == name && m.descriptor == descriptor)
        .map(|m| m.renamed.as_str())
}

/// Rewrites every `L<name>;` in a descriptor through `rename`.
pub fn remap_descriptor<'a>(descriptor: &str, rename: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(descriptor.len());
    let mut rest = descriptor;
    while let Some(start) = rest.find('L') {
        out.push_str(&rest[..=start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find(';') else {
            rest = after;
            break;
        };
        let internal = &after[..end];
        out.push_str(rename(internal).unwrap_or(internal));
        out.push(';');
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Applies a batch to the primary resource and folds it into the workspace's
/// aggregated mappings. Returns the number of classes whose content changed.
pub fn apply_mappings(workspace: &Workspace, mappings: &IntermediateMappings) -> usize {
    let affected = workspace.write(|resource| {
        let mut affected = 0;
        for class in &mut resource.classes {
            let renamed = mappings.remap_class(class);
            if renamed != *class {
                *class = renamed;
                affected += 1;
            }
        }
        affected
    });
    workspace.with_mappings(|aggregated| aggregated.update(mappings));
    tracing::debug!(affected, "applied mappings");
    affected
}

/// Every rename applied to a workspace, folded from original to current names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregatedMappings {
    classes: Vec<ClassMapping>,
    fields: Vec<MemberMapping>,
    methods: Vec<MemberMapping>,
}

impl AggregatedMappings {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.fields.is_empty() && self.methods.is_empty()
    }

    pub fn classes(&self) -> &[ClassMapping] {
        &self.classes
    }

    pub fn fields(&self) -> &[MemberMapping] {
        &self.fields
    }

    pub fn methods(&self) -> &[MemberMapping] {
        &self.methods
    }

    pub fn current_class_name<'a>(&'a self, original: &'a str) -> &'a str {
        self.renamed_class(original).unwrap_or(original)
    }

    fn renamed_class(&self, original: &str) -> Option<&str> {
        self.classes
            .iter()
            .find(|m| m.original == original)
            .map(|m| m.renamed.as_str())
    }

    fn original_class(&self, current: &str) -> Option<&str> {
        self.classes
            .iter()
            .find(|m| m.renamed == current)
            .map(|m| m.original.as_str())
    }

    fn update(&mut self, batch: &IntermediateMappings) {
        for mapping in &batch.fields {
            let folded = self.to_original(mapping);
            fold_member(&mut self.fields, folded);
        }
        for mapping in &batch.methods {
            let folded = self.to_original(mapping);
            fold_member(&mut self.methods, folded);
        }
        for mapping in &batch.classes {
            match self.classes.iter_mut().find(|m| m.renamed == mapping.original) {
                Some(existing) => existing.renamed = mapping.renamed.clone(),
                None => self.classes.push(mapping.clone()),
            }
        }
        self.classes.retain(|m| m.original != m.renamed);
    }

    fn to_original(&self, mapping: &MemberMapping) -> MemberMapping {
        MemberMapping {
            owner: self
                .original_class(&mapping.owner)
                .unwrap_or(&mapping.owner)
                .to_string(),
            descriptor: remap_descriptor(&mapping.descriptor, |n| self.original_class(n)),
            original: mapping.original.clone(),
            renamed: mapping.renamed.clone(),
        }
    }

    fn current_descriptor(&self, descriptor: &str) -> String {
        remap_descriptor(descriptor, |n| self.renamed_class(n))
    }
}

fn fold_member(list: &mut Vec<MemberMapping>, mapping: MemberMapping) {
    let existing = list.iter_mut().find(|m| {
        m.owner == mapping.owner && m.descriptor == mapping.descriptor && m.renamed == mapping.original
    });
    match existing {
        Some(existing) => existing.renamed = mapping.renamed,
        None => list.push(mapping),
    }
    list.retain(|m| m.original != m.renamed);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingFormat {
    Simple,
    Srg,
    TinyV1,
}

impl MappingFormat {
    pub const ALL: [MappingFormat; 3] = [MappingFormat::Simple, MappingFormat::Srg, MappingFormat::TinyV1];

    pub fn name(self) -> &'static str {
        match self {
            MappingFormat::Simple => "Simple",
            MappingFormat::Srg => "SRG",
            MappingFormat::TinyV1 => "TinyV1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn available() -> Vec<&'static str> {
        Self::ALL.iter().map(|format| format.name()).collect()
    }

    pub fn export_text(self, mappings: &AggregatedMappings) -> String {
        let mut out = String::new();
        match self {
            MappingFormat::Simple => {
                for class in mappings.classes() {
                    let _ = writeln!(out, "{} {}", class.original, class.renamed);
                }
                for field in mappings.fields() {
                    let _ = writeln!(out, "{}.{} {}", field.owner, field.original, field.renamed);
                }
                for method in mappings.methods() {
                    let _ = writeln!(
                        out,
                        "{}.{}{} {}",
                        method.owner, method.original, method.descriptor, method.renamed
                    );
                }
            }
            MappingFormat::Srg => {
                for class in mappings.classes() {
                    let _ = writeln!(out, "CL: {} {}", class.original, class.renamed);
                }
                for field in mappings.fields() {
                    let _ = writeln!(
                        out,
                        "FD: {}/{} {}/{}",
                        field.owner,
                        field.original,
                        mappings.current_class_name(&field.owner),
                        field.renamed
                    );
                }
                for method in mappings.methods() {
                    let _ = writeln!(
                        out,
                        "MD: {}/{} {} {}/{} {}",
                        method.owner,
                        method.original,
                        method.descriptor,
                        mappings.current_class_name(&method.owner),
                        method.renamed,
                        mappings.current_descriptor(&method.descriptor)
                    );
                }
            }
            MappingFormat::TinyV1 => {
                out.push_str("v1\tintermediary\tnamed\n");
                for class in mappings.classes() {
                    let _ = writeln!(out, "CLASS\t{}\t{}", class.original, class.renamed);
                }
                for field in mappings.fields() {
                    let _ = writeln!(
                        out,
                        "FIELD\t{}\t{}\t{}\t{}",
                        field.owner, field.descriptor, field.original, field.renamed
                    );
                }
                for method in mappings.methods() {
                    let _ = writeln!(
                        out,
                        "METHOD\t{}\t{}\t{}\t{}",
                        method.owner, method.descriptor, method.original, method.renamed
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::{ACC_PUBLIC, FieldMember, MethodMember, WorkspaceResource};

    fn fixture() -> Workspace {
        let mut a = ClassInfo::new("p/A");
        a.fields.push(FieldMember {
            name: "count".to_string(),
            descriptor: "I".to_string(),
            access: 2,
        });
        a.methods.push(MethodMember::new("make", "()Lp/B;", ACC_PUBLIC));
        let mut b = ClassInfo::new("p/B");
        b.super_name = Some("p/A".to_string());
        let mut run = MethodMember::new("run", "()V", ACC_PUBLIC);
        run.instructions = vec![
            Instruction::Field {
                opcode: "GETFIELD".to_string(),
                owner: "p/A".to_string(),
                name: "count".to_string(),
                desc: "I".to_string(),
            },
            Instruction::Type {
                opcode: "NEW".to_string(),
                desc: "p/A".to_string(),
            },
        ];
        b.methods.push(run);
        let c = ClassInfo::new("q/C");
        Workspace::new(
            "MemoryArchiveResource",
            WorkspaceResource {
                classes: vec![a, b, c],
                files: Vec::new(),
            },
        )
    }

    fn rename_class(workspace: &Workspace, old: &str, new: &str) -> usize {
        let mut batch = IntermediateMappings::new();
        batch.add_class(old, new);
        apply_mappings(workspace, &batch)
    }

    #[test]
    fn descriptors_remap_every_object_type() {
        let renamed = remap_descriptor("(ILp/A;[Lp/A;)Lq/C;", |n| (n == "p/A").then_some("z/Z"));
        assert_eq!(renamed, "(ILz/Z;[Lz/Z;)Lq/C;");
        assert_eq!(remap_descriptor("J", |_| Some("x")), "J");
    }

    #[test]
    fn class_rename_updates_references() {
        let workspace = fixture();
        assert_eq!(rename_class(&workspace, "p/A", "p/Renamed"), 2);
        assert_eq!(workspace.class_names(), vec!["p/Renamed", "p/B", "q/C"]);
        let b = workspace.find_class("p/B").expect("class");
        assert_eq!(b.super_name.as_deref(), Some("p/Renamed"));
        assert!(matches!(
            &b.methods[0].instructions[0],
            Instruction::Field { owner, .. } if owner == "p/Renamed"
        ));
        let renamed = workspace.find_class("p/Renamed").expect("class");
        assert_eq!(renamed.methods[0].descriptor, "()Lp/B;");
    }

    #[test]
    fn member_rename_updates_declaration_and_uses() {
        let workspace = fixture();
        let mut batch = IntermediateMappings::new();
        batch.add_field("p/A", "I", "count", "total");
        assert_eq!(apply_mappings(&workspace, &batch), 2);
        assert!(workspace.find_class("p/A").expect("class").field("total").is_some());
        let b = workspace.find_class("p/B").expect("class");
        assert!(matches!(
            &b.methods[0].instructions[0],
            Instruction::Field { name, .. } if name == "total"
        ));
    }

    #[test]
    fn rename_then_identity_rename_is_stable() {
        let once = fixture();
        rename_class(&once, "p/A", "p/Y");

        let twice = fixture();
        rename_class(&twice, "p/A", "p/Y");
        assert_eq!(rename_class(&twice, "p/Y", "p/Y"), 0);

        assert_eq!(once.snapshot(), twice.snapshot());
        let aggregated = |w: &Workspace| w.with_mappings(|m| m.clone());
        assert_eq!(aggregated(&once), aggregated(&twice));
    }

    #[test]
    fn aggregation_chains_to_original_names() {
        let workspace = fixture();
        rename_class(&workspace, "p/A", "p/Mid");
        rename_class(&workspace, "p/Mid", "p/Final");
        let mut batch = IntermediateMappings::new();
        batch.add_method("p/Final", "()Lp/B;", "make", "build");
        apply_mappings(&workspace, &batch);

        workspace.with_mappings(|mappings| {
            assert_eq!(
                mappings.classes(),
                &[ClassMapping {
                    original: "p/A".to_string(),
                    renamed: "p/Final".to_string()
                }]
            );
            assert_eq!(mappings.methods()[0].owner, "p/A");
            assert_eq!(mappings.current_class_name("p/A"), "p/Final");
        });

        rename_class(&workspace, "p/Final", "p/A");
        workspace.with_mappings(|mappings| assert!(mappings.classes().is_empty()));
    }

    #[test]
    fn formats_render_aggregated_mappings() {
        let workspace = fixture();
        rename_class(&workspace, "p/A", "p/Z");
        let mut batch = IntermediateMappings::new();
        batch.add_field("p/Z", "I", "count", "total");
        apply_mappings(&workspace, &batch);

        let text = workspace.with_mappings(|m| MappingFormat::TinyV1.export_text(m));
        assert_eq!(
            text,
            "v1\tintermediary\tnamed\nCLASS\tp/A\tp/Z\nFIELD\tp/A\tI\tcount\ttotal\n"
        );
        let srg = workspace.with_mappings(|m| MappingFormat::Srg.export_text(m));
        assert!(srg.contains("CL: p/A p/Z\n"));
        assert!(srg.contains("FD: p/A/count p/Z/total\n"));
        let simple = workspace.with_mappings(|m| MappingFormat::Simple.export_text(m));
        assert_eq!(simple, "p/A p/Z\np/A.count total\n");
    }

    #[test]
    fn format_names_resolve_case_insensitively() {
        assert_eq!(MappingFormat::from_name("srg"), Some(MappingFormat::Srg));
        assert_eq!(MappingFormat::from_name("TinyV1"), Some(MappingFormat::TinyV1));
        assert_eq!(MappingFormat::from_name("Proguard"), None);
        assert_eq!(MappingFormat::available(), vec!["Simple", "SRG", "TinyV1"]);
    }
}
