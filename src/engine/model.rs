//! Purpose: Structured class model and workspace state used by the bundled engine.
//! Exports: `ClassInfo`, `FieldMember`, `MethodMember`, `Instruction`, `TryCatchBlock`,
//! `LocalVariable`, `FileInfo`, `WorkspaceResource`, `Workspace`, `WorkspaceHandle`,
//! access constants, descriptor helpers, `normalize_class_name`.
//! Role: The in-memory stand-in for compiled class files; handlers never see raw bytes.
//! Invariants: Class names are stored in internal (slash-separated) form.
//! Invariants: Bundles keep insertion order; `put_class` replaces in place.
//! Invariants: A workspace keeps the snapshot it was imported from for patch creation.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::error::{Error, ErrorKind};
use crate::engine::mapping::AggregatedMappings;

pub const ACC_PUBLIC: u32 = 0x0001;
pub const ACC_PRIVATE: u32 = 0x0002;
pub const ACC_PROTECTED: u32 = 0x0004;
pub const ACC_STATIC: u32 = 0x0008;
pub const ACC_FINAL: u32 = 0x0010;
pub const ACC_INTERFACE: u32 = 0x0200;
pub const ACC_ABSTRACT: u32 = 0x0400;
pub const ACC_ENUM: u32 = 0x4000;

/// Converts dotted class names to internal form.
pub fn normalize_class_name(name: &str) -> String {
    name.trim().replace('.', "/")
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_name: Option<String>,
    #[serde(default)]
    pub access: u32,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldMember>,
    #[serde(default)]
    pub methods: Vec<MethodMember>,
    /// Source text attached by the producer of the archive; preferred by the decompiler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn default_version() -> u32 {
    52
}

impl ClassInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: Some("java/lang/Object".to_string()),
            access: ACC_PUBLIC,
            version: default_version(),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            source: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldMember> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodMember> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn method_mut(&mut self, name: &str, descriptor: &str) -> Option<&mut MethodMember> {
        self.methods
            .iter_mut()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    /// Serialized class image. The bundled engine stores classes as JSON.
    pub fn bytecode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("failed to encode class {}", self.name))
                .with_source(err)
        })
    }

    pub fn from_bytecode(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("invalid class image")
                .with_source(err)
        })
    }

    /// Every class name this class refers to, in first-seen order.
    pub fn referenced_types(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !name.is_empty() && !names.iter().any(|known| known == name) {
                names.push(name.to_string());
            }
        };
        if let Some(super_name) = &self.super_name {
            push(super_name);
        }
        for interface in &self.interfaces {
            push(interface);
        }
        for field in &self.fields {
            descriptor_types(&field.descriptor).iter().for_each(|n| push(n));
        }
        for method in &self.methods {
            descriptor_types(&method.descriptor).iter().for_each(|n| push(n));
            for insn in &method.instructions {
                for name in insn.referenced_types() {
                    push(&name);
                }
            }
        }
        names
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldMember {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub access: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMember {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub access: u32,
    #[serde(default)]
    pub max_stack: u16,
    #[serde(default)]
    pub max_locals: u16,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub try_catch_blocks: Vec<TryCatchBlock>,
    #[serde(default)]
    pub local_variables: Vec<LocalVariable>,
}

impl MethodMember {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, access: u32) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            access,
            max_stack: 0,
            max_locals: 0,
            instructions: Vec::new(),
            try_catch_blocks: Vec::new(),
            local_variables: Vec::new(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }
}

/// One bytecode instruction. Labels are pseudo-instructions used as jump and
/// exception-range targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Instruction {
    Label {
        name: String,
    },
    Line {
        line: u32,
    },
    Insn {
        opcode: String,
    },
    Int {
        opcode: String,
        operand: i32,
    },
    Var {
        opcode: String,
        var: u16,
    },
    Type {
        opcode: String,
        desc: String,
    },
    Field {
        opcode: String,
        owner: String,
        name: String,
        desc: String,
    },
    Method {
        opcode: String,
        owner: String,
        name: String,
        desc: String,
    },
    #[serde(rename = "INVOKEDYNAMIC")]
    InvokeDynamic {
        name: String,
        desc: String,
        bsm: String,
    },
    Jump {
        opcode: String,
        target: String,
    },
    Ldc {
        value: String,
        #[serde(rename = "valueType")]
        value_type: String,
    },
    Iinc {
        var: u16,
        incr: i32,
    },
    #[serde(rename = "TABLESWITCH")]
    TableSwitch {
        min: i32,
        max: i32,
    },
    #[serde(rename = "LOOKUPSWITCH")]
    LookupSwitch {
        keys: Vec<i32>,
    },
}

impl Instruction {
    pub fn insn(opcode: &str) -> Self {
        Instruction::Insn {
            opcode: opcode.to_string(),
        }
    }

    pub fn opcode(&self) -> &str {
        match self {
            Instruction::Label { .. } => "LABEL",
            Instruction::Line { .. } => "LINE",
            Instruction::Insn { opcode }
            | Instruction::Int { opcode, .. }
            | Instruction::Var { opcode, .. }
            | Instruction::Type { opcode, .. }
            | Instruction::Field { opcode, .. }
            | Instruction::Method { opcode, .. }
            | Instruction::Jump { opcode, .. } => opcode,
            Instruction::InvokeDynamic { .. } => "INVOKEDYNAMIC",
            Instruction::Ldc { .. } => "LDC",
            Instruction::Iinc { .. } => "IINC",
            Instruction::TableSwitch { .. } => "TABLESWITCH",
            Instruction::LookupSwitch { .. } => "LOOKUPSWITCH",
        }
    }

    /// JSON shape served by `/bytecode/instructions`: the tagged form plus `opcode`.
    pub fn to_json(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut value {
            map.entry("opcode")
                .or_insert_with(|| Value::String(self.opcode().to_string()));
        }
        value
    }

    fn referenced_types(&self) -> Vec<String> {
        match self {
            Instruction::Type { desc, .. } => {
                if desc.starts_with('[') {
                    descriptor_types(desc)
                } else {
                    vec![desc.clone()]
                }
            }
            Instruction::Field { owner, desc, .. } => {
                let mut names = vec![owner.clone()];
                names.extend(descriptor_types(desc));
                names
            }
            Instruction::Method { owner, desc, .. } => {
                let mut names = vec![owner.clone()];
                names.extend(descriptor_types(desc));
                names
            }
            Instruction::InvokeDynamic { desc, .. } => descriptor_types(desc),
            Instruction::Ldc { value, value_type } if value_type == "Type" => {
                descriptor_types(value)
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TryCatchBlock {
    pub start: String,
    pub end: String,
    pub handler: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub catch_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalVariable {
    pub name: String,
    pub desc: String,
    pub index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    #[serde(default)]
    pub content: String,
}

/// One imported archive: its classes and non-class files.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceResource {
    #[serde(default)]
    pub classes: Vec<ClassInfo>,
    #[serde(default)]
    pub files: Vec<FileInfo>,
}

impl WorkspaceResource {
    pub fn find_class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.iter().find(|class| class.name == name)
    }

    pub fn put_class(&mut self, class: ClassInfo) {
        match self.classes.iter_mut().find(|known| known.name == class.name) {
            Some(slot) => *slot = class,
            None => self.classes.push(class),
        }
    }

    pub fn remove_class(&mut self, name: &str) -> Option<ClassInfo> {
        let index = self.classes.iter().position(|class| class.name == name)?;
        Some(self.classes.remove(index))
    }

    pub fn put_file(&mut self, file: FileInfo) {
        match self.files.iter_mut().find(|known| known.name == file.name) {
            Some(slot) => *slot = file,
            None => self.files.push(file),
        }
    }

    pub fn remove_file(&mut self, name: &str) -> Option<FileInfo> {
        let index = self.files.iter().position(|file| file.name == name)?;
        Some(self.files.remove(index))
    }
}

pub type WorkspaceHandle = Arc<Workspace>;

/// A mutable analysis session over one primary resource.
#[derive(Debug)]
pub struct Workspace {
    kind: String,
    primary: RwLock<WorkspaceResource>,
    baseline: WorkspaceResource,
    supporting: Vec<WorkspaceResource>,
    mappings: Mutex<AggregatedMappings>,
}

impl Workspace {
    pub fn new(kind: impl Into<String>, primary: WorkspaceResource) -> Self {
        Self {
            kind: kind.into(),
            baseline: primary.clone(),
            primary: RwLock::new(primary),
            supporting: Vec::new(),
            mappings: Mutex::new(AggregatedMappings::default()),
        }
    }

    pub fn with_supporting(mut self, resource: WorkspaceResource) -> Self {
        self.supporting.push(resource);
        self
    }

    pub fn into_handle(self) -> WorkspaceHandle {
        Arc::new(self)
    }

    pub fn primary_kind(&self) -> &str {
        &self.kind
    }

    pub fn supporting_count(&self) -> usize {
        self.supporting.len()
    }

    pub fn supporting(&self) -> &[WorkspaceResource] {
        &self.supporting
    }

    pub fn class_count(&self) -> usize {
        self.read(|resource| resource.classes.len())
    }

    pub fn file_count(&self) -> usize {
        self.read(|resource| resource.files.len())
    }

    pub fn class_names(&self) -> Vec<String> {
        self.read(|resource| resource.classes.iter().map(|c| c.name.clone()).collect())
    }

    pub fn find_class(&self, name: &str) -> Option<ClassInfo> {
        self.read(|resource| resource.find_class(name).cloned())
    }

    /// Primary classes first, then supporting resources, for name resolution.
    pub fn resolve_class(&self, name: &str) -> Option<ClassInfo> {
        self.find_class(name).or_else(|| {
            self.supporting
                .iter()
                .find_map(|resource| resource.find_class(name).cloned())
        })
    }

    pub fn snapshot(&self) -> WorkspaceResource {
        self.read(Clone::clone)
    }

    pub fn baseline(&self) -> &WorkspaceResource {
        &self.baseline
    }

    pub fn put_class(&self, class: ClassInfo) {
        self.write(|resource| resource.put_class(class));
    }

    pub fn read<R>(&self, f: impl FnOnce(&WorkspaceResource) -> R) -> R {
        let guard = self.primary.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut WorkspaceResource) -> R) -> R {
        let mut guard = self.primary.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn with_mappings<R>(&self, f: impl FnOnce(&mut AggregatedMappings) -> R) -> R {
        let mut guard = self.mappings.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

/// Class names mentioned by a field or method descriptor.
pub fn descriptor_types(descriptor: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = descriptor;
    while let Some(start) = rest.find('L') {
        let after = &rest[start + 1..];
        match after.find(';') {
            Some(end) => {
                names.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Parses one field type at the start of `text`, returning its length.
fn field_type_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut index = 0;
    while bytes.get(index) == Some(&b'[') {
        index += 1;
    }
    match bytes.get(index)? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => Some(index + 1),
        b'L' => {
            let end = text[index..].find(';')?;
            if end <= 1 {
                return None;
            }
            Some(index + end + 1)
        }
        _ => None,
    }
}

pub fn is_valid_field_descriptor(descriptor: &str) -> bool {
    field_type_len(descriptor) == Some(descriptor.len())
}

/// Splits `(args)ret` into argument descriptors and the return descriptor.
pub fn parse_method_descriptor(descriptor: &str) -> Option<(Vec<&str>, &str)> {
    let body = descriptor.strip_prefix('(')?;
    let close = body.find(')')?;
    let (mut args_text, ret) = (&body[..close], &body[close + 1..]);
    let mut args = Vec::new();
    while !args_text.is_empty() {
        let len = field_type_len(args_text)?;
        args.push(&args_text[..len]);
        args_text = &args_text[len..];
    }
    if ret != "V" && !is_valid_field_descriptor(ret) {
        return None;
    }
    Some((args, ret))
}

/// Local slots consumed by a field type (`J` and `D` take two).
pub fn slot_size(descriptor: &str) -> u16 {
    match descriptor {
        "J" | "D" => 2,
        "V" => 0,
        _ => 1,
    }
}
