//! Purpose: Bundled decompiler producing Java-like declarations from the class model.
//! Exports: `SkeletonDecompiler`, `java_type_name`.
//! Role: Default `Decompiler` for the reference engine.
//! Invariants: A class-supplied `source` is returned verbatim.
//! Invariants: Output is deterministic for a given class; member order is preserved.

use std::fmt::Write as _;

use crate::core::error::{Error, ErrorKind};
use crate::engine::Decompiler;
use crate::engine::model::{
    ACC_ABSTRACT, ACC_ENUM, ACC_FINAL, ACC_INTERFACE, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC,
    ACC_STATIC, ClassInfo, MethodMember, Workspace, is_valid_field_descriptor,
    parse_method_descriptor,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct SkeletonDecompiler;

impl Decompiler for SkeletonDecompiler {
    fn name(&self) -> &str {
        "skeleton"
    }

    fn decompile(&self, _workspace: &Workspace, class: &ClassInfo) -> Result<String, Error> {
        if let Some(source) = &class.source {
            return Ok(source.clone());
        }
        render_class(class)
    }
}

/// Java spelling of a field descriptor, e.g. `[Ljava/lang/String;` -> `java.lang.String[]`.
pub fn java_type_name(descriptor: &str) -> String {
    let dims = descriptor.chars().take_while(|&c| c == '[').count();
    let element = &descriptor[dims..];
    let base = match element {
        "Z" => "boolean".to_string(),
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "S" => "short".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "F" => "float".to_string(),
        "D" => "double".to_string(),
        "V" => "void".to_string(),
        other => other
            .strip_prefix('L')
            .and_then(|rest| rest.strip_suffix(';'))
            .unwrap_or(other)
            .replace('/', "."),
    };
    format!("{base}{}", "[]".repeat(dims))
}

fn simple_name(internal: &str) -> &str {
    internal.rsplit('/').next().unwrap_or(internal)
}

fn modifiers(access: u32, allow_abstract: bool) -> String {
    let mut words = Vec::new();
    if access & ACC_PUBLIC != 0 {
        words.push("public");
    } else if access & ACC_PROTECTED != 0 {
        words.push("protected");
    } else if access & ACC_PRIVATE != 0 {
        words.push("private");
    }
    if access & ACC_STATIC != 0 {
        words.push("static");
    }
    if access & ACC_FINAL != 0 {
        words.push("final");
    }
    if allow_abstract && access & ACC_ABSTRACT != 0 {
        words.push("abstract");
    }
    let mut out = words.join(" ");
    if !out.is_empty() {
        out.push(' ');
    }
    out
}

fn render_class(class: &ClassInfo) -> Result<String, Error> {
    let mut out = String::new();
    if let Some((package, _)) = class.name.rsplit_once('/') {
        let _ = writeln!(out, "package {};\n", package.replace('/', "."));
    }

    let is_interface = class.access & ACC_INTERFACE != 0;
    let keyword = if is_interface {
        "interface"
    } else if class.access & ACC_ENUM != 0 {
        "enum"
    } else {
        "class"
    };
    let _ = write!(
        out,
        "{}{keyword} {}",
        modifiers(class.access, !is_interface),
        simple_name(&class.name)
    );
    if let Some(super_name) = class
        .super_name
        .as_deref()
        .filter(|name| *name != "java/lang/Object" && !is_interface)
    {
        let _ = write!(out, " extends {}", super_name.replace('/', "."));
    }
    if !class.interfaces.is_empty() {
        let verb = if is_interface { "extends" } else { "implements" };
        let names: Vec<String> = class
            .interfaces
            .iter()
            .map(|name| name.replace('/', "."))
            .collect();
        let _ = write!(out, " {verb} {}", names.join(", "));
    }
    out.push_str(" {\n");

    for field in &class.fields {
        if !is_valid_field_descriptor(&field.descriptor) {
            return Err(malformed(class, &field.name, &field.descriptor));
        }
        let _ = writeln!(
            out,
            "    {}{} {};",
            modifiers(field.access, false),
            java_type_name(&field.descriptor),
            field.name
        );
    }
    if !class.fields.is_empty() && !class.methods.is_empty() {
        out.push('\n');
    }
    for (index, method) in class.methods.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        render_method(&mut out, class, method)?;
    }
    out.push_str("}\n");
    Ok(out)
}

fn render_method(out: &mut String, class: &ClassInfo, method: &MethodMember) -> Result<(), Error> {
    let (args, ret) = parse_method_descriptor(&method.descriptor)
        .ok_or_else(|| malformed(class, &method.name, &method.descriptor))?;

    if method.name == "<clinit>" {
        out.push_str("    static {\n");
    } else {
        let params: Vec<String> = args
            .iter()
            .enumerate()
            .map(|(index, arg)| format!("{} arg{index}", java_type_name(arg)))
            .collect();
        let head = if method.name == "<init>" {
            simple_name(&class.name).to_string()
        } else {
            format!("{} {}", java_type_name(ret), method.name)
        };
        let _ = write!(
            out,
            "    {}{head}({})",
            modifiers(method.access, true),
            params.join(", ")
        );
        if method.access & ACC_ABSTRACT != 0 {
            out.push_str(";\n");
            return Ok(());
        }
        out.push_str(" {\n");
    }
    let count = method
        .instructions
        .iter()
        .filter(|insn| !matches!(insn.opcode(), "LABEL" | "LINE"))
        .count();
    let _ = writeln!(out, "        // {count} instructions");
    out.push_str("    }\n");
    Ok(())
}

fn malformed(class: &ClassInfo, member: &str, descriptor: &str) -> Error {
    Error::new(ErrorKind::Corrupt).with_message(format!(
        "malformed descriptor '{descriptor}' on {}.{member}",
        class.name
    ))
}
