//! Purpose: Structural member edits on the class model plus operand-stack sizing.
//! Exports: `add_field`, `add_method`, `edit_field`, `edit_method`, `remove_member`,
//! `MemberKind`, `default_return_body`, `compute_maxs`.
//! Role: Backs `/bytecode/*` and the assembler's limit computation.
//! Invariants: Edits validate descriptors before touching the class.
//! Invariants: Missing members fail with `ErrorKind::NotFound`; duplicates with `AlreadyExists`;
//! malformed descriptors with `Usage`.
//! Invariants: `compute_maxs` is a linear walk; it sizes straight-line code exactly and
//! branchy code conservatively by never letting depth go negative.

use std::str::FromStr;

use crate::core::error::{Error, ErrorKind};
use crate::engine::model::{
    ClassInfo, FieldMember, Instruction, MethodMember, is_valid_field_descriptor,
    parse_method_descriptor, slot_size,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Field,
}

impl MemberKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberKind::Method => "method",
            MemberKind::Field => "field",
        }
    }
}

impl FromStr for MemberKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "method" => Ok(MemberKind::Method),
            "field" => Ok(MemberKind::Field),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid member type '{other}'"))
                .with_hint("Use 'method' or 'field'.")),
        }
    }
}

pub fn add_field(
    class: &mut ClassInfo,
    name: &str,
    descriptor: &str,
    access: u32,
) -> Result<(), Error> {
    check_field_descriptor(descriptor)?;
    if class.field(name).is_some() {
        return Err(Error::new(ErrorKind::AlreadyExists)
            .with_message(format!("field '{name}' already exists in {}", class.name)));
    }
    class.fields.push(FieldMember {
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        access,
    });
    Ok(())
}

/// Adds a method whose body returns the zero value of its return type.
pub fn add_method(
    class: &mut ClassInfo,
    name: &str,
    descriptor: &str,
    access: u32,
) -> Result<(), Error> {
    let (_, ret) = check_method_descriptor(descriptor)?;
    if class.method(name, descriptor).is_some() {
        return Err(Error::new(ErrorKind::AlreadyExists).with_message(format!(
            "method '{name}{descriptor}' already exists in {}",
            class.name
        )));
    }
    let mut method = MethodMember::new(name, descriptor, access);
    method.instructions = default_return_body(ret);
    let (max_stack, max_locals) = compute_maxs(&method);
    method.max_stack = max_stack;
    method.max_locals = max_locals;
    class.methods.push(method);
    Ok(())
}

/// Rewrites the access flags and/or descriptor of the field called `name`.
pub fn edit_field(
    class: &mut ClassInfo,
    name: &str,
    descriptor: Option<&str>,
    access: Option<u32>,
) -> Result<(), Error> {
    if let Some(descriptor) = descriptor {
        check_field_descriptor(descriptor)?;
    }
    let class_name = class.name.clone();
    let field = class
        .fields
        .iter_mut()
        .find(|field| field.name == name)
        .ok_or_else(|| member_missing(&class_name, name))?;
    if let Some(descriptor) = descriptor {
        field.descriptor = descriptor.to_string();
    }
    if let Some(access) = access {
        field.access = access;
    }
    Ok(())
}

pub fn edit_method(
    class: &mut ClassInfo,
    name: &str,
    descriptor: &str,
    access: Option<u32>,
) -> Result<(), Error> {
    let class_name = class.name.clone();
    let method = class
        .method_mut(name, descriptor)
        .ok_or_else(|| member_missing(&class_name, &format!("{name}{descriptor}")))?;
    if let Some(access) = access {
        method.access = access;
    }
    Ok(())
}

/// Removes every member of `kind` named `name`, optionally restricted to `descriptor`.
/// Returns how many members were removed.
pub fn remove_member(
    class: &mut ClassInfo,
    kind: MemberKind,
    name: &str,
    descriptor: Option<&str>,
) -> Result<usize, Error> {
    let is_target = |member_name: &str, member_desc: &str| {
        member_name == name && descriptor.is_none_or(|wanted| wanted == member_desc)
    };
    let removed = match kind {
        MemberKind::Method => {
            let before = class.methods.len();
            class
                .methods
                .retain(|method| !is_target(&method.name, &method.descriptor));
            before - class.methods.len()
        }
        MemberKind::Field => {
            let before = class.fields.len();
            class
                .fields
                .retain(|field| !is_target(&field.name, &field.descriptor));
            before - class.fields.len()
        }
    };
    if removed == 0 {
        return Err(member_missing(&class.name, name));
    }
    Ok(removed)
}

/// `RETURN` for void, otherwise a zero constant followed by the typed return.
pub fn default_return_body(return_descriptor: &str) -> Vec<Instruction> {
    let pair = |constant: &str, ret: &str| vec![Instruction::insn(constant), Instruction::insn(ret)];
    match return_descriptor {
        "V" => vec![Instruction::insn("RETURN")],
        "Z" | "B" | "C" | "S" | "I" => pair("ICONST_0", "IRETURN"),
        "J" => pair("LCONST_0", "LRETURN"),
        "F" => pair("FCONST_0", "FRETURN"),
        "D" => pair("DCONST_0", "DRETURN"),
        _ => pair("ACONST_NULL", "ARETURN"),
    }
}

/// Returns `(max_stack, max_locals)` for `method`.
pub fn compute_maxs(method: &MethodMember) -> (u16, u16) {
    let mut locals: u32 = if method.is_static() { 0 } else { 1 };
    if let Some((args, _)) = parse_method_descriptor(&method.descriptor) {
        locals += args.iter().map(|arg| u32::from(slot_size(arg))).sum::<u32>();
    }

    let mut depth: i32 = 0;
    let mut max_depth: i32 = 0;
    for insn in &method.instructions {
        match insn {
            Instruction::Var { opcode, var } => {
                let width = if matches!(opcode.as_str(), "LLOAD" | "DLOAD" | "LSTORE" | "DSTORE") {
                    2
                } else {
                    1
                };
                locals = locals.max(u32::from(*var) + width);
            }
            Instruction::Iinc { var, .. } => locals = locals.max(u32::from(*var) + 1),
            _ => {}
        }
        match stack_effect(insn) {
            Effect::Delta(delta) => depth = (depth + delta).max(0),
            Effect::Reset => depth = 0,
        }
        max_depth = max_depth.max(depth);
    }
    (
        u16::try_from(max_depth).unwrap_or(u16::MAX),
        u16::try_from(locals).unwrap_or(u16::MAX),
    )
}

enum Effect {
    Delta(i32),
    Reset,
}

fn stack_effect(insn: &Instruction) -> Effect {
    use Effect::{Delta, Reset};
    match insn {
        Instruction::Label { .. } | Instruction::Line { .. } | Instruction::Iinc { .. } => Delta(0),
        Instruction::Insn { opcode } => insn_effect(opcode),
        Instruction::Int { opcode, .. } => match opcode.as_str() {
            "NEWARRAY" => Delta(0),
            _ => Delta(1),
        },
        Instruction::Var { opcode, .. } => match opcode.as_str() {
            "ILOAD" | "FLOAD" | "ALOAD" => Delta(1),
            "LLOAD" | "DLOAD" => Delta(2),
            "ISTORE" | "FSTORE" | "ASTORE" => Delta(-1),
            "LSTORE" | "DSTORE" => Delta(-2),
            _ => Delta(0),
        },
        Instruction::Type { opcode, .. } => match opcode.as_str() {
            "NEW" => Delta(1),
            _ => Delta(0),
        },
        Instruction::Field { opcode, desc, .. } => {
            let size = i32::from(slot_size(desc));
            match opcode.as_str() {
                "GETSTATIC" => Delta(size),
                "PUTSTATIC" => Delta(-size),
                "GETFIELD" => Delta(size - 1),
                "PUTFIELD" => Delta(-size - 1),
                _ => Delta(0),
            }
        }
        Instruction::Method { opcode, desc, .. } => {
            let receiver = if opcode == "INVOKESTATIC" { 0 } else { 1 };
            Delta(call_effect(desc) - receiver)
        }
        Instruction::InvokeDynamic { desc, .. } => Delta(call_effect(desc)),
        Instruction::Jump { opcode, .. } => match opcode.as_str() {
            "GOTO" => Reset,
            "JSR" => Delta(1),
            op if op.starts_with("IF_") => Delta(-2),
            _ => Delta(-1),
        },
        Instruction::Ldc { value_type, .. } => match value_type.as_str() {
            "Long" | "Double" => Delta(2),
            _ => Delta(1),
        },
        Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => Reset,
    }
}

fn call_effect(descriptor: &str) -> i32 {
    match parse_method_descriptor(descriptor) {
        Some((args, ret)) => {
            let popped: i32 = args.iter().map(|arg| i32::from(slot_size(arg))).sum();
            i32::from(slot_size(ret)) - popped
        }
        None => 0,
    }
}

fn insn_effect(opcode: &str) -> Effect {
    use Effect::{Delta, Reset};
    match opcode {
        "NOP" | "SWAP" | "INEG" | "LNEG" | "FNEG" | "DNEG" | "I2F" | "F2I" | "L2D" | "D2L"
        | "I2B" | "I2C" | "I2S" | "ARRAYLENGTH" | "LALOAD" | "DALOAD" => Delta(0),
        "ACONST_NULL" | "DUP" | "DUP_X1" | "DUP_X2" | "I2L" | "I2D" | "F2L" | "F2D" => Delta(1),
        "DUP2" | "DUP2_X1" | "DUP2_X2" | "LCONST_0" | "LCONST_1" | "DCONST_0" | "DCONST_1" => {
            Delta(2)
        }
        "POP2" | "LADD" | "LSUB" | "LMUL" | "LDIV" | "LREM" | "LAND" | "LOR" | "LXOR" | "DADD"
        | "DSUB" | "DMUL" | "DDIV" | "DREM" => Delta(-2),
        "LCMP" | "DCMPL" | "DCMPG" | "IASTORE" | "FASTORE" | "AASTORE" | "BASTORE" | "CASTORE"
        | "SASTORE" => Delta(-3),
        "LASTORE" | "DASTORE" => Delta(-4),
        "L2I" | "L2F" | "D2I" | "D2F" => Delta(-1),
        "RETURN" | "IRETURN" | "LRETURN" | "FRETURN" | "DRETURN" | "ARETURN" | "ATHROW" => Reset,
        op if op.starts_with("ICONST_") || op.starts_with("FCONST_") => Delta(1),
        _ => Delta(-1),
    }
}

fn check_field_descriptor(descriptor: &str) -> Result<(), Error> {
    if is_valid_field_descriptor(descriptor) {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::Usage)
            .with_message(format!("malformed field descriptor '{descriptor}'"))
            .with_hint("Use a JVM field descriptor such as 'I' or 'Ljava/lang/String;'."))
    }
}

fn check_method_descriptor(descriptor: &str) -> Result<(Vec<&str>, &str), Error> {
    parse_method_descriptor(descriptor).ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("malformed method descriptor '{descriptor}'"))
            .with_hint("Use a JVM method descriptor such as '(I)V' or '()Ljava/lang/String;'.")
    })
}

fn member_missing(class_name: &str, member: &str) -> Error {
    Error::new(ErrorKind::NotFound).with_message(format!(
        "member '{member}' not found in class {class_name}"
    ))
}
