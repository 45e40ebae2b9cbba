//! Purpose: Line-oriented textual assembler and disassembler for the class model.
//! Exports: `TextAssembler`, `Token`, `ParsedClass`.
//! Role: Default `Assembler` of the reference engine; `/disassemble*` and `/assemble` use it.
//! Invariants: One directive or instruction per line; `//` starts a comment line.
//! Invariants: Each stage collects every error it can find before failing.
//! Invariants: `assemble(parse(tokenize(disassemble(c))))` reproduces `c` minus any
//! attached source text.
//!
//! Text format:
//!   .class <name>            .access <flags>        .version <major>
//!   .super <name|->          .implements <name>     .field <name> <desc> <flags>
//!   .method <name> <desc> <flags> ... .end
//!   inside a method: .limits <stack> <locals>, .catch <start> <end> <handler> <type|*>,
//!   .local <name> <desc> <index>, and instruction lines led by their kind
//!   (LABEL, LINE, INSN, INT, VAR, TYPE, FIELD, METHOD, INVOKEDYNAMIC, JUMP, LDC,
//!   IINC, TABLESWITCH, LOOKUPSWITCH). LDC values are JSON string literals.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::str::FromStr;

use serde_json::Value;

use crate::core::error::Error;
use crate::engine::bytecode::compute_maxs;
use crate::engine::model::{
    ClassInfo, FieldMember, Instruction, LocalVariable, MethodMember, TryCatchBlock,
    is_valid_field_descriptor, parse_method_descriptor,
};
use crate::engine::{Assembler, AssemblerError, AssemblerResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub line: usize,
    /// Whitespace-separated words; quoted literals keep their quotes.
    pub words: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedClass {
    pub class: ClassInfo,
    pub has_version: bool,
    /// Parallel to `class.methods`: whether `.limits` was given.
    pub explicit_limits: Vec<bool>,
    /// Source line of each method's `.method` directive.
    pub method_lines: Vec<usize>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TextAssembler;

impl Assembler for TextAssembler {
    fn disassemble_class(&self, class: &ClassInfo) -> Result<String, Error> {
        let mut out = String::new();
        let _ = writeln!(out, ".class {}", class.name);
        let _ = writeln!(out, ".access {}", class.access);
        let _ = writeln!(out, ".version {}", class.version);
        let _ = writeln!(out, ".super {}", class.super_name.as_deref().unwrap_or("-"));
        for interface in &class.interfaces {
            let _ = writeln!(out, ".implements {interface}");
        }
        for field in &class.fields {
            let _ = writeln!(out, ".field {} {} {}", field.name, field.descriptor, field.access);
        }
        for method in &class.methods {
            out.push('\n');
            write_method(&mut out, method);
        }
        Ok(out)
    }

    fn disassemble_method(
        &self,
        _class: &ClassInfo,
        method: &MethodMember,
    ) -> Result<String, Error> {
        let mut out = String::new();
        write_method(&mut out, method);
        Ok(out)
    }

    fn tokenize(&self, source: &str) -> AssemblerResult<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with("//") {
                continue;
            }
            match split_words(text) {
                Ok(words) => tokens.push(Token { line, words }),
                Err(message) => errors.push(AssemblerError::new(line, message)),
            }
        }
        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }

    fn parse(&self, tokens: &[Token]) -> AssemblerResult<ParsedClass> {
        Parser::default().run(tokens)
    }

    fn assemble(&self, parsed: ParsedClass, existing: &ClassInfo) -> AssemblerResult<ClassInfo> {
        let ParsedClass {
            mut class,
            has_version,
            explicit_limits,
            method_lines,
        } = parsed;
        let mut errors = Vec::new();
        if !has_version {
            class.version = existing.version;
        }

        let mut field_names = HashSet::new();
        for field in &class.fields {
            if !is_valid_field_descriptor(&field.descriptor) {
                errors.push(AssemblerError::new(
                    0,
                    format!("field {} has malformed descriptor '{}'", field.name, field.descriptor),
                ));
            }
            if !field_names.insert(field.name.as_str()) {
                errors.push(AssemblerError::new(0, format!("duplicate field {}", field.name)));
            }
        }

        let mut method_keys = HashSet::new();
        for (index, method) in class.methods.iter_mut().enumerate() {
            let line = method_lines.get(index).copied().unwrap_or(0);
            if parse_method_descriptor(&method.descriptor).is_none() {
                errors.push(AssemblerError::new(
                    line,
                    format!("method {} has malformed descriptor '{}'", method.name, method.descriptor),
                ));
            }
            if !method_keys.insert(format!("{}{}", method.name, method.descriptor)) {
                errors.push(AssemblerError::new(
                    line,
                    format!("duplicate method {}{}", method.name, method.descriptor),
                ));
            }
            check_labels(method, line, &mut errors);
            if !explicit_limits.get(index).copied().unwrap_or(false) {
                let (max_stack, max_locals) = compute_maxs(method);
                method.max_stack = max_stack;
                method.max_locals = max_locals;
            }
        }

        if errors.is_empty() {
            Ok(class)
        } else {
            Err(errors)
        }
    }
}

fn check_labels(method: &MethodMember, line: usize, errors: &mut Vec<AssemblerError>) {
    let mut labels = HashSet::new();
    for insn in &method.instructions {
        if let Instruction::Label { name } = insn {
            if !labels.insert(name.as_str()) {
                errors.push(AssemblerError::new(
                    line,
                    format!("duplicate label {name} in {}{}", method.name, method.descriptor),
                ));
            }
        }
    }
    let mut require = |label: &str| {
        if !labels.contains(label) {
            errors.push(AssemblerError::new(
                line,
                format!("undefined label {label} in {}{}", method.name, method.descriptor),
            ));
        }
    };
    for insn in &method.instructions {
        if let Instruction::Jump { target, .. } = insn {
            require(target);
        }
    }
    for block in &method.try_catch_blocks {
        require(&block.start);
        require(&block.end);
        require(&block.handler);
    }
}

fn write_method(out: &mut String, method: &MethodMember) {
    let _ = writeln!(out, ".method {} {} {}", method.name, method.descriptor, method.access);
    let _ = writeln!(out, ".limits {} {}", method.max_stack, method.max_locals);
    for insn in &method.instructions {
        let _ = writeln!(out, "    {}", render_instruction(insn));
    }
    for block in &method.try_catch_blocks {
        let _ = writeln!(
            out,
            ".catch {} {} {} {}",
            block.start,
            block.end,
            block.handler,
            block.catch_type.as_deref().unwrap_or("*")
        );
    }
    for local in &method.local_variables {
        let _ = writeln!(out, ".local {} {} {}", local.name, local.desc, local.index);
    }
    out.push_str(".end\n");
}

fn render_instruction(insn: &Instruction) -> String {
    match insn {
        Instruction::Label { name } => format!("LABEL {name}"),
        Instruction::Line { line } => format!("LINE {line}"),
        Instruction::Insn { opcode } => format!("INSN {opcode}"),
        Instruction::Int { opcode, operand } => format!("INT {opcode} {operand}"),
        Instruction::Var { opcode, var } => format!("VAR {opcode} {var}"),
        Instruction::Type { opcode, desc } => format!("TYPE {opcode} {desc}"),
        Instruction::Field {
            opcode,
            owner,
            name,
            desc,
        } => format!("FIELD {opcode} {owner} {name} {desc}"),
        Instruction::Method {
            opcode,
            owner,
            name,
            desc,
        } => format!("METHOD {opcode} {owner} {name} {desc}"),
        Instruction::InvokeDynamic { name, desc, bsm } => {
            format!("INVOKEDYNAMIC {name} {desc} {bsm}")
        }
        Instruction::Jump { opcode, target } => format!("JUMP {opcode} {target}"),
        Instruction::Ldc { value, value_type } => {
            format!("LDC {value_type} {}", Value::String(value.clone()))
        }
        Instruction::Iinc { var, incr } => format!("IINC {var} {incr}"),
        Instruction::TableSwitch { min, max } => format!("TABLESWITCH {min} {max}"),
        Instruction::LookupSwitch { keys } => {
            let mut text = "LOOKUPSWITCH".to_string();
            for key in keys {
                let _ = write!(text, " {key}");
            }
            text
        }
    }
}

fn split_words(text: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        if ch == '"' {
            chars.next();
            let mut escaped = false;
            let mut end = None;
            for (index, c) in chars.by_ref() {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    end = Some(index + 1);
                    break;
                }
            }
            let end = end.ok_or_else(|| "unterminated string literal".to_string())?;
            if chars.peek().is_some_and(|&(_, next)| !next.is_whitespace()) {
                return Err("string literal must be followed by whitespace".to_string());
            }
            words.push(text[start..end].to_string());
        } else {
            let mut end = text.len();
            while let Some(&(index, c)) = chars.peek() {
                if c.is_whitespace() {
                    end = index;
                    break;
                }
                chars.next();
            }
            words.push(text[start..end].to_string());
        }
    }
    Ok(words)
}

struct OpenMethod {
    method: MethodMember,
    explicit_limits: bool,
    line: usize,
}

#[derive(Default)]
struct Parser {
    class: Option<ClassInfo>,
    has_version: bool,
    explicit_limits: Vec<bool>,
    method_lines: Vec<usize>,
    open: Option<OpenMethod>,
    errors: Vec<AssemblerError>,
}

impl Parser {
    fn run(mut self, tokens: &[Token]) -> AssemblerResult<ParsedClass> {
        for token in tokens {
            if let Err(message) = self.accept(token) {
                self.errors.push(AssemblerError::new(token.line, message));
            }
        }
        if let Some(open) = self.open.take() {
            self.errors.push(AssemblerError::new(
                open.line,
                format!("method {} is missing .end", open.method.name),
            ));
        }
        match self.class {
            Some(class) if self.errors.is_empty() => Ok(ParsedClass {
                class,
                has_version: self.has_version,
                explicit_limits: self.explicit_limits,
                method_lines: self.method_lines,
            }),
            Some(_) => Err(self.errors),
            None => {
                self.errors
                    .insert(0, AssemblerError::new(0, "missing .class directive"));
                Err(self.errors)
            }
        }
    }

    fn accept(&mut self, token: &Token) -> Result<(), String> {
        let words: Vec<&str> = token.words.iter().map(String::as_str).collect();
        let Some((&head, args)) = words.split_first() else {
            return Ok(());
        };

        if head == ".class" {
            let [name] = arity::<1>(head, args)?;
            if self.class.is_some() {
                return Err("duplicate .class directive".to_string());
            }
            let mut class = ClassInfo::new(name);
            class.super_name = None;
            self.class = Some(class);
            return Ok(());
        }

        if let Some(open) = self.open.as_mut() {
            return match head {
                ".limits" => {
                    let [stack, locals] = arity::<2>(head, args)?;
                    open.method.max_stack = number(stack)?;
                    open.method.max_locals = number(locals)?;
                    open.explicit_limits = true;
                    Ok(())
                }
                ".catch" => {
                    let [start, end, handler, kind] = arity::<4>(head, args)?;
                    open.method.try_catch_blocks.push(TryCatchBlock {
                        start: start.to_string(),
                        end: end.to_string(),
                        handler: handler.to_string(),
                        catch_type: (kind != "*").then(|| kind.to_string()),
                    });
                    Ok(())
                }
                ".local" => {
                    let [name, desc, index] = arity::<3>(head, args)?;
                    open.method.local_variables.push(LocalVariable {
                        name: name.to_string(),
                        desc: desc.to_string(),
                        index: number(index)?,
                    });
                    Ok(())
                }
                ".end" => {
                    arity::<0>(head, args)?;
                    self.close_method()
                }
                ".method" => Err(format!(
                    "method {} is missing .end before a new .method",
                    open.method.name
                )),
                directive if directive.starts_with('.') => {
                    Err(format!("directive {directive} is not allowed inside a method"))
                }
                _ => {
                    let insn = parse_instruction(head, args)?;
                    open.method.instructions.push(insn);
                    Ok(())
                }
            };
        }

        let class = self
            .class
            .as_mut()
            .ok_or_else(|| format!("{head} before .class directive"))?;
        match head {
            ".access" => {
                let [flags] = arity::<1>(head, args)?;
                class.access = number(flags)?;
            }
            ".version" => {
                let [version] = arity::<1>(head, args)?;
                class.version = number(version)?;
                self.has_version = true;
            }
            ".super" => {
                let [name] = arity::<1>(head, args)?;
                class.super_name = (name != "-").then(|| name.to_string());
            }
            ".implements" => {
                let [name] = arity::<1>(head, args)?;
                class.interfaces.push(name.to_string());
            }
            ".field" => {
                let [name, desc, flags] = arity::<3>(head, args)?;
                class.fields.push(FieldMember {
                    name: name.to_string(),
                    descriptor: desc.to_string(),
                    access: number(flags)?,
                });
            }
            ".method" => {
                let [name, desc, flags] = arity::<3>(head, args)?;
                self.open = Some(OpenMethod {
                    method: MethodMember::new(name, desc, number(flags)?),
                    explicit_limits: false,
                    line: token.line,
                });
            }
            ".end" => return Err(".end without an open .method".to_string()),
            directive if directive.starts_with('.') => {
                return Err(format!("unknown directive {directive}"));
            }
            kind => return Err(format!("instruction {kind} outside of a method")),
        }
        Ok(())
    }

    fn close_method(&mut self) -> Result<(), String> {
        let open = self
            .open
            .take()
            .ok_or_else(|| ".end without an open .method".to_string())?;
        let class = self
            .class
            .as_mut()
            .ok_or_else(|| "missing .class directive".to_string())?;
        class.methods.push(open.method);
        self.explicit_limits.push(open.explicit_limits);
        self.method_lines.push(open.line);
        Ok(())
    }
}

fn arity<'a, const N: usize>(head: &str, args: &[&'a str]) -> Result<[&'a str; N], String> {
    <[&str; N]>::try_from(args).map_err(|_| {
        format!("{head} expects {N} operand(s), found {}", args.len())
    })
}

fn number<T: FromStr>(text: &str) -> Result<T, String> {
    text.parse()
        .map_err(|_| format!("invalid number '{text}'"))
}

const INT_OPS: &[&str] = &["BIPUSH", "SIPUSH", "NEWARRAY"];
const VAR_OPS: &[&str] = &[
    "ILOAD", "LLOAD", "FLOAD", "DLOAD", "ALOAD", "ISTORE", "LSTORE", "FSTORE", "DSTORE", "ASTORE",
    "RET",
];
const TYPE_OPS: &[&str] = &["NEW", "ANEWARRAY", "CHECKCAST", "INSTANCEOF"];
const FIELD_OPS: &[&str] = &["GETSTATIC", "PUTSTATIC", "GETFIELD", "PUTFIELD"];
const METHOD_OPS: &[&str] = &[
    "INVOKEVIRTUAL",
    "INVOKESPECIAL",
    "INVOKESTATIC",
    "INVOKEINTERFACE",
];
const JUMP_OPS: &[&str] = &[
    "IFEQ", "IFNE", "IFLT", "IFGE", "IFGT", "IFLE", "IF_ICMPEQ", "IF_ICMPNE", "IF_ICMPLT",
    "IF_ICMPGE", "IF_ICMPGT", "IF_ICMPLE", "IF_ACMPEQ", "IF_ACMPNE", "GOTO", "JSR", "IFNULL",
    "IFNONNULL",
];
const LDC_TYPES: &[&str] = &["String", "Integer", "Long", "Float", "Double", "Type"];

fn opcode(kind: &str, op: &str, allowed: &[&str]) -> Result<String, String> {
    if allowed.contains(&op) {
        Ok(op.to_string())
    } else {
        Err(format!("{op} is not a {kind} opcode"))
    }
}

fn parse_instruction(kind: &str, args: &[&str]) -> Result<Instruction, String> {
    let insn = match kind {
        "LABEL" => {
            let [name] = arity::<1>(kind, args)?;
            Instruction::Label {
                name: name.to_string(),
            }
        }
        "LINE" => {
            let [line] = arity::<1>(kind, args)?;
            Instruction::Line {
                line: number(line)?,
            }
        }
        "INSN" => {
            let [op] = arity::<1>(kind, args)?;
            if op.is_empty()
                || !op
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(format!("invalid opcode '{op}'"));
            }
            Instruction::insn(op)
        }
        "INT" => {
            let [op, operand] = arity::<2>(kind, args)?;
            Instruction::Int {
                opcode: opcode(kind, op, INT_OPS)?,
                operand: number(operand)?,
            }
        }
        "VAR" => {
            let [op, var] = arity::<2>(kind, args)?;
            Instruction::Var {
                opcode: opcode(kind, op, VAR_OPS)?,
                var: number(var)?,
            }
        }
        "TYPE" => {
            let [op, desc] = arity::<2>(kind, args)?;
            Instruction::Type {
                opcode: opcode(kind, op, TYPE_OPS)?,
                desc: desc.to_string(),
            }
        }
        "FIELD" => {
            let [op, owner, name, desc] = arity::<4>(kind, args)?;
            if !is_valid_field_descriptor(desc) {
                return Err(format!("malformed field descriptor '{desc}'"));
            }
            Instruction::Field {
                opcode: opcode(kind, op, FIELD_OPS)?,
                owner: owner.to_string(),
                name: name.to_string(),
                desc: desc.to_string(),
            }
        }
        "METHOD" => {
            let [op, owner, name, desc] = arity::<4>(kind, args)?;
            if parse_method_descriptor(desc).is_none() {
                return Err(format!("malformed method descriptor '{desc}'"));
            }
            Instruction::Method {
                opcode: opcode(kind, op, METHOD_OPS)?,
                owner: owner.to_string(),
                name: name.to_string(),
                desc: desc.to_string(),
            }
        }
        "INVOKEDYNAMIC" => {
            let [name, desc, bsm] = arity::<3>(kind, args)?;
            Instruction::InvokeDynamic {
                name: name.to_string(),
                desc: desc.to_string(),
                bsm: bsm.to_string(),
            }
        }
        "JUMP" => {
            let [op, target] = arity::<2>(kind, args)?;
            Instruction::Jump {
                opcode: opcode(kind, op, JUMP_OPS)?,
                target: target.to_string(),
            }
        }
        "LDC" => {
            let [value_type, literal] = arity::<2>(kind, args)?;
            if !LDC_TYPES.contains(&value_type) {
                return Err(format!("unsupported constant type {value_type}"));
            }
            let value: String = serde_json::from_str(literal)
                .map_err(|_| format!("LDC value must be a string literal, found {literal}"))?;
            Instruction::Ldc {
                value,
                value_type: value_type.to_string(),
            }
        }
        "IINC" => {
            let [var, incr] = arity::<2>(kind, args)?;
            Instruction::Iinc {
                var: number(var)?,
                incr: number(incr)?,
            }
        }
        "TABLESWITCH" => {
            let [min, max] = arity::<2>(kind, args)?;
            Instruction::TableSwitch {
                min: number(min)?,
                max: number(max)?,
            }
        }
        "LOOKUPSWITCH" => Instruction::LookupSwitch {
            keys: args.iter().map(|key| number(key)).collect::<Result<_, _>>()?,
        },
        other => return Err(format!("unknown instruction kind {other}")),
    };
    Ok(insn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::{ACC_PUBLIC, ACC_STATIC};

    fn sample_class() -> ClassInfo {
        let mut class = ClassInfo::new("com/x/Main");
        class.interfaces.push("java/lang/Runnable".to_string());
        class.fields.push(FieldMember {
            name: "greeting".to_string(),
            descriptor: "Ljava/lang/String;".to_string(),
            access: 2,
        });
        let mut main = MethodMember::new("main", "([Ljava/lang/String;)V", ACC_PUBLIC | ACC_STATIC);
        main.max_stack = 2;
        main.max_locals = 1;
        main.instructions = vec![
            Instruction::Label {
                name: "L0".to_string(),
            },
            Instruction::Line { line: 3 },
            Instruction::Field {
                opcode: "GETSTATIC".to_string(),
                owner: "java/lang/System".to_string(),
                name: "out".to_string(),
                desc: "Ljava/io/PrintStream;".to_string(),
            },
            Instruction::Ldc {
                value: "hello \"world\"\n".to_string(),
                value_type: "String".to_string(),
            },
            Instruction::Method {
                opcode: "INVOKEVIRTUAL".to_string(),
                owner: "java/io/PrintStream".to_string(),
                name: "println".to_string(),
                desc: "(Ljava/lang/String;)V".to_string(),
            },
            Instruction::Label {
                name: "L1".to_string(),
            },
            Instruction::insn("RETURN"),
            Instruction::Label {
                name: "L2".to_string(),
            },
            Instruction::insn("ATHROW"),
        ];
        main.try_catch_blocks.push(TryCatchBlock {
            start: "L0".to_string(),
            end: "L1".to_string(),
            handler: "L2".to_string(),
            catch_type: None,
        });
        main.local_variables.push(LocalVariable {
            name: "args".to_string(),
            desc: "[Ljava/lang/String;".to_string(),
            index: 0,
        });
        class.methods.push(main);
        class
    }

    fn pipeline(source: &str, existing: &ClassInfo) -> AssemblerResult<ClassInfo> {
        let assembler = TextAssembler;
        let tokens = assembler.tokenize(source)?;
        let parsed = assembler.parse(&tokens)?;
        assembler.assemble(parsed, existing)
    }

    #[test]
    fn disassembly_round_trips() {
        let mut class = sample_class();
        let text = TextAssembler.disassemble_class(&class).expect("disassemble");
        assert!(text.starts_with(".class com/x/Main\n.access 1\n.version 52\n.super java/lang/Object\n"));
        class.source = Some("ignored".to_string());
        let rebuilt = pipeline(&text, &class).expect("assemble");
        class.source = None;
        assert_eq!(rebuilt, class);
    }

    #[test]
    fn method_disassembly_is_a_single_block() {
        let class = sample_class();
        let text = TextAssembler
            .disassemble_method(&class, &class.methods[0])
            .expect("disassemble");
        assert!(text.starts_with(".method main ([Ljava/lang/String;)V 9\n.limits 2 1\n"));
        assert!(text.contains("    LDC String \"hello \\\"world\\\"\\n\"\n"));
        assert!(text.contains(".catch L0 L1 L2 *\n"));
        assert!(text.ends_with(".end\n"));
    }

    #[test]
    fn tokenizer_reports_unterminated_literals() {
        let errors = TextAssembler
            .tokenize(".class A\n.method m ()V 1\nLDC String \"oops\n.end")
            .expect_err("unterminated");
        assert_eq!(errors, vec![AssemblerError::new(3, "unterminated string literal")]);
    }

    #[test]
    fn parser_collects_every_error() {
        let tokens = TextAssembler
            .tokenize(".class A\n.bogus\n.method m ()V 1\nWHAT X\nINT BIPUSH many\n")
            .expect("tokenize");
        let errors = TextAssembler.parse(&tokens).expect_err("parse");
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 4, 5, 3]);
        assert_eq!(errors[3].message, "method m is missing .end");
    }

    #[test]
    fn parser_requires_class_directive() {
        let tokens = TextAssembler.tokenize(".access 1").expect("tokenize");
        let errors = TextAssembler.parse(&tokens).expect_err("parse");
        assert_eq!(errors[0].message, "missing .class directive");
    }

    #[test]
    fn assembler_checks_labels_and_fills_limits() {
        let existing = ClassInfo::new("A");
        let source = ".class A\n.method m (J)I 1\nJUMP GOTO nowhere\n.end\n";
        let errors = pipeline(source, &existing).expect_err("labels");
        assert_eq!(errors[0].message, "undefined label nowhere in m(J)I");
        assert_eq!(errors[0].line, 2);

        let source = ".class A\n.method m (J)I 1\nINSN ICONST_0\nINSN IRETURN\n.end\n";
        let class = pipeline(source, &existing).expect("assemble");
        let method = &class.methods[0];
        assert_eq!((method.max_stack, method.max_locals), (1, 3));
        assert_eq!(class.version, existing.version);
        assert!(class.super_name.is_none());
    }

    #[test]
    fn assembler_rejects_duplicates_and_bad_descriptors() {
        let existing = ClassInfo::new("A");
        let source = ".class A\n.field x I 1\n.field x Q 1\n";
        let errors = pipeline(source, &existing).expect_err("fields");
        assert_eq!(errors.len(), 2);
    }
}
