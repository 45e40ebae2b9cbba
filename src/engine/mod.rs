//! Purpose: Engine contracts consumed by the Bridge plus the bundled reference engine.
//! Exports: `ResourceImporter`, `Decompiler`, `Assembler`, `Compiler`, `Services`,
//! compile request/result types, and the engine submodules.
//! Role: The Bridge sees only these traits and the deterministic services below;
//! tests swap implementations through `Services`.
//! Invariants: Every trait object is `Send + Sync` so handlers can run on worker threads.
//! Invariants: Assembler stages report structured errors instead of failing fast.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;

pub mod archive;
pub mod assembler;
pub mod bytecode;
pub mod decompiler;
pub mod graph;
pub mod mapping;
pub mod model;
pub mod patch;
pub mod search;

use assembler::{ParsedClass, Token};
use model::{ClassInfo, MethodMember, Workspace};

/// Loads an archive from disk into a workspace.
pub trait ResourceImporter: Send + Sync {
    fn import(&self, path: &Path) -> Result<Workspace, Error>;
}

pub trait Decompiler: Send + Sync {
    fn name(&self) -> &str;
    fn decompile(&self, workspace: &Workspace, class: &ClassInfo) -> Result<String, Error>;
}

/// One assembler diagnostic; `line` is 1-based, 0 when not tied to a line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblerError {
    pub line: usize,
    pub message: String,
}

impl AssemblerError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for AssemblerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            f.write_str(&self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

pub type AssemblerResult<T> = Result<T, Vec<AssemblerError>>;

/// Text assembler pipeline: tokenize, parse, then assemble against the class it replaces.
pub trait Assembler: Send + Sync {
    fn disassemble_class(&self, class: &ClassInfo) -> Result<String, Error>;
    fn disassemble_method(&self, class: &ClassInfo, method: &MethodMember)
    -> Result<String, Error>;
    fn tokenize(&self, source: &str) -> AssemblerResult<Vec<Token>>;
    fn parse(&self, tokens: &[Token]) -> AssemblerResult<ParsedClass>;
    fn assemble(&self, parsed: ParsedClass, existing: &ClassInfo) -> AssemblerResult<ClassInfo>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileRequest {
    /// Dotted class name, e.g. `com.example.Main`.
    pub class_name: String,
    pub source: String,
    pub target_version: Option<u32>,
    pub debug: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerDiagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub level: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompilerResult {
    pub success: bool,
    pub diagnostics: Vec<CompilerDiagnostic>,
    /// Compiled class images keyed by dotted class name.
    pub compilations: BTreeMap<String, Vec<u8>>,
}

pub trait Compiler: Send + Sync {
    fn compile(&self, workspace: &Workspace, request: &CompileRequest)
    -> Result<CompilerResult, Error>;
}

/// The engine services one Bridge instance runs against.
#[derive(Clone)]
pub struct Services {
    pub importer: Arc<dyn ResourceImporter>,
    pub decompiler: Arc<dyn Decompiler>,
    pub assembler: Arc<dyn Assembler>,
    pub compiler: Option<Arc<dyn Compiler>>,
}

impl Services {
    /// Reference engine: JSON archives, skeleton decompiler, text assembler, no compiler.
    pub fn bundled() -> Self {
        Self {
            importer: Arc::new(archive::JsonArchiveImporter),
            decompiler: Arc::new(decompiler::SkeletonDecompiler),
            assembler: Arc::new(assembler::TextAssembler),
            compiler: None,
        }
    }

    pub fn with_decompiler(mut self, decompiler: Arc<dyn Decompiler>) -> Self {
        self.decompiler = decompiler;
        self
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("decompiler", &self.decompiler.name())
            .field("compiler", &self.compiler.is_some())
            .finish()
    }
}
