//! # Descriptor Pool — Loading and Linking
//!
//! A [`DescriptorPool`] is an immutable set of linked message and enum
//! descriptors together with the files that declared them. Pools are
//! never edited in place. [`PoolBuilder`] takes a base pool (empty for a
//! reload, the current pool for an incremental `parse`), loads new files
//! into it, and produces a fresh pool or an error; the base is untouched
//! either way.
//!
//! ## Build Phases
//!
//! 1. **Load.** The requested file and, recursively, its imports are
//!    located through the path map, read, size-checked and parsed. Imports
//!    load before their importers. A file that imports itself through any
//!    chain is an [`ParseError::ImportCycle`]. Files already in the base
//!    pool are not read again.
//!
//! 2. **Link.** Every qualified name declared by the new files is
//!    registered first, so forward and mutual references resolve. Enums
//!    are built next (field defaults need them), then messages. Type
//!    references are resolved with protobuf scoping: starting at the
//!    referencing message and walking outwards to the root; a leading `.`
//!    makes the name fully qualified.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use dynproto_core::wire::MAX_FIELD_NUMBER;
use dynproto_core::{
    DynamicValue, EnumDescriptor, FieldDescriptor, FieldKind, ParseError, Presence, ScalarKind,
    SchemaDescriptor, Syntax,
};
use tracing::debug;

use crate::parser::{parse_file, Constant, EnumAst, FileAst, ImportKind, Label, MessageAst, TypeAst};
use crate::path::VirtualPathMap;
use crate::source::SourceTree;

/// Largest schema source file accepted, in bytes.
pub const MAX_SOURCE_SIZE: usize = 4 * 1024 * 1024;

/// Field numbers reserved for the protobuf implementation.
const IMPLEMENTATION_RESERVED: std::ops::RangeInclusive<u32> = 19_000..=19_999;

/// A schema file that has been loaded into a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Virtual name, as passed to `parse` or written in an `import`.
    pub name: String,
    /// Real path the text was read from.
    pub real_path: String,
    pub syntax: Syntax,
    pub package: Option<String>,
    /// Virtual names of the direct imports that were loaded.
    pub imports: Vec<String>,
    /// Qualified names of every message declared in the file, nested
    /// messages included, in declaration order.
    pub messages: Vec<String>,
    /// Qualified names of every enum declared in the file.
    pub enums: Vec<String>,
}

/// An immutable, fully linked set of schemas.
#[derive(Debug, Clone, Default)]
pub struct DescriptorPool {
    messages: HashMap<String, Arc<SchemaDescriptor>>,
    enums: HashMap<String, Arc<EnumDescriptor>>,
    files: BTreeMap<String, Arc<FileEntry>>,
}

impl DescriptorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a message by qualified name, with or without a leading `.`.
    pub fn message(&self, name: &str) -> Option<&Arc<SchemaDescriptor>> {
        self.messages.get(strip_leading_dot(name))
    }

    /// Look up an enum by qualified name, with or without a leading `.`.
    pub fn enum_type(&self, name: &str) -> Option<&Arc<EnumDescriptor>> {
        self.enums.get(strip_leading_dot(name))
    }

    /// Whether a message schema of this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.message(name).is_some()
    }

    /// Whether a file of this virtual name has been loaded.
    pub fn contains_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn file(&self, name: &str) -> Option<&Arc<FileEntry>> {
        self.files.get(name)
    }

    /// Loaded files, ordered by virtual name.
    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.values().map(Arc::as_ref)
    }

    /// All message names, sorted.
    pub fn message_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.messages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// All enum names, sorted.
    pub fn enum_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.enums.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of message schemas.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

fn strip_leading_dot(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

/// Parent scope of a qualified name; `None` at the root.
fn parent_scope(scope: &str) -> Option<&str> {
    if scope.is_empty() {
        None
    } else {
        Some(scope.rfind('.').map_or("", |i| &scope[..i]))
    }
}

#[derive(Debug)]
struct LoadedFile {
    ast: FileAst,
    real_path: String,
}

/// Incremental builder for a new pool.
pub struct PoolBuilder<'a> {
    base: DescriptorPool,
    paths: &'a VirtualPathMap,
    source: &'a dyn SourceTree,
    loaded: Vec<LoadedFile>,
    seen: HashSet<String>,
    stack: Vec<String>,
}

impl<'a> PoolBuilder<'a> {
    /// Start from `base`. Files already in `base` are treated as loaded.
    pub fn new(base: DescriptorPool, paths: &'a VirtualPathMap, source: &'a dyn SourceTree) -> Self {
        Self { base, paths, source, loaded: Vec::new(), seen: HashSet::new(), stack: Vec::new() }
    }

    /// Load `name` and everything it imports.
    pub fn load(&mut self, name: &str) -> Result<(), ParseError> {
        if self.base.contains_file(name) || self.seen.contains(name) {
            return Ok(());
        }
        if let Some(start) = self.stack.iter().position(|f| f == name) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(name.to_string());
            return Err(ParseError::ImportCycle { chain: chain.join(" -> ") });
        }

        let real_path = self.locate(name)?;
        let text = self
            .source
            .read(&real_path)
            .map_err(|source| ParseError::Io { file: real_path.clone(), source })?;
        if text.len() > MAX_SOURCE_SIZE {
            return Err(ParseError::TooLarge { file: real_path, size: text.len(), limit: MAX_SOURCE_SIZE });
        }
        let ast = parse_file(name, &text)?;
        debug!(file = %name, real_path = %real_path, "loaded schema file");

        self.stack.push(name.to_string());
        for import in &ast.imports {
            if import.kind == ImportKind::Weak
                && !self.base.contains_file(&import.path)
                && !self.seen.contains(&import.path)
                && self.locate(&import.path).is_err()
            {
                debug!(file = %name, import = %import.path, "skipping missing weak import");
                continue;
            }
            self.load(&import.path)?;
        }
        self.stack.pop();

        self.seen.insert(name.to_string());
        self.loaded.push(LoadedFile { ast, real_path });
        Ok(())
    }

    fn locate(&self, name: &str) -> Result<String, ParseError> {
        let tried = self.paths.candidates(name);
        match tried.iter().find(|path| self.source.exists(path)) {
            Some(path) => Ok(path.clone()),
            None => Err(ParseError::NotFound { file: name.to_string(), tried }),
        }
    }

    /// Link the loaded files into a new pool.
    pub fn finish(self) -> Result<DescriptorPool, ParseError> {
        let mut linker = Linker::new(&self.base, &self.loaded)?;
        linker.build_enums()?;
        linker.build_messages()?;

        let Linker { messages, enums, new_messages, new_enums, .. } = linker;
        let mut pool = self.base.clone();
        for loaded in &self.loaded {
            let ast = &loaded.ast;
            let entry = FileEntry {
                name: ast.name.clone(),
                real_path: loaded.real_path.clone(),
                syntax: ast.syntax,
                package: ast.package.clone(),
                imports: ast
                    .imports
                    .iter()
                    .filter(|i| self.seen.contains(&i.path) || self.base.contains_file(&i.path))
                    .map(|i| i.path.clone())
                    .collect(),
                messages: messages.iter().filter(|m| m.file.ast.name == ast.name).map(|m| m.name.clone()).collect(),
                enums: enums.iter().filter(|e| e.file.ast.name == ast.name).map(|e| e.name.clone()).collect(),
            };
            pool.files.insert(entry.name.clone(), Arc::new(entry));
        }
        pool.enums.extend(new_enums.into_iter().map(|(k, v)| (k, Arc::new(v))));
        pool.messages.extend(new_messages.into_iter().map(|(k, v)| (k, Arc::new(v))));
        Ok(pool)
    }
}

// ── Linking ─────────────────────────────────────────────────────────

struct MessageSite<'f> {
    name: String,
    ast: &'f MessageAst,
    file: &'f LoadedFile,
}

struct EnumSite<'f> {
    name: String,
    ast: &'f EnumAst,
    file: &'f LoadedFile,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Message,
    Enum,
}

struct Linker<'f> {
    base: &'f DescriptorPool,
    messages: Vec<MessageSite<'f>>,
    enums: Vec<EnumSite<'f>>,
    /// Names declared by the new files, with the declaring file.
    declared: HashMap<String, (DeclKind, &'f str)>,
    new_enums: HashMap<String, EnumDescriptor>,
    new_messages: HashMap<String, SchemaDescriptor>,
}

impl<'f> Linker<'f> {
    /// Collect every declaration and reject duplicate names.
    fn new(base: &'f DescriptorPool, files: &'f [LoadedFile]) -> Result<Self, ParseError> {
        let mut messages = Vec::new();
        let mut enums = Vec::new();
        for file in files {
            let scope = file.ast.package.as_deref().unwrap_or("");
            for e in &file.ast.enums {
                enums.push(EnumSite { name: qualify(scope, &e.name), ast: e, file });
            }
            for m in &file.ast.messages {
                collect_message(scope, m, file, &mut messages, &mut enums);
            }
        }

        let mut declared: HashMap<String, (DeclKind, &'f str)> = HashMap::new();
        let sites = messages
            .iter()
            .map(|m| (&m.name, DeclKind::Message, m.file.ast.name.as_str()))
            .chain(enums.iter().map(|e| (&e.name, DeclKind::Enum, e.file.ast.name.as_str())));
        for (name, kind, file) in sites {
            let existing = base
                .message(name)
                .map(|m| m.file().to_string())
                .or_else(|| base.enum_type(name).map(|e| e.file().to_string()))
                .or_else(|| declared.get(name.as_str()).map(|(_, f)| f.to_string()));
            if let Some(existing_file) = existing {
                return Err(ParseError::DuplicateName {
                    name: name.clone(),
                    existing_file,
                    new_file: file.to_string(),
                });
            }
            declared.insert(name.clone(), (kind, file));
        }

        Ok(Self { base, messages, enums, declared, new_enums: HashMap::new(), new_messages: HashMap::new() })
    }

    fn kind_of(&self, name: &str) -> Option<DeclKind> {
        if let Some((kind, _)) = self.declared.get(name) {
            Some(*kind)
        } else if self.base.message(name).is_some() {
            Some(DeclKind::Message)
        } else if self.base.enum_type(name).is_some() {
            Some(DeclKind::Enum)
        } else {
            None
        }
    }

    fn find_enum(&self, name: &str) -> Option<&EnumDescriptor> {
        self.new_enums.get(name).or_else(|| self.base.enum_type(name).map(Arc::as_ref))
    }

    /// Resolve `written` as seen from inside `scope`.
    fn resolve(&self, scope: &str, written: &str) -> Option<(String, DeclKind)> {
        if let Some(absolute) = written.strip_prefix('.') {
            return self.kind_of(absolute).map(|k| (absolute.to_string(), k));
        }
        let mut current = Some(scope);
        while let Some(s) = current {
            let candidate = qualify(s, written);
            if let Some(kind) = self.kind_of(&candidate) {
                return Some((candidate, kind));
            }
            current = parent_scope(s);
        }
        None
    }

    fn build_enums(&mut self) -> Result<(), ParseError> {
        for site in &self.enums {
            let file = &site.file.ast;
            let invalid = |message: String| ParseError::Invalid { file: file.name.clone(), message };
            let Some(first) = site.ast.values.first() else {
                return Err(invalid(format!("enum '{}' must contain at least one value", site.name)));
            };
            if file.syntax == Syntax::Proto3 && first.1 != 0 {
                return Err(invalid(format!(
                    "the first value of proto3 enum '{}' must be zero, found {} = {}",
                    site.name, first.0, first.1
                )));
            }
            let mut names = HashSet::new();
            let mut numbers: HashMap<i32, &str> = HashMap::new();
            for (name, number) in &site.ast.values {
                if !names.insert(name.as_str()) {
                    return Err(invalid(format!("'{name}' is already defined in enum '{}'", site.name)));
                }
                if let Some(previous) = numbers.insert(*number, name) {
                    if !site.ast.allow_alias {
                        return Err(invalid(format!(
                            "'{name}' uses the same number {number} as '{previous}' in enum '{}'; \
                             set option allow_alias = true to permit this",
                            site.name
                        )));
                    }
                }
            }
            self.new_enums.insert(
                site.name.clone(),
                EnumDescriptor::new(site.name.clone(), file.name.clone(), site.ast.values.clone()),
            );
        }
        Ok(())
    }

    fn build_messages(&mut self) -> Result<(), ParseError> {
        let mut built = Vec::with_capacity(self.messages.len());
        for site in &self.messages {
            built.push(self.link_message(site)?);
        }
        for descriptor in built {
            self.new_messages.insert(descriptor.qualified_name().to_string(), descriptor);
        }
        Ok(())
    }

    fn link_message(&self, site: &MessageSite<'f>) -> Result<SchemaDescriptor, ParseError> {
        let file = &site.file.ast;
        let msg = site.ast;
        let invalid = |message: String| ParseError::Invalid { file: file.name.clone(), message };

        let mut by_number: HashMap<u32, &str> = HashMap::new();
        let mut by_name = HashSet::new();
        let mut fields = Vec::with_capacity(msg.fields.len());

        for field in &msg.fields {
            let full_name = format!("{}.{}", site.name, field.name);
            let at = format!("{}:{}:{}", file.name, field.line, field.column);

            if field.number == 0 || field.number > MAX_FIELD_NUMBER {
                return Err(invalid(format!(
                    "{at}: field number {} of '{full_name}' is outside 1..={MAX_FIELD_NUMBER}",
                    field.number
                )));
            }
            if IMPLEMENTATION_RESERVED.contains(&field.number) {
                return Err(invalid(format!(
                    "{at}: field number {} of '{full_name}' is reserved for the protobuf implementation",
                    field.number
                )));
            }
            if let Some(previous) = by_number.insert(field.number, &field.name) {
                return Err(invalid(format!(
                    "{at}: field number {} of '{full_name}' is already used by '{previous}'",
                    field.number
                )));
            }
            if !by_name.insert(field.name.as_str()) {
                return Err(invalid(format!("{at}: '{full_name}' is already defined")));
            }
            if msg.reserved_numbers.iter().any(|(lo, hi)| (*lo..=*hi).contains(&field.number)) {
                return Err(invalid(format!(
                    "{at}: field '{full_name}' uses reserved number {}",
                    field.number
                )));
            }
            if msg.reserved_names.iter().any(|n| *n == field.name) {
                return Err(invalid(format!("{at}: field name '{}' is reserved", field.name)));
            }

            let kind = self.link_type(site, &full_name, &field.ty)?;
            let kind = if field.label == Label::Repeated { FieldKind::Repeated(Box::new(kind)) } else { kind };

            let packed = match (&kind, field.packed) {
                (FieldKind::Repeated(inner), packed) if is_packable(inner) => {
                    packed.unwrap_or(file.syntax == Syntax::Proto3)
                }
                (_, Some(true)) => {
                    return Err(invalid(format!(
                        "{at}: [packed = true] can only be specified for repeated primitive fields"
                    )))
                }
                _ => false,
            };

            let presence = match (&kind, field.label) {
                (FieldKind::Repeated(_) | FieldKind::Map(..), _) => Presence::Implicit,
                (_, Label::Required) => Presence::Required,
                (_, Label::Optional) => Presence::Explicit,
                (FieldKind::Message(_), _) => Presence::Explicit,
                _ if field.oneof.is_some() || file.syntax == Syntax::Proto2 => Presence::Explicit,
                _ => Presence::Implicit,
            };

            let default_value = self
                .default_for(&kind, field.default.as_ref())
                .map_err(|reason| invalid(format!("{at}: bad default for '{full_name}': {reason}")))?;

            fields.push(FieldDescriptor {
                name: field.name.clone(),
                number: field.number,
                declaration_index: 0,
                kind,
                presence,
                packed,
                default_value,
                oneof: field.oneof.clone(),
            });
        }

        let nested = msg
            .messages
            .iter()
            .map(|m| qualify(&site.name, &m.name))
            .chain(msg.enums.iter().map(|e| qualify(&site.name, &e.name)))
            .collect();
        Ok(SchemaDescriptor::new(site.name.clone(), file.name.clone(), file.syntax, fields, nested))
    }

    fn link_type(&self, site: &MessageSite<'f>, full_name: &str, ty: &TypeAst) -> Result<FieldKind, ParseError> {
        match ty {
            TypeAst::Scalar(kind) => Ok(FieldKind::Scalar(*kind)),
            TypeAst::Named(written) => match self.resolve(&site.name, written) {
                Some((name, DeclKind::Message)) => Ok(FieldKind::Message(name)),
                Some((name, DeclKind::Enum)) => Ok(FieldKind::Enum(name)),
                None => Err(ParseError::UnresolvedType {
                    file: site.file.ast.name.clone(),
                    field: full_name.to_string(),
                    type_name: written.clone(),
                }),
            },
            TypeAst::Map(key, value) => {
                if !key.is_map_key() {
                    return Err(ParseError::Invalid {
                        file: site.file.ast.name.clone(),
                        message: format!("'{key}' is not a valid map key type for '{full_name}'"),
                    });
                }
                let value = self.link_type(site, full_name, value)?;
                Ok(FieldKind::Map(*key, Box::new(value)))
            }
        }
    }

    fn default_for(&self, kind: &FieldKind, explicit: Option<&Constant>) -> Result<DynamicValue, String> {
        match kind {
            FieldKind::Repeated(_) => Ok(DynamicValue::List(Vec::new())),
            FieldKind::Map(..) => Ok(DynamicValue::Map(BTreeMap::new())),
            FieldKind::Message(_) => match explicit {
                Some(_) => Err("message fields cannot have default values".to_string()),
                None => Ok(DynamicValue::Nil),
            },
            FieldKind::Enum(name) => {
                let e = self.find_enum(name).ok_or_else(|| format!("enum '{name}' is not built"))?;
                match explicit {
                    None => Ok(DynamicValue::Int(i64::from(e.first_number()))),
                    Some(Constant::Ident(value)) => e
                        .number_of(value)
                        .map(|n| DynamicValue::Int(i64::from(n)))
                        .ok_or_else(|| format!("enum '{name}' has no value named '{value}'")),
                    Some(_) => Err(format!("default must be a value name of enum '{name}'")),
                }
            }
            FieldKind::Scalar(scalar) => match explicit {
                None => Ok(DynamicValue::zero(*scalar)),
                Some(constant) => scalar_constant(*scalar, constant),
            },
        }
    }
}

fn collect_message<'f>(
    scope: &str,
    msg: &'f MessageAst,
    file: &'f LoadedFile,
    messages: &mut Vec<MessageSite<'f>>,
    enums: &mut Vec<EnumSite<'f>>,
) {
    let name = qualify(scope, &msg.name);
    for e in &msg.enums {
        enums.push(EnumSite { name: qualify(&name, &e.name), ast: e, file });
    }
    messages.push(MessageSite { name: name.clone(), ast: msg, file });
    for nested in &msg.messages {
        collect_message(&name, nested, file, messages, enums);
    }
}

fn is_packable(kind: &FieldKind) -> bool {
    match kind {
        FieldKind::Scalar(s) => s.is_packable(),
        FieldKind::Enum(_) => true,
        _ => false,
    }
}

/// Convert a `[default = ...]` constant for a scalar field.
fn scalar_constant(kind: ScalarKind, constant: &Constant) -> Result<DynamicValue, String> {
    let mismatch = || format!("expected a {kind} constant");
    match (kind, constant) {
        (ScalarKind::Bool, Constant::Ident(s)) => match s.as_str() {
            "true" => Ok(DynamicValue::Bool(true)),
            "false" => Ok(DynamicValue::Bool(false)),
            _ => Err(mismatch()),
        },
        (ScalarKind::String, Constant::Str(bytes)) => String::from_utf8(bytes.clone())
            .map(DynamicValue::Str)
            .map_err(|_| "string default is not valid UTF-8".to_string()),
        (ScalarKind::Bytes, Constant::Str(bytes)) => Ok(DynamicValue::Bytes(bytes.clone())),
        (ScalarKind::Double | ScalarKind::Float, Constant::Float(x)) => Ok(DynamicValue::Float(*x)),
        (ScalarKind::Double | ScalarKind::Float, Constant::Int { negative, magnitude }) => {
            let x = *magnitude as f64;
            Ok(DynamicValue::Float(if *negative { -x } else { x }))
        }
        (ScalarKind::Double | ScalarKind::Float, Constant::Ident(s)) => match s.as_str() {
            "inf" => Ok(DynamicValue::Float(f64::INFINITY)),
            "nan" => Ok(DynamicValue::Float(f64::NAN)),
            _ => Err(mismatch()),
        },
        (_, Constant::Int { negative, magnitude }) if kind.is_integral() => {
            integer_constant(kind, *negative, *magnitude).ok_or_else(|| format!("value out of range for {kind}"))
        }
        _ => Err(mismatch()),
    }
}

fn integer_constant(kind: ScalarKind, negative: bool, magnitude: u64) -> Option<DynamicValue> {
    let signed = if negative { 0i64.checked_sub_unsigned(magnitude) } else { i64::try_from(magnitude).ok() };
    match kind {
        ScalarKind::Int32 | ScalarKind::SInt32 | ScalarKind::SFixed32 => {
            i32::try_from(signed?).ok().map(|n| DynamicValue::Int(i64::from(n)))
        }
        ScalarKind::Int64 | ScalarKind::SInt64 | ScalarKind::SFixed64 => signed.map(DynamicValue::Int),
        ScalarKind::UInt32 | ScalarKind::Fixed32 if !negative => {
            u32::try_from(magnitude).ok().map(|n| DynamicValue::Int(i64::from(n)))
        }
        ScalarKind::UInt64 | ScalarKind::Fixed64 if !negative => Some(DynamicValue::from(magnitude)),
        _ => None,
    }
}
