//! Main-block extraction.
//!
//! Locates the single `defineUserScript({ ..., main })` call in a bundled
//! program, pulls out the main procedure and the optional preservation-marked
//! configuration declaration, and leaves every other statement byte-identical
//! for reassembly. Detection is a parse-then-match problem: a visitor walks
//! the oxc AST so comment placement and formatting variation upstream cannot
//! break it. The extraction itself is span surgery on the original text, so
//! passthrough code is never reformatted.
//!
//! The `main` property is accepted in three equivalent forms (arrow function,
//! function expression, method shorthand), normalized into [`MainProcedure`]
//! with the form tag retained so output stays in the same form family.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, CallExpression, Expression, FormalParameters, FunctionBody, ObjectExpression,
    ObjectProperty, ObjectPropertyKind, Program, PropertyKey, PropertyKind, StaticBlock, Statement,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};

use crate::error::ExtractError;
use crate::meta::MetaValue;

/// Callee name identifying the entry-descriptor call.
pub const ENTRY_CALLEE: &str = "defineUserScript";

/// Content of the fixed single-line comment that marks a declaration for
/// hoisting as user-editable configuration.
pub const PRESERVE_MARKER: &str = "@preserve scriptConfig";

/// Form family of the extracted main procedure. A method shorthand has no
/// standalone syntax, so it re-emits in the function-expression family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainForm {
    Arrow,
    FunctionExpr,
    Method,
}

/// The normalized main procedure. `parameter` and `body` are verbatim source
/// slices; `name` is set for named function expressions only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainProcedure {
    pub form: MainForm,
    pub parameter: Option<String>,
    pub name: Option<String>,
    pub body: String,
}

/// A preservation-marked declaration staged for hoisting to top-level scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBlock {
    /// The declaration text, verbatim.
    pub declaration: String,
    /// The declared variable name, passed to the invocation wrapper.
    pub name: String,
}

/// Everything reassembly needs, extracted once per entry per trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedProgram {
    /// Top-level import statements, verbatim. Also present in `passthrough`;
    /// carried separately for inspection.
    pub imports: Vec<String>,
    /// The bundled text with the entry call and the hoisted declaration
    /// excised. Order, indentation, and module-boundary comments untouched.
    pub passthrough: String,
    pub config: Option<ConfigBlock>,
    pub main: MainProcedure,
    /// Metadata overrides from the entry-descriptor object, in object order.
    pub overrides: Vec<(String, MetaValue)>,
}

struct Candidate {
    span: Span,
    depth: u32,
    main: Result<MainProcedure, ExtractError>,
    overrides: Result<Vec<(String, MetaValue)>, ExtractError>,
}

/// Counts every call matching the entry-descriptor pattern, wherever it
/// appears, and extracts each candidate's payload eagerly. Ambiguity is
/// decided after the walk.
struct EntryCallFinder<'s> {
    source: &'s str,
    depth: u32,
    candidates: Vec<Candidate>,
}

impl<'a, 's> Visit<'a> for EntryCallFinder<'s> {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if is_entry_callee(call) {
            if let Some(Expression::ObjectExpression(obj)) = call.arguments[0].as_expression() {
                if object_has_main(obj) {
                    self.candidates.push(Candidate {
                        span: call.span,
                        depth: self.depth,
                        main: extract_main(obj, self.source),
                        overrides: extract_overrides(obj, self.source),
                    });
                }
            }
        }
        oxc_ast_visit::walk::walk_call_expression(self, call);
    }

    fn visit_function_body(&mut self, body: &FunctionBody<'a>) {
        self.depth += 1;
        oxc_ast_visit::walk::walk_function_body(self, body);
        self.depth -= 1;
    }

    fn visit_static_block(&mut self, block: &StaticBlock<'a>) {
        self.depth += 1;
        oxc_ast_visit::walk::walk_static_block(self, block);
        self.depth -= 1;
    }
}

fn is_entry_callee(call: &CallExpression) -> bool {
    match &call.callee {
        Expression::Identifier(ident) => ident.name == ENTRY_CALLEE && call.arguments.len() == 1,
        _ => false,
    }
}

fn object_has_main(obj: &ObjectExpression) -> bool {
    obj.properties.iter().any(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(p) => {
            property_name(&p.key).as_deref() == Some("main")
        }
        ObjectPropertyKind::SpreadProperty(_) => false,
    })
}

fn property_name(key: &PropertyKey) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.to_string()),
        PropertyKey::StringLiteral(s) => Some(s.value.to_string()),
        _ => None,
    }
}

fn slice(source: &str, span: Span) -> &str {
    &source[span.start as usize..span.end as usize]
}

fn extract_main(obj: &ObjectExpression, source: &str) -> Result<MainProcedure, ExtractError> {
    for prop in &obj.properties {
        let ObjectPropertyKind::ObjectProperty(prop) = prop else {
            continue;
        };
        if property_name(&prop.key).as_deref() != Some("main") {
            continue;
        }
        if prop.kind != PropertyKind::Init {
            return Err(ExtractError::UnsupportedMain);
        }
        return main_procedure(prop, source);
    }
    Err(ExtractError::UnsupportedMain)
}

fn main_procedure(prop: &ObjectProperty, source: &str) -> Result<MainProcedure, ExtractError> {
    match &prop.value {
        Expression::ArrowFunctionExpression(arrow) => Ok(MainProcedure {
            form: MainForm::Arrow,
            parameter: sole_parameter(&arrow.params, source)?,
            name: None,
            body: slice(source, arrow.body.span).to_string(),
        }),
        Expression::FunctionExpression(func) => {
            let body = func.body.as_ref().ok_or(ExtractError::UnsupportedMain)?;
            Ok(MainProcedure {
                form: if prop.method {
                    MainForm::Method
                } else {
                    MainForm::FunctionExpr
                },
                parameter: sole_parameter(&func.params, source)?,
                name: func.id.as_ref().map(|id| id.name.to_string()),
                body: slice(source, body.span).to_string(),
            })
        }
        _ => Err(ExtractError::UnsupportedMain),
    }
}

fn sole_parameter(
    params: &FormalParameters,
    source: &str,
) -> Result<Option<String>, ExtractError> {
    if params.rest.is_some() || params.items.len() > 1 {
        return Err(ExtractError::UnsupportedMain);
    }
    Ok(params
        .items
        .first()
        .map(|param| slice(source, param.pattern.span()).to_string()))
}

fn extract_overrides(
    obj: &ObjectExpression,
    source: &str,
) -> Result<Vec<(String, MetaValue)>, ExtractError> {
    let mut overrides = Vec::new();
    for prop in &obj.properties {
        let prop = match prop {
            ObjectPropertyKind::ObjectProperty(p) => p,
            ObjectPropertyKind::SpreadProperty(_) => {
                return Err(ExtractError::UnsupportedMetaValue("<spread>".to_string()));
            }
        };
        let Some(key) = property_name(&prop.key) else {
            return Err(ExtractError::UnsupportedMetaValue("<computed>".to_string()));
        };
        if key == "main" {
            continue;
        }
        let value = literal_value(&prop.value, source)
            .ok_or_else(|| ExtractError::UnsupportedMetaValue(key.clone()))?;
        overrides.push((key, value));
    }
    Ok(overrides)
}

/// Statically resolvable metadata values: string / number / boolean literals
/// and arrays of string literals. Anything else cannot become a header line.
fn literal_value(expr: &Expression, source: &str) -> Option<MetaValue> {
    match expr {
        Expression::StringLiteral(s) => Some(MetaValue::Scalar(s.value.to_string())),
        Expression::NumericLiteral(n) => Some(MetaValue::Scalar(slice(source, n.span).to_string())),
        Expression::BooleanLiteral(b) => Some(MetaValue::Scalar(b.value.to_string())),
        Expression::ArrayExpression(arr) => {
            let mut items = Vec::new();
            for elem in &arr.elements {
                match elem.as_expression() {
                    Some(Expression::StringLiteral(s)) => items.push(s.value.to_string()),
                    _ => return None,
                }
            }
            Some(MetaValue::List(items))
        }
        _ => None,
    }
}

/// Content of a line comment plus the offset where its `//` starts,
/// tolerating either span convention (with or without the delimiters).
/// Block comments return `None`.
fn line_comment_content<'s>(source: &'s str, span: Span) -> Option<(usize, &'s str)> {
    let (start, end) = (span.start as usize, span.end as usize);
    let raw = &source[start..end];
    if let Some(rest) = raw.strip_prefix("//") {
        return Some((start, rest));
    }
    if start >= 2 && &source[start - 2..start] == "//" {
        return Some((start - 2, raw));
    }
    None
}

fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map_or(0, |i| i + 1)
}

fn extend_past_semicolon(source: &str, mut end: usize) -> usize {
    let bytes = source.as_bytes();
    while end < bytes.len() && (bytes[end] == b' ' || bytes[end] == b'\t') {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b';' {
        end += 1;
    }
    end
}

/// Widen a statement span into a removable cut: back to the start of its
/// line (when only whitespace precedes it) and forward across the trailing
/// semicolon and one line break.
fn expand_cut(source: &str, start: usize, end: usize) -> (usize, usize) {
    let ls = line_start(source, start);
    let start = if source[ls..start].trim().is_empty() {
        ls
    } else {
        start
    };
    let mut end = extend_past_semicolon(source, end);
    let bytes = source.as_bytes();
    while end < bytes.len() && (bytes[end] == b' ' || bytes[end] == b'\t') {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'\r' {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'\n' {
        end += 1;
    }
    (start, end)
}

type ConfigCut = (ConfigBlock, (usize, usize));

/// Scan the scope enclosing `main` (the program top level) for a variable
/// declaration immediately preceded by the preservation marker. The marker
/// line is consumed; the declaration is preserved verbatim.
fn find_config_block(
    program: &Program,
    source: &str,
    entry_span: Span,
) -> Result<Option<ConfigCut>, ExtractError> {
    let mut found: Option<ConfigCut> = None;

    for comment in &program.comments {
        let Some((marker_start, content)) = line_comment_content(source, comment.span) else {
            continue;
        };
        if content.trim() != PRESERVE_MARKER {
            continue;
        }
        let marker_end = comment.span.end as usize;

        for stmt in &program.body {
            let stmt_span = stmt.span();
            if stmt_span == entry_span {
                continue;
            }
            let stmt_start = stmt_span.start as usize;
            if stmt_start < marker_end || !source[marker_end..stmt_start].trim().is_empty() {
                continue;
            }
            let Statement::VariableDeclaration(decl) = stmt else {
                break;
            };
            if decl.declarations.len() != 1 {
                break;
            }
            let BindingPattern::BindingIdentifier(id) = &decl.declarations[0].id else {
                break;
            };

            if found.is_some() {
                return Err(ExtractError::MultipleConfigBlocks);
            }
            let decl_end = extend_past_semicolon(source, stmt_span.end as usize);
            let declaration = source[stmt_start..decl_end].trim_end().to_string();
            let ls = line_start(source, marker_start);
            let cut_start = if source[ls..marker_start].trim().is_empty() {
                ls
            } else {
                marker_start
            };
            let (_, cut_end) = expand_cut(source, stmt_start, stmt_span.end as usize);
            found = Some((
                ConfigBlock {
                    declaration,
                    name: id.name.to_string(),
                },
                (cut_start, cut_end),
            ));
            break;
        }
    }

    Ok(found)
}

/// Extract the entry descriptor from one bundled program.
///
/// Pure and deterministic: the same input text always yields the same
/// extraction, and nothing generated (timestamps, fresh identifiers) enters
/// the program text.
pub fn extract(source: &str) -> Result<ExtractedProgram, ExtractError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_typescript(true).with_module(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        let joined = ret
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ExtractError::Parse(joined));
    }
    let program = &ret.program;

    let mut finder = EntryCallFinder {
        source,
        depth: 0,
        candidates: Vec::new(),
    };
    finder.visit_program(program);

    let mut candidates = finder.candidates;
    let candidate = match candidates.len() {
        0 => return Err(ExtractError::MissingEntryCall),
        1 => candidates.remove(0),
        n => return Err(ExtractError::MultipleEntryCalls(n)),
    };
    if candidate.depth != 0 {
        // The only matching call is nested inside a function: there is no
        // entry call in the top-level scope.
        return Err(ExtractError::MissingEntryCall);
    }
    let main = candidate.main?;
    let overrides = candidate.overrides?;

    // The rewrite target is the whole top-level statement carrying the call,
    // whatever its wrapper (bare statement, `void`, export, initializer).
    let entry_span = program
        .body
        .iter()
        .map(GetSpan::span)
        .find(|s| s.start <= candidate.span.start && candidate.span.end <= s.end)
        .ok_or(ExtractError::MissingEntryCall)?;

    let config = find_config_block(program, source, entry_span)?;

    let mut cuts = vec![expand_cut(
        source,
        entry_span.start as usize,
        entry_span.end as usize,
    )];
    let (config, config_cut) = match config {
        Some((block, cut)) => (Some(block), Some(cut)),
        None => (None, None),
    };
    if let Some(cut) = config_cut {
        cuts.push(cut);
    }
    cuts.sort_by_key(|c| c.0);

    let mut passthrough = String::with_capacity(source.len());
    let mut pos = 0;
    for (start, end) in cuts {
        passthrough.push_str(&source[pos..start]);
        pos = end;
    }
    passthrough.push_str(&source[pos..]);
    let passthrough = passthrough.trim().to_string();

    let imports = program
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::ImportDeclaration(_) => {
                let span = stmt.span();
                let end = extend_past_semicolon(source, span.end as usize);
                Some(source[span.start as usize..end].to_string())
            }
            _ => None,
        })
        .collect();

    Ok(ExtractedProgram {
        imports,
        passthrough,
        config,
        main,
        overrides,
    })
}
