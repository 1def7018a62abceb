// ABOUTME: Applies structural module edits back onto source text as minimal byte-range patches.
// ABOUTME: Every result is re-parsed and checked against the intended post-state before it is returned.

use crate::language::parse_tree;
use crate::literal::parse_state_source;
use crate::module_parser::{parse_module, CollectionLayout, ModuleLayout, ParsedModule};
use crate::syntax::{default_export_value, property_key_text, quote_char, quote_string, ExpressionSnippet, PropertyKind};
use modelgraph_core::{HandlerKind, ModelGraphError, Result, Span};
use std::fmt;
use tracing::debug;

const DEFAULT_INDENT: &str = "  ";

/// One structural change to a module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEdit {
    CreateModule { namespace: String },
    SetNamespace { namespace: String },
    SetState { source: String },
    AddHandler { kind: HandlerKind, name: String, source: String },
    UpdateHandler { kind: HandlerKind, name: String, source: String },
    RemoveHandler { kind: HandlerKind, name: String },
}

impl fmt::Display for SourceEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceEdit::CreateModule { namespace } => write!(f, "create module '{}'", namespace),
            SourceEdit::SetNamespace { namespace } => write!(f, "set namespace '{}'", namespace),
            SourceEdit::SetState { .. } => write!(f, "set state"),
            SourceEdit::AddHandler { kind, name, .. } => {
                write!(f, "add {} '{}'", kind.to_string().to_lowercase(), name)
            }
            SourceEdit::UpdateHandler { kind, name, .. } => {
                write!(f, "update {} '{}'", kind.to_string().to_lowercase(), name)
            }
            SourceEdit::RemoveHandler { kind, name } => {
                write!(f, "remove {} '{}'", kind.to_string().to_lowercase(), name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Patch {
    span: Span,
    replacement: String,
}

impl Patch {
    fn replace(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(Span::new(at, at), text)
    }

    fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + self.replacement.len());
        out.push_str(&text[..self.span.start_byte]);
        out.push_str(&self.replacement);
        out.push_str(&text[self.span.end_byte..]);
        out
    }
}

/// Rewrite `text` so that it reflects `edit`.
///
/// Text outside the patched range is left byte for byte as it was. The returned text has
/// been re-parsed and shows the edit; otherwise a serialization error is returned and the
/// caller must not write anything.
pub fn apply(file_path: &str, text: &str, edit: &SourceEdit) -> Result<String> {
    let fail = |reason: String| ModelGraphError::serialization(file_path, edit.to_string(), reason);

    let normalized = normalize_edit(edit).map_err(fail)?;
    let edit = &normalized;

    let new_text = match edit {
        SourceEdit::CreateModule { namespace } => create_module(text, namespace).map_err(fail)?,
        SourceEdit::RemoveHandler { kind, name } => {
            let parsed = parse_module(file_path, text).map_err(|err| fail(err.to_string()))?;
            remove_handler(file_path, text, parsed, *kind, name, &fail)?
        }
        _ => {
            let parsed = parse_module(file_path, text).map_err(|err| fail(err.to_string()))?;
            let patch = plan_patch(file_path, text, &parsed, edit).map_err(|err| match err {
                PlanError::Reason(reason) => fail(reason),
                PlanError::Model(err) => err,
            })?;
            patch.apply(text)
        }
    };

    verify(file_path, &new_text, edit).map_err(fail)?;
    debug!("Applied '{}' to {}", edit, file_path);
    Ok(new_text)
}

enum PlanError {
    Reason(String),
    Model(ModelGraphError),
}

impl From<String> for PlanError {
    fn from(reason: String) -> Self {
        PlanError::Reason(reason)
    }
}

/// Check names and sources, reducing each source to its bare expression.
///
/// Comments around the expression are dropped; inserted after a value, a trailing line
/// comment would swallow the separator that follows.
fn normalize_edit(edit: &SourceEdit) -> std::result::Result<SourceEdit, String> {
    let check_name = |name: &str| {
        if name.trim().is_empty() {
            Err("name must not be empty".to_string())
        } else {
            Ok(())
        }
    };
    let expression = |source: &str| -> std::result::Result<String, String> {
        let snippet = ExpressionSnippet::parse(source)?;
        snippet
            .expression_text()
            .map(str::to_string)
            .ok_or_else(|| format!("'{}' is not a valid expression", source.trim()))
    };
    let normalized = match edit {
        SourceEdit::CreateModule { namespace } | SourceEdit::SetNamespace { namespace } => {
            if namespace.trim().is_empty() {
                return Err("namespace must not be empty".to_string());
            }
            edit.clone()
        }
        SourceEdit::SetState { source } => SourceEdit::SetState {
            source: expression(source)?,
        },
        SourceEdit::AddHandler { kind, name, source } => {
            check_name(name)?;
            SourceEdit::AddHandler {
                kind: *kind,
                name: name.clone(),
                source: expression(source)?,
            }
        }
        SourceEdit::UpdateHandler { kind, name, source } => {
            check_name(name)?;
            SourceEdit::UpdateHandler {
                kind: *kind,
                name: name.clone(),
                source: expression(source)?,
            }
        }
        SourceEdit::RemoveHandler { name, .. } => {
            check_name(name)?;
            edit.clone()
        }
    };
    Ok(normalized)
}

fn plan_patch(
    file_path: &str,
    text: &str,
    parsed: &ParsedModule,
    edit: &SourceEdit,
) -> std::result::Result<Patch, PlanError> {
    let layout = &parsed.layout;
    let unit = indent_unit(text, layout);

    let patch = match edit {
        SourceEdit::SetNamespace { namespace } => {
            let quote = quote_char(layout.namespace.text(text));
            Patch::replace(layout.namespace, quote_string(namespace, quote))
        }
        SourceEdit::SetState { source } => match layout.state {
            Some(state) => Patch::replace(state, source.trim()),
            None => insert_entry(
                text,
                layout.object,
                &layout.properties,
                &format!("state: {}", source.trim()),
                &unit,
            ),
        },
        SourceEdit::AddHandler { kind, name, source } => {
            let entry = format!("{}: {}", property_key_text(name), source.trim());
            match layout.collection(*kind) {
                Some(collection) => {
                    if collection.entry(name).is_some() {
                        return Err(PlanError::Model(ModelGraphError::DuplicateHandler {
                            kind: *kind,
                            file: file_path.to_string(),
                            name: name.clone(),
                        }));
                    }
                    let object = collection_object(collection, *kind)?;
                    insert_entry(text, object, &collection.members, &entry, &unit)
                }
                None => {
                    let property = new_collection(text, layout, *kind, &entry, &unit);
                    insert_entry(text, layout.object, &layout.properties, &property, &unit)
                }
            }
        }
        SourceEdit::UpdateHandler { kind, name, source } => {
            let entry = layout
                .collection(*kind)
                .and_then(|collection| collection.entry(name))
                .map(|(_, entry)| entry)
                .ok_or_else(|| PlanError::Model(handler_not_found(*kind, file_path, name)))?;
            match (entry.kind, entry.value) {
                (PropertyKind::Pair, Some(value)) => Patch::replace(value, source.trim()),
                _ => Patch::replace(
                    entry.span,
                    format!("{}: {}", property_key_text(name), source.trim()),
                ),
            }
        }
        SourceEdit::CreateModule { .. } | SourceEdit::RemoveHandler { .. } => {
            return Err(PlanError::Reason(format!("'{}' is not a single patch", edit)));
        }
    };
    Ok(patch)
}

fn collection_object(collection: &CollectionLayout, kind: HandlerKind) -> std::result::Result<Span, String> {
    collection
        .object
        .ok_or_else(|| format!("{} is not an object literal", kind.collection_key()))
}

fn handler_not_found(kind: HandlerKind, file_path: &str, name: &str) -> ModelGraphError {
    ModelGraphError::HandlerNotFound {
        kind,
        file: file_path.to_string(),
        name: name.to_string(),
    }
}

/// Remove every entry called `name`, so a shadowed duplicate cannot resurface.
fn remove_handler(
    file_path: &str,
    text: &str,
    mut parsed: ParsedModule,
    kind: HandlerKind,
    name: &str,
    fail: &dyn Fn(String) -> ModelGraphError,
) -> Result<String> {
    let mut current = text.to_string();
    let mut removed = 0usize;

    loop {
        let Some(collection) = parsed.layout.collection(kind) else {
            break;
        };
        let Some((_, entry)) = collection.entry(name) else {
            break;
        };
        let object = collection_object(collection, kind).map_err(fail)?;
        let index = collection
            .member_index(entry.span)
            .ok_or_else(|| fail(format!("lost track of entry '{}'", name)))?;
        let patch = remove_entry(&current, object, &collection.members, index);
        current = patch.apply(&current);
        removed += 1;
        parsed = parse_module(file_path, &current).map_err(|err| fail(err.to_string()))?;
    }

    if removed == 0 {
        return Err(handler_not_found(kind, file_path, name));
    }
    Ok(current)
}

fn create_module(text: &str, namespace: &str) -> std::result::Result<String, String> {
    let template = module_template(namespace);
    if text.trim().is_empty() {
        return Ok(template);
    }
    let tree = parse_tree(text)?;
    if default_export_value(&tree.root_node()).is_some() {
        return Err("file already has a default export".to_string());
    }
    let separator = if text.ends_with('\n') { "\n" } else { "\n\n" };
    Ok(format!("{}{}{}", text, separator, template))
}

fn module_template(namespace: &str) -> String {
    format!(
        "export default {{\n{indent}namespace: {ns},\n{indent}state: {{}},\n{indent}reducers: {{}},\n{indent}effects: {{}},\n{indent}subscriptions: {{}},\n}};\n",
        indent = DEFAULT_INDENT,
        ns = quote_string(namespace, '\''),
    )
}

fn verify(file_path: &str, text: &str, edit: &SourceEdit) -> std::result::Result<(), String> {
    let parsed = parse_module(file_path, text)
        .map_err(|err| format!("edited text does not parse: {}", err))?;
    let module = &parsed.module;
    let ok = match edit {
        SourceEdit::CreateModule { namespace } | SourceEdit::SetNamespace { namespace } => {
            module.namespace == *namespace
        }
        SourceEdit::SetState { source } => parse_state_source(source)
            .map(|expected| module.state == expected)
            .unwrap_or(false),
        SourceEdit::AddHandler { kind, name, source } | SourceEdit::UpdateHandler { kind, name, source } => parsed
            .handler(*kind, name)
            .map(|handler| handler.source == source.trim())
            .unwrap_or(false),
        SourceEdit::RemoveHandler { kind, name } => parsed.handler(*kind, name).is_none(),
    };
    if ok {
        Ok(())
    } else {
        Err("edited text does not reflect the change".to_string())
    }
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map(|i| pos + i).unwrap_or(text.len())
}

fn indent_at(text: &str, pos: usize) -> String {
    text[line_start(text, pos)..pos]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

fn starts_line(text: &str, pos: usize) -> bool {
    text[line_start(text, pos)..pos].trim().is_empty()
}

/// The file's indentation step, read off the exported object.
fn indent_unit(text: &str, layout: &ModuleLayout) -> String {
    let outer = indent_at(text, layout.object.start_byte);
    layout
        .properties
        .iter()
        .find(|property| starts_line(text, property.start_byte))
        .map(|property| indent_at(text, property.start_byte))
        .and_then(|inner| {
            inner
                .strip_prefix(outer.as_str())
                .filter(|unit| !unit.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_INDENT.to_string())
}

fn is_multiline(text: &str, object: Span) -> bool {
    object.text(text).contains('\n')
}

/// Indentation for a new member of `object`.
fn member_indent(text: &str, object: Span, members: &[Span], unit: &str) -> String {
    match members.last() {
        Some(last) if starts_line(text, last.start_byte) => indent_at(text, last.start_byte),
        _ => format!("{}{}", indent_at(text, object.start_byte), unit),
    }
}

/// Byte offset of the comma that directly follows `pos`, skipping whitespace.
fn trailing_comma(text: &str, pos: usize, limit: usize) -> Option<usize> {
    let rest = &text[pos..limit];
    let skipped = rest.len() - rest.trim_start().len();
    rest[skipped..].starts_with(',').then_some(pos + skipped)
}

/// Insert `entry` as the last member of `object`.
fn insert_entry(text: &str, object: Span, members: &[Span], entry: &str, unit: &str) -> Patch {
    let close = object.end_byte - 1;

    let Some(last) = members.last() else {
        let outer = indent_at(text, object.start_byte);
        return Patch::replace(object, format!("{{\n{}{}{},\n{}}}", outer, unit, entry, outer));
    };

    let comma = trailing_comma(text, last.end_byte, close);

    if !is_multiline(text, object) {
        return match comma {
            Some(comma) => Patch::insert(comma + 1, format!(" {},", entry)),
            None => Patch::insert(last.end_byte, format!(", {}", entry)),
        };
    }

    let indent = member_indent(text, object, members, unit);
    match comma {
        Some(comma) => {
            let end_of_line = line_end(text, comma);
            let at = if end_of_line < close { end_of_line } else { comma + 1 };
            Patch::insert(at, format!("\n{}{},", indent, entry))
        }
        None => Patch::insert(last.end_byte, format!(",\n{}{}", indent, entry)),
    }
}

/// A whole `key: { entry }` collection property for a module that lacks one.
fn new_collection(text: &str, layout: &ModuleLayout, kind: HandlerKind, entry: &str, unit: &str) -> String {
    let key = kind.collection_key();
    if !is_multiline(text, layout.object) {
        return format!("{}: {{ {} }}", key, entry);
    }
    let indent = member_indent(text, layout.object, &layout.properties, unit);
    format!("{}: {{\n{}{}{},\n{}}}", key, indent, unit, entry, indent)
}

/// Remove member `index` of `object` together with its comma and, when it sits on its own line, that line.
fn remove_entry(text: &str, object: Span, members: &[Span], index: usize) -> Patch {
    let close = object.end_byte - 1;
    let entry = members[index];
    let comma = trailing_comma(text, entry.end_byte, close);

    let remainder = format!(
        "{}{}",
        &text[object.start_byte + 1..entry.start_byte],
        &text[comma.map(|c| c + 1).unwrap_or(entry.end_byte)..close]
    );
    if members.len() == 1 && remainder.trim().is_empty() {
        return Patch::replace(object, "{}");
    }

    match comma {
        Some(comma) => {
            let after_comma = comma + 1;
            let end_of_line = line_end(text, after_comma);
            let rest_is_blank = end_of_line <= close && text[after_comma..end_of_line].trim().is_empty();
            if starts_line(text, entry.start_byte) && rest_is_blank {
                let start = line_start(text, entry.start_byte);
                let end = (end_of_line + 1).min(text.len());
                Patch::replace(Span::new(start, end), "")
            } else {
                let rest = &text[after_comma..close];
                let spaces = rest.len() - rest.trim_start_matches([' ', '\t']).len();
                Patch::replace(Span::new(entry.start_byte, after_comma + spaces), "")
            }
        }
        None => match index.checked_sub(1).map(|prev| members[prev]) {
            Some(prev) => Patch::replace(Span::new(prev.end_byte, entry.end_byte), ""),
            None => Patch::replace(entry, ""),
        },
    }
}
