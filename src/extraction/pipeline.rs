//! The extraction pipeline (component D): turns one parsed file into a
//! [`Batch`] of entity/edge rows plus the bits the Pass-2 linker needs —
//! this file's exported symbol table, its import-alias map, and the list of
//! call/type/extends/implements references it could not resolve on its own.
//!
//! Extraction is total: any construct this module does not understand
//! becomes a logged [`ExtractionWarning`] and is skipped, never aborted. It
//! only fails with [`ExtractionError::BadTree`] when the tree has no usable
//! root at all.

use std::collections::HashMap;

use crate::error::ExtractionWarning;
use crate::extraction::complexity::cyclomatic_complexity;
use crate::extraction::file_resolver::{FileResolver, ResolvedImport};
use crate::extraction::scan::{scan_call_sites, scan_type_references};
use crate::model::{
    mint, mint_ghost, Batch, ClassFlags, ClassRow, ContainsEdge, EntityId, EntityKind, FileRow,
    FunctionFlags, FunctionRow, GhostKind, HasMethodEdge, ImportKind, ImportsEdge, InterfaceFlags,
    InterfaceRow, TypeAliasRow, VariableFlags, VariableRow,
};
use crate::parser_contract::{ParsedUnit, RawImportKind};
use crate::scanner::FileDescriptor;

/// A same-file call site, type reference, `extends`/`implements` target that
/// extraction could not resolve against this file's own declarations.
/// Carried to Pass 2, which resolves it against the global symbol registry
/// (or against a ghost, for external references).
///
/// The spec's §4.E algorithm is written in terms of call sites only; this
/// pipeline generalizes the same "local alias rewrite, then registry
/// lookup, then ghost, then drop" treatment to every edge kind whose target
/// may live in another file, so that §3 invariant 3 ("every relationship
/// endpoint resolves to a real entity or a GhostNode") holds uniformly
/// rather than only for calls. See DESIGN.md.
#[derive(Debug, Clone)]
pub struct UnresolvedReference {
    pub from: EntityId,
    pub from_file: EntityId,
    pub target_name: String,
    pub line: u32,
    pub kind: UnresolvedKind,
}

#[derive(Debug, Clone)]
pub enum UnresolvedKind {
    Call { direct: bool, awaited: bool },
    Extends,
    Implements,
    ExtendsInterface,
    UsesType {
        context: String,
        parameter_name: Option<String>,
    },
}

/// How a local name resolves for the purposes of alias rewriting in Pass 2.
#[derive(Debug, Clone)]
pub enum AliasTarget {
    /// The alias names `imported_name` as declared in `file_id`.
    Local {
        file_id: EntityId,
        imported_name: String,
    },
    /// The alias names a symbol from an external package.
    External { package_name: String },
}

/// Everything Pass 1 produces for a single file.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    pub batch: Batch,
    /// Exported and top-level symbol names declared in this file, mapped to
    /// their minted ID — the per-file contribution to Pass 2's global
    /// registry.
    pub exports: HashMap<String, EntityId>,
    /// Local import aliases, used by Pass 2 to rewrite a call/reference
    /// head before registry lookup.
    pub aliases: HashMap<String, AliasTarget>,
    pub unresolved: Vec<UnresolvedReference>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Extract one file. `resolver` is the whole-repo path index built once per
/// run (scanning happens before any extraction, so every file's relative
/// path is already known — see `FileResolver`).
///
/// This pipeline works entirely off the parser's [`ParsedUnit`] (whose
/// `raw_body`/`signature` strings already carry the exact source slices it
/// needs — see `extraction::scan`'s text-scan approach) rather than walking
/// the syntax tree node-by-node; see DESIGN.md for why. Whether the tree
/// itself is structurally usable at all ([`ExtractionError::BadTree`]) is
/// judged by the coordinator against the real `tree_sitter::Tree` before
/// this function is ever called, so extraction itself cannot fail — any
/// construct it doesn't recognize becomes a warning instead.
pub fn extract_file(
    file: &FileDescriptor,
    parsed: &ParsedUnit,
    resolver: &FileResolver,
) -> ExtractionOutput {
    let mut out = ExtractionOutput::default();
    let file_id = file.id.clone();
    let mut batch = Batch::for_file(file_id.clone());

    batch.files.push(FileRow {
        id: file_id.clone(),
        absolute_path: file.absolute_path.clone(),
        relative_path: file.relative_path.clone(),
        extension: file.extension.clone(),
        content_hash: file.content_hash.clone(),
        size_bytes: file.size_bytes,
        mtime_unix: file.mtime_unix,
        language: file.language,
        framework: None,
    });

    // Pass over classes first so methods can find their owning class's ID.
    let mut class_ids: HashMap<String, EntityId> = HashMap::new();
    for class in &parsed.classes {
        let id = mint(
            file_id.as_str(),
            EntityKind::Class,
            &class.name,
            &format!("{}:{}", class.range.start_byte, class.range.end_byte),
        );
        class_ids.insert(class.name.clone(), id.clone());

        batch.contains.push(ContainsEdge {
            from: file_id.clone(),
            to: id.clone(),
            line: class.range.start_line,
        });

        if let Some(target) = &class.extends_target {
            out.unresolved.push(UnresolvedReference {
                from: id.clone(),
                from_file: file_id.clone(),
                target_name: target.clone(),
                line: class.range.start_line,
                kind: UnresolvedKind::Extends,
            });
        }
        for target in &class.implements_targets {
            out.unresolved.push(UnresolvedReference {
                from: id.clone(),
                from_file: file_id.clone(),
                target_name: target.clone(),
                line: class.range.start_line,
                kind: UnresolvedKind::Implements,
            });
        }

        if class.exported {
            out.exports.insert(class.name.clone(), id.clone());
        }

        batch.classes.push(ClassRow {
            id,
            owning_file: file_id.clone(),
            name: class.name.clone(),
            range: class.range,
            flags: ClassFlags {
                is_abstract: class.is_abstract,
                exported: class.exported,
            },
            extends_target: class.extends_target.clone(),
            implements_targets: class.implements_targets.clone(),
            doc_comment: class.doc_comment.clone(),
        });
    }

    for interface in &parsed.interfaces {
        let id = mint(
            file_id.as_str(),
            EntityKind::Interface,
            &interface.name,
            &format!("{}:{}", interface.range.start_byte, interface.range.end_byte),
        );
        batch.contains.push(ContainsEdge {
            from: file_id.clone(),
            to: id.clone(),
            line: interface.range.start_line,
        });
        for target in &interface.extends_targets {
            out.unresolved.push(UnresolvedReference {
                from: id.clone(),
                from_file: file_id.clone(),
                target_name: target.clone(),
                line: interface.range.start_line,
                kind: UnresolvedKind::ExtendsInterface,
            });
        }
        if interface.exported {
            out.exports.insert(interface.name.clone(), id.clone());
        }
        batch.interfaces.push(InterfaceRow {
            id,
            owning_file: file_id.clone(),
            name: interface.name.clone(),
            range: interface.range,
            flags: InterfaceFlags {
                exported: interface.exported,
            },
            extends_targets: interface.extends_targets.clone(),
            doc_comment: interface.doc_comment.clone(),
            properties: interface.properties.clone(),
        });
    }

    for alias in &parsed.type_aliases {
        let id = mint(
            file_id.as_str(),
            EntityKind::TypeAlias,
            &alias.name,
            &format!("{}:{}", alias.range.start_byte, alias.range.end_byte),
        );
        batch.contains.push(ContainsEdge {
            from: file_id.clone(),
            to: id.clone(),
            line: alias.range.start_line,
        });
        emit_type_references(&mut out, &file_id, &id, alias.range.start_line, &alias.type_expr, "type_alias");
        if alias.exported {
            out.exports.insert(alias.name.clone(), id.clone());
        }
        batch.type_aliases.push(TypeAliasRow {
            id,
            owning_file: file_id.clone(),
            name: alias.name.clone(),
            range: alias.range,
            exported: alias.exported,
            type_expr: alias.type_expr.clone(),
            doc_comment: alias.doc_comment.clone(),
        });
    }

    for variable in &parsed.variables {
        let id = mint(
            file_id.as_str(),
            EntityKind::Variable,
            &variable.name,
            &format!("{}:{}", variable.position_line, variable.position_byte),
        );
        batch.contains.push(ContainsEdge {
            from: file_id.clone(),
            to: id.clone(),
            line: variable.position_line,
        });
        if let Some(declared_type) = &variable.declared_type {
            emit_type_references(
                &mut out,
                &file_id,
                &id,
                variable.position_line,
                declared_type,
                "variable_declaration",
            );
        }
        if variable.exported {
            out.exports.insert(variable.name.clone(), id.clone());
        }
        batch.variables.push(VariableRow {
            id,
            owning_file: file_id.clone(),
            name: variable.name.clone(),
            position: crate::model::Position {
                line: variable.position_line,
                byte: variable.position_byte,
            },
            declared_type: variable.declared_type.clone(),
            flags: VariableFlags {
                is_const: variable.is_const,
                exported: variable.exported,
            },
            scope: variable.scope,
        });
    }

    for function in &parsed.functions {
        let discriminator = format!("{}:{}", function.range.start_byte, function.signature);
        let id = if function.name.is_empty() {
            crate::model::mint_anonymous(
                file_id.as_str(),
                EntityKind::Function,
                &discriminator,
                function.range.start_byte,
            )
        } else {
            mint(file_id.as_str(), EntityKind::Function, &function.name, &discriminator)
        };

        batch.contains.push(ContainsEdge {
            from: file_id.clone(),
            to: id.clone(),
            line: function.range.start_line,
        });

        if let Some(owning_class) = &function.owning_class {
            if let Some(class_id) = class_ids.get(owning_class) {
                batch.has_method.push(HasMethodEdge {
                    from: class_id.clone(),
                    to: id.clone(),
                    visibility: function.visibility,
                    is_static: function.is_static,
                    is_abstract: function.is_abstract,
                });
            } else {
                out.warnings.push(ExtractionWarning {
                    file: file.absolute_path.clone(),
                    message: format!(
                        "method '{}' claims owning class '{owning_class}' not declared in this file; skipping has_method edge",
                        function.name
                    ),
                });
            }
        }

        emit_type_references(&mut out, &file_id, &id, function.range.start_line, &function.signature, "signature");
        if let Some(return_type) = &function.return_type {
            emit_type_references(&mut out, &file_id, &id, function.range.start_line, return_type, "return_type");
        }

        for site in scan_call_sites(&function.raw_body) {
            let line = function.range.start_line + site.line_offset;
            out.unresolved.push(UnresolvedReference {
                from: id.clone(),
                from_file: file_id.clone(),
                target_name: site.callee_expr,
                line,
                kind: UnresolvedKind::Call {
                    direct: site.direct,
                    awaited: site.awaited,
                },
            });
        }

        if !function.name.is_empty() && function.exported {
            out.exports.insert(function.name.clone(), id.clone());
        }

        batch.functions.push(FunctionRow {
            id,
            owning_file: file_id.clone(),
            name: function.name.clone(),
            range: function.range,
            signature: function.signature.clone(),
            return_type: function.return_type.clone(),
            flags: FunctionFlags {
                exported: function.exported,
                is_async: function.is_async,
                is_generator: function.is_generator,
            },
            cyclomatic_complexity: cyclomatic_complexity(&function.raw_body),
            parameter_count: function.parameter_count,
            doc_comment: function.doc_comment.clone(),
        });
    }

    for import in &parsed.imports {
        let resolved = resolver.resolve(&file.relative_path, &import.specifier);
        let local_name = import.local_alias.clone().unwrap_or_else(|| import.imported_name.clone());

        let to = match &resolved {
            ResolvedImport::Local(target_file_id) => target_file_id.clone(),
            ResolvedImport::External { package_name } => {
                let ghost_id = mint_ghost(Some(package_name), &import.imported_name, EntityKind::Ghost);
                batch.ghosts.push(crate::model::GhostRow {
                    id: ghost_id.clone(),
                    name: import.imported_name.clone(),
                    package_name: Some(package_name.clone()),
                    kind: GhostKind::Unknown,
                    signature: None,
                    external: true,
                });
                ghost_id
            }
        };

        batch.imports.push(ImportsEdge {
            from: file_id.clone(),
            to,
            symbols: vec![import.imported_name.clone()],
            kind: match import.kind {
                RawImportKind::Named => ImportKind::Named,
                RawImportKind::Default => ImportKind::Default,
                RawImportKind::Namespace => ImportKind::Namespace,
            },
            type_only: import.type_only,
        });

        let alias_target = match &resolved {
            ResolvedImport::Local(target_file_id) => AliasTarget::Local {
                file_id: target_file_id.clone(),
                imported_name: import.imported_name.clone(),
            },
            ResolvedImport::External { package_name } => AliasTarget::External {
                package_name: package_name.clone(),
            },
        };
        out.aliases.insert(local_name, alias_target);
    }

    out.batch = batch;
    out
}

fn emit_type_references(
    out: &mut ExtractionOutput,
    from_file: &EntityId,
    from: &EntityId,
    line: u32,
    expr: &str,
    context: &str,
) {
    for reference in scan_type_references(expr) {
        out.unresolved.push(UnresolvedReference {
            from: from.clone(),
            from_file: from_file.clone(),
            target_name: reference.type_name,
            line,
            kind: UnresolvedKind::UsesType {
                context: context.to_string(),
                parameter_name: None,
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Language, Range, ScopeTag, Visibility};
    use crate::parser_contract::{ParsedUnit, RawFunction};
    use std::path::PathBuf;

    fn descriptor(relative_path: &str) -> FileDescriptor {
        FileDescriptor {
            id: crate::model::mint_file(relative_path),
            absolute_path: PathBuf::from(relative_path),
            relative_path: relative_path.to_string(),
            extension: "ts".to_string(),
            size_bytes: 0,
            mtime_unix: 0,
            content_hash: "deadbeef".to_string(),
            language: Language::TypeScript,
        }
    }

    #[test]
    fn hello_world_function_produces_one_function_and_contains_edge() {
        let file = descriptor("greet.ts");
        let mut parsed = ParsedUnit::default();
        parsed.functions.push(RawFunction {
            name: "greet".to_string(),
            range: Range::new(0, 0, 2, 40),
            signature: "greet(name: string): string".to_string(),
            return_type: Some("string".to_string()),
            exported: true,
            is_async: false,
            is_generator: false,
            parameter_count: 1,
            doc_comment: None,
            raw_body: "{ return `hello ${name}`; }".to_string(),
            owning_class: None,
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
        });

        let resolver = FileResolver::new(&[]);
        let output = extract_file(&file, &parsed, &resolver);

        assert_eq!(output.batch.files.len(), 1);
        assert_eq!(output.batch.functions.len(), 1);
        assert_eq!(output.batch.contains.len(), 1);
        assert!(output.exports.contains_key("greet"));
        assert!(output.unresolved.is_empty());
    }

    #[test]
    fn call_site_in_body_becomes_unresolved_reference() {
        let file = descriptor("caller.ts");
        let mut parsed = ParsedUnit::default();
        parsed.functions.push(RawFunction {
            name: "useFoo".to_string(),
            range: Range::new(0, 0, 1, 20),
            signature: "useFoo(): void".to_string(),
            return_type: None,
            exported: true,
            is_async: false,
            is_generator: false,
            parameter_count: 0,
            doc_comment: None,
            raw_body: "{ foo(); }".to_string(),
            owning_class: None,
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
        });

        let resolver = FileResolver::new(&[]);
        let output = extract_file(&file, &parsed, &resolver);

        assert_eq!(output.unresolved.len(), 1);
        assert_eq!(output.unresolved[0].target_name, "foo");
        assert!(matches!(output.unresolved[0].kind, UnresolvedKind::Call { .. }));
    }

    #[test]
    fn unresolved_import_mints_ghost_and_records_alias() {
        let file = descriptor("a.ts");
        let mut parsed = ParsedUnit::default();
        parsed.imports.push(crate::parser_contract::RawImport {
            specifier: "axios".to_string(),
            imported_name: "axios".to_string(),
            local_alias: None,
            kind: RawImportKind::Default,
            type_only: false,
        });

        let resolver = FileResolver::new(&[]);
        let output = extract_file(&file, &parsed, &resolver);

        assert_eq!(output.batch.ghosts.len(), 1);
        assert_eq!(output.batch.ghosts[0].package_name.as_deref(), Some("axios"));
        assert_eq!(output.batch.imports.len(), 1);
        assert!(matches!(
            output.aliases.get("axios"),
            Some(AliasTarget::External { package_name }) if package_name == "axios"
        ));
    }

    #[test]
    fn variable_with_no_name_collisions_records_scope() {
        let file = descriptor("v.ts");
        let mut parsed = ParsedUnit::default();
        parsed.variables.push(crate::parser_contract::RawVariable {
            name: "count".to_string(),
            position_line: 3,
            position_byte: 40,
            declared_type: Some("number".to_string()),
            is_const: true,
            exported: false,
            scope: ScopeTag::Module,
        });

        let resolver = FileResolver::new(&[]);
        let output = extract_file(&file, &parsed, &resolver);

        assert_eq!(output.batch.variables.len(), 1);
        assert!(!output.exports.contains_key("count"));
    }
}
