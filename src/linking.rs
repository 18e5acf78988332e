//! The call-graph linker (component E, "Pass 2").
//!
//! Pass 1 (the extraction pipeline) produces, per file, a set of entities
//! plus a list of references it could not resolve against its own
//! declarations — call sites, `extends`/`implements` targets, and type
//! references. This module builds one global symbol registry from the
//! union of every file's exports (plus, for an incremental run, the prior
//! run's exports for files that were not re-extracted) and resolves every
//! unresolved reference against it, exactly once, producing either a real
//! edge, a `references_external` edge to a ghost, or a logged drop.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::LinkError;
use crate::extraction::{AliasTarget, ExtractionOutput, UnresolvedKind, UnresolvedReference};
use crate::model::{
    mint_ghost, Batch, CallsEdge, EntityId, EntityKind, ExtendsEdge, ExtendsInterfaceEdge,
    GhostKind, GhostRow, ImplementsEdge, ReferencesExternalEdge, UsesTypeEdge,
};

/// A symbol available for Pass 2 to resolve unresolved references against:
/// either a fresh export from this run's extraction, or a previously
/// indexed export queried back from the store for files that were not
/// re-extracted this run (see `coordinator`'s incremental path).
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub name: String,
    pub id: EntityId,
    pub file_id: EntityId,
    pub file_relative_path: String,
}

/// Outcome of linking one run: the resolved edges plus counters for the
/// summary the coordinator reports.
#[derive(Debug, Clone, Default)]
pub struct LinkReport {
    pub batch: Batch,
    pub resolved: u32,
    pub external: u32,
    pub dropped: u32,
    pub errors: Vec<LinkError>,
}

/// Build the global symbol registry from this run's extraction outputs plus
/// any prior exports supplied by the caller (the union the incremental
/// coordinator needs — see §4.I).
pub fn build_registry(
    outputs: &[ExtractionOutput],
    prior_exports: &[RegistryEntry],
) -> HashMap<String, Vec<RegistryEntry>> {
    let mut registry: HashMap<String, Vec<RegistryEntry>> = HashMap::new();

    for output in outputs {
        let Some(file_id) = output.batch.file_id.clone() else {
            continue;
        };
        let file_relative_path = output
            .batch
            .files
            .first()
            .map(|f| f.relative_path.clone())
            .unwrap_or_default();
        for (name, id) in &output.exports {
            registry.entry(name.clone()).or_default().push(RegistryEntry {
                name: name.clone(),
                id: id.clone(),
                file_id: file_id.clone(),
                file_relative_path: file_relative_path.clone(),
            });
        }
    }

    for entry in prior_exports {
        registry.entry(entry.name.clone()).or_default().push(entry.clone());
    }

    registry
}

/// Run Pass 2: resolve every output's unresolved references against the
/// registry, mutating nothing in `outputs` — the result is a standalone
/// global batch the writer appends in bounded chunks (§4.F).
pub fn link(outputs: &[ExtractionOutput], registry: &HashMap<String, Vec<RegistryEntry>>) -> LinkReport {
    let mut report = LinkReport {
        batch: Batch::global(),
        ..Default::default()
    };
    let mut seen_ghosts: HashSet<EntityId> = HashSet::new();

    for output in outputs {
        let caller_relative_path = output.batch.files.first().map(|f| f.relative_path.as_str()).unwrap_or("");
        for reference in &output.unresolved {
            resolve_one(reference, caller_relative_path, &output.aliases, registry, &mut report, &mut seen_ghosts);
        }
    }

    tracing::info!(
        target: "linking",
        "pass 2 complete: {} resolved, {} external, {} dropped",
        report.resolved, report.external, report.dropped
    );
    report
}

fn resolve_one(
    reference: &UnresolvedReference,
    caller_relative_path: &str,
    aliases: &HashMap<String, AliasTarget>,
    registry: &HashMap<String, Vec<RegistryEntry>>,
    report: &mut LinkReport,
    seen_ghosts: &mut HashSet<EntityId>,
) {
    let (head, rest) = split_head(&reference.target_name);

    if let Some(alias) = aliases.get(head) {
        match alias {
            AliasTarget::Local { file_id, imported_name } => {
                let effective_name = if rest.is_empty() { imported_name.as_str() } else { rest };
                if let Some(candidates) = registry.get(effective_name) {
                    if let Some(hit) = candidates.iter().find(|c| &c.file_id == file_id) {
                        emit_resolved(reference, hit, report);
                        return;
                    }
                    if let Some(hit) = pick_candidate(candidates, &reference.from_file, caller_relative_path) {
                        emit_resolved(reference, hit, report);
                        return;
                    }
                }
                drop_reference(reference, report);
                return;
            }
            AliasTarget::External { package_name } => {
                let ghost_name = if rest.is_empty() { imported_name_fallback(head) } else { rest.to_string() };
                emit_external(reference, package_name, &ghost_name, report, seen_ghosts);
                return;
            }
        }
    }

    if let Some(candidates) = registry.get(&reference.target_name) {
        if let Some(hit) = pick_candidate(candidates, &reference.from_file, caller_relative_path) {
            emit_resolved(reference, hit, report);
            return;
        }
    }

    drop_reference(reference, report);
}

fn imported_name_fallback(head: &str) -> String {
    head.to_string()
}

/// Split a dotted path into its head segment and the remainder (without the
/// separating dot). `"axios.get"` -> `("axios", "get")`; `"foo"` -> `("foo", "")`.
fn split_head(target_name: &str) -> (&str, &str) {
    match target_name.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (target_name, ""),
    }
}

/// Tie-break policy (documented, deliberate divergence from the source's
/// scan-order tiebreak — see DESIGN.md "Open Question decisions"):
/// prefer (a) same-file, (b) same-package (same directory as the caller),
/// (c) alphabetical first by file-relative path.
fn pick_candidate<'a>(
    candidates: &'a [RegistryEntry],
    from_file: &EntityId,
    caller_relative_path: &str,
) -> Option<&'a RegistryEntry> {
    let caller_dir = Path::new(caller_relative_path).parent();
    candidates.iter().min_by(|a, b| {
        let a_key = candidate_rank(a, from_file, caller_dir);
        let b_key = candidate_rank(b, from_file, caller_dir);
        a_key.cmp(&b_key)
    })
}

fn candidate_rank<'a>(
    candidate: &'a RegistryEntry,
    from_file: &EntityId,
    caller_dir: Option<&Path>,
) -> (u8, u8, &'a str) {
    let same_file = candidate.file_id == *from_file;
    let same_package = Path::new(&candidate.file_relative_path).parent() == caller_dir;
    (
        u8::from(!same_file),
        u8::from(!same_package),
        candidate.file_relative_path.as_str(),
    )
}

fn emit_resolved(reference: &UnresolvedReference, hit: &RegistryEntry, report: &mut LinkReport) {
    match &reference.kind {
        UnresolvedKind::Call { direct, awaited } => {
            report.batch.calls.push(CallsEdge {
                from: reference.from.clone(),
                to: hit.id.clone(),
                line: reference.line,
                direct: *direct,
                awaited: *awaited,
            });
        }
        UnresolvedKind::Extends => {
            report.batch.extends.push(ExtendsEdge {
                from: reference.from.clone(),
                to: hit.id.clone(),
            });
        }
        UnresolvedKind::Implements => {
            report.batch.implements.push(ImplementsEdge {
                from: reference.from.clone(),
                to: hit.id.clone(),
            });
        }
        UnresolvedKind::ExtendsInterface => {
            report.batch.extends_interface.push(ExtendsInterfaceEdge {
                from: reference.from.clone(),
                to: hit.id.clone(),
            });
        }
        UnresolvedKind::UsesType { context, parameter_name } => {
            report.batch.uses_type.push(UsesTypeEdge {
                from: reference.from.clone(),
                to: hit.id.clone(),
                context: context.clone(),
                parameter_name: parameter_name.clone(),
            });
        }
    }
    report.resolved += 1;
}

fn emit_external(
    reference: &UnresolvedReference,
    package_name: &str,
    name: &str,
    report: &mut LinkReport,
    seen_ghosts: &mut HashSet<EntityId>,
) {
    let entity_kind = ghost_entity_kind(&reference.kind);
    let ghost_id = mint_ghost(Some(package_name), name, entity_kind);

    if seen_ghosts.insert(ghost_id.clone()) {
        report.batch.ghosts.push(GhostRow {
            id: ghost_id.clone(),
            name: name.to_string(),
            package_name: Some(package_name.to_string()),
            kind: ghost_kind(&reference.kind),
            signature: None,
            external: true,
        });
    }

    report.batch.references_external.push(ReferencesExternalEdge {
        from: reference.from.clone(),
        to: ghost_id,
        context: reference_context(&reference.kind),
        line: reference.line,
    });
    report.external += 1;
}

fn drop_reference(reference: &UnresolvedReference, report: &mut LinkReport) {
    tracing::debug!(
        target: "linking",
        "dropping unresolved reference {} -> {} (line {})",
        reference.from.as_str(), reference.target_name, reference.line
    );
    report.dropped += 1;
    report.errors.push(LinkError::Unresolved {
        caller: reference.from.clone(),
        callee_expr: reference.target_name.clone(),
    });
}

fn reference_context(kind: &UnresolvedKind) -> String {
    match kind {
        UnresolvedKind::Call { .. } => "call".to_string(),
        UnresolvedKind::Extends => "extends".to_string(),
        UnresolvedKind::Implements => "implements".to_string(),
        UnresolvedKind::ExtendsInterface => "extends_interface".to_string(),
        UnresolvedKind::UsesType { context, .. } => format!("uses_type:{context}"),
    }
}

fn ghost_entity_kind(kind: &UnresolvedKind) -> EntityKind {
    match kind {
        UnresolvedKind::Call { .. } => EntityKind::Function,
        UnresolvedKind::Extends | UnresolvedKind::Implements => EntityKind::Class,
        UnresolvedKind::ExtendsInterface => EntityKind::Interface,
        UnresolvedKind::UsesType { .. } => EntityKind::Ghost,
    }
}

fn ghost_kind(kind: &UnresolvedKind) -> GhostKind {
    match kind {
        UnresolvedKind::Call { .. } => GhostKind::Function,
        UnresolvedKind::Extends | UnresolvedKind::Implements | UnresolvedKind::ExtendsInterface => {
            GhostKind::Class
        }
        UnresolvedKind::UsesType { .. } => GhostKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{mint, mint_file, Batch, FileRow, Language};
    use std::path::PathBuf;

    fn file_row(relative_path: &str) -> FileRow {
        FileRow {
            id: mint_file(relative_path),
            absolute_path: PathBuf::from(relative_path),
            relative_path: relative_path.to_string(),
            extension: "ts".to_string(),
            content_hash: "deadbeef".to_string(),
            size_bytes: 0,
            mtime_unix: 0,
            language: Language::TypeScript,
            framework: None,
        }
    }

    fn output_with_export(relative_path: &str, symbol: &str, id: EntityId) -> ExtractionOutput {
        let file_id = mint_file(relative_path);
        let mut batch = Batch::for_file(file_id.clone());
        batch.files.push(file_row(relative_path));
        let mut output = ExtractionOutput {
            batch,
            ..Default::default()
        };
        output.exports.insert(symbol.to_string(), id);
        output
    }

    #[test]
    fn two_file_call_resolves_after_pass_two() {
        let foo_id = mint(mint_file("a.ts").as_str(), EntityKind::Function, "foo", "sig");
        let a = output_with_export("a.ts", "foo", foo_id.clone());

        let caller_id = mint(mint_file("b.ts").as_str(), EntityKind::Function, "callerOfFoo", "sig");
        let mut b = ExtractionOutput {
            batch: Batch::for_file(mint_file("b.ts")),
            ..Default::default()
        };
        b.batch.files.push(file_row("b.ts"));
        b.unresolved.push(UnresolvedReference {
            from: caller_id.clone(),
            from_file: mint_file("b.ts"),
            target_name: "foo".to_string(),
            line: 5,
            kind: UnresolvedKind::Call {
                direct: true,
                awaited: false,
            },
        });

        let outputs = vec![a, b];
        let registry = build_registry(&outputs, &[]);
        let report = link(&outputs, &registry);

        assert_eq!(report.batch.calls.len(), 1);
        assert_eq!(report.batch.calls[0].from, caller_id);
        assert_eq!(report.batch.calls[0].to, foo_id);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.external, 0);
        assert_eq!(report.dropped, 0);
    }

    #[test]
    fn external_call_via_alias_mints_ghost_and_references_external() {
        let caller_id = mint(mint_file("a.ts").as_str(), EntityKind::Function, "fetchData", "sig");
        let mut a = ExtractionOutput {
            batch: Batch::for_file(mint_file("a.ts")),
            ..Default::default()
        };
        a.batch.files.push(file_row("a.ts"));
        a.aliases.insert(
            "axios".to_string(),
            AliasTarget::External {
                package_name: "axios".to_string(),
            },
        );
        a.unresolved.push(UnresolvedReference {
            from: caller_id.clone(),
            from_file: mint_file("a.ts"),
            target_name: "axios.get".to_string(),
            line: 3,
            kind: UnresolvedKind::Call {
                direct: true,
                awaited: true,
            },
        });

        let outputs = vec![a];
        let registry = build_registry(&outputs, &[]);
        let report = link(&outputs, &registry);

        assert_eq!(report.batch.ghosts.len(), 1);
        assert_eq!(report.batch.ghosts[0].name, "get");
        assert_eq!(report.batch.ghosts[0].package_name.as_deref(), Some("axios"));
        assert_eq!(report.batch.references_external.len(), 1);
        assert_eq!(report.batch.references_external[0].context, "call");
        assert_eq!(report.batch.calls.len(), 0);
        assert_eq!(report.external, 1);
    }

    #[test]
    fn unresolvable_reference_is_dropped_with_logged_warning() {
        let caller_id = mint(mint_file("a.ts").as_str(), EntityKind::Function, "orphan", "sig");
        let mut a = ExtractionOutput {
            batch: Batch::for_file(mint_file("a.ts")),
            ..Default::default()
        };
        a.batch.files.push(file_row("a.ts"));
        a.unresolved.push(UnresolvedReference {
            from: caller_id,
            from_file: mint_file("a.ts"),
            target_name: "neverDeclared".to_string(),
            line: 1,
            kind: UnresolvedKind::Call {
                direct: true,
                awaited: false,
            },
        });

        let outputs = vec![a];
        let registry = build_registry(&outputs, &[]);
        let report = link(&outputs, &registry);

        assert_eq!(report.dropped, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.batch.calls.is_empty());
        assert!(report.batch.references_external.is_empty());
    }

    #[test]
    fn ambiguous_name_prefers_alphabetical_file_path() {
        let b_id = mint(mint_file("b.ts").as_str(), EntityKind::Function, "shared", "sig");
        let z_id = mint(mint_file("z.ts").as_str(), EntityKind::Function, "shared", "sig");
        let b = output_with_export("b.ts", "shared", b_id.clone());
        let z = output_with_export("z.ts", "shared", z_id);

        let caller_id = mint(mint_file("caller.ts").as_str(), EntityKind::Function, "caller", "sig");
        let mut caller = ExtractionOutput {
            batch: Batch::for_file(mint_file("caller.ts")),
            ..Default::default()
        };
        caller.batch.files.push(file_row("caller.ts"));
        caller.unresolved.push(UnresolvedReference {
            from: caller_id,
            from_file: mint_file("caller.ts"),
            target_name: "shared".to_string(),
            line: 1,
            kind: UnresolvedKind::Call {
                direct: true,
                awaited: false,
            },
        });

        let outputs = vec![b, z, caller];
        let registry = build_registry(&outputs, &[]);
        let report = link(&outputs, &registry);

        assert_eq!(report.batch.calls[0].to, b_id);
    }

    #[test]
    fn ambiguous_name_prefers_same_package_over_alphabetically_earlier_cross_package() {
        // "shared" is exported by both `pkg/helpers.ts` (the caller's own
        // directory) and `aaa/helpers.ts` (alphabetically first, but a
        // different package). The same-package candidate must win even
        // though it loses on pure alphabetical order.
        let same_package_id = mint(mint_file("pkg/helpers.ts").as_str(), EntityKind::Function, "shared", "sig");
        let cross_package_id = mint(mint_file("aaa/helpers.ts").as_str(), EntityKind::Function, "shared", "sig");
        let same_package = output_with_export("pkg/helpers.ts", "shared", same_package_id.clone());
        let cross_package = output_with_export("aaa/helpers.ts", "shared", cross_package_id);

        let caller_id = mint(mint_file("pkg/caller.ts").as_str(), EntityKind::Function, "caller", "sig");
        let mut caller = ExtractionOutput {
            batch: Batch::for_file(mint_file("pkg/caller.ts")),
            ..Default::default()
        };
        caller.batch.files.push(file_row("pkg/caller.ts"));
        caller.unresolved.push(UnresolvedReference {
            from: caller_id,
            from_file: mint_file("pkg/caller.ts"),
            target_name: "shared".to_string(),
            line: 1,
            kind: UnresolvedKind::Call {
                direct: true,
                awaited: false,
            },
        });

        let outputs = vec![same_package, cross_package, caller];
        let registry = build_registry(&outputs, &[]);
        let report = link(&outputs, &registry);

        assert_eq!(report.batch.calls[0].to, same_package_id);
    }

    #[test]
    fn ghost_is_deduplicated_across_call_sites() {
        let caller_id = mint(mint_file("a.ts").as_str(), EntityKind::Function, "a", "sig");
        let other_id = mint(mint_file("a.ts").as_str(), EntityKind::Function, "b", "sig");
        let mut a = ExtractionOutput {
            batch: Batch::for_file(mint_file("a.ts")),
            ..Default::default()
        };
        a.batch.files.push(file_row("a.ts"));
        a.aliases.insert(
            "axios".to_string(),
            AliasTarget::External {
                package_name: "axios".to_string(),
            },
        );
        for (from, line) in [(caller_id, 1u32), (other_id, 2u32)] {
            a.unresolved.push(UnresolvedReference {
                from,
                from_file: mint_file("a.ts"),
                target_name: "axios.get".to_string(),
                line,
                kind: UnresolvedKind::Call {
                    direct: true,
                    awaited: false,
                },
            });
        }

        let outputs = vec![a];
        let registry = build_registry(&outputs, &[]);
        let report = link(&outputs, &registry);

        assert_eq!(report.batch.ghosts.len(), 1);
        assert_eq!(report.batch.references_external.len(), 2);
    }
}
