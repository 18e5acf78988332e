//! Resolves an import specifier (as written in source, e.g. `"./util"` or
//! `"axios"`) to either a known File's [`EntityId`] or an external ghost
//! package name, ahead of per-file extraction.
//!
//! The repository is fully scanned before extraction starts, so every file's
//! relative path is already known; this lets imports resolve to real File IDs
//! immediately instead of waiting for the Pass 2 linker, which only handles
//! call sites.

use std::collections::HashMap;
use std::path::Path;

use crate::model::{mint_file, EntityId, FileRow};

/// A path index built once per indexing run and shared (read-only) across
/// all per-file extraction tasks.
pub struct FileResolver {
    by_relative_path: HashMap<String, EntityId>,
}

/// Where an import specifier points, once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedImport {
    /// A relative or absolute specifier that matched a scanned file.
    Local(EntityId),
    /// A specifier that does not resolve to any file in the repository
    /// (bare package name, or a relative path with no matching file) —
    /// the caller mints or reuses a ghost for it.
    External { package_name: String },
}

impl FileResolver {
    pub fn new(files: &[FileRow]) -> Self {
        let mut by_relative_path = HashMap::with_capacity(files.len());
        for file in files {
            by_relative_path.insert(normalize(&file.relative_path), file.id.clone());
        }
        Self { by_relative_path }
    }

    /// Resolve `specifier` as imported from `importing_file_relative_path`.
    ///
    /// Relative specifiers (`./foo`, `../bar`) are joined against the
    /// importing file's directory and tried against a short list of
    /// plausible extensions and `index` files, mirroring how module
    /// resolution works in the ecosystems this spec targets. Anything else
    /// (bare package names, unresolvable relative paths) resolves external.
    pub fn resolve(&self, importing_file_relative_path: &str, specifier: &str) -> ResolvedImport {
        if !is_relative(specifier) {
            return ResolvedImport::External {
                package_name: root_package(specifier),
            };
        }

        let importing_dir = Path::new(importing_file_relative_path)
            .parent()
            .unwrap_or_else(|| Path::new(""));
        let joined = normalize_join(importing_dir, specifier);

        for candidate in candidates(&joined) {
            if let Some(id) = self.by_relative_path.get(&candidate) {
                return ResolvedImport::Local(id.clone());
            }
        }

        ResolvedImport::External {
            package_name: joined,
        }
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

/// The root package name for a bare specifier: `lodash/fp` -> `lodash`,
/// `@scope/pkg/sub` -> `@scope/pkg`.
fn root_package(specifier: &str) -> String {
    if let Some(rest) = specifier.strip_prefix('@') {
        let mut parts = rest.splitn(2, '/');
        let scope = parts.next().unwrap_or("");
        let name = parts.next().and_then(|r| r.split('/').next()).unwrap_or("");
        return format!("@{scope}/{name}");
    }
    specifier.split('/').next().unwrap_or(specifier).to_string()
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").replace('\\', "/")
}

fn normalize_join(dir: &Path, specifier: &str) -> String {
    let mut stack: Vec<String> = dir
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other.to_string()),
        }
    }
    stack.join("/")
}

fn candidates(base: &str) -> Vec<String> {
    const EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "py", "go", "rs"];
    let mut out = vec![base.to_string()];
    for ext in EXTENSIONS {
        out.push(format!("{base}.{ext}"));
        out.push(format!("{base}/index.{ext}"));
        out.push(format!("{base}/mod.{ext}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;
    use std::path::PathBuf;

    fn file(relative_path: &str) -> FileRow {
        FileRow {
            id: mint_file(relative_path),
            absolute_path: PathBuf::from(relative_path),
            relative_path: relative_path.to_string(),
            extension: relative_path.rsplit('.').next().unwrap_or("").to_string(),
            content_hash: "deadbeef".to_string(),
            size_bytes: 0,
            mtime_unix: 0,
            language: Language::TypeScript,
            framework: None,
        }
    }

    #[test]
    fn resolves_relative_sibling_import() {
        let files = vec![file("src/util.ts"), file("src/main.ts")];
        let resolver = FileResolver::new(&files);
        let resolved = resolver.resolve("src/main.ts", "./util");
        assert_eq!(resolved, ResolvedImport::Local(mint_file("src/util.ts")));
    }

    #[test]
    fn resolves_parent_relative_import() {
        let files = vec![file("src/lib/util.ts"), file("src/app/main.ts")];
        let resolver = FileResolver::new(&files);
        let resolved = resolver.resolve("src/app/main.ts", "../lib/util");
        assert_eq!(resolved, ResolvedImport::Local(mint_file("src/lib/util.ts")));
    }

    #[test]
    fn resolves_directory_index_import() {
        let files = vec![file("src/components/index.ts")];
        let resolver = FileResolver::new(&files);
        let resolved = resolver.resolve("src/main.ts", "./components");
        assert_eq!(
            resolved,
            ResolvedImport::Local(mint_file("src/components/index.ts"))
        );
    }

    #[test]
    fn bare_package_specifier_is_external() {
        let files = vec![file("src/main.ts")];
        let resolver = FileResolver::new(&files);
        let resolved = resolver.resolve("src/main.ts", "axios");
        assert_eq!(
            resolved,
            ResolvedImport::External {
                package_name: "axios".to_string()
            }
        );
    }

    #[test]
    fn scoped_package_specifier_keeps_scope_and_name_only() {
        assert_eq!(root_package("@nestjs/common/decorators"), "@nestjs/common");
    }

    #[test]
    fn unresolvable_relative_specifier_is_external() {
        let files = vec![file("src/main.ts")];
        let resolver = FileResolver::new(&files);
        let resolved = resolver.resolve("src/main.ts", "./missing");
        assert_eq!(
            resolved,
            ResolvedImport::External {
                package_name: "src/missing".to_string()
            }
        );
    }
}
