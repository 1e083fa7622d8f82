use std::path::{Path, PathBuf};

use log::debug;

use crate::syntax::ImportFromStmt;

/// Where an import resolves: a file under one of the search directories, or
/// anything else (standard library, third-party, misspelled). "Not found
/// anywhere" is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    Local(PathBuf),
    External,
}

/// Classifies imports against an ordered list of search directories.
///
/// The first directory containing a matching file wins, so a challenge's own
/// module can shadow a same-named module under a shared library root that is
/// searched later.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    search_paths: Vec<PathBuf>,
}

impl ModuleResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        debug!("Module search paths: {:?}", search_paths);
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// `a.b.c` becomes `a/b/c.py`.
    fn dotted_to_relative(dotted: &str) -> PathBuf {
        let mut path = PathBuf::new();
        for part in dotted.split('.') {
            path.push(part);
        }
        path.set_extension("py");
        path
    }

    fn probe(candidate: PathBuf) -> Option<PathBuf> {
        if candidate.is_file() {
            // Canonicalize so two import sites naming the same file through
            // different spellings dedup to one module.
            Some(candidate.canonicalize().unwrap_or(candidate))
        } else {
            None
        }
    }

    /// Probe a dotted name under one base directory: `a/b.py` first, then
    /// the package form `a/b/__init__.py`.
    fn probe_module(base: &Path, dotted: &str) -> Option<PathBuf> {
        if let Some(found) = Self::probe(base.join(Self::dotted_to_relative(dotted))) {
            return Some(found);
        }
        let mut init = base.to_path_buf();
        for part in dotted.split('.') {
            init.push(part);
        }
        init.push("__init__.py");
        Self::probe(init)
    }

    /// Classify a dotted module name from a plain `import a.b` alias.
    pub fn classify_name(&self, dotted: &str) -> ImportKind {
        for dir in &self.search_paths {
            if let Some(found) = Self::probe_module(dir, dotted) {
                debug!("Resolved '{}' to {:?} (under {:?})", dotted, found, dir);
                return ImportKind::Local(found);
            }
        }
        ImportKind::External
    }

    /// Directory a relative import resolves against: the importing file's own
    /// directory, minus one parent per level beyond the first.
    fn relative_base(importing_file: &Path, level: u32) -> Option<PathBuf> {
        let mut base = importing_file.parent()?.to_path_buf();
        for _ in 1..level {
            base = base.parent()?.to_path_buf();
        }
        Some(base)
    }

    /// Classify the module part of a `from X import ...` statement.
    pub fn classify_from(&self, stmt: &ImportFromStmt, importing_file: &Path) -> ImportKind {
        if stmt.level > 0 {
            if stmt.module.is_empty() {
                // `from . import name` resolves per imported name, see
                // `resolve_member`.
                return ImportKind::External;
            }
            let Some(base) = Self::relative_base(importing_file, stmt.level) else {
                return ImportKind::External;
            };
            return match Self::probe_module(&base, &stmt.module) {
                Some(found) => {
                    debug!(
                        "Resolved '{}' relative to {:?}: {:?}",
                        stmt.module_display(),
                        importing_file,
                        found
                    );
                    ImportKind::Local(found)
                }
                None => ImportKind::External,
            };
        }
        self.classify_name(&stmt.module)
    }

    /// Probe whether one imported name of a `from X import name` statement
    /// is itself a local module file (or package), meaning the import binds
    /// a module object rather than a plain name. Covers the relative forms
    /// (`from . import name`, `from .pkg import name`) and the absolute one
    /// (`from pkg import name` with `pkg/name.py` under a search path).
    pub fn resolve_member(
        &self,
        stmt: &ImportFromStmt,
        importing_file: &Path,
        name: &str,
    ) -> Option<PathBuf> {
        if name == "*" {
            return None;
        }
        let dotted = if stmt.module.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{}", stmt.module, name)
        };
        if stmt.level > 0 {
            let base = Self::relative_base(importing_file, stmt.level)?;
            return Self::probe_module(&base, &dotted);
        }
        for dir in &self.search_paths {
            if let Some(found) = Self::probe_module(dir, &dotted) {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ImportAlias;
    use std::fs;
    use tempfile::TempDir;

    fn from_stmt(module: &str, level: u32, name: &str) -> ImportFromStmt {
        ImportFromStmt {
            module: module.to_owned(),
            level,
            names: vec![ImportAlias::new(name, None)],
        }
    }

    #[test]
    fn first_matching_search_path_wins() -> anyhow::Result<()> {
        let project = TempDir::new()?;
        let shared = TempDir::new()?;
        fs::write(project.path().join("geometry.py"), "PROJECT = True\n")?;
        fs::write(shared.path().join("geometry.py"), "SHARED = True\n")?;

        let resolver = ModuleResolver::new(vec![
            project.path().to_path_buf(),
            shared.path().to_path_buf(),
        ]);
        match resolver.classify_name("geometry") {
            ImportKind::Local(path) => {
                assert_eq!(path, project.path().join("geometry.py").canonicalize()?);
            }
            ImportKind::External => panic!("geometry should resolve locally"),
        }
        Ok(())
    }

    #[test]
    fn dotted_names_map_to_nested_files() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        fs::create_dir(root.path().join("challengelibs"))?;
        fs::write(root.path().join("challengelibs/module.py"), "A = 1\n")?;

        let resolver = ModuleResolver::new(vec![root.path().to_path_buf()]);
        let stmt = from_stmt("challengelibs.module", 0, "function");
        match resolver.classify_from(&stmt, &root.path().join("main.py")) {
            ImportKind::Local(path) => {
                assert!(path.ends_with("challengelibs/module.py"));
            }
            ImportKind::External => panic!("challengelibs.module should resolve locally"),
        }
        Ok(())
    }

    #[test]
    fn unresolved_names_are_external() {
        let resolver = ModuleResolver::new(vec![PathBuf::from("/nonexistent")]);
        assert_eq!(resolver.classify_name("numpy"), ImportKind::External);
        let stmt = from_stmt("collections", 0, "OrderedDict");
        assert_eq!(
            resolver.classify_from(&stmt, Path::new("/nonexistent/main.py")),
            ImportKind::External
        );
    }

    #[test]
    fn relative_import_resolves_against_importing_file() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let pkg = root.path().join("libs");
        fs::create_dir(&pkg)?;
        fs::write(pkg.join("helper.py"), "from .util import u\n")?;
        fs::write(pkg.join("util.py"), "def u():\n    return 2\n")?;

        let resolver = ModuleResolver::new(vec![root.path().to_path_buf()]);
        let stmt = from_stmt("util", 1, "u");
        match resolver.classify_from(&stmt, &pkg.join("helper.py")) {
            ImportKind::Local(path) => assert!(path.ends_with("libs/util.py")),
            ImportKind::External => panic!(".util should resolve locally"),
        }
        Ok(())
    }

    #[test]
    fn second_level_relative_import_pops_a_directory() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let pkg = root.path().join("libs");
        fs::create_dir(&pkg)?;
        fs::write(root.path().join("shared.py"), "S = 1\n")?;

        let resolver = ModuleResolver::new(vec![root.path().to_path_buf()]);
        let stmt = from_stmt("shared", 2, "S");
        match resolver.classify_from(&stmt, &pkg.join("helper.py")) {
            ImportKind::Local(path) => assert!(path.ends_with("shared.py")),
            ImportKind::External => panic!("..shared should resolve locally"),
        }
        Ok(())
    }

    #[test]
    fn relative_member_probe_finds_sibling_modules() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        fs::write(root.path().join("sibling.py"), "X = 1\n")?;

        let resolver = ModuleResolver::new(vec![root.path().to_path_buf()]);
        let stmt = from_stmt("", 1, "sibling");
        let hit = resolver.resolve_member(&stmt, &root.path().join("main.py"), "sibling");
        assert!(hit.is_some());
        let miss = resolver.resolve_member(&stmt, &root.path().join("main.py"), "other");
        assert!(miss.is_none());
        Ok(())
    }

    #[test]
    fn absolute_member_probe_finds_package_submodules() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        fs::create_dir(root.path().join("pkg"))?;
        fs::write(root.path().join("pkg/helper.py"), "H = 1\n")?;

        let resolver = ModuleResolver::new(vec![root.path().to_path_buf()]);
        let stmt = from_stmt("pkg", 0, "helper");
        let hit = resolver.resolve_member(&stmt, &root.path().join("main.py"), "helper");
        assert!(
            hit.expect("pkg/helper.py should be found")
                .ends_with("pkg/helper.py")
        );
        let miss = resolver.resolve_member(&stmt, &root.path().join("main.py"), "function");
        assert!(miss.is_none());
        Ok(())
    }

    #[test]
    fn star_imports_are_never_module_members() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        fs::create_dir(root.path().join("pkg"))?;
        fs::write(root.path().join("pkg/__init__.py"), "A = 1\n")?;

        let resolver = ModuleResolver::new(vec![root.path().to_path_buf()]);
        let stmt = from_stmt("pkg", 0, "*");
        assert!(
            resolver
                .resolve_member(&stmt, &root.path().join("main.py"), "*")
                .is_none()
        );
        Ok(())
    }

    #[test]
    fn package_init_file_resolves_as_the_module() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        fs::create_dir(root.path().join("pkg"))?;
        fs::write(root.path().join("pkg/__init__.py"), "NAME = 'pkg'\n")?;

        let resolver = ModuleResolver::new(vec![root.path().to_path_buf()]);
        match resolver.classify_name("pkg") {
            ImportKind::Local(path) => assert!(path.ends_with("pkg/__init__.py")),
            ImportKind::External => panic!("pkg should resolve to its __init__.py"),
        }
        let stmt = from_stmt("pkg", 0, "NAME");
        assert!(matches!(
            resolver.classify_from(&stmt, &root.path().join("main.py")),
            ImportKind::Local(_)
        ));
        Ok(())
    }
}
