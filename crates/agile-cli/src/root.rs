use agile_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `AGILE_ROOT` env var (passed in as `explicit`)
/// 2. Nearest ancestor of `cwd` containing `.agile/`
/// 3. Nearest ancestor of `cwd` containing `.git/`
/// 4. `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root_from(&cwd)
}

fn find_root_from(start: &Path) -> PathBuf {
    [paths::AGILE_DIR, ".git"]
        .into_iter()
        .find_map(|marker| nearest_ancestor_with(start, marker))
        .unwrap_or_else(|| start.to_path_buf())
}

fn nearest_ancestor_with(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_agile_dir_above_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".agile")).unwrap();
        let deep = dir.path().join("src/deep");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_root_from(&deep), dir.path());
    }

    #[test]
    fn agile_dir_beats_closer_git_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".agile")).unwrap();
        let nested = dir.path().join("vendor/lib");
        std::fs::create_dir_all(nested.join(".git")).unwrap();
        assert_eq!(find_root_from(&nested), dir.path());
    }

    #[test]
    fn falls_back_to_git_then_start() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(repo.join(".git")).unwrap();
        let sub = repo.join("a");
        std::fs::create_dir_all(&sub).unwrap();
        assert_eq!(find_root_from(&sub), repo);

        let lone = TempDir::new().unwrap();
        // A stray .git above the temp dir would be found; only check the
        // result is an ancestor-or-self.
        assert!(lone.path().starts_with(find_root_from(lone.path())));
    }
}
