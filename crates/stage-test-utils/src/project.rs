//! [`TestProject`] builder for bundle and deploy scenarios.

use stage_bundle::PathMappingResolver;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Deploy root used by [`TestProject::new`], relative to the project root.
pub const DEFAULT_DEPLOY_ROOT: &str = "output/deploy";

/// A temporary project directory containing an (initially empty) deploy
/// root.
///
/// All paths are canonical, so they compare equal to the roots a
/// [`PathMappingResolver`] reports.
///
/// # Example
///
/// ```rust,no_run
/// use stage_test_utils::TestProject;
///
/// let project = TestProject::new();
/// project.write_file("app/main.py", "print('hi')");
/// let mut resolver = project.resolver();
/// resolver.add_rule("app", Some("deployed")).unwrap();
/// ```
pub struct TestProject {
    _temp_dir: TempDir,
    root: PathBuf,
    deploy_root: PathBuf,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    /// Create a project with its deploy root at `output/deploy`.
    pub fn new() -> Self {
        Self::with_deploy_root(DEFAULT_DEPLOY_ROOT)
    }

    /// Create a project with its deploy root at `deploy_root` (relative).
    pub fn with_deploy_root(deploy_root: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = dunce::canonicalize(temp_dir.path()).unwrap();
        let deploy_root = root.join(deploy_root);
        fs::create_dir_all(&deploy_root).unwrap();
        Self {
            _temp_dir: temp_dir,
            root,
            deploy_root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn deploy_root(&self) -> &Path {
        &self.deploy_root
    }

    /// Absolute path of a project-relative path.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write `content` to a project-relative file, creating parents.
    pub fn write_file(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Write several files at once.
    pub fn write_files(&self, files: &[(&str, &str)]) {
        for (relative, content) in files {
            self.write_file(relative, content);
        }
    }

    /// Create a project-relative directory and its parents.
    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// A fresh resolver over this project's roots.
    pub fn resolver(&self) -> PathMappingResolver {
        PathMappingResolver::new(&self.root, &self.deploy_root).unwrap()
    }

    /// Files below the deploy root, relative and `/`-separated, sorted.
    pub fn deployed_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        collect_files(&self.deploy_root, &self.deploy_root, &mut files);
        files.sort();
        files
    }

    /// Assert that `path` (relative to the project root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.path(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `path` (relative to the project root) does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, path: &str) {
        let full_path = self.path(path);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the file at `path` (relative to the project root) contains
    /// `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(&self, path: &str, content: &str) {
        let full_path = self.path(path);
        let file_content = fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()));
        assert!(
            file_content.contains(content),
            "File {} does not contain expected content.\nExpected: {}\nActual: {}",
            full_path.display(),
            content,
            file_content
        );
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else {
            let relative = path.strip_prefix(root).unwrap();
            out.push(
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
            );
        }
    }
}
