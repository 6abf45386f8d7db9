//! Fixtures shared by the test modules.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway project directory.
pub(crate) struct Project {
    _dir: TempDir,
    root: PathBuf,
}

impl Project {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = fs::canonicalize(dir.path()).expect("canonical temp dir");
        Self { _dir: dir, root }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub(crate) fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write fixture");
        path
    }
}

/// Shell-script stand-in for `tsc`: reports TS2322 for every `.ts` file in
/// the project's `files` list that contains `= 42;`.
#[cfg(unix)]
pub(crate) const FAKE_TSC: &str = r#"project="$4"
status=0
for f in $(grep -o '"/[^"]*\.ts"' "$project" | tr -d '"'); do
  if grep -q '= 42;' "$f" 2>/dev/null; then
    echo "$f(1,7): error TS2322: Type 'number' is not assignable to type 'string'."
    status=2
  fi
done
exit $status
"#;

/// Write an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub(crate) fn fake_compiler(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir).expect("create bin dir");
    let path = dir.join(name);
    {
        let mut file = fs::File::create(&path).expect("create script");
        file.write_all(format!("#!/bin/sh\n{body}").as_bytes())
            .expect("write script");
        file.sync_all().expect("sync script");
    }
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

/// Bump a file's modification time so mtime-based caches notice the change
/// regardless of timestamp granularity.
pub(crate) fn touch_later(path: &Path) {
    let file = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .expect("open for touch");
    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(10);
    file.set_modified(later).expect("set mtime");
}
