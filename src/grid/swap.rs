//! Rename-gated folder moves for cell data directories.
//!
//! A move is staged as a sequence of renames recorded in a
//! [`FolderTransaction`]. If any rename fails (after retries for transient
//! errors) the completed renames are undone in reverse order, so callers only
//! commit config changes once every folder is where it should be.

use crate::error::SwapError;
use log::{debug, error, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub trait FolderOps {
    fn exists(&self, path: &Path) -> bool;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

pub struct StdFolderOps;

impl FolderOps for StdFolderOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(100),
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION: file held open elsewhere
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}

pub struct FolderTransaction<'a, F: FolderOps> {
    ops: &'a F,
    policy: RetryPolicy,
    done: Vec<(PathBuf, PathBuf)>,
}

impl<'a, F: FolderOps> FolderTransaction<'a, F> {
    pub fn new(ops: &'a F, policy: RetryPolicy) -> Self {
        Self {
            ops,
            policy,
            done: Vec::new(),
        }
    }

    pub fn ops(&self) -> &F {
        self.ops
    }

    pub fn rename(&mut self, from: &Path, to: &Path) -> Result<(), SwapError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.ops.rename(from, to) {
                Ok(()) => {
                    debug!("renamed {} -> {}", from.display(), to.display());
                    self.done.push((from.to_path_buf(), to.to_path_buf()));
                    return Ok(());
                }
                Err(err) if attempt < attempts && is_transient(&err) => {
                    warn!(
                        "rename {} -> {} failed (attempt {attempt}/{attempts}): {err}",
                        from.display(),
                        to.display()
                    );
                    attempt += 1;
                    std::thread::sleep(self.policy.delay);
                }
                Err(source) => {
                    return Err(SwapError::Rename {
                        from: from.to_path_buf(),
                        to: to.to_path_buf(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    /// Best-effort undo of every completed rename, newest first.
    pub fn rollback(mut self) {
        while let Some((from, to)) = self.done.pop() {
            if let Err(err) = self.ops.rename(&to, &from) {
                error!(
                    "rollback of {} -> {} failed: {err}",
                    from.display(),
                    to.display()
                );
            }
        }
    }

    pub fn commit(mut self) {
        self.done.clear();
    }
}

/// First `<name>_<n>` sibling of `path` that does not exist yet.
pub fn unique_sibling<F: FolderOps>(ops: &F, path: &Path, tag: &str) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 1u32;
    loop {
        let candidate = parent.join(format!("{name}{tag}{n}"));
        if !ops.exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Exchanges two cell folders through a temporary name.
pub fn stage_swap<F: FolderOps>(
    tx: &mut FolderTransaction<'_, F>,
    source: &Path,
    target: &Path,
) -> Result<(), SwapError> {
    let source_exists = tx.ops().exists(source);
    let target_exists = tx.ops().exists(target);
    match (source_exists, target_exists) {
        (true, true) => {
            let temp = unique_sibling(tx.ops(), target, "_swap");
            tx.rename(target, &temp)?;
            tx.rename(source, target)?;
            tx.rename(&temp, source)
        }
        (true, false) => tx.rename(source, target),
        (false, true) => tx.rename(target, source),
        (false, false) => Ok(()),
    }
}

/// Moves `source` into the empty cell `target`. A stray folder already at
/// `target` is moved aside first; its new path is returned.
pub fn stage_relocate<F: FolderOps>(
    tx: &mut FolderTransaction<'_, F>,
    source: &Path,
    target: &Path,
) -> Result<Option<PathBuf>, SwapError> {
    if !tx.ops().exists(source) {
        return Ok(None);
    }
    let mut stray = None;
    if tx.ops().exists(target) {
        let aside = unique_sibling(tx.ops(), target, "_");
        tx.rename(target, &aside)?;
        stray = Some(aside);
    }
    tx.rename(source, target)?;
    Ok(stray)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    /// Real renames, except the listed call numbers (1-based) which fail.
    pub(crate) struct FailingOps {
        pub fail_on: Vec<u32>,
        pub kind: io::ErrorKind,
        pub calls: Cell<u32>,
    }

    impl FailingOps {
        pub(crate) fn new(fail_on: Vec<u32>, kind: io::ErrorKind) -> Self {
            Self {
                fail_on,
                kind,
                calls: Cell::new(0),
            }
        }
    }

    impl FolderOps for FailingOps {
        fn exists(&self, path: &Path) -> bool {
            path.exists()
        }

        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.fail_on.contains(&call) {
                return Err(io::Error::new(self.kind, "injected failure"));
            }
            std::fs::rename(from, to)
        }
    }

    pub(crate) fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::ZERO,
        }
    }

    fn make_dir(base: &Path, name: &str, marker: &str) -> PathBuf {
        let dir = base.join(name);
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("marker.txt"), marker).expect("marker");
        dir
    }

    fn marker(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("marker.txt")).expect("read marker")
    }

    #[test]
    fn swap_exchanges_contents() {
        let base = tempfile::tempdir().expect("temp dir");
        let a = make_dir(base.path(), "0_0", "a");
        let b = make_dir(base.path(), "0_1", "b");

        let ops = StdFolderOps;
        let mut tx = FolderTransaction::new(&ops, fast_retry());
        stage_swap(&mut tx, &a, &b).expect("swap");
        tx.commit();

        assert_eq!(marker(&a), "b");
        assert_eq!(marker(&b), "a");
        assert_eq!(std::fs::read_dir(base.path()).expect("ls").count(), 2);
    }

    #[test]
    fn failure_on_second_rename_rolls_back() {
        let base = tempfile::tempdir().expect("temp dir");
        let a = make_dir(base.path(), "0_0", "a");
        let b = make_dir(base.path(), "0_1", "b");

        let ops = FailingOps::new(vec![2], io::ErrorKind::Other);
        let mut tx = FolderTransaction::new(&ops, fast_retry());
        let err = stage_swap(&mut tx, &a, &b).expect_err("should fail");
        tx.rollback();

        assert!(matches!(err, SwapError::Rename { attempts: 1, .. }));
        assert_eq!(marker(&a), "a");
        assert_eq!(marker(&b), "b");
        assert_eq!(std::fs::read_dir(base.path()).expect("ls").count(), 2);
    }

    #[test]
    fn transient_errors_are_retried() {
        let base = tempfile::tempdir().expect("temp dir");
        let a = make_dir(base.path(), "1_1", "a");
        let target = base.path().join("2_2");

        let ops = FailingOps::new(vec![1, 2], io::ErrorKind::PermissionDenied);
        let mut tx = FolderTransaction::new(&ops, fast_retry());
        stage_relocate(&mut tx, &a, &target).expect("third attempt succeeds");
        tx.commit();

        assert_eq!(ops.calls.get(), 3);
        assert_eq!(marker(&target), "a");
    }

    #[test]
    fn retry_budget_is_bounded() {
        let base = tempfile::tempdir().expect("temp dir");
        let a = make_dir(base.path(), "1_1", "a");
        let target = base.path().join("2_2");

        let ops = FailingOps::new(vec![1, 2, 3, 4], io::ErrorKind::PermissionDenied);
        let mut tx = FolderTransaction::new(&ops, fast_retry());
        let err = stage_relocate(&mut tx, &a, &target).expect_err("budget exhausted");
        tx.rollback();

        assert!(matches!(err, SwapError::Rename { attempts: 3, .. }));
        assert_eq!(ops.calls.get(), 3);
        assert!(a.exists());
    }

    #[test]
    fn relocate_moves_stray_folder_aside() {
        let base = tempfile::tempdir().expect("temp dir");
        let source = make_dir(base.path(), "0_0", "source");
        let stray = make_dir(base.path(), "3_3", "stray");
        make_dir(base.path(), "3_3_1", "older stray");

        let ops = StdFolderOps;
        let mut tx = FolderTransaction::new(&ops, fast_retry());
        let aside = stage_relocate(&mut tx, &source, &stray)
            .expect("relocate")
            .expect("stray moved");
        tx.commit();

        assert_eq!(aside, base.path().join("3_3_2"));
        assert_eq!(marker(&aside), "stray");
        assert_eq!(marker(&stray), "source");
        assert!(!source.exists());
    }
}
