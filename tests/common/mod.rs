#![allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
// Shared helpers for integration tests.
//
// `FakeHost` implements both host seams over a real temporary directory:
// files and directories are real, while external commands and the mount
// table are simulated.  Commands and removals share one ordered call log so
// tests can assert acquire/release ordering.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use macprov_cli::config::Config;
use macprov_cli::context::Context;
use macprov_cli::exec::{ExecError, ExecResult, Executor};
use macprov_cli::fetch::CURL;
use macprov_cli::install::INSTALLER;
use macprov_cli::logging::Logger;
use macprov_cli::mount::{HDIUTIL, UMOUNT};
use macprov_cli::operations::{FileSystemOps, SystemFileSystemOps};

#[derive(Debug, Default)]
struct HostState {
    log: Vec<String>,
    mounts: BTreeSet<PathBuf>,
    scripted: Vec<(String, String, ExecResult)>,
    fail_removals: bool,
}

/// Simulated macOS host rooted in a temporary directory.
#[derive(Debug)]
pub struct FakeHost {
    root: tempfile::TempDir,
    state: Mutex<HostState>,
    counter: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            root: tempfile::tempdir().expect("create temp dir"),
            state: Mutex::new(HostState::default()),
            counter: AtomicUsize::new(0),
        })
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Root of the fake filesystem.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Create a file under the root and return its path.
    pub fn file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.root().join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    /// Create a directory under the root and return its path.
    pub fn dir(&self, name: &str) -> PathBuf {
        let path = self.root().join(name);
        std::fs::create_dir_all(&path).expect("create fixture dir");
        path
    }

    /// Answer `program first_arg ...` with `result` instead of the default.
    pub fn script(&self, program: &str, first_arg: &str, result: ExecResult) {
        self.state()
            .scripted
            .push((program.to_string(), first_arg.to_string(), result));
    }

    pub fn fail_removals(&self) {
        self.state().fail_removals = true;
    }

    /// Ordered log: one line per command (`program arg...`) or removal.
    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    /// Index of the first log line starting with `prefix`.
    pub fn index_of(&self, prefix: &str) -> Option<usize> {
        self.log().iter().position(|line| line.starts_with(prefix))
    }

    /// Number of log lines starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.log()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    pub fn mounted(&self) -> Vec<PathBuf> {
        self.state().mounts.iter().cloned().collect()
    }

    /// Context wired to this host with an in-root cache directory.
    pub fn context(self: &Arc<Self>) -> Context {
        let mut config = Config::default();
        config.inventory.cache_dir = Some(self.root().join("cache"));
        self.context_with(config)
    }

    pub fn context_with(self: &Arc<Self>, config: Config) -> Context {
        Context::new(config)
            .with_executor(self.clone())
            .with_fs_ops(self.clone())
            .with_log(Arc::new(Logger::new()))
    }

    fn simulate(&self, program: &str, args: &[&str]) -> ExecResult {
        let mut state = self.state();
        state
            .log
            .push(std::iter::once(program).chain(args.iter().copied()).collect::<Vec<_>>().join(" "));

        let first = args.first().copied().unwrap_or_default();
        if let Some((_, _, result)) = state
            .scripted
            .iter()
            .rev()
            .find(|(p, a, _)| p == program && a == first)
        {
            return result.clone();
        }

        match (program, first) {
            (HDIUTIL, "attach") => {
                let Some(dir) = flag_value(args, "-mountpoint") else {
                    return ExecResult::failed(1, "hdiutil: attach: no mount point");
                };
                state.mounts.insert(PathBuf::from(dir));
                ExecResult::ok(attach_plist(dir))
            }
            (HDIUTIL, "detach") => ExecResult::ok(""),
            (HDIUTIL, "eject") | (UMOUNT, _) => {
                if let Some(mp) = args.last() {
                    state.mounts.remove(Path::new(mp));
                }
                ExecResult::ok("")
            }
            (INSTALLER, _) => ExecResult::ok("installer: The install was successful.\n"),
            (CURL, _) => match flag_value(args, "-o") {
                Some(dest) => match std::fs::write(dest, b"downloaded image") {
                    Ok(()) => ExecResult::ok(""),
                    Err(e) => ExecResult::failed(23, format!("curl: (23) {e}")),
                },
                None => ExecResult::failed(2, "curl: no output"),
            },
            _ => ExecResult::failed(127, format!("{program}: command not found")),
        }
    }
}

fn flag_value<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| *a == flag)
        .and_then(|i| args.get(i + 1).copied())
}

/// `hdiutil attach -plist` output for a volume mounted at `dir`.
pub fn attach_plist(dir: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>system-entities</key>
  <array>
    <dict><key>dev-entry</key><string>/dev/disk5</string></dict>
    <dict>
      <key>dev-entry</key><string>/dev/disk5s1</string>
      <key>mount-point</key><string>{dir}</string>
    </dict>
  </array>
</dict>
</plist>
"#
    )
}

/// `system_profiler -xml` output with one item per field list.
pub fn profile_xml(items: &[&[(&str, &str)]]) -> String {
    let mut body = String::new();
    for item in items {
        body.push_str("<dict>");
        for (k, v) in *item {
            body.push_str(&format!("<key>{k}</key><string>{v}</string>"));
        }
        body.push_str("</dict>");
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plist version=\"1.0\"><array><dict><key>_items</key><array>{body}</array></dict></array></plist>\n"
    )
}

impl Executor for FakeHost {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult, ExecError> {
        Ok(self.simulate(program, args))
    }

    fn run_interactive(
        &self,
        program: &str,
        args: &[&str],
        _stdin: &[u8],
    ) -> Result<ExecResult, ExecError> {
        Ok(self.simulate(program, args))
    }
}

impl FileSystemOps for FakeHost {
    fn exists(&self, path: &Path) -> bool {
        SystemFileSystemOps.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        SystemFileSystemOps.is_dir(path)
    }

    fn is_mount_point(&self, path: &Path) -> bool {
        self.state().mounts.contains(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        SystemFileSystemOps.canonicalize(path)
    }

    fn create_temp_dir(&self, prefix: &str) -> io::Result<PathBuf> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self.root().join(format!("{prefix}{n}"));
        std::fs::create_dir(&path)?;
        Ok(path)
    }

    fn create_temp_file(&self, prefix: &str, suffix: &str) -> io::Result<PathBuf> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self.root().join(format!("{prefix}{n}{suffix}"));
        std::fs::write(&path, b"")?;
        Ok(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let fail = {
            let mut state = self.state();
            state.log.push(format!("rm {}", path.display()));
            state.fail_removals
        };
        if fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
        }
        std::fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let (fail, busy) = {
            let mut state = self.state();
            state.log.push(format!("rmdir {}", path.display()));
            (state.fail_removals, state.mounts.contains(path))
        };
        if fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
        }
        if busy {
            return Err(io::Error::new(io::ErrorKind::ResourceBusy, "resource busy"));
        }
        std::fs::remove_dir(path)
    }
}
