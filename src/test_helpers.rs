//! Shared fakes for unit tests.
//!
//! [`RecordingHost`] implements both [`Executor`] and [`FileSystemOps`]
//! over an in-memory host: a set of files, a set of directories and a mount
//! table.  Every command and every removal is appended to one call log so
//! tests can assert the order in which resources were released.
//!
//! Commands answer from configured rules first and fall back to a simulated
//! `hdiutil`/`umount`/`installer`/`curl`.  A successful attach mounts the
//! `-mountpoint` argument unless its plist lists no mount point; a
//! successful eject or unmount retires it.
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::exec::{ExecError, ExecResult, Executor};
use crate::fetch::CURL;
use crate::install::INSTALLER;
use crate::mount::{HDIUTIL, UMOUNT};
use crate::operations::FileSystemOps;

const TEMP_ROOT: &str = "/tmp/macprov-fake";

#[derive(Debug)]
struct Rule {
    program: String,
    args: Vec<String>,
    exact: bool,
    response: ExecResult,
}

impl Rule {
    fn matches(&self, program: &str, args: &[&str]) -> bool {
        if self.program != program {
            return false;
        }
        if self.exact {
            return self.args.len() == args.len() && self.args.iter().zip(args).all(|(a, b)| a == b);
        }
        self.args.len() <= args.len() && self.args.iter().zip(args).all(|(a, b)| a == b)
    }
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Vec<String>>,
    stdin: Vec<Vec<u8>>,
    rules: Vec<Rule>,
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
    mounts: BTreeSet<PathBuf>,
    next_temp: usize,
    fail_removals: bool,
}

/// In-memory host recording every command and filesystem removal.
#[derive(Debug, Default)]
pub struct RecordingHost {
    state: Mutex<State>,
}

/// Property list `hdiutil attach -plist` prints for an image mounted at `dir`.
pub fn attach_plist(dir: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>system-entities</key>
  <array>
    <dict>
      <key>content-hint</key><string>GUID_partition_scheme</string>
      <key>dev-entry</key><string>/dev/disk4</string>
    </dict>
    <dict>
      <key>content-hint</key><string>Apple_HFS</string>
      <key>dev-entry</key><string>/dev/disk4s1</string>
      <key>mount-point</key><string>{}</string>
    </dict>
  </array>
</dict>
</plist>"#,
        dir.display()
    )
}

fn flag_value<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| *a == flag)
        .and_then(|i| args.get(i + 1).copied())
}

impl RecordingHost {
    /// Empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_rule(&self, program: &str, args: &[&str], exact: bool, response: ExecResult) {
        self.state().rules.push(Rule {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            exact,
            response,
        });
    }

    /// Answer `program args` (exact match) with `stdout` and exit 0.
    pub fn respond(&self, program: &str, args: &[&str], stdout: &str) {
        self.add_rule(program, args, true, ExecResult::ok(stdout));
    }

    /// Answer any `program first_arg ...` with `stdout` and exit 0.
    pub fn respond_prefix(&self, program: &str, first_arg: &str, stdout: &str) {
        self.add_rule(program, &[first_arg], false, ExecResult::ok(stdout));
    }

    /// Answer any `program first_arg ...` with exit `code` and `stderr`.
    pub fn fail_prefix(&self, program: &str, first_arg: &str, code: i32, stderr: &str) {
        self.add_rule(program, &[first_arg], false, ExecResult::failed(code, stderr));
    }

    /// Answer any `program first_arg ...` with an arbitrary result.
    pub fn result_prefix(&self, program: &str, first_arg: &str, result: ExecResult) {
        self.add_rule(program, &[first_arg], false, result);
    }

    /// Add a regular file.
    pub fn add_file(&self, path: impl Into<PathBuf>) {
        self.state().files.insert(path.into());
    }

    /// Add a directory.
    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        self.state().dirs.insert(path.into());
    }

    /// Add a directory that is already a mount point.
    pub fn add_mount(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut state = self.state();
        state.dirs.insert(path.clone());
        state.mounts.insert(path);
    }

    /// Make every `remove_file`/`remove_dir` fail.
    pub fn fail_removals(&self) {
        self.state().fail_removals = true;
    }

    /// Every recorded call as an argv, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.state().calls.clone()
    }

    /// Recorded calls whose first element is `program`.
    #[must_use]
    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|argv| argv.first().is_some_and(|p| p == program))
            .collect()
    }

    /// Index of the first call whose argv starts with `prefix`.
    #[must_use]
    pub fn position(&self, prefix: &[&str]) -> Option<usize> {
        self.calls().iter().position(|argv| {
            argv.len() >= prefix.len() && argv.iter().zip(prefix).all(|(a, b)| a == b)
        })
    }

    /// Bytes written to the stdin of interactive runs, in order.
    #[must_use]
    pub fn stdin_log(&self) -> Vec<Vec<u8>> {
        self.state().stdin.clone()
    }

    /// Whether `path` is currently mounted.
    #[must_use]
    pub fn is_mounted(&self, path: &Path) -> bool {
        self.state().mounts.contains(path)
    }

    /// Whether `path` exists as a file or directory.
    #[must_use]
    pub fn has_path(&self, path: &Path) -> bool {
        let state = self.state();
        state.files.contains(path) || state.dirs.contains(path)
    }

    fn simulate(state: &mut State, program: &str, args: &[&str]) -> ExecResult {
        if let Some(rule) = state.rules.iter().find(|r| r.matches(program, args)) {
            return rule.response.clone();
        }
        match (program, args.first().copied()) {
            (HDIUTIL, Some("attach")) => flag_value(args, "-mountpoint").map_or_else(
                || ExecResult::failed(1, "hdiutil: attach failed - no mount point"),
                |dir| ExecResult::ok(attach_plist(Path::new(dir))),
            ),
            (HDIUTIL, Some("eject" | "detach")) | (UMOUNT, Some(_)) => ExecResult::ok(""),
            (INSTALLER, _) => ExecResult::ok("installer: The install was successful.\n"),
            (CURL, _) => ExecResult::ok(""),
            _ => ExecResult::failed(127, format!("{program}: no response configured")),
        }
    }

    fn apply_side_effects(state: &mut State, program: &str, args: &[&str], stdout: &[u8]) {
        match (program, args.first().copied()) {
            (HDIUTIL, Some("attach")) => {
                // A plist without a mount point means nothing was mounted.
                let text = String::from_utf8_lossy(stdout);
                let unmounted = text.contains("<plist") && !text.contains("mount-point");
                if let Some(dir) = flag_value(args, "-mountpoint")
                    && !unmounted
                {
                    state.mounts.insert(PathBuf::from(dir));
                }
            }
            (HDIUTIL, Some("eject")) => {
                if let Some(dir) = args.get(1) {
                    state.mounts.remove(Path::new(dir));
                }
            }
            (UMOUNT, Some(dir)) => {
                state.mounts.remove(Path::new(dir));
            }
            (CURL, _) => {
                if let Some(dest) = flag_value(args, "-o") {
                    state.files.insert(PathBuf::from(dest));
                }
            }
            _ => {}
        }
    }

    fn execute(&self, program: &str, args: &[&str], stdin: Option<&[u8]>) -> ExecResult {
        let mut state = self.state();
        let mut argv = vec![program.to_string()];
        argv.extend(args.iter().map(ToString::to_string));
        state.calls.push(argv);
        if let Some(bytes) = stdin {
            state.stdin.push(bytes.to_vec());
        }
        let result = Self::simulate(&mut state, program, args);
        if result.success() {
            Self::apply_side_effects(&mut state, program, args, &result.stdout);
        }
        result
    }

    fn record(state: &mut State, op: &str, path: &Path) {
        state
            .calls
            .push(vec![op.to_string(), path.display().to_string()]);
    }

    fn temp_path(state: &mut State, prefix: &str, suffix: &str) -> PathBuf {
        state.next_temp += 1;
        PathBuf::from(format!("{TEMP_ROOT}/{prefix}{}{suffix}", state.next_temp))
    }
}

impl Executor for RecordingHost {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult, ExecError> {
        Ok(self.execute(program, args, None))
    }

    fn run_interactive(
        &self,
        program: &str,
        args: &[&str],
        stdin: &[u8],
    ) -> Result<ExecResult, ExecError> {
        Ok(self.execute(program, args, Some(stdin)))
    }
}

impl FileSystemOps for RecordingHost {
    fn exists(&self, path: &Path) -> bool {
        self.has_path(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.state().dirs.contains(path)
    }

    fn is_mount_point(&self, path: &Path) -> bool {
        self.is_mounted(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        if self.has_path(path) {
            Ok(path.to_path_buf())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    fn create_temp_dir(&self, prefix: &str) -> io::Result<PathBuf> {
        let mut state = self.state();
        let path = Self::temp_path(&mut state, prefix, "");
        Self::record(&mut state, "mkdir", &path);
        state.dirs.insert(path.clone());
        Ok(path)
    }

    fn create_temp_file(&self, prefix: &str, suffix: &str) -> io::Result<PathBuf> {
        let mut state = self.state();
        let path = Self::temp_path(&mut state, prefix, suffix);
        Self::record(&mut state, "touch", &path);
        state.files.insert(path.clone());
        Ok(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state();
        Self::record(&mut state, "rm", path);
        if state.fail_removals {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
        }
        if state.files.remove(path) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state();
        Self::record(&mut state, "rmdir", path);
        if state.fail_removals {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
        }
        if state.mounts.contains(path) {
            return Err(io::Error::new(io::ErrorKind::ResourceBusy, "resource busy"));
        }
        if state.dirs.remove(path) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such directory"))
        }
    }
}
