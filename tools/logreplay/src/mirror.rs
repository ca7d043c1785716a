//! Mirrors an input log tree into the output directory.
//!
//! Subdirectories are recreated under the output root and every recognized log
//! file becomes a [`FilePair`]. Nothing is copied; replay tasks write the
//! outputs later. The walk is fail-fast: the first I/O error aborts the build,
//! and whatever was already created stays recorded in the snapshot so cleanup
//! can still remove it.

use crate::errors::{ReplayError, ReplayWarning};
use crate::logging::Reporter;
use crate::runtime::{AccessCheck, ProductionAccessCheck};
use crate::types::{FilePair, OutputTreeSnapshot};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const INPUT_FILE_EXTENSIONS: &[&str] = &["log"];

pub struct TreeMirror {
    input_dir: PathBuf,
    output_dir: PathBuf,
    reporter: Reporter,
    access: Arc<dyn AccessCheck>,
    snapshot: OutputTreeSnapshot,
}

impl TreeMirror {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        reporter: Reporter,
    ) -> Self {
        let output_dir = output_dir.into();
        Self {
            input_dir: input_dir.into(),
            snapshot: OutputTreeSnapshot::new(&output_dir),
            output_dir,
            reporter,
            access: Arc::new(ProductionAccessCheck),
        }
    }

    pub fn with_access_check(mut self, access: Arc<dyn AccessCheck>) -> Self {
        self.access = access;
        self
    }

    pub fn snapshot(&self) -> &OutputTreeSnapshot {
        &self.snapshot
    }

    pub fn build(&mut self) -> Result<Vec<FilePair>, ReplayError> {
        if !self.input_dir.is_dir() {
            return Err(ReplayError::InvalidConfig(format!(
                "Input directory {} does not exist",
                self.input_dir.display()
            )));
        }
        if sorted_entries(&self.input_dir)?.is_empty() {
            self.reporter
                .warn(&ReplayWarning::EmptyDirectory(self.input_dir.clone()));
        }
        if !self.output_dir.is_dir() {
            return Err(ReplayError::InvalidConfig(format!(
                "Output directory {} does not exist",
                self.output_dir.display()
            )));
        }
        self.reject_nested_output()?;

        let mut pairs = Vec::new();
        let mut pending = vec![PathBuf::new()];
        while let Some(relative) = pending.pop() {
            let input_root = self.input_dir.join(&relative);
            let output_root = self.output_dir.join(&relative);
            let mut subdirs = Vec::new();

            for (name, path) in sorted_entries(&input_root)? {
                let file_type = fs::symlink_metadata(&path)
                    .map_err(|e| ReplayError::io(&path, e))?
                    .file_type();
                if file_type.is_dir() {
                    self.mirror_directory(&relative, &output_root, &name)?;
                    subdirs.push(relative.join(&name));
                } else if path.is_file() && has_recognized_extension(&path) {
                    pairs.push(self.pair_file(&relative, &output_root, &name, path)?);
                }
            }

            // Reversed so the stack yields subdirectories in name order.
            pending.extend(subdirs.into_iter().rev());
        }
        Ok(pairs)
    }

    fn reject_nested_output(&self) -> Result<(), ReplayError> {
        let input = self
            .input_dir
            .canonicalize()
            .map_err(|e| ReplayError::io(&self.input_dir, e))?;
        let output = self
            .output_dir
            .canonicalize()
            .map_err(|e| ReplayError::io(&self.output_dir, e))?;
        if output.starts_with(&input) {
            return Err(ReplayError::InvalidConfig(format!(
                "Output directory {} must not be inside input directory {}",
                self.output_dir.display(),
                self.input_dir.display()
            )));
        }
        Ok(())
    }

    fn mirror_directory(
        &mut self,
        relative: &Path,
        output_root: &Path,
        name: &OsString,
    ) -> Result<(), ReplayError> {
        let target = output_root.join(name);
        // An existing directory is an error too: cleanup could not tell our
        // outputs apart from what was already there.
        match fs::create_dir(&target) {
            Ok(()) => {
                if relative.as_os_str().is_empty() {
                    self.snapshot.record_directory(name);
                }
                Ok(())
            }
            Err(error) => Err(ReplayError::io(&target, error)),
        }
    }

    fn pair_file(
        &mut self,
        relative: &Path,
        output_root: &Path,
        name: &OsString,
        input: PathBuf,
    ) -> Result<FilePair, ReplayError> {
        if let Err(error) = self.access.check_readable(&input) {
            return Err(ReplayError::Io(format!(
                "Input file not readable: {}: {error}",
                input.display()
            )));
        }
        if let Err(error) = self.access.check_writable(output_root) {
            return Err(ReplayError::Io(format!(
                "Output dir not writable: {}: {error}",
                output_root.display()
            )));
        }

        let output = output_root.join(name);
        if relative.as_os_str().is_empty() {
            if output.symlink_metadata().is_ok() {
                return Err(ReplayError::Io(format!(
                    "Output file already exists: {}",
                    output.display()
                )));
            }
            self.snapshot.record_file(name);
        }
        Ok(FilePair { input, output })
    }
}

fn has_recognized_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| INPUT_FILE_EXTENSIONS.contains(&ext))
}

fn sorted_entries(dir: &Path) -> Result<Vec<(OsString, PathBuf)>, ReplayError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| ReplayError::io(dir, e))? {
        let entry = entry.map_err(|e| ReplayError::io(dir, e))?;
        entries.push((entry.file_name(), entry.path()));
    }
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::TreeMirror;
    use crate::errors::ReplayError;
    use crate::logging::Reporter;
    use crate::runtime::{FakeAccessCheck, FakeTerminal};
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn reporter(terminal: &FakeTerminal) -> Reporter {
        Reporter::new(Arc::new(terminal.clone()), None)
    }

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent");
        }
        fs::write(path, contents).expect("write");
    }

    #[test]
    fn mirrors_directories_and_pairs_only_log_files() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        write(&input.path().join("a/app.log"), "one\ntwo\n");
        write(&input.path().join("b/sys.txt"), "ignored\n");
        write(&input.path().join("a/deep/er/nested.log"), "x\n");
        write(&input.path().join("top.log"), "t\n");

        let terminal = FakeTerminal::new();
        let mut mirror = TreeMirror::new(input.path(), output.path(), reporter(&terminal));
        let pairs = mirror.build().expect("build");

        assert!(output.path().join("a").is_dir());
        assert!(output.path().join("b").is_dir());
        assert!(output.path().join("a/deep/er").is_dir());
        assert!(!output.path().join("b/sys.txt").exists());

        let relative = pairs
            .iter()
            .map(|pair| {
                (
                    pair.input.strip_prefix(input.path()).expect("in").to_path_buf(),
                    pair.output.strip_prefix(output.path()).expect("out").to_path_buf(),
                )
            })
            .collect::<BTreeSet<_>>();
        let expected = ["a/app.log", "a/deep/er/nested.log", "top.log"]
            .into_iter()
            .map(|p| (PathBuf::from(p), PathBuf::from(p)))
            .collect::<BTreeSet<_>>();
        assert_eq!(relative, expected);

        let snapshot = mirror.snapshot();
        assert_eq!(
            snapshot.directories().collect::<BTreeSet<_>>(),
            [output.path().join("a"), output.path().join("b")]
                .into_iter()
                .collect()
        );
        assert_eq!(
            snapshot.files().collect::<Vec<_>>(),
            vec![output.path().join("top.log")]
        );
        assert!(terminal.warning_lines().is_empty());
    }

    #[test]
    fn missing_input_or_output_is_a_config_error() {
        let present = tempfile::tempdir().expect("present");
        let terminal = FakeTerminal::new();

        let mut mirror = TreeMirror::new(
            present.path().join("missing"),
            present.path(),
            reporter(&terminal),
        );
        assert!(matches!(mirror.build(), Err(ReplayError::InvalidConfig(_))));

        let input = tempfile::tempdir().expect("input");
        let mut mirror = TreeMirror::new(
            input.path(),
            present.path().join("missing"),
            reporter(&terminal),
        );
        assert!(matches!(mirror.build(), Err(ReplayError::InvalidConfig(_))));
        assert!(mirror.snapshot().is_empty());
    }

    #[test]
    fn empty_input_warns_and_yields_no_pairs() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        let terminal = FakeTerminal::new();

        let mut mirror = TreeMirror::new(input.path(), output.path(), reporter(&terminal));
        let pairs = mirror.build().expect("empty input is fine");

        assert!(pairs.is_empty());
        assert_eq!(terminal.warning_lines().len(), 1);
        assert!(terminal.warning_lines()[0].contains("is empty"));
    }

    #[test]
    fn existing_output_directory_fails_the_build_without_being_claimed() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        write(&input.path().join("fresh/app.log"), "line\n");
        write(&input.path().join("shared/app.log"), "line\n");
        write(&output.path().join("shared/keep.txt"), "precious\n");

        let terminal = FakeTerminal::new();
        let mut mirror = TreeMirror::new(input.path(), output.path(), reporter(&terminal));
        let err = mirror.build().expect_err("collision");

        assert!(matches!(err, ReplayError::Io(_)));
        assert!(err.to_string().contains("shared"));
        assert_eq!(
            mirror.snapshot().directories().collect::<Vec<_>>(),
            vec![output.path().join("fresh")]
        );
    }

    #[test]
    fn existing_top_level_output_file_fails_the_build() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        write(&input.path().join("app.log"), "new\n");
        write(&output.path().join("app.log"), "someone else's\n");

        let terminal = FakeTerminal::new();
        let mut mirror = TreeMirror::new(input.path(), output.path(), reporter(&terminal));
        let err = mirror.build().expect_err("collision");

        assert!(err.to_string().contains("Output file already exists"));
        assert!(mirror.snapshot().is_empty());
        assert_eq!(
            fs::read_to_string(output.path().join("app.log")).expect("kept"),
            "someone else's\n"
        );
    }

    #[test]
    fn unreadable_input_file_is_an_io_error_naming_it() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        let secret = input.path().join("secret.log");
        write(&secret, "line\n");
        let access = FakeAccessCheck::default();
        access.deny_read(&secret);

        let terminal = FakeTerminal::new();
        let mut mirror = TreeMirror::new(input.path(), output.path(), reporter(&terminal))
            .with_access_check(Arc::new(access));
        let err = mirror.build().expect_err("unreadable");

        assert!(matches!(err, ReplayError::Io(_)));
        assert!(err.to_string().contains("Input file not readable"));
        assert!(err.to_string().contains("secret.log"));
    }

    #[test]
    fn unwritable_output_dir_is_an_io_error_naming_it() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        write(&input.path().join("a/app.log"), "line\n");
        let access = FakeAccessCheck::default();
        access.deny_write(output.path().join("a"));

        let terminal = FakeTerminal::new();
        let mut mirror = TreeMirror::new(input.path(), output.path(), reporter(&terminal))
            .with_access_check(Arc::new(access));
        let err = mirror.build().expect_err("unwritable");

        assert!(err.to_string().contains("Output dir not writable"));
        assert!(err.to_string().contains(&output.path().join("a").display().to_string()));
        assert_eq!(
            mirror.snapshot().directories().collect::<Vec<_>>(),
            vec![output.path().join("a")]
        );
    }

    #[test]
    fn output_inside_input_is_rejected() {
        let input = tempfile::tempdir().expect("input");
        let nested = input.path().join("out");
        fs::create_dir(&nested).expect("nested");
        let terminal = FakeTerminal::new();

        let mut mirror = TreeMirror::new(input.path(), &nested, reporter(&terminal));
        assert!(matches!(mirror.build(), Err(ReplayError::InvalidConfig(_))));
    }

    #[test]
    fn mkdir_failure_aborts_but_keeps_earlier_directories_in_snapshot() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        write(&input.path().join("a/app.log"), "line\n");
        fs::create_dir(input.path().join("b")).expect("b");
        // A plain file where directory `b` must go makes create_dir fail.
        write(&output.path().join("b"), "blocker");

        let terminal = FakeTerminal::new();
        let mut mirror = TreeMirror::new(input.path(), output.path(), reporter(&terminal));
        let err = mirror.build().expect_err("blocked mkdir");

        assert!(matches!(err, ReplayError::Io(_)));
        assert!(err.to_string().contains("/b"));
        assert_eq!(
            mirror.snapshot().directories().collect::<Vec<_>>(),
            vec![output.path().join("a")]
        );
    }
}
