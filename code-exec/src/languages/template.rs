use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Concrete paths substituted into a profile's argument templates.
#[derive(Debug, Clone)]
pub struct Placeholders {
    /// `{source}`: the materialized source file
    pub source: PathBuf,
    /// `{binary}`: where a compiler writes its executable
    pub binary: PathBuf,
    /// `{dir}`: the per-call working directory
    pub dir: PathBuf,
}

impl Placeholders {
    fn resolve(&self, name: &str) -> Option<&Path> {
        match name {
            "{source}" => Some(&self.source),
            "{binary}" => Some(&self.binary),
            "{dir}" => Some(&self.dir),
            _ => None,
        }
    }
}

/// A program plus its literal argument vector. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Invocation {
    /// Expands a template such as `["g++", "-o", "{binary}", "{source}"]`.
    ///
    /// Placeholders only match whole arguments, so source text or paths can
    /// never be spliced into the middle of a flag.
    pub fn from_template(template: &[&str], placeholders: &Placeholders) -> Option<Self> {
        let mut expanded = template.iter().map(|arg| match placeholders.resolve(arg) {
            Some(path) => path.as_os_str().to_owned(),
            None => OsString::from(arg),
        });

        let program = expanded.next()?;
        Some(Self {
            program,
            args: expanded.collect(),
        })
    }

    /// Whether the program is a path rather than a name to look up on `PATH`.
    pub fn is_path(&self) -> bool {
        Path::new(&self.program).components().count() > 1
    }
}
