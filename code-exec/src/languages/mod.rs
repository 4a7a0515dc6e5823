//! Static table of supported languages.
//!
//! Every language has the same shape: an optional compile step and a run
//! step, both argument vectors with placeholders. Adding a language means
//! adding a row to [`PROFILES`].

mod template;

pub use template::{Invocation, Placeholders};

use serde::Serialize;
use which::which;

/// How to turn a source file into a running process for one language.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageProfile {
    /// Canonical identifier, e.g. `cpp`
    pub id: &'static str,
    /// Human readable name
    pub name: &'static str,
    /// Other identifiers accepted on input
    pub aliases: &'static [&'static str],
    /// Source file extension without the dot
    pub extension: &'static str,
    /// Fixed file stem for toolchains that derive names from the file
    /// (a public Java class must live in a file of the same name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_stem: Option<&'static str>,
    /// Compiler invocation, `None` for interpreted languages
    pub compile: Option<&'static [&'static str]>,
    /// Interpreter or binary invocation
    pub run: &'static [&'static str],
    /// Whether the run step tolerates an address-space rlimit. Runtimes that
    /// reserve large virtual regions up front (JVM, V8, Go) fail to start
    /// under one.
    #[serde(skip)]
    pub limit_address_space: bool,
}

impl LanguageProfile {
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Name of the source file inside the per-call directory.
    pub fn source_file_name(&self, unique: &str) -> String {
        match self.file_stem {
            Some(stem) => format!("{}.{}", stem, self.extension),
            None => format!("source-{}.{}", unique, self.extension),
        }
    }

    /// Host tools this profile invokes directly.
    pub fn required_tools(&self) -> Vec<&'static str> {
        self.compile
            .iter()
            .chain(std::iter::once(&self.run))
            .filter_map(|step| step.first().copied())
            .filter(|program| !program.starts_with('{'))
            .collect()
    }

    /// Whether every tool this profile needs is on the host `PATH`.
    pub fn is_available(&self) -> bool {
        self.required_tools().iter().all(|tool| check_command(tool))
    }
}

pub static PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        id: "python",
        name: "Python",
        aliases: &["py", "python3"],
        extension: "py",
        file_stem: None,
        compile: None,
        run: &["python3", "{source}"],
        limit_address_space: true,
    },
    LanguageProfile {
        id: "javascript",
        name: "JavaScript",
        aliases: &["js", "node"],
        extension: "js",
        file_stem: None,
        compile: None,
        run: &["node", "{source}"],
        limit_address_space: false,
    },
    LanguageProfile {
        id: "typescript",
        name: "TypeScript",
        aliases: &["ts"],
        extension: "ts",
        file_stem: None,
        compile: None,
        run: &["ts-node", "{source}"],
        limit_address_space: false,
    },
    LanguageProfile {
        id: "java",
        name: "Java",
        aliases: &[],
        extension: "java",
        file_stem: Some("Main"),
        compile: Some(&["javac", "-d", "{dir}", "{source}"]),
        run: &["java", "-cp", "{dir}", "Main"],
        limit_address_space: false,
    },
    LanguageProfile {
        id: "cpp",
        name: "C++",
        aliases: &["c++", "cxx"],
        extension: "cpp",
        file_stem: None,
        compile: Some(&["g++", "-std=c++17", "-O2", "-o", "{binary}", "{source}"]),
        run: &["{binary}"],
        limit_address_space: true,
    },
    LanguageProfile {
        id: "c",
        name: "C",
        aliases: &[],
        extension: "c",
        file_stem: None,
        compile: Some(&["gcc", "-std=c99", "-O2", "-o", "{binary}", "{source}", "-lm"]),
        run: &["{binary}"],
        limit_address_space: true,
    },
    LanguageProfile {
        id: "go",
        name: "Go",
        aliases: &["golang"],
        extension: "go",
        file_stem: None,
        compile: Some(&["go", "build", "-o", "{binary}", "{source}"]),
        run: &["{binary}"],
        limit_address_space: false,
    },
    LanguageProfile {
        id: "rust",
        name: "Rust",
        aliases: &["rs"],
        extension: "rs",
        file_stem: None,
        compile: Some(&["rustc", "-O", "-o", "{binary}", "{source}"]),
        run: &["{binary}"],
        limit_address_space: true,
    },
    LanguageProfile {
        id: "php",
        name: "PHP",
        aliases: &[],
        extension: "php",
        file_stem: None,
        compile: None,
        run: &["php", "{source}"],
        limit_address_space: true,
    },
    LanguageProfile {
        id: "ruby",
        name: "Ruby",
        aliases: &["rb"],
        extension: "rb",
        file_stem: None,
        compile: None,
        run: &["ruby", "{source}"],
        limit_address_space: false,
    },
    LanguageProfile {
        id: "shell",
        name: "Shell",
        aliases: &["bash", "sh"],
        extension: "sh",
        file_stem: None,
        compile: None,
        run: &["bash", "{source}"],
        limit_address_space: true,
    },
    LanguageProfile {
        id: "powershell",
        name: "PowerShell",
        aliases: &["pwsh", "ps1"],
        extension: "ps1",
        file_stem: None,
        compile: None,
        run: &["pwsh", "-NoProfile", "-NonInteractive", "-File", "{source}"],
        limit_address_space: false,
    },
];

/// Finds the profile for an identifier or alias, ignoring case and
/// surrounding whitespace.
pub fn lookup(language: &str) -> Option<&'static LanguageProfile> {
    let wanted = language.trim().to_ascii_lowercase();
    if wanted.is_empty() {
        return None;
    }
    PROFILES.iter().find(|profile| {
        profile.id == wanted || profile.aliases.iter().any(|alias| *alias == wanted)
    })
}

/// Canonical identifiers of every supported language.
pub fn supported_languages() -> Vec<&'static str> {
    PROFILES.iter().map(|profile| profile.id).collect()
}

pub(crate) fn check_command(cmd: &str) -> bool {
    which(cmd).is_ok()
}

#[cfg(test)]
pub(crate) fn skip_if_not_available(tools: &[&str]) -> bool {
    let missing: Vec<_> = tools
        .iter()
        .filter(|tool| which(**tool).is_err())
        .map(|s| (*s).to_string())
        .collect();

    if !missing.is_empty() {
        eprintln!("Skipping test: {} not available", missing.join(", "));
        return true;
    }
    false
}
