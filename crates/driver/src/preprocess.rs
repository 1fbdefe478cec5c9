//! External C preprocessor invocation.
//!
//! The compiler proper consumes preprocessed text; this module is the
//! contract boundary that produces it. `RESC_CPP` overrides discovery,
//! otherwise `clang` then `cc` are searched on PATH. `-C` keeps comments
//! in the output: the comment pre-pass owns RC's string-aware comment
//! semantics, not the C tokenizer.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};

use crate::cli::{Options, SymbolAction};

fn resolve_preprocessor() -> Result<PathBuf> {
    std::env::var("RESC_CPP")
        .map(PathBuf::from)
        .ok()
        .or_else(|| which::which("clang").ok())
        .or_else(|| which::which("cc").ok())
        .ok_or_else(|| {
            anyhow!(
                "no C preprocessor found; install clang, set RESC_CPP, \
                 or pass /no-preprocess for already-preprocessed input"
            )
        })
}

pub fn run(options: &Options) -> Result<Vec<u8>> {
    let cpp = resolve_preprocessor()?;
    let mut cmd = Command::new(&cpp);
    cmd.args(["-E", "-x", "c", "-C", "-DRC_INVOKED"]);

    let mut symbols: Vec<(&String, &SymbolAction)> = options.symbols.iter().collect();
    symbols.sort_by_key(|(name, _)| name.as_str());
    for (name, action) in symbols {
        match action {
            SymbolAction::Define(value) => {
                cmd.arg(format!("-D{name}={value}"));
            }
            SymbolAction::Undefine => {
                cmd.arg(format!("-U{name}"));
            }
        }
    }
    for path in &options.extra_include_paths {
        cmd.arg("-I").arg(path);
    }
    if !options.ignore_include_env_var {
        if let Ok(include) = std::env::var("INCLUDE") {
            for dir in include.split([':', ';']).filter(|dir| !dir.is_empty()) {
                cmd.arg("-I").arg(dir);
            }
        }
    }
    cmd.arg(&options.input_filename);

    let output = cmd
        .output()
        .with_context(|| format!("failed to spawn {}", cpp.display()))?;
    if !output.status.success() {
        bail!(
            "preprocessor failed with status {}:\n{}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim_end()
        );
    }
    Ok(output.stdout)
}
