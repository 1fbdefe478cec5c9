use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};

use diag::{render_cli_diagnostics, render_source_diagnostics, Diagnostics, RenderConfig};

mod cli;
mod preprocess;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let config = RenderConfig {
        color: std::io::stderr().is_terminal(),
    };

    let mut cli_diagnostics = Diagnostics::new();
    let parsed = cli::parse_args(&args, &mut cli_diagnostics);
    if !cli_diagnostics.is_empty() {
        // One locked burst so styled lines never interleave.
        let stderr = std::io::stderr();
        let mut lock = stderr.lock();
        let _ = render_cli_diagnostics(&mut lock, &cli_diagnostics, &args, config);
    }
    let options = match parsed {
        Ok(options) => options,
        Err(_) => return ExitCode::FAILURE,
    };
    if options.print_help_and_exit {
        print!("{}", cli::USAGE);
        return ExitCode::SUCCESS;
    }
    if !options.nologo {
        eprintln!("resc {}", env!("CARGO_PKG_VERSION"));
    }

    match run(&options, config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("resc: error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Drive the pipeline. `Ok(false)` means diagnostics carried at least one
/// error: nothing was written and the exit code is non-zero.
fn run(options: &cli::Options, config: RenderConfig) -> Result<bool> {
    let preprocessed = if options.preprocess {
        if options.verbose {
            eprintln!("[resc] preprocessing {}", options.input_filename);
        }
        preprocess::run(options)?
    } else {
        std::fs::read(&options.input_filename)
            .with_context(|| format!("unable to read input file '{}'", options.input_filename))?
    };

    if options.verbose {
        for (name, action) in sorted_symbols(options) {
            match action {
                cli::SymbolAction::Define(value) => eprintln!("[resc] define {name}={value}"),
                cli::SymbolAction::Undefine => eprintln!("[resc] undefine {name}"),
            }
        }
    }

    let (mut source, mappings) =
        pp::parse_and_remove_line_commands(&preprocessed, &options.input_filename);
    pp::remove_comments(&mut source);
    if options.verbose {
        eprintln!("[resc] pre-pass done, {} bytes", source.len());
    }

    let mut diagnostics = Diagnostics::new();
    let lexer_options = lex::LexerOptions {
        code_page: options.default_code_page.unwrap_or(codepage::CodePage::Windows1252),
        max_string_literal_codepoints: options.max_string_literal_codepoints,
    };
    let parser_options = parse::ParserOptions {
        warn_instead_of_error_on_invalid_code_page: options
            .warn_instead_of_error_on_invalid_code_page,
    };

    let mut output = Vec::new();
    let parsed = parse::parse_file(&source, lexer_options, parser_options, &mut diagnostics);
    if let Ok(file) = &parsed {
        if options.verbose {
            eprintln!("[resc] parsed {} top-level statements", file.statements.len());
        }
        let compile_options = compile::CompileOptions {
            default_language: options
                .default_language_id
                .unwrap_or(compile::lang::DEFAULT_LANGUAGE_ID),
            null_terminate_string_table_strings: options.null_terminate_string_table_strings,
            silence_duplicate_control_ids: options.silence_duplicate_control_ids,
            search_paths: resource_search_paths(options),
        };
        let _ = compile::compile(&source, file, &compile_options, &mut diagnostics, &mut output);
    }

    if !diagnostics.is_empty() {
        let stderr = std::io::stderr();
        let mut lock = stderr.lock();
        render_source_diagnostics(&mut lock, &diagnostics, &source, Some(&mappings), config)?;
    }
    // Any error suppresses the output file entirely.
    if parsed.is_err() || diagnostics.has_errors() {
        return Ok(false);
    }

    std::fs::write(&options.output_filename, &output).with_context(|| {
        format!("unable to write output file '{}'", options.output_filename)
    })?;
    if options.verbose {
        eprintln!(
            "[resc] wrote {} ({} bytes)",
            options.output_filename,
            output.len()
        );
    }
    Ok(true)
}

fn sorted_symbols(options: &cli::Options) -> Vec<(&String, &cli::SymbolAction)> {
    let mut symbols: Vec<_> = options.symbols.iter().collect();
    symbols.sort_by_key(|(name, _)| name.as_str());
    symbols
}

/// Where file-based resources are looked up: the input's directory, the
/// working directory, explicit `/i` paths, then `INCLUDE` unless `/x`.
fn resource_search_paths(options: &cli::Options) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(parent) = std::path::Path::new(&options.input_filename).parent() {
        if !parent.as_os_str().is_empty() {
            paths.push(parent.to_path_buf());
        }
    }
    paths.push(PathBuf::from("."));
    paths.extend(options.extra_include_paths.iter().map(PathBuf::from));
    if !options.ignore_include_env_var {
        if let Ok(include) = std::env::var("INCLUDE") {
            paths.extend(
                include
                    .split([':', ';'])
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from),
            );
        }
    }
    paths
}
