//! Minimal CLI: check documents against a shape, or dump a compiled shape.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;

use crate::decl::CompiledShape;
use crate::value::Value;

// ------------------------------- Types ------------------------------------ //

/// validate JSON payload documents against a declared interface shape
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// check every input document against the shape's root type
    Check(CheckCmd),
    /// compile the shape and print one line per named definition
    Dump(DumpCmd),
}

#[derive(Args, Debug, Clone)]
struct ShapeSettings {
    /// shape declaration document (JSON)
    #[arg(long)]
    shape: PathBuf,
}

#[derive(clap::Parser, Debug)]
struct CheckCmd {
    #[command(flatten)]
    shape: ShapeSettings,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// treat input as newline-delimited JSON (one document per line)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// also reject child names the shape never declared (the default gate
    /// only compares name counts)
    #[arg(long, default_value_t = false)]
    strict_names: bool,
}

#[derive(clap::Parser, Debug)]
struct DumpCmd {
    #[command(flatten)]
    shape: ShapeSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ---------------------------- Implementation ------------------------------ //

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Check(cmd) => run_check(cmd),
            Command::Dump(cmd) => run_dump(cmd),
        }
    }
}

fn load_shape(settings: &ShapeSettings) -> Result<CompiledShape> {
    let path = &settings.shape;
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read shape document {}", path.display()))?;
    CompiledShape::from_str(&source)
        .with_context(|| format!("in shape document {}", path.display()))
}

fn run_check(cmd: &CheckCmd) -> Result<()> {
    let shape = load_shape(&cmd.shape)?;
    let source_paths = resolve_file_path_patterns(&cmd.input)?;

    // the compiled table is immutable, so files fan out freely
    let per_file: Vec<Result<Vec<DocReport>>> = source_paths
        .par_iter()
        .map(|path| check_file(path, cmd, &shape))
        .collect();

    let mut total = 0usize;
    let mut failed = 0usize;
    for file_reports in per_file {
        for report in file_reports? {
            total += 1;
            match report.outcome {
                Ok(()) => println!("{} {}", "OK".green(), report.label),
                Err(reason) => {
                    failed += 1;
                    println!("{} {}: {}", "FAIL".red(), report.label, reason);
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {total} documents failed the shape check");
    }
    Ok(())
}

fn run_dump(cmd: &DumpCmd) -> Result<()> {
    let shape = load_shape(&cmd.shape)?;
    let mut rendered = String::new();
    for (name, id) in &shape.names {
        let marker = if *id == shape.root { " (root)" } else { "" };
        rendered.push_str(&format!("{id} {name}{marker} = {}\n", shape.table.describe(*id)));
    }
    match cmd.out.as_ref() {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, &rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

struct DocReport {
    label: String,
    outcome: std::result::Result<(), String>,
}

fn check_file(path: &Path, cmd: &CheckCmd, shape: &CompiledShape) -> Result<Vec<DocReport>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read source file {}", path.display()))?;

    let mut out = Vec::new();
    if cmd.ndjson {
        for (index, line) in source.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let label = format!("{}:{}", path.display(), index + 1);
            out.push(DocReport { outcome: check_doc(line, cmd, shape), label });
        }
    } else {
        let label = path.display().to_string();
        out.push(DocReport { outcome: check_doc(&source, cmd, shape), label });
    }
    Ok(out)
}

fn check_doc(
    source: &str,
    cmd: &CheckCmd,
    shape: &CompiledShape,
) -> std::result::Result<(), String> {
    let doc: serde_json::Value =
        serde_json::from_str(source).map_err(|e| format!("not valid JSON: {e}"))?;
    let doc = match cmd.json_pointer.as_ref() {
        None => &doc,
        Some(pointer) => doc
            .pointer(pointer)
            .ok_or_else(|| format!("JSON pointer {pointer} selects nothing"))?,
    };
    let value = Value::from_json(doc).map_err(|e| e.to_string())?;
    let result = if cmd.strict_names {
        shape.table.check_strict(shape.root, &value)
    } else {
        shape.table.check(shape.root, &value)
    };
    result.map_err(|e| e.to_string())
}

// --------------------------- Internal helpers ----------------------------- //

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // a glob that matches nothing is explicit user intent gone
                // wrong, surface it instead of checking zero documents
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
