//! Minimal CLI: infer → (go | schema)
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::codegen::{Codegen, EmitOptions};
use crate::inference::{ConflictPolicy, InferOptions, Inference, Solved};

static GO_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{Nd}_]*$").expect("valid identifier regex"));

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// infer structure from JSON/NDJSON samples and emit Go struct declarations
#[derive(Parser, Debug)]
#[command(name = "json2go", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// infer and emit Go struct declarations
    Go(GoOut),
    /// infer and print the inferred type tree as JSON (debug view)
    Schema(SchemaOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct InferSettings {
    /// name of the top-level type
    #[arg(long, default_value = "Root", value_parser = parse_type_name)]
    root_type: String,

    /// what to do when samples disagree on a field's type
    #[arg(long, value_enum, default_value_t = ConflictPolicy::Skip)]
    conflict: ConflictPolicy,

    /// detect samples one at a time instead of on the thread pool
    #[arg(long)]
    sequential: bool,
}

#[derive(clap::Parser, Debug)]
struct GoOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    infer_settings: InferSettings,

    /// inline nested structs instead of declaring each one at top level
    #[arg(long)]
    anonymous: bool,

    /// emit a `package` clause first
    #[arg(long)]
    package: Option<String>,

    /// output .go file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    infer_settings: InferSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq)]
enum Source {
    Stdin,
    File(PathBuf),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Stdin => f.write_str("<stdin>"),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Source {
    fn read(&self) -> Result<String> {
        match self {
            Source::Stdin => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("failed to read stdin")?;
                Ok(text)
            }
            Source::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read source file {}", path.display())),
        }
    }
}

impl InputSettings {
    fn load_samples(&self) -> Result<Vec<Value>> {
        let mut samples = Vec::new();
        for source in resolve_file_path_patterns(&self.input)? {
            let text = source.read()?;
            for document in decode_documents(&text, self.ndjson)
                .with_context(|| format!("failed to parse JSON source ({source})"))?
            {
                let document = match self.json_pointer.as_deref() {
                    None => document,
                    Some(pointer) => select_pointer(document, pointer)
                        .with_context(|| format!("in {source}"))?,
                };
                match self.jq_expr.as_deref() {
                    None => samples.push(document),
                    Some(jq_expr) => {
                        let outputs = crate::jq_exec::run_jaq(jq_expr, &document).with_context(
                            || format!("failed to apply jq expression to {source}"),
                        )?;
                        samples.extend(outputs);
                    }
                }
            }
        }
        tracing::debug!(samples = samples.len(), "loaded samples");
        Ok(samples)
    }
}

impl InferSettings {
    fn solve(&self, input: &InputSettings) -> Result<Solved> {
        let samples = input.load_samples()?;
        let mut inference = Inference::new(
            self.root_type.clone(),
            InferOptions {
                conflict_policy: self.conflict,
                parallel: !self.sequential,
            },
        );
        inference.observe_all(&samples)?;
        let solved = inference.solve()?;
        report_diagnostics(&solved);
        Ok(solved)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Go(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let solved = target.infer_settings.solve(&target.input_settings)?;
                let mut cg = Codegen::with_options(EmitOptions {
                    anonymous: target.anonymous,
                    ..EmitOptions::default()
                });
                if let Some(package) = target.package.as_deref() {
                    cg.package(package);
                }
                cg.emit(&solved.root);
                write_output(target.out.as_deref(), &cg.into_string())
            }
            Command::Schema(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let solved = target.infer_settings.solve(&target.input_settings)?;
                let mut schema_src = serde_json::to_string_pretty(&solved.root)?;
                schema_src.push('\n');
                write_output(target.out.as_deref(), &schema_src)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn parse_type_name(raw: &str) -> Result<String, String> {
    if GO_IDENTIFIER.is_match(raw) {
        Ok(raw.to_string())
    } else {
        Err(format!("`{raw}` is not a valid Go identifier"))
    }
}

fn decode_documents(text: &str, ndjson: bool) -> Result<Vec<Value>> {
    if !ndjson {
        return Ok(vec![serde_json::from_str(text)?]);
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
        })
        .collect()
}

fn select_pointer(mut document: Value, pointer: &str) -> Result<Value> {
    document
        .pointer_mut(pointer)
        .map(Value::take)
        .ok_or_else(|| anyhow!("JSON pointer {pointer} matched nothing"))
}

fn report_diagnostics(solved: &Solved) {
    for diagnostic in &solved.diagnostics {
        eprintln!("{} {diagnostic}", "warning:".yellow().bold());
    }
}

fn write_output(out: Option<&Path>, src: &str) -> Result<()> {
    let Some(out) = out else {
        print!("{src}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, src).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<Source>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<Source>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if pattern == "-" {
            out.push(Source::Stdin);
        } else if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern {pattern}"))? {
                out.push(Source::File(entry?));
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(Source::File(PathBuf::from(pattern)));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        CommandLineInterface::command().debug_assert();
    }

    #[test]
    fn parses_go_subcommand() {
        let cli = CommandLineInterface::try_parse_from([
            "json2go", "go", "-i", "a.json", "b.json", "--anonymous", "--conflict", "abort",
            "--root-type", "Payload",
        ])
        .unwrap();
        let Command::Go(target) = cli.cmd else { panic!("expected go subcommand") };
        assert_eq!(target.input_settings.input, ["a.json", "b.json"]);
        assert!(target.anonymous);
        assert_eq!(target.infer_settings.conflict, ConflictPolicy::Abort);
        assert_eq!(target.infer_settings.root_type, "Payload");
    }

    #[test]
    fn rejects_invalid_root_type() {
        let parsed = CommandLineInterface::try_parse_from([
            "json2go", "go", "-i", "a.json", "--root-type", "1bad",
        ]);
        assert!(parsed.is_err());
        assert!(parse_type_name("Root").is_ok());
        assert!(parse_type_name("my-type").is_err());
    }

    #[test]
    fn ndjson_skips_blank_lines_and_reports_bad_ones() {
        let docs = decode_documents("{\"a\": 1}\n\n[2]\n", true).unwrap();
        assert_eq!(docs, vec![json!({"a": 1}), json!([2])]);

        let error = decode_documents("{\"a\": 1}\n{oops\n", true).unwrap_err();
        assert!(format!("{error:#}").contains("line 2"));
    }

    #[test]
    fn plain_input_is_one_document() {
        let docs = decode_documents("{\"a\":\n 1}", false).unwrap();
        assert_eq!(docs, vec![json!({"a": 1})]);
    }

    #[test]
    fn json_pointer_selects_subdocument() {
        let document = json!({"data": {"items": [{"id": 1}]}});
        let selected = select_pointer(document.clone(), "/data/items/0").unwrap();
        assert_eq!(selected, json!({"id": 1}));

        let error = select_pointer(document, "/data/missing").unwrap_err();
        assert_eq!(error.to_string(), "JSON pointer /data/missing matched nothing");
    }

    #[test]
    fn stdin_and_literal_paths_resolve() {
        let sources = resolve_file_path_patterns(["-", "data/x.json"]).unwrap();
        assert_eq!(sources, vec![Source::Stdin, Source::File(PathBuf::from("data/x.json"))]);
    }

    #[test]
    fn unmatched_glob_is_an_error() {
        let error = resolve_file_path_patterns(["/definitely/not/here/*.json"]).unwrap_err();
        assert!(error.to_string().contains("matched no files"));
    }
}
