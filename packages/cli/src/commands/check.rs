use super::{describe, interpreter};
use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use lml_interpreter::Interpreter;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// File or directory to check (defaults to the template directory)
    pub path: Option<PathBuf>,

    /// Config file (defaults to lml.config.json in the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Render every template strictly and report the ones that fail
pub fn check(args: CheckArgs, cwd: &str) -> Result<()> {
    let mut config = Config::load(cwd, args.config.as_deref())?;
    config.strict = true;

    let root = match &args.path {
        Some(path) => PathBuf::from(cwd).join(path),
        None => config.get_template_dir(cwd),
    };
    if !root.exists() {
        return Err(anyhow!("Path does not exist: {}", root.display()));
    }

    let files = find_lml_files(&root);
    if files.is_empty() {
        println!("{}", "No .lml files found".yellow());
        return Ok(());
    }

    let interpreter = interpreter(&config, cwd)?;
    let mut failures = 0;
    for file in &files {
        let relative = file.strip_prefix(&root).unwrap_or(file);
        match check_file(&interpreter, &config, file, &relative.display().to_string()) {
            Ok(()) => println!("  {} {}", "✓".green(), relative.display()),
            Err(message) => {
                failures += 1;
                eprintln!("  {} {}\n{}", "✗".red(), relative.display(), message);
            }
        }
    }

    println!();
    if failures == 0 {
        println!("{} Checked {} files", "Done".green().bold(), files.len());
        Ok(())
    } else {
        println!(
            "{} {} of {} files failed",
            "Done".red().bold(),
            failures,
            files.len()
        );
        std::process::exit(1);
    }
}

fn check_file(interpreter: &Interpreter, config: &Config, path: &Path, name: &str) -> Result<(), String> {
    let source = fs::read_to_string(path).map_err(|err| err.to_string())?;
    interpreter
        .render(name, &source, config.parser_state())
        .map(|_| ())
        .map_err(|err| describe(&err, name, &source))
}

fn find_lml_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut files: Vec<_> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("lml"))
        .collect();
    files.sort();
    files
}
