use anyhow::{anyhow, Context, Result};
use clap::Args;
use lml_parser::{format_error, parse};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Template to parse
    pub file: PathBuf,
}

/// Print the raw tag tree without interpreting it
pub fn tree(args: TreeArgs, cwd: &str) -> Result<()> {
    let path = PathBuf::from(cwd).join(&args.file);
    let source = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read {}", path.display()))?;

    let nodes = parse(&source).map_err(|err| {
        let file_name = args.file.display().to_string();
        anyhow!("\n{}", format_error(&source, &file_name, &err))
    })?;

    println!("{}", serde_json::to_string_pretty(&nodes)?);
    Ok(())
}
