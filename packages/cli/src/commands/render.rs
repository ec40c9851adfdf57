use super::{describe, interpreter};
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Template to render
    pub file: PathBuf,

    /// Log unresolved references and failed invocations instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Bind a template variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Config file (defaults to lml.config.json in the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn render(args: RenderArgs, cwd: &str) -> Result<()> {
    let mut config = Config::load(cwd, args.config.as_deref())?;
    if args.lenient {
        config.strict = false;
    }
    config.set_variables(&args.vars)?;

    let path = PathBuf::from(cwd).join(&args.file);
    let source = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let name = args.file.display().to_string();

    let output = interpreter(&config, cwd)?
        .render(&name, &source, config.parser_state())
        .map_err(|err| anyhow!("\n{}", describe(&err, &name, &source)))?;
    info!(
        roots = output.roots.len(),
        warnings = output.warnings.len(),
        "Rendered {}",
        name
    );

    println!("{}", serde_json::to_string_pretty(&output.to_json())?);
    Ok(())
}
