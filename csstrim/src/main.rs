mod site;

use anyhow::{Context, Result};
use clap::Parser;
use csstrim_lib::{minimize, DomSnapshot, TrimInput, TrimOptions};
use log::info;
use regex::Regex;
use site::{Site, SiteOptions};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use url::Url;

#[derive(Parser)]
#[command(name = "csstrim")]
#[command(about = "Keep only the CSS your pages can reach")]
struct Args {
    /// HTML pages to collect selectors from.
    #[arg(required = true)]
    pages: Vec<PathBuf>,

    /// Write the result here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory the site is served from.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// URL the root directory is served at.
    #[arg(long, default_value = "http://localhost/")]
    base_url: Url,

    /// Regex of selectors to always keep. Repeatable.
    #[arg(short, long)]
    whitelist: Vec<String>,

    /// Regex of stylesheet URLs to leave out. Repeatable.
    #[arg(long)]
    skip: Vec<Regex>,

    /// Treat FROM as redirected to TO. Repeatable.
    #[arg(long, value_name = "FROM=TO", value_parser = parse_redirect)]
    redirect: Vec<(String, String)>,

    /// Drop malformed CSS with a warning instead of failing.
    #[arg(long)]
    ignore_css_errors: bool,

    /// Collapse identical /*! */ comments.
    #[arg(long)]
    dedupe_important_comments: bool,

    /// Prepend a comment describing the run.
    #[arg(long)]
    verbose: bool,

    /// Log every selector the pages cannot evaluate.
    #[arg(long)]
    debug: bool,
}

fn parse_redirect(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((from, to)) if !from.is_empty() && !to.is_empty() => {
            Ok((from.to_string(), to.to_string()))
        }
        _ => Err(format!("expected FROM=TO, got `{}`", value)),
    }
}

fn main() {
    let args: Args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let css = match run(&args) {
        Ok(css) => css,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, css) {
                eprintln!("Error writing {}: {}", path.display(), e);
                std::process::exit(2);
            }
            info!("wrote {}", path.display());
        }
        None => println!("{}", css),
    }
}

fn run(args: &Args) -> Result<String> {
    let started = Instant::now();
    let options = TrimOptions {
        ignore_css_errors: args.ignore_css_errors,
        dedupe_important_comments: args.dedupe_important_comments,
        debug: args.debug,
        ..TrimOptions::default()
    }
    .with_whitelist(&args.whitelist)?;

    let site = Site::load(
        &args.pages,
        &SiteOptions {
            root: &args.root,
            base_url: &args.base_url,
            skip: &args.skip,
            redirects: &args.redirect,
        },
    )?;

    let output = minimize(
        TrimInput {
            snapshots: site
                .snapshots
                .iter()
                .map(|snapshot| snapshot as &dyn DomSnapshot)
                .collect(),
            registry: site.registry,
            stylesheets: site.stylesheets,
            origin: site.origin,
        },
        &options,
    )
    .context("trimming stylesheets")?;

    if !args.verbose {
        return Ok(output.css);
    }
    let before: usize = output.stylesheet_contents.values().map(String::len).sum();
    Ok(format!(
        "/*\ncsstrim: {} pages in {:.2?}\nFrom {} stylesheets, {} bytes down to {} bytes\nOptions: whitelist={:?} skip={:?} ignore_css_errors={}\n*/\n{}",
        args.pages.len(),
        started.elapsed(),
        output.stylesheet_contents.len(),
        before,
        output.css.len(),
        args.whitelist,
        args.skip.iter().map(Regex::as_str).collect::<Vec<_>>(),
        args.ignore_css_errors,
        output.css
    ))
}
