/// Translation completeness checker
///
/// Compares every locale catalog's key set against the reference locale
/// and prints what is missing or extra. With --strict, any difference
/// makes the process exit non-zero, for CI.
use anyhow::{bail, Context};
use clap::Parser;
use prompt_party::i18n;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "check-translations", about = "Check locale catalogs for missing keys")]
struct Args {
    /// Directory holding <locale>.json files
    #[arg(long, default_value = "locales")]
    dir: PathBuf,

    /// Reference locale all others are compared against
    #[arg(long, default_value = "en")]
    reference: String,

    /// Exit non-zero when any locale differs from the reference
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let reports = i18n::check_directory(&args.dir, &args.reference)
        .with_context(|| format!("checking locales in {}", args.dir.display()))?;

    if reports.is_empty() {
        println!("No locales to compare against '{}'", args.reference);
        return Ok(());
    }

    let mut dirty = false;
    for report in &reports {
        if report.is_clean() {
            println!("{}: ok", report.locale);
            continue;
        }

        dirty = true;
        for key in &report.missing {
            println!("{}: missing '{}'", report.locale, key);
        }
        for key in &report.extra {
            println!("{}: extra '{}'", report.locale, key);
        }
    }

    if dirty && args.strict {
        bail!("translation catalogs are out of sync");
    }

    Ok(())
}
