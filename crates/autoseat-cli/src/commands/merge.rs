use anyhow::{Context, Result};
use autoseat_infrastructure::merge_files;
use std::path::Path;

pub fn run(calls: &Path, labels: &Path, out: &Path) -> Result<()> {
    let report = merge_files(calls, labels, out).with_context(|| {
        format!(
            "Failed to merge {} with {}",
            calls.display(),
            labels.display()
        )
    })?;

    println!("{}", report);
    println!("Merged rows written to {}", out.display());
    Ok(())
}
