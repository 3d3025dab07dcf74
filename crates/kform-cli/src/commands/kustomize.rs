//! Kustomize command - apply every kustomization under a directory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use kform_core::kio::{ByteWriter, LocalPackageReadWriter, PackageBuffer};
use kform_core::{Pipeline, Reader};
use kform_engine::{FieldSpecTables, KUSTOMIZATION_FILE, Kustomization, KustomizationFilter};
use walkdir::WalkDir;

use crate::error::{CliError, Result};

pub fn run(dir: &Path, include_subpackages: bool, annotate: bool, dry_run: bool) -> Result<()> {
    let files = find_kustomizations(dir)?;
    if files.is_empty() {
        return Err(CliError::config(format!(
            "no {} found under {}",
            KUSTOMIZATION_FILE,
            dir.display()
        )));
    }

    let tables = FieldSpecTables::builtin()?;
    // Nested kustomizations first so their parents see the transformed resources.
    for file in files.iter().rev() {
        kustomize(file, &tables, include_subpackages, annotate, dry_run)?;
        if !dry_run {
            println!(
                "{} Kustomized {}",
                style("✓").green().bold(),
                style(file.display()).dim()
            );
        }
    }
    Ok(())
}

/// Every kustomization file under `dir`, parents before children
fn find_kustomizations(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| CliError::Io {
            message: e.to_string(),
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let file = entry.path().join(KUSTOMIZATION_FILE);
        if file.is_file() {
            files.push(file);
        }
    }
    Ok(files)
}

fn kustomize(
    file: &Path,
    tables: &Arc<FieldSpecTables>,
    include_subpackages: bool,
    annotate: bool,
    dry_run: bool,
) -> Result<()> {
    let root = file.parent().unwrap_or(Path::new("."));
    let kustomization = Kustomization::from_yaml(&std::fs::read_to_string(file)?)?;
    tracing::info!(
        "running kustomization {} in {}",
        kustomization.metadata.name,
        root.display()
    );

    let mut package = LocalPackageReadWriter::new(root);
    package.include_subpackages = include_subpackages;
    package.keep_reader_annotations = annotate;
    let nodes = package.read()?;

    let filter = KustomizationFilter::new(kustomization, root, Arc::clone(tables));
    let pipeline = Pipeline::new()
        .input(PackageBuffer::new(nodes))
        .filter(filter);

    if dry_run {
        let mut writer = ByteWriter::new(std::io::stdout());
        writer.keep_reader_annotations = annotate;
        pipeline.output(writer).execute()?;
    } else {
        pipeline.output(&mut package).execute()?;
    }
    Ok(())
}
