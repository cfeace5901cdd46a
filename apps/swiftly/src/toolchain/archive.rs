//! Toolchain archive extraction.
//!
//! Linux toolchains ship as `.tar.gz` files with a single top-level folder
//! named after the build (`swift-5.9.2-RELEASE-ubuntu22.04/usr/bin/swift`).
//! That folder is stripped, so the archive's `usr/` lands directly in the
//! destination.

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use std::path::{Component, Path, PathBuf};
use tar::Archive;

/// Extracts a tar.gz archive into `dest_dir`, stripping a common root folder.
///
/// Every entry has to land inside `dest_dir`, including through symlinks
/// created by earlier entries.
///
/// # Errors
///
/// Returns an error if the archive cannot be read, contains absolute paths,
/// `..` components or links leading out of `dest_dir`, or a file cannot be
/// written.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;
    let root = dest_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", dest_dir.display()))?;

    let strip_prefix = find_common_root_folder(archive_path)?;
    let relative = |path: PathBuf| match &strip_prefix {
        Some(prefix) => path
            .strip_prefix(prefix)
            .map_or_else(|_| path.clone(), Path::to_path_buf),
        None => path,
    };

    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);

    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read tar entries: {}", archive_path.display()))?
    {
        let mut entry = entry
            .with_context(|| format!("Failed to read tar entry: {}", archive_path.display()))?;
        let entry_path = normalize(&entry.path().context("Failed to get entry path")?)?;
        let relative_path = relative(entry_path);
        if relative_path.as_os_str().is_empty() {
            continue;
        }

        let output_path = dest_dir.join(&relative_path);
        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            ensure_inside(&output_path, &root)?;
            std::fs::create_dir_all(&output_path).with_context(|| {
                format!("Failed to create directory: {}", output_path.display())
            })?;
            continue;
        }

        let parent = output_path.parent().unwrap_or(dest_dir);
        ensure_inside(parent, &root)?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let link_name = entry
            .link_name()
            .context("Failed to get link target")?
            .map(|target| target.into_owned());
        match link_name {
            Some(target) if entry_type.is_hard_link() => {
                // Hard link targets are archive paths, not relative to the link.
                let source = dest_dir.join(relative(normalize(&target)?));
                ensure_inside(&source, &root)?;
                if output_path.symlink_metadata().is_ok() {
                    std::fs::remove_file(&output_path).with_context(|| {
                        format!("Failed to remove {}", output_path.display())
                    })?;
                }
                std::fs::hard_link(&source, &output_path).with_context(|| {
                    format!(
                        "Failed to link {} to {}",
                        output_path.display(),
                        source.display()
                    )
                })?;
            }
            Some(target) if entry_type.is_symlink() => {
                check_symlink_target(&relative_path, &target)?;
                entry
                    .unpack(&output_path)
                    .with_context(|| format!("Failed to extract: {}", output_path.display()))?;
            }
            _ => {
                entry
                    .unpack(&output_path)
                    .with_context(|| format!("Failed to extract: {}", output_path.display()))?;
            }
        }
    }

    Ok(())
}

/// Fails if the nearest existing ancestor of `path` resolves outside `root`.
fn ensure_inside(path: &Path, root: &Path) -> Result<()> {
    let Some(existing) = path.ancestors().find(|p| p.exists()) else {
        bail!("Refusing to extract outside of {}: {}", root.display(), path.display());
    };
    let resolved = existing
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", existing.display()))?;
    if !resolved.starts_with(root) {
        bail!(
            "Refusing to extract through a link leading outside of {}: {}",
            root.display(),
            path.display()
        );
    }
    Ok(())
}

/// Rejects symlinks at `link` (relative to the destination) whose target is
/// absolute or climbs above the destination.
fn check_symlink_target(link: &Path, target: &Path) -> Result<()> {
    let mut depth = link.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => depth -= 1,
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => bail!(
                "Refusing to extract link {} pointing outside the archive: {}",
                link.display(),
                target.display()
            ),
        }
    }
    Ok(())
}

/// Drops `.` components and rejects paths that could escape the destination.
fn normalize(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => bail!(
                "Refusing to extract path with parent directory or absolute reference: {}",
                path.display()
            ),
        }
    }
    Ok(out)
}

/// Returns the folder every entry lives under, if there is exactly one and
/// something is nested inside it.
fn find_common_root_folder(archive_path: &Path) -> Result<Option<PathBuf>> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut common_root: Option<PathBuf> = None;
    let mut has_nested_entries = false;

    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read tar entries: {}", archive_path.display()))?
    {
        let entry = entry
            .with_context(|| format!("Failed to read tar entry: {}", archive_path.display()))?;
        let path = normalize(&entry.path().context("Failed to get entry path")?)?;

        if path.components().count() > 1 {
            has_nested_entries = true;
        }
        let Some(first_component) = path.components().next() else {
            continue;
        };
        let root = PathBuf::from(first_component.as_os_str());

        match &common_root {
            None => common_root = Some(root),
            Some(existing) if existing != &root => return Ok(None),
            Some(_) => {}
        }
    }

    Ok(common_root.filter(|_| has_nested_entries))
}

#[cfg(test)]
pub(crate) mod testing {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::path::Path;
    use tar::Builder;

    /// Writes a tar.gz holding `files` as `(path, contents, mode)`.
    pub fn write_tar_gz(archive_path: &Path, files: &[(&str, &[u8], u32)]) {
        write_tar_gz_with_links(archive_path, &[], files);
    }

    /// Writes a tar.gz holding the `(path, target)` symlinks in `links`,
    /// followed by `files`.
    pub fn write_tar_gz_with_links(
        archive_path: &Path,
        links: &[(&str, &str)],
        files: &[(&str, &[u8], u32)],
    ) {
        let file = std::fs::File::create(archive_path).unwrap();
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        for (path, target) in links {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_mode(0o777);
            builder.append_link(&mut header, path, target).unwrap();
        }
        for (path, contents, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, path, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    /// Builds a fake toolchain archive rooted at `root` with the given executables.
    pub fn toolchain_tar_gz(archive_path: &Path, root: &str, executables: &[&str]) {
        let paths: Vec<String> = executables
            .iter()
            .map(|name| format!("{root}/usr/bin/{name}"))
            .collect();
        let files: Vec<(&str, &[u8], u32)> = paths
            .iter()
            .map(|p| (p.as_str(), b"#!/bin/sh\necho fake\n".as_slice(), 0o755))
            .collect();
        write_tar_gz(archive_path, &files);
    }
}
