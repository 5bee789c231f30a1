use std::collections::HashMap;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use crate::compose::compositor::EncodedImage;
use crate::foundation::error::{FiligraneError, FiligraneResult};

/// Prefix for every output file name.
pub const OUTPUT_PREFIX: &str = "watermarked_";
/// Default archive name for a batch.
pub const ARCHIVE_NAME: &str = "watermarked_images.zip";

/// `watermarked_<base>.png`: directory and last extension of `source` are dropped.
pub fn output_name(source: &str) -> String {
    let file = source.rsplit(['/', '\\']).next().unwrap_or(source);
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    format!("{OUTPUT_PREFIX}{stem}.png")
}

/// Make names unique in order: repeats become `name_2.png`, `name_3.png`, ...
pub fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, u32> = HashMap::new();
    let mut taken: std::collections::HashSet<String> = names.iter().cloned().collect();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let count = seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            out.push(name);
            continue;
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((s, e)) => (s.to_owned(), format!(".{e}")),
            None => (name.clone(), String::new()),
        };
        let mut n = *count;
        let mut candidate = format!("{stem}_{n}{ext}");
        while taken.contains(&candidate) {
            n += 1;
            candidate = format!("{stem}_{n}{ext}");
        }
        taken.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// One `(filename, encoded-bytes)` pair handed to a packager.
#[derive(Clone, Copy, Debug)]
pub struct PackageEntry<'a> {
    /// Entry file name.
    pub name: &'a str,
    /// Encoded image bytes.
    pub bytes: &'a [u8],
}

/// What a packager produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageReceipt {
    /// Where the package went (a path, or a label for in-memory targets).
    pub location: String,
    /// Number of entries written.
    pub entries: usize,
    /// Total payload bytes.
    pub bytes: u64,
}

/// Output names for `outputs`, in order and collision-free.
pub fn entry_names(outputs: &[EncodedImage]) -> Vec<String> {
    dedupe_names(outputs.iter().map(EncodedImage::output_name).collect())
}

/// Consumes an ordered list of encoded outputs. Failures are reported, never retried.
pub trait Packager {
    /// Write every entry, in order.
    fn package(&mut self, entries: &[PackageEntry<'_>]) -> FiligraneResult<PackageReceipt>;
}

/// Package `outputs` with `packager`, deriving entry names.
#[tracing::instrument(skip(outputs, packager), fields(count = outputs.len()))]
pub fn package_outputs(
    outputs: &[EncodedImage],
    packager: &mut dyn Packager,
) -> FiligraneResult<PackageReceipt> {
    let names = entry_names(outputs);
    let entries: Vec<PackageEntry<'_>> = names
        .iter()
        .zip(outputs)
        .map(|(name, out)| PackageEntry {
            name,
            bytes: &out.png,
        })
        .collect();
    let receipt = packager.package(&entries)?;
    tracing::info!(location = %receipt.location, entries = receipt.entries, "packaged");
    Ok(receipt)
}

fn write_zip<W: Write + Seek>(writer: W, entries: &[PackageEntry<'_>]) -> FiligraneResult<(W, u64)> {
    let mut zip = zip::ZipWriter::new(writer);
    // PNG payloads are already compressed.
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .large_file(false);
    let mut total = 0u64;
    for entry in entries {
        zip.start_file(entry.name, options)
            .map_err(|e| FiligraneError::packaging(format!("start '{}': {e}", entry.name)))?;
        zip.write_all(entry.bytes)
            .map_err(|e| FiligraneError::packaging(format!("write '{}': {e}", entry.name)))?;
        total += entry.bytes.len() as u64;
    }
    let writer = zip
        .finish()
        .map_err(|e| FiligraneError::packaging(format!("finish archive: {e}")))?;
    Ok((writer, total))
}

/// Build a zip archive in memory.
pub fn zip_bytes(entries: &[PackageEntry<'_>]) -> FiligraneResult<Vec<u8>> {
    let (cursor, _) = write_zip(Cursor::new(Vec::new()), entries)?;
    Ok(cursor.into_inner())
}

/// Writes a zip archive to a file.
#[derive(Debug, Clone)]
pub struct ZipPackager {
    path: PathBuf,
}

impl ZipPackager {
    /// Archive at `path`. Parent directories are created on demand.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Archive path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Packager for ZipPackager {
    fn package(&mut self, entries: &[PackageEntry<'_>]) -> FiligraneResult<PackageReceipt> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                FiligraneError::packaging(format!("create '{}': {e}", parent.display()))
            })?;
        }
        let file = std::fs::File::create(&self.path).map_err(|e| {
            FiligraneError::packaging(format!("create '{}': {e}", self.path.display()))
        })?;
        let (_, bytes) = write_zip(std::io::BufWriter::new(file), entries)?;
        Ok(PackageReceipt {
            location: self.path.display().to_string(),
            entries: entries.len(),
            bytes,
        })
    }
}

/// Writes each entry as a file in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryPackager {
    dir: PathBuf,
}

impl DirectoryPackager {
    /// Output into `dir`, created on demand.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Packager for DirectoryPackager {
    fn package(&mut self, entries: &[PackageEntry<'_>]) -> FiligraneResult<PackageReceipt> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            FiligraneError::packaging(format!("create '{}': {e}", self.dir.display()))
        })?;
        let mut bytes = 0u64;
        for entry in entries {
            let path = self.dir.join(entry.name);
            std::fs::write(&path, entry.bytes).map_err(|e| {
                FiligraneError::packaging(format!("write '{}': {e}", path.display()))
            })?;
            bytes += entry.bytes.len() as u64;
        }
        Ok(PackageReceipt {
            location: self.dir.display().to_string(),
            entries: entries.len(),
            bytes,
        })
    }
}

/// In-memory packager for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryPackager {
    /// Entries in the order received.
    pub(crate) entries: Vec<(String, Vec<u8>)>,
    /// Zip archive of the last package call.
    pub(crate) archive: Option<Vec<u8>>,
}

impl InMemoryPackager {
    /// Create an empty packager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the captured entries.
    pub fn entries(&self) -> &[(String, Vec<u8>)] {
        &self.entries
    }

    /// Zip archive built from the last call.
    pub fn archive(&self) -> Option<&[u8]> {
        self.archive.as_deref()
    }
}

impl Packager for InMemoryPackager {
    fn package(&mut self, entries: &[PackageEntry<'_>]) -> FiligraneResult<PackageReceipt> {
        let archive = zip_bytes(entries)?;
        self.entries = entries
            .iter()
            .map(|e| (e.name.to_owned(), e.bytes.to_vec()))
            .collect();
        let bytes = self.entries.iter().map(|(_, b)| b.len() as u64).sum();
        self.archive = Some(archive);
        Ok(PackageReceipt {
            location: "memory".to_owned(),
            entries: entries.len(),
            bytes,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/batch/package.rs"]
mod tests;
