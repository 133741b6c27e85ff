/*
    toyboxtool - A Toybox save container parser, verifier and editor
    Copyright (C) 2025 toyboxtool contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Editing save containers inside a zip archive.

use {
    crate::{
        container::{decompress, recompress},
        dxt1,
        error::{Error, Result},
        records::{decode_text, find_screenshot, replace_field, DESC_KEY, NAME_KEY, SCREENSHOT_KEY},
        utils::{RESERVED_SUFFIX, SAVE_ENTRY_PREFIXES, SCREENSHOT_HEIGHT, SCREENSHOT_WIDTH},
    },
    log::{debug, info, warn},
    std::io::{Cursor, Read, Write},
    zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter},
};

/// Which archive entries are save containers, and the screenshot size.
#[derive(Debug, Clone)]
pub struct InjectOptions {
    pub prefixes: Vec<String>,
    pub reserved_suffix: String,
    pub width: u32,
    pub height: u32,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self {
            prefixes: SAVE_ENTRY_PREFIXES.iter().map(ToString::to_string).collect(),
            reserved_suffix: RESERVED_SUFFIX.to_owned(),
            width: SCREENSHOT_WIDTH,
            height: SCREENSHOT_HEIGHT,
        }
    }
}

impl InjectOptions {
    /// Whether a bare file name is a save, ignoring where it sits.
    #[must_use]
    pub fn is_save_name(&self, base: &str) -> bool {
        !base.is_empty()
            && self.prefixes.iter().any(|p| base.starts_with(p.as_str()))
            && !base.ends_with(&self.reserved_suffix)
    }

    /// Whether `name` is a save sitting directly inside `root`, as returned by
    /// [`save_root`]. Deeper entries are never saves.
    #[must_use]
    pub fn is_save_entry(&self, name: &str, root: &str) -> bool {
        name.strip_prefix(root)
            .is_some_and(|base| !base.contains('/') && self.is_save_name(base))
    }
}

/// The folder saves are looked for in.
///
/// When every entry sits under one top-level directory that directory is
/// descended into (`"Folder/"`), otherwise it is the archive root (`""`).
#[must_use]
pub fn save_root<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut root = None;
    for name in names {
        let Some((top, _)) = name.split_once('/') else {
            return String::new();
        };
        match root {
            None => root = Some(top),
            Some(r) if r == top => {}
            Some(_) => return String::new(),
        }
    }
    root.map_or_else(String::new, |r| format!("{r}/"))
}

/// What happened to one save entry.
#[derive(Debug)]
pub struct EntryOutcome {
    pub name: String,
    pub result: Result<()>,
}

/// A rewritten archive. Entries that failed hold their original bytes.
#[derive(Debug)]
pub struct Rewrite {
    pub archive: Vec<u8>,
    pub outcomes: Vec<EntryOutcome>,
}

impl Rewrite {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// The new archive if any save entry was edited.
    ///
    /// # Errors
    /// The first entry's error when every entry failed.
    pub fn into_archive(self) -> Result<Vec<u8>> {
        if self.succeeded() > 0 {
            return Ok(self.archive);
        }
        self.outcomes
            .into_iter()
            .find_map(|o| o.result.err())
            .map_or(Err(Error::NoSaveContainer), Err)
    }
}

/// Copies `archive` entry by entry, passing each save container through `edit`.
///
/// Other entries are copied raw and stay byte-identical. A save whose edit
/// fails is copied raw as well, and the failure is kept in the outcomes.
///
/// # Errors
/// `Error::NoSaveContainer` if no entry is a save, zip errors otherwise.
pub fn rewrite_archive<F>(archive: &[u8], opts: &InjectOptions, mut edit: F) -> Result<Rewrite>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>>,
{
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    let mut outcomes = Vec::new();
    let root = save_root(zip.file_names());
    debug!("looking for saves in \"{root}\"");

    for i in 0..zip.len() {
        let (name, original, options) = {
            let mut file = zip.by_index(i)?;
            if file.is_dir() || !opts.is_save_entry(file.name(), &root) {
                drop(file);
                out.raw_copy_file(zip.by_index_raw(i)?)?;
                continue;
            }
            let mut buf = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
            file.read_to_end(&mut buf)?;
            //edited entries keep their timestamp and permissions
            let mut options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            if let Some(time) = file.last_modified() {
                options = options.last_modified_time(time);
            }
            if let Some(mode) = file.unix_mode() {
                options = options.unix_permissions(mode);
            }
            (file.name().to_owned(), buf, options)
        };

        debug!("editing save entry {name} ({:#X} bytes)", original.len());
        match edit(&original) {
            Ok(edited) => {
                out.start_file(name.as_str(), options)?;
                out.write_all(&edited)?;
                outcomes.push(EntryOutcome { name, result: Ok(()) });
            }
            Err(e) => {
                warn!("keeping original bytes of {name}: {e}");
                out.raw_copy_file(zip.by_index_raw(i)?)?;
                outcomes.push(EntryOutcome { name, result: Err(e) });
            }
        }
    }

    if outcomes.is_empty() {
        return Err(Error::NoSaveContainer);
    }
    let archive = out.finish()?.into_inner();
    info!("rewrote archive, {} of {} save entries edited", outcomes.iter().filter(|o| o.result.is_ok()).count(), outcomes.len());
    Ok(Rewrite { archive, outcomes })
}

/// Swaps the hex blob of `SCREENSHOT = $...$` in one raw container.
///
/// The new blob keeps the letter case of the old one.
///
/// # Errors
/// `Error::FieldNotFound` if the container has no screenshot field, plus any
/// container error.
pub fn inject_screenshot_into_container(raw: &[u8], dxt1: &[u8]) -> Result<Vec<u8>> {
    let (text, encoding) = decode_text(&decompress(raw)?);
    let span = find_screenshot(&text).ok_or(Error::FieldNotFound(SCREENSHOT_KEY))?;
    let blob = if text[span.clone()].bytes().any(|b| b.is_ascii_uppercase()) {
        hex::encode_upper(dxt1)
    } else {
        hex::encode(dxt1)
    };
    let mut edited = String::with_capacity(text.len() - span.len() + blob.len());
    edited.push_str(&text[..span.start]);
    edited.push_str(&blob);
    edited.push_str(&text[span.end..]);
    recompress(&encoding.encode(&edited), raw)
}

/// Sets `AUTHOREDNAME` and/or `AUTHOREDDESC` in one raw container.
///
/// # Errors
/// `Error::FieldNotFound` if a field to be set is absent, plus any container
/// error.
pub fn edit_metadata_in_container(raw: &[u8], name: Option<&str>, description: Option<&str>) -> Result<Vec<u8>> {
    let (mut text, encoding) = decode_text(&decompress(raw)?);
    if let Some(name) = name {
        text = replace_field(&text, NAME_KEY, name)?;
    }
    if let Some(description) = description {
        text = replace_field(&text, DESC_KEY, description)?;
    }
    recompress(&encoding.encode(&text), raw)
}

/// The stored screenshot of one raw container, still DXT1 compressed.
///
/// # Errors
/// `Error::FieldNotFound` without a screenshot field, `Error::Format` if the
/// blob is not valid hex.
pub fn screenshot_from_container(raw: &[u8]) -> Result<Vec<u8>> {
    let (text, _) = decode_text(&decompress(raw)?);
    let span = find_screenshot(&text).ok_or(Error::FieldNotFound(SCREENSHOT_KEY))?;
    hex::decode(text[span].trim()).map_err(|e| Error::format(format!("bad screenshot hex: {e}")))
}

/// Replaces the screenshot of every save in `archive` with `image_bytes`.
///
/// # Errors
/// `Error::ImageDecode` for unreadable images, `Error::NoSaveContainer`, or
/// the first entry error when no save could be edited.
pub fn inject_screenshot(archive: &[u8], image_bytes: &[u8], opts: &InjectOptions) -> Result<Vec<u8>> {
    let dxt1 = dxt1::encode_bytes(image_bytes, opts.width, opts.height)?;
    rewrite_archive(archive, opts, |raw| inject_screenshot_into_container(raw, &dxt1))?.into_archive()
}

/// Sets the authored name and/or description of every save in `archive`.
///
/// # Errors
/// `Error::NoSaveContainer`, or the first entry error when no save could be
/// edited.
pub fn edit_metadata(
    archive: &[u8],
    name: Option<&str>,
    description: Option<&str>,
    opts: &InjectOptions,
) -> Result<Vec<u8>> {
    rewrite_archive(archive, opts, |raw| edit_metadata_in_container(raw, name, description))?.into_archive()
}

/// Name and bytes of the first save entry in `archive`.
///
/// # Errors
/// `Error::NoSaveContainer` if there is none, zip errors otherwise.
pub fn extract_save(archive: &[u8], opts: &InjectOptions) -> Result<(String, Vec<u8>)> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let root = save_root(zip.file_names());
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        if !file.is_dir() && opts.is_save_entry(file.name(), &root) {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            return Ok((file.name().to_owned(), buf));
        }
    }
    Err(Error::NoSaveContainer)
}
