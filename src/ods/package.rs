//! `.ods` package reading and writing.
//!
//! Reading checks the `mimetype` part, prescans `settings.xml` for split
//! hints and streams `content.xml` straight out of the archive into a
//! [`ParseSession`]. Writing packages the parts rendered by
//! [`crate::ods::writer`] with an uncompressed `mimetype` first, as ODF
//! requires.

use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use tracing::debug;
use zip::write::{SimpleFileOptions, ZipWriter};

use super::constants::{
    MIMETYPE, PART_CONTENT, PART_MANIFEST, PART_META, PART_MIMETYPE, PART_SETTINGS, PART_STYLES,
};
use super::options::OdsOptions;
use super::parser::ParseSession;
use super::settings::prescan_settings;
use super::sheet::{Dataset, Sheet};
use super::writer;
use crate::common::xml::escape_xml;
use crate::common::{Diagnostics, Error, Result};
use crate::store::FeatureStore;

/// A spreadsheet document read into tables.
///
/// # Examples
///
/// ```no_run
/// use odstab::ods::Spreadsheet;
///
/// # fn main() -> odstab::Result<()> {
/// let spreadsheet = Spreadsheet::open("data.ods")?;
/// for sheet in spreadsheet.sheets() {
///     println!("{}: {} rows", sheet.name(), sheet.row_count());
/// }
/// for diagnostic in spreadsheet.diagnostics().iter() {
///     eprintln!("{}", diagnostic);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Spreadsheet {
    dataset: Dataset,
}

impl Spreadsheet {
    /// Open an `.ods` file with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, &OdsOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, options: &OdsOptions) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(std::io::BufReader::new(file), options)
    }

    /// Read a complete `.ods` file held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes), &OdsOptions::default())
    }

    /// Read a package from any seekable source.
    ///
    /// # Errors
    ///
    /// Fails when the source is not a ZIP archive, carries another document
    /// type, has no `content.xml`, or cannot be read. Problems inside the
    /// document are reported through [`Self::diagnostics`] instead.
    pub fn from_reader<R: Read + Seek>(reader: R, options: &OdsOptions) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)
            .map_err(|_| Error::InvalidFormat("Invalid ZIP archive".to_string()))?;

        let mimetype = {
            let mut file = archive.by_name(PART_MIMETYPE).map_err(|_| {
                Error::InvalidFormat("No mimetype file found in ODF package".to_string())
            })?;
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            content.trim().to_string()
        };
        if mimetype != MIMETYPE {
            return Err(Error::InvalidFormat(format!(
                "Not an ODS file: MIME type is {}",
                mimetype
            )));
        }

        let mut diagnostics = Diagnostics::new();
        let split_hints = match archive.by_name(PART_SETTINGS) {
            Ok(file) => prescan_settings(file, &mut diagnostics)?,
            Err(_) => {
                debug!("package has no settings.xml");
                HashSet::new()
            },
        };

        let content = archive
            .by_name(PART_CONTENT)
            .map_err(|_| Error::ComponentNotFound(PART_CONTENT.to_string()))?;
        let mut dataset = ParseSession::new(options.clone())
            .with_split_hints(split_hints)
            .parse(content)?;

        diagnostics.extend(std::mem::take(&mut dataset.diagnostics));
        dataset.diagnostics = diagnostics;
        Ok(Self { dataset })
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.dataset.sheets
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.dataset.sheet_by_name(name)
    }

    /// Everything reported while reading, settings prescan included.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.dataset.diagnostics
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn dataset_mut(&mut self) -> &mut Dataset {
        &mut self.dataset
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }
}

/// Writes sheets as an `.ods` package.
///
/// # Examples
///
/// ```
/// use odstab::ods::{Sheet, Spreadsheet, SpreadsheetWriter};
/// use odstab::store::{ColumnDef, ColumnType, FeatureStore, FieldValue, MemoryTable};
///
/// # fn main() -> odstab::Result<()> {
/// let mut store = MemoryTable::new();
/// store.create_column(ColumnDef::new("city", ColumnType::STRING))?;
/// store.append_row(vec![FieldValue::String("Oslo".into())])?;
///
/// let mut writer = SpreadsheetWriter::new();
/// writer.add_sheets(&[Sheet::new("Cities", true, store)]);
/// let bytes = writer.finish_to_bytes()?;
///
/// let read = Spreadsheet::from_bytes(bytes)?;
/// assert_eq!(read.sheets()[0].columns()[0].name, "city");
/// # Ok(())
/// # }
/// ```
pub struct SpreadsheetWriter<W: Write + Seek> {
    zip_writer: ZipWriter<W>,
    content: String,
    settings: String,
}

impl SpreadsheetWriter<Cursor<Vec<u8>>> {
    /// Writer producing the package in memory.
    pub fn new() -> Self {
        Self::with_writer(Cursor::new(Vec::new()))
    }

    pub fn finish_to_bytes(self) -> Result<Vec<u8>> {
        Ok(self.finish()?.into_inner())
    }
}

impl Default for SpreadsheetWriter<Cursor<Vec<u8>>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Seek> SpreadsheetWriter<W> {
    pub fn with_writer(writer: W) -> Self {
        Self {
            zip_writer: ZipWriter::new(writer),
            content: writer::write_content_xml::<crate::store::MemoryTable>(&[]),
            settings: writer::write_settings_xml::<crate::store::MemoryTable>(&[]),
        }
    }

    /// Render the sheets to write; replaces anything added before.
    pub fn add_sheets<S: FeatureStore>(&mut self, sheets: &[Sheet<S>]) -> &mut Self {
        self.content = writer::write_content_xml(sheets);
        self.settings = writer::write_settings_xml(sheets);
        self
    }

    /// Write every part and close the archive.
    pub fn finish(mut self) -> Result<W> {
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        // mimetype must be the first entry and uncompressed
        self.zip_writer.start_file(PART_MIMETYPE, stored)?;
        self.zip_writer.write_all(MIMETYPE.as_bytes())?;

        let styles = writer::write_styles_xml();
        let meta = writer::write_meta_xml();
        let parts = [
            (PART_CONTENT, self.content.as_str()),
            (PART_STYLES, styles.as_str()),
            (PART_META, meta.as_str()),
            (PART_SETTINGS, self.settings.as_str()),
        ];
        for (path, xml) in parts {
            self.zip_writer.start_file(path, deflated)?;
            self.zip_writer.write_all(xml.as_bytes())?;
        }

        let manifest = generate_manifest(&parts.map(|(path, _)| path));
        self.zip_writer.start_file(PART_MANIFEST, deflated)?;
        self.zip_writer.write_all(manifest.as_bytes())?;

        Ok(self.zip_writer.finish()?)
    }
}

/// Write `sheets` to an `.ods` file at `path`.
pub fn save<P: AsRef<Path>, S: FeatureStore>(path: P, sheets: &[Sheet<S>]) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    let mut writer = SpreadsheetWriter::with_writer(file);
    writer.add_sheets(sheets);
    writer.finish()?.sync_all()?;
    Ok(())
}

fn generate_manifest(paths: &[&str]) -> String {
    let mut manifest = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.3">
  <manifest:file-entry manifest:full-path="/" manifest:version="1.3" manifest:media-type="{}"/>
"#,
        MIMETYPE
    );
    for path in paths {
        manifest.push_str(&format!(
            "  <manifest:file-entry manifest:full-path=\"{}\" manifest:media-type=\"text/xml\"/>\n",
            escape_xml(path)
        ));
    }
    manifest.push_str("</manifest:manifest>\n");
    manifest
}
