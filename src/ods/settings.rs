//! Split-hint prescan of `settings.xml`.
//!
//! A sheet whose view is frozen right below its first row (vertical split
//! mode 2 at position 1) almost always shows a header there. The prescan
//! collects those sheet names before `content.xml` is read.

use std::collections::HashSet;
use std::io::{BufReader, Read};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use super::constants::{
    PARSER_BUF_SIZE, SETTINGS_SPLIT_MODE, SETTINGS_SPLIT_POSITION, SETTINGS_TABLES_MAP,
};
use super::machine::{DataGuard, StateStack};
use super::tags::{Attributes, OdsAttr, OdsTag, match_tag};
use crate::common::xml::resolve_entity;
use crate::common::{Diagnostics, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsState {
    Default,
    /// Inside `config:config-item-map-named config:name="Tables"`
    TablesMap,
    /// Inside one sheet's map entry
    TableEntry,
    /// Inside a `config:config-item` of the current entry
    ConfigItem,
}

const SPLIT_MODE_SET: u8 = 1;
const SPLIT_POSITION_SET: u8 = 2;

struct Prescan<'d> {
    stack: StateStack<SettingsState>,
    guard: DataGuard,
    stop: bool,
    diagnostics: &'d mut Diagnostics,
    hints: HashSet<String>,
    entry: Option<String>,
    flags: u8,
    item: Option<String>,
    text: String,
}

impl Prescan<'_> {
    fn start_element(&mut self, e: &BytesStart<'_>) {
        self.guard.element();
        let tag = match_tag(e.name().as_ref());
        let next = match (self.stack.top(), tag) {
            (SettingsState::Default, OdsTag::ConfigItemMapNamed) => self
                .attributes(e)
                .filter(|attrs| attrs.get(OdsAttr::ConfigName) == Some(SETTINGS_TABLES_MAP))
                .map(|_| SettingsState::TablesMap),
            (SettingsState::TablesMap, OdsTag::ConfigItemMapEntry) => {
                self.attributes(e).and_then(|mut attrs| attrs.take(OdsAttr::ConfigName)).map(|name| {
                    self.entry = Some(name);
                    self.flags = 0;
                    SettingsState::TableEntry
                })
            },
            (SettingsState::TableEntry, OdsTag::ConfigItem) => {
                self.attributes(e).and_then(|mut attrs| attrs.take(OdsAttr::ConfigName)).map(|name| {
                    self.item = Some(name);
                    self.text.clear();
                    SettingsState::ConfigItem
                })
            },
            _ => None,
        };

        if let Some(state) = next
            && self.stack.push(state).is_err()
        {
            self.corrupted("settings nesting too deep; file probably corrupted");
        }
        self.stack.enter_element();
    }

    fn end_element(&mut self) {
        self.guard.element();
        match self.stack.leave_element() {
            Some(SettingsState::ConfigItem) => {
                let value = self.text.trim();
                match self.item.take().as_deref() {
                    Some(SETTINGS_SPLIT_MODE) if value == "2" => self.flags |= SPLIT_MODE_SET,
                    Some(SETTINGS_SPLIT_POSITION) if value == "1" => self.flags |= SPLIT_POSITION_SET,
                    _ => {},
                }
            },
            Some(SettingsState::TableEntry) => {
                if let Some(name) = self.entry.take()
                    && self.flags == SPLIT_MODE_SET | SPLIT_POSITION_SET
                {
                    debug!(sheet = %name, "first row frozen in view settings");
                    self.hints.insert(name);
                }
            },
            _ => {},
        }
    }

    fn characters(&mut self, text: &str) {
        if !self.guard.data() {
            self.corrupted("too much data inside one element; file probably corrupted");
            return;
        }
        if self.stack.top() == SettingsState::ConfigItem {
            self.text.push_str(text);
        }
    }

    fn attributes(&mut self, e: &BytesStart<'_>) -> Option<Attributes> {
        match Attributes::from_start(e) {
            Ok(attrs) => Some(attrs),
            Err(err) => {
                self.corrupted(&err.to_string());
                None
            },
        }
    }

    fn corrupted(&mut self, message: &str) {
        if !self.stop {
            self.diagnostics.fatal(None, format!("settings.xml: {}", message));
            self.stop = true;
        }
    }
}

/// Names of sheets whose first row is frozen in the saved view.
///
/// Corruption in `settings.xml` is reported to `diagnostics` and ends the
/// prescan with the hints found so far; only read failures are errors.
///
/// # Examples
///
/// ```
/// use odstab::common::Diagnostics;
/// use odstab::ods::settings::prescan_settings;
///
/// let xml = r#"<office:document-settings><office:settings>
///   <config:config-item-map-named config:name="Tables">
///     <config:config-item-map-entry config:name="Data">
///       <config:config-item config:name="VerticalSplitMode" config:type="short">2</config:config-item>
///       <config:config-item config:name="VerticalSplitPosition" config:type="int">1</config:config-item>
///     </config:config-item-map-entry>
///   </config:config-item-map-named>
/// </office:settings></office:document-settings>"#;
///
/// let mut diagnostics = Diagnostics::new();
/// let hints = prescan_settings(xml.as_bytes(), &mut diagnostics).unwrap();
/// assert!(hints.contains("Data"));
/// ```
pub fn prescan_settings<R: Read>(reader: R, diagnostics: &mut Diagnostics) -> Result<HashSet<String>> {
    let mut xml = Reader::from_reader(BufReader::with_capacity(PARSER_BUF_SIZE, reader));
    let config = xml.config_mut();
    config.expand_empty_elements = true;
    config.trim_text(false);

    let mut scan = Prescan {
        stack: StateStack::new(SettingsState::Default),
        guard: DataGuard::default(),
        stop: false,
        diagnostics,
        hints: HashSet::new(),
        entry: None,
        flags: 0,
        item: None,
        text: String::new(),
    };

    let mut buf = Vec::with_capacity(PARSER_BUF_SIZE);
    while !scan.stop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => scan.start_element(e),
            Ok(Event::Empty(ref e)) => {
                scan.start_element(e);
                scan.end_element();
            },
            Ok(Event::End(_)) => scan.end_element(),
            Ok(Event::Text(ref t)) => scan.characters(&String::from_utf8_lossy(t)),
            Ok(Event::CData(ref t)) => scan.characters(&String::from_utf8_lossy(t)),
            Ok(Event::GeneralRef(ref r)) => {
                let resolved = resolve_entity(r).map(String::from).unwrap_or_default();
                scan.characters(&resolved);
            },
            Ok(Event::Eof) => break,
            Ok(_) => {},
            Err(quick_xml::Error::Io(e)) => {
                return Err(Error::Io(std::io::Error::new(e.kind(), e.to_string())));
            },
            Err(e) => {
                let message = format!("XML error at position {}: {}", xml.error_position(), e);
                scan.corrupted(&message);
            },
        }
        buf.clear();
    }

    Ok(scan.hints)
}
