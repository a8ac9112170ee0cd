/*
 * config.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of hpack-engine, an HTTP/2 header compression engine.
 *
 * hpack-engine is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * hpack-engine is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with hpack-engine.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Engine configuration, stored as a small XML document:
//!
//! ```xml
//! <hpack>
//!   <header-table-size>4096</header-table-size>
//!   <max-frame-size>16384</max-frame-size>
//!   <true-binary-metadata>false</true-binary-metadata>
//!   <huffman>true</huffman>
//! </hpack>
//! ```
//!
//! All XML read/write uses the quick_xml reader/writer. Missing elements
//! keep their defaults; unknown elements are ignored.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use tracing::debug;

use crate::error::HpackError;
use crate::h2::{DEFAULT_MAX_FRAME_SIZE, MAX_MAX_FRAME_SIZE, MIN_MAX_FRAME_SIZE};
use crate::hpack::{Decoder, EncodeOptions, Encoder, INITIAL_TABLE_SIZE};

const ROOT: &[u8] = b"hpack";
const HEADER_TABLE_SIZE: &str = "header-table-size";
const MAX_FRAME_SIZE: &str = "max-frame-size";
const TRUE_BINARY_METADATA: &str = "true-binary-metadata";
const HUFFMAN: &str = "huffman";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpackConfig {
    /// SETTINGS_HEADER_TABLE_SIZE used in both directions.
    pub header_table_size: u32,
    /// SETTINGS_MAX_FRAME_SIZE used in both directions.
    pub max_frame_size: usize,
    /// Send `-bin` values as NUL-prefixed raw bytes instead of base64.
    pub use_true_binary_metadata: bool,
    pub huffman_values: bool,
}

impl Default for HpackConfig {
    fn default() -> Self {
        Self {
            header_table_size: INITIAL_TABLE_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            use_true_binary_metadata: false,
            huffman_values: true,
        }
    }
}

fn config_error(message: impl Into<String>) -> HpackError {
    HpackError::Config(message.into())
}

fn xml_err(e: impl std::fmt::Display) -> HpackError {
    config_error(e.to_string())
}

fn parse_bool(name: &str, text: &str) -> Result<bool, HpackError> {
    match text {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(config_error(format!("{}: expected boolean, got {:?}", name, text))),
    }
}

impl HpackConfig {
    pub fn validate(&self) -> Result<(), HpackError> {
        if !(MIN_MAX_FRAME_SIZE..=MAX_MAX_FRAME_SIZE).contains(&self.max_frame_size) {
            return Err(config_error(format!(
                "{} {} not in {}..={}",
                MAX_FRAME_SIZE, self.max_frame_size, MIN_MAX_FRAME_SIZE, MAX_MAX_FRAME_SIZE
            )));
        }
        Ok(())
    }

    /// Parse `<hpack>...</hpack>`.
    pub fn from_xml(content: &str) -> Result<Self, HpackError> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut config = Self::default();
        let mut in_root = false;
        let mut element_name = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Err(e) => return Err(config_error(format!("XML parse error: {}", e))),
                Ok(Event::Eof) => break,
                Ok(Event::Start(e)) => {
                    let name = e.name();
                    if name.as_ref() == ROOT {
                        in_root = true;
                    } else if in_root {
                        element_name = String::from_utf8_lossy(name.as_ref()).into_owned();
                    }
                }
                Ok(Event::Text(e)) => {
                    if !in_root || element_name.is_empty() {
                        continue;
                    }
                    let text = e.unescape().map_err(xml_err)?;
                    config.set(&element_name, text.trim())?;
                    element_name.clear();
                }
                Ok(Event::End(e)) => {
                    if e.name().as_ref() == ROOT {
                        in_root = false;
                    }
                    element_name.clear();
                }
                _ => {}
            }
            buf.clear();
        }
        config.validate()?;
        Ok(config)
    }

    fn set(&mut self, name: &str, text: &str) -> Result<(), HpackError> {
        let number = |text: &str| {
            text.parse::<u64>()
                .map_err(|e| config_error(format!("{}: {}", name, e)))
        };
        match name {
            HEADER_TABLE_SIZE => {
                self.header_table_size = u32::try_from(number(text)?)
                    .map_err(|_| config_error(format!("{} too large", HEADER_TABLE_SIZE)))?;
            }
            MAX_FRAME_SIZE => self.max_frame_size = number(text)? as usize,
            TRUE_BINARY_METADATA => self.use_true_binary_metadata = parse_bool(name, text)?,
            HUFFMAN => self.huffman_values = parse_bool(name, text)?,
            _ => debug!(element = name, "ignoring unknown hpack config element"),
        }
        Ok(())
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, HpackError> {
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(format!("{}: {}", path.display(), e)))?;
        Self::from_xml(&content)
    }

    /// Serialise as XML (UTF-8).
    pub fn to_xml(&self) -> Result<String, HpackError> {
        let mut out = Vec::new();
        let mut writer = Writer::new_with_indent(&mut out, b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("hpack")))
            .map_err(xml_err)?;
        let fields = [
            (HEADER_TABLE_SIZE, self.header_table_size.to_string()),
            (MAX_FRAME_SIZE, self.max_frame_size.to_string()),
            (TRUE_BINARY_METADATA, self.use_true_binary_metadata.to_string()),
            (HUFFMAN, self.huffman_values.to_string()),
        ];
        for (name, value) in &fields {
            writer
                .write_event(Event::Start(BytesStart::new(*name)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(value)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(*name)))
                .map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("hpack")))
            .map_err(xml_err)?;
        String::from_utf8(out).map_err(xml_err)
    }

    pub fn save(&self, path: &Path) -> Result<(), HpackError> {
        let xml = self.to_xml()?;
        fs::write(path, xml).map_err(|e| config_error(format!("{}: {}", path.display(), e)))
    }

    /// Encoder for a peer that advertised `header_table_size`.
    pub fn encoder(&self) -> Encoder {
        let mut encoder = Encoder::new();
        encoder.set_huffman(self.huffman_values);
        encoder.set_max_usable_size(self.header_table_size);
        encoder.set_max_table_size(self.header_table_size);
        encoder
    }

    pub fn decoder(&self) -> Decoder {
        Decoder::new(self.header_table_size)
    }

    pub fn encode_options(&self, stream_id: u32, is_eof: bool) -> EncodeOptions {
        EncodeOptions {
            stream_id,
            is_eof,
            max_frame_size: self.max_frame_size,
            use_true_binary_metadata: self.use_true_binary_metadata,
        }
    }
}
