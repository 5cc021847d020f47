//! Fixture parser for well-formed markup.
//!
//! This is not an HTML parser: it accepts XML-shaped markup (self-closing void
//! elements, balanced tags) and is lenient about attribute names, so directive
//! attributes such as `*if`, `:class` or `@click.prevent` come through as-is.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::{Document, DomError, NodeId};

impl Document {
    /// Parse markup into a new detached fragment and return the fragment.
    ///
    /// Mismatched closing tags close the nearest open element with that name,
    /// unmatched ones are ignored.
    pub fn parse_fragment(&mut self, markup: &str) -> Result<NodeId, DomError> {
        let fragment = self.create_fragment();
        let mut reader = Reader::from_str(markup);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = false;
        self.parse_into(&mut reader, fragment)?;
        Ok(fragment)
    }

    /// Parse markup and append the resulting nodes to the document root.
    ///
    /// Returns the appended top-level nodes.
    pub fn append_markup(&mut self, markup: &str) -> Result<Vec<NodeId>, DomError> {
        let fragment = self.parse_fragment(markup)?;
        let nodes = self.children(fragment).to_vec();
        let root = self.root();
        for &node in &nodes {
            self.append_child(root, node)?;
        }
        Ok(nodes)
    }

    fn parse_into<R: BufRead>(
        &mut self,
        reader: &mut Reader<R>,
        fragment: NodeId,
    ) -> Result<(), DomError> {
        let mut buf = Vec::new();
        // Open elements with their tag names, innermost last
        let mut stack: Vec<(NodeId, String)> = vec![(fragment, String::new())];

        loop {
            let current = stack.last().map_or(fragment, |(node, _)| *node);
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let element = self.element_from(reader, &e)?;
                    self.append_child(current, element)?;
                    let tag = decode_name(reader, e.name().as_ref());
                    stack.push((element, tag));
                }
                Event::Empty(e) => {
                    let element = self.element_from(reader, &e)?;
                    self.append_child(current, element)?;
                }
                Event::Text(e) => {
                    let text = reader.decoder().decode(&e)?.into_owned();
                    self.append_text(current, &text)?;
                }
                Event::GeneralRef(e) => {
                    let entity = reader.decoder().decode(&e)?.into_owned();
                    self.append_text(current, &decode_entity(&entity))?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    self.append_text(current, &text)?;
                }
                Event::Comment(e) => {
                    let text = reader.decoder().decode(&e)?.into_owned();
                    let comment = self.create_comment(text);
                    self.append_child(current, comment)?;
                }
                Event::End(e) => {
                    let tag = decode_name(reader, e.name().as_ref());
                    if let Some(index) = stack.iter().rposition(|(_, open)| *open == tag) {
                        if index > 0 {
                            stack.truncate(index);
                        }
                    }
                }
                Event::Eof => return Ok(()),
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
            buf.clear();
        }
    }

    fn element_from<R: BufRead>(
        &mut self,
        reader: &Reader<R>,
        e: &BytesStart<'_>,
    ) -> Result<NodeId, DomError> {
        let element = self.create_element(decode_name(reader, e.name().as_ref()));
        for attr in e.html_attributes() {
            let attr = attr?;
            let name = decode_name(reader, attr.key.as_ref());
            let value = attr.unescape_value().map_or_else(
                |_| String::from_utf8_lossy(&attr.value).into_owned(),
                std::borrow::Cow::into_owned,
            );
            self.set_attribute(element, &name, value)?;
        }
        Ok(element)
    }

    /// Append text, merging with a preceding text node.
    fn append_text(&mut self, parent: NodeId, text: &str) -> Result<(), DomError> {
        if let Some(&last) = self.children(parent).last()
            && let Some(existing) = self.text(last)
            && !self.is_comment(last)
        {
            let merged = format!("{existing}{text}");
            self.set_text(last, merged);
            return Ok(());
        }
        let node = self.create_text(text);
        self.append_child(parent, node)
    }
}

fn decode_name<R: BufRead>(reader: &Reader<R>, name: &[u8]) -> String {
    reader.decoder().decode(name).map_or_else(
        |_| String::from_utf8_lossy(name).into_owned(),
        std::borrow::Cow::into_owned,
    )
}

/// Decode an entity reference to its character value.
fn decode_entity(entity: &str) -> String {
    let named = match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    };
    let numeric = || {
        let digits = entity.strip_prefix('#')?;
        let code = match digits.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => digits.parse().ok()?,
        };
        char::from_u32(code)
    };
    // Unknown references are kept verbatim
    named
        .or_else(numeric)
        .map_or_else(|| format!("&{entity};"), String::from)
}
