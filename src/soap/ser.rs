use std::io::Cursor;

use crate::soap::config::XmlConfig;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::se::to_writer as quick_xml_to_writer;
use quick_xml::{Reader, SeError, Writer};
use serde::Serialize;

const XML_VERSION: &str = "1.0";

/// Serializes a value to an XML string with the given configuration.
///
/// The namespaces of the configuration are declared on the root element.
pub fn to_string<T>(config: &XmlConfig, value: &T) -> Result<String, SeError>
where
    T: Serialize,
{
    let mut xml_buf = String::new();
    quick_xml_to_writer(&mut xml_buf, value)?;

    let mut reader = Reader::from_reader(Cursor::new(xml_buf.as_bytes()));
    // Only pretty output may drop whitespace; caller text goes out unchanged otherwise
    reader.config_mut().trim_text(config.pretty);

    let mut output_buf = Vec::with_capacity(xml_buf.len());
    let mut writer = if config.pretty {
        Writer::new_with_indent(&mut output_buf, config.indent.0 as u8, config.indent.1)
    } else {
        Writer::new(&mut output_buf)
    };

    if config.xml_decl {
        let decl = BytesDecl::new(XML_VERSION, Some(&config.encoding), None);
        writer.write_event(Event::Decl(decl))?;
    }

    let mut buf = Vec::new();
    let mut is_root = true;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let start = declare_namespaces(config, e.into_owned(), &mut is_root);
                writer.write_event(Event::Start(start))?;
            }
            Ok(Event::Empty(e)) => {
                let start = declare_namespaces(config, e.into_owned(), &mut is_root);
                writer.write_event(Event::Empty(start))?;
            }
            Ok(Event::Eof) => break,
            Ok(event) => writer.write_event(event)?,
            Err(e) => return Err(SeError::Custom(e.to_string())),
        }
        buf.clear();
    }

    String::from_utf8(output_buf).map_err(|e| SeError::Custom(e.to_string()))
}

fn declare_namespaces(
    config: &XmlConfig,
    mut start: BytesStart<'static>,
    is_root: &mut bool,
) -> BytesStart<'static> {
    if *is_root {
        for (prefix, uri) in config.namespaces.iter() {
            let attr_name = if prefix.is_empty() {
                "xmlns".into()
            } else {
                format!("xmlns:{prefix}")
            };
            start.push_attribute((attr_name.as_bytes(), uri.as_bytes()));
        }
        *is_root = false;
    }
    start
}
