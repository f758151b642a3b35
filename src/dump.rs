//! Streaming `<page>` extraction from MediaWiki XML dumps.

use bzip2::read::BzDecoder;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

lazy_static! {
    pub static ref TITLE_PATTERN: Regex = Regex::new(r"<title>([^<]+)</title>").unwrap();
    pub static ref NS_PATTERN: Regex = Regex::new(r"<ns>(-?\d+)</ns>").unwrap();
    pub static ref TEXT_PATTERN: Regex = Regex::new(r"(?s)<text[^>]*>(.*?)</text>").unwrap();
    pub static ref REDIRECT_PATTERN: Regex = Regex::new(r#"<redirect\s+title="[^"]+""#).unwrap();
}

const READ_CHUNK: usize = 1024 * 1024;
const IO_BUFFER: usize = 256 * 1024;

/// One `<page>` element, numbered in dump order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub seq: usize,
    pub title: String,
    pub namespace: Option<i32>,
    pub redirect: bool,
    /// Wikitext with XML entities decoded; `None` for `<text/>` or missing text
    pub text: Option<String>,
}

/// Open a dump, decompressing `.bz2` files on the fly.
pub fn open_input(path: &Path) -> std::io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead + Send> = if path.to_string_lossy().ends_with(".bz2") {
        Box::new(BufReader::with_capacity(IO_BUFFER, BzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(IO_BUFFER, file))
    };
    Ok(reader)
}

/// Call `callback` with the XML of every complete `<page>` element until it
/// returns false or the input ends.
pub fn scan_pages(
    mut reader: impl BufRead,
    mut callback: impl FnMut(String) -> bool,
) -> std::io::Result<()> {
    let mut buffer = String::new();
    let mut carry: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let bytes_read = reader.read(&mut chunk)?;
        if bytes_read == 0 {
            break;
        }
        carry.extend_from_slice(&chunk[..bytes_read]);
        decode_available(&mut carry, &mut buffer);

        // Extract complete pages
        while let Some(start) = buffer.find("<page>") {
            if let Some(end_offset) = buffer[start..].find("</page>") {
                let end = start + end_offset + "</page>".len();
                let page_xml = buffer[start..end].to_string();
                buffer.drain(..end);

                if !callback(page_xml) {
                    return Ok(());
                }
            } else {
                buffer.drain(..start);
                break;
            }
        }

        // Keep a tail in case "<page>" straddles two chunks
        if buffer.len() > 10 && !buffer.contains("<page>") {
            let mut cut = buffer.len() - 10;
            while !buffer.is_char_boundary(cut) {
                cut -= 1;
            }
            buffer.drain(..cut);
        }
    }

    Ok(())
}

/// Move the decodable prefix of `carry` into `buffer`. An incomplete UTF-8
/// sequence at the end stays in `carry` for the next read; invalid bytes are
/// replaced.
fn decode_available(carry: &mut Vec<u8>, buffer: &mut String) {
    match std::str::from_utf8(carry) {
        Ok(s) => {
            buffer.push_str(s);
            carry.clear();
        }
        Err(e) => {
            let valid = e.valid_up_to();
            let consumed = match e.error_len() {
                // Truncated sequence at the end of the chunk
                None => valid,
                Some(_) => carry.len(),
            };
            buffer.push_str(&String::from_utf8_lossy(&carry[..consumed]));
            carry.drain(..consumed);
        }
    }
}

/// Pull the fields this crate needs out of one `<page>` element. Returns
/// `None` when the page has no title.
pub fn parse_page_xml(page_xml: &str, seq: usize) -> Option<RawPage> {
    let title = TITLE_PATTERN
        .captures(page_xml)
        .map(|cap| decode_xml_entities(&cap[1]))?;
    let namespace = NS_PATTERN
        .captures(page_xml)
        .and_then(|cap| cap[1].parse().ok());
    let redirect = REDIRECT_PATTERN.is_match(page_xml);
    let text = TEXT_PATTERN
        .captures(page_xml)
        .map(|cap| decode_xml_entities(&cap[1]));

    Some(RawPage {
        seq,
        title,
        namespace,
        redirect,
        text,
    })
}

/// Decode the five predefined XML entities and numeric character references.
pub fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};

    const DUMP: &str = r#"<mediawiki>
  <siteinfo><sitename>Wiktionary</sitename></siteinfo>
  <page>
    <title>Thesaurus:house</title>
    <ns>110</ns>
    <id>1</id>
    <revision><text bytes="40" xml:space="preserve">==English==
* {{ws|en|home}} &amp; &lt;b&gt;</text></revision>
  </page>
  <page>
    <title>Thesaurus:home</title>
    <ns>110</ns>
    <redirect title="Thesaurus:house" />
    <revision><text xml:space="preserve">#REDIRECT [[Thesaurus:house]]</text></revision>
  </page>
  <page>
    <title>empty</title>
    <ns>0</ns>
    <revision><text bytes="0" /></revision>
  </page>
</mediawiki>
"#;

    fn pages(input: &str) -> Vec<RawPage> {
        let mut seq = 0;
        let mut out = Vec::new();
        scan_pages(Cursor::new(input.as_bytes()), |xml| {
            out.extend(parse_page_xml(&xml, seq));
            seq += 1;
            true
        })
        .unwrap();
        out
    }

    #[test]
    fn scans_every_page_in_order() {
        let found = pages(DUMP);
        let titles: Vec<&str> = found.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Thesaurus:house", "Thesaurus:home", "empty"]);
        assert_eq!(found[2].seq, 2);
    }

    #[test]
    fn extracts_fields_and_decodes_entities() {
        let found = pages(DUMP);
        assert_eq!(found[0].namespace, Some(110));
        assert!(!found[0].redirect);
        assert_eq!(
            found[0].text.as_deref(),
            Some("==English==\n* {{ws|en|home}} & <b>")
        );
        assert!(found[1].redirect);
        assert_eq!(found[2].text, None);
    }

    #[test]
    fn callback_can_stop_early() {
        let mut count = 0;
        scan_pages(Cursor::new(DUMP.as_bytes()), |_| {
            count += 1;
            false
        })
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn split_multibyte_sequence_is_carried_over() {
        let bytes = "дом".as_bytes();
        let mut carry = bytes[..3].to_vec();
        let mut buffer = String::new();
        decode_available(&mut carry, &mut buffer);
        assert_eq!(buffer, "д");
        assert_eq!(carry, bytes[2..3].to_vec());
        carry.extend_from_slice(&bytes[3..]);
        decode_available(&mut carry, &mut buffer);
        assert_eq!(buffer, "дом");
        assert!(carry.is_empty());
    }

    #[test]
    fn numeric_and_unknown_entities() {
        assert_eq!(decode_xml_entities("&#8658; &#x21D2;"), "⇒ ⇒");
        assert_eq!(decode_xml_entities("a &amp;lt; b"), "a &lt; b");
        assert_eq!(decode_xml_entities("AT&T &nbsp;"), "AT&T &nbsp;");
    }

    #[test]
    fn opens_plain_and_bzip2_dumps() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("dump.xml");
        std::fs::write(&plain, DUMP).unwrap();

        let compressed = dir.path().join("dump.xml.bz2");
        let mut encoder = bzip2::write::BzEncoder::new(
            std::fs::File::create(&compressed).unwrap(),
            bzip2::Compression::default(),
        );
        encoder.write_all(DUMP.as_bytes()).unwrap();
        encoder.finish().unwrap();

        for path in [plain, compressed] {
            let mut titles = Vec::new();
            scan_pages(open_input(&path).unwrap(), |xml| {
                titles.extend(parse_page_xml(&xml, 0).map(|p| p.title));
                true
            })
            .unwrap();
            assert_eq!(titles.len(), 3);
        }
    }
}
