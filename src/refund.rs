//! Parsing of the merchant API refund reply.
//!
//! The reply is checked for well-formedness first, gathering every problem
//! found instead of stopping at the first, and only then deserialized.

use crate::errors::{GatewayError, Result};
use crate::types::RefundResult;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct RefundEnvelope {
    #[serde(rename = "Message")]
    message: RefundMessage,
}

#[derive(Deserialize, Debug)]
struct RefundMessage {
    #[serde(rename = "RefundResponse")]
    refund_response: RefundResponse,
}

#[derive(Deserialize, Debug)]
struct RefundResponse {
    #[serde(rename = "Result")]
    result: String,
}

/// Extracts `Message/RefundResponse/Result` from a refund reply.
///
/// # Examples
///
/// ```
/// use bog_payment::refund::parse_refund_response;
///
/// let xml = "<AS><Message><RefundResponse><Result>1</Result></RefundResponse></Message></AS>";
/// assert_eq!(parse_refund_response(xml).unwrap().code, "1");
///
/// assert!(parse_refund_response("<AS><Message>").is_err());
/// ```
pub fn parse_refund_response(xml: &str) -> Result<RefundResult> {
    check_well_formed(xml)?;

    let envelope: RefundEnvelope = quick_xml::de::from_str(xml)
        .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;

    Ok(RefundResult {
        code: envelope.message.refund_response.result.trim().to_string(),
    })
}

/// Checks that `xml` is a well-formed document.
///
/// Scanning continues past recoverable problems such as mismatched end tags
/// or bad entities; a syntax error ends the scan. All diagnostics are
/// returned together in `MalformedResponse`.
pub fn check_well_formed(xml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    // end tags are matched below so a mismatch does not abort the scan
    reader.check_end_names(false);

    let mut diagnostics = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut roots = 0usize;

    loop {
        let position = reader.buffer_position();

        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if open.is_empty() {
                    roots += 1;
                }
                check_start_tag(&e, position, &mut diagnostics);
                open.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Empty(e)) => {
                if open.is_empty() {
                    roots += 1;
                }
                check_start_tag(&e, position, &mut diagnostics);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match open.pop() {
                    Some(expected) if expected == name => {}
                    Some(expected) => diagnostics.push(format!(
                        "Opening and ending tag mismatch: {} and {} at position {}",
                        expected, name, position
                    )),
                    None => diagnostics.push(format!(
                        "Unexpected end tag: {} at position {}",
                        name, position
                    )),
                }
            }
            Ok(Event::Text(t)) => {
                if open.is_empty() {
                    if !t.iter().all(u8::is_ascii_whitespace) {
                        diagnostics.push(format!(
                            "Content outside of the root element at position {}",
                            position
                        ));
                    }
                } else if let Err(err) = t.unescape() {
                    diagnostics.push(format!("{} at position {}", err, position));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                diagnostics.push(format!("{} at position {}", err, reader.buffer_position()));
                break;
            }
        }
    }

    // nameless tags were already reported as invalid names
    for name in open.iter().rev().filter(|name| !name.is_empty()) {
        diagnostics.push(format!("Premature end of data in tag {}", name));
    }

    if roots == 0 && diagnostics.is_empty() {
        diagnostics.push("Document is empty".to_string());
    }
    if roots > 1 {
        diagnostics.push("Extra content at the end of the document".to_string());
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(GatewayError::MalformedResponse(diagnostics))
    }
}

/// Checks the element name and every attribute of a start or empty tag.
fn check_start_tag(tag: &BytesStart<'_>, position: usize, diagnostics: &mut Vec<String>) {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    if !is_valid_name(&name) {
        diagnostics.push(format!(
            "StartTag: invalid element name {} at position {}",
            name, position
        ));
    }

    for attr in tag.attributes() {
        match attr {
            // attribute errors already carry their position
            Err(err) => diagnostics.push(err.to_string()),
            Ok(attr) => {
                if let Err(err) = attr.unescape_value() {
                    diagnostics.push(format!(
                        "{} in attribute {} at position {}",
                        err,
                        String::from_utf8_lossy(attr.key.as_ref()),
                        position
                    ));
                }
            }
        }
    }
}

/// XML 1.0 `Name` production.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}
