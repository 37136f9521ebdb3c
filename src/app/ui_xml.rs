use regex::Regex;

use crate::app::models::{ElementRect, UiElement};

/// Emitted by uiautomator while the accessibility service is not ready yet.
pub const NULL_ROOT_NODE_MARKER: &str = "null root node returned by UiTestAutomationBridge";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        find_attr(&self.attrs, name)
    }

    fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|value| !value.is_empty())
    }
}

fn find_attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(attr_name, _)| attr_name == name)
        .map(|(_, value)| value.as_str())
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut decoded = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            decoded.push_str(tail);
            return decoded;
        };
        let entity = &tail[1..semi];
        let replacement = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse::<u32>().ok()))
                .and_then(char::from_u32),
        };
        match replacement {
            Some(ch) => {
                decoded.push(ch);
                rest = &tail[semi + 1..];
            }
            None => {
                decoded.push('&');
                rest = &tail[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

/// Drops anything adb printed ahead of the XML prolog.
pub fn strip_to_xml_prolog(dump: &str) -> &str {
    match dump.find("<?xml") {
        Some(index) => &dump[index..],
        None => dump,
    }
}

fn attach(stack: &mut [UiNode], roots: &mut Vec<UiNode>, node: UiNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Builds the element tree of a uiautomator dump. Text content, comments and the
/// prolog are skipped; unclosed elements are closed at end of input.
pub fn parse_hierarchy(xml: &str) -> Result<UiNode, String> {
    let bytes = xml.as_bytes();
    let mut index: usize = 0;
    let mut stack: Vec<UiNode> = Vec::new();
    let mut roots: Vec<UiNode> = Vec::new();

    while index < bytes.len() {
        if bytes[index] != b'<' {
            index += 1;
            continue;
        }
        if index + 1 >= bytes.len() {
            break;
        }
        match bytes[index + 1] {
            b'/' => {
                index += 2;
                while index < bytes.len() && bytes[index] != b'>' {
                    index += 1;
                }
                if index < bytes.len() {
                    index += 1;
                }
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut roots, node);
                }
            }
            b'!' => {
                index += 2;
                while index + 2 < bytes.len()
                    && !(bytes[index] == b'-' && bytes[index + 1] == b'-' && bytes[index + 2] == b'>')
                {
                    index += 1;
                }
                index = (index + 3).min(bytes.len());
            }
            b'?' => {
                index += 2;
                while index + 1 < bytes.len() && !(bytes[index] == b'?' && bytes[index + 1] == b'>') {
                    index += 1;
                }
                index = (index + 2).min(bytes.len());
            }
            _ => {
                let start = index + 1;
                let mut cursor = start;
                while cursor < bytes.len() {
                    let ch = bytes[cursor];
                    if ch == b'/' || ch == b'>' || ch.is_ascii_whitespace() {
                        break;
                    }
                    cursor += 1;
                }
                let tag = xml[start..cursor].to_string();
                if tag.is_empty() {
                    return Err("Malformed XML tag".into());
                }

                let mut attrs: Vec<(String, String)> = Vec::new();
                let mut self_closing = false;
                while cursor < bytes.len() {
                    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                        cursor += 1;
                    }
                    if cursor >= bytes.len() {
                        break;
                    }
                    let ch = bytes[cursor];
                    if ch == b'>' {
                        cursor += 1;
                        break;
                    }
                    if ch == b'/' {
                        self_closing = true;
                        cursor += 1;
                        if cursor < bytes.len() && bytes[cursor] == b'>' {
                            cursor += 1;
                        }
                        break;
                    }

                    let name_start = cursor;
                    while cursor < bytes.len()
                        && bytes[cursor] != b'='
                        && !bytes[cursor].is_ascii_whitespace()
                    {
                        cursor += 1;
                    }
                    if cursor >= bytes.len() {
                        return Err("Malformed attribute".into());
                    }
                    let name_end = cursor;
                    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                        cursor += 1;
                    }
                    if cursor >= bytes.len() || bytes[cursor] != b'=' {
                        return Err("Malformed attribute assignment".into());
                    }
                    cursor += 1;
                    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                        cursor += 1;
                    }
                    if cursor >= bytes.len() {
                        return Err("Missing attribute value".into());
                    }
                    let quote = bytes[cursor];
                    if quote != b'"' && quote != b'\'' {
                        return Err("Attribute value must be quoted".into());
                    }
                    cursor += 1;
                    let value_start = cursor;
                    while cursor < bytes.len() && bytes[cursor] != quote {
                        cursor += 1;
                    }
                    if cursor >= bytes.len() {
                        return Err("Unterminated attribute value".into());
                    }
                    let value_end = cursor;
                    cursor += 1;
                    attrs.push((
                        xml[name_start..name_end].to_string(),
                        decode_entities(&xml[value_start..value_end]),
                    ));
                }
                index = cursor;

                let node = UiNode {
                    tag,
                    attrs,
                    children: Vec::new(),
                };
                if self_closing {
                    attach(&mut stack, &mut roots, node);
                } else {
                    stack.push(node);
                }
            }
        }
    }

    while let Some(node) = stack.pop() {
        attach(&mut stack, &mut roots, node);
    }

    roots
        .into_iter()
        .next()
        .ok_or_else(|| "UI dump contains no XML elements".to_string())
}

/// Parses `[left,top][right,bottom]`.
pub fn parse_bounds(bounds: &str) -> Option<ElementRect> {
    let bounds_re = Regex::new(r"^\[(\d+),(\d+)\]\[(\d+),(\d+)\]$").ok()?;
    let caps = bounds_re.captures(bounds.trim())?;
    let left = caps[1].parse::<i32>().ok()?;
    let top = caps[2].parse::<i32>().ok()?;
    let right = caps[3].parse::<i32>().ok()?;
    let bottom = caps[4].parse::<i32>().ok()?;
    Some(ElementRect {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    })
}

fn node_element(node: &UiNode) -> Option<UiElement> {
    let text = node.non_empty_attr("text");
    let content_desc = node.non_empty_attr("content-desc");
    let hint = node.non_empty_attr("hint");
    if text.is_none() && content_desc.is_none() && hint.is_none() {
        return None;
    }

    let rect = node.attr("bounds").and_then(parse_bounds)?;
    if rect.width <= 0 || rect.height <= 0 {
        return None;
    }

    Some(UiElement {
        element_type: node.non_empty_attr("class").unwrap_or("text").to_string(),
        text: text.map(str::to_string),
        label: content_desc.or(hint).unwrap_or_default().to_string(),
        rect,
        focused: (node.attr("focused") == Some("true")).then_some(true),
        identifier: node.non_empty_attr("resource-id").map(str::to_string),
    })
}

fn collect_into(node: &UiNode, elements: &mut Vec<UiElement>) {
    for child in node.children.iter().filter(|child| child.tag == "node") {
        collect_into(child, elements);
    }
    if let Some(element) = node_element(node) {
        elements.push(element);
    }
}

/// Depth-first; a node's descendants are emitted before the node itself.
pub fn collect_elements(root: &UiNode) -> Vec<UiElement> {
    let mut elements = Vec::new();
    collect_into(root, &mut elements);
    elements
}
