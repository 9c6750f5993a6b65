// src/repository/xmlrpc.rs

//! XML-RPC encoding and decoding
//!
//! Upstream indexes expose their metadata API over XML-RPC. This module
//! encodes `methodCall` documents and decodes `methodResponse` documents into
//! [`Value`] trees. Decoding first builds a small element tree with
//! `quick-xml`, then interprets it; faults and malformed documents become
//! [`Error::RemoteProtocolError`].

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::BTreeMap;

/// An XML-RPC value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    String(String),
    Double(f64),
    /// `dateTime.iso8601`, kept verbatim (upstream uses `YYYYMMDDTHH:MM:SS`)
    DateTime(String),
    Base64(Vec<u8>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::DateTime(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Loose boolean reading: upstream flags arrive as booleans, ints or strings
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Double(f) => *f != 0.0,
            Value::String(s) => matches!(s.trim(), "1" | "true" | "True" | "TRUE"),
            Value::Array(items) => !items.is_empty(),
            Value::Struct(members) => !members.is_empty(),
            Value::DateTime(_) | Value::Base64(_) => true,
            Value::Nil => false,
        }
    }

    /// Flatten into the string values stored in a metadata map
    ///
    /// Arrays contribute one entry per element, `nil` contributes nothing.
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            Value::Nil => Vec::new(),
            Value::Array(items) => items.iter().flat_map(Value::to_strings).collect(),
            Value::Struct(members) => members
                .iter()
                .flat_map(|(key, value)| {
                    value
                        .to_strings()
                        .into_iter()
                        .map(move |v| format!("{key}={v}"))
                })
                .collect(),
            other => vec![other.scalar_string()],
        }
    }

    fn scalar_string(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::String(s) | Value::DateTime(s) => s.clone(),
            Value::Double(f) => f.to_string(),
            Value::Base64(bytes) => BASE64.encode(bytes),
            Value::Array(_) | Value::Struct(_) | Value::Nil => String::new(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a `methodCall` document
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    xml.push_str(&quick_xml::escape::escape(method));
    xml.push_str("</methodName><params>");
    for param in params {
        xml.push_str("<param>");
        write_value(&mut xml, param);
        xml.push_str("</param>");
    }
    xml.push_str("</params></methodCall>");
    xml
}

fn write_value(xml: &mut String, value: &Value) {
    xml.push_str("<value>");
    match value {
        Value::Int(n) => xml.push_str(&format!("<int>{n}</int>")),
        Value::Bool(b) => xml.push_str(&format!("<boolean>{}</boolean>", u8::from(*b))),
        Value::String(s) => xml.push_str(&format!(
            "<string>{}</string>",
            quick_xml::escape::escape(s.as_str())
        )),
        Value::Double(f) => xml.push_str(&format!("<double>{f}</double>")),
        Value::DateTime(s) => xml.push_str(&format!(
            "<dateTime.iso8601>{}</dateTime.iso8601>",
            quick_xml::escape::escape(s.as_str())
        )),
        Value::Base64(bytes) => {
            xml.push_str(&format!("<base64>{}</base64>", BASE64.encode(bytes)))
        }
        Value::Array(items) => {
            xml.push_str("<array><data>");
            for item in items {
                write_value(xml, item);
            }
            xml.push_str("</data></array>");
        }
        Value::Struct(members) => {
            xml.push_str("<struct>");
            for (name, member) in members {
                xml.push_str(&format!(
                    "<member><name>{}</name>",
                    quick_xml::escape::escape(name.as_str())
                ));
                write_value(xml, member);
                xml.push_str("</member>");
            }
            xml.push_str("</struct>");
        }
        Value::Nil => xml.push_str("<nil/>"),
    }
    xml.push_str("</value>");
}

// =============================================================================
// Decoding
// =============================================================================

/// Element of a parsed XML document
#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Self::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn require(&self, name: &str) -> Result<&Node> {
        self.child(name).ok_or_else(|| {
            protocol(format!("<{}> element is missing <{}>", self.name, name))
        })
    }
}

fn protocol(msg: impl Into<String>) -> Error {
    Error::RemoteProtocolError(msg.into())
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(protocol("document has more than one root element")),
    }
    Ok(())
}

fn parse_tree(xml: &str) -> Result<Node> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(Node::named(e.local_name().as_ref())),
            Ok(Event::Empty(e)) => {
                attach(&mut stack, &mut root, Node::named(e.local_name().as_ref()))?
            }
            Ok(Event::Text(t)) => {
                if let Some(node) = stack.last_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| protocol(format!("invalid text content: {e}")))?;
                    node.text.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| protocol("unbalanced closing tag"))?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(protocol(format!(
                    "malformed XML at position {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if !stack.is_empty() {
        return Err(protocol("document ended inside an open element"));
    }
    root.ok_or_else(|| protocol("empty response document"))
}

fn decode_value(node: &Node) -> Result<Value> {
    // An untyped <value> is a string
    let Some(typed) = node.children.first() else {
        return Ok(Value::String(node.text.clone()));
    };

    match typed.name.as_str() {
        "string" => Ok(Value::String(typed.text.clone())),
        "int" | "i4" | "i8" => typed
            .text
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|_| protocol(format!("invalid integer '{}'", typed.text))),
        "boolean" => match typed.text.trim() {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            other => Err(protocol(format!("invalid boolean '{other}'"))),
        },
        "double" => typed
            .text
            .trim()
            .parse()
            .map(Value::Double)
            .map_err(|_| protocol(format!("invalid double '{}'", typed.text))),
        "dateTime.iso8601" => Ok(Value::DateTime(typed.text.trim().to_string())),
        "base64" => {
            let compact: String = typed.text.split_whitespace().collect();
            BASE64
                .decode(compact)
                .map(Value::Base64)
                .map_err(|e| protocol(format!("invalid base64 value: {e}")))
        }
        "nil" => Ok(Value::Nil),
        "array" => {
            let data = typed.require("data")?;
            data.children
                .iter()
                .filter(|c| c.name == "value")
                .map(decode_value)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member.require("name")?.text.clone();
                let value = decode_value(member.require("value")?)?;
                members.insert(name, value);
            }
            Ok(Value::Struct(members))
        }
        other => Err(protocol(format!("unsupported value type <{other}>"))),
    }
}

/// Decode a `methodResponse` document
///
/// Returns the single result value, or a protocol error for faults.
pub fn decode_response(xml: &str) -> Result<Value> {
    let root = parse_tree(xml)?;
    if root.name != "methodResponse" {
        return Err(protocol(format!(
            "expected <methodResponse>, got <{}>",
            root.name
        )));
    }

    if let Some(fault) = root.child("fault") {
        let value = decode_value(fault.require("value")?)?;
        let members = value.as_struct();
        let code = members
            .and_then(|m| m.get("faultCode"))
            .and_then(Value::as_i64)
            .unwrap_or_default();
        let message = members
            .and_then(|m| m.get("faultString"))
            .and_then(Value::as_str)
            .unwrap_or("unknown fault");
        return Err(protocol(format!("fault {code}: {message}")));
    }

    let param = root.require("params")?.require("param")?;
    decode_value(param.require("value")?)
}
