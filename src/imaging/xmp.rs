//! XMP packet codec.
//!
//! Reads the flat subset of RDF/XML that photo tools actually emit:
//!
//! - properties as attributes of `rdf:Description` (`xmp:Rating="3"`)
//! - simple property elements (`<xmp:Rating>3</xmp:Rating>`)
//! - `rdf:Bag` / `rdf:Seq` arrays, read as lists
//! - `rdf:Alt` language alternatives, read as their first item
//!
//! Structured properties (nested resources) are not exposed and do not
//! survive a rewrite. Keys are `Xmp.<prefix>.<name>` with the conventional
//! prefix for well-known namespace URIs, whatever prefix the document used.

use super::segments::XMP_HEADER;
use crate::metadata::{MetadataError, TagValue};
use std::collections::BTreeMap;

const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const XML_NS_PREFIXES: &[&str] = &["xmlns", "xml"];

/// Conventional prefixes for the namespaces photo tools write.
const KNOWN_NAMESPACES: &[(&str, &str)] = &[
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("xmp", "http://ns.adobe.com/xap/1.0/"),
    ("xmpMM", "http://ns.adobe.com/xap/1.0/mm/"),
    ("photoshop", "http://ns.adobe.com/photoshop/1.0/"),
    ("exif", "http://ns.adobe.com/exif/1.0/"),
    ("tiff", "http://ns.adobe.com/tiff/1.0/"),
    ("lr", "http://ns.adobe.com/lightroom/1.0/"),
    ("MicrosoftPhoto", "http://ns.microsoft.com/photo/1.0/"),
    ("digiKam", "http://www.digikam.org/ns/1.0/"),
    ("fotos", "http://ns.fotos.app/1.0/"),
];

/// Properties that are language alternatives when written as text.
const LANG_ALT_KEYS: &[&str] = &["Xmp.dc.description", "Xmp.dc.title", "Xmp.dc.rights"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Simple,
    Bag,
    Seq,
    Alt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Property {
    value: TagValue,
    container: Container,
}

/// Decoded XMP properties plus the namespaces needed to write them back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct XmpPacket {
    properties: BTreeMap<String, Property>,
    /// Canonical prefix → namespace URI, for namespaces outside the known table.
    namespaces: BTreeMap<String, String>,
}

impl XmpPacket {
    /// Decode an APP1 XMP payload (header included).
    ///
    /// Malformed packets decode to whatever was readable before the damage.
    pub fn parse(payload: &[u8]) -> Self {
        let Some(body) = payload.strip_prefix(XMP_HEADER) else {
            return Self::default();
        };
        let text = String::from_utf8_lossy(body);
        Self::from_xml(text.trim_start_matches('\u{FEFF}'))
    }

    fn from_xml(xml: &str) -> Self {
        let root = build_tree(tokenize(xml));
        let mut scopes = BTreeMap::new();
        collect_namespaces(&root, &mut scopes);

        let mut packet = Self::default();
        let mut descriptions = Vec::new();
        find_descriptions(&root, &scopes, &mut descriptions);
        for description in descriptions {
            packet.read_description(description, &scopes);
        }
        packet
    }

    fn read_description(&mut self, description: &Element, scopes: &BTreeMap<String, String>) {
        for (name, value) in &description.attrs {
            let Some(key) = self.canonical_key(name, scopes) else {
                continue;
            };
            self.properties.insert(
                key,
                Property {
                    value: TagValue::Text(value.trim().to_string()),
                    container: Container::Simple,
                },
            );
        }

        for child in description.elements() {
            let Some(key) = self.canonical_key(&child.name, scopes) else {
                continue;
            };
            if let Some(property) = read_property(child, scopes) {
                self.properties.insert(key, property);
            }
        }
    }

    /// Map a document-qualified name to an `Xmp.<prefix>.<name>` key.
    /// Returns `None` for RDF and XML syntax names.
    fn canonical_key(&mut self, qname: &str, scopes: &BTreeMap<String, String>) -> Option<String> {
        let (prefix, local) = qname.split_once(':')?;
        if XML_NS_PREFIXES.contains(&prefix) {
            return None;
        }
        let uri = scopes.get(prefix)?;
        if uri == RDF_NS {
            return None;
        }
        let canonical = match KNOWN_NAMESPACES.iter().find(|(_, u)| u == uri) {
            Some((known, _)) => known.to_string(),
            None => {
                self.namespaces.insert(prefix.to_string(), uri.clone());
                prefix.to_string()
            }
        };
        Some(format!("Xmp.{canonical}.{local}"))
    }

    pub fn get(&self, key: &str) -> Option<TagValue> {
        self.properties.get(key).map(|p| p.value.clone())
    }

    pub fn set(&mut self, key: &str, value: TagValue) -> Result<(), MetadataError> {
        let (prefix, local) = split_key(key).ok_or_else(|| MetadataError::UnknownKey(key.into()))?;
        if local.contains(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
            || self.namespace_uri(prefix).is_none()
        {
            return Err(MetadataError::UnknownKey(key.to_string()));
        }

        let previous = self.properties.get(key).map(|p| p.container);
        let container = match (&value, previous) {
            (TagValue::List(_), Some(Container::Seq)) => Container::Seq,
            (TagValue::List(_), _) => Container::Bag,
            (TagValue::Text(_), Some(Container::Alt)) => Container::Alt,
            (TagValue::Text(_), _) if LANG_ALT_KEYS.contains(&key) => Container::Alt,
            (TagValue::Text(_), _) => Container::Simple,
        };
        self.properties
            .insert(key.to_string(), Property { value, container });
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.properties.remove(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        KNOWN_NAMESPACES
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, uri)| *uri)
            .or_else(|| self.namespaces.get(prefix).map(String::as_str))
    }

    /// Encode as an APP1 payload, or `None` when there is nothing to write.
    pub fn to_payload(&self) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }
        let mut payload = XMP_HEADER.to_vec();
        payload.extend_from_slice(self.to_xml().as_bytes());
        Some(payload)
    }

    fn to_xml(&self) -> String {
        let mut prefixes: Vec<&str> = self
            .properties
            .keys()
            .filter_map(|k| split_key(k).map(|(p, _)| p))
            .collect();
        prefixes.dedup();

        let mut xml = String::new();
        xml.push_str("<?xpacket begin=\"\u{FEFF}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
        xml.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
        xml.push_str(&format!(" <rdf:RDF xmlns:rdf=\"{RDF_NS}\">\n"));
        xml.push_str("  <rdf:Description rdf:about=\"\"");
        for prefix in prefixes {
            if let Some(uri) = self.namespace_uri(prefix) {
                xml.push_str(&format!("\n    xmlns:{prefix}=\"{}\"", escape(uri)));
            }
        }
        xml.push_str(">\n");

        for (key, property) in &self.properties {
            let Some((prefix, local)) = split_key(key) else {
                continue;
            };
            let name = format!("{prefix}:{local}");
            match (&property.value, property.container) {
                (TagValue::List(items), container) => {
                    let kind = if container == Container::Seq { "Seq" } else { "Bag" };
                    xml.push_str(&format!("   <{name}>\n    <rdf:{kind}>\n"));
                    for item in items {
                        xml.push_str(&format!("     <rdf:li>{}</rdf:li>\n", escape(item)));
                    }
                    xml.push_str(&format!("    </rdf:{kind}>\n   </{name}>\n"));
                }
                (TagValue::Text(text), Container::Alt) => {
                    xml.push_str(&format!(
                        "   <{name}>\n    <rdf:Alt>\n     <rdf:li xml:lang=\"x-default\">{}</rdf:li>\n    </rdf:Alt>\n   </{name}>\n",
                        escape(text)
                    ));
                }
                (TagValue::Text(text), _) => {
                    xml.push_str(&format!("   <{name}>{}</{name}>\n", escape(text)));
                }
            }
        }

        xml.push_str("  </rdf:Description>\n </rdf:RDF>\n</x:xmpmeta>\n");
        xml.push_str("<?xpacket end=\"w\"?>");
        xml
    }
}

fn split_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix("Xmp.")?;
    let (prefix, local) = rest.split_once('.')?;
    if prefix.is_empty() || local.is_empty() {
        return None;
    }
    Some((prefix, local))
}

fn read_property(element: &Element, scopes: &BTreeMap<String, String>) -> Option<Property> {
    if let Some(array) = element.elements().next() {
        let kind = match rdf_local_name(&array.name, scopes) {
            Some("Bag") => Container::Bag,
            Some("Seq") => Container::Seq,
            Some("Alt") => Container::Alt,
            _ => return None,
        };
        let items: Vec<String> = array
            .elements()
            .filter(|li| rdf_local_name(&li.name, scopes) == Some("li"))
            .map(|li| li.text().trim().to_string())
            .collect();
        let value = if kind == Container::Alt {
            TagValue::Text(items.into_iter().next().unwrap_or_default())
        } else {
            TagValue::List(items)
        };
        return Some(Property {
            value,
            container: kind,
        });
    }

    let resource = element
        .attrs
        .iter()
        .find(|(name, _)| rdf_local_name(name, scopes) == Some("resource"))
        .map(|(_, value)| value.clone());
    Some(Property {
        value: TagValue::Text(resource.unwrap_or_else(|| element.text().trim().to_string())),
        container: Container::Simple,
    })
}

fn rdf_local_name<'a>(qname: &'a str, scopes: &BTreeMap<String, String>) -> Option<&'a str> {
    let (prefix, local) = qname.split_once(':')?;
    (scopes.get(prefix).map(String::as_str) == Some(RDF_NS)).then_some(local)
}

fn collect_namespaces(element: &Element, scopes: &mut BTreeMap<String, String>) {
    for (name, value) in &element.attrs {
        if let Some(prefix) = name.strip_prefix("xmlns:") {
            scopes.entry(prefix.to_string()).or_insert_with(|| value.clone());
        }
    }
    for child in element.elements() {
        collect_namespaces(child, scopes);
    }
}

fn find_descriptions<'a>(
    element: &'a Element,
    scopes: &BTreeMap<String, String>,
    out: &mut Vec<&'a Element>,
) {
    for child in element.elements() {
        if rdf_local_name(&child.name, scopes) == Some("Description") {
            out.push(child);
        } else {
            find_descriptions(child, scopes, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Minimal XML tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        empty: bool,
    },
    End,
    Text(String),
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}

fn tokenize(xml: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = xml;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<?") {
            rest = after.find("?>").map_or("", |i| &after[i + 2..]);
        } else if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |i| &after[i + 3..]);
        } else if let Some(after) = rest.strip_prefix("<![CDATA[") {
            let end = after.find("]]>").unwrap_or(after.len());
            tokens.push(Token::Text(after[..end].to_string()));
            rest = after.get(end + 3..).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("<!") {
            rest = after.find('>').map_or("", |i| &after[i + 1..]);
        } else if let Some(after) = rest.strip_prefix("</") {
            tokens.push(Token::End);
            rest = after.find('>').map_or("", |i| &after[i + 1..]);
        } else if let Some(after) = rest.strip_prefix('<') {
            let Some(end) = tag_end(after) else {
                break;
            };
            let body = &after[..end];
            let (body, empty) = match body.strip_suffix('/') {
                Some(b) => (b, true),
                None => (body, false),
            };
            let (name, attrs) = parse_tag(body);
            tokens.push(Token::Start { name, attrs, empty });
            rest = &after[end + 1..];
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            let text = &rest[..end];
            if !text.trim().is_empty() {
                tokens.push(Token::Text(decode_entities(text)));
            }
            rest = &rest[end..];
        }
    }

    tokens
}

/// Index of the `>` closing a start tag, skipping quoted attribute values.
fn tag_end(s: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_tag(body: &str) -> (String, Vec<(String, String)>) {
    let body = body.trim();
    let name_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let name = body[..name_end].to_string();
    let mut attrs = Vec::new();
    let mut rest = body[name_end..].trim_start();

    while let Some(eq) = rest.find('=') {
        let attr_name = rest[..eq].trim().to_string();
        let after = rest[eq + 1..].trim_start();
        let Some(quote) = after.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            break;
        };
        let value_start = quote.len_utf8();
        let Some(value_len) = after[value_start..].find(quote) else {
            break;
        };
        let raw = &after[value_start..value_start + value_len];
        attrs.push((attr_name, decode_entities(raw)));
        rest = after[value_start + value_len + quote.len_utf8()..].trim_start();
    }

    (name, attrs)
}

fn build_tree(tokens: Vec<Token>) -> Element {
    let mut stack = vec![Element::default()];

    for token in tokens {
        match token {
            Token::Start { name, attrs, empty } => {
                let element = Element {
                    name,
                    attrs,
                    children: Vec::new(),
                };
                if empty {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Element(element));
                    }
                } else {
                    stack.push(element);
                }
            }
            Token::End => close_element(&mut stack),
            Token::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.children.push(Node::Text(text));
                }
            }
        }
    }

    // Close anything left open by a truncated packet
    while stack.len() > 1 {
        close_element(&mut stack);
    }
    stack.pop().unwrap_or_default()
}

fn close_element(stack: &mut Vec<Element>) {
    if stack.len() < 2 {
        return;
    }
    if let Some(done) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(Node::Element(done));
        }
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';').filter(|i| *i <= 10) else {
            out.push('&');
            rest = after;
            continue;
        };
        let entity = &after[..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
