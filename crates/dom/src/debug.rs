use crate::{Document, NodeKind};
use core_types::DomId;
use std::fmt::Write;

/// Indented plain-text dump of a live subtree, for logs and demos.
pub fn dump(doc: &Document, root: DomId) -> String {
    let mut out = String::new();
    dump_node(doc, root, 0, &mut out);
    out
}

fn dump_node(doc: &Document, id: DomId, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let Ok(record) = doc.get(id) else {
        let _ = writeln!(out, "{indent}<missing #{id:?}>");
        return;
    };
    match &record.kind {
        NodeKind::Text(text) => {
            let _ = writeln!(out, "{indent}{text:?}");
        }
        NodeKind::Element {
            tag,
            attrs,
            styles,
            listeners,
            children,
            ..
        } => {
            let mut line = format!("{indent}<{tag}");
            for (name, value) in attrs {
                let _ = write!(line, " {name}={value:?}");
            }
            for (name, value) in styles {
                let _ = write!(line, " style:{name}={value:?}");
            }
            for name in listeners.keys() {
                let _ = write!(line, " on:{name}");
            }
            let _ = writeln!(out, "{line}>");
            for child in children {
                dump_node(doc, *child, depth + 1, out);
            }
        }
    }
}
