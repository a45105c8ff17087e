use crate::utils::encoding::decode_cvm_text;
use crate::utils::error::Result;
use roxmltree::{Document, Node};
use std::io::Write;
use std::path::Path;

/// Writes the element/attribute tree of `xml`, two spaces per level.
pub fn write_outline<W: Write>(xml: &str, label: &str, out: &mut W) -> Result<()> {
    let document = Document::parse(xml)?;

    writeln!(out, "XML structure of: {}", label)?;
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out)?;
    write_element(document.root_element(), 0, out)?;
    Ok(())
}

fn write_element<W: Write>(node: Node, depth: usize, out: &mut W) -> Result<()> {
    let indent = "  ".repeat(depth);
    writeln!(out, "{}Element: {}", indent, node.tag_name().name())?;

    if node.attributes().next().is_some() {
        writeln!(out, "{}  Attributes:", indent)?;
        for attribute in node.attributes() {
            writeln!(out, "{}    - {}", indent, attribute.name())?;
        }
    }

    for child in node.children().filter(|c| c.is_element()) {
        write_element(child, depth + 1, out)?;
    }
    Ok(())
}

/// Outlines a Windows-1252 XML file into `output`.
pub fn outline_file<W: Write>(xml_path: &Path, output: &mut W) -> Result<()> {
    let bytes = std::fs::read(xml_path)?;
    let text = decode_cvm_text(&bytes);
    write_outline(&text, &xml_path.display().to_string(), output)
}
