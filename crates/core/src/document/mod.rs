//! In-memory users.cfg document.
//!
//! A [`Document`] is an owned, lossless XML tree: load it, mutate the text of
//! a few elements, and save it back without disturbing anything else.

pub mod node;
mod parser;

use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use crate::errors::DocumentError;

pub use node::{Element, Node};

/// A parsed XML document split around its root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl Document {
    /// Parse a document from a string.
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root = None;
        for node in parser::parse_nodes(input)? {
            match node {
                Node::Element(el) if root.is_none() => root = Some(el),
                other if root.is_none() => prolog.push(other),
                other => epilog.push(other),
            }
        }
        let root = root.ok_or(DocumentError::NoRootElement)?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// Parse a document from raw file bytes, which must be UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| DocumentError::Encoding(e.to_string()))?;
        Self::parse(text)
    }

    /// Read and parse the document at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading document");
        let bytes = std::fs::read(path)?;
        let doc = Self::from_bytes(&bytes)?;
        debug!(root = doc.root.name(), "document parsed successfully");
        Ok(doc)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Serialize the whole tree, including everything around the root.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            node.write_to(&mut out);
        }
        self.root.write_to(&mut out);
        for node in &self.epilog {
            node.write_to(&mut out);
        }
        out
    }

    /// Write the document to `path`, replacing any existing file atomically.
    ///
    /// The content goes to a temporary file in the same directory first and is
    /// renamed over `path`; an existing file's permissions are carried over.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DocumentError> {
        let path = path.as_ref();
        info!(path = %path.display(), "saving document");

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let xml = self.to_xml_string();

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(xml.as_bytes())?;
        tmp.as_file().sync_all()?;
        if let Ok(meta) = std::fs::metadata(path) {
            std::fs::set_permissions(tmp.path(), meta.permissions())?;
        }
        tmp.persist(path).map_err(|e| DocumentError::IoError(e.error))?;

        debug!(bytes = xml.len(), "document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS_CFG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<config>
  <list name="User">
    <listitem>
      <variable name="Domain">acme.test</variable>
      <variable name="Name">alice</variable>
      <variable name="Password">D3S:old</variable>
    </listitem>
  </list>
</config>
"#;

    #[test]
    fn test_parse_splits_prolog_and_epilog() {
        let doc = Document::parse(USERS_CFG).unwrap();
        assert_eq!(doc.root().name(), "config");
        assert_eq!(doc.prolog.len(), 2);
        assert_eq!(doc.epilog, vec![Node::Text("\n".into())]);
        assert_eq!(doc.to_xml_string(), USERS_CFG);
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        let err = Document::from_bytes(&[b'<', b'a', 0xff, b'/', b'>']).unwrap_err();
        assert!(matches!(err, DocumentError::Encoding(_)));
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.cfg");
        std::fs::write(&path, USERS_CFG).unwrap();

        let mut doc = Document::load(&path).unwrap();
        doc.root_mut()
            .find_mut(&|e| e.attribute("name") == Some("Password"))
            .unwrap()
            .set_text("D3S:new");
        doc.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, USERS_CFG.replace("D3S:old", "D3S:new"));
        // No temporary files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.cfg");
        std::fs::write(&path, USERS_CFG).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        Document::load(&path).unwrap().save(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Document::load("/nonexistent/users.cfg");
        assert!(matches!(result, Err(DocumentError::IoError(_))));
    }
}
