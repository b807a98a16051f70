use crate::expression::codec::{self, Decoded};
use crate::expression::hint::NoHint;
use crate::expression::simplify as simp;
use crate::expression::{text, type_checker};
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Read an encoded node or query from `path`
pub fn read(path: &Path) -> Result<Decoded> {
    if !path.exists() {
        bail!("Input file does not exist at {:?}", path);
    }
    let buf = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let tree =
        codec::decode_any(&buf).with_context(|| format!("Failed to decode {:?}", path))?;
    log::debug!("decoded {} bytes from {:?}", buf.len(), path);
    Ok(tree)
}

/// Encode `tree` and write it to `path`, replacing any existing file
pub fn write(path: &Path, tree: &Decoded) -> Result<()> {
    let buf = match tree {
        Decoded::Node(n) => codec::encode(n),
        Decoded::Query(q) => codec::encode_query(q),
    }
    .with_context(|| format!("Failed to encode tree for {:?}", path))?;
    std::fs::write(path, &buf).with_context(|| format!("Failed to write {:?}", path))?;
    log::debug!("wrote {} bytes to {:?}", buf.len(), path);
    Ok(())
}

/// Render `tree` as text, optionally with every literal redacted
pub fn render(tree: &Decoded, redact: bool) -> String {
    match (tree, redact) {
        (Decoded::Node(n), false) => n.to_string(),
        (Decoded::Node(n), true) => text::redacted(n),
        (Decoded::Query(q), false) => q.to_string(),
        (Decoded::Query(q), true) => q.redacted_text(),
    }
}

/// Run the checker over `tree` without type hints
pub fn check(tree: &Decoded) -> Result<()> {
    let result = match tree {
        Decoded::Node(n) => type_checker::check(n),
        Decoded::Query(q) => type_checker::check_query(q, &NoHint),
    };
    result.context("Check failed")
}

/// Simplify `tree` without type hints
pub fn simplify(tree: Decoded) -> Decoded {
    match tree {
        Decoded::Node(n) => Decoded::Node(simp::simplify(n, &NoHint)),
        Decoded::Query(q) => Decoded::Query(simp::simplify_query(q, &NoHint)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::literal::List;
    use crate::expression::node::Node;
    use crate::expression::operator::CmpOp;
    use crate::expression::relation::{Binding, Query, Select};
    use tempfile::tempdir;

    fn sample() -> Node {
        Node::compare(
            CmpOp::Lt,
            Node::add(Node::Integer(1), Node::Integer(2)),
            Node::ident("x"),
        )
    }

    #[test]
    fn test_write_and_read_node() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("tree.bin");

        let tree = Decoded::Node(sample());
        write(&path, &tree)?;
        assert!(path.exists());
        assert_eq!(read(&path)?, tree);
        Ok(())
    }

    #[test]
    fn test_write_and_read_query() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("query.bin");

        let select = Select::new(vec![Binding::new(Node::ident("a"))], None);
        let tree = Decoded::Query(Query::new(Node::from(select)));
        write(&path, &tree)?;
        assert_eq!(read(&path)?, tree);
        Ok(())
    }

    #[test]
    fn test_write_unencodable_tree() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.bin");

        let list = Node::List(List::new(vec![Node::ident("x")]));
        let result = write(&path, &Decoded::Node(list));
        assert!(result.is_err());
        let err_msg = result.err().unwrap().to_string();
        assert!(err_msg.contains("Failed to encode"));
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_read_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let result = read(&dir.path().join("nothing.bin"));
        assert!(result.is_err());
        let err_msg = result.err().unwrap().to_string();
        assert!(err_msg.contains("does not exist"));
        Ok(())
    }

    #[test]
    fn test_read_garbage() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"not an expression")?;
        let err_msg = read(&path).err().unwrap().to_string();
        assert!(err_msg.contains("Failed to decode"));
        Ok(())
    }

    #[test]
    fn test_simplify_and_render() {
        let tree = simplify(Decoded::Node(sample()));
        assert_eq!(
            tree,
            Decoded::Node(Node::compare(CmpOp::Gt, Node::ident("x"), Node::Integer(3)))
        );
        let plain = render(&tree, false);
        assert!(plain.contains('3'));
        assert_ne!(render(&tree, true), plain);
    }

    #[test]
    fn test_check() {
        assert!(check(&Decoded::Node(sample())).is_ok());
        let bad = Node::add(Node::string("a"), Node::Integer(1));
        let err = check(&Decoded::Node(bad)).err().unwrap();
        assert!(format!("{:#}", err).contains("ill-typed"));
    }
}
