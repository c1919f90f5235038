use std::io::Cursor;

use tempfile::TempDir;

use montebrick_core::error::MonteBrickError;
use montebrick_core::header::{read_header, Header, COMMENT_KEY};

fn sample() -> Header {
    let mut header = Header::new();
    header.push("PIPEVER", "DR9.6.9", Some("pipeline version"));
    header.push(COMMENT_KEY, "first", None);
    header.push(COMMENT_KEY, "second", None);
    header.push("GAINA", "4.0", None);
    header
}

#[test]
fn test_write_read_round_trip() {
    let header = sample();
    let mut buf = Vec::new();
    header.write_to(&mut buf).unwrap();
    let text = String::from_utf8(buf.clone()).unwrap();
    assert!(text.starts_with("# PIPEVER = DR9.6.9 / pipeline version\n"));

    buf.extend_from_slice(b"id,ra,dec\n# not a card\n");
    let back = Header::read_from(Cursor::new(buf)).unwrap();
    assert_eq!(back, header);
    assert_eq!(back.cards()[0].comment.as_deref(), Some("pipeline version"));
}

#[test]
fn test_set_replaces_first_card() {
    let mut header = sample();
    header.set("GAINA", "4.5");
    header.set("PRODTYPE", "injected");
    assert_eq!(header.len(), 5);
    assert_eq!(header.get("GAINA"), Some("4.5"));
    let keys: Vec<&str> = header.keys().collect();
    assert_eq!(keys, vec!["PIPEVER", COMMENT_KEY, COMMENT_KEY, "GAINA", "PRODTYPE"]);
    assert_eq!(header.get(COMMENT_KEY), Some("first"));
}

#[test]
fn test_required_values() {
    let mut header = sample();
    header.push("CSECB", "[1:1024,1:4096]", None);
    assert_eq!(header.require("PIPEVER").unwrap(), "DR9.6.9");
    assert_eq!(header.require_f64("GAINA").unwrap(), 4.0);
    assert!(matches!(
        header.require_f64("GAINB"),
        Err(MonteBrickError::MissingHeaderKey { key }) if key == "GAINB"
    ));
    assert!(matches!(
        header.require_f64("CSECB"),
        Err(MonteBrickError::InvalidHeaderValue { key, .. }) if key == "CSECB"
    ));
}

#[test]
fn test_read_header_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cat.csv");
    std::fs::write(&path, "#\n# A = 1\n#    \n# B = two words\nx\n1\n").unwrap();
    let header = read_header(&path).unwrap();
    assert_eq!(header.len(), 2);
    assert_eq!(header.get("B"), Some("two words"));

    std::fs::write(&path, "# no separator here\n").unwrap();
    assert!(matches!(read_header(&path), Err(MonteBrickError::Catalog(_))));
}
