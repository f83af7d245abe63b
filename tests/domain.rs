use assert_matches::assert_matches;

use kira_table_inspector::domain::{ColumnList, Delimiter};
use kira_table_inspector::error::TableError;

#[test]
fn delimiter_displays_tab_escaped() {
    assert_eq!(Delimiter::TAB.to_string(), "\\t");
    assert_eq!(Delimiter::default(), Delimiter::TAB);
    let pipe: Delimiter = "pipe".parse().unwrap();
    assert_eq!(pipe.to_string(), "|");
}

#[test]
fn delimiter_deserializes_from_alias() {
    let delimiter: Delimiter = serde_json::from_str(r#""semicolon""#).unwrap();
    assert_eq!(delimiter.as_byte(), b';');
    assert_eq!(serde_json::to_string(&Delimiter::TAB).unwrap(), r#""\\t""#);
    assert!(serde_json::from_str::<Delimiter>(r#""tabs""#).is_err());
}

#[test]
fn column_list_keeps_order() {
    let list: ColumnList = "chrom,pos,ref,alt".parse().unwrap();
    assert_eq!(list.clone().into_vec(), ["chrom", "pos", "ref", "alt"]);
    assert_eq!(list.as_slice().len(), 4);
}

#[test]
fn column_list_rejects_trailing_comma() {
    assert_matches!(
        "chrom,pos,".parse::<ColumnList>(),
        Err(TableError::InvalidColumnList(value)) if value == "chrom,pos,"
    );
}
