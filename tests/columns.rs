mod common;

use common::{temporary_db, TestDb};
use tessera::{ColumnKind, ColumnOptions, DataType, ErrorKind, IndexColumnOptions, TableOptions, Value};

#[test]
fn test_define_column() {
    let t = TestDb::new();
    let bookmarks = t.db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    let column = bookmarks.define_column("name", ColumnOptions::of("ShortText")).unwrap();

    assert_eq!(column.name(), "Bookmarks.name");
    assert_eq!(column.local_name(), "name");
    assert_eq!(bookmarks.column("name").unwrap().as_data(), Some(&column));
    assert_eq!(column.path(), Some(t.columns_dir().join("Bookmarks.name").as_path()));
}

#[test]
fn test_define_column_default_persistent() {
    let t = TestDb::new();
    let bookmarks = t.db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    let column = bookmarks.define_column("real_name", ColumnOptions::of("ShortText")).unwrap();
    assert!(column.is_persistent());
    assert!(!column.to_string().contains("(temporary)"));
}

#[test]
fn test_define_column_not_persistent() {
    let t = TestDb::new();
    let bookmarks = t.db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    let column = bookmarks
        .define_column("real_name", ColumnOptions::of("ShortText").persistent(false))
        .unwrap();
    assert!(!column.is_persistent());
    assert_eq!(
        column.to_string(),
        "#<Column name: <Bookmarks.real_name>, path: (temporary), type: <ShortText>, kind: scalar>"
    );
}

#[test]
fn test_define_column_not_persistent_and_path() {
    let t = TestDb::new();
    let bookmarks = t.db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    let err = bookmarks
        .define_column(
            "real_name",
            ColumnOptions::of("ShortText").persistent(false).path(t.columns_dir().join("real_name")),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    assert!(bookmarks.column("real_name").is_none());
}

#[test]
fn test_define_index_column_persistence() {
    let t = TestDb::new();
    let bookmarks = t.db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    bookmarks.define_column("comment", ColumnOptions::of("Text")).unwrap();
    let terms = t
        .db
        .create_table(TableOptions::hash().name("Terms").default_tokenizer("TokenBigram"))
        .unwrap();

    let persistent = terms
        .define_index_column("comment_index", &bookmarks, IndexColumnOptions::new().source("Bookmarks.comment"))
        .unwrap();
    assert!(!persistent.to_string().contains("(temporary)"));

    let temporary = terms
        .define_index_column(
            "comment_index_tmp",
            &bookmarks,
            IndexColumnOptions::new().source("comment").persistent(false),
        )
        .unwrap();
    assert_eq!(
        temporary.to_string(),
        "#<Column name: <Terms.comment_index_tmp>, path: (temporary), type: <Bookmarks>, kind: index>"
    );

    let err = terms
        .define_index_column(
            "comment_index_bad",
            &bookmarks,
            IndexColumnOptions::new()
                .source("comment")
                .persistent(false)
                .path(t.columns_dir().join("bad")),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
}

#[test]
fn test_add_column_shares_storage() {
    let t = TestDb::new();
    let bookmarks = t.db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    let description_path = t.columns_dir().join("description");
    let bookmarks_description = bookmarks
        .define_column("description", ColumnOptions::of("Text").path(&description_path))
        .unwrap();

    let books = t.db.create_table(TableOptions::hash().name("Books")).unwrap();
    let books_description = books.add_column("description", &description_path).unwrap();
    assert_eq!(books_description.name(), "Books.description");
    assert_eq!(books.column("description").unwrap().as_data(), Some(&books_description));
    assert_eq!(bookmarks.column("description").unwrap().as_data(), Some(&bookmarks_description));
    assert!(books_description.is_shared());

    // Record ids are table local; both handles address the same slots.
    let groonga = bookmarks.add("groonga").unwrap();
    let book = books.add("book").unwrap();
    assert_eq!(groonga, book);
    bookmarks_description.set(groonga, "fulltext search engine").unwrap();
    assert_eq!(books_description.get(book), Some(Value::from("fulltext search engine")));
}

#[test]
fn test_column_nonexistent() {
    let db = temporary_db();
    let table = db.create_table(TableOptions::hash()).unwrap();
    assert!(table.column("nonexistent").is_none());
    assert_eq!(table.data_column("nonexistent").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_columns() {
    let db = temporary_db();
    let bookmarks = db.create_table(TableOptions::array().name("Bookmarks")).unwrap();
    let uri = bookmarks.define_column("uri", ColumnOptions::of("ShortText")).unwrap();
    let comment = bookmarks.define_column("comment", ColumnOptions::of("Text")).unwrap();

    let mut names: Vec<String> = bookmarks.columns().iter().map(|c| c.name().to_string()).collect();
    names.sort();
    let mut expected = vec![uri.name().to_string(), comment.name().to_string()];
    expected.sort();
    assert_eq!(names, expected);
}

#[test]
fn test_duplicate_and_invalid_column_names() {
    let db = temporary_db();
    let bookmarks = db.create_table(TableOptions::array()).unwrap();
    bookmarks.define_column("uri", ColumnOptions::of("ShortText")).unwrap();
    let err = bookmarks.define_column("uri", ColumnOptions::of("ShortText")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    let err = bookmarks.define_column("_uri", ColumnOptions::of("ShortText")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_add_without_key() {
    let t = TestDb::new();
    let users = t
        .db
        .create_table(TableOptions::array().name("Users").path(t.tables_dir().join("users")))
        .unwrap();
    let name = users
        .define_column("name", ColumnOptions::of("ShortText").path(t.columns_dir().join("name")))
        .unwrap();
    let morita = users.add_record().unwrap();
    name.set(morita, "morita").unwrap();
    assert_eq!(name.get(morita), Some(Value::from("morita")));
}

#[test]
fn test_values_are_cast_and_validated() {
    let db = temporary_db();
    let users = db.create_table(TableOptions::hash()).unwrap();
    let age = users.define_column("age", ColumnOptions::of("Int32")).unwrap();
    let nick = users.define_column("nick", ColumnOptions::of("ShortText")).unwrap();
    let id = users.add("morita").unwrap();

    age.set(id, "29").unwrap();
    assert_eq!(age.get(id), Some(Value::Int(29)));
    assert_eq!(age.set(id, i64::MAX).unwrap_err().kind(), ErrorKind::OutOfRange);
    assert_eq!(age.set(id, "old").unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(nick.set(id, "x".repeat(5000)).unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(age.get(id), Some(Value::Int(29)));

    nick.set(id, 42).unwrap();
    assert_eq!(nick.get(id), Some(Value::from("42")));
    age.clear(id).unwrap();
    assert_eq!(age.get(id), None);
}

#[test]
fn test_write_to_missing_record() {
    let db = temporary_db();
    let users = db.create_table(TableOptions::array()).unwrap();
    let name = users.define_column("name", ColumnOptions::of("ShortText")).unwrap();
    let err = name.set(tessera::RecordId(7), "ghost").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_vector_column() {
    let db = temporary_db();
    let bookmarks = db.create_table(TableOptions::hash()).unwrap();
    let tags = bookmarks.define_column("tags", ColumnOptions::of("ShortText").vector()).unwrap();
    assert_eq!(tags.kind(), ColumnKind::Vector);

    let groonga = bookmarks.add("groonga").unwrap();
    tags.set(groonga, Value::Vector(vec!["search".into(), "engine".into()])).unwrap();
    assert_eq!(tags.get(groonga), Some(Value::Vector(vec!["search".into(), "engine".into()])));

    // A single value becomes a one element vector.
    tags.set(groonga, "ruby").unwrap();
    assert_eq!(tags.get(groonga), Some(Value::Vector(vec!["ruby".into()])));
}

#[test]
fn test_auto_record_register() {
    let db = temporary_db();
    let users = db.create_table(TableOptions::hash().name("Users").key_type(DataType::ShortText)).unwrap();
    let books = db.create_table(TableOptions::hash().name("Books").key_type(DataType::ShortText)).unwrap();
    users.define_column("book", ColumnOptions::of("Books")).unwrap();

    assert!(books.records().is_empty());
    let ryoqun = users.add_with(Some("ryoqun".into()), &[("book", Value::from("XP"))]).unwrap();
    let xp = books.find("XP").unwrap().unwrap();
    assert_eq!(books.records().ids(), vec![xp]);
    assert_eq!(users.get(ryoqun, "book").unwrap(), Some(Value::Record(xp)));
}

#[test]
fn test_reference_to_unknown_table() {
    let db = temporary_db();
    let users = db.create_table(TableOptions::hash().name("Users")).unwrap();
    let err = users.define_column("book", ColumnOptions::of("Books")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_dereference_path() {
    let db = temporary_db();
    let bookmarks = db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    bookmarks.define_column("title", ColumnOptions::of("ShortText")).unwrap();
    let comments = db.create_table(TableOptions::array().name("Comments")).unwrap();
    comments.define_column("bookmark", ColumnOptions::of("Bookmarks")).unwrap();

    bookmarks
        .add_with(Some("http://groonga.org/".into()), &[("title", Value::from("groonga"))])
        .unwrap();
    let comment = comments
        .add_with(None, &[("bookmark", Value::from("http://groonga.org/"))])
        .unwrap();

    let record = comments.record(comment).unwrap();
    assert_eq!(record.get("bookmark.title").unwrap(), Some(Value::from("groonga")));
    assert_eq!(record.get(".bookmark._key").unwrap(), Some(Value::from("http://groonga.org/")));
    let bookmark = record.reference("bookmark").unwrap().unwrap();
    assert_eq!(bookmark.table().name(), Some("Bookmarks"));
    assert_eq!(record.get("_id").unwrap(), Some(Value::UInt(1)));
}

#[test]
fn test_remove_column() {
    let t = TestDb::new();
    let bookmarks = t.db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    let title = bookmarks.define_column("title", ColumnOptions::of("ShortText")).unwrap();
    let path = title.path().unwrap().to_path_buf();
    assert!(path.exists());

    bookmarks.remove_column("title").unwrap();
    assert!(bookmarks.column("title").is_none());
    assert!(!path.exists());
    assert_eq!(bookmarks.remove_column("title").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_index_column_is_not_a_data_column() {
    let db = temporary_db();
    let bookmarks = db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    let terms = db.create_table(TableOptions::patricia_trie().name("Terms")).unwrap();
    terms
        .define_index_column("bookmark_key", &bookmarks, IndexColumnOptions::new().source("_key"))
        .unwrap();
    assert_eq!(terms.data_column("bookmark_key").unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(terms.column("bookmark_key").unwrap().kind(), ColumnKind::Index);
}
