mod common;

use common::{temporary_db, TestDb};
use tessera::scoring::scorer::Bm25Scorer;
use tessera::{
    ColumnOptions, Database, ErrorKind, IndexColumn, IndexColumnOptions, RecordSet, SearchOperator,
    SearchOptions, Table, TableOptions, Value,
};

fn keys(set: &RecordSet) -> Vec<String> {
    set.values("_key")
        .unwrap()
        .into_iter()
        .map(|key| key.unwrap().to_string())
        .collect()
}

fn bookmarks_with_index(db: &Database) -> (Table, IndexColumn) {
    let bookmarks = db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    bookmarks.define_column("content", ColumnOptions::of("Text")).unwrap();
    let terms = db
        .create_table(TableOptions::hash().name("Terms").default_tokenizer("TokenBigram"))
        .unwrap();
    let index = terms
        .define_index_column(
            "content-index",
            &bookmarks,
            IndexColumnOptions::new().with_section(true).source("Bookmarks.content"),
        )
        .unwrap();
    (bookmarks, index)
}

#[test]
fn test_search_with_index() {
    let t = TestDb::new();
    let (bookmarks, index) = bookmarks_with_index(&t.db);

    bookmarks
        .add_with(Some("google".into()), &[("content", Value::from("Search engine"))])
        .unwrap();

    let result = index.search("engine").unwrap();
    assert_eq!(keys(&result), vec!["google"]);
    assert!(result.table().same_table(&bookmarks));
    assert_eq!(index.name(), "Terms.content-index");
    assert_eq!(index.sources(), ["Bookmarks.content".to_string()]);
}

#[test]
fn test_search_absent_term() {
    let db = temporary_db();
    let (bookmarks, index) = bookmarks_with_index(&db);
    bookmarks
        .add_with(Some("google".into()), &[("content", Value::from("Search engine"))])
        .unwrap();

    assert!(index.search("ruby").unwrap().is_empty());
    assert!(index.search("").unwrap().is_empty());
}

#[test]
fn test_phrase_and_operators() {
    let db = temporary_db();
    let (bookmarks, index) = bookmarks_with_index(&db);
    bookmarks
        .add_with(Some("google".into()), &[("content", Value::from("Search engine"))])
        .unwrap();
    bookmarks
        .add_with(Some("groonga".into()), &[("content", Value::from("engine for search"))])
        .unwrap();
    bookmarks
        .add_with(Some("ruby".into()), &[("content", Value::from("a programming language"))])
        .unwrap();

    assert_eq!(keys(&index.search("search engine").unwrap()), vec!["google"]);

    let and = SearchOptions::new().operator(SearchOperator::And);
    let mut found = keys(&index.search_with("search engine", &and).unwrap());
    found.sort();
    assert_eq!(found, vec!["google", "groonga"]);

    let or = SearchOptions::new().operator(SearchOperator::Or);
    let mut found = keys(&index.search_with("engine language", &or).unwrap());
    found.sort();
    assert_eq!(found, vec!["google", "groonga", "ruby"]);
}

#[test]
fn test_search_is_ranked_by_score() {
    let db = temporary_db();
    let (bookmarks, index) = bookmarks_with_index(&db);
    bookmarks
        .add_with(Some("once".into()), &[("content", Value::from("ruby is fun"))])
        .unwrap();
    bookmarks
        .add_with(Some("twice".into()), &[("content", Value::from("ruby ruby is more fun"))])
        .unwrap();

    let result = index.search("ruby").unwrap();
    assert_eq!(keys(&result), vec!["twice", "once"]);
    let twice = bookmarks.find("twice").unwrap().unwrap();
    let once = bookmarks.find("once").unwrap().unwrap();
    assert!(result.score(twice).unwrap() > result.score(once).unwrap());

    let bm25 = SearchOptions::new().scorer(Bm25Scorer::default());
    let result = index.search_with("ruby", &bm25).unwrap();
    assert_eq!(keys(&result), vec!["twice", "once"]);
}

#[test]
fn test_overwrite_retracts_old_postings() {
    let db = temporary_db();
    let (bookmarks, index) = bookmarks_with_index(&db);
    let google = bookmarks
        .add_with(Some("google".into()), &[("content", Value::from("Search engine"))])
        .unwrap();

    bookmarks.set(google, "content", "web portal").unwrap();
    assert!(index.search("engine").unwrap().is_empty());
    assert!(index.postings("engine").is_empty());
    assert_eq!(keys(&index.search("portal").unwrap()), vec!["google"]);

    bookmarks.data_column("content").unwrap().clear(google).unwrap();
    assert!(index.search("portal").unwrap().is_empty());
}

#[test]
fn test_rejected_value_keeps_value_and_postings() {
    let db = temporary_db();
    let (bookmarks, index) = bookmarks_with_index(&db);
    let google = bookmarks
        .add_with(Some("google".into()), &[("content", Value::from("Search engine"))])
        .unwrap();
    let terms = db.table("Terms").unwrap();
    let lexicon_size = terms.size();

    let err = bookmarks.set(google, "content", "portal ".repeat(10_000)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(bookmarks.get(google, "content").unwrap(), Some(Value::from("Search engine")));
    assert_eq!(keys(&index.search("engine").unwrap()), vec!["google"]);
    assert!(index.postings("portal").is_empty());
    assert_eq!(terms.size(), lexicon_size);
    assert_eq!(terms.find("portal").unwrap(), None);
}

#[test]
fn test_delete_removes_postings() {
    let db = temporary_db();
    let (bookmarks, index) = bookmarks_with_index(&db);
    let google = bookmarks
        .add_with(Some("google".into()), &[("content", Value::from("Search engine"))])
        .unwrap();
    bookmarks
        .add_with(Some("yahoo".into()), &[("content", Value::from("another engine"))])
        .unwrap();

    bookmarks.delete(google).unwrap();
    assert_eq!(keys(&index.search("engine").unwrap()), vec!["yahoo"]);
    assert!(index.search("search").unwrap().is_empty());
}

#[test]
fn test_postings_carry_section_and_positions() {
    let db = temporary_db();
    let (bookmarks, index) = bookmarks_with_index(&db);
    let google = bookmarks
        .add_with(Some("google".into()), &[("content", Value::from("Search engine"))])
        .unwrap();

    let postings = index.postings("engine");
    assert_eq!(postings.len(), 1);
    assert_eq!(postings[0].id, google);
    assert_eq!(postings[0].section, 1);
    assert_eq!(postings[0].positions, vec![1]);
    assert!(index.with_position());
}

#[test]
fn test_index_over_existing_data() {
    let db = temporary_db();
    let bookmarks = db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    bookmarks.define_column("content", ColumnOptions::of("Text")).unwrap();
    bookmarks
        .add_with(Some("google".into()), &[("content", Value::from("Search engine"))])
        .unwrap();

    let terms = db
        .create_table(TableOptions::patricia_trie().name("Terms").default_tokenizer("TokenBigram"))
        .unwrap();
    let index = terms
        .define_index_column("content", &bookmarks, IndexColumnOptions::new().source("content"))
        .unwrap();
    assert_eq!(keys(&index.search("engine").unwrap()), vec!["google"]);
    assert!(terms.find("engine").unwrap().is_some());
}

#[test]
fn test_multiple_sources() {
    let db = temporary_db();
    let bookmarks = db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    bookmarks.define_column("title", ColumnOptions::of("ShortText")).unwrap();
    bookmarks.define_column("content", ColumnOptions::of("Text")).unwrap();
    let terms = db
        .create_table(TableOptions::hash().name("Terms").default_tokenizer("TokenBigram"))
        .unwrap();

    let err = terms
        .define_index_column("mixed", &bookmarks, IndexColumnOptions::new().sources(&["title", "content"]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

    let index = terms
        .define_index_column(
            "mixed",
            &bookmarks,
            IndexColumnOptions::new().with_section(true).sources(&["title", "content"]),
        )
        .unwrap();
    bookmarks
        .add_with(
            Some("groonga".into()),
            &[("title", Value::from("groonga")), ("content", Value::from("fulltext engine"))],
        )
        .unwrap();

    assert_eq!(keys(&index.search("groonga").unwrap()), vec!["groonga"]);
    assert_eq!(keys(&index.search("engine").unwrap()), vec!["groonga"]);
    assert_eq!(index.postings("groonga")[0].section, 1);
    assert_eq!(index.postings("engine")[0].section, 2);
}

#[test]
fn test_key_index() {
    let db = temporary_db();
    let users = db.create_table(TableOptions::hash().name("Users")).unwrap();
    let terms = db
        .create_table(TableOptions::patricia_trie().name("Names").default_tokenizer("TokenDelimit"))
        .unwrap();
    let index = terms
        .define_index_column("users_key", &users, IndexColumnOptions::new().source("_key"))
        .unwrap();
    users.add("mori daijiro").unwrap();
    users.add("kou").unwrap();

    assert_eq!(keys(&index.search("daijiro").unwrap()), vec!["mori daijiro"]);
    assert_eq!(keys(&index.search("kou").unwrap()), vec!["kou"]);
}

#[test]
fn test_invalid_sources() {
    let db = temporary_db();
    let bookmarks = db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    let terms = db.create_table(TableOptions::hash().name("Terms")).unwrap();

    let err = terms
        .define_index_column("missing", &bookmarks, IndexColumnOptions::new().source("content"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(terms.column("missing").is_none());

    let users = db.create_table(TableOptions::array().name("Users")).unwrap();
    let err = terms
        .define_index_column("array_key", &users, IndexColumnOptions::new().source("_key"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

    let unknown = terms
        .define_index_column(
            "unknown_tokenizer",
            &bookmarks,
            IndexColumnOptions::new().tokenizer("TokenMecab"),
        )
        .unwrap_err();
    assert_eq!(unknown.kind(), ErrorKind::InvalidConfiguration);

    let array_lexicon = db.create_table(TableOptions::array()).unwrap();
    let err = array_lexicon
        .define_index_column("terms", &bookmarks, IndexColumnOptions::new().source("_key"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
}

#[test]
fn test_vector_source() {
    let db = temporary_db();
    let bookmarks = db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    bookmarks
        .define_column("tags", ColumnOptions::of("ShortText").vector())
        .unwrap();
    let tags = db.create_table(TableOptions::hash().name("Tags")).unwrap();
    let index = tags
        .define_index_column("bookmark_tags", &bookmarks, IndexColumnOptions::new().source("tags"))
        .unwrap();

    let groonga = bookmarks.add("groonga").unwrap();
    bookmarks
        .set(groonga, "tags", Value::Vector(vec!["search".into(), "engine".into()]))
        .unwrap();
    assert_eq!(keys(&index.search("engine").unwrap()), vec!["groonga"]);
    assert_eq!(index.postings("engine")[0].positions, Vec::<u32>::new());
}
