mod common;

use common::temporary_db;
use rand::seq::SliceRandom;
use rand::thread_rng;
use tessera::{
    ColumnOptions, Database, ErrorKind, RecordSet, SortKey, SortOptions, Table, TableOptions, Value,
};

fn shuffled_bookmarks(db: &Database) -> Table {
    let bookmarks = db.create_table(TableOptions::array().name("Bookmarks")).unwrap();
    let id_column = bookmarks.define_column("id", ColumnOptions::of("Int32")).unwrap();
    let mut ids: Vec<i32> = (100..200).collect();
    ids.shuffle(&mut thread_rng());
    for id in ids {
        let record = bookmarks.add_record().unwrap();
        id_column.set(record, id).unwrap();
    }
    bookmarks
}

fn ints(set: &RecordSet, path: &str) -> Vec<i64> {
    set.values(path)
        .unwrap()
        .into_iter()
        .map(|value| value.and_then(|v| v.as_i64()).unwrap())
        .collect()
}

fn texts(set: &RecordSet, path: &str) -> Vec<String> {
    set.values(path)
        .unwrap()
        .into_iter()
        .map(|value| value.unwrap().to_string())
        .collect()
}

#[test]
fn test_sort_descending_with_limit() {
    let db = temporary_db();
    let bookmarks = shuffled_bookmarks(&db);
    let results = bookmarks
        .sort(&SortOptions::by(vec![SortKey::descending("id")]).limit(20))
        .unwrap();
    assert_eq!(ints(&results, "id"), (180..200).rev().collect::<Vec<i64>>());
}

#[test]
fn test_sort_ascending_with_limit() {
    let db = temporary_db();
    let bookmarks = shuffled_bookmarks(&db);
    let results = bookmarks.sort(&SortOptions::new().key("id").limit(20)).unwrap();
    assert_eq!(ints(&results, "id"), (100..120).collect::<Vec<i64>>());
}

#[test]
fn test_sort_without_limit() {
    let db = temporary_db();
    let bookmarks = shuffled_bookmarks(&db);
    let results = bookmarks
        .sort(&SortOptions::by(vec![SortKey::descending("id")]))
        .unwrap();
    assert_eq!(ints(&results, "id"), (100..200).rev().collect::<Vec<i64>>());
}

#[test]
fn test_sort_with_offset() {
    let db = temporary_db();
    let bookmarks = shuffled_bookmarks(&db);
    let results = bookmarks
        .sort(&SortOptions::by(vec![SortKey::descending("id")]).offset(20))
        .unwrap();
    assert_eq!(ints(&results, "id"), (100..180).rev().collect::<Vec<i64>>());
}

#[test]
fn test_sort_with_offset_and_limit() {
    let db = temporary_db();
    let bookmarks = shuffled_bookmarks(&db);
    let results = bookmarks
        .sort(&SortOptions::by(vec![SortKey::descending("id")]).offset(20).limit(20))
        .unwrap();
    assert_eq!(ints(&results, "id"), (160..180).rev().collect::<Vec<i64>>());
}

#[test]
fn test_sort_edge_cases() {
    let db = temporary_db();
    let bookmarks = shuffled_bookmarks(&db);

    let err = bookmarks.sort(&SortOptions::new().key("id").limit(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = bookmarks.sort(&SortOptions::new().key("nonexistent")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(bookmarks.sort(&SortOptions::new().key("id").offset(500)).unwrap().is_empty());
}

#[test]
fn test_sort_missing_values_and_ties() {
    let db = temporary_db();
    let users = db.create_table(TableOptions::hash().name("Users")).unwrap();
    users.define_column("age", ColumnOptions::of("Int32")).unwrap();
    let a = users.add_with(Some("a".into()), &[("age", Value::from(30))]).unwrap();
    let b = users.add("b").unwrap();
    let c = users.add_with(Some("c".into()), &[("age", Value::from(20))]).unwrap();
    let d = users.add_with(Some("d".into()), &[("age", Value::from(30))]).unwrap();

    let ascending = users.sort(&SortOptions::new().key("age")).unwrap();
    assert_eq!(ascending.ids(), vec![b, c, a, d]);

    let by_two_keys = users
        .sort(&SortOptions::by(vec![SortKey::descending("age"), SortKey::descending("_key")]))
        .unwrap();
    assert_eq!(by_two_keys.ids(), vec![d, a, c, b]);
}

fn bookmarks_and_comments(db: &Database) -> (Table, Table) {
    let bookmarks = db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    bookmarks.define_column("title", ColumnOptions::of("Text")).unwrap();
    let comments = db.create_table(TableOptions::array().name("Comments")).unwrap();
    comments.define_column("bookmark", ColumnOptions::of("Bookmarks")).unwrap();
    comments.define_column("content", ColumnOptions::of("Text")).unwrap();
    comments.define_column("issued", ColumnOptions::of("Int32")).unwrap();

    bookmarks
        .add_with(Some("http://groonga.org/".into()), &[("title", Value::from("groonga"))])
        .unwrap();
    bookmarks
        .add_with(Some("http://ruby-lang.org/".into()), &[("title", Value::from("Ruby"))])
        .unwrap();

    let comment = |bookmark: &str, content: &str, issued: i32| {
        comments
            .add_with(
                None,
                &[
                    ("bookmark", Value::from(bookmark)),
                    ("content", Value::from(content)),
                    ("issued", Value::from(issued)),
                ],
            )
            .unwrap();
    };
    comment("http://groonga.org/", "full-text search engine", 1237640400);
    comment("http://ruby-lang.org/", "object oriented script language", 1237640400);
    comment("http://groonga.org/", "fast", 1237726800);
    (bookmarks, comments)
}

#[test]
fn test_group_by_reference() {
    let db = temporary_db();
    let (bookmarks, comments) = bookmarks_and_comments(&db);

    let groups = comments.records().group(&[".bookmark"]).unwrap();
    assert!(groups.table().same_table(&bookmarks));
    let summary: Vec<(u32, String, String)> = groups
        .iter()
        .map(|record| {
            (
                record.n_sub_records(),
                record.get("title").unwrap().unwrap().to_string(),
                record.key().unwrap().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (2, "groonga".to_string(), "http://groonga.org/".to_string()),
            (1, "Ruby".to_string(), "http://ruby-lang.org/".to_string()),
        ]
    );

    let groonga = bookmarks.find("http://groonga.org/").unwrap().unwrap();
    assert_eq!(groups.sub_records(groonga).len(), 2);
    assert_eq!(groups.score(groonga), Some(2.0));
}

#[test]
fn test_group_by_scalar_and_sort_by_sub_records() {
    let db = temporary_db();
    let (_, comments) = bookmarks_and_comments(&db);

    let groups = comments.records().group(&["issued"]).unwrap();
    assert_eq!(groups.len(), 2);
    let ranked = groups
        .sort(&SortOptions::by(vec![SortKey::descending("_nsubrecs")]))
        .unwrap();
    assert_eq!(ints(&ranked, "_key"), vec![1237640400, 1237726800]);
    assert_eq!(ints(&ranked, "_nsubrecs"), vec![2, 1]);
}

#[test]
fn test_group_by_several_keys() {
    let db = temporary_db();
    let (_, comments) = bookmarks_and_comments(&db);

    let groups = comments.records().group(&["bookmark.title", "issued"]).unwrap();
    assert_eq!(groups.len(), 3);
    assert_eq!(texts(&groups, "bookmark_title"), vec!["groonga", "Ruby", "groonga"]);
    assert_eq!(ints(&groups, "issued"), vec![1237640400, 1237640400, 1237726800]);

    let err = comments.records().group(&[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = comments.records().group(&["nonexistent"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

fn ruby_and_all(db: &Database) -> (Table, RecordSet, RecordSet) {
    let bookmarks = db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    bookmarks.define_column("title", ColumnOptions::of("ShortText")).unwrap();
    bookmarks
        .add_with(Some("http://ruby-lang.org/".into()), &[("title", Value::from("Ruby"))])
        .unwrap();
    bookmarks
        .add_with(Some("http://groonga.org/".into()), &[("title", Value::from("groonga"))])
        .unwrap();

    let ruby = bookmarks
        .select(|record| Ok(record.get("title")? == Some(Value::from("Ruby"))))
        .unwrap();
    let all = bookmarks.select(|_| Ok(true)).unwrap();
    (bookmarks, ruby, all)
}

#[test]
fn test_union() {
    let db = temporary_db();
    let (_, ruby, all) = ruby_and_all(&db);
    let union = ruby.union(&all).unwrap();
    assert_eq!(texts(&union, "title"), vec!["Ruby", "groonga"]);
}

#[test]
fn test_intersection() {
    let db = temporary_db();
    let (_, ruby, all) = ruby_and_all(&db);
    let intersection = all.intersection(&ruby).unwrap();
    assert_eq!(texts(&intersection, "title"), vec!["Ruby"]);
}

#[test]
fn test_difference() {
    let db = temporary_db();
    let (_, ruby, all) = ruby_and_all(&db);
    let difference = all.difference(&ruby).unwrap();
    assert_eq!(texts(&difference, "title"), vec!["groonga"]);
}

#[test]
fn test_merge() {
    let db = temporary_db();
    let (_, ruby, all) = ruby_and_all(&db);
    let merged = ruby.merge(&all).unwrap();
    let ranked = merged.sort(&SortOptions::new().key("_score")).unwrap();
    let scored: Vec<(String, f64)> = ranked
        .iter()
        .map(|record| (record.get("title").unwrap().unwrap().to_string(), record.score()))
        .collect();
    assert_eq!(scored, vec![("groonga".to_string(), 1.0), ("Ruby".to_string(), 2.0)]);
}

#[test]
fn test_merge_and_union_keep_group_members() {
    let db = temporary_db();
    let (bookmarks, comments) = bookmarks_and_comments(&db);
    let groonga = bookmarks.find("http://groonga.org/").unwrap().unwrap();

    let groups = comments.records().group(&[".bookmark"]).unwrap();
    assert_eq!(groups.sub_records(groonga).len(), 2);

    let empty = groups.clone().difference(&groups).unwrap();
    assert!(empty.is_empty());
    let merged = empty.clone().merge(&groups).unwrap();
    assert_eq!(merged.sub_records(groonga), groups.sub_records(groonga));
    assert_eq!(merged.score(groonga), Some(2.0));

    let united = empty.union(&groups).unwrap();
    assert_eq!(united.sub_records(groonga), groups.sub_records(groonga));
}

#[test]
fn test_set_operations_need_the_same_table() {
    let db = temporary_db();
    let (_, ruby, _) = ruby_and_all(&db);
    let users = db.create_table(TableOptions::hash().name("Users")).unwrap();
    users.add("morita").unwrap();

    let err = ruby.clone().union(&users.records()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = ruby.merge(&users.records()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_select_keeps_scores() {
    let db = temporary_db();
    let (bookmarks, ruby, all) = ruby_and_all(&db);
    let merged = ruby.merge(&all).unwrap();
    let ruby_id = bookmarks.find("http://ruby-lang.org/").unwrap().unwrap();

    let selected = merged
        .select(|record| Ok(record.key()? == Some(Value::from("http://ruby-lang.org/"))))
        .unwrap();
    assert_eq!(selected.ids(), vec![ruby_id]);
    assert_eq!(selected.score(ruby_id), Some(2.0));
}
