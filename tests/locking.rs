mod common;

use common::{temporary_db, TestDb};
use tessera::{Error, ErrorKind, TableOptions};

#[test]
fn test_lock_and_unlock() {
    let db = temporary_db();
    let table = db.create_table(TableOptions::array()).unwrap();
    assert!(!table.is_locked());

    table.lock().unwrap();
    assert!(table.is_locked());
    assert_eq!(table.lock().unwrap_err().kind(), ErrorKind::LockContention);

    table.unlock();
    assert!(!table.is_locked());
    // unlocking twice is harmless
    table.unlock();
    assert!(!table.is_locked());
}

#[test]
fn test_with_lock() {
    let db = temporary_db();
    let table = db.create_table(TableOptions::array()).unwrap();

    let size = table
        .with_lock(|locked| {
            assert!(locked.is_locked());
            locked.add_record()?;
            Ok(locked.size())
        })
        .unwrap();
    assert_eq!(size, 1);
    assert!(!table.is_locked());

    let result: tessera::Result<()> = table.with_lock(|_| Err(Error::invalid_argument("aborted")));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert!(!table.is_locked());
}

#[test]
fn test_with_lock_on_locked_table() {
    let db = temporary_db();
    let table = db.create_table(TableOptions::array()).unwrap();
    table.lock().unwrap();

    let mut ran = false;
    let err = table
        .with_lock(|_| {
            ran = true;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LockContention);
    assert!(!ran);
    // the outer lock is still held
    assert!(table.is_locked());
}

#[test]
fn test_lock_guard() {
    let db = temporary_db();
    let table = db.create_table(TableOptions::array()).unwrap();
    {
        let _guard = table.lock_guard().unwrap();
        assert!(table.is_locked());
        assert_eq!(table.lock_guard().unwrap_err().kind(), ErrorKind::LockContention);
    }
    assert!(!table.is_locked());
}

#[test]
fn test_clear_lock() {
    let db = temporary_db();
    let table = db.create_table(TableOptions::array()).unwrap();
    table.lock().unwrap();
    table.clear_lock().unwrap();
    assert!(!table.is_locked());
    table.lock().unwrap();
}

#[test]
fn test_remove_locked_table() {
    let t = TestDb::new();
    let table = t.db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    table.lock().unwrap();

    let err = table.clone().remove().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LockContention);
    assert!(t.db.table("Bookmarks").is_some());
    assert!(table.path().unwrap().exists());

    table.unlock();
    table.remove().unwrap();
    assert!(t.db.table("Bookmarks").is_none());
}

#[test]
fn test_lock_file_of_persistent_table() {
    let t = TestDb::new();
    let table = t.db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    let lock_file = t.tables_dir().join("Bookmarks.lock");

    table.lock().unwrap();
    assert!(lock_file.exists());

    // another handle on the same table sees the lock
    let other = t.db.open_table(table.path().unwrap()).unwrap();
    assert!(other.is_locked());
    assert_eq!(other.lock().unwrap_err().kind(), ErrorKind::LockContention);

    table.unlock();
    assert!(!lock_file.exists());
    assert!(!other.is_locked());
}

#[test]
fn test_clear_stale_lock_file() {
    let t = TestDb::new();
    let table = t.db.create_table(TableOptions::hash().name("Bookmarks")).unwrap();
    let lock_file = t.tables_dir().join("Bookmarks.lock");

    // left behind by a process that died holding the lock
    std::fs::write(&lock_file, "12345\n").unwrap();
    assert!(table.is_locked());
    assert_eq!(table.lock().unwrap_err().kind(), ErrorKind::LockContention);

    table.clear_lock().unwrap();
    assert!(!lock_file.exists());
    table.lock().unwrap();
    table.unlock();
}
