pub mod core;
pub mod storage;
pub mod table;
pub mod column;
pub mod analysis;
pub mod index;
pub mod scoring;
pub mod search;
pub mod compression;

pub use crate::column::data::DataColumn;
pub use crate::column::index::IndexColumn;
pub use crate::column::options::{ColumnKind, ColumnOptions, IndexColumnOptions};
pub use crate::column::Column;
pub use crate::core::config::Config;
pub use crate::core::database::Database;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{DataType, RecordId, TableKind, Value, ValueType};
pub use crate::index::inverted::SearchOperator;
pub use crate::search::options::{SearchOptions, SortKey, SortOptions, SortOrder};
pub use crate::search::results::{Entry, RecordSet};
pub use crate::table::options::TableOptions;
pub use crate::table::record::Record;
pub use crate::table::table::Table;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                               TESSERA STRUCT ARCHITECTURE                                   │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── CORE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                               struct Database                                       │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ config: Config                    // Storage path, sync mode, compression    │ │    │
│  │  │ layout: Option<StorageLayout>     // catalog.json, tables/, columns/         │ │    │
│  │  │ registry: AnalyzerRegistry        // Tokenizers and token filters            │ │    │
│  │  │ catalog: Mutex<Catalog>           // Name -> { kind, path, created_at }      │ │    │
│  │  │ tables: RwLock<BTreeMap<..>>      // Named tables                            │ │    │
│  │  │ opened: Mutex<HashMap<Path, Weak>>// Loaded tables by canonical path         │ │    │
│  │  │ column_stores: Mutex<HashMap<..>> // Column stores shared by path            │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────┐  ┌──────────────────┐  ┌───────────────────────────────────────┐    │
│  │ struct Config    │  │ enum Value       │  │ enum DataType                         │    │
│  │ • storage_path   │  │ • Bool / Int     │  │ • Bool, Int32, UInt32, Int64, UInt64  │    │
│  │ • sync_mode      │  │ • UInt / Float   │  │ • Float, Time                         │    │
│  │ • compression    │  │ • Time / Text    │  │ • ShortText, Text, LongText           │    │
│  │ • checkpoint_ops │  │ • Record(id)     │  │ • Reference(table)                    │    │
│  │ • tokenizer      │  │ • Vector(..)     │  └───────────────────────────────────────┘    │
│  └──────────────────┘  └──────────────────┘                                                │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── TABLE LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                           struct Table (handle)                                     │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ inner: Arc<TableInner>            // Shared by every handle on the table     │ │    │
│  │  │ name: Option<String>              // Handle name (open-time override)        │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌────────────────────────┐  ┌─────────────────────────┐  ┌────────────────────────┐      │
│  │ enum Keys              │  │ struct TableLock        │  │ enum TableOp (journal) │      │
│  │ • Array (roaring)      │  │ • held: AtomicBool      │  │ • Add(key)             │      │
│  │ • Hash (linear probe)  │  │ • <path>.lock file      │  │ • Delete(id)           │      │
│  │ • PatriciaTrie         │  │ • LockGuard (RAII)      │  │ • SetValue(id, bytes)  │      │
│  │ • DoubleArrayTrie      │  └─────────────────────────┘  │ • Truncate             │      │
│  └────────────────────────┘                               └────────────────────────┘      │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── COLUMN LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  ┌─────────────────────────┐  ┌─────────────────────────┐  ┌──────────────────────────┐    │
│  │ struct DataColumn       │  │ struct ColumnStore      │  │ struct IndexColumn       │    │
│  │ • store: Arc<Store>     │  │ • values: Vec<Value>    │  │ • lexicon: Weak<Table>   │    │
│  │ • hooks: Vec<IndexHook> │  │ • Durable (snapshot +   │  │ • index: InvertedIndex   │    │
│  │   (section per source)  │  │   journal)              │  │ • analyzer: Analyzer     │    │
│  └─────────────────────────┘  └─────────────────────────┘  └──────────────────────────┘    │
│                                                                                              │
│  write(id, value): cast -> prepare deltas (tokenize, add terms) -> store.set -> apply       │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── INDEXING LAYER ────────────────────────────────────────┐
│                                                                                              │
│  ┌──────────────────────┐  ┌───────────────────────┐  ┌───────────────────────────────┐    │
│  │ struct InvertedIndex │  │ struct PostingList     │  │ struct Posting                │    │
│  │ • postings: term ->  │  │ • postings sorted by   │  │ • id: RecordId                │    │
│  │   PostingList        │  │   (id, section)        │  │ • section: u32                │    │
│  │ • sections: forward  │  │ • delta + vbyte coded  │  │ • term_freq: u32              │    │
│  │   view for retract   │  └───────────────────────┘  │ • positions: Vec<u32>         │    │
│  └──────────────────────┘                              └───────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────────┐  ┌───────────────────────┐  ┌───────────────────────────────┐    │
│  │ trait Tokenizer      │  │ trait TokenFilter      │  │ trait Scorer                  │    │
│  │ • TokenBigram / Uni  │  │ • Lowercase            │  │ • TfScorer (default)          │    │
│  │ • TokenTrigram       │  │ • StopWord             │  │ • Bm25Scorer                  │    │
│  │ • TokenDelimit       │  │ • Stem                 │  └───────────────────────────────┘    │
│  └──────────────────────┘  └───────────────────────┘                                        │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── SEARCH LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │ struct RecordSet { table, entries: Vec<Entry { id, score, n_sub_records }>, groups } │    │
│  │ • select(pred)  • sort(SortOptions)  • group(keys)                                   │    │
│  │ • union / intersection / difference / merge (consume the receiver)                   │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── STORAGE LAYER ────────────────────────────────────────┐
│                                                                                              │
│  ┌──────────────────────┐  ┌───────────────────────┐  ┌───────────────────────────────┐    │
│  │ struct Region        │  │ struct Journal         │  │ struct Durable                │    │
│  │ • 32-byte header     │  │ • length-prefixed      │  │ • region + journal            │    │
│  │   (tag, flags, crc)  │  │   bincode entries      │  │ • log -> apply -> checkpoint  │    │
│  │ • mmap reads         │  │ • torn tail ignored    │  └───────────────────────────────┘    │
│  └──────────────────────┘  └───────────────────────┘                                        │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
