//! End-to-end tests of the adapter facade against the in-memory backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use tablekv::{
    BatchOperation, Config, Error, InMemoryDocumentStore, IteratorOptions, StoreRegistry,
    TableKvDb, Value,
};

async fn open(
    backend: Arc<InMemoryDocumentStore>,
    registry: &StoreRegistry,
    location: &str,
) -> Arc<TableKvDb> {
    let config = Config {
        location: location.to_string(),
        create_if_missing: true,
        ..Config::default()
    };
    TableKvDb::open(config, backend, registry).await.unwrap()
}

#[tokio::test]
async fn should_roundtrip_values_through_the_full_stack() {
    // given
    let backend = Arc::new(InMemoryDocumentStore::new());
    let registry = StoreRegistry::new();
    let db = open(backend, &registry, "roundtrip$p").await;

    let values = vec![
        ("null", Value::Null),
        ("bool", Value::Bool(true)),
        ("number", Value::Number(42.5)),
        ("text", Value::Text("hello".to_string())),
        ("bytes", Value::Bytes(Bytes::from_static(&[1, 2, 3]))),
        (
            "list",
            Value::List(vec![Value::Number(1.0), Value::Text("x".to_string())]),
        ),
    ];

    for (key, value) in &values {
        // when
        db.put(Bytes::from(key.to_string()), value.clone())
            .await
            .unwrap();
        let read = db.get(Bytes::from(key.to_string())).await.unwrap();

        // then
        assert_eq!(&read, value, "round-trip failed for {}", key);
    }
}

#[tokio::test]
async fn should_read_map_values_as_canonical_text() {
    // given
    let backend = Arc::new(InMemoryDocumentStore::new());
    let registry = StoreRegistry::new();
    let db = open(backend, &registry, "maps$p").await;

    let mut members = BTreeMap::new();
    members.insert("name".to_string(), Value::Text("alice".to_string()));
    members.insert("admin".to_string(), Value::Bool(false));
    db.put(Bytes::from("user"), Value::Map(members)).await.unwrap();

    // when
    let read = db.get(Bytes::from("user")).await.unwrap();

    // then - structured on the way in, canonical text on the way out
    assert_eq!(
        read,
        Value::Text(r#"{"admin":false,"name":"alice"}"#.to_string())
    );
}

#[tokio::test]
async fn should_apply_batch_and_iterate_in_order() {
    // given
    let backend = Arc::new(InMemoryDocumentStore::new());
    let registry = StoreRegistry::new();
    let db = open(backend, &registry, "batches$p").await;

    // when - a batch with a same-key conflict and a delete
    db.batch(vec![
        BatchOperation::Put {
            key: Bytes::from("a"),
            value: Value::Number(1.0),
        },
        BatchOperation::Put {
            key: Bytes::from("b"),
            value: Value::Number(2.0),
        },
        BatchOperation::Put {
            key: Bytes::from("c"),
            value: Value::Number(3.0),
        },
        BatchOperation::Put {
            key: Bytes::from("a"),
            value: Value::Number(10.0),
        },
        BatchOperation::Del {
            key: Bytes::from("b"),
        },
    ])
    .await
    .unwrap();

    // then - last write for `a` won, `b` is gone, iteration is ordered
    let mut iter = db.iterator(IteratorOptions::default());
    let mut seen = Vec::new();
    while let Some(entry) = iter.advance().await.unwrap() {
        seen.push((entry.key.unwrap(), entry.value.unwrap()));
    }
    assert_eq!(
        seen,
        vec![
            (Bytes::from("a"), Value::Number(10.0)),
            (Bytes::from("c"), Value::Number(3.0)),
        ]
    );
}

#[tokio::test]
async fn should_iterate_across_pages_in_both_directions() {
    // given - a backend that pages every 3 items
    let backend = Arc::new(InMemoryDocumentStore::new().with_max_page_size(3));
    let registry = StoreRegistry::new();
    let db = open(backend.clone(), &registry, "pages$p").await;
    for i in 0..10 {
        db.put(Bytes::from(format!("k{}", i)), Value::Number(i as f64))
            .await
            .unwrap();
    }

    // when
    let mut forward = db.iterator(IteratorOptions::default());
    let mut ascending = Vec::new();
    while let Some(entry) = forward.advance().await.unwrap() {
        ascending.push(entry.key.unwrap());
    }

    let mut backward = db.iterator(IteratorOptions {
        reverse: true,
        ..IteratorOptions::default()
    });
    let mut descending = Vec::new();
    while let Some(entry) = backward.advance().await.unwrap() {
        descending.push(entry.key.unwrap());
    }

    // then
    let expected: Vec<Bytes> = (0..10).map(|i| Bytes::from(format!("k{}", i))).collect();
    assert_eq!(ascending, expected);
    let reversed: Vec<Bytes> = expected.into_iter().rev().collect();
    assert_eq!(descending, reversed);
}

#[tokio::test]
async fn should_keep_independent_iterators_independent() {
    // given
    let backend = Arc::new(InMemoryDocumentStore::new());
    let registry = StoreRegistry::new();
    let db = open(backend, &registry, "iters$p").await;
    for key in ["a", "b", "c"] {
        db.put(Bytes::from(key), Value::Number(1.0)).await.unwrap();
    }

    // when - interleave two iterators and close one early
    let mut first = db.iterator(IteratorOptions::default());
    let mut second = db.iterator(IteratorOptions::default());
    let a1 = first.advance().await.unwrap().unwrap();
    let a2 = second.advance().await.unwrap().unwrap();
    first.close();

    // then - the closed iterator ends, the other continues
    assert_eq!(a1.key, Some(Bytes::from("a")));
    assert_eq!(a2.key, Some(Bytes::from("a")));
    assert!(first.advance().await.unwrap().is_none());
    let b2 = second.advance().await.unwrap().unwrap();
    assert_eq!(b2.key, Some(Bytes::from("b")));
}

#[tokio::test]
async fn should_destroy_table_through_the_registry() {
    // given
    let backend = Arc::new(InMemoryDocumentStore::new());
    let registry = StoreRegistry::new();
    let db = open(backend.clone(), &registry, "doomed$p").await;
    db.put(Bytes::from("k"), Value::Number(1.0)).await.unwrap();

    // when
    registry.destroy("doomed$p").await.unwrap();

    // then
    assert!(!backend.table_exists("doomed"));
    assert_eq!(registry.destroy("doomed$p").await, Err(Error::NotFound));
}

#[tokio::test]
async fn should_scope_adapters_to_their_partitions() {
    // given - two adapters sharing one table, different partitions
    let backend = Arc::new(InMemoryDocumentStore::new());
    let registry = StoreRegistry::new();
    let first = open(backend.clone(), &registry, "shared$p1").await;

    let config = Config {
        location: "shared$p2".to_string(),
        // Table already exists; a second create is tolerated.
        create_if_missing: true,
        ..Config::default()
    };
    let second = TableKvDb::open(config, backend, &registry).await.unwrap();

    first
        .put(Bytes::from("k"), Value::Text("one".to_string()))
        .await
        .unwrap();
    second
        .put(Bytes::from("k"), Value::Text("two".to_string()))
        .await
        .unwrap();

    // when / then - same sort key, different partitions, no interference
    assert_eq!(
        first.get(Bytes::from("k")).await.unwrap(),
        Value::Text("one".to_string())
    );
    assert_eq!(
        second.get(Bytes::from("k")).await.unwrap(),
        Value::Text("two".to_string())
    );
    let mut iter = first.iterator(IteratorOptions::default());
    assert!(iter.advance().await.unwrap().is_some());
    assert!(iter.advance().await.unwrap().is_none());
}
