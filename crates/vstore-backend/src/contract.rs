//! Behavior every [`Backend`] implementation must show.
//!
//! Each backend's test module runs [`run_all`] against a fresh instance.

use std::thread;

use vstore_types::{Commit, Hash, Key, RefKind, Tree, TreeEntry};

use crate::error::BackendError;
use crate::traits::Backend;

pub(crate) fn run_all(backend: &dyn Backend) {
    content_roundtrip_is_idempotent(backend);
    missing_objects_are_not_found(backend);
    tree_roundtrip(backend);
    commit_roundtrip(backend);
    reference_lifecycle(backend);
    names_unique_across_kinds(backend);
    listing_is_restartable(backend);
}

fn key(s: &str) -> Key {
    s.parse().unwrap()
}

fn root_commit(backend: &dyn Backend) -> Hash {
    let tree = backend.put_tree(&Tree::empty()).unwrap();
    backend.put_commit(&Commit::root(tree)).unwrap()
}

fn child_commit(backend: &dyn Backend, parent: Hash, metadata: &[u8]) -> Hash {
    let value = backend.put_content(metadata).unwrap();
    let tree = Tree::new(vec![TreeEntry::new(key("db.t"), value)]);
    let tree = backend.put_tree(&tree).unwrap();
    backend
        .put_commit(&Commit::new(tree, vec![parent], metadata.to_vec()))
        .unwrap()
}

pub(crate) fn content_roundtrip_is_idempotent(backend: &dyn Backend) {
    let a = backend.put_content(b"table metadata v1").unwrap();
    let b = backend.put_content(b"table metadata v1").unwrap();
    assert_eq!(a, b);
    assert_eq!(backend.get_content(&a).unwrap(), b"table metadata v1");

    let other = backend.put_content(b"table metadata v2").unwrap();
    assert_ne!(a, other);
}

pub(crate) fn missing_objects_are_not_found(backend: &dyn Backend) {
    for hash in [
        Hash::from_digest([0xee; 32]),
        Hash::from_slice(&[0xee; 20]).unwrap(),
    ] {
        assert!(matches!(
            backend.get_content(&hash),
            Err(BackendError::NotFound { .. })
        ));
        assert!(matches!(
            backend.get_tree(&hash),
            Err(BackendError::NotFound { .. })
        ));
        assert!(matches!(
            backend.get_commit(&hash),
            Err(BackendError::NotFound { .. })
        ));
        assert!(!backend.contains_commit(&hash).unwrap());
    }
    assert!(matches!(
        backend.get_reference("no-such-ref"),
        Err(BackendError::ReferenceNotFound(_))
    ));
}

pub(crate) fn tree_roundtrip(backend: &dyn Backend) {
    let v1 = backend.put_content(b"one").unwrap();
    let v2 = backend.put_content(b"two").unwrap();
    let tree = Tree::new(vec![
        TreeEntry::new(key("db.orders"), v1),
        TreeEntry::new(key("db"), v2),
        TreeEntry::new(key("analytics.daily.view"), v1),
    ]);

    let hash = backend.put_tree(&tree).unwrap();
    assert_eq!(backend.put_tree(&tree).unwrap(), hash);

    let loaded = backend.get_tree(&hash).unwrap();
    assert_eq!(loaded, tree);
    assert_eq!(loaded.get(&key("db.orders")), Some(&v1));

    let empty = backend.put_tree(&Tree::empty()).unwrap();
    assert!(backend.get_tree(&empty).unwrap().is_empty());
}

pub(crate) fn commit_roundtrip(backend: &dyn Backend) {
    let root = root_commit(backend);
    assert_eq!(root_commit(backend), root);
    let loaded_root = backend.get_commit(&root).unwrap();
    assert!(loaded_root.is_root());
    assert!(loaded_root.metadata.is_empty());

    let text = child_commit(backend, root, b"{\"message\":\"add orders\"}");
    let loaded = backend.get_commit(&text).unwrap();
    assert_eq!(loaded.parents, vec![root]);
    assert_eq!(loaded.metadata, b"{\"message\":\"add orders\"}");

    let binary = child_commit(backend, text, &[0, 0xff, 0x80, 1]);
    let loaded = backend.get_commit(&binary).unwrap();
    assert_eq!(loaded.metadata, vec![0, 0xff, 0x80, 1]);
    assert_eq!(loaded.first_parent(), Some(&text));

    let merge = backend
        .put_commit(&Commit::new(loaded.tree, vec![binary, text], b"merge".to_vec()))
        .unwrap();
    assert_eq!(backend.get_commit(&merge).unwrap().parents, vec![binary, text]);
    assert!(backend.contains_commit(&merge).unwrap());
}

pub(crate) fn reference_lifecycle(backend: &dyn Backend) {
    let root = root_commit(backend);
    let c1 = child_commit(backend, root, b"c1");
    let c2 = child_commit(backend, c1, b"c2");

    let created = backend
        .create_reference("feature/x", RefKind::Branch, &root)
        .unwrap();
    assert_eq!(created.hash, root);
    assert!(matches!(
        backend.create_reference("feature/x", RefKind::Branch, &c1),
        Err(BackendError::AlreadyExists(_))
    ));

    backend.cas_reference("feature/x", &root, &c1).unwrap();
    assert_eq!(backend.get_reference("feature/x").unwrap().hash, c1);

    // Stale expectation: nothing moves.
    let err = backend.cas_reference("feature/x", &root, &c2).unwrap_err();
    match err {
        BackendError::Conflict { expected, .. } => assert_eq!(expected, root),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(backend.get_reference("feature/x").unwrap().hash, c1);

    assert!(matches!(
        backend.cas_reference("no-such-ref", &root, &c1),
        Err(BackendError::ReferenceNotFound(_))
    ));

    assert!(matches!(
        backend.delete_reference("feature/x", &root),
        Err(BackendError::Conflict { .. })
    ));
    backend.delete_reference("feature/x", &c1).unwrap();
    assert!(matches!(
        backend.get_reference("feature/x"),
        Err(BackendError::ReferenceNotFound(_))
    ));

    // The commits outlive the reference.
    assert!(backend.contains_commit(&c1).unwrap());
}

pub(crate) fn names_unique_across_kinds(backend: &dyn Backend) {
    let root = root_commit(backend);
    let tag = backend
        .create_reference("release-1", RefKind::Tag, &root)
        .unwrap();
    assert!(tag.is_tag());
    assert!(matches!(
        backend.create_reference("release-1", RefKind::Branch, &root),
        Err(BackendError::AlreadyExists(_))
    ));
    assert_eq!(
        backend.get_reference("release-1").unwrap().kind,
        RefKind::Tag
    );
}

pub(crate) fn listing_is_restartable(backend: &dyn Backend) {
    let root = root_commit(backend);
    for name in ["list-a", "list-b", "list-c"] {
        backend
            .create_reference(name, RefKind::Branch, &root)
            .unwrap();
    }
    let listed = |backend: &dyn Backend| {
        let mut names: Vec<String> = backend
            .list_references()
            .unwrap()
            .map(|r| r.unwrap().name)
            .filter(|n| n.starts_with("list-"))
            .collect();
        names.sort();
        names
    };
    let first = listed(backend);
    assert_eq!(first, vec!["list-a", "list-b", "list-c"]);
    assert_eq!(listed(backend), first);
}

/// Several threads race to move one branch from the same head; exactly one
/// wins and the rest see a conflict.
pub(crate) fn concurrent_cas_exactly_one_wins(backend: &dyn Backend) {
    let root = root_commit(backend);
    backend
        .create_reference("race", RefKind::Branch, &root)
        .unwrap();
    let candidates: Vec<Hash> = (0..8u8)
        .map(|i| child_commit(backend, root, &[b'c', i]))
        .collect();

    let results: Vec<bool> = thread::scope(|s| {
        let handles: Vec<_> = candidates
            .iter()
            .map(|c| s.spawn(move || backend.cas_reference("race", &root, c)))
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join().unwrap() {
                Ok(()) => true,
                Err(BackendError::Conflict { .. }) => false,
                Err(other) => panic!("unexpected {other:?}"),
            })
            .collect()
    });

    assert_eq!(results.iter().filter(|won| **won).count(), 1);
    let head = backend.get_reference("race").unwrap().hash;
    assert!(candidates.contains(&head));
}
