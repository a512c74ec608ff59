use super::*;

fn persisted(id: u64) -> Row {
    Row::new(Identity::Persisted(id)).with_field("address", format!("addr-{id}"))
}

#[test]
fn append_returns_tail_position_and_rejects_duplicate_identity() {
    let mut store = RowStore::new();
    assert_eq!(store.append(persisted(1)).expect("append"), 0);
    assert_eq!(store.append(persisted(2)).expect("append"), 1);

    let err = store.append(persisted(1)).expect_err("duplicate identity");
    assert!(matches!(err, ListingError::Validation(_)));
    assert_eq!(store.len(), 2);
}

#[test]
fn get_out_of_bounds_is_not_found() {
    let mut store = RowStore::new();
    store.append(persisted(1)).expect("append");

    let err = store.get(1).expect_err("out of bounds");
    assert!(err.is_not_found());
    assert_eq!(store.get(0).expect("row").get("address"), Some("addr-1"));
}

#[test]
fn remove_shifts_following_positions_down() {
    let mut store = RowStore::new();
    for id in 1..=3 {
        store.append(persisted(id)).expect("append");
    }

    let removed = store.remove(0).expect("remove");
    assert_eq!(removed.identity(), Identity::Persisted(1));
    assert_eq!(store.find_position(Identity::Persisted(3)), Some(1));
    assert_eq!(store.find_position(Identity::Persisted(1)), None);
    assert!(store.remove(5).expect_err("oob").is_not_found());
}

#[test]
fn identity_map_reflects_current_positions() {
    let mut store = RowStore::new();
    store.append(persisted(10)).expect("append");
    store.append(Row::new(Identity::Temporary(1))).expect("append");

    let before = store.identity_map();
    assert_eq!(before.get(&Identity::Temporary(1)), Some(&1));

    store.remove(0).expect("remove");
    let after = store.identity_map();
    assert_eq!(after.get(&Identity::Temporary(1)), Some(&0));
    assert_eq!(
        store.all_identities(),
        HashSet::from([Identity::Temporary(1)])
    );
}

#[test]
fn set_field_refuses_the_id_column() {
    let mut store = RowStore::new();
    store.append(persisted(1)).expect("append");

    let err = store
        .set_field(0, ID_FIELD, "99".to_string())
        .expect_err("id is not editable");
    assert!(matches!(err, ListingError::Validation(_)));

    let previous = store
        .set_field(0, "memo", "corner unit".to_string())
        .expect("set");
    assert_eq!(previous, None);
    assert_eq!(store.get(0).expect("row").get("memo"), Some("corner unit"));
}

#[test]
fn set_identity_keeps_identities_unique() {
    let mut store = RowStore::new();
    store.append(persisted(1)).expect("append");
    store.append(Row::new(Identity::Temporary(4))).expect("append");

    assert!(store.set_identity(1, Identity::Persisted(1)).is_err());
    store
        .set_identity(1, Identity::Persisted(2))
        .expect("promote in place");
    assert_eq!(store.find_position(Identity::Persisted(2)), Some(1));
}

#[test]
fn replace_all_drops_duplicate_identities() {
    let mut store = RowStore::new();
    store.append(persisted(99)).expect("append");

    let kept = store.replace_all(vec![persisted(1), persisted(2), persisted(1)]);
    assert_eq!(kept, 2);
    assert_eq!(
        store.all_identities(),
        HashSet::from([Identity::Persisted(1), Identity::Persisted(2)])
    );
}
