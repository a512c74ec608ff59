use super::*;
use crate::pending::PendingChange;
use shared::domain::ListingKind;

#[test]
fn new_rows_take_the_next_free_negative_id() {
    let mut legacy = LegacyController::new();
    let mut state = ListingState::new(ListingKind::Oneroom);
    state
        .store
        .append(Row::new(Identity::Temporary(3)))
        .expect("append");

    let position = legacy.add_row(&mut state, &BTreeMap::new()).expect("add");

    let identity = state.store.get(position).expect("row").identity();
    assert_eq!(identity.to_wire(), -4);
    assert_eq!(state.tracker.changes(), vec![PendingChange::Add(identity)]);
}

#[test]
fn delete_and_promote_follow_the_shared_contract() {
    let mut legacy = LegacyController::new();
    let mut state = ListingState::new(ListingKind::Oneroom);
    state
        .store
        .append(Row::new(Identity::Persisted(1)))
        .expect("append");
    let added = legacy.add_row(&mut state, &BTreeMap::new()).expect("add");

    assert_eq!(legacy.promote_identity(&mut state, 1, 90).expect("promote"), added);
    assert_eq!(legacy.delete_rows(&mut state, &[0, 0]).expect("delete"), 1);

    assert_eq!(
        state.tracker.changes(),
        vec![PendingChange::Delete(Identity::Persisted(1))]
    );
}
