use sheetdesk::{AppState, CellChange, CellValue, DeskError, Grid, ViewQuery, parse_grid};

fn catalogue() -> Grid {
    let rows: Vec<Vec<&str>> = vec![
        vec!["", "", "Pricing", ""],
        vec!["SKU", "Brand", "Price", "Size"],
        vec!["a1", "Febreze", "5", "S"],
        vec!["a2", "Ariel", "10", "M"],
        vec!["a3", "Febreze", "", "S"],
    ];
    rows.into_iter()
        .map(|r| r.into_iter().map(CellValue::from).collect())
        .collect()
}

fn loaded() -> AppState {
    let mut state = AppState::default();
    state.load_grid(&catalogue());
    state
}

// Helper function to check a cell of the live row at `position`
fn assert_cell(state: &AppState, position: usize, column: &str, expected: &str) {
    let row = &state.dataset().rows()[position];
    assert_eq!(
        row.text(column),
        expected,
        "row {} column {} should be {:?}",
        position,
        column,
        expected
    );
}

#[test]
fn reload_is_idempotent() {
    let first = parse_grid(&catalogue());
    let second = parse_grid(&catalogue());
    assert_eq!(first, second);

    let mut state = AppState::default();
    state.load_grid(&catalogue());
    let rows_once: Vec<_> = state.dataset().rows().iter().map(|r| (**r).clone()).collect();
    state.load_grid(&catalogue());
    let rows_twice: Vec<_> = state.dataset().rows().iter().map(|r| (**r).clone()).collect();
    assert_eq!(rows_once, rows_twice);
    assert_eq!(state.column_metadata()[2].group, "Pricing");
}

#[test]
fn snapshot_survives_every_mutator() {
    let mut state = loaded();
    let before = state.dataset().snapshot().to_vec();

    state.update_cell(0, "Brand", "Tide".into()).unwrap();
    state
        .bulk_update(&[CellChange::new(1, "Price", "11"), CellChange::new(2, "Size", "L")])
        .unwrap();
    state.delete_row(1).unwrap();
    state.apply_to_filtered("Size", "XL".into()).unwrap();

    assert_eq!(state.dataset().snapshot(), before.as_slice());
}

#[test]
fn history_keeps_only_the_last_fifty_steps() {
    let mut state = loaded();
    for i in 0..60 {
        state.update_cell(0, "Price", CellValue::from(i.to_string())).unwrap();
    }
    assert_eq!(state.dataset().history_len(), 50);

    let mut undone = 0;
    while state.undo() {
        undone += 1;
    }
    assert_eq!(undone, 50);
    // The ten oldest states are gone, so the original "5" is unreachable
    assert_cell(&state, 0, "Price", "9");
}

#[test]
fn undo_restores_exactly_one_cell() {
    let mut state = loaded();
    state.update_cell(1, "Brand", "Persil".into()).unwrap();
    assert_cell(&state, 1, "Brand", "Persil");

    assert!(state.undo());
    assert_cell(&state, 1, "Brand", "Ariel");
    assert_cell(&state, 1, "Price", "10");
    assert_cell(&state, 0, "Brand", "Febreze");
    assert!(!state.undo(), "history should now be empty");
}

#[test]
fn bulk_update_undoes_as_a_unit() {
    let mut state = loaded();
    state
        .bulk_update(&[
            CellChange::new(0, "Size", "XL"),
            CellChange::new(1, "Size", "XL"),
            CellChange::new(2, "Size", "XL"),
        ])
        .unwrap();
    assert_eq!(state.dataset().history_len(), 1);

    state.undo();
    assert_cell(&state, 0, "Size", "S");
    assert_cell(&state, 1, "Size", "M");
    assert_cell(&state, 2, "Size", "S");
}

#[test]
fn delete_shifts_positions_and_undo_brings_row_back() {
    let mut state = loaded();
    state.delete_row(0).unwrap();
    assert_eq!(state.dataset().len(), 2);
    assert_cell(&state, 0, "SKU", "a2");
    assert_eq!(state.dataset().rows()[0].row_index, 1);

    state.undo();
    assert_eq!(state.dataset().len(), 3);
    assert_cell(&state, 0, "SKU", "a1");
}

#[test]
fn out_of_bounds_edit_is_rejected_without_history() {
    let mut state = loaded();
    let err = state.update_cell(3, "Brand", "x".into()).unwrap_err();
    assert!(matches!(err, DeskError::InvalidIndex { index: 3, len: 3 }));
    assert!(state.delete_row(10).is_err());
    assert!(!state.can_undo());
}

#[test]
fn change_detection_uses_stringified_values() {
    let mut state = loaded();
    // Same text, different variant: not a change
    state.update_cell(0, "Price", CellValue::Number(5.0)).unwrap();
    assert!(!state.dataset().is_changed(0));

    state.update_cell(0, "Price", "6".into()).unwrap();
    assert!(state.dataset().is_changed(0));
    assert!(!state.dataset().is_changed(1));
}

#[test]
fn loading_resets_view_inputs_but_keeps_assets() {
    let mut state = loaded();
    state.set_search_query("ariel");
    state.toggle_filter_value("Size", "M");
    state.set_show_only_changed(true);
    state.merge_assets(vec![("a1.png".to_string(), "/uploads/a1.png".to_string())]);
    state.update_cell(0, "Size", "L".into()).unwrap();

    state.load_grid(&catalogue());
    assert_eq!(state.query(), &ViewQuery::default());
    assert!(!state.can_undo());
    assert_eq!(state.assets().len(), 1);
}

#[test]
fn empty_grid_loads_as_empty_dataset() {
    let mut state = loaded();
    let parsed = state.load_grid(&[]);
    assert!(parsed.is_empty());
    assert!(state.dataset().is_empty());
    assert!(state.view().is_empty());
}
