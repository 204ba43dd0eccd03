//! Property-based tests for mapping reconciliation.
//!
//! 1. Records only ever reference terms of the reconciled result set
//! 2. Reconciliation is idempotent
//! 3. An empty selection deletes the label
//! 4. Term removal bumps the generation once and leaves no trace

mod common;

use common::{opened_store, term, StubLookup};
use maptology_core::{DataType, OntologyTerm, SearchContext, SearchResultSet, SessionStore};
use proptest::prelude::*;
use std::collections::BTreeSet;

const POOL: usize = 8;

fn uri(i: usize) -> String {
    format!("http://purl/T{i}")
}

fn pool_terms() -> Vec<OntologyTerm> {
    (0..POOL)
        .map(|i| term(&uri(i), &format!("Term {i}"), "OMIT"))
        .collect()
}

// ============================================================================
// Strategies
// ============================================================================

/// A result set: any subset of the pool, in any order.
fn result_set_strategy(label: &'static str) -> impl Strategy<Value = SearchResultSet> {
    proptest::sample::subsequence(pool_terms(), 0..=POOL)
        .prop_shuffle()
        .prop_map(move |terms| SearchResultSet::new(SearchContext::label(label), terms))
}

/// A selection that may reference URIs outside the pool.
fn selection_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    proptest::collection::btree_set(0usize..POOL + 2, 0..POOL + 2)
        .prop_map(|idx| idx.into_iter().map(uri).collect())
}

fn data_type_strategy() -> impl Strategy<Value = DataType> {
    proptest::sample::select(DataType::ALL.to_vec())
}

fn export_slice(store: &SessionStore, label: &str) -> Vec<String> {
    store
        .export_records()
        .iter()
        .filter(|r| r.is_for_label(label))
        .map(|r| r.term_uri.clone())
        .collect()
}

// ============================================================================
// Reconciliation
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn records_are_the_projection_of_the_selection(
        results in result_set_strategy("sex"),
        selected in selection_strategy(),
        data_type in data_type_strategy(),
    ) {
        let mut store = SessionStore::new();
        store.reconcile_column_mapping("sex", &selected, &results, data_type);

        let expected: Vec<String> = results
            .terms
            .iter()
            .filter(|t| selected.contains(&t.term_uri))
            .map(|t| t.term_uri.clone())
            .collect();
        prop_assert_eq!(export_slice(&store, "sex"), expected.clone());

        match store.column_mapping("sex") {
            Some(mapping) => {
                prop_assert!(!expected.is_empty());
                for record in &mapping.records {
                    prop_assert!(results.contains(&record.term_uri));
                    prop_assert_eq!(record.data_type, data_type);
                }
                for uri in &mapping.selected_term_uris {
                    prop_assert!(results.contains(uri));
                }
            }
            None => prop_assert!(expected.is_empty()),
        }
    }

    #[test]
    fn reconciliation_is_idempotent(
        results in result_set_strategy("sex"),
        selected in selection_strategy(),
        other in selection_strategy(),
        data_type in data_type_strategy(),
    ) {
        let mut store = SessionStore::new();
        let other_results = SearchResultSet::new(SearchContext::label("age"), pool_terms());
        store.reconcile_column_mapping("age", &other, &other_results, DataType::Integer);

        store.reconcile_column_mapping("sex", &selected, &results, data_type);
        let mapping = store.column_mapping("sex").cloned();
        let records = store.export_records().to_vec();

        store.reconcile_column_mapping("sex", &selected, &results, data_type);
        prop_assert_eq!(store.column_mapping("sex").cloned(), mapping);
        prop_assert_eq!(store.export_records().to_vec(), records);
    }

    #[test]
    fn empty_selection_deletes_the_label(
        results in result_set_strategy("sex"),
        selected in selection_strategy(),
    ) {
        let mut store = SessionStore::new();
        store.reconcile_column_mapping("sex", &selected, &results, DataType::String);
        store.reconcile_column_mapping("sex", &BTreeSet::new(), &results, DataType::String);

        prop_assert!(store.column_mapping("sex").is_none());
        prop_assert!(export_slice(&store, "sex").is_empty());
    }

    #[test]
    fn other_labels_are_untouched(
        first in selection_strategy(),
        second in selection_strategy(),
        results in result_set_strategy("sex"),
    ) {
        let mut store = SessionStore::new();
        let site = SearchResultSet::new(SearchContext::label("site"), pool_terms());
        store.reconcile_column_mapping("site", &first, &site, DataType::String);
        let before = export_slice(&store, "site");

        store.reconcile_column_mapping("sex", &second, &results, DataType::String);
        prop_assert_eq!(export_slice(&store, "site"), before);
    }
}

// ============================================================================
// Removal
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn removing_a_term_leaves_no_trace(
        selected in proptest::collection::btree_set(0usize..POOL, 0..POOL),
        target_idx in 0usize..POOL,
        while_away in any::<bool>(),
    ) {
        let lookup = StubLookup::new().with("sex", pool_terms());
        let mut store = opened_store(&lookup, &["OMIT"]);
        for i in &selected {
            store.toggle_column_term(&uri(*i), true);
        }
        if while_away {
            store.navigate_to_column(&lookup, "age").unwrap();
        }

        let ctx = SearchContext::label("sex");
        let before = store.generation(&ctx);
        let target = uri(target_idx);
        store.remove_term_from_label("sex", &target);

        prop_assert_eq!(store.generation(&ctx), before + 1);
        prop_assert!(!export_slice(&store, "sex").contains(&target));
        if let Some(mapping) = store.column_mapping("sex") {
            prop_assert!(!mapping.selected_term_uris.contains(&target));
            prop_assert!(mapping.records.iter().all(|r| r.term_uri != target));
        }
        if while_away {
            let nav = store.navigation_state("sex").unwrap();
            prop_assert!(!nav.selected_terms.contains(&target));
        } else {
            prop_assert!(!store.selected_terms().contains(&target));
        }

        let remaining = selected.len() - usize::from(selected.contains(&target_idx));
        prop_assert_eq!(export_slice(&store, "sex").len(), remaining);
    }
}
