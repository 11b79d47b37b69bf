use arbor_core::OrderedSet;
use arbor_core::common_tests::ordered_set_core_tests::*;
use arbor_core::common_tests::ordered_set_stress_tests::*;
use arbor_core::workload::{OperationMix, WorkloadConfig, run_trial};
use arbor_crossbeam::EpochTree;
use rstest::rstest;
use serial_test::serial;

#[test]
fn test_lifecycle() {
    let tree = EpochTree::new();
    test_single_key_lifecycle(&tree);
}

#[test]
fn test_two_child_removal() {
    let tree = EpochTree::new();
    test_remove_node_with_two_children(&tree);
}

#[test]
fn test_root_removal() {
    test_repeated_root_removal::<EpochTree>();
}

#[test]
fn test_extreme() {
    test_extreme_keys::<EpochTree>();
}

#[test]
fn test_replay() {
    test_sequential_replay_matches_btreeset::<EpochTree>();
}

#[test]
fn test_shuffled() {
    test_shuffled_insert_and_drain::<EpochTree>();
}

#[test]
fn test_disjoint_inserts() {
    test_concurrent_disjoint_inserts::<EpochTree>();
}

#[test]
fn test_concurrent_removal() {
    test_concurrent_removal_keeps_untouched_keys::<EpochTree>();
}

#[test]
#[serial(stress_tests)]
fn stress_find_during_modifications() {
    test_find_during_modifications::<EpochTree>();
}

#[test]
#[serial(stress_tests)]
fn stress_memory_ordering() {
    test_memory_ordering::<EpochTree>();
}

#[test]
#[serial(stress_tests)]
fn stress_concurrent_delete_same_value() {
    test_concurrent_delete_same_value::<EpochTree>();
}

#[test]
#[serial(stress_tests)]
fn stress_concurrent_delete_two_child_node() {
    test_concurrent_delete_two_child_node::<EpochTree>();
}

#[test]
#[serial(stress_tests)]
fn stress_linearizability() {
    test_linearizability::<EpochTree>();
}

#[test]
#[serial(stress_tests)]
fn stress_extreme_contention_single_key() {
    test_extreme_contention_single_key::<EpochTree>();
}

#[test]
#[serial(stress_tests)]
fn stress_random_mixed_operations_keysum() {
    test_random_mixed_operations_keysum::<EpochTree>();
}

#[rstest]
#[serial(stress_tests)]
#[case::balanced(0.5, 0.5)]
#[case::read_mostly(0.1, 0.1)]
#[case::remove_heavy(0.1, 0.4)]
fn trial_keeps_keysum(#[case] insert: f64, #[case] remove: f64) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let tree = EpochTree::new();
    let config = WorkloadConfig::default()
        .with_threads(8)
        .with_ops_per_thread(50_000)
        .with_key_range(2_000)
        .with_mix(OperationMix::new(insert, remove).unwrap());

    let report = run_trial(&tree, &config).unwrap();

    assert_eq!(report.totals.total_ops(), 8 * 50_000);
    assert_eq!(report.final_size, tree.size());
}
