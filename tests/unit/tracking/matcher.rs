use super::*;
use crate::tracking::features::DESCRIPTOR_LEN;

fn unit(i: usize) -> Descriptor {
    let mut d = [0.0; DESCRIPTOR_LEN];
    d[i] = 1.0;
    d
}

#[test]
fn distinctive_match_is_kept() {
    let train = vec![unit(0), unit(1), unit(2)];
    let mut q = unit(1);
    q[0] = 0.05;
    let m = ratio_matches(&[q], &train, DEFAULT_RATIO);
    assert_eq!(m.len(), 1);
    assert_eq!(m[0].query, 0);
    assert_eq!(m[0].train, 1);
    assert!(m[0].distance < 0.1);
}

#[test]
fn ambiguous_match_is_dropped() {
    let train = vec![unit(0), unit(1)];
    let mut q = [0.0; DESCRIPTOR_LEN];
    q[0] = 0.5;
    q[1] = 0.5;
    assert!(ratio_matches(&[q], &train, DEFAULT_RATIO).is_empty());
}

#[test]
fn duplicate_train_descriptors_fail_the_ratio_test() {
    let train = vec![unit(3), unit(3)];
    assert!(ratio_matches(&[unit(3)], &train, DEFAULT_RATIO).is_empty());
}

#[test]
fn needs_two_train_descriptors() {
    assert!(ratio_matches(&[unit(0)], &[unit(0)], DEFAULT_RATIO).is_empty());
    assert!(ratio_matches(&[], &[unit(0), unit(1)], DEFAULT_RATIO).is_empty());
}

#[test]
fn output_is_in_query_order() {
    let train: Vec<Descriptor> = (0..8).map(unit).collect();
    let query: Vec<Descriptor> = (0..8).rev().map(unit).collect();
    let m = ratio_matches(&query, &train, DEFAULT_RATIO);
    assert_eq!(m.len(), 8);
    for (i, mm) in m.iter().enumerate() {
        assert_eq!(mm.query, i);
        assert_eq!(mm.train, 7 - i);
    }
}
