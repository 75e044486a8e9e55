use cleft_transform::selector::RandomSelector;
use cleft_utils::Ratio;
use std::collections::HashSet;

#[test]
fn test_half_ratio_accepts_about_half() {
    let mut selector = RandomSelector::from_seed(2024);
    let ratio = Ratio::new(0.5).unwrap();
    let accepted = (0..10_000).filter(|_| selector.should_apply(ratio)).count();
    assert!((4_500..=5_500).contains(&accepted), "accepted {accepted}");
}

#[test]
fn test_pick_one_reaches_every_candidate() {
    let mut selector = RandomSelector::from_seed(3);
    let candidates = ["a", "b", "c", "d"];
    let seen: HashSet<_> = (0..200)
        .map(|_| *selector.pick_one(&candidates).unwrap())
        .collect();
    assert_eq!(seen.len(), candidates.len());
}

#[test]
fn test_same_seed_same_decisions() {
    let ratio = Ratio::new(0.3).unwrap();
    let mut a = RandomSelector::from_seed(11);
    let mut b = RandomSelector::from_seed(11);
    let first: Vec<bool> = (0..64).map(|_| a.should_apply(ratio)).collect();
    let second: Vec<bool> = (0..64).map(|_| b.should_apply(ratio)).collect();
    assert_eq!(first, second);
}
