use mlip_core::Structure;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

/// 候选构型数超过上限时，用固定种子均匀抽取 `max` 个
///
/// 抽中的构型保持输入中的相对顺序，因此同样顺序的输入在任意次运行中
/// 得到完全相同的子集。
pub fn cap_candidates(candidates: Vec<Structure>, max: usize, seed: u64) -> Vec<Structure> {
    if candidates.len() <= max {
        return candidates;
    }

    let total = candidates.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, total, max).into_vec();
    picked.sort_unstable();

    let mut slots: Vec<Option<Structure>> = candidates.into_iter().map(Some).collect();
    let capped: Vec<Structure> = picked
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect();

    info!("候选构型 {total} 个超过上限 {max}，随机抽取 {} 个", capped.len());
    capped
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlip_testing_utils::{index_of, structures};

    #[test]
    fn test_under_cap_is_unchanged() {
        let input = structures(0, 5);
        assert_eq!(cap_candidates(input.clone(), 5, 7), input);
        assert_eq!(cap_candidates(input.clone(), 100, 7), input);
        assert!(cap_candidates(Vec::new(), 3, 7).is_empty());
    }

    #[test]
    fn test_capping_is_deterministic() {
        let input = structures(0, 50);
        let first = cap_candidates(input.clone(), 8, 42);
        for _ in 0..5 {
            assert_eq!(cap_candidates(input.clone(), 8, 42), first);
        }
        assert_eq!(first.len(), 8);

        let indices: Vec<usize> = first.iter().filter_map(index_of).collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(indices, sorted);
    }

    #[test]
    fn test_different_seed_changes_subset() {
        let input = structures(0, 200);
        let a = cap_candidates(input.clone(), 10, 1);
        let b = cap_candidates(input, 10, 2);
        assert_ne!(a, b);
    }
}
