// Pool generation: one randomized auction sequence per room.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::{Catalog, Player};

/// Build one auction pool from the catalog: each set's players are shuffled
/// independently (uniform permutation), then the sets are concatenated in
/// catalog order. Players whose set does not appear in any category are not
/// auctioned.
pub fn generate_pool<R: Rng>(catalog: &Catalog, rng: &mut R) -> Vec<Player> {
    let mut pool = Vec::with_capacity(catalog.players.len());
    for set in catalog.set_order() {
        let mut members: Vec<Player> = catalog
            .players
            .iter()
            .filter(|p| p.set == set)
            .cloned()
            .collect();
        members.shuffle(rng);
        pool.extend(members);
    }
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn player(id: u32, set: &str) -> Player {
        Player {
            id,
            name: format!("Player {id}"),
            role: "Batter".to_string(),
            base_price: 2_000_000,
            is_overseas: false,
            set: set.to_string(),
            previous_team: None,
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            categories: vec![
                Category {
                    name: "First".to_string(),
                    sets: vec!["S1".to_string(), "S2".to_string()],
                },
                Category {
                    name: "Second".to_string(),
                    sets: vec!["S3".to_string()],
                },
            ],
            players: vec![
                player(1, "S1"),
                player(2, "S1"),
                player(3, "S1"),
                player(4, "S2"),
                player(5, "S2"),
                player(6, "S3"),
                player(7, "orphan-set"),
            ],
        }
    }

    #[test]
    fn sets_stay_grouped_in_catalog_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = generate_pool(&catalog(), &mut rng);

        let sets: Vec<&str> = pool.iter().map(|p| p.set.as_str()).collect();
        assert_eq!(sets, vec!["S1", "S1", "S1", "S2", "S2", "S3"]);
    }

    #[test]
    fn pool_is_a_permutation_within_each_set() {
        let mut rng = StdRng::seed_from_u64(42);
        let pool = generate_pool(&catalog(), &mut rng);

        let s1: HashSet<u32> = pool[..3].iter().map(|p| p.id).collect();
        assert_eq!(s1, HashSet::from([1, 2, 3]));
        let s2: HashSet<u32> = pool[3..5].iter().map(|p| p.id).collect();
        assert_eq!(s2, HashSet::from([4, 5]));
        assert_eq!(pool[5].id, 6);
    }

    #[test]
    fn players_outside_the_set_list_are_excluded() {
        let mut rng = StdRng::seed_from_u64(0);
        let pool = generate_pool(&catalog(), &mut rng);
        assert_eq!(pool.len(), 6);
        assert!(pool.iter().all(|p| p.id != 7));
    }

    #[test]
    fn shuffle_actually_permutes() {
        // With 20 players in one set, two seeds agreeing on the full order
        // would be astronomically unlikely.
        let many = Catalog {
            categories: vec![Category {
                name: "Only".to_string(),
                sets: vec!["S".to_string()],
            }],
            players: (1..=20).map(|i| player(i, "S")).collect(),
        };

        let mut a = StdRng::seed_from_u64(1);
        let mut b = StdRng::seed_from_u64(2);
        let pool_a: Vec<u32> = generate_pool(&many, &mut a).iter().map(|p| p.id).collect();
        let pool_b: Vec<u32> = generate_pool(&many, &mut b).iter().map(|p| p.id).collect();

        assert_ne!(pool_a, pool_b);
    }
}
