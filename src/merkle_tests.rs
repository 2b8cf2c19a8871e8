#[cfg(test)]
mod tests {
    use crate::error::{PoaError, Result};
    use crate::merkle::{
        build_tree, check_address_ordering, ensure_strictly_ascending, generate_proof, hash_leaf,
        verify_proof, Leaf, MerkleAccumulator,
    };
    use crate::utils::{Compressor, PoseidonCompressor};
    use num_bigint::BigUint;

    /// Cheap, order-sensitive compressor for structural tests.
    struct AffineCompressor;

    impl Compressor for AffineCompressor {
        fn compress(&self, left: &BigUint, right: &BigUint) -> Result<BigUint> {
            Ok(left * 3u32 + right * 7u32 + 1u32)
        }
    }

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn entries(pairs: &[(u64, u64)]) -> Vec<(BigUint, BigUint)> {
        pairs.iter().map(|&(a, b)| (big(a), big(b))).collect()
    }

    #[test]
    fn test_end_to_end_three_accounts() {
        let c = PoseidonCompressor;
        let tree = MerkleAccumulator::new(c)
            .load_leaves(&entries(&[(10, 100), (20, 200), (30, 300)]))
            .unwrap()
            .build(3, &big(1))
            .unwrap();

        assert_eq!(tree.height(), 3);
        assert_eq!(tree.levels()[0].len(), 4);

        let leaf = hash_leaf(&c, &big(20), &big(200)).unwrap();
        let proof = tree.proof_for(&leaf).unwrap();
        assert_eq!(proof.path_elements.len(), 2);
        assert_eq!(proof.path_indices.len(), 2);
        assert!(verify_proof(&c, tree.root(), &proof));

        let mut forged = proof.clone();
        forged.leaf = hash_leaf(&c, &big(20), &big(201)).unwrap();
        assert!(!verify_proof(&c, tree.root(), &forged));
    }

    #[test]
    fn test_round_trip_every_leaf() {
        let pairs: Vec<(u64, u64)> = (1..=13).map(|i| (i * 1000, i * 7)).collect();
        let tree = MerkleAccumulator::new(PoseidonCompressor)
            .load_leaves(&entries(&pairs))
            .unwrap()
            .build(0, &big(0))
            .unwrap();
        assert_eq!(tree.height(), 5);

        let targets = tree.leaves().to_vec();
        let proven = tree.prove(&targets).unwrap();
        assert_eq!(proven.proofs().len(), 13);
        for proof in proven.proofs() {
            assert!(proven.tree().verify(proof));
        }
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let pairs = entries(&[(1, 2), (3, 4), (5, 6), (7, 8), (9, 10)]);
        let par = MerkleAccumulator::new(AffineCompressor)
            .load_leaves(&pairs)
            .unwrap()
            .build(4, &big(0))
            .unwrap();
        let seq = MerkleAccumulator::new(AffineCompressor)
            .with_parallel(false)
            .load_leaves(&pairs)
            .unwrap()
            .build(4, &big(0))
            .unwrap();
        assert_eq!(par.levels(), seq.levels());
    }

    #[test]
    fn test_bottom_level_sorted_and_padded() {
        let hashes = vec![big(9), big(4), big(7)];
        let levels = build_tree(&AffineCompressor, &hashes, 3, &big(5), false).unwrap();
        assert_eq!(levels[0], vec![big(4), big(5), big(7), big(9)]);
        assert_eq!(levels[1], vec![big(4 * 3 + 5 * 7 + 1), big(7 * 3 + 9 * 7 + 1)]);
        assert_eq!(levels[2].len(), 1);
    }

    #[test]
    fn test_auto_height() {
        let one = build_tree(&AffineCompressor, &[big(1)], 0, &big(0), false).unwrap();
        assert_eq!(one.len(), 1);
        let two = build_tree(&AffineCompressor, &[big(1), big(2)], 0, &big(0), false).unwrap();
        assert_eq!(two.len(), 2);
        let five: Vec<BigUint> = (0..5).map(big).collect();
        let levels = build_tree(&AffineCompressor, &five, 0, &big(0), false).unwrap();
        assert_eq!(levels.len(), 4);
    }

    #[test]
    fn test_height_too_small() {
        let hashes: Vec<BigUint> = (0..5).map(big).collect();
        let err = build_tree(&AffineCompressor, &hashes, 3, &big(0), false).unwrap_err();
        assert_eq!(err, PoaError::HeightTooSmall { height: 3, leaves: 5 });
    }

    #[test]
    fn test_empty_leaves_rejected() {
        let err = build_tree(&AffineCompressor, &[], 3, &big(0), false).unwrap_err();
        assert!(matches!(err, PoaError::InvalidInput(_)));
    }

    #[test]
    fn test_leaf_not_found() {
        let levels = build_tree(&AffineCompressor, &[big(1), big(2)], 2, &big(0), false).unwrap();
        let err = generate_proof(&AffineCompressor, &levels, &big(3)).unwrap_err();
        assert!(matches!(err, PoaError::LeafNotFound { .. }));
    }

    #[test]
    fn test_corrupted_inner_node_fails_self_check() {
        let mut levels =
            build_tree(&AffineCompressor, &[big(1), big(2), big(3), big(4)], 3, &big(0), false)
                .unwrap();
        levels[1][1] += 1u32;
        let err = generate_proof(&AffineCompressor, &levels, &big(1)).unwrap_err();
        assert!(matches!(err, PoaError::ProofVerificationFailed(_)));
    }

    #[test]
    fn test_malformed_levels_are_rejected() {
        let c = AffineCompressor;
        let levels = build_tree(&c, &[big(1), big(2), big(3), big(4)], 3, &big(0), false).unwrap();

        let mut odd = levels.clone();
        odd[0].pop();
        assert!(matches!(
            generate_proof(&c, &odd, &big(1)),
            Err(PoaError::InvalidInput(_))
        ));

        let mut no_root = levels.clone();
        no_root[2].clear();
        assert!(matches!(
            generate_proof(&c, &no_root, &big(1)),
            Err(PoaError::InvalidInput(_))
        ));

        assert!(matches!(
            generate_proof(&c, &[], &big(1)),
            Err(PoaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_path_indices_follow_position() {
        let levels =
            build_tree(&AffineCompressor, &[big(1), big(2), big(3), big(4)], 3, &big(0), false)
                .unwrap();
        let proof = generate_proof(&AffineCompressor, &levels, &big(3)).unwrap();
        // position 2: left child at level 0, right child at level 1
        assert_eq!(proof.path_indices, vec![0, 1]);
        assert_eq!(proof.path_elements[0], big(4));
        assert_eq!(proof.path_elements[1], levels[1][0]);
    }

    #[test]
    fn test_tampered_element_fails() {
        let c = PoseidonCompressor;
        let levels = build_tree(&c, &[big(11), big(22), big(33)], 3, &big(0), false).unwrap();
        let root = levels[2][0].clone();
        let proof = generate_proof(&c, &levels, &big(22)).unwrap();

        let mut tampered = proof.clone();
        tampered.path_elements[1] ^= big(1);
        assert!(!verify_proof(&c, &root, &tampered));

        let mut flipped = proof.clone();
        flipped.path_indices[0] ^= 1;
        assert!(!verify_proof(&c, &root, &flipped));
    }

    #[test]
    fn test_malformed_proofs_are_false_not_errors() {
        let c = AffineCompressor;
        let levels = build_tree(&c, &[big(1), big(2)], 2, &big(0), false).unwrap();
        let root = levels[1][0].clone();
        let proof = generate_proof(&c, &levels, &big(1)).unwrap();

        let mut short = proof.clone();
        short.path_indices.clear();
        assert!(!verify_proof(&c, &root, &short));

        let mut bad_index = proof.clone();
        bad_index.path_indices[0] = 2;
        assert!(!verify_proof(&c, &root, &bad_index));

        assert!(!verify_proof(&c, &(root + 1u32), &proof));
    }

    #[test]
    fn test_ordering_checks() {
        assert!(matches!(
            ensure_strictly_ascending(&[big(5), big(3), big(7)]),
            Err(PoaError::OrderingViolation(_))
        ));
        assert!(matches!(
            ensure_strictly_ascending(&[big(3), big(3), big(7)]),
            Err(PoaError::OrderingViolation(_))
        ));
        assert!(ensure_strictly_ascending(&[big(3), big(5), big(7)]).is_ok());
        assert!(ensure_strictly_ascending(&[]).is_ok());
    }

    #[test]
    fn test_check_address_ordering_pairs_with_leaves() {
        let leaf = |a: u64| Leaf {
            address: big(a),
            balance: big(0),
            hash: big(0),
        };
        let leaves = vec![leaf(3), leaf(5), leaf(7)];

        assert!(check_address_ordering(&[big(3), big(5), big(7)], &leaves).is_ok());
        assert!(check_address_ordering(&[big(3), big(5)], &leaves).is_err());
        assert!(check_address_ordering(&[big(3), big(6), big(7)], &leaves).is_err());

        let unsorted = vec![leaf(5), leaf(3), leaf(7)];
        assert!(matches!(
            check_address_ordering(&[big(5), big(3), big(7)], &unsorted),
            Err(PoaError::OrderingViolation(_))
        ));
    }

    #[test]
    fn test_find_leaf_and_missing_proof() {
        let tree = MerkleAccumulator::new(AffineCompressor)
            .load_leaves(&entries(&[(10, 100), (20, 200)]))
            .unwrap()
            .build(2, &big(0))
            .unwrap();
        let leaf = tree.find_leaf(&big(20), &big(200)).unwrap();
        assert_eq!(leaf.hash, big(20 * 3 + 200 * 7 + 1));
        assert!(tree.find_leaf(&big(20), &big(201)).is_err());

        let missing = Leaf {
            address: big(99),
            balance: big(1),
            hash: big(123456),
        };
        assert!(matches!(
            tree.prove(&[missing]),
            Err(PoaError::LeafNotFound { .. })
        ));
    }
}
