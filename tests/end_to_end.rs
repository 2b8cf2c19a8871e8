use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::FieldBytes;
use num_bigint::BigUint;
use serde_json::json;
use sha3::{Digest, Keccak256};
use zkp_proof_of_assets::{
    attest_batch,
    circuit_input::{
        batch_range, check_commitment, layer_one_input, layer_three_input, layer_two_input,
        pubkey_x_coords_hash, Groth16Proof, SanitizedProof, DEFAULT_BLINDING_FACTOR,
    },
    ethereum::address_from_uncompressed,
    merkle::{Leaf, MerkleAccumulator},
    pedersen::{commit, format_generator},
    types::{
        parse_anonymity_set_csv, CommitmentCheck, Decimal, MerkleProofBundle, ProofOfAssetsInput,
        SignatureData, SignatureRecord,
    },
    utils::parse_decimal_biguint,
    CircomPoseidonCompressor, PoaError,
};

const KEYS: [&str; 2] = [
    "93fe0b17eeef03b57fe27af49c1dade41ea688b23108362e359e0447f1672eaa",
    "188c7f53efe3e1d5b9dd0efb2b2d859a22f82895bbe5b8384620d44dc21ea17e",
];

fn signature_data(key_hex: &str, balance: &str) -> SignatureData {
    let key_bytes = hex::decode(key_hex).unwrap();
    let signing_key = SigningKey::from_bytes(FieldBytes::from_slice(&key_bytes)).unwrap();
    let encoded = signing_key.verifying_key().as_affine().to_encoded_point(false);
    let pubkey: [u8; 64] = encoded.as_bytes()[1..].try_into().unwrap();
    let address = address_from_uncompressed(&pubkey);

    let msg_hash = Keccak256::digest(b"proof of assets attestation");
    let (sig, recid) = signing_key.sign_prehash_recoverable(&msg_hash).unwrap();
    let (r, s) = sig.split_bytes();

    SignatureData {
        signature: SignatureRecord {
            r: format!("0x{}", hex::encode(r)),
            s: format!("0x{}", hex::encode(s)),
            v: 27 + u64::from(recid.is_y_odd()),
            msghash: format!("0x{}", hex::encode(msg_hash)),
        },
        address: format!("0x{}", hex::encode(address)),
        balance: balance.to_string(),
    }
}

fn records() -> Vec<SignatureData> {
    let mut records = vec![
        signature_data(KEYS[0], "100"),
        signature_data(KEYS[1], "200n"),
    ];
    records.sort_by(|a, b| a.address.cmp(&b.address));
    records
}

fn dummy_proof() -> Groth16Proof {
    Groth16Proof {
        gamma2: json!([[["1"]]]),
        delta2: json!([[["2"]]]),
        negalfa1xbeta2: json!([[["3"]]]),
        ic: json!([[["4"]]]),
        negpa: json!([[["5"]]]),
        pb: json!([[["6"]]]),
        pc: json!([["7"]]),
    }
}

#[test]
fn test_full_pipeline() {
    let records = records();
    let json = serde_json::to_string(&records).unwrap();
    let parsed: Vec<SignatureData> = serde_json::from_str(&json).unwrap();

    let attestations = attest_batch(&parsed, true).unwrap();
    assert_eq!(attestations.len(), 2);
    assert_eq!(attestations[1].balance, BigUint::from(200u32));

    // attestations survive the file round trip and re-verification
    let file = ProofOfAssetsInput::from_attestations(&attestations);
    let file: ProofOfAssetsInput =
        serde_json::from_str(&serde_json::to_string_pretty(&file).unwrap()).unwrap();
    let attestations = file.to_attestations().unwrap();

    let csv = format!(
        "address,eth_balance\n{},100\n0x00000000219ab540356cbb839cbe05303d7705fa,40574880376960633295804796\n{},200\n",
        records[0].address, records[1].address
    );
    let entries = parse_anonymity_set_csv(&csv).unwrap();

    let c = CircomPoseidonCompressor;
    let tree = MerkleAccumulator::new(c)
        .load_leaves(&entries)
        .unwrap()
        .build(0, &BigUint::from(0u8))
        .unwrap();
    let root = tree.root().clone();
    let targets: Vec<Leaf> = attestations
        .iter()
        .map(|a| tree.find_leaf(&a.address, &a.balance).cloned().unwrap())
        .collect();
    let proven = tree.prove(&targets).unwrap();
    let bundle = MerkleProofBundle::from_proven(&proven);

    // layer one
    let range = batch_range(attestations.len(), 0, None).unwrap();
    let layer_one = layer_one_input(&attestations[range]).unwrap();
    assert_eq!(layer_one.r.len(), 2);
    assert!(layer_one.pubkey.iter().all(|p| p.len() == 2 && p[0].len() == 4));
    assert!(layer_one.msghash.iter().all(|m| m.len() == 4));

    // layer two
    let layer_two = layer_two_input(&c, &attestations, &bundle, &root, dummy_proof()).unwrap();
    assert_eq!(layer_two.merkle_root, Decimal(root.clone()));
    assert_eq!(
        layer_two.pubkey_x_coord_hash.0,
        pubkey_x_coords_hash(&c, &attestations).unwrap()
    );
    let value = serde_json::to_value(&layer_two).unwrap();
    assert_eq!(value["IC"], json!([[["4"]]]));
    assert_eq!(value["leaf_balances"], json!(["100", "200"]));

    // batch of one account
    let single = layer_two_input(&c, &attestations[1..], &bundle.slice(1, 2).unwrap(), &root, dummy_proof())
        .unwrap();
    assert_eq!(single.leaf_addresses.len(), 1);

    // layer three and the final commitment check
    let blinding = parse_decimal_biguint(DEFAULT_BLINDING_FACTOR).unwrap();
    let sanitized = SanitizedProof {
        proof: dummy_proof(),
        pub_input: vec![json!("300")],
    };
    let layer_three = layer_three_input(&[sanitized], &root, &blinding).unwrap();
    assert_eq!(layer_three.balances, vec![Decimal(BigUint::from(300u32))]);

    let limbs: Vec<Decimal> = format_generator(&commit(&BigUint::from(300u32), &blinding))
        .unwrap()
        .into_iter()
        .flatten()
        .map(Decimal)
        .collect();
    let check = CommitmentCheck {
        commitment: limbs,
        balance: Decimal(BigUint::from(300u32)),
        blinding_factor: Decimal(blinding),
    };
    assert!(check_commitment(&check).unwrap());
}

#[test]
fn test_layer_two_rejects_misaligned_batch() {
    let attestations = attest_batch(&records(), false).unwrap();
    let entries: Vec<(BigUint, BigUint)> = attestations
        .iter()
        .map(|a| (a.address.clone(), a.balance.clone()))
        .collect();

    let c = CircomPoseidonCompressor;
    let tree = MerkleAccumulator::new(c)
        .load_leaves(&entries)
        .unwrap()
        .build(0, &BigUint::from(0u8))
        .unwrap();
    let root = tree.root().clone();
    let targets = tree.leaves().to_vec();
    let bundle = MerkleProofBundle::from_proven(&tree.prove(&targets).unwrap());

    let reversed: Vec<_> = attestations.iter().rev().cloned().collect();
    let err = layer_two_input(&c, &reversed, &bundle, &root, dummy_proof()).unwrap_err();
    assert!(matches!(err, PoaError::OrderingViolation(_)));

    let err = layer_two_input(&c, &attestations[..1], &bundle, &root, dummy_proof()).unwrap_err();
    assert!(matches!(err, PoaError::OrderingViolation(_)));

    let wrong_root = &root + 1u32;
    let err = layer_two_input(&c, &attestations, &bundle, &wrong_root, dummy_proof()).unwrap_err();
    assert!(matches!(err, PoaError::ProofVerificationFailed(_)));
}

#[test]
fn test_wrong_claimed_address_stops_batch() {
    let mut records = records();
    records[0].address = records[1].address.clone();
    let err = attest_batch(&records, true).unwrap_err();
    assert!(matches!(err, PoaError::AddressMismatch { path: "ecdsa", .. }));
}

#[test]
fn test_unknown_account_has_no_leaf() {
    let attestations = attest_batch(&records(), true).unwrap();
    let entries = parse_anonymity_set_csv(
        "address,eth_balance\n0x00000000219ab540356cbb839cbe05303d7705fa,1\n",
    )
    .unwrap();
    let tree = MerkleAccumulator::new(CircomPoseidonCompressor)
        .load_leaves(&entries)
        .unwrap()
        .build(0, &BigUint::from(0u8))
        .unwrap();
    assert!(matches!(
        tree.find_leaf(&attestations[0].address, &attestations[0].balance),
        Err(PoaError::LeafNotFound { .. })
    ));
}
