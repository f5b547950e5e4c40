//! Property tests for package sizing and integrity.

use proptest::prelude::*;
use psess::codec::crypto::{AeadCipher, KeyMaterial, KeyPair, OsEntropy, KEY_SIZE};
use psess::codec::package::{
    decode_data, decode_greeting, decode_response, decode_stop, encode_data, encode_greeting,
    encode_response, encode_stop,
};
use psess::codec::sizing::{
    data_package_size, greeting_package_size, plain_package_size, response_package_size,
    stop_package_size,
};
use psess::codec::{open_plain, seal_plain, Package, SessionId, HEADER_SIZE, SESSION_ID_BYTES};
use psess::PsError;

fn cipher() -> AeadCipher {
    AeadCipher::new(KeyMaterial::new(vec![0x24; KEY_SIZE])).unwrap()
}

/// Copy of `bytes` with one bit flipped somewhere after the header
fn flip_after_header(bytes: &[u8], pick: prop::sample::Index, bit: u8) -> Vec<u8> {
    let mut tampered = bytes.to_vec();
    let index = HEADER_SIZE + pick.index(tampered.len() - HEADER_SIZE);
    tampered[index] ^= 1 << bit;
    tampered
}

fn is_crypto<T>(result: &Result<T, PsError>) -> bool {
    matches!(result, Err(PsError::Crypto(_)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn plain_buffer_of_exact_size_is_enough(payload in prop::collection::vec(any::<u8>(), 0..512)) {
        let sender = KeyPair::generate(&mut OsEntropy).unwrap();
        let recipient = KeyPair::generate(&mut OsEntropy).unwrap();
        let required = plain_package_size(payload.len()).unwrap();

        let mut short = vec![0u8; required - 1];
        let mut package = Package::new(&payload, &mut short);
        let err = seal_plain(&mut OsEntropy, &sender, recipient.public_key(), &mut package).unwrap_err();
        let is_too_small = matches!(err, PsError::OutputTooSmall { .. });
        prop_assert!(is_too_small);

        let mut exact = vec![0u8; required];
        let mut package = Package::new(&payload, &mut exact);
        seal_plain(&mut OsEntropy, &sender, recipient.public_key(), &mut package).unwrap();
        prop_assert!(package.written() <= required);

        let opened = open_plain(&recipient, package.as_bytes()).unwrap();
        prop_assert_eq!(opened.sender, *sender.public_key());
        prop_assert_eq!(opened.payload.as_slice(), payload.as_slice());
    }

    #[test]
    fn greeting_carries_id_and_payload(
        id in prop::collection::vec(any::<u8>(), 1..64),
        payload in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let endpoint = KeyPair::generate(&mut OsEntropy).unwrap();
        let manager = KeyPair::generate(&mut OsEntropy).unwrap();
        let mut out = vec![0u8; greeting_package_size(id.len(), payload.len()).unwrap()];
        let mut package = Package::new(&payload, &mut out);
        encode_greeting(&mut OsEntropy, &endpoint, manager.public_key(), &id, &mut package).unwrap();

        let greeting = decode_greeting(&manager, package.as_bytes()).unwrap();
        prop_assert_eq!(greeting.endpoint_id, id);
        prop_assert_eq!(greeting.payload.as_slice(), payload.as_slice());
        prop_assert_eq!(greeting.endpoint_public, *endpoint.public_key());
    }

    #[test]
    fn data_buffer_boundary(payload in prop::collection::vec(any::<u8>(), 0..512), seq in 1u64..) {
        let key = cipher();
        let sid = SessionId::from_random([7u8; SESSION_ID_BYTES]);
        let required = data_package_size(SESSION_ID_BYTES, payload.len()).unwrap();

        let mut short = vec![0u8; required - 1];
        let mut package = Package::new(&payload, &mut short);
        let too_small = matches!(
            encode_data(&mut OsEntropy, &key, &sid, seq, &mut package),
            Err(PsError::OutputTooSmall { .. })
        );
        prop_assert!(too_small);

        let mut exact = vec![0u8; required];
        let mut package = Package::new(&payload, &mut exact);
        encode_data(&mut OsEntropy, &key, &sid, seq, &mut package).unwrap();

        let data = decode_data(&key, package.as_bytes()).unwrap();
        prop_assert_eq!(data.seq, seq);
        prop_assert_eq!(data.session_id, sid);
        prop_assert_eq!(data.payload.as_slice(), payload.as_slice());
    }

    #[test]
    fn any_flipped_bit_in_data_is_detected(
        payload in prop::collection::vec(any::<u8>(), 0..128),
        pick in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = cipher();
        let sid = SessionId::from_random([9u8; SESSION_ID_BYTES]);
        let mut out = vec![0u8; data_package_size(SESSION_ID_BYTES, payload.len()).unwrap()];
        let mut package = Package::new(&payload, &mut out);
        encode_data(&mut OsEntropy, &key, &sid, 1, &mut package).unwrap();

        let tampered = flip_after_header(package.as_bytes(), pick, bit);
        prop_assert!(is_crypto(&decode_data(&key, &tampered)));
    }

    #[test]
    fn any_flipped_bit_in_stop_is_detected(
        payload in prop::collection::vec(any::<u8>(), 0..128),
        pick in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = cipher();
        let sid = SessionId::from_random([9u8; SESSION_ID_BYTES]);
        let mut out = vec![0u8; stop_package_size(SESSION_ID_BYTES, payload.len()).unwrap()];
        let mut package = Package::new(&payload, &mut out);
        encode_stop(&mut OsEntropy, &key, &sid, 1, 2, &mut package).unwrap();

        let tampered = flip_after_header(package.as_bytes(), pick, bit);
        prop_assert!(is_crypto(&decode_stop(&key, &tampered)));
    }

    #[test]
    fn any_flipped_bit_in_plain_is_detected(
        payload in prop::collection::vec(any::<u8>(), 0..128),
        pick in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let sender = KeyPair::generate(&mut OsEntropy).unwrap();
        let recipient = KeyPair::generate(&mut OsEntropy).unwrap();
        let mut out = vec![0u8; plain_package_size(payload.len()).unwrap()];
        let mut package = Package::new(&payload, &mut out);
        seal_plain(&mut OsEntropy, &sender, recipient.public_key(), &mut package).unwrap();

        let tampered = flip_after_header(package.as_bytes(), pick, bit);
        prop_assert!(is_crypto(&open_plain(&recipient, &tampered)));
    }

    #[test]
    fn any_flipped_bit_in_handshake_is_detected(
        payload in prop::collection::vec(any::<u8>(), 0..128),
        greeting_pick in any::<prop::sample::Index>(),
        response_pick in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let endpoint = KeyPair::generate(&mut OsEntropy).unwrap();
        let manager = KeyPair::generate(&mut OsEntropy).unwrap();
        let response_key = KeyPair::generate(&mut OsEntropy).unwrap();
        let sid = SessionId::from_random([5u8; SESSION_ID_BYTES]);

        let mut out = vec![0u8; greeting_package_size(6, payload.len()).unwrap()];
        let mut package = Package::new(&payload, &mut out);
        let binding =
            encode_greeting(&mut OsEntropy, &endpoint, manager.public_key(), b"dev-01", &mut package)
                .unwrap();
        let tampered = flip_after_header(package.as_bytes(), greeting_pick, bit);
        prop_assert!(is_crypto(&decode_greeting(&manager, &tampered)));

        let mut out = vec![0u8; response_package_size(SESSION_ID_BYTES, payload.len()).unwrap()];
        let mut package = Package::new(&payload, &mut out);
        encode_response(
            &mut OsEntropy,
            &manager,
            endpoint.public_key(),
            &binding,
            &sid,
            response_key.public_key(),
            &mut package,
        )
        .unwrap();
        let tampered = flip_after_header(package.as_bytes(), response_pick, bit);
        prop_assert!(is_crypto(&decode_response(
            &endpoint,
            manager.public_key(),
            &binding,
            &tampered
        )));
    }
}
