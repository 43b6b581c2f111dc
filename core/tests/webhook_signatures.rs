//! Randomized checks of webhook signature verification.
//!
//! Signatures are produced independently of the validator (through the
//! `hmac` primitives the sender would use) and checked with the public
//! `verify` function.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use neofin::{verify, WebhookValidator};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;

const ROUNDS: usize = 1000;

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

fn random_secret(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(1..64);
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn random_body(rng: &mut impl Rng) -> Vec<u8> {
    let len = rng.gen_range(1..512);
    (0..len).map(|_| rng.gen::<u8>()).collect()
}

#[test]
fn same_secret_verifies_and_other_secret_does_not() {
    let mut rng = rand::thread_rng();
    for _ in 0..ROUNDS {
        let body = random_body(&mut rng);
        let secret = random_secret(&mut rng);
        let mut other = random_secret(&mut rng);
        while other == secret {
            other = random_secret(&mut rng);
        }

        let signature = sign(&secret, &body);
        assert!(verify(&body, &signature, &secret), "secret {secret:?}");
        assert!(!verify(&body, &sign(&other, &body), &secret), "secret {secret:?}");
    }
}

#[test]
fn validator_and_free_function_agree() {
    let mut rng = rand::thread_rng();
    for _ in 0..100 {
        let body = random_body(&mut rng);
        let secret = random_secret(&mut rng);
        let validator = WebhookValidator::new(&secret).unwrap();
        let signature = validator.sign(&body);
        assert_eq!(signature, sign(&secret, &body));
        assert!(validator.is_valid(&body, &signature));
    }
}

#[test]
fn flipping_any_signature_bit_fails() {
    let body = br#"{"event":"payments/created","amount":15000}"#;
    let secret = "test_secret_key";
    let digest = STANDARD.decode(sign(secret, body)).unwrap();

    for byte in 0..digest.len() {
        for bit in 0..8 {
            let mut tampered = digest.clone();
            tampered[byte] ^= 1 << bit;
            assert!(!verify(body, &STANDARD.encode(&tampered), secret));
        }
    }
}

#[test]
fn rejects_degenerate_inputs() {
    let body = b"{}";
    let signature = sign("secret", body);
    assert!(!verify(b"", &signature, "secret"));
    assert!(!verify(body, "", "secret"));
    assert!(!verify(body, "%%%", "secret"));
    assert!(!verify(body, &signature, ""));
}
