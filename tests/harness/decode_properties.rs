use std::sync::OnceLock;

use meshverify::certificate::{self, PublicKeyAlgorithm};
use meshverify::errors::DecodeError;
use proptest::prelude::*;

use super::support::ecdsa_pem;

fn fixture_pem() -> &'static str {
    static PEM: OnceLock<String> = OnceLock::new();
    PEM.get_or_init(|| ecdsa_pem("server.echo.svc.cluster.local"))
}

proptest! {
    #[test]
    fn decode_never_panics_on_arbitrary_bytes(raw in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let _ = certificate::decode(&raw);
    }

    #[test]
    fn decode_rejects_garbage_between_markers(body in "[A-Za-z0-9+/=\n]{0,512}") {
        let raw = format!("-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n", body);
        let result = certificate::decode(raw.as_bytes());
        prop_assert!(result.is_err());
    }

    #[test]
    fn decode_ignores_surrounding_transcript_text(
        before in "[a-zA-Z0-9 :=,./\n]{0,256}",
        after in "[a-zA-Z0-9 :=,./\n]{0,256}",
    ) {
        let raw = format!("{}\n{}{}", before, fixture_pem(), after);
        let cert = certificate::decode(raw.as_bytes()).unwrap();
        prop_assert_eq!(cert.public_key_algorithm, PublicKeyAlgorithm::Ecdsa);
        prop_assert_eq!(cert.dns_names, vec!["server.echo.svc.cluster.local".to_string()]);
    }
}

#[test]
fn decode_without_block_is_malformed() {
    let transcript = b"CONNECTED(00000003)\nno peer certificate available\n";
    assert!(matches!(
        certificate::decode(transcript),
        Err(DecodeError::MalformedInput { .. })
    ));
}
