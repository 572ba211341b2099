use pki_types::{CertificateDer, DnsName};
use proptest::prelude::*;

use super::base::{Payload, PayloadU16};
use super::codec::{Codec, Reader};
use super::enums::{Compression, ExtensionType};
use super::handshake::{
    CertificatePayloadTls13, ClientExtension, ClientHelloPayload, ConvertServerNameList,
    HandshakeMessagePayload, HandshakePayload, HelloRetryExtension, HelloRetryRequest,
    KeyShareEntry, Random, ServerExtension, ServerNamePayload, SessionId,
    HELLO_RETRY_REQUEST_RANDOM,
};
use crate::enums::{CipherSuite, HandshakeType, NamedGroup, ProtocolVersion, SignatureScheme};
use crate::error::InvalidMessage;

/// Wrap `body` in a handshake header of type `typ`.
fn handshake(typ: u8, body: &[u8]) -> Vec<u8> {
    let len = body.len();
    let mut out = vec![typ, (len >> 16) as u8, (len >> 8) as u8, len as u8];
    out.extend_from_slice(body);
    out
}

/// Encode one extension with a u16 length.
fn extension(typ: u16, body: &[u8]) -> Vec<u8> {
    let mut out = typ.to_be_bytes().to_vec();
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(body);
    out
}

fn extension_block(exts: &[Vec<u8>]) -> Vec<u8> {
    let all = exts.concat();
    let mut out = (all.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(&all);
    out
}

fn server_hello_body(random: &[u8; 32], compression: u8, exts: &[Vec<u8>]) -> Vec<u8> {
    let mut body = vec![0x03, 0x03];
    body.extend_from_slice(random);
    body.push(0x00); // empty session id
    body.extend_from_slice(&[0x13, 0x01]);
    body.push(compression);
    body.extend_from_slice(&extension_block(exts));
    body
}

fn sample_client_hello() -> ClientHelloPayload {
    ClientHelloPayload {
        client_version: ProtocolVersion::TLSv1_2,
        random: Random::from([0x11; 32]),
        session_id: SessionId::try_from(&[0x22u8; 32][..]).unwrap(),
        cipher_suites: vec![
            CipherSuite::TLS13_AES_128_GCM_SHA256,
            CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV,
        ],
        compression_methods: vec![Compression::Null],
        extensions: vec![
            ClientExtension::SupportedVersions(vec![ProtocolVersion::TLSv1_3]),
            ClientExtension::NamedGroups(vec![NamedGroup::secp256r1, NamedGroup::secp384r1]),
            ClientExtension::SignatureAlgorithms(vec![SignatureScheme::ECDSA_NISTP256_SHA256]),
            ClientExtension::make_sni(&DnsName::try_from("testserver.com").unwrap()),
            ClientExtension::KeyShare(vec![KeyShareEntry::new(
                NamedGroup::secp256r1,
                vec![0x04; 65],
            )]),
        ],
    }
}

#[test]
fn rejects_short_random() {
    let bytes = [0x01; 31];
    let mut rd = Reader::init(&bytes);
    assert!(Random::read(&mut rd).is_err());
}

#[test]
fn debug_random() {
    assert_eq!(
        "0101010101010101010101010101010101010101010101010101010101010101",
        format!("{:?}", Random::from([1; 32]))
    );
}

#[test]
fn rejects_session_id_with_bad_length() {
    let bytes = [33; 34];
    let mut rd = Reader::init(&bytes);
    assert!(SessionId::read(&mut rd).is_err());
}

#[test]
fn session_id_with_different_lengths_are_unequal() {
    let a = SessionId::read(&mut Reader::init(&[1u8, 1])).unwrap();
    let b = SessionId::read(&mut Reader::init(&[2u8, 1, 2])).unwrap();
    assert_ne!(a, b);
}

#[test]
fn empty_session_id() {
    let sid = SessionId::read(&mut Reader::init(&[0u8])).unwrap();
    assert!(sid.is_empty());
    assert_eq!(sid, SessionId::empty());
}

#[test]
fn client_hello_survives_encoding() {
    let ch = sample_client_hello();
    let hmp = HandshakeMessagePayload {
        typ: HandshakeType::ClientHello,
        payload: HandshakePayload::ClientHello(ch.clone()),
    };
    let bytes = hmp.get_encoding();
    assert_eq!(bytes[0], 0x01);

    let back = HandshakeMessagePayload::read_bytes(&bytes).unwrap();
    match back.payload {
        HandshakePayload::ClientHello(got) => {
            assert_eq!(got, ch);
            assert_eq!(
                got.keyshare_extension().map(|ks| ks[0].group()),
                Some(NamedGroup::secp256r1)
            );
            assert_eq!(
                got.sigalgs_extension(),
                Some(&[SignatureScheme::ECDSA_NISTP256_SHA256][..])
            );
            assert!(!got.has_duplicate_extension());
            assert!(!got.has_keyshare_extension_with_duplicates());
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn client_hello_without_extensions_is_rejected() {
    let mut ch = sample_client_hello();
    ch.extensions.clear();
    let bytes = ch.get_encoding();

    assert_eq!(
        ClientHelloPayload::read_bytes(&bytes).unwrap_err(),
        InvalidMessage::MissingData("ClientHelloPayload")
    );
}

#[test]
fn client_hello_detects_duplicates() {
    let mut ch = sample_client_hello();
    ch.extensions
        .push(ClientExtension::NamedGroups(vec![NamedGroup::X25519]));
    assert!(ch.has_duplicate_extension());

    let mut ch = sample_client_hello();
    ch.extensions
        .retain(|ext| ext.ext_type() != ExtensionType::KeyShare);
    ch.extensions
        .push(ClientExtension::KeyShare(vec![
            KeyShareEntry::new(NamedGroup::X25519, vec![1; 32]),
            KeyShareEntry::new(NamedGroup::X25519, vec![2; 32]),
        ]));
    assert!(!ch.has_duplicate_extension());
    assert!(ch.has_keyshare_extension_with_duplicates());
}

#[test]
fn cookie_extension_is_found() {
    let mut ch = sample_client_hello();
    ch.extensions
        .push(ClientExtension::Cookie(PayloadU16::new(vec![9, 8, 7])));
    let ch = ClientHelloPayload::read_bytes(&ch.get_encoding()).unwrap();
    assert_eq!(ch.cookie_extension(), Some(&[9u8, 8, 7][..]));
}

#[test]
fn ip_address_in_sni_is_not_a_hostname() {
    let mut sni = vec![0x00]; // host_name
    sni.extend_from_slice(&[0x00, 0x09]);
    sni.extend_from_slice(b"127.0.0.1");
    let mut list = (sni.len() as u16).to_be_bytes().to_vec();
    list.extend_from_slice(&sni);

    let ext = ClientExtension::read_bytes(&extension(0x0000, &list)).unwrap();
    match ext {
        ClientExtension::ServerName(names) => {
            assert!(matches!(names[0].payload, ServerNamePayload::IpAddress(_)));
        }
        other => panic!("unexpected extension {other:?}"),
    }
}

#[test]
fn garbage_in_sni_is_rejected() {
    let mut sni = vec![0x00, 0x00, 0x03];
    sni.extend_from_slice(b"a b");
    let mut list = (sni.len() as u16).to_be_bytes().to_vec();
    list.extend_from_slice(&sni);

    assert_eq!(
        ClientExtension::read_bytes(&extension(0x0000, &list)).unwrap_err(),
        InvalidMessage::InvalidServerName
    );
}

#[test]
fn hello_retry_request_is_recognised_by_its_random() {
    let body = server_hello_body(
        &HELLO_RETRY_REQUEST_RANDOM.0,
        0x00,
        &[
            extension(0x0033, &[0x00, 0x18]),
            extension(0x002b, &[0x03, 0x04]),
            extension(0x002c, &[0x00, 0x02, 0xab, 0xcd]),
        ],
    );
    let hmp = HandshakeMessagePayload::read_bytes(&handshake(0x02, &body)).unwrap();

    assert_eq!(hmp.typ, HandshakeType::HelloRetryRequest);
    match &hmp.payload {
        HandshakePayload::HelloRetryRequest(hrr) => {
            assert_eq!(hrr.legacy_version, ProtocolVersion::TLSv1_2);
            assert_eq!(hrr.cipher_suite, CipherSuite::TLS13_AES_128_GCM_SHA256);
            assert_eq!(hrr.requested_key_share_group(), Some(NamedGroup::secp384r1));
            assert_eq!(hrr.supported_versions(), Some(ProtocolVersion::TLSv1_3));
            assert_eq!(hrr.cookie().map(|c| c.0.clone()), Some(vec![0xab, 0xcd]));
            assert!(!hrr.has_unknown_extension());
            assert!(!hrr.has_duplicate_extension());
        }
        other => panic!("unexpected payload {other:?}"),
    }

    // re-encoding uses the ServerHello type on the wire
    assert_eq!(hmp.get_encoding(), handshake(0x02, &body));
}

#[test]
fn hello_retry_request_with_compression_is_rejected() {
    let body = server_hello_body(
        &HELLO_RETRY_REQUEST_RANDOM.0,
        0x01,
        &[extension(0x0033, &[0x00, 0x17])],
    );
    assert_eq!(
        HandshakeMessagePayload::read_bytes(&handshake(0x02, &body)).unwrap_err(),
        InvalidMessage::UnsupportedCompression
    );
}

#[test]
fn hello_retry_request_spots_unknown_and_duplicate_extensions() {
    let hrr = HelloRetryRequest {
        legacy_version: ProtocolVersion::TLSv1_2,
        session_id: SessionId::empty(),
        cipher_suite: CipherSuite::TLS13_AES_128_GCM_SHA256,
        extensions: vec![
            HelloRetryExtension::KeyShare(NamedGroup::X25519),
            HelloRetryExtension::KeyShare(NamedGroup::secp256r1),
        ],
    };
    assert!(hrr.has_duplicate_extension());
    assert!(!hrr.has_unknown_extension());

    let body = server_hello_body(
        &HELLO_RETRY_REQUEST_RANDOM.0,
        0x00,
        &[extension(0xff01, &[0x00])],
    );
    match HandshakeMessagePayload::read_bytes(&handshake(0x02, &body))
        .unwrap()
        .payload
    {
        HandshakePayload::HelloRetryRequest(hrr) => assert!(hrr.has_unknown_extension()),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn ordinary_server_hello_is_not_a_retry() {
    let share = [&[0x00, 0x1d, 0x00, 0x20][..], &[0x55; 32][..]].concat();
    let body = server_hello_body(
        &[0x42; 32],
        0x00,
        &[
            extension(0x0033, &share),
            extension(0x002b, &[0x03, 0x04]),
        ],
    );
    let hmp = HandshakeMessagePayload::read_bytes(&handshake(0x02, &body)).unwrap();
    assert_eq!(hmp.typ, HandshakeType::ServerHello);
    match hmp.payload {
        HandshakePayload::ServerHello(sh) => {
            assert_eq!(sh.random, Random::from([0x42; 32]));
            assert_eq!(sh.compression_method, Compression::Null);
            assert_eq!(
                sh.key_share().map(KeyShareEntry::group),
                Some(NamedGroup::X25519)
            );
            assert_eq!(sh.supported_versions(), Some(ProtocolVersion::TLSv1_3));
            assert!(!sh.has_duplicate_extension());
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn server_hello_with_trailing_data_is_rejected() {
    let mut body = server_hello_body(&[0x42; 32], 0x00, &[extension(0x002b, &[0x03, 0x04])]);
    body.push(0xff);
    assert!(HandshakeMessagePayload::read_bytes(&handshake(0x02, &body)).is_err());
}

#[test]
fn synthetic_types_are_refused_on_the_wire() {
    assert_eq!(
        HandshakeMessagePayload::read_bytes(&handshake(0xfe, &[0; 32])).unwrap_err(),
        InvalidMessage::UnexpectedMessage("MessageHash")
    );
    assert_eq!(
        HandshakeMessagePayload::read_bytes(&handshake(0x06, &[])).unwrap_err(),
        InvalidMessage::UnexpectedMessage("HelloRetryRequest")
    );
}

#[test]
fn message_hash_encoding() {
    let hmp = HandshakeMessagePayload::build_handshake_hash(&[0xaa; 32]);
    let mut expected = vec![0xfe, 0x00, 0x00, 0x20];
    expected.extend_from_slice(&[0xaa; 32]);
    assert_eq!(hmp.get_encoding(), expected);
}

#[test]
fn empty_server_name_is_an_acknowledgement() {
    let exts = extension_block(&[extension(0x0000, &[])]);
    let got = Vec::<ServerExtension>::read_bytes(&exts).unwrap();
    assert_eq!(got, vec![ServerExtension::ServerNameAck]);
    assert_eq!(got.get_encoding(), exts);
}

#[test]
fn certificate_payload_keeps_the_chain_order() {
    let chain = vec![
        CertificateDer::from(vec![1, 2, 3]),
        CertificateDer::from(vec![4, 5]),
    ];
    let payload = CertificatePayloadTls13::new(&chain);
    let bytes = payload.get_encoding();
    // context, then a u24 list of (u24 cert, u16 extensions)
    assert_eq!(
        bytes,
        vec![0x00, 0x00, 0x00, 0x0f, 0, 0, 3, 1, 2, 3, 0, 0, 0, 0, 2, 4, 5, 0, 0]
    );

    let back = CertificatePayloadTls13::read_bytes(&bytes).unwrap();
    assert!(!back.any_entry_has_extension());
    assert_eq!(back.into_certificate_chain(), chain);
}

#[test]
fn unknown_handshake_types_are_kept_opaque() {
    let hmp = HandshakeMessagePayload::read_bytes(&handshake(0x18, &[1, 2, 3])).unwrap();
    assert_eq!(hmp.payload, HandshakePayload::Unknown(Payload::new(vec![1, 2, 3])));
}

#[test]
fn rfc8448_client_hello() {
    let hmp = HandshakeMessagePayload::read_bytes(RFC8448_CLIENT_HELLO).unwrap();
    let ch = match &hmp.payload {
        HandshakePayload::ClientHello(ch) => ch,
        other => panic!("unexpected payload {other:?}"),
    };

    assert!(ch.session_id.is_empty());
    assert_eq!(
        ch.cipher_suites,
        vec![
            CipherSuite::TLS13_AES_128_GCM_SHA256,
            CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
            CipherSuite::TLS13_AES_256_GCM_SHA384,
        ]
    );
    assert_eq!(
        &ch.namedgroups_extension().unwrap()[..4],
        &[
            NamedGroup::X25519,
            NamedGroup::secp256r1,
            NamedGroup::secp384r1,
            NamedGroup::secp521r1
        ]
    );
    let shares = ch.keyshare_extension().unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].group(), NamedGroup::X25519);
    assert_eq!(shares[0].payload.0.len(), 32);
    assert_eq!(ch.versions_extension(), Some(&[ProtocolVersion::TLSv1_3][..]));
    assert_eq!(
        ch.sni_extension()
            .and_then(|names| names.single_hostname())
            .map(|name| name.as_ref().to_owned()),
        Some("server".to_owned())
    );
    // renegotiation_info, session_ticket, psk_key_exchange_modes, record_size_limit
    assert_eq!(
        ch.extensions
            .iter()
            .filter(|ext| matches!(ext, ClientExtension::Unknown(_)))
            .count(),
        4
    );
    assert!(!ch.has_duplicate_extension());

    assert_eq!(hmp.get_encoding(), RFC8448_CLIENT_HELLO);
}

#[test]
fn rfc8448_server_hello() {
    let hmp = HandshakeMessagePayload::read_bytes(RFC8448_SERVER_HELLO).unwrap();
    assert_eq!(hmp.typ, HandshakeType::ServerHello);
    let sh = match &hmp.payload {
        HandshakePayload::ServerHello(sh) => sh,
        other => panic!("unexpected payload {other:?}"),
    };

    assert_eq!(sh.legacy_version, ProtocolVersion::TLSv1_2);
    assert_eq!(sh.cipher_suite, CipherSuite::TLS13_AES_128_GCM_SHA256);
    assert_eq!(sh.supported_versions(), Some(ProtocolVersion::TLSv1_3));
    assert_eq!(
        sh.key_share().map(KeyShareEntry::group),
        Some(NamedGroup::X25519)
    );
    assert_ne!(sh.random, HELLO_RETRY_REQUEST_RANDOM);

    assert_eq!(hmp.get_encoding(), RFC8448_SERVER_HELLO);
}

fn arb_group() -> impl Strategy<Value = NamedGroup> {
    prop_oneof![
        Just(NamedGroup::secp256r1),
        Just(NamedGroup::secp384r1),
        Just(NamedGroup::secp521r1),
        Just(NamedGroup::X25519),
        Just(NamedGroup::X448),
        any::<u16>().prop_map(NamedGroup::from),
    ]
}

fn arb_suite() -> impl Strategy<Value = CipherSuite> {
    (0x1301u16..=0x1305).prop_map(CipherSuite::from)
}

prop_compose! {
    fn arb_client_hello()(
        random in proptest::array::uniform32(any::<u8>()),
        session_id in proptest::collection::vec(any::<u8>(), 0..=32),
        suites in proptest::collection::vec(arb_suite(), 1..6),
        groups in proptest::collection::vec(arb_group(), 1..6),
        shared in proptest::collection::vec(any::<bool>(), 6),
        cookie in proptest::option::of(proptest::collection::vec(any::<u8>(), 1..40)),
    ) -> ClientHelloPayload {
        // key shares are a subset of the offered groups, in the same order
        let key_shares = groups
            .iter()
            .zip(shared)
            .filter(|(_, share)| *share)
            .map(|(group, _)| KeyShareEntry::new(*group, vec![u16::from(*group) as u8; 32]))
            .collect();

        let mut extensions = vec![
            ClientExtension::SupportedVersions(vec![ProtocolVersion::TLSv1_3]),
            ClientExtension::NamedGroups(groups),
            ClientExtension::SignatureAlgorithms(vec![
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::RSA_PSS_SHA256,
            ]),
            ClientExtension::KeyShare(key_shares),
        ];
        if let Some(cookie) = cookie {
            extensions.push(ClientExtension::Cookie(PayloadU16::new(cookie)));
        }

        ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_2,
            random: Random::from(random),
            session_id: SessionId::try_from(&session_id[..]).unwrap(),
            cipher_suites: suites,
            compression_methods: vec![Compression::Null],
            extensions,
        }
    }
}

prop_compose! {
    fn arb_hello_retry_request()(
        session_id in proptest::collection::vec(any::<u8>(), 0..=32),
        suite in arb_suite(),
        group in proptest::option::of(arb_group()),
        cookie in proptest::option::of(proptest::collection::vec(any::<u8>(), 1..40)),
    ) -> HelloRetryRequest {
        let mut extensions = Vec::new();
        if let Some(group) = group {
            extensions.push(HelloRetryExtension::KeyShare(group));
        }
        extensions.push(HelloRetryExtension::SupportedVersions(ProtocolVersion::TLSv1_3));
        if let Some(cookie) = cookie {
            extensions.push(HelloRetryExtension::Cookie(PayloadU16::new(cookie)));
        }

        HelloRetryRequest {
            legacy_version: ProtocolVersion::TLSv1_2,
            session_id: SessionId::try_from(&session_id[..]).unwrap(),
            cipher_suite: suite,
            extensions,
        }
    }
}

proptest! {
    #[test]
    fn decoding_arbitrary_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = HandshakeMessagePayload::read_bytes(&bytes);
    }

    #[test]
    fn decoding_arbitrary_server_hello_bodies_never_panics(
        random in proptest::array::uniform32(any::<u8>()),
        tail in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        let mut body = vec![0x03, 0x03];
        body.extend_from_slice(&random);
        body.extend_from_slice(&tail);
        let _ = HandshakeMessagePayload::read_bytes(&handshake(0x02, &body));
    }

    #[test]
    fn key_share_lists_keep_group_order(groups in proptest::collection::vec(any::<u16>(), 1..6)) {
        let shares: Vec<KeyShareEntry> = groups
            .iter()
            .map(|g| KeyShareEntry::new(NamedGroup::from(*g), g.to_be_bytes().to_vec()))
            .collect();
        let ext = ClientExtension::KeyShare(shares);
        let back = ClientExtension::read_bytes(&ext.get_encoding()).unwrap();
        match back {
            ClientExtension::KeyShare(got) => {
                let got: Vec<u16> = got.iter().map(|ks| u16::from(ks.group())).collect();
                prop_assert_eq!(got, groups);
            }
            other => prop_assert!(false, "unexpected extension {:?}", other),
        }
    }

    #[test]
    fn client_hello_is_preserved_by_the_codec(ch in arb_client_hello()) {
        let hmp = HandshakeMessagePayload {
            typ: HandshakeType::ClientHello,
            payload: HandshakePayload::ClientHello(ch),
        };
        let back = HandshakeMessagePayload::read_bytes(&hmp.get_encoding()).unwrap();
        prop_assert_eq!(back, hmp);
    }

    #[test]
    fn hello_retry_request_is_preserved_by_the_codec(hrr in arb_hello_retry_request()) {
        let hmp = HandshakeMessagePayload {
            typ: HandshakeType::HelloRetryRequest,
            payload: HandshakePayload::HelloRetryRequest(hrr),
        };
        let back = HandshakeMessagePayload::read_bytes(&hmp.get_encoding()).unwrap();
        prop_assert_eq!(back, hmp);
    }
}

/// RFC 8448 section 3: the simple 1-RTT handshake's ClientHello.
const RFC8448_CLIENT_HELLO: &[u8] = &[
    0x01, 0x00, 0x00, 0xc0, 0x03, 0x03, 0xcb, 0x34, 0xec, 0xb1, 0xe7, 0x81, 0x63, 0xba, 0x1c, 0x38,
    0xc6, 0xda, 0xcb, 0x19, 0x6a, 0x6d, 0xff, 0xa2, 0x1a, 0x8d, 0x99, 0x12, 0xec, 0x18, 0xa2, 0xef,
    0x62, 0x83, 0x02, 0x4d, 0xec, 0xe7, 0x00, 0x00, 0x06, 0x13, 0x01, 0x13, 0x03, 0x13, 0x02, 0x01,
    0x00, 0x00, 0x91, 0x00, 0x00, 0x00, 0x0b, 0x00, 0x09, 0x00, 0x00, 0x06, 0x73, 0x65, 0x72, 0x76,
    0x65, 0x72, 0xff, 0x01, 0x00, 0x01, 0x00, 0x00, 0x0a, 0x00, 0x14, 0x00, 0x12, 0x00, 0x1d, 0x00,
    0x17, 0x00, 0x18, 0x00, 0x19, 0x01, 0x00, 0x01, 0x01, 0x01, 0x02, 0x01, 0x03, 0x01, 0x04, 0x00,
    0x23, 0x00, 0x00, 0x00, 0x33, 0x00, 0x26, 0x00, 0x24, 0x00, 0x1d, 0x00, 0x20, 0x99, 0x38, 0x1d,
    0xe5, 0x60, 0xe4, 0xbd, 0x43, 0xd2, 0x3d, 0x8e, 0x43, 0x5a, 0x7d, 0xba, 0xfe, 0xb3, 0xc0, 0x6e,
    0x51, 0xc1, 0x3c, 0xae, 0x4d, 0x54, 0x13, 0x69, 0x1e, 0x52, 0x9a, 0xaf, 0x2c, 0x00, 0x2b, 0x00,
    0x03, 0x02, 0x03, 0x04, 0x00, 0x0d, 0x00, 0x20, 0x00, 0x1e, 0x04, 0x03, 0x05, 0x03, 0x06, 0x03,
    0x02, 0x03, 0x08, 0x04, 0x08, 0x05, 0x08, 0x06, 0x04, 0x01, 0x05, 0x01, 0x06, 0x01, 0x02, 0x01,
    0x04, 0x02, 0x05, 0x02, 0x06, 0x02, 0x02, 0x02, 0x00, 0x2d, 0x00, 0x02, 0x01, 0x01, 0x00, 0x1c,
    0x00, 0x02, 0x40, 0x01,
];

/// RFC 8448 section 3: the matching ServerHello.
const RFC8448_SERVER_HELLO: &[u8] = &[
    0x02, 0x00, 0x00, 0x56, 0x03, 0x03, 0xa6, 0xaf, 0x06, 0xa4, 0x12, 0x18, 0x60, 0xdc, 0x5e, 0x6e,
    0x60, 0x24, 0x9c, 0xd3, 0x4c, 0x95, 0x93, 0x0c, 0x8a, 0xc5, 0xcb, 0x14, 0x34, 0xda, 0xc1, 0x55,
    0x77, 0x2e, 0xd3, 0xe2, 0x69, 0x28, 0x00, 0x13, 0x01, 0x00, 0x00, 0x2e, 0x00, 0x33, 0x00, 0x24,
    0x00, 0x1d, 0x00, 0x20, 0xc9, 0x82, 0x88, 0x76, 0x11, 0x20, 0x95, 0xfe, 0x66, 0x76, 0x2b, 0xdb,
    0xf7, 0xc6, 0x72, 0xe1, 0x56, 0xd6, 0xcc, 0x25, 0x3b, 0x83, 0x3d, 0xf1, 0xdd, 0x69, 0xb1, 0xb0,
    0x4e, 0x75, 0x1f, 0x0f, 0x00, 0x2b, 0x00, 0x02, 0x03, 0x04,
];
