//! Key-share negotiation, with and without a HelloRetryRequest.

use std::cell::Cell;

use tls13_handshake::internal::msgs::base::{Payload, PayloadU16};
use tls13_handshake::internal::msgs::codec::Codec;
use tls13_handshake::internal::msgs::handshake::{
    ClientExtension, ClientHelloPayload, HandshakePayload, HelloRetryExtension,
    HelloRetryRequest, KeyShareEntry, SessionId,
};
use tls13_handshake::internal::msgs::message::{Message, MessagePayload};
use tls13_handshake::{
    AlertDescription, CipherSuite, ClientConnection, Connection, Error, HandshakeKind,
    HandshakeType, NamedGroup, PeerIncompatible, PeerMisbehaved, ProtocolVersion,
    ServerConnection,
};

mod common;
use common::*;

static ALL_GROUPS: &[NamedGroup] = &[
    NamedGroup::X25519,
    NamedGroup::secp256r1,
    NamedGroup::secp384r1,
    NamedGroup::secp521r1,
    NamedGroup::X448,
];

fn check_negotiated(
    client: &ClientConnection,
    server: &ServerConnection,
    group: NamedGroup,
    kind: HandshakeKind,
) {
    assert_eq!(client.negotiated_key_exchange_group(), Some(group));
    assert_eq!(server.negotiated_key_exchange_group(), Some(group));
    assert_eq!(client.handshake_kind(), Some(kind));
    assert_eq!(server.handshake_kind(), Some(kind));
}

/// A pair where the client offers `[first, second]` with a share for
/// `first` only, and the server accepts `second` only.
fn retry_pair(
    first: NamedGroup,
    second: NamedGroup,
) -> (ClientConnection, ServerConnection) {
    let kt = KeyType::EcdsaP256;
    let client_config = finish_client_config(
        kt,
        client_config_builder()
            .with_kx_groups(&[first, second])
            .with_key_share_groups(&[first]),
    );
    let server_config = finish_server_config(kt, server_config_builder().with_kx_groups(&[second]));
    make_pair_for_configs(client_config, server_config)
}

#[test]
fn share_for_server_group_needs_no_retry() {
    for group in ALL_GROUPS {
        println!("group {:?}", group);
        let kt = KeyType::EcdsaP256;
        let client_config =
            finish_client_config(kt, client_config_builder().with_key_share_groups(&[*group]));
        let server_config =
            finish_server_config(kt, server_config_builder().with_kx_groups(&[*group]));
        let (mut client, mut server) = make_pair_for_configs(client_config, server_config);

        do_handshake(&mut client, &mut server);
        check_negotiated(&client, &server, *group, HandshakeKind::Full);
    }
}

#[test]
fn one_matching_share_among_many_needs_no_retry() {
    let kt = KeyType::EcdsaP256;
    for group in ALL_GROUPS {
        let client_config =
            finish_client_config(kt, client_config_builder().with_key_share_groups(ALL_GROUPS));
        let server_config =
            finish_server_config(kt, server_config_builder().with_kx_groups(&[*group]));
        let (mut client, mut server) = make_pair_for_configs(client_config, server_config);

        do_handshake(&mut client, &mut server);
        check_negotiated(&client, &server, *group, HandshakeKind::Full);
    }
}

#[test]
fn existing_share_beats_more_preferred_group() {
    let kt = KeyType::EcdsaP256;
    let client_config = finish_client_config(
        kt,
        client_config_builder()
            .with_kx_groups(&[NamedGroup::secp256r1, NamedGroup::secp384r1])
            .with_key_share_groups(&[NamedGroup::secp256r1]),
    );
    let server_config = finish_server_config(
        kt,
        server_config_builder().with_kx_groups(&[NamedGroup::secp384r1, NamedGroup::secp256r1]),
    );
    let (mut client, mut server) = make_pair_for_configs(client_config, server_config);

    do_handshake(&mut client, &mut server);
    check_negotiated(
        &client,
        &server,
        NamedGroup::secp256r1,
        HandshakeKind::Full,
    );
}

#[test]
fn retry_selects_server_group_for_every_pair() {
    for first in ALL_GROUPS {
        for second in ALL_GROUPS {
            if first == second {
                continue;
            }

            println!("{:?} -> {:?}", first, second);
            let (mut client, mut server) = retry_pair(*first, *second);
            do_handshake(&mut client, &mut server);
            check_negotiated(
                &client,
                &server,
                *second,
                HandshakeKind::FullWithHelloRetryRequest,
            );
        }
    }
}

#[test]
fn retry_names_most_preferred_server_group_client_supports() {
    let kt = KeyType::EcdsaP256;
    let client_config = finish_client_config(
        kt,
        client_config_builder()
            .with_kx_groups(&[
                NamedGroup::X25519,
                NamedGroup::secp256r1,
                NamedGroup::secp384r1,
            ])
            .with_key_share_groups(&[NamedGroup::X25519]),
    );
    let server_config = finish_server_config(
        kt,
        server_config_builder().with_kx_groups(&[
            NamedGroup::secp521r1,
            NamedGroup::secp384r1,
            NamedGroup::secp256r1,
        ]),
    );
    let (mut client, mut server) = make_pair_for_configs(client_config, server_config);

    do_handshake(&mut client, &mut server);
    check_negotiated(
        &client,
        &server,
        NamedGroup::secp384r1,
        HandshakeKind::FullWithHelloRetryRequest,
    );
}

#[test]
fn no_common_group_fails() {
    let kt = KeyType::EcdsaP256;
    let client_config = finish_client_config(
        kt,
        client_config_builder().with_kx_groups(&[NamedGroup::X25519]),
    );
    let server_config =
        finish_server_config(kt, server_config_builder().with_kx_groups(&[NamedGroup::X448]));
    let (mut client, mut server) = make_pair_for_configs(client_config, server_config);

    assert_eq!(
        do_handshake_until_error(&mut client, &mut server),
        Err(ErrorFromPeer::Server(Error::PeerIncompatible(
            PeerIncompatible::NoKxGroupsInCommon
        )))
    );
}

#[test]
fn retry_key_share_is_only_for_requested_group() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);
    let second_hello_seen = Cell::new(false);

    let check_second_hello = |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, .. } = &msg.payload {
            if let HandshakePayload::ClientHello(ch) = &parsed.payload {
                let groups: Vec<_> = ch
                    .keyshare_extension()
                    .unwrap()
                    .iter()
                    .map(KeyShareEntry::group)
                    .collect();
                if groups == [NamedGroup::secp384r1] {
                    second_hello_seen.set(true);
                } else {
                    assert_eq!(groups, [NamedGroup::secp256r1]);
                }
            }
        }
        Altered::InPlace
    };

    do_handshake_altered(client, |_: &mut Message| Altered::InPlace, check_second_hello, server)
        .unwrap();
    assert!(second_hello_seen.get());
}

fn server_hello_into_retry(msg: &mut Message) -> Altered {
    if let MessagePayload::Handshake { parsed, encoded } = &mut msg.payload {
        let retry = match &parsed.payload {
            HandshakePayload::ServerHello(sh) => HelloRetryRequest {
                legacy_version: sh.legacy_version,
                session_id: sh.session_id,
                cipher_suite: sh.cipher_suite,
                extensions: vec![
                    HelloRetryExtension::KeyShare(NamedGroup::X25519),
                    HelloRetryExtension::SupportedVersions(ProtocolVersion::TLSv1_3),
                ],
            },
            _ => return Altered::InPlace,
        };

        parsed.typ = HandshakeType::HelloRetryRequest;
        parsed.payload = HandshakePayload::HelloRetryRequest(retry);
        *encoded = Payload::new(parsed.get_encoding());
    }

    Altered::InPlace
}

#[test]
fn second_retry_request_is_refused() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);

    assert_eq!(
        do_handshake_altered(
            client,
            server_hello_into_retry,
            |_: &mut Message| Altered::InPlace,
            server
        ),
        Err(ErrorFromPeer::Client(Error::PeerMisbehaved(
            PeerMisbehaved::IllegalSecondHelloRetryRequest
        )))
    );
}

fn retry_asking_for(group: NamedGroup) -> impl Fn(&mut Message) -> Altered {
    move |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, encoded } = &mut msg.payload {
            if let HandshakePayload::HelloRetryRequest(hrr) = &mut parsed.payload {
                for ext in hrr.extensions.iter_mut() {
                    if let HelloRetryExtension::KeyShare(requested) = ext {
                        *requested = group;
                    }
                }
                *encoded = Payload::new(parsed.get_encoding());
            }
        }
        Altered::InPlace
    }
}

#[test]
fn retry_for_already_offered_group_is_refused() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);

    assert_eq!(
        do_handshake_altered(
            client,
            retry_asking_for(NamedGroup::secp256r1),
            |_: &mut Message| Altered::InPlace,
            server
        ),
        Err(ErrorFromPeer::Client(Error::PeerMisbehaved(
            PeerMisbehaved::IllegalHelloRetryRequestWithOfferedGroup
        )))
    );
}

#[test]
fn retry_for_unadvertised_group_is_refused() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);

    assert_eq!(
        do_handshake_altered(
            client,
            retry_asking_for(NamedGroup::X448),
            |_: &mut Message| Altered::InPlace,
            server
        ),
        Err(ErrorFromPeer::Client(Error::PeerMisbehaved(
            PeerMisbehaved::IllegalHelloRetryRequestWithUnofferedNamedGroup
        )))
    );
}

#[test]
fn retry_without_changes_is_refused() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);

    let drop_key_share = |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, encoded } = &mut msg.payload {
            if let HandshakePayload::HelloRetryRequest(hrr) = &mut parsed.payload {
                hrr.extensions
                    .retain(|ext| !matches!(ext, HelloRetryExtension::KeyShare(_)));
                *encoded = Payload::new(parsed.get_encoding());
            }
        }
        Altered::InPlace
    };

    assert_eq!(
        do_handshake_altered(
            client,
            drop_key_share,
            |_: &mut Message| Altered::InPlace,
            server
        ),
        Err(ErrorFromPeer::Client(Error::PeerMisbehaved(
            PeerMisbehaved::IllegalHelloRetryRequestWithNoChanges
        )))
    );
}

/// Rewrites the key share of the second ClientHello, which is the one
/// carrying a share for `from`.
fn second_hello_share(from: NamedGroup, to: NamedGroup) -> impl Fn(&mut Message) -> Altered {
    move |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, encoded } = &mut msg.payload {
            if let HandshakePayload::ClientHello(ch) = &mut parsed.payload {
                for ext in ch.extensions.iter_mut() {
                    if let ClientExtension::KeyShare(shares) = ext {
                        if let [share] = &shares[..] {
                            if share.group() == from {
                                *shares = vec![KeyShareEntry::new(to, vec![0x04; 65])];
                            }
                        }
                    }
                }
                *encoded = Payload::new(parsed.get_encoding());
            }
        }
        Altered::InPlace
    }
}

#[test]
fn second_hello_must_follow_retry() {
    let kt = KeyType::EcdsaP256;
    let client_config = finish_client_config(
        kt,
        client_config_builder()
            .with_kx_groups(&[NamedGroup::X25519, NamedGroup::secp256r1, NamedGroup::secp384r1])
            .with_key_share_groups(&[NamedGroup::X25519]),
    );
    let server_config = finish_server_config(
        kt,
        server_config_builder().with_kx_groups(&[NamedGroup::secp384r1, NamedGroup::secp256r1]),
    );
    let (client, server) = make_pair_for_configs(client_config, server_config);

    assert_eq!(
        do_handshake_altered(
            client,
            |_: &mut Message| Altered::InPlace,
            second_hello_share(NamedGroup::secp384r1, NamedGroup::secp256r1),
            server
        ),
        Err(ErrorFromPeer::Server(Error::PeerMisbehaved(
            PeerMisbehaved::RefusedToFollowHelloRetryRequest
        )))
    );
}

#[test]
fn fatal_alert_follows_refused_retry() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);
    let mut client = Connection::Client(client);
    let mut server = Connection::Server(server);

    transfer_altered(&mut client, |_: &mut Message| Altered::InPlace, &mut server);
    server.process_new_packets().unwrap();
    transfer_altered(
        &mut server,
        retry_asking_for(NamedGroup::secp256r1),
        &mut client,
    );
    assert!(client.process_new_packets().is_err());

    let alert_seen = Cell::new(None);
    transfer_altered(
        &mut client,
        |msg: &mut Message| {
            if let MessagePayload::Alert(alert) = &msg.payload {
                alert_seen.set(Some(alert.description));
            }
            Altered::InPlace
        },
        &mut server,
    );
    assert_eq!(alert_seen.get(), Some(AlertDescription::IllegalParameter));
    assert_eq!(
        server.process_new_packets(),
        Err(Error::AlertReceived(AlertDescription::IllegalParameter))
    );
}

fn cookie_server_pair() -> (ClientConnection, ServerConnection) {
    let kt = KeyType::EcdsaP256;
    let client_config = finish_client_config(
        kt,
        client_config_builder()
            .with_kx_groups(&[NamedGroup::secp256r1, NamedGroup::secp384r1])
            .with_key_share_groups(&[NamedGroup::secp256r1]),
    );
    let server_config = finish_server_config(
        kt,
        server_config_builder()
            .with_kx_groups(&[NamedGroup::secp384r1])
            .send_hrr_cookie(true),
    );
    make_pair_for_configs(client_config, server_config)
}

#[test]
fn cookie_is_echoed_in_second_hello() {
    let (client, server) = cookie_server_pair();
    let sent_cookie = std::cell::RefCell::new(None);
    let echoed_cookie = std::cell::RefCell::new(None);

    let watch_retry = |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, .. } = &msg.payload {
            if let HandshakePayload::HelloRetryRequest(hrr) = &parsed.payload {
                *sent_cookie.borrow_mut() = hrr.cookie().map(|c| c.0.clone());
            }
        }
        Altered::InPlace
    };
    let watch_hello = |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, .. } = &msg.payload {
            if let HandshakePayload::ClientHello(ch) = &parsed.payload {
                for ext in &ch.extensions {
                    if let ClientExtension::Cookie(cookie) = ext {
                        *echoed_cookie.borrow_mut() = Some(cookie.0.clone());
                    }
                }
            }
        }
        Altered::InPlace
    };

    do_handshake_altered(client, watch_retry, watch_hello, server).unwrap();

    let sent = sent_cookie.into_inner().unwrap();
    assert!(!sent.is_empty());
    assert_eq!(echoed_cookie.into_inner(), Some(sent));
}

#[test]
fn no_cookie_unless_configured() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);

    let no_cookie = |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, .. } = &msg.payload {
            if let HandshakePayload::HelloRetryRequest(hrr) = &parsed.payload {
                assert!(hrr.cookie().is_none());
            }
        }
        Altered::InPlace
    };

    do_handshake_altered(client, no_cookie, |_: &mut Message| Altered::InPlace, server).unwrap();
}

#[test]
fn altered_cookie_is_refused() {
    let (client, server) = cookie_server_pair();

    let alter_cookie = |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, encoded } = &mut msg.payload {
            if let HandshakePayload::ClientHello(ch) = &mut parsed.payload {
                for ext in ch.extensions.iter_mut() {
                    if let ClientExtension::Cookie(cookie) = ext {
                        cookie.0[0] ^= 0xff;
                    }
                }
                *encoded = Payload::new(parsed.get_encoding());
            }
        }
        Altered::InPlace
    };

    assert_eq!(
        do_handshake_altered(client, |_: &mut Message| Altered::InPlace, alter_cookie, server),
        Err(ErrorFromPeer::Server(Error::PeerMisbehaved(
            PeerMisbehaved::IncorrectHelloRetryRequestCookie
        )))
    );
}

#[test]
fn missing_cookie_is_refused() {
    let (client, server) = cookie_server_pair();

    let drop_cookie = |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, encoded } = &mut msg.payload {
            if let HandshakePayload::ClientHello(ch) = &mut parsed.payload {
                ch.extensions
                    .retain(|ext| !matches!(ext, ClientExtension::Cookie(_)));
                *encoded = Payload::new(parsed.get_encoding());
            }
        }
        Altered::InPlace
    };

    assert_eq!(
        do_handshake_altered(client, |_: &mut Message| Altered::InPlace, drop_cookie, server),
        Err(ErrorFromPeer::Server(Error::PeerMisbehaved(
            PeerMisbehaved::IncorrectHelloRetryRequestCookie
        )))
    );
}

#[test]
fn empty_cookie_is_refused_by_client() {
    let (client, server) = cookie_server_pair();

    let empty_cookie = |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, encoded } = &mut msg.payload {
            if let HandshakePayload::HelloRetryRequest(hrr) = &mut parsed.payload {
                for ext in hrr.extensions.iter_mut() {
                    if let HelloRetryExtension::Cookie(cookie) = ext {
                        *cookie = PayloadU16::empty();
                    }
                }
                *encoded = Payload::new(parsed.get_encoding());
            }
        }
        Altered::InPlace
    };

    assert_eq!(
        do_handshake_altered(client, empty_cookie, |_: &mut Message| Altered::InPlace, server),
        Err(ErrorFromPeer::Client(Error::PeerMisbehaved(
            PeerMisbehaved::IllegalHelloRetryRequestWithEmptyCookie
        )))
    );
}

#[test]
fn cookie_only_retry_resends_original_shares() {
    let (client, server) = cookie_server_pair();
    let second_hello_groups = std::cell::RefCell::new(Vec::new());

    let cookie_only = |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, encoded } = &mut msg.payload {
            if let HandshakePayload::HelloRetryRequest(hrr) = &mut parsed.payload {
                hrr.extensions
                    .retain(|ext| !matches!(ext, HelloRetryExtension::KeyShare(_)));
                *encoded = Payload::new(parsed.get_encoding());
            }
        }
        Altered::InPlace
    };
    let watch_hello = |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, .. } = &msg.payload {
            if let HandshakePayload::ClientHello(ch) = &parsed.payload {
                let has_cookie = ch
                    .extensions
                    .iter()
                    .any(|ext| matches!(ext, ClientExtension::Cookie(_)));
                if has_cookie {
                    *second_hello_groups.borrow_mut() = ch
                        .keyshare_extension()
                        .unwrap()
                        .iter()
                        .map(KeyShareEntry::group)
                        .collect();
                }
            }
        }
        Altered::InPlace
    };

    // The server asked for secp384r1, and is not told the client ignored it.
    assert_eq!(
        do_handshake_altered(client, cookie_only, watch_hello, server),
        Err(ErrorFromPeer::Server(Error::PeerMisbehaved(
            PeerMisbehaved::RefusedToFollowHelloRetryRequest
        )))
    );
    assert_eq!(
        second_hello_groups.into_inner(),
        vec![NamedGroup::secp256r1]
    );
}

fn count_ccs(counter: &Cell<usize>) -> impl Fn(&mut Message) -> Altered + '_ {
    move |msg: &mut Message| {
        if let MessagePayload::ChangeCipherSpec(_) = msg.payload {
            counter.set(counter.get() + 1);
        }
        Altered::InPlace
    }
}

#[test]
fn compatibility_mode_sends_one_ccs_each_way() {
    let (client, server) = make_pair(KeyType::EcdsaP256);
    let (from_server, from_client) = (Cell::new(0), Cell::new(0));

    do_handshake_altered(client, count_ccs(&from_server), count_ccs(&from_client), server)
        .unwrap();
    assert_eq!(from_server.get(), 1);
    assert_eq!(from_client.get(), 1);
}

#[test]
fn compatibility_mode_sends_one_ccs_each_way_with_retry() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);
    let (from_server, from_client) = (Cell::new(0), Cell::new(0));

    do_handshake_altered(client, count_ccs(&from_server), count_ccs(&from_client), server)
        .unwrap();
    assert_eq!(from_server.get(), 1);
    assert_eq!(from_client.get(), 1);
}

#[test]
fn no_ccs_without_compatibility_mode() {
    let kt = KeyType::EcdsaP256;
    let client_config = finish_client_config(
        kt,
        client_config_builder()
            .with_kx_groups(&[NamedGroup::secp256r1, NamedGroup::secp384r1])
            .with_key_share_groups(&[NamedGroup::secp256r1])
            .compatibility_mode(false),
    );
    let server_config = finish_server_config(
        kt,
        server_config_builder().with_kx_groups(&[NamedGroup::secp384r1]),
    );
    let (client, server) = make_pair_for_configs(client_config, server_config);
    let (from_server, from_client) = (Cell::new(0), Cell::new(0));

    do_handshake_altered(client, count_ccs(&from_server), count_ccs(&from_client), server)
        .unwrap();
    assert_eq!(from_server.get(), 0);
    assert_eq!(from_client.get(), 0);
}

#[test]
fn malformed_ccs_is_refused() {
    let (client, server) = make_pair(KeyType::EcdsaP256);

    let bad_ccs = |msg: &mut Message| match msg.payload {
        MessagePayload::ChangeCipherSpec(_) => {
            Altered::Raw(vec![0x14, 0x03, 0x03, 0x00, 0x01, 0x02])
        }
        _ => Altered::InPlace,
    };

    assert_eq!(
        do_handshake_altered(client, bad_ccs, |_: &mut Message| Altered::InPlace, server),
        Err(ErrorFromPeer::Client(Error::PeerMisbehaved(
            PeerMisbehaved::IllegalMiddleboxChangeCipherSpec
        )))
    );
}

/// Drive a handshake that must fail, returning the error and the alert
/// the failing side sent its peer.
fn handshake_error_and_alert(
    client: ClientConnection,
    alter_server_message: impl Fn(&mut Message) -> Altered,
    alter_client_message: impl Fn(&mut Message) -> Altered,
    server: ServerConnection,
) -> (ErrorFromPeer, Option<AlertDescription>) {
    let mut client = Connection::Client(client);
    let mut server = Connection::Server(server);

    let err = loop {
        assert!(client.is_handshaking() || server.is_handshaking());

        transfer_altered(&mut client, &alter_client_message, &mut server);
        if let Err(err) = server.process_new_packets() {
            break ErrorFromPeer::Server(err);
        }

        transfer_altered(&mut server, &alter_server_message, &mut client);
        if let Err(err) = client.process_new_packets() {
            break ErrorFromPeer::Client(err);
        }
    };

    let alert_seen = Cell::new(None);
    let watch_alert = |msg: &mut Message| {
        if let MessagePayload::Alert(alert) = &msg.payload {
            alert_seen.set(Some(alert.description));
        }
        Altered::InPlace
    };
    match &err {
        ErrorFromPeer::Client(_) => transfer_altered(&mut client, watch_alert, &mut server),
        ErrorFromPeer::Server(_) => transfer_altered(&mut server, watch_alert, &mut client),
    };

    (err, alert_seen.get())
}

fn alter_retry(edit: impl Fn(&mut HelloRetryRequest)) -> impl Fn(&mut Message) -> Altered {
    move |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, encoded } = &mut msg.payload {
            if let HandshakePayload::HelloRetryRequest(hrr) = &mut parsed.payload {
                edit(hrr);
                *encoded = Payload::new(parsed.get_encoding());
            }
        }
        Altered::InPlace
    }
}

fn alter_client_hello(edit: impl Fn(&mut ClientHelloPayload)) -> impl Fn(&mut Message) -> Altered {
    move |msg: &mut Message| {
        if let MessagePayload::Handshake { parsed, encoded } = &mut msg.payload {
            if let HandshakePayload::ClientHello(ch) = &mut parsed.payload {
                edit(ch);
                *encoded = Payload::new(parsed.get_encoding());
            }
        }
        Altered::InPlace
    }
}

fn unaltered(_: &mut Message) -> Altered {
    Altered::InPlace
}

#[test]
fn retry_with_wrong_session_id_is_refused() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);

    assert_eq!(
        handshake_error_and_alert(
            client,
            alter_retry(|hrr| hrr.session_id = SessionId::empty()),
            unaltered,
            server
        ),
        (
            ErrorFromPeer::Client(Error::PeerMisbehaved(
                PeerMisbehaved::IllegalHelloRetryRequestWithWrongSessionId
            )),
            Some(AlertDescription::IllegalParameter)
        )
    );
}

#[test]
fn retry_with_unknown_extension_is_refused() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);

    // Extension 0xff01 (renegotiation_info) has no place in a retry.
    let add_unknown = alter_retry(|hrr| {
        hrr.extensions
            .push(HelloRetryExtension::read_bytes(&[0xff, 0x01, 0x00, 0x00]).unwrap())
    });

    assert_eq!(
        handshake_error_and_alert(client, add_unknown, unaltered, server),
        (
            ErrorFromPeer::Client(Error::PeerIncompatible(
                PeerIncompatible::ServerSentHelloRetryRequestWithUnknownExtension
            )),
            Some(AlertDescription::UnsupportedExtension)
        )
    );
}

#[test]
fn retry_for_older_version_is_refused() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);

    let downgrade = alter_retry(|hrr| {
        for ext in hrr.extensions.iter_mut() {
            if let HelloRetryExtension::SupportedVersions(version) = ext {
                *version = ProtocolVersion::TLSv1_2;
            }
        }
    });

    assert_eq!(
        handshake_error_and_alert(client, downgrade, unaltered, server),
        (
            ErrorFromPeer::Client(Error::PeerMisbehaved(
                PeerMisbehaved::IllegalHelloRetryRequestWithUnsupportedVersion
            )),
            Some(AlertDescription::IllegalParameter)
        )
    );
}

#[test]
fn retry_for_unoffered_suite_is_refused() {
    let kt = KeyType::EcdsaP256;
    let client_config = finish_client_config(
        kt,
        client_config_builder()
            .with_cipher_suites(&[CipherSuite::TLS13_AES_128_GCM_SHA256])
            .with_kx_groups(&[NamedGroup::secp256r1, NamedGroup::secp384r1])
            .with_key_share_groups(&[NamedGroup::secp256r1]),
    );
    let server_config = finish_server_config(
        kt,
        server_config_builder().with_kx_groups(&[NamedGroup::secp384r1]),
    );
    let (client, server) = make_pair_for_configs(client_config, server_config);

    assert_eq!(
        handshake_error_and_alert(
            client,
            alter_retry(|hrr| hrr.cipher_suite = CipherSuite::TLS13_CHACHA20_POLY1305_SHA256),
            unaltered,
            server
        ),
        (
            ErrorFromPeer::Client(Error::PeerMisbehaved(
                PeerMisbehaved::IllegalHelloRetryRequestWithUnofferedCipherSuite
            )),
            Some(AlertDescription::IllegalParameter)
        )
    );
}

#[test]
fn server_hello_must_keep_retry_suite() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);

    // The server is not told, so its ServerHello names the suite it
    // really chose.
    let other_suite = alter_retry(|hrr| {
        hrr.cipher_suite = match hrr.cipher_suite {
            CipherSuite::TLS13_AES_128_GCM_SHA256 => CipherSuite::TLS13_AES_256_GCM_SHA384,
            _ => CipherSuite::TLS13_AES_128_GCM_SHA256,
        };
    });

    assert_eq!(
        handshake_error_and_alert(client, other_suite, unaltered, server),
        (
            ErrorFromPeer::Client(Error::PeerMisbehaved(
                PeerMisbehaved::SelectedDifferentCipherSuiteAfterRetry
            )),
            Some(AlertDescription::IllegalParameter)
        )
    );
}

fn single_group_pair() -> (ClientConnection, ServerConnection) {
    let kt = KeyType::EcdsaP256;
    let client_config = finish_client_config(
        kt,
        client_config_builder()
            .with_kx_groups(&[NamedGroup::secp256r1])
            .with_key_share_groups(&[NamedGroup::secp256r1]),
    );
    make_pair_for_configs(client_config, make_server_config(kt))
}

fn push_key_share(ch: &mut ClientHelloPayload, share: KeyShareEntry) {
    for ext in ch.extensions.iter_mut() {
        if let ClientExtension::KeyShare(shares) = ext {
            shares.push(share);
            return;
        }
    }
}

#[test]
fn key_share_for_unadvertised_group_is_refused() {
    let (client, server) = single_group_pair();

    let extra_share = alter_client_hello(|ch| {
        push_key_share(ch, KeyShareEntry::new(NamedGroup::secp384r1, vec![0x04; 97]))
    });

    assert_eq!(
        handshake_error_and_alert(client, unaltered, extra_share, server),
        (
            ErrorFromPeer::Server(Error::PeerMisbehaved(
                PeerMisbehaved::KeyShareForUnadvertisedGroup
            )),
            Some(AlertDescription::IllegalParameter)
        )
    );
}

#[test]
fn duplicate_key_shares_are_refused() {
    let (client, server) = single_group_pair();

    let repeated_share = alter_client_hello(|ch| {
        push_key_share(ch, KeyShareEntry::new(NamedGroup::secp256r1, vec![0x04; 65]))
    });

    assert_eq!(
        handshake_error_and_alert(client, unaltered, repeated_share, server),
        (
            ErrorFromPeer::Server(Error::PeerMisbehaved(
                PeerMisbehaved::OfferedDuplicateKeyShares
            )),
            Some(AlertDescription::IllegalParameter)
        )
    );
}

#[test]
fn second_hello_must_offer_retry_suite() {
    let (client, server) = retry_pair(NamedGroup::secp256r1, NamedGroup::secp384r1);
    let retry_suite = Cell::new(None);

    let watch_retry = alter_retry(|hrr| retry_suite.set(Some(hrr.cipher_suite)));
    let drop_retry_suite = alter_client_hello(|ch| {
        if let Some(suite) = retry_suite.get() {
            ch.cipher_suites.retain(|cs| *cs != suite);
        }
    });

    assert_eq!(
        handshake_error_and_alert(client, watch_retry, drop_retry_suite, server),
        (
            ErrorFromPeer::Server(Error::PeerMisbehaved(
                PeerMisbehaved::RefusedToFollowHelloRetryRequest
            )),
            Some(AlertDescription::IllegalParameter)
        )
    );
}
