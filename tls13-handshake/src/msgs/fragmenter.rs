use crate::enums::{ContentType, ProtocolVersion};
use crate::msgs::message::BorrowedPlainMessage;

/// Largest TLSPlaintext fragment, 2^14.
pub(crate) const MAX_FRAGMENT_LEN: usize = 16384;

/// Split `payload` into records of type `typ` carrying at most
/// [`MAX_FRAGMENT_LEN`] bytes each.  An empty payload gives no records.
pub(crate) fn fragment_slice(
    typ: ContentType,
    version: ProtocolVersion,
    payload: &[u8],
) -> impl Iterator<Item = BorrowedPlainMessage<'_>> {
    payload
        .chunks(MAX_FRAGMENT_LEN)
        .map(move |c| BorrowedPlainMessage {
            typ,
            version,
            payload: c,
        })
}

#[cfg(test)]
mod tests {
    use super::{fragment_slice, MAX_FRAGMENT_LEN};
    use crate::enums::{ContentType, ProtocolVersion};

    #[test]
    fn long_payload_is_split_at_fragment_limit() {
        let data: Vec<u8> = (0..MAX_FRAGMENT_LEN * 2 + 70)
            .map(|i| i as u8)
            .collect();

        let q = fragment_slice(ContentType::ApplicationData, ProtocolVersion::TLSv1_2, &data)
            .collect::<Vec<_>>();
        assert_eq!(q.len(), 3);
        assert_eq!(q[0].payload, &data[..MAX_FRAGMENT_LEN]);
        assert_eq!(q[1].payload, &data[MAX_FRAGMENT_LEN..MAX_FRAGMENT_LEN * 2]);
        assert_eq!(q[2].payload, &data[MAX_FRAGMENT_LEN * 2..]);

        // each record is a 5-byte header plus its slice
        let first = q[0].to_unencrypted_opaque().encode();
        assert_eq!(first.len(), 5 + MAX_FRAGMENT_LEN);
        assert_eq!(&first[..3], &[0x17, 0x03, 0x03]);
    }

    #[test]
    fn short_handshake_payload_is_one_record() {
        let q = fragment_slice(
            ContentType::Handshake,
            ProtocolVersion::TLSv1_2,
            b"\x01\x02\x03\x04\x05\x06\x07\x08",
        )
        .collect::<Vec<_>>();
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].typ, ContentType::Handshake);
        assert_eq!(
            q[0].to_unencrypted_opaque().encode(),
            b"\x16\x03\x03\x00\x08\x01\x02\x03\x04\x05\x06\x07\x08"
        );
    }

    #[test]
    fn empty_payload_gives_no_records() {
        assert_eq!(
            fragment_slice(ContentType::ApplicationData, ProtocolVersion::TLSv1_2, &[]).count(),
            0
        );
    }
}
