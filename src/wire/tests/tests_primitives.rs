#[cfg(test)]
mod tests {
    use crate::wire::{Reader, WireError, put_bytes, put_f64, put_i64, put_str, put_u8, put_u32};

    #[test]
    fn test_integer_round_trip() {
        let mut buf = Vec::new();
        put_u8(&mut buf, 0x7F);
        put_u32(&mut buf, 123_456);
        put_i64(&mut buf, -42);
        put_i64(&mut buf, i64::MAX);

        let mut r = Reader::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 0x7F);
        assert_eq!(r.read_u32().unwrap(), 123_456);
        assert_eq!(r.read_i64().unwrap(), -42);
        assert_eq!(r.read_i64().unwrap(), i64::MAX);
        r.expect_end().unwrap();
    }

    #[test]
    fn test_f64_bit_exact() {
        let mut buf = Vec::new();
        put_f64(&mut buf, 1.000_000_1);
        put_f64(&mut buf, -0.0);

        let mut r = Reader::new(&buf);
        assert_eq!(r.read_f64().unwrap().to_bits(), 1.000_000_1_f64.to_bits());
        assert_eq!(r.read_f64().unwrap().to_bits(), (-0.0_f64).to_bits());
    }

    #[test]
    fn test_bytes_and_str_round_trip() {
        let mut buf = Vec::new();
        put_bytes(&mut buf, b"\x00\xFF\x10").unwrap();
        put_str(&mut buf, "bucket").unwrap();
        put_bytes(&mut buf, b"").unwrap();

        let mut r = Reader::new(&buf);
        assert_eq!(r.read_bytes().unwrap(), b"\x00\xFF\x10".to_vec());
        assert_eq!(r.read_str().unwrap(), "bucket");
        assert_eq!(r.read_bytes().unwrap(), Vec::<u8>::new());
        r.expect_end().unwrap();
    }

    #[test]
    fn test_truncated_read_reports_eof() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 9);

        let mut r = Reader::new(&buf[..2]);
        match r.read_u32() {
            Err(WireError::UnexpectedEof { needed, available }) => {
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_payload_reports_eof() {
        let mut buf = Vec::new();
        put_bytes(&mut buf, b"abcdef").unwrap();
        buf.truncate(buf.len() - 3);

        let mut r = Reader::new(&buf);
        assert!(matches!(
            r.read_bytes(),
            Err(WireError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut buf = Vec::new();
        put_bytes(&mut buf, &[0xC3, 0x28]).unwrap();

        let mut r = Reader::new(&buf);
        assert!(matches!(r.read_str(), Err(WireError::InvalidUtf8(_))));
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let mut buf = Vec::new();
        put_u8(&mut buf, 1);
        put_u8(&mut buf, 2);

        let mut r = Reader::new(&buf);
        r.read_u8().unwrap();
        match r.expect_end() {
            Err(WireError::TrailingBytes(n)) => assert_eq!(n, 1),
            other => panic!("expected TrailingBytes, got {other:?}"),
        }
    }
}
