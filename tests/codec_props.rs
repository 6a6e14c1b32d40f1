use gimbal_controller::{crc16, decode, encode, Error, CMD_READ_ANGLE, CMD_SET_ANGLE, FRAME_SIZE};
use proptest::prelude::*;

// Table-driven CRC-16/MODBUS, independent of the bitwise version under test.
fn crc16_table(bytes: &[u8]) -> u16 {
    let mut table = [0u16; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut crc = i as u16;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
        }
        *slot = crc;
    }
    bytes.iter().fold(0xFFFF, |crc, &b| {
        (crc >> 8) ^ table[((crc ^ b as u16) & 0xFF) as usize]
    })
}

proptest! {
    #[test]
    fn crc_matches_table_reference(bytes in proptest::collection::vec(any::<u8>(), 11)) {
        prop_assert_eq!(crc16(&bytes), crc16_table(&bytes));
        prop_assert_eq!(crc16(&bytes), crc16(&bytes));
    }

    #[test]
    fn frames_round_trip(
        id in any::<u8>(),
        cmd in prop_oneof![Just(0x94u8), Just(0xA4), Just(0x80), Just(0x81)],
        payload in proptest::collection::vec(any::<u8>(), 0..=7),
    ) {
        let frame = encode(id, cmd, &payload).unwrap();
        prop_assert_eq!(frame.len(), FRAME_SIZE);

        let (decoded_id, data) = decode(&frame).unwrap();
        prop_assert_eq!(decoded_id, id);
        prop_assert_eq!(data[0], cmd);
        prop_assert_eq!(&data[1..1 + payload.len()], &payload[..]);
        prop_assert!(data[1 + payload.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn oversize_payloads_are_rejected(len in 8usize..64) {
        let payload = vec![0xAAu8; len];
        prop_assert!(matches!(encode(1, CMD_SET_ANGLE, &payload), Err(Error::PayloadTooLong(n)) if n == len));
    }

    #[test]
    fn any_single_bit_flip_is_detected(id in any::<u8>(), byte in 0usize..FRAME_SIZE, bit in 0u8..8) {
        let mut frame = encode(id, CMD_READ_ANGLE, &[]).unwrap();
        frame[byte] ^= 1 << bit;
        prop_assert!(decode(&frame).is_err());
    }
}
