//! Dallas/Maxim CRC-8 used by single-wire devices

/// CRC-8 with polynomial x^8 + x^5 + x^4 + 1 (0x31), processed LSB first.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut byte = byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0 {
                // 0x31 bit-reversed
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

/// True when the last byte of `data` is the CRC of everything before it.
pub fn check(data: &[u8]) -> bool {
    match data.split_last() {
        Some((&expected, body)) => crc8(body) == expected,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_rom_code() {
        // Family 0x02, serial 0x000001B81C; Maxim application note 27.
        assert_eq!(crc8(&[0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00]), 0xA2);
    }

    #[test]
    fn validates_scratchpad() {
        let scratchpad = [0x91, 0x01, 0x4B, 0x46, 0x7F, 0xFF, 0x0F, 0x10, 0x25];
        assert!(check(&scratchpad));

        let mut flipped = scratchpad;
        flipped[1] ^= 0x04;
        assert!(!check(&flipped));
    }

    #[test]
    fn empty_input_never_checks() {
        assert!(!check(&[]));
        assert_eq!(crc8(&[]), 0);
    }
}
