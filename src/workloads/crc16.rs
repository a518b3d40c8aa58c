//! CRC-16/CCITT, reflected polynomial 0x8408, inverted and byte-swapped.

use rand_chacha::rand_core::RngCore;
use rand_chacha::ChaCha8Rng;

use super::{check_eq, CheckError, Variant, Workload};

const POLY: u16 = 0x8408;

/// `b"123456789"` must map to this value.
pub const CHECK_VALUE: u16 = 0x6e90;

static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ POLY } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

fn finish(crc: u16) -> u16 {
    (!crc).swap_bytes()
}

/// Bit-at-a-time reference implementation.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xffff;
    for &byte in data {
        let mut cur = byte as u16;
        for _ in 0..8 {
            if (crc & 1) ^ (cur & 1) != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
            cur >>= 1;
        }
    }
    finish(crc)
}

/// Byte-at-a-time lookup table implementation.
pub fn crc16_table(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xffff;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ byte as u16) & 0xff) as usize];
    }
    finish(crc)
}

fn bench_crc16(data: &Vec<u8>) -> u16 {
    crc16(data)
}

fn bench_crc16_table(data: &Vec<u8>) -> u16 {
    crc16_table(data)
}

pub struct Crc16;

impl Workload for Crc16 {
    type Input = Vec<u8>;
    type Output = u16;

    fn name(&self) -> &'static str {
        "crc16"
    }

    fn initialize(&self, size: usize, rng: &mut ChaCha8Rng) -> Vec<u8> {
        let mut data = vec![0u8; size];
        rng.fill_bytes(&mut data);
        data
    }

    fn test(&self) -> Result<(), CheckError> {
        let s = b"\x31\x32\x33\x34\x35\x36\x37\x38\x39";
        check_eq("crc16(\"123456789\")", crc16(s), CHECK_VALUE)?;
        check_eq("crc16_table(\"123456789\")", crc16_table(s), CHECK_VALUE)
    }

    fn variants(&self) -> Vec<Variant<Vec<u8>, u16>> {
        vec![
            Variant {
                name: "crc16",
                run: bench_crc16,
            },
            Variant {
                name: "crc16_table",
                run: bench_crc16_table,
            },
        ]
    }
}
