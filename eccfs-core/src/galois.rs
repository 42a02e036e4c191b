//! GF(2^8) arithmetic over the primitive polynomial x^8 + x^4 + x^3 + x^2 + 1.
//!
//! Addition is XOR. Multiplication and division go through log/antilog
//! tables built at compile time, so every operation is allocation-free.

use crate::error::{EccError, Result};

pub const FIELD_SIZE: usize = 256;
const PRIM_POLY: u16 = 0x11D;

struct Tables {
    log: [u8; FIELD_SIZE],
    // Doubled so `exp[log a + log b]` never needs a modulo.
    exp: [u8; 2 * FIELD_SIZE],
}

const fn build_tables() -> Tables {
    let mut log = [0u8; FIELD_SIZE];
    let mut exp = [0u8; 2 * FIELD_SIZE];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < FIELD_SIZE - 1 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIM_POLY;
        }
        i += 1;
    }
    let mut j = FIELD_SIZE - 1;
    while j < 2 * FIELD_SIZE {
        exp[j] = exp[j - (FIELD_SIZE - 1)];
        j += 1;
    }
    Tables { log, exp }
}

static TABLES: Tables = build_tables();

#[inline]
pub fn add(a: u8, b: u8) -> u8 {
    a ^ b
}

#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let idx = TABLES.log[a as usize] as usize + TABLES.log[b as usize] as usize;
    TABLES.exp[idx]
}

/// `a / b`; fails with `DivisionByZero` when `b` is the additive identity.
pub fn div(a: u8, b: u8) -> Result<u8> {
    if b == 0 {
        return Err(EccError::DivisionByZero);
    }
    if a == 0 {
        return Ok(0);
    }
    let idx = TABLES.log[a as usize] as usize + (FIELD_SIZE - 1) - TABLES.log[b as usize] as usize;
    Ok(TABLES.exp[idx])
}

/// Multiplicative inverse of a nonzero element.
pub fn inv(a: u8) -> Result<u8> {
    div(1, a)
}

/// Scale every byte of `region` by `factor` in place.
pub fn mul_region(region: &mut [u8], factor: u8) {
    match factor {
        0 => region.fill(0),
        1 => {}
        _ => {
            let lf = TABLES.log[factor as usize] as usize;
            for b in region.iter_mut() {
                if *b != 0 {
                    *b = TABLES.exp[TABLES.log[*b as usize] as usize + lf];
                }
            }
        }
    }
}

/// XOR-accumulate `src` into `dst` ("add parity").
pub fn add_region(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= *s;
    }
}
