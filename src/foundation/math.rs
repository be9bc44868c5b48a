/// `x * y / 255` with rounding, for 8-bit channel and opacity products.
pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u8, y: u8) -> u8 {
    mul_div255_u16(u16::from(x), u16::from(y)) as u8
}

/// Rounded integer division for positive operands.
pub(crate) fn div_round(num: u32, den: u32) -> u32 {
    if den == 0 {
        return 0;
    }
    (num + den / 2) / den
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
