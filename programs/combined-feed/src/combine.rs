use anchor_lang::prelude::*;
use primitive_types::U256;

use crate::ErrorCode;

fn exp10(exponent: u32) -> Option<U256> {
    U256::from(10u8).checked_pow(U256::from(exponent))
}

/// Multiplies two fixed-point answers and rescales the product to `decimals` places.
///
/// `answer_x * answer_y * 10^decimals / 10^(decimals_x + decimals_y)`, with the division
/// truncating toward zero. Intermediates are 256 bit; results that do not fit the `i128`
/// answer domain fail with `Overflow`.
pub fn combine(
    answer_x: i128,
    answer_y: i128,
    decimals_x: u8,
    decimals_y: u8,
    decimals: u8,
) -> Result<i128> {
    let negative = (answer_x < 0) != (answer_y < 0);

    let numerator = U256::from(answer_x.unsigned_abs())
        .checked_mul(U256::from(answer_y.unsigned_abs()))
        .zip(exp10(u32::from(decimals)))
        .and_then(|(product, scale)| product.checked_mul(scale))
        .ok_or(ErrorCode::Overflow)?;
    let denominator =
        exp10(u32::from(decimals_x) + u32::from(decimals_y)).ok_or(ErrorCode::Overflow)?;

    // dividing magnitudes truncates toward zero for either sign
    let magnitude = numerator / denominator;

    let limit = if negative {
        U256::from(i128::MIN.unsigned_abs())
    } else {
        U256::from(i128::MAX.unsigned_abs())
    };
    require!(magnitude <= limit, Overflow);

    let magnitude = magnitude.low_u128() as i128;
    Ok(if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    })
}
