// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub use super::fvm_shared_latest::econ::TokenAmount;
use num_bigint::BigInt;

/// Cost of `gas` units at `gas_price` per unit.
pub fn gas_cost(gas_price: &TokenAmount, gas: u64) -> TokenAmount {
    TokenAmount::from_atto(gas_price.atto() * BigInt::from(gas))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_cost_multiplies_price() {
        assert_eq!(
            gas_cost(&TokenAmount::from_atto(3), 7),
            TokenAmount::from_atto(21)
        );
        assert!(gas_cost(&TokenAmount::from_atto(3), 0).is_zero());
    }
}
