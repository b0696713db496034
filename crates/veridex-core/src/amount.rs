//! # Token Amounts
//!
//! Monetary values as `i64` smallest currency units with an explicit
//! [`Currency`] tag (code + decimal precision). All arithmetic is checked:
//! combining different currencies or overflowing the i64 range is a
//! structured [`AmountError`], never a silent wrap or a float.
//!
//! ## Determinism
//!
//! Settlement math must be byte-for-byte reproducible by independent
//! verifiers, which rules out floating point entirely. Percentage splits
//! are expressed as integer numerator/denominator division with explicit
//! floor semantics at the call site.

use serde::{Deserialize, Serialize};

use crate::error::{AmountError, ValidationError};

/// A currency tag: ISO-style code plus decimal precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency {
    /// Currency code (e.g., "VDX", "USD").
    pub code: String,
    /// Number of decimal places one unit is subdivided into.
    pub precision: u8,
}

impl Currency {
    /// Create a currency tag.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCurrencyCode`] if the code is
    /// empty or contains characters outside ASCII uppercase.
    pub fn new(code: impl Into<String>, precision: u8) -> Result<Self, ValidationError> {
        let code = code.into();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidCurrencyCode(code));
        }
        Ok(Self { code, precision })
    }

    /// The marketplace's native settlement currency.
    pub fn vdx() -> Self {
        Self {
            code: "VDX".to_string(),
            precision: 4,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// A monetary amount in smallest currency units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAmount {
    /// Amount in smallest units (may be negative in intermediate math;
    /// ledgers enforce non-negativity at their own boundaries).
    pub amount: i64,
    /// The currency this amount is denominated in.
    pub currency: Currency,
}

impl TokenAmount {
    /// Create an amount in the given currency.
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// The zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Whether this amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    /// Whether this amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Checked addition.
    ///
    /// # Errors
    ///
    /// [`AmountError::CurrencyMismatch`] if the currencies differ,
    /// [`AmountError::Overflow`] on i64 overflow.
    pub fn checked_add(&self, other: &TokenAmount) -> Result<TokenAmount, AmountError> {
        self.require_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(AmountError::Overflow)?;
        Ok(TokenAmount::new(amount, self.currency.clone()))
    }

    /// Checked subtraction.
    ///
    /// # Errors
    ///
    /// [`AmountError::CurrencyMismatch`] if the currencies differ,
    /// [`AmountError::Overflow`] on i64 overflow.
    pub fn checked_sub(&self, other: &TokenAmount) -> Result<TokenAmount, AmountError> {
        self.require_same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(AmountError::Overflow)?;
        Ok(TokenAmount::new(amount, self.currency.clone()))
    }

    /// Require this amount to be strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::NonPositive`] otherwise.
    pub fn require_positive(&self) -> Result<(), AmountError> {
        if self.amount <= 0 {
            return Err(AmountError::NonPositive(self.amount));
        }
        Ok(())
    }

    fn require_same_currency(&self, other: &TokenAmount) -> Result<(), AmountError> {
        if self.currency != other.currency {
            return Err(AmountError::CurrencyMismatch {
                left: self.currency.code.clone(),
                right: other.currency.code.clone(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vdx(amount: i64) -> TokenAmount {
        TokenAmount::new(amount, Currency::vdx())
    }

    #[test]
    fn currency_rejects_invalid_codes() {
        assert!(Currency::new("", 4).is_err());
        assert!(Currency::new("vdx", 4).is_err());
        assert!(Currency::new("VD1", 4).is_err());
        assert!(Currency::new("VDX", 4).is_ok());
    }

    #[test]
    fn checked_add_same_currency() {
        let sum = vdx(100).checked_add(&vdx(250)).unwrap();
        assert_eq!(sum.amount, 350);
        assert_eq!(sum.currency.code, "VDX");
    }

    #[test]
    fn checked_add_rejects_mixed_currencies() {
        let usd = TokenAmount::new(100, Currency::new("USD", 2).unwrap());
        let result = vdx(100).checked_add(&usd);
        assert!(matches!(result, Err(AmountError::CurrencyMismatch { .. })));
    }

    #[test]
    fn checked_add_detects_overflow() {
        let result = vdx(i64::MAX).checked_add(&vdx(1));
        assert!(matches!(result, Err(AmountError::Overflow)));
    }

    #[test]
    fn checked_sub_may_go_negative() {
        // Intermediate math may be negative; ledgers enforce their own floor.
        let diff = vdx(100).checked_sub(&vdx(150)).unwrap();
        assert_eq!(diff.amount, -50);
    }

    #[test]
    fn require_positive() {
        assert!(vdx(1).require_positive().is_ok());
        assert!(vdx(0).require_positive().is_err());
        assert!(vdx(-1).require_positive().is_err());
    }

    #[test]
    fn display_includes_code() {
        assert_eq!(format!("{}", vdx(5000)), "5000 VDX");
    }

    #[test]
    fn serde_roundtrip() {
        let amount = vdx(12345);
        let json = serde_json::to_string(&amount).unwrap();
        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
