//! Order-level discount codes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::pricing::AppliedCoupon;
use crate::domain::value_objects::Percentage;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    pub code: String,
    pub percentage: Percentage,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: Option<u32>,
    #[serde(default)]
    pub uses: u32,
}

impl DiscountCode {
    pub fn new(code: impl Into<String>, percentage: Percentage) -> Self {
        Self { code: code.into().trim().to_uppercase(), percentage, active: true, expires_at: None, max_uses: None, uses: 0 }
    }

    /// Checks the code can be redeemed at `now` and returns what pricing needs.
    pub fn redeem(&self, now: DateTime<Utc>) -> Result<AppliedCoupon, DiscountCodeError> {
        if !self.active { return Err(DiscountCodeError::Inactive); }
        if self.expires_at.is_some_and(|exp| exp <= now) { return Err(DiscountCodeError::Expired); }
        if self.max_uses.is_some_and(|max| self.uses >= max) { return Err(DiscountCodeError::Exhausted); }
        Ok(AppliedCoupon { code: self.code.clone(), percentage: self.percentage })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum DiscountCodeError { Inactive, Expired, Exhausted }
impl std::error::Error for DiscountCodeError {}
impl std::fmt::Display for DiscountCodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::Inactive => write!(f, "inactive"), Self::Expired => write!(f, "expired"), Self::Exhausted => write!(f, "usage limit reached") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_redeem_rules() {
        let now = Utc::now();
        let mut code = DiscountCode::new("promo10", Percentage::new(dec!(10)).unwrap());
        assert_eq!(code.redeem(now).unwrap().code, "PROMO10");
        code.expires_at = Some(now - Duration::minutes(1));
        assert_eq!(code.redeem(now), Err(DiscountCodeError::Expired));
        code.expires_at = None;
        code.max_uses = Some(3);
        code.uses = 3;
        assert_eq!(code.redeem(now), Err(DiscountCodeError::Exhausted));
        code.active = false;
        assert_eq!(code.redeem(now), Err(DiscountCodeError::Inactive));
    }
}
