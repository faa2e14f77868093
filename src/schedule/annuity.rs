use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};

/// french installment: P * r / (1 - (1 + r)^-n), or P / n at zero rate
pub fn installment(principal: Money, annual_rate: Rate, periods: u32) -> Money {
    if periods == 0 {
        return principal;
    }

    let r = annual_rate.monthly_rate().as_decimal();

    if r.is_zero() {
        return principal / Decimal::from(periods);
    }

    // (1 + r)^n by repeated multiplication
    let mut compound = Decimal::ONE;
    let base = Decimal::ONE + r;
    for _ in 0..periods {
        compound *= base;
    }

    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return principal / Decimal::from(periods);
    }

    Money::from_decimal(principal.as_decimal() * r * compound / denominator)
}

/// whole months needed to repay `principal` with a fixed installment:
/// n = -ln(1 - P*r/I) / ln(1 + r), rounded up
pub fn term_for_installment(principal: Money, annual_rate: Rate, payment: Money) -> Result<u32> {
    if principal.is_zero() {
        return Ok(0);
    }
    if !payment.is_positive() {
        return Err(EngineError::degenerate(format!(
            "installment {} cannot repay principal {}",
            payment, principal
        )));
    }

    let r = annual_rate.monthly_rate().as_decimal();

    if r <= Decimal::ZERO {
        let months = (principal.as_decimal() / payment.as_decimal()).ceil();
        return to_months(months);
    }

    let ratio = Decimal::ONE - principal.as_decimal() * r / payment.as_decimal();
    if ratio <= Decimal::ZERO {
        return Err(EngineError::degenerate(format!(
            "installment {} does not cover monthly interest on {}",
            payment, principal
        )));
    }

    let numerator = ratio
        .checked_ln()
        .ok_or_else(|| EngineError::degenerate("logarithm of repayment ratio undefined"))?;
    let denominator = (Decimal::ONE + r)
        .checked_ln()
        .ok_or_else(|| EngineError::degenerate("logarithm of growth factor undefined"))?;
    if denominator.is_zero() {
        return Err(EngineError::degenerate("monthly rate too small to solve for term"));
    }

    // strip series noise before rounding up
    let months = (-numerator / denominator).round_dp(8).ceil();
    to_months(months)
}

fn to_months(months: Decimal) -> Result<u32> {
    months
        .to_u32()
        .ok_or_else(|| EngineError::degenerate(format!("term of {} months is out of range", months)))
}

/// one amortizing period split into interest and principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentSplit {
    pub installment: Money,
    pub interest: Money,
    pub principal: Money,
    pub ending_balance: Money,
}

/// split an installment over the current balance; the last period (or any
/// installment that would overshoot) pays the balance off exactly
pub fn split_installment(
    balance: Money,
    annual_rate: Rate,
    payment: Money,
    is_last: bool,
) -> InstallmentSplit {
    let interest = monthly_interest(balance, annual_rate);
    let principal = payment - interest;

    if is_last || principal >= balance {
        return InstallmentSplit {
            installment: interest + balance,
            interest,
            principal: balance,
            ending_balance: Money::ZERO,
        };
    }

    InstallmentSplit {
        installment: payment,
        interest,
        principal,
        ending_balance: balance - principal,
    }
}

/// standard monthly convention: balance * annual / 12
pub fn monthly_interest(balance: Money, annual_rate: Rate) -> Money {
    Money::from_decimal(balance.as_decimal() * annual_rate.monthly_rate().as_decimal())
}

/// amortize `principal` at a constant rate and installment for up to
/// `periods` months
pub fn project(principal: Money, annual_rate: Rate, payment: Money, periods: u32) -> Vec<InstallmentSplit> {
    let mut rows = Vec::with_capacity(periods as usize);
    let mut balance = principal;

    for k in 0..periods {
        if !balance.is_positive() {
            break;
        }
        let split = split_installment(balance, annual_rate, payment, k + 1 == periods);
        balance = split.ending_balance;
        rows.push(split);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reference_mortgage_installment() {
        let emi = installment(Money::from_major(180_000), Rate::from_percentage(3), 360);
        assert_eq!(emi, Money::from_str_exact("758.89").unwrap());
    }

    #[test]
    fn test_installment_zero_rate() {
        let emi = installment(Money::from_major(12_000), Rate::ZERO, 12);
        assert_eq!(emi, Money::from_major(1_000));
    }

    #[test]
    fn test_installment_no_periods_returns_principal() {
        assert_eq!(installment(Money::from_major(500), Rate::from_percentage(3), 0), Money::from_major(500));
    }

    #[test]
    fn test_term_for_installment_inverts_installment() {
        let principal = Money::from_major(100_000);
        let rate = Rate::from_percentage(12);
        let emi = installment(principal, rate, 24);

        let term = term_for_installment(principal, rate, emi).unwrap();
        assert!((24..=25).contains(&term));

        let shorter = term_for_installment(Money::from_major(80_000), rate, emi).unwrap();
        assert!(shorter < 24);
    }

    #[test]
    fn test_term_zero_rate_rounds_up() {
        let term = term_for_installment(Money::from_major(1_050), Rate::ZERO, Money::from_major(100)).unwrap();
        assert_eq!(term, 11);
    }

    #[test]
    fn test_term_degenerate_inputs() {
        let principal = Money::from_major(100_000);
        assert!(matches!(
            term_for_installment(principal, Rate::ZERO, Money::ZERO),
            Err(EngineError::ArithmeticDegenerate { .. })
        ));
        // 1% monthly interest is 1,000, an installment of 900 never repays
        assert!(matches!(
            term_for_installment(principal, Rate::from_percentage(12), Money::from_major(900)),
            Err(EngineError::ArithmeticDegenerate { .. })
        ));
        assert_eq!(term_for_installment(Money::ZERO, Rate::ZERO, Money::ZERO).unwrap(), 0);
    }

    #[test]
    fn test_projection_pays_off_exactly() {
        let principal = Money::from_major(10_000);
        let rate = Rate::from_decimal(dec!(0.045));
        let emi = installment(principal, rate, 36);

        let rows = project(principal, rate, emi, 36);
        assert_eq!(rows.len(), 36);
        assert_eq!(rows.last().unwrap().ending_balance, Money::ZERO);

        let repaid: Money = rows.iter().map(|r| r.principal).sum();
        assert_eq!(repaid, principal);
    }

    #[test]
    fn test_split_overshoot_pays_balance() {
        let split = split_installment(Money::from_major(100), Rate::from_percentage(12), Money::from_major(500), false);
        assert_eq!(split.interest, Money::from_major(1));
        assert_eq!(split.principal, Money::from_major(100));
        assert_eq!(split.installment, Money::from_major(101));
        assert_eq!(split.ending_balance, Money::ZERO);
    }
}
