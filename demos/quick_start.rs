/// quick start - bonified fixed-rate mortgage and its payment plan
use chrono::NaiveDate;
use loan_amortization_rs::{
    build_schedule, calculate_bonification_savings, Bonification, BonificationRule, BonificationStatus,
    EngineConfig, Loan, Money, Rate,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== quick start ===\n");

    let signing = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid signing date")?;

    // 180,000 over 30 years at 3.20% with two bonifications
    let loan = Loan::builder()
        .name("Piso Zaragoza")
        .principal(Money::from_major(180_000))
        .signing_date(signing)
        .term_months(360)
        .fixed_rate(Rate::from_decimal(dec!(0.032)))
        .charge_day(5)
        .max_bonification_rate(Rate::from_bps(60))
        .bonification(
            Bonification::new("nomina", Rate::from_bps(40), BonificationRule::PayrollDeposit {
                minimum_monthly_amount: Money::from_major(1_800),
            })
            .with_status(BonificationStatus::Met),
        )
        .bonification(
            Bonification::new("seguro hogar", Rate::from_bps(20), BonificationRule::HomeInsurance { active: true })
                .with_status(BonificationStatus::Met)
                .with_annual_cost(Money::from_major(260)),
        )
        .build()?;

    let plan = build_schedule(&loan, &EngineConfig::default())?;
    println!("periods: {}", plan.len());
    println!("total interest: {}", plan.total_interest());
    for period in plan.periods().iter().take(3) {
        println!(
            "{} {} rate {} installment {} (interest {}, principal {})",
            period.label,
            period.charge_date,
            period.annual_rate,
            period.installment,
            period.interest_component,
            period.principal_component
        );
    }

    let savings = calculate_bonification_savings(&loan)?;
    println!(
        "\nbonifications save {} per month ({} -> {})",
        savings.total_savings_per_month, savings.base_payment, savings.bonified_payment
    );
    for item in &savings.per_bonification {
        println!("  {}: {} per year, net {}", item.name, item.savings_per_year, item.net_annual_benefit);
    }

    println!("\n{}", loan.json()?);
    Ok(())
}
