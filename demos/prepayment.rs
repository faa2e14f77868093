/// prepayment - compare reducing the term against reducing the installment
use chrono::{Duration, TimeZone, Utc};
use loan_amortization_rs::{
    EngineConfig, InMemoryLoanStore, Loan, LoanEngine, Money, Rate, ReductionMode, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== prepayment example ===\n");

    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .ok_or("invalid start time")?;
    let time = SafeTimeProvider::new(TimeSource::Test(start));
    let controller = time.test_control().expect("clock is in test mode");

    let mut engine = LoanEngine::new(InMemoryLoanStore::new(), EngineConfig::default(), &time)?;
    let loan = Loan::builder()
        .name("Piso Zaragoza")
        .principal(Money::from_major(180_000))
        .signing_date(time.now().date_naive())
        .term_months(360)
        .fixed_rate(Rate::from_percentage(3))
        .partial_prepayment_fee(Rate::from_percentage(1))
        .build()?;
    let id = loan.id;
    let plan = engine.register(loan)?;
    println!("installment: {}", plan.periods()[0].installment);

    // a year later
    controller.advance(Duration::days(380));
    println!("today: {}", engine.today());

    for mode in [ReductionMode::ReduceTerm, ReductionMode::ReducePayment] {
        let result = engine.simulate_prepayment(id, Money::from_major(20_000), mode)?;
        println!(
            "{}: fee {}, installment {} -> {}, periods {} -> {}, interest saved {}, break-even {:?}",
            mode,
            result.fee,
            result.original_installment,
            result.new_installment,
            result.original_remaining_periods,
            result.new_remaining_periods,
            result.interest_saved,
            result.break_even_periods
        );
    }

    let applied = engine.apply_prepayment(id, Money::from_major(20_000), ReductionMode::ReducePayment)?;
    println!("\napplied, outstanding {}", applied.loan.principal_outstanding);
    println!("{}", engine.view(id)?.to_json_pretty()?);
    println!("events: {}", engine.take_events().len());

    Ok(())
}
