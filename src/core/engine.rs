use super::ModelError;
use super::types::{MonthlyRecord, Projection, Ratio, SimulationInputs};

pub const DEFAULT_MONTHS: u32 = 36;

/// Projects `months` consecutive months of profit and loss.
///
/// Every non-cumulative figure of a month depends only on the inputs and the month
/// index; the running profit is a prefix sum threaded through afterwards.
pub fn run_projection(inputs: &SimulationInputs, months: u32) -> Result<Projection, ModelError> {
    if months == 0 {
        return Err(ModelError::EmptyHorizon);
    }

    let records = (0..months)
        .scan(0.0, |cumulative, index| {
            let record = month_record(inputs, index, *cumulative);
            *cumulative = record.cumulative_profit;
            Some(record)
        })
        .collect();

    Projection::from_records(records)
}

/// Builds the record for 0-based month `index`, given the cumulative operating
/// profit of all earlier months.
pub fn month_record(
    inputs: &SimulationInputs,
    index: u32,
    previous_cumulative: f64,
) -> MonthlyRecord {
    let paid_units = paid_units(inputs);
    let organic_units = organic_units(inputs, index);
    let units = paid_units.saturating_add(organic_units);

    let sales = units as f64 * inputs.unit_price;
    let variable_cost = units as f64 * inputs.unit_costs.per_unit_total()
        + sales * inputs.fee_rates.total();
    let gross_profit = sales - variable_cost;

    let ad_spend = inputs.ad_budget;
    let fixed_cost = inputs.fixed_costs.total();
    let operating_profit = gross_profit - ad_spend - fixed_cost;

    let marginal_profit_ratio = Ratio::guarded(gross_profit, sales);
    let break_even_sales = break_even_sales(fixed_cost + ad_spend, marginal_profit_ratio);

    let month = index + 1;
    MonthlyRecord {
        month,
        label: format!("Month {month}"),
        paid_units,
        organic_units,
        units,
        sales,
        variable_cost,
        gross_profit,
        ad_spend,
        fixed_cost,
        operating_profit,
        cumulative_profit: previous_cumulative + operating_profit,
        marginal_profit_ratio,
        break_even_sales,
        total_cost: variable_cost + ad_spend + fixed_cost,
    }
}

/// Paid acquisitions per month; constant over the horizon. Saturates at `u64::MAX`.
pub fn paid_units(inputs: &SimulationInputs) -> u64 {
    if inputs.cpa > 0.0 {
        (inputs.ad_budget / inputs.cpa).floor() as u64
    } else {
        0
    }
}

/// Organic acquisitions in 0-based month `index`; growth starts after the first month.
pub fn organic_units(inputs: &SimulationInputs, index: u32) -> u64 {
    let grown = inputs.organic_baseline as f64 * inputs.organic_growth.powf(index as f64);
    grown.floor() as u64
}

/// Sales needed to cover `overhead`; only defined for a positive contribution margin.
fn break_even_sales(overhead: f64, marginal_profit_ratio: Ratio) -> Ratio {
    match marginal_profit_ratio {
        Ratio::Defined(ratio) if ratio > 0.0 => Ratio::Defined(overhead / ratio),
        _ => Ratio::Undefined,
    }
}
