use std::fmt;

use serde::Serialize;

use super::ModelError;
use super::types::{MonthlyRecord, Projection, Ratio, SimulationInputs};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapAnalysis {
    pub target_margin: f64,
    pub achieved_sales: f64,
    pub achieved_profit: f64,
    pub achieved_margin: Ratio,
    /// Extra monthly operating profit needed to reach the target; <= 0 when met.
    pub gap_profit: f64,
    pub outcome: GapOutcome,
}

impl GapAnalysis {
    pub fn target_met(&self) -> bool {
        matches!(self.outcome, GapOutcome::TargetMet)
    }

    pub fn strategies(&self) -> Option<&Strategies> {
        match &self.outcome {
            GapOutcome::TargetMet => None,
            GapOutcome::BelowTarget { strategies } => Some(strategies),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum GapOutcome {
    TargetMet,
    BelowTarget { strategies: Strategies },
}

/// Three single-lever fixes, each assuming every other input stays put.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategies {
    pub price_increase: Lever<PriceIncrease>,
    pub fixed_cost_reduction: Lever<FixedCostReduction>,
    pub acquisition_cost_reduction: Lever<AcquisitionCostReduction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "kebab-case")]
pub enum Lever<T> {
    Feasible(T),
    Infeasible(Infeasibility),
}

impl<T> Lever<T> {
    pub fn target(&self) -> Option<&T> {
        match self {
            Lever::Feasible(target) => Some(target),
            Lever::Infeasible(_) => None,
        }
    }

    pub fn infeasibility(&self) -> Option<Infeasibility> {
        match self {
            Lever::Feasible(_) => None,
            Lever::Infeasible(reason) => Some(*reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceIncrease {
    pub current_price: f64,
    pub increase: f64,
    pub target_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedCostReduction {
    pub current_fixed_cost: f64,
    pub reduction: f64,
    pub target_fixed_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionCostReduction {
    pub current_cpa: f64,
    /// Held at `ad_budget / cpa` without rounding.
    pub paid_units: f64,
    pub target_ad_budget: f64,
    pub target_cpa: f64,
}

/// Why a lever cannot close the gap on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum Infeasibility {
    NoUnitsSold,
    FixedCostsBelowZero { shortfall: f64 },
    NoPaidChannel,
    AdBudgetExhausted { budget: f64 },
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Infeasibility::NoUnitsSold => write!(f, "no units are sold, so price has no effect"),
            Infeasibility::FixedCostsBelowZero { shortfall } => write!(
                f,
                "fixed costs would have to fall {shortfall:.0} below zero"
            ),
            Infeasibility::NoPaidChannel => write!(f, "no paid channel to optimize"),
            Infeasibility::AdBudgetExhausted { budget } => write!(
                f,
                "the ad budget would have to drop to {budget:.0}, leaving no valid CPA"
            ),
        }
    }
}

/// Gap analysis on the final month of a projection.
pub fn analyze_projection(
    projection: &Projection,
    inputs: &SimulationInputs,
    target_margin: f64,
) -> Result<GapAnalysis, ModelError> {
    analyze_gap(projection.last(), inputs, target_margin)
}

/// Measures how far `record` falls short of `target_margin` and derives the
/// price, fixed-cost and acquisition-cost levers that would close the gap.
pub fn analyze_gap(
    record: &MonthlyRecord,
    inputs: &SimulationInputs,
    target_margin: f64,
) -> Result<GapAnalysis, ModelError> {
    validate_target_margin(target_margin)?;

    let gap_profit = record.sales * target_margin - record.operating_profit;
    let outcome = if gap_profit <= 0.0 {
        GapOutcome::TargetMet
    } else {
        GapOutcome::BelowTarget {
            strategies: Strategies {
                price_increase: price_increase(record, inputs, gap_profit),
                fixed_cost_reduction: fixed_cost_reduction(inputs, gap_profit),
                acquisition_cost_reduction: acquisition_cost_reduction(inputs, gap_profit),
            },
        }
    };

    Ok(GapAnalysis {
        target_margin,
        achieved_sales: record.sales,
        achieved_profit: record.operating_profit,
        achieved_margin: record.operating_margin(),
        gap_profit,
        outcome,
    })
}

fn price_increase(
    record: &MonthlyRecord,
    inputs: &SimulationInputs,
    gap_profit: f64,
) -> Lever<PriceIncrease> {
    if record.units == 0 {
        return Lever::Infeasible(Infeasibility::NoUnitsSold);
    }
    let increase = gap_profit / record.units as f64;
    Lever::Feasible(PriceIncrease {
        current_price: inputs.unit_price,
        increase,
        target_price: inputs.unit_price + increase,
    })
}

fn fixed_cost_reduction(inputs: &SimulationInputs, gap_profit: f64) -> Lever<FixedCostReduction> {
    let current_fixed_cost = inputs.fixed_costs.total();
    let target_fixed_cost = current_fixed_cost - gap_profit;
    if target_fixed_cost < 0.0 {
        return Lever::Infeasible(Infeasibility::FixedCostsBelowZero {
            shortfall: -target_fixed_cost,
        });
    }
    Lever::Feasible(FixedCostReduction {
        current_fixed_cost,
        reduction: gap_profit,
        target_fixed_cost,
    })
}

fn acquisition_cost_reduction(
    inputs: &SimulationInputs,
    gap_profit: f64,
) -> Lever<AcquisitionCostReduction> {
    let paid_units = if inputs.cpa > 0.0 {
        inputs.ad_budget / inputs.cpa
    } else {
        0.0
    };
    if paid_units <= 0.0 {
        return Lever::Infeasible(Infeasibility::NoPaidChannel);
    }

    let target_ad_budget = inputs.ad_budget - gap_profit;
    // A zero budget maps to CPA 0, which the projection reads as "no paid channel".
    if target_ad_budget <= 0.0 {
        return Lever::Infeasible(Infeasibility::AdBudgetExhausted {
            budget: target_ad_budget,
        });
    }

    Lever::Feasible(AcquisitionCostReduction {
        current_cpa: inputs.cpa,
        paid_units,
        target_ad_budget,
        target_cpa: target_ad_budget / paid_units,
    })
}

fn validate_target_margin(target_margin: f64) -> Result<(), ModelError> {
    if !target_margin.is_finite() || target_margin <= 0.0 || target_margin > 1.0 {
        return Err(ModelError::InvalidTargetMargin(target_margin));
    }
    Ok(())
}
