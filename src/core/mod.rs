mod engine;
mod error;
mod gap;
mod types;

pub use engine::{DEFAULT_MONTHS, month_record, organic_units, paid_units, run_projection};
pub use error::ModelError;
pub use gap::{
    AcquisitionCostReduction, FixedCostReduction, GapAnalysis, GapOutcome, Infeasibility, Lever,
    PriceIncrease, Strategies, analyze_gap, analyze_projection,
};
pub use types::{
    CostCategory, FeeRates, FixedCosts, MAX_MONTHLY_UNITS, MonthlyRecord, Projection,
    ProjectionSummary, Ratio, SimulationInputs, UnitCosts,
};
