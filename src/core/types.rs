use serde::Serialize;

use super::ModelError;

/// Upper bound on units acquired in any single month.
pub const MAX_MONTHLY_UNITS: u64 = 1_000_000_000_000;

/// Outcome of a division that may have no meaningful value.
///
/// Serializes as a plain number, or `null` when undefined.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(into = "Option<f64>")]
pub enum Ratio {
    Defined(f64),
    Undefined,
}

impl Ratio {
    /// `numerator / denominator`, undefined when the denominator is zero.
    pub fn guarded(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            Ratio::Undefined
        } else {
            Ratio::Defined(numerator / denominator)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Ratio::Defined(value) => Some(value),
            Ratio::Undefined => None,
        }
    }

    /// Collapses `Undefined` to 0, the convention tabular consumers expect.
    pub fn value_or_zero(self) -> f64 {
        self.value().unwrap_or(0.0)
    }
}

impl From<Ratio> for Option<f64> {
    fn from(value: Ratio) -> Self {
        value.value()
    }
}

/// Costs incurred once per unit sold.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitCosts {
    pub goods: f64,
    pub shipping: f64,
    pub infrastructure: f64,
}

impl UnitCosts {
    pub fn per_unit_total(&self) -> f64 {
        self.goods + self.shipping + self.infrastructure
    }
}

/// Costs charged as a fraction of sales.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRates {
    pub payment: f64,
    pub platform: f64,
}

impl FeeRates {
    pub fn total(&self) -> f64 {
        self.payment + self.platform
    }
}

/// Monthly costs that do not move with volume.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedCosts {
    pub salary: f64,
    pub insurance: f64,
    pub outsourcing: f64,
    pub rent: f64,
    pub systems: f64,
    pub misc: f64,
}

impl FixedCosts {
    /// The only source of the fixed-cost aggregate; it is never stored.
    pub fn total(&self) -> f64 {
        self.salary + self.insurance + self.outsourcing + self.rent + self.systems + self.misc
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInputs {
    pub unit_price: f64,
    pub ad_budget: f64,
    /// Cost per paid acquisition; 0 means there is no paid channel.
    pub cpa: f64,
    pub organic_baseline: u64,
    /// Month-over-month multiplier on organic acquisitions, e.g. 1.05.
    pub organic_growth: f64,
    pub unit_costs: UnitCosts,
    pub fee_rates: FeeRates,
    pub fixed_costs: FixedCosts,
}

impl SimulationInputs {
    /// Range checks owned by whoever collects the inputs.
    ///
    /// The projection itself never calls this; it accepts whatever it is given.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.unit_price.is_finite() {
            return Err(invalid("unit_price", "finite", self.unit_price));
        }

        let non_negative = [
            ("ad_budget", self.ad_budget),
            ("cpa", self.cpa),
            ("goods_cost", self.unit_costs.goods),
            ("shipping_cost", self.unit_costs.shipping),
            ("infrastructure_cost", self.unit_costs.infrastructure),
            ("salary", self.fixed_costs.salary),
            ("insurance", self.fixed_costs.insurance),
            ("outsourcing", self.fixed_costs.outsourcing),
            ("rent", self.fixed_costs.rent),
            ("systems", self.fixed_costs.systems),
            ("misc", self.fixed_costs.misc),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, ">= 0", value));
            }
        }

        if !self.organic_growth.is_finite() || self.organic_growth <= 0.0 {
            return Err(invalid("organic_growth", "> 0", self.organic_growth));
        }

        for (field, rate) in [
            ("payment_fee", self.fee_rates.payment),
            ("platform_fee", self.fee_rates.platform),
        ] {
            if !(0.0..1.0).contains(&rate) {
                return Err(invalid(field, "within [0, 1)", rate));
            }
        }

        Ok(())
    }

    /// Rejects a horizon over which some month would acquire more than
    /// [`MAX_MONTHLY_UNITS`] units.
    pub fn validate_horizon(&self, months: u32) -> Result<(), ModelError> {
        if months == 0 {
            return Err(ModelError::EmptyHorizon);
        }

        let paid = if self.cpa > 0.0 {
            (self.ad_budget / self.cpa).floor()
        } else {
            0.0
        };
        // Organic volume peaks in the first month when shrinking, the last when growing.
        let peak_month = if self.organic_growth > 1.0 { months } else { 1 };
        let organic =
            (self.organic_baseline as f64 * self.organic_growth.powf(f64::from(peak_month - 1)))
                .floor();

        let units = paid + organic;
        if units.is_nan() || units > MAX_MONTHLY_UNITS as f64 {
            return Err(ModelError::ExcessiveVolume {
                month: peak_month,
                units,
                limit: MAX_MONTHLY_UNITS,
            });
        }
        Ok(())
    }
}

fn invalid(field: &'static str, requirement: &'static str, value: f64) -> ModelError {
    ModelError::InvalidInput {
        field,
        requirement,
        value,
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CostCategory {
    Variable,
    Advertising,
    Fixed,
}

impl CostCategory {
    pub fn label(self) -> &'static str {
        match self {
            CostCategory::Variable => "variable",
            CostCategory::Advertising => "advertising",
            CostCategory::Fixed => "fixed",
        }
    }
}

/// One projected month. Field names are the column contract of the output dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecord {
    pub month: u32,
    pub label: String,
    pub paid_units: u64,
    pub organic_units: u64,
    pub units: u64,
    pub sales: f64,
    pub variable_cost: f64,
    pub gross_profit: f64,
    pub ad_spend: f64,
    pub fixed_cost: f64,
    pub operating_profit: f64,
    pub cumulative_profit: f64,
    pub marginal_profit_ratio: Ratio,
    pub break_even_sales: Ratio,
    pub total_cost: f64,
}

impl MonthlyRecord {
    pub fn cost_breakdown(&self) -> [(CostCategory, f64); 3] {
        [
            (CostCategory::Variable, self.variable_cost),
            (CostCategory::Advertising, self.ad_spend),
            (CostCategory::Fixed, self.fixed_cost),
        ]
    }

    pub fn operating_margin(&self) -> Ratio {
        Ratio::guarded(self.operating_profit, self.sales)
    }
}

/// Headline figures for the last projected month.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub months: u32,
    pub final_sales: f64,
    pub final_operating_profit: f64,
    pub final_operating_margin: Ratio,
    pub final_break_even_sales: Ratio,
    pub final_units: u64,
    pub cumulative_profit: f64,
}

/// Chronological, non-empty run of monthly records.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    records: Vec<MonthlyRecord>,
}

impl Projection {
    pub(super) fn from_records(records: Vec<MonthlyRecord>) -> Result<Self, ModelError> {
        if records.is_empty() {
            return Err(ModelError::EmptyHorizon);
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[MonthlyRecord] {
        &self.records
    }

    pub fn last(&self) -> &MonthlyRecord {
        &self.records[self.records.len() - 1]
    }

    pub fn into_records(self) -> Vec<MonthlyRecord> {
        self.records
    }

    pub fn summary(&self) -> ProjectionSummary {
        let last = self.last();
        ProjectionSummary {
            months: last.month,
            final_sales: last.sales,
            final_operating_profit: last.operating_profit,
            final_operating_margin: last.operating_margin(),
            final_break_even_sales: last.break_even_sales,
            final_units: last.units,
            cumulative_profit: last.cumulative_profit,
        }
    }
}
