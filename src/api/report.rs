//! Plain-text rendering of a projection for the `project` subcommand.

use crate::core::{GapAnalysis, Lever, MonthlyRecord, Ratio, Strategies};

use super::ProjectionResponse;

pub fn render_report(response: &ProjectionResponse) -> String {
    let mut out = String::new();
    render_summary(&mut out, response);
    if let Some(last) = response.records.last() {
        render_cost_structure(&mut out, last);
    }
    render_gap(&mut out, &response.gap);
    render_table(&mut out, &response.records);
    out
}

fn render_summary(out: &mut String, response: &ProjectionResponse) {
    let summary = &response.summary;
    out.push_str(&format!("Projection over {} months\n", summary.months));
    out.push_str(&format!(
        "  Final monthly sales      {:>14}\n",
        format_amount(summary.final_sales)
    ));
    out.push_str(&format!(
        "  Final operating profit   {:>14}  (margin {})\n",
        format_amount(summary.final_operating_profit),
        format_ratio(summary.final_operating_margin)
    ));
    out.push_str(&format!(
        "  Break-even sales         {:>14}\n",
        format_optional_amount(summary.final_break_even_sales)
    ));
    out.push_str(&format!(
        "  Final monthly units      {:>14}\n",
        format_amount(summary.final_units as f64)
    ));
    out.push_str(&format!(
        "  Cumulative profit        {:>14}\n\n",
        format_amount(summary.cumulative_profit)
    ));
}

fn render_cost_structure(out: &mut String, record: &MonthlyRecord) {
    out.push_str(&format!("Cost structure in {}\n", record.label.to_lowercase()));
    for (category, amount) in record.cost_breakdown() {
        out.push_str(&format!(
            "  {:<12} {:>14}  ({})\n",
            category.label(),
            format_amount(amount),
            format_ratio(Ratio::guarded(amount, record.total_cost))
        ));
    }
    out.push('\n');
}

fn render_gap(out: &mut String, gap: &GapAnalysis) {
    let target = format_ratio(Ratio::Defined(gap.target_margin));
    out.push_str(&format!("Target operating margin {target}\n"));

    let Some(strategies) = gap.strategies() else {
        out.push_str(&format!(
            "  Target met: current margin {} already reaches {target}.\n\n",
            format_ratio(gap.achieved_margin)
        ));
        return;
    };

    out.push_str(&format!(
        "  Current margin {}; monthly operating profit is short by {}.\n",
        format_ratio(gap.achieved_margin),
        format_amount(gap.gap_profit)
    ));
    render_strategies(out, strategies);
    out.push('\n');
}

fn render_strategies(out: &mut String, strategies: &Strategies) {
    let price = match &strategies.price_increase {
        Lever::Feasible(p) => format!(
            "raise the unit price to {} (+{} per unit)",
            format_amount(p.target_price),
            format_amount(p.increase)
        ),
        Lever::Infeasible(reason) => format!("not possible: {reason}"),
    };
    let fixed = match &strategies.fixed_cost_reduction {
        Lever::Feasible(f) => format!(
            "cut fixed costs to {} (-{})",
            format_amount(f.target_fixed_cost),
            format_amount(f.reduction)
        ),
        Lever::Infeasible(reason) => format!("not possible: {reason}"),
    };
    let acquisition = match &strategies.acquisition_cost_reduction {
        Lever::Feasible(a) => format!(
            "keep {} paid acquisitions at a CPA of {} (ad budget {})",
            format_amount(a.paid_units),
            format_amount(a.target_cpa),
            format_amount(a.target_ad_budget)
        ),
        Lever::Infeasible(reason) => format!("not possible: {reason}"),
    };

    out.push_str(&format!("  A. Price:            {price}\n"));
    out.push_str(&format!("  B. Fixed costs:      {fixed}\n"));
    out.push_str(&format!("  C. Acquisition cost: {acquisition}\n"));
}

fn render_table(out: &mut String, records: &[MonthlyRecord]) {
    out.push_str(&format!(
        "{:>5} {:>7} {:>13} {:>13} {:>11} {:>11} {:>13} {:>14} {:>13}\n",
        "Month",
        "Units",
        "Sales",
        "Variable",
        "Ad",
        "Fixed",
        "Operating",
        "Cumulative",
        "Break-even"
    ));
    for record in records {
        out.push_str(&format!(
            "{:>5} {:>7} {:>13} {:>13} {:>11} {:>11} {:>13} {:>14} {:>13}\n",
            record.month,
            record.units,
            format_amount(record.sales),
            format_amount(record.variable_cost),
            format_amount(record.ad_spend),
            format_amount(record.fixed_cost),
            format_amount(record.operating_profit),
            format_amount(record.cumulative_profit),
            format_optional_amount(record.break_even_sales)
        ));
    }
}

/// Whole-unit amount with thousands separators, e.g. `-2,043,250`.
fn format_amount(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn format_optional_amount(value: Ratio) -> String {
    value.value().map_or_else(|| "n/a".to_string(), format_amount)
}

fn format_ratio(value: Ratio) -> String {
    value
        .value()
        .map_or_else(|| "n/a".to_string(), |v| format!("{:.1}%", v * 100.0))
}
