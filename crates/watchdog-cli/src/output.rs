//! Terminal rendering of a finished report

use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table, presets};
use watchdog_report::report::{ChartSpec, RenderedReport};

/// Budget table followed by one table per chart
pub fn render_tables(report: &RenderedReport) -> String {
    let mut out = String::new();
    out.push_str(&report.title);
    out.push('\n');
    out.push_str(&report.content);
    out.push('\n');
    if let Some(user) = &report.user_name {
        out.push_str(&format!("Prepared for: {user}"));
        if let Some(email) = &report.company_email {
            out.push_str(&format!(" <{email}>"));
        }
        out.push('\n');
    }

    let mut budget = base_table();
    budget.set_header(header(&["Fiscal Year", "Revenue", "Expenses", "Surplus/Deficit"]));
    for row in &report.tables {
        budget.add_row(vec![
            Cell::new(&row.fiscal_year),
            Cell::new(&row.revenue).set_alignment(CellAlignment::Right),
            Cell::new(&row.expenses).set_alignment(CellAlignment::Right),
            Cell::new(&row.surplus_deficit).set_alignment(CellAlignment::Right),
        ]);
    }
    out.push('\n');
    out.push_str(&budget.to_string());
    out.push('\n');

    for chart in &report.charts {
        out.push('\n');
        out.push_str(&chart.title);
        out.push('\n');
        out.push_str(&chart_table(chart).to_string());
        out.push('\n');
    }

    out
}

fn chart_table(chart: &ChartSpec) -> Table {
    let mut table = base_table();
    table.set_header(header(&[chart.x_label.as_str(), chart.y_label.as_str()]));
    for (period, value) in chart.periods.iter().zip(&chart.values) {
        table.add_row(vec![
            Cell::new(period),
            Cell::new(format!("{value:.2}")).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).add_attribute(Attribute::Bold))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchdog_report::report::{ChartKind, TableRow};

    fn report() -> RenderedReport {
        RenderedReport {
            title: "Financial Report: Federal - Canada".into(),
            content: "Generated using real-time government and economic data.".into(),
            user_name: Some("Ada".into()),
            company_email: Some("ada@example.com".into()),
            charts: vec![ChartSpec {
                id: "gdp_growth".into(),
                kind: ChartKind::Line,
                title: "GDP Growth Rate".into(),
                x_label: "Year".into(),
                y_label: "GDP Growth (%)".into(),
                periods: vec!["2022".into(), "2023".into()],
                values: vec![3.4, 1.25],
            }],
            tables: vec![TableRow {
                fiscal_year: "2023".into(),
                revenue: "450.5B".into(),
                expenses: "490B".into(),
                surplus_deficit: "-39.5B".into(),
            }],
        }
    }

    #[test]
    fn test_render_tables_contains_rows_and_charts() {
        let out = render_tables(&report());
        assert!(out.starts_with("Financial Report: Federal - Canada"));
        assert!(out.contains("Prepared for: Ada <ada@example.com>"));
        assert!(out.contains("Surplus/Deficit"));
        assert!(out.contains("-39.5B"));
        assert!(out.contains("GDP Growth Rate"));
        assert!(out.contains("1.25"));
        assert!(out.contains("3.40"));
    }
}
