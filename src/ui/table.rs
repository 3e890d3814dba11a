use tabled::{settings::Style, Table, Tabled};
use crate::record::Finding;

#[derive(Tabled)]
pub struct StatRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
pub struct FindingRow {
    #[tabled(rename = "File")]
    pub path: String,
    #[tabled(rename = "Line")]
    pub line: i64,
    #[tabled(rename = "Col")]
    pub column: i64,
    #[tabled(rename = "Kind")]
    pub vector_kind: i64,
    #[tabled(rename = "Width")]
    pub tile_width: i64,
    #[tabled(rename = "Strategy")]
    pub strategy_index: i64,
}

impl From<&Finding> for FindingRow {
    fn from(f: &Finding) -> Self {
        Self {
            path: f.path.clone(),
            line: f.line,
            column: f.column,
            vector_kind: f.vector_kind,
            tile_width: f.tile_width,
            strategy_index: f.strategy_index,
        }
    }
}

pub fn stats_table<L: AsRef<str>, V: AsRef<str>>(stats: &[(L, V)]) -> String {
    if stats.is_empty() {
        return String::new();
    }
    let rows: Vec<StatRow> = stats
        .iter()
        .map(|(label, value)| StatRow {
            metric: label.as_ref().to_string(),
            value: value.as_ref().to_string(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn findings_table(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return String::new();
    }
    let rows: Vec<FindingRow> = findings.iter().map(FindingRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_table() {
        let table = stats_table(&[("Repositories", "3"), ("Matches", "12")]);
        assert!(table.contains("Metric"));
        assert!(table.contains("Repositories"));
        assert!(table.contains("12"));
        assert!(stats_table::<&str, &str>(&[]).is_empty());
    }

    #[test]
    fn test_findings_table() {
        let finding = Finding {
            path: "src/a.c".to_string(),
            line: 10,
            column: 4,
            vector_kind: 1,
            tile_width: 8,
            strategy_index: 2,
        };
        let table = findings_table(&[finding]);
        assert!(table.contains("src/a.c"));
        assert!(table.contains("Strategy"));
    }
}
