//! Cumulative price/size adjustment factors from corporate-action events.
//!
//! Input is a table with the vendor's adjustment columns:
//!
//! | column | meaning |
//! |---|---|
//! | `Adjustment Date` | effective date |
//! | `Adjustment Factor` | positive factor |
//! | `Adjustment Factor Operator Type` | 1 = divide, 2 = multiply, 3 = add |
//! | `Adjustment Factor Flag` | 1 = prices only, 3 = prices and volumes |
//!
//! The vendor states operator types for prices; volumes use the opposite
//! operator. Multiply factors are therefore inverted before use and the size
//! factor of a price-and-volume event is the reciprocal of its price factor.
//!
//! Multiplying historical prices (or share counts) by the series, forward
//! filled onto the caller's date axis, puts them on the latest basis.

use anyhow::Result;
use chrono::NaiveDate;
use log::debug;

use crate::{
    data::{Row, Table, Value},
    error::PipeError,
    schema::{ColumnSpec, LogicalType, Schema},
    table,
};

pub const ADJUSTMENT_DATE: &str = "Adjustment Date";
pub const ADJUSTMENT_FACTOR: &str = "Adjustment Factor";
pub const ADJUSTMENT_OPERATOR: &str = "Adjustment Factor Operator Type";
pub const ADJUSTMENT_FLAG: &str = "Adjustment Factor Flag";

pub const DATE_COLUMN: &str = "date";
pub const SIZE_ADJ_FACTOR: &str = "sizeAdjFactor";
pub const SIZE_ADJ_FACTOR_QUOTIENT: &str = "sizeAdjFactorQuotient";
pub const PRICE_ADJ_FACTOR: &str = "priceAdjFactor";
pub const PRICE_ADJ_FACTOR_QUOTIENT: &str = "priceAdjFactorQuotient";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorType {
    Divide,
    Multiply,
    AdditiveUnsupported,
}

impl OperatorType {
    /// Codes other than multiply and add apply the factor as a divisor.
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => OperatorType::Multiply,
            3 => OperatorType::AdditiveUnsupported,
            _ => OperatorType::Divide,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            OperatorType::Divide => 1,
            OperatorType::Multiply => 2,
            OperatorType::AdditiveUnsupported => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentFlag {
    PriceOnly,
    PriceAndVolume,
}

impl AdjustmentFlag {
    /// Only code 3 touches volumes; every other flag leaves them alone.
    pub fn from_code(code: i64) -> Self {
        match code {
            3 => AdjustmentFlag::PriceAndVolume,
            _ => AdjustmentFlag::PriceOnly,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            AdjustmentFlag::PriceOnly => 1,
            AdjustmentFlag::PriceAndVolume => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentEvent {
    pub date: NaiveDate,
    pub factor: f64,
    pub operator: OperatorType,
    pub flag: AdjustmentFlag,
}

impl AdjustmentEvent {
    pub fn new(date: NaiveDate, factor: f64, operator: OperatorType, flag: AdjustmentFlag) -> Self {
        Self {
            date,
            factor,
            operator,
            flag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentFactorRow {
    pub date: NaiveDate,
    pub size_adj_factor: f64,
    pub size_adj_factor_quotient: Option<f64>,
    pub price_adj_factor: Option<f64>,
    pub price_adj_factor_quotient: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentFactorSeries {
    pub security_id: String,
    pub size_only: bool,
    pub include_quotients: bool,
    pub rows: Vec<AdjustmentFactorRow>,
}

impl AdjustmentFactorSeries {
    /// Latest row on or before each date; `None` before the seed row.
    pub fn forward_fill(&self, dates: &[NaiveDate]) -> Vec<Option<&AdjustmentFactorRow>> {
        dates
            .iter()
            .map(|date| {
                let idx = self.rows.partition_point(|row| row.date <= *date);
                idx.checked_sub(1).and_then(|i| self.rows.get(i))
            })
            .collect()
    }

    pub fn headers(&self) -> Vec<&'static str> {
        let mut headers = vec![DATE_COLUMN, SIZE_ADJ_FACTOR];
        if self.include_quotients {
            headers.push(SIZE_ADJ_FACTOR_QUOTIENT);
        }
        if !self.size_only {
            headers.push(PRICE_ADJ_FACTOR);
            if self.include_quotients {
                headers.push(PRICE_ADJ_FACTOR_QUOTIENT);
            }
        }
        headers
    }

    pub fn to_table(&self) -> Table {
        let columns = self
            .headers()
            .into_iter()
            .map(|name| match name {
                DATE_COLUMN => ColumnSpec::new(name, LogicalType::Date, false),
                _ => ColumnSpec::new(name, LogicalType::Numeric, true),
            })
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells: Row = vec![
                    Some(Value::Date(row.date)),
                    Some(Value::Float(row.size_adj_factor)),
                ];
                if self.include_quotients {
                    cells.push(row.size_adj_factor_quotient.map(Value::Float));
                }
                if !self.size_only {
                    cells.push(row.price_adj_factor.map(Value::Float));
                    if self.include_quotients {
                        cells.push(row.price_adj_factor_quotient.map(Value::Float));
                    }
                }
                cells
            })
            .collect();
        Table::new(
            self.security_id.clone(),
            format!("{} adjustment factors", self.security_id),
            Schema::new(columns),
            rows,
        )
    }
}

/// Computes the cumulative adjustment series for one security.
///
/// The first row is a seed at `start_date` with every factor at 1.0. Events on
/// or before `start_date` are ignored; with `size_only` only price-and-volume
/// events contribute and no price factors are produced. Any additive event in
/// `events` fails the call.
///
/// Rows dropped by the date or `size_only` filters are never validated, so a
/// stale row with a missing factor does not fail the series.
pub fn compute(
    security_id: &str,
    start_date: NaiveDate,
    size_only: bool,
    include_quotients: bool,
    events: &Table,
) -> Result<AdjustmentFactorSeries> {
    if events.is_empty() {
        return compute_from_events(security_id, start_date, size_only, include_quotients, &[]);
    }
    let columns = EventColumns::from_table(security_id, events)?;

    let additive: Vec<Vec<String>> = (0..events.row_count())
        .filter(|row| columns.operator(*row) == Some(OperatorType::AdditiveUnsupported))
        .map(|row| columns.display_row(row))
        .collect();
    if !additive.is_empty() {
        return Err(unsupported_adjustment(security_id, additive));
    }

    let mut selected = Vec::new();
    for row in 0..events.row_count() {
        if columns.date(row).is_none_or(|date| date <= start_date) {
            continue;
        }
        let volume = columns.flag(row) == Some(AdjustmentFlag::PriceAndVolume);
        if size_only && !volume {
            continue;
        }
        selected.push(columns.event(row)?);
    }
    compute_from_events(security_id, start_date, size_only, include_quotients, &selected)
}

pub fn compute_from_events(
    security_id: &str,
    start_date: NaiveDate,
    size_only: bool,
    include_quotients: bool,
    events: &[AdjustmentEvent],
) -> Result<AdjustmentFactorSeries> {
    reject_additive(security_id, events)?;

    let mut selected: Vec<&AdjustmentEvent> = events
        .iter()
        .filter(|event| event.date > start_date)
        .filter(|event| !size_only || event.flag == AdjustmentFlag::PriceAndVolume)
        .collect();
    // stable: same-day events keep their input order
    selected.sort_by_key(|event| event.date);
    debug!(
        "{security_id}: {} of {} adjustment event(s) after {start_date}",
        selected.len(),
        events.len()
    );

    let seed = (start_date, 1.0, None);
    let working = std::iter::once(seed).chain(
        selected
            .into_iter()
            .map(|event| (event.date, effective_factor(event), Some(event.flag))),
    );

    let mut price = 1.0;
    let mut size = 1.0;
    let rows = working
        .map(|(date, factor, flag)| {
            let size_quotient = match flag {
                Some(AdjustmentFlag::PriceAndVolume) => 1.0 / factor,
                _ => 1.0,
            };
            size *= size_quotient;
            let price_adj_factor = if size_only {
                None
            } else {
                price *= factor;
                Some(price)
            };
            AdjustmentFactorRow {
                date,
                size_adj_factor: size,
                size_adj_factor_quotient: include_quotients.then_some(size_quotient),
                price_adj_factor,
                price_adj_factor_quotient: (include_quotients && !size_only).then_some(factor),
            }
        })
        .collect();

    Ok(AdjustmentFactorSeries {
        security_id: security_id.to_string(),
        size_only,
        include_quotients,
        rows,
    })
}

fn effective_factor(event: &AdjustmentEvent) -> f64 {
    match event.operator {
        OperatorType::Multiply => 1.0 / event.factor,
        _ => event.factor,
    }
}

fn reject_additive(security_id: &str, events: &[AdjustmentEvent]) -> Result<()> {
    let offending: Vec<Vec<String>> = events
        .iter()
        .filter(|event| event.operator == OperatorType::AdditiveUnsupported)
        .map(|event| {
            vec![
                event.date.format("%Y-%m-%d").to_string(),
                event.factor.to_string(),
                event.operator.code().to_string(),
                event.flag.code().to_string(),
            ]
        })
        .collect();
    if offending.is_empty() {
        return Ok(());
    }
    Err(unsupported_adjustment(security_id, offending))
}

fn unsupported_adjustment(security_id: &str, offending: Vec<Vec<String>>) -> anyhow::Error {
    let headers = [
        ADJUSTMENT_DATE,
        ADJUSTMENT_FACTOR,
        ADJUSTMENT_OPERATOR,
        ADJUSTMENT_FLAG,
    ]
    .map(String::from);
    PipeError::UnsupportedAdjustment {
        security: security_id.to_string(),
        rows: table::render_table(&headers, &offending),
    }
    .into()
}

/// Reads every row of a table with the vendor column names as an event. A
/// table without rows yields no events regardless of its columns.
pub fn events_from_table(security_id: &str, events: &Table) -> Result<Vec<AdjustmentEvent>> {
    if events.is_empty() {
        return Ok(Vec::new());
    }
    let columns = EventColumns::from_table(security_id, events)?;
    (0..events.row_count()).map(|row| columns.event(row)).collect()
}

/// The four canonical event columns of one table, read cell by cell.
struct EventColumns<'t> {
    security_id: &'t str,
    dates: Vec<Option<&'t Value>>,
    factors: Vec<Option<&'t Value>>,
    operators: Vec<Option<&'t Value>>,
    flags: Vec<Option<&'t Value>>,
}

impl<'t> EventColumns<'t> {
    fn from_table(security_id: &'t str, events: &'t Table) -> Result<Self> {
        let column = |name: &str| {
            events.column(name).ok_or_else(|| PipeError::MalformedEvents {
                security: security_id.to_string(),
                reason: format!("missing column '{name}'"),
            })
        };
        Ok(Self {
            security_id,
            dates: column(ADJUSTMENT_DATE)?,
            factors: column(ADJUSTMENT_FACTOR)?,
            operators: column(ADJUSTMENT_OPERATOR)?,
            flags: column(ADJUSTMENT_FLAG)?,
        })
    }

    fn date(&self, row: usize) -> Option<NaiveDate> {
        self.dates[row].and_then(Value::as_date)
    }

    fn factor(&self, row: usize) -> Option<f64> {
        self.factors[row]
            .and_then(Value::as_f64)
            .filter(|f| f.is_finite() && *f > 0.0)
    }

    fn operator(&self, row: usize) -> Option<OperatorType> {
        self.operators[row]
            .and_then(Value::as_i64)
            .map(OperatorType::from_code)
    }

    fn flag(&self, row: usize) -> Option<AdjustmentFlag> {
        self.flags[row].and_then(Value::as_i64).map(AdjustmentFlag::from_code)
    }

    fn event(&self, row: usize) -> Result<AdjustmentEvent> {
        let date = self
            .date(row)
            .ok_or_else(|| self.cell_error(row, ADJUSTMENT_DATE, self.dates[row]))?;
        let factor = self
            .factor(row)
            .ok_or_else(|| self.cell_error(row, ADJUSTMENT_FACTOR, self.factors[row]))?;
        let operator = self
            .operator(row)
            .ok_or_else(|| self.cell_error(row, ADJUSTMENT_OPERATOR, self.operators[row]))?;
        let flag = self
            .flag(row)
            .ok_or_else(|| self.cell_error(row, ADJUSTMENT_FLAG, self.flags[row]))?;
        Ok(AdjustmentEvent::new(date, factor, operator, flag))
    }

    fn display_row(&self, row: usize) -> Vec<String> {
        [&self.dates, &self.factors, &self.operators, &self.flags]
            .iter()
            .map(|cells| cells[row].map(Value::as_display).unwrap_or_default())
            .collect()
    }

    fn cell_error(&self, row: usize, name: &str, cell: Option<&Value>) -> anyhow::Error {
        PipeError::MalformedEvents {
            security: self.security_id.to_string(),
            reason: format!(
                "row {row}: unusable '{name}' value {}",
                cell.map(|v| format!("'{v}'"))
                    .unwrap_or_else(|| "NULL".to_string())
            ),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn multiply_events_are_inverted() {
        let events = [AdjustmentEvent::new(
            date(2020, 6, 1),
            4.0,
            OperatorType::Multiply,
            AdjustmentFlag::PriceAndVolume,
        )];
        let series = compute_from_events("X", date(2020, 1, 1), false, true, &events).unwrap();
        let last = series.rows[1];
        assert_eq!(last.price_adj_factor, Some(0.25));
        assert_eq!(last.price_adj_factor_quotient, Some(0.25));
        assert_eq!(last.size_adj_factor, 4.0);
        assert_eq!(last.size_adj_factor_quotient, Some(4.0));
    }

    #[test]
    fn same_day_events_keep_input_order() {
        let price_only = |on, factor| {
            AdjustmentEvent::new(on, factor, OperatorType::Divide, AdjustmentFlag::PriceOnly)
        };
        let events = [
            price_only(date(2021, 1, 1), 2.0),
            price_only(date(2020, 6, 1), 3.0),
            price_only(date(2021, 1, 1), 5.0),
        ];
        let series = compute_from_events("X", date(2020, 1, 1), false, true, &events).unwrap();
        let quotients: Vec<Option<f64>> =
            series.rows.iter().map(|r| r.price_adj_factor_quotient).collect();
        assert_eq!(quotients, vec![Some(1.0), Some(3.0), Some(2.0), Some(5.0)]);
    }

    #[test]
    fn forward_fill_uses_latest_row_on_or_before_date() {
        let events = [AdjustmentEvent::new(
            date(2020, 6, 1),
            2.0,
            OperatorType::Divide,
            AdjustmentFlag::PriceAndVolume,
        )];
        let series = compute_from_events("X", date(2020, 1, 1), false, false, &events).unwrap();
        let filled = series.forward_fill(&[
            date(2019, 12, 31),
            date(2020, 1, 1),
            date(2020, 5, 31),
            date(2020, 6, 1),
            date(2024, 1, 1),
        ]);
        let sizes: Vec<Option<f64>> = filled.iter().map(|r| r.map(|r| r.size_adj_factor)).collect();
        assert_eq!(sizes, vec![None, Some(1.0), Some(1.0), Some(0.5), Some(0.5)]);
    }

    #[test]
    fn size_only_series_has_no_price_columns() {
        let series = compute_from_events("X", date(2020, 1, 1), true, true, &[]).unwrap();
        assert_eq!(series.headers(), vec!["date", "sizeAdjFactor", "sizeAdjFactorQuotient"]);
        let table = series.to_table();
        assert_eq!(table.headers(), vec!["date", "sizeAdjFactor", "sizeAdjFactorQuotient"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(series.rows[0].price_adj_factor, None);
    }

    fn events_table(rows: Vec<Row>) -> Table {
        let schema = Schema::new(vec![
            ColumnSpec::new(ADJUSTMENT_DATE, LogicalType::Date, false),
            ColumnSpec::new(ADJUSTMENT_FACTOR, LogicalType::Numeric, true),
            ColumnSpec::new(ADJUSTMENT_OPERATOR, LogicalType::Numeric, false),
            ColumnSpec::new(ADJUSTMENT_FLAG, LogicalType::Numeric, false),
        ]);
        Table::new("events", "events", schema, rows)
    }

    fn cells(on: NaiveDate, factor: Option<f64>, operator: i64, flag: i64) -> Row {
        vec![
            Some(Value::Date(on)),
            factor.map(Value::Float),
            Some(Value::Integer(operator)),
            Some(Value::Integer(flag)),
        ]
    }

    #[test]
    fn unknown_codes_fall_back_to_divide_and_price_only() {
        assert_eq!(OperatorType::from_code(9), OperatorType::Divide);
        assert_eq!(AdjustmentFlag::from_code(2), AdjustmentFlag::PriceOnly);
        assert_eq!(AdjustmentFlag::from_code(3), AdjustmentFlag::PriceAndVolume);

        let table = events_table(vec![cells(date(2020, 6, 1), Some(2.0), 9, 2)]);
        let series = compute("X", date(2020, 1, 1), false, true, &table).unwrap();
        let last = series.rows[1];
        assert_eq!(last.price_adj_factor, Some(2.0));
        assert_eq!(last.size_adj_factor, 1.0);
    }

    #[test]
    fn additive_row_before_start_still_fails() {
        let table = events_table(vec![
            cells(date(2010, 1, 1), Some(0.5), 3, 1),
            cells(date(2020, 6, 1), Some(2.0), 1, 3),
        ]);
        for size_only in [false, true] {
            let err = compute("X", date(2020, 1, 1), size_only, false, &table).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PipeError>(),
                Some(PipeError::UnsupportedAdjustment { .. })
            ));
        }
    }

    #[test]
    fn null_factor_on_surviving_row_is_malformed() {
        let table = events_table(vec![cells(date(2020, 6, 1), None, 1, 1)]);
        let err = compute("X", date(2020, 1, 1), false, false, &table).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipeError>(),
            Some(PipeError::MalformedEvents { .. })
        ));
    }
}
