//! Tabular ledger model and CSV reader.
//!
//! A ledger is an ordered sequence of period records (one per month, usually)
//! with five numeric fields. Any cell may be missing. Column names are matched
//! case-sensitively against one of two schemas:
//!
//! | Schema | Columns |
//! |--------|---------|
//! | Native | `revenue`, `expenses`, `cash`, `receivables`, `payables` |
//! | Asset  | `revenue_<sym>`, `expenses_<sym>`, ... (e.g. `cash_btc`) |
//!
//! The required columns decide the denomination. Suffixed names that do not
//! fit it (`cash_flow` in a native ledger) are ignored like any other extra
//! column. Units are homogeneous within a ledger: a header mixing schemas, or
//! two asset symbols, is rejected rather than silently summed.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::LedgerError;

/// Unit a ledger is denominated in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denomination {
    /// Base-unit currency
    Native,
    /// A single crypto-asset, identified by its column suffix (e.g. "btc")
    Asset(String),
}

impl std::fmt::Display for Denomination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native currency"),
            Self::Asset(symbol) => write!(f, "{}", symbol.to_uppercase()),
        }
    }
}

/// A ledger field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Revenue,
    Expenses,
    Cash,
    Receivables,
    Payables,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Revenue,
        Column::Expenses,
        Column::Cash,
        Column::Receivables,
        Column::Payables,
    ];

    /// Columns the liquidity diagnosis cannot run without.
    pub const REQUIRED: [Column; 3] = [Column::Revenue, Column::Expenses, Column::Cash];

    /// Base column name in the native schema.
    pub fn name(self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Expenses => "expenses",
            Self::Cash => "cash",
            Self::Receivables => "receivables",
            Self::Payables => "payables",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Header name of this column for a given denomination.
    pub fn header(self, denomination: &Denomination) -> String {
        match denomination {
            Denomination::Native => self.name().to_string(),
            Denomination::Asset(symbol) => format!("{}_{}", self.name(), symbol),
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One period of the ledger. `None` marks a missing cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub revenue: Option<f64>,
    pub expenses: Option<f64>,
    pub cash: Option<f64>,
    pub receivables: Option<f64>,
    pub payables: Option<f64>,
}

impl PeriodRecord {
    /// A fully populated record.
    pub fn new(revenue: f64, expenses: f64, cash: f64, receivables: f64, payables: f64) -> Self {
        Self {
            revenue: Some(revenue),
            expenses: Some(expenses),
            cash: Some(cash),
            receivables: Some(receivables),
            payables: Some(payables),
        }
    }

    pub fn get(&self, column: Column) -> Option<f64> {
        match column {
            Column::Revenue => self.revenue,
            Column::Expenses => self.expenses,
            Column::Cash => self.cash,
            Column::Receivables => self.receivables,
            Column::Payables => self.payables,
        }
    }

    fn set(&mut self, column: Column, value: Option<f64>) {
        match column {
            Column::Revenue => self.revenue = value,
            Column::Expenses => self.expenses = value,
            Column::Cash => self.cash = value,
            Column::Receivables => self.receivables = value,
            Column::Payables => self.payables = value,
        }
    }
}

/// An ordered set of period records plus the columns the source actually had.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    denomination: Denomination,
    columns: Vec<Column>,
    records: Vec<PeriodRecord>,
}

impl Ledger {
    /// Build a ledger from already-typed records.
    ///
    /// `columns` lists the fields present in the source table; values of
    /// other fields in `records` are ignored by every computation.
    pub fn new(denomination: Denomination, columns: Vec<Column>, records: Vec<PeriodRecord>) -> Self {
        let mut columns = columns;
        columns.sort_by_key(|c| Column::ALL.iter().position(|x| x == c));
        columns.dedup();
        let records = records
            .into_iter()
            .map(|record| {
                let mut kept = PeriodRecord::default();
                for column in &columns {
                    kept.set(*column, record.get(*column));
                }
                kept
            })
            .collect();
        Self {
            denomination,
            columns,
            records,
        }
    }

    /// A native-currency ledger with all five columns.
    pub fn native(records: Vec<PeriodRecord>) -> Self {
        Self::new(Denomination::Native, Column::ALL.to_vec(), records)
    }

    /// Parse RFC 4180 CSV text with a header row.
    ///
    /// Quoted fields may contain commas; a comma inside a numeric cell is read
    /// as a thousands separator. Blank, non-numeric, `NaN` and `null`-style
    /// cells become missing cells. Columns outside the ledger's schema are
    /// ignored. Text without any header line yields
    /// [`LedgerError::EmptyLedger`]; a header with no data rows is a valid,
    /// empty ledger.
    pub fn from_csv(text: &str) -> Result<Self, LedgerError> {
        let text = text.trim_start_matches('\u{feff}');
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut rows = reader
            .records()
            .filter(|row| !matches!(row, Ok(record) if is_blank(record)));

        let header = rows
            .next()
            .ok_or(LedgerError::EmptyLedger)?
            .map_err(malformed)?;
        let names: Vec<&str> = header.iter().collect();

        let (denomination, positions) = resolve_schema(&names)?;

        let mut records = Vec::new();
        for (row, cells) in rows.enumerate() {
            let cells = cells.map_err(malformed)?;
            let mut record = PeriodRecord::default();
            for (column, index) in &positions {
                let raw = cells.get(*index).unwrap_or("");
                let value = parse_cell(raw);
                if value.is_none() && !is_null_marker(raw) {
                    tracing::debug!(row, column = %column, raw, "Non-numeric cell treated as missing");
                }
                record.set(*column, value);
            }
            records.push(record);
        }

        let columns = positions.iter().map(|(c, _)| *c).collect();
        let ledger = Self::new(denomination, columns, records);

        tracing::debug!(
            periods = ledger.len(),
            columns = ledger.columns.len(),
            denomination = %ledger.denomination,
            missing = ledger.missing_cells(),
            "Ledger parsed"
        );

        Ok(ledger)
    }

    pub fn denomination(&self) -> &Denomination {
        &self.denomination
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn records(&self) -> &[PeriodRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Fail with [`LedgerError::MissingColumn`] unless `column` is present.
    pub fn require(&self, column: Column) -> Result<(), LedgerError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(LedgerError::MissingColumn {
                column: column.header(&self.denomination),
            })
        }
    }

    /// Number of cells in the table: rows × present columns.
    pub fn total_cells(&self) -> usize {
        self.records.len() * self.columns.len()
    }

    /// Number of missing cells among the present columns.
    pub fn missing_cells(&self) -> usize {
        self.records
            .iter()
            .map(|r| self.columns.iter().filter(|c| r.get(**c).is_none()).count())
            .sum()
    }

    /// Populated values of a column, in period order.
    pub fn values(&self, column: Column) -> impl Iterator<Item = f64> + '_ {
        let present = self.has_column(column);
        self.records
            .iter()
            .filter_map(move |r| if present { r.get(column) } else { None })
    }

    /// Column total with missing cells (or an absent column) counted as zero.
    pub fn sum(&self, column: Column) -> f64 {
        self.values(column).sum()
    }

    /// Mean over populated cells only; 0 when the column has none.
    pub fn mean(&self, column: Column) -> f64 {
        let values: Vec<f64> = self.values(column).collect();
        if values.is_empty() {
            0.0
        } else {
            values.mean()
        }
    }
}

/// Convert an asset-denominated amount into native units at `price`.
///
/// The price is always explicit; ledgers are never revalued implicitly.
pub fn valuate(amount: f64, price: f64) -> Result<f64, LedgerError> {
    if !price.is_finite() || price < 0.0 {
        return Err(LedgerError::InvalidParameter {
            name: "price".into(),
            reason: format!("{} is not a non-negative finite price", price),
        });
    }
    Ok(amount * price)
}

fn malformed(err: csv::Error) -> LedgerError {
    LedgerError::Malformed {
        reason: err.to_string(),
    }
}

/// A line holding nothing but whitespace.
fn is_blank(record: &csv::StringRecord) -> bool {
    record.len() <= 1 && record.iter().all(str::is_empty)
}

fn is_null_marker(raw: &str) -> bool {
    matches!(
        raw,
        "" | "NaN" | "nan" | "null" | "NULL" | "None" | "N/A" | "NA"
    )
}

fn parse_cell(raw: &str) -> Option<f64> {
    if is_null_marker(raw) {
        return None;
    }
    let value = if raw.contains(',') {
        raw.replace(',', "").parse::<f64>()
    } else {
        raw.parse::<f64>()
    };
    value.ok().filter(|v| v.is_finite())
}

/// How a header name relates to the ledger schema.
#[derive(Debug, Clone, Copy, PartialEq)]
enum HeaderName<'a> {
    /// `revenue`, `cash`, ...
    Native(Column),
    /// `revenue_btc`, but also unrelated names such as `cash_flow`
    Suffixed(Column, &'a str),
    Other,
}

impl<'a> HeaderName<'a> {
    fn classify(name: &'a str) -> Self {
        if let Some(column) = Column::from_name(name) {
            return Self::Native(column);
        }
        match name.split_once('_') {
            Some((base, symbol)) if !symbol.is_empty() => {
                Column::from_name(base).map_or(Self::Other, |column| Self::Suffixed(column, symbol))
            }
            _ => Self::Other,
        }
    }
}

/// Pick the denomination from the required columns.
///
/// A complete required set (`revenue`, `expenses`, `cash`, or all three with
/// one `_<sym>` suffix) decides it, and other suffixed names become extras.
/// Without a complete set, every required-looking name votes.
fn detect_denomination(names: &[HeaderName<'_>]) -> Result<Denomination, LedgerError> {
    let mut symbols: Vec<&str> = Vec::new();
    for name in names {
        if let HeaderName::Suffixed(column, symbol) = name {
            if Column::REQUIRED.contains(column) && !symbols.contains(symbol) {
                symbols.push(*symbol);
            }
        }
    }

    let native_complete = Column::REQUIRED
        .iter()
        .all(|c| has(names, HeaderName::Native(*c)));
    let complete: Vec<&str> = symbols
        .iter()
        .copied()
        .filter(|s| {
            Column::REQUIRED
                .iter()
                .all(|c| has(names, HeaderName::Suffixed(*c, *s)))
        })
        .collect();

    let mixed = |first: Denomination, second: Denomination| LedgerError::MixedUnits {
        first: first.to_string(),
        second: second.to_string(),
    };
    let asset = |symbol: &str| Denomination::Asset(symbol.to_string());

    match (native_complete, complete.as_slice()) {
        (true, []) => Ok(Denomination::Native),
        (false, [symbol]) => Ok(asset(*symbol)),
        (true, [symbol, ..]) => Err(mixed(Denomination::Native, asset(*symbol))),
        (false, [first, second, ..]) => Err(mixed(asset(*first), asset(*second))),
        (false, []) => {
            let native_partial = Column::REQUIRED
                .iter()
                .any(|c| has(names, HeaderName::Native(*c)));
            match (native_partial, symbols.as_slice()) {
                (_, []) => Ok(Denomination::Native),
                (false, [symbol]) => Ok(asset(*symbol)),
                (true, [symbol, ..]) => Err(mixed(Denomination::Native, asset(*symbol))),
                (false, [first, second, ..]) => Err(mixed(asset(*first), asset(*second))),
            }
        }
    }
}

fn has(names: &[HeaderName<'_>], wanted: HeaderName<'_>) -> bool {
    names.iter().any(|name| *name == wanted)
}

/// Map header names to schema columns and their positions.
fn resolve_schema(names: &[&str]) -> Result<(Denomination, Vec<(Column, usize)>), LedgerError> {
    let classified: Vec<HeaderName<'_>> = names.iter().map(|n| HeaderName::classify(n)).collect();
    let denomination = detect_denomination(&classified)?;

    let mut positions: Vec<(Column, usize)> = Vec::new();
    for (index, (name, kind)) in names.iter().zip(&classified).enumerate() {
        let column = match (&denomination, *kind) {
            (Denomination::Native, HeaderName::Native(column)) => column,
            (Denomination::Asset(symbol), HeaderName::Suffixed(column, s)) if s == symbol.as_str() => column,
            (Denomination::Asset(_), HeaderName::Native(_)) => {
                return Err(LedgerError::MixedUnits {
                    first: denomination.to_string(),
                    second: Denomination::Native.to_string(),
                });
            }
            _ => {
                tracing::debug!(column = %name, "Ignoring column outside the ledger schema");
                continue;
            }
        };

        if positions.iter().any(|(c, _)| *c == column) {
            tracing::warn!(column = %name, "Duplicate ledger column, keeping the first");
            continue;
        }
        positions.push((column, index));
    }

    Ok((denomination, positions))
}
