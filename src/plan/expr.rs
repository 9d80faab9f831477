use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int32Array, Int64Array, StringArray,
    UInt64Array,
};
use arrow::compute::kernels::temporal::{date_part, DatePart};
use arrow::compute::kernels::{cmp, numeric};
use arrow::compute::{and, cast};
use arrow::datatypes::{DataType, Float64Type, Int64Type, UInt64Type};
use arrow::record_batch::RecordBatch;

use crate::error::{LoaderError, Result};

// ---------------------------------------------------------------------------
// Literal – a constant broadcast to the length of a batch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Utf8(String),
}

impl Literal {
    fn to_array(&self, len: usize) -> ArrayRef {
        match self {
            Literal::Boolean(b) => Arc::new(BooleanArray::from(vec![*b; len])),
            Literal::Int32(v) => Arc::new(Int32Array::from_value(*v, len)),
            Literal::Int64(v) => Arc::new(Int64Array::from_value(*v, len)),
            Literal::UInt64(v) => Arc::new(UInt64Array::from_value(*v, len)),
            Literal::Float64(v) => Arc::new(Float64Array::from_value(*v, len)),
            Literal::Utf8(s) => Arc::new(StringArray::from(vec![s.as_str(); len])),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Int32(v) => write!(f, "{v}"),
            Literal::Int64(v) => write!(f, "{v}"),
            Literal::UInt64(v) => write!(f, "{v}u64"),
            Literal::Float64(v) => write!(f, "{v:?}"),
            Literal::Utf8(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Boolean(v)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int32(v)
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int64(v)
    }
}

impl From<u64> for Literal {
    fn from(v: u64) -> Self {
        Literal::UInt64(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float64(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Utf8(v.to_string())
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// True division; both sides are evaluated as `Float64`.
    Div,
    Rem,
    Lt,
    Gt,
    And,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::And => "&",
        }
    }

    fn apply(self, left: &ArrayRef, right: &ArrayRef) -> Result<ArrayRef> {
        match self {
            BinaryOp::And => Ok(Arc::new(and(as_boolean(left)?, as_boolean(right)?)?)),
            BinaryOp::Div => {
                let l = cast(left, &DataType::Float64)?;
                let r = cast(right, &DataType::Float64)?;
                Ok(numeric::div(&l, &r)?)
            }
            _ => {
                let (l, r) = coerce(left, right)?;
                let out: ArrayRef = match self {
                    BinaryOp::Add => numeric::add_wrapping(&l, &r)?,
                    BinaryOp::Sub => numeric::sub_wrapping(&l, &r)?,
                    BinaryOp::Mul => numeric::mul_wrapping(&l, &r)?,
                    BinaryOp::Rem => numeric::rem(&l, &r)?,
                    BinaryOp::Lt => Arc::new(cmp::lt(&l, &r)?),
                    BinaryOp::Gt => Arc::new(cmp::gt(&l, &r)?),
                    BinaryOp::And | BinaryOp::Div => unreachable!(),
                };
                Ok(out)
            }
        }
    }
}

/// Bring both operands to one type: equal types pass through, mixed numerics
/// go to `Float64`, anything else casts the right side to the left's type.
fn coerce(left: &ArrayRef, right: &ArrayRef) -> Result<(ArrayRef, ArrayRef)> {
    let (lt, rt) = (left.data_type(), right.data_type());
    if lt == rt {
        return Ok((left.clone(), right.clone()));
    }
    if lt.is_numeric() && rt.is_numeric() {
        return Ok((
            cast(left, &DataType::Float64)?,
            cast(right, &DataType::Float64)?,
        ));
    }
    Ok((left.clone(), cast(right, lt)?))
}

fn as_boolean(array: &ArrayRef) -> Result<&BooleanArray> {
    array.as_boolean_opt().ok_or_else(|| {
        LoaderError::invalid_expr(format!("expected Boolean operand, got {}", array.data_type()))
    })
}

/// Calendar parts extracted from timestamp columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalPart {
    /// 0..=23, `Int32`.
    Hour,
    /// ISO weekday, Monday = 1 .. Sunday = 7, `Int32`.
    Weekday,
    /// Calendar date, `Date32`.
    Date,
}

impl TemporalPart {
    fn apply(self, array: &ArrayRef) -> Result<ArrayRef> {
        match self {
            TemporalPart::Hour => Ok(date_part(array.as_ref(), DatePart::Hour)?),
            TemporalPart::Weekday => {
                let monday0 = date_part(array.as_ref(), DatePart::DayOfWeekMonday0)?;
                let one = Int32Array::from_value(1, monday0.len());
                Ok(numeric::add_wrapping(&monday0, &one)?)
            }
            TemporalPart::Date => Ok(cast(array, &DataType::Date32)?),
        }
    }

    fn method(self) -> &'static str {
        match self {
            TemporalPart::Hour => "hour",
            TemporalPart::Weekday => "weekday",
            TemporalPart::Date => "date",
        }
    }
}

// ---------------------------------------------------------------------------
// Expr – declarative expression over the columns of a record batch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Literal),
    Cast { expr: Box<Expr>, to: DataType },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Temporal { expr: Box<Expr>, part: TemporalPart },
    /// Seeded, platform-independent 64-bit hash of each value, `UInt64`.
    Hash { expr: Box<Expr>, seed: u64 },
    Alias { expr: Box<Expr>, name: String },
}

/// Reference a column by name.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

pub fn lit(value: impl Into<Literal>) -> Expr {
    Expr::Literal(value.into())
}

impl Expr {
    pub fn alias(self, name: impl Into<String>) -> Expr {
        Expr::Alias {
            expr: Box::new(self),
            name: name.into(),
        }
    }

    pub fn cast(self, to: DataType) -> Expr {
        Expr::Cast {
            expr: Box::new(self),
            to,
        }
    }

    fn binary(self, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    pub fn gt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Gt, right)
    }

    pub fn lt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Lt, right)
    }

    pub fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOp::And, right)
    }

    pub fn hour(self) -> Expr {
        self.temporal(TemporalPart::Hour)
    }

    pub fn weekday(self) -> Expr {
        self.temporal(TemporalPart::Weekday)
    }

    pub fn date(self) -> Expr {
        self.temporal(TemporalPart::Date)
    }

    fn temporal(self, part: TemporalPart) -> Expr {
        Expr::Temporal {
            expr: Box::new(self),
            part,
        }
    }

    pub fn hash(self, seed: u64) -> Expr {
        Expr::Hash {
            expr: Box::new(self),
            seed,
        }
    }

    /// Fold predicates into a single conjunction. `None` for an empty list.
    pub fn conjunction(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        predicates.into_iter().reduce(Expr::and)
    }

    /// Name of the column this expression produces: the alias, otherwise the
    /// left-most column it reads.
    pub fn output_name(&self) -> Option<&str> {
        match self {
            Expr::Column(name) | Expr::Alias { name, .. } => Some(name.as_str()),
            Expr::Literal(_) => None,
            Expr::Cast { expr, .. }
            | Expr::Temporal { expr, .. }
            | Expr::Hash { expr, .. } => expr.output_name(),
            Expr::Binary { left, right, .. } => left.output_name().or_else(|| right.output_name()),
        }
    }

    /// Every column referenced, sorted.
    pub fn columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Column(name) => {
                out.insert(name.clone());
            }
            Expr::Literal(_) => {}
            Expr::Cast { expr, .. }
            | Expr::Temporal { expr, .. }
            | Expr::Hash { expr, .. }
            | Expr::Alias { expr, .. } => expr.collect_columns(out),
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
        }
    }

    /// Evaluate against `batch`, producing one value per row.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        match self {
            Expr::Column(name) => batch.column_by_name(name).cloned().ok_or_else(|| {
                LoaderError::invalid_expr(format!("column {name:?} is not in the input"))
            }),
            Expr::Literal(value) => Ok(value.to_array(batch.num_rows())),
            Expr::Cast { expr, to } => {
                let array = expr.evaluate(batch)?;
                if array.data_type() == to {
                    Ok(array)
                } else {
                    Ok(cast(&array, to)?)
                }
            }
            Expr::Binary { left, op, right } => {
                let l = left.evaluate(batch)?;
                let r = right.evaluate(batch)?;
                op.apply(&l, &r)
            }
            Expr::Temporal { expr, part } => part.apply(&expr.evaluate(batch)?),
            Expr::Hash { expr, seed } => {
                let array = expr.evaluate(batch)?;
                Ok(Arc::new(hash_array(array.as_ref(), *seed)?))
            }
            Expr::Alias { expr, .. } => expr.evaluate(batch),
        }
    }

    /// Evaluate as a row filter.
    pub fn evaluate_predicate(&self, batch: &RecordBatch) -> Result<BooleanArray> {
        let array = self.evaluate(batch)?;
        Ok(as_boolean(&array)?.clone())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "col({name:?})"),
            Expr::Literal(value) => write!(f, "lit({value})"),
            Expr::Cast { expr, to } => write!(f, "{expr}.cast({to})"),
            Expr::Binary { left, op, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Temporal { expr, part } => write!(f, "{expr}.dt.{}()", part.method()),
            Expr::Hash { expr, seed } => write!(f, "{expr}.hash({seed})"),
            Expr::Alias { expr, name } => write!(f, "{expr}.alias({name:?})"),
        }
    }
}

macro_rules! arithmetic_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                self.binary($op, rhs)
            }
        }
    };
}

arithmetic_op!(Add, add, BinaryOp::Add);
arithmetic_op!(Sub, sub, BinaryOp::Sub);
arithmetic_op!(Mul, mul, BinaryOp::Mul);
arithmetic_op!(Div, div, BinaryOp::Div);
arithmetic_op!(Rem, rem, BinaryOp::Rem);

// ---------------------------------------------------------------------------
// Value hashing
// ---------------------------------------------------------------------------

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const NULL_WORD: u64 = 0x6E75_6C6C_6E75_6C6C;

/// splitmix64 finaliser over `word`, keyed by `seed`.
fn mix(seed: u64, word: u64) -> u64 {
    let mut z = word.wrapping_add(seed.wrapping_mul(GOLDEN_GAMMA));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn hash_bytes(bytes: &[u8], seed: u64) -> u64 {
    let mut h = seed;
    for chunk in bytes.chunks(8) {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        h = mix(h, u64::from_le_bytes(word));
    }
    mix(h, bytes.len() as u64)
}

/// `-0.0` and `0.0` hash alike, as do all NaN payloads.
fn canonical_f64_bits(v: f64) -> u64 {
    if v == 0.0 {
        0
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

/// Hash each value of `array`. Integers and temporal values hash through
/// their `i64` representation, floats and decimals through their `f64` bits.
/// Dictionaries hash their values.
pub fn hash_array(array: &dyn Array, seed: u64) -> Result<UInt64Array> {
    let null_hash = mix(seed, NULL_WORD);
    let hashes: Vec<u64> = match array.data_type() {
        DataType::Dictionary(_, values) => {
            let unpacked = cast(array, values)?;
            return hash_array(unpacked.as_ref(), seed);
        }
        DataType::Decimal128(..) | DataType::Decimal256(..) => {
            let floats = cast(array, &DataType::Float64)?;
            return hash_array(floats.as_ref(), seed);
        }
        DataType::Utf8 => array
            .as_string::<i32>()
            .iter()
            .map(|v| v.map_or(null_hash, |s| hash_bytes(s.as_bytes(), seed)))
            .collect(),
        DataType::LargeUtf8 => array
            .as_string::<i64>()
            .iter()
            .map(|v| v.map_or(null_hash, |s| hash_bytes(s.as_bytes(), seed)))
            .collect(),
        DataType::Boolean => array
            .as_boolean()
            .iter()
            .map(|v| v.map_or(null_hash, |b| mix(seed, b as u64)))
            .collect(),
        DataType::UInt64 => array
            .as_primitive::<UInt64Type>()
            .iter()
            .map(|v| v.map_or(null_hash, |x| mix(seed, x)))
            .collect(),
        dt if dt.is_floating() => {
            let floats = cast(array, &DataType::Float64)?;
            floats
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.map_or(null_hash, |x| mix(seed, canonical_f64_bits(x))))
                .collect()
        }
        dt if dt.is_integer() || dt.is_temporal() => {
            let ints = cast(array, &DataType::Int64)?;
            ints.as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map_or(null_hash, |x| mix(seed, x as u64)))
                .collect()
        }
        other => {
            return Err(LoaderError::invalid_expr(format!(
                "cannot hash values of type {other}"
            )))
        }
    };
    Ok(UInt64Array::from(hashes))
}
