use std::{
    fmt,
    ops::{BitAnd, BitOr, Not},
};

use crate::Value;

/// A handle to a column by name, used to build [`Condition`]s
/// and [`OrderBy`] clauses.
///
/// # Example
///
/// ```
/// use binder::QueryCol;
///
/// let i1 = QueryCol::new("i1");
/// let s1 = QueryCol::new("s1");
///
/// let cond = i1.gt(100) & (s1.eq("alpha") | s1.is_null());
/// assert_eq!(cond.to_string(), "i1 > 100 AND (s1 = 'alpha' OR s1 IS NULL)");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryCol {
    name: String,
}

/// A comparison operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

/// A `WHERE` condition.
///
/// Conditions are combined with `&` (`AND`), `|` (`OR`) and `!` (`NOT`).
/// They render to SQL in two ways: [`Condition::to_sql`] produces a
/// statement fragment with `?` placeholders and the bound values, while
/// `Display` inlines the values as literals, e.g. `i1 = 101`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Condition {
    /// Matches every row.
    #[default]
    All,
    /// Matches no row.
    None,
    Cmp {
        col: String,
        op: CmpOp,
        value: Value,
    },
    IsNull {
        col: String,
        negated: bool,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

/// An `ORDER BY` term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    col: String,
    descending: bool,
}

impl CmpOp {
    const fn as_sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Like => "LIKE",
        }
    }
}

macro_rules! impl_cmp {
    ($($fn:ident => $op:ident),+) => {
        $(
            pub fn $fn(&self, value: impl Into<Value>) -> Condition {
                self.cmp(CmpOp::$op, value.into())
            }
        )*
    };
}

impl QueryCol {
    pub fn new(name: impl Into<String>) -> QueryCol {
        QueryCol { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn cmp(&self, op: CmpOp, value: Value) -> Condition {
        match (op, value) {
            (CmpOp::Eq, Value::Null) => self.is_null(),
            (CmpOp::Ne, Value::Null) => self.is_not_null(),
            (op, value) => Condition::Cmp {
                col: self.name.clone(),
                op,
                value,
            },
        }
    }

    impl_cmp!(
        eq => Eq,
        ne => Ne,
        lt => Lt,
        le => Le,
        gt => Gt,
        ge => Ge
    );

    /// Translates to `<column> LIKE <pattern>`.
    pub fn like(&self, pattern: impl Into<String>) -> Condition {
        self.cmp(CmpOp::Like, Value::Str(pattern.into()))
    }

    pub fn is_null(&self) -> Condition {
        Condition::IsNull {
            col: self.name.clone(),
            negated: false,
        }
    }

    pub fn is_not_null(&self) -> Condition {
        Condition::IsNull {
            col: self.name.clone(),
            negated: true,
        }
    }

    pub fn asc(&self) -> OrderBy {
        OrderBy {
            col: self.name.clone(),
            descending: false,
        }
    }

    pub fn desc(&self) -> OrderBy {
        OrderBy {
            col: self.name.clone(),
            descending: true,
        }
    }
}

impl Condition {
    /// A condition which doesn't filter anything.
    pub const fn all() -> Condition {
        Condition::All
    }

    /// A condition which filters out everything, the same as `!Condition::all()`.
    pub const fn none() -> Condition {
        Condition::None
    }

    pub const fn is_all(&self) -> bool {
        matches!(self, Condition::All)
    }

    /// Render the condition as a statement fragment using `?`
    /// placeholders, along with the values to bind to them.
    ///
    /// Returns an empty string for [`Condition::All`].
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut buffer = String::new();
        let mut params = Some(Vec::new());
        self.push_to_buffer(&mut buffer, &mut params);

        (buffer, params.unwrap_or_default())
    }

    /// Call `f` with every column the condition mentions, along with
    /// the value it is compared to (`Null` for `IS NULL` checks).
    pub fn visit(&self, f: &mut impl FnMut(&str, &Value)) {
        match self {
            Condition::All | Condition::None => (),
            Condition::Cmp { col, value, .. } => f(col, value),
            Condition::IsNull { col, .. } => f(col, &Value::Null),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.visit(f);
                b.visit(f);
            }
            Condition::Not(a) => a.visit(f),
        }
    }

    /// Push the condition to `buffer`. Values are bound as `?` if `params`
    /// is `Some`, and inlined as literals otherwise.
    fn push_to_buffer(&self, buffer: &mut String, params: &mut Option<Vec<Value>>) {
        match self {
            Condition::All => (),
            Condition::None => buffer.push_str("1 = 0"),
            Condition::Cmp { col, op, value } => {
                buffer.push_str(col);
                buffer.push(' ');
                buffer.push_str(op.as_sql());
                buffer.push(' ');
                match params {
                    Some(params) => {
                        buffer.push('?');
                        params.push(value.clone());
                    }
                    None => buffer.push_str(&value.to_string()),
                }
            }
            Condition::IsNull { col, negated } => {
                buffer.push_str(col);
                buffer.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Condition::And(a, b) => {
                a.push_operand(buffer, params);
                buffer.push_str(" AND ");
                b.push_operand(buffer, params);
            }
            Condition::Or(a, b) => {
                a.push_to_buffer(buffer, params);
                buffer.push_str(" OR ");
                b.push_to_buffer(buffer, params);
            }
            Condition::Not(a) => {
                buffer.push_str("NOT (");
                a.push_to_buffer(buffer, params);
                buffer.push(')');
            }
        }
    }

    /// Push an operand of `AND`, which needs parentheses around `OR`.
    fn push_operand(&self, buffer: &mut String, params: &mut Option<Vec<Value>>) {
        if let Condition::Or(..) = self {
            buffer.push('(');
            self.push_to_buffer(buffer, params);
            buffer.push(')');
        } else {
            self.push_to_buffer(buffer, params);
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buffer = String::new();
        self.push_to_buffer(&mut buffer, &mut None);
        f.write_str(&buffer)
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Condition::All, other) | (other, Condition::All) => other,
            (Condition::None, _) | (_, Condition::None) => Condition::None,
            (a, b) => Condition::And(Box::new(a), Box::new(b)),
        }
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Condition::All, _) | (_, Condition::All) => Condition::All,
            (Condition::None, other) | (other, Condition::None) => other,
            (a, b) => Condition::Or(Box::new(a), Box::new(b)),
        }
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Self::Output {
        match self {
            Condition::All => Condition::None,
            Condition::None => Condition::All,
            Condition::Not(inner) => *inner,
            other => Condition::Not(Box::new(other)),
        }
    }
}

impl OrderBy {
    pub fn col(&self) -> &str {
        &self.col
    }

    pub const fn is_descending(&self) -> bool {
        self.descending
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.descending { "DESC" } else { "ASC" };
        write!(f, "{} {dir}", self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::{Condition, QueryCol};
    use crate::Value;

    #[test]
    fn rendered_condition() {
        let cond = QueryCol::new("i1").eq(101);
        assert_eq!(cond.to_string(), "i1 = 101");
        assert_eq!(format!("{:?}", cond.to_string()), "\"i1 = 101\"");
    }

    #[test]
    fn placeholders() {
        let i1 = QueryCol::new("i1");
        let s1 = QueryCol::new("s1");

        let (stmt, params) = (i1.ge(1) & i1.lt(5) & s1.like("a%")).to_sql();
        assert_eq!(stmt, "i1 >= ? AND i1 < ? AND s1 LIKE ?");
        assert_eq!(
            params,
            vec![Value::Int(1), Value::Int(5), Value::Str("a%".to_string())]
        );
    }

    #[test]
    fn null_comparisons() {
        let s1 = QueryCol::new("s1");

        let (stmt, params) = s1.eq(None::<String>).to_sql();
        assert_eq!(stmt, "s1 IS NULL");
        assert!(params.is_empty());

        assert_eq!(s1.ne(Value::Null).to_string(), "s1 IS NOT NULL");
    }

    #[test]
    fn precedence() {
        let a = QueryCol::new("a");
        let cond = a.eq(1) & (a.eq(2) | a.eq(3));
        assert_eq!(cond.to_string(), "a = 1 AND (a = 2 OR a = 3)");

        let cond = (a.eq(1) & a.eq(2)) | !a.eq("x");
        assert_eq!(cond.to_string(), "a = 1 AND a = 2 OR NOT (a = 'x')");
    }

    #[test]
    fn all_is_neutral() {
        let a = QueryCol::new("a");
        assert_eq!(Condition::all() & a.eq(1), a.eq(1));
        assert!((a.eq(1) | Condition::all()).is_all());
        assert_eq!(Condition::all().to_sql(), (String::new(), Vec::new()));
    }

    #[test]
    fn negated_all_matches_nothing() {
        let a = QueryCol::new("a");

        let none = !Condition::all();
        assert_eq!(none, Condition::none());
        assert_eq!(none.to_sql(), ("1 = 0".to_string(), Vec::new()));
        assert!((!none.clone()).is_all());

        assert_eq!(a.eq(1) & !Condition::all(), Condition::none());
        assert_eq!(a.eq(1) | !Condition::all(), a.eq(1));
        assert_eq!(!!a.eq(1), a.eq(1));
    }

    #[test]
    fn order_by() {
        let a = QueryCol::new("a");
        assert_eq!(a.asc().to_string(), "a ASC");
        assert_eq!(a.desc().to_string(), "a DESC");
    }
}
