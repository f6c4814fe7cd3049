//! A small typed builder for the Gremlin traversals this crate sends.
//!
//! A [`Traversal`] renders to Gremlin-Groovy text through `Display`, and the
//! in-memory store interprets the same steps directly. Only the steps used by
//! the dispatchers are modelled.

use std::fmt::{self, Display, Formatter, Write};

use serde_json::Value;

/// Where a traversal starts: the graph source `g` or an anonymous `__`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Graph,
    Anonymous,
}

/// Predicates accepted by `has` steps.
#[derive(Clone, Debug, PartialEq)]
pub enum P {
    Eq(Value),
    Neq(Value),
    Within(Vec<Value>),
    Gte(Value),
}

impl P {
    pub fn eq<V: Into<Value>>(value: V) -> Self {
        P::Eq(value.into())
    }

    pub fn neq<V: Into<Value>>(value: V) -> Self {
        P::Neq(value.into())
    }

    pub fn gte<V: Into<Value>>(value: V) -> Self {
        P::Gte(value.into())
    }

    pub fn within<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        P::Within(values.into_iter().map(Into::into).collect())
    }
}

/// Map column selected from a `group()` entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Keys,
    Values,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Sort key of an `order().by(..)` modulator.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderBy {
    Identity,
    Column(Column),
    Property(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    V,
    E,
    AddV(String),
    AddE {
        label: String,
        from: Option<Traversal>,
        to: Option<Traversal>,
    },
    Property {
        key: String,
        value: Value,
        single: bool,
    },
    Has {
        label: Option<String>,
        key: String,
        predicate: P,
    },
    HasLabel(String),
    Out(String),
    In(String),
    Both(String),
    InE(String),
    As(String),
    Select(String),
    SelectColumn(Column),
    Identity,
    Drop,
    Dedup,
    Unfold,
    Mean,
    SimplePath,
    Values(String),
    ElementMap(Vec<String>),
    Where(Traversal),
    Optional(Traversal),
    Union(Vec<Traversal>),
    RepeatUntil {
        body: Traversal,
        until: Traversal,
    },
    Path(Option<Traversal>),
    Group {
        key: Traversal,
        value: Traversal,
    },
    Order {
        by: OrderBy,
        order: Order,
    },
    Limit(usize),
    Project(Vec<(String, Traversal)>),
}

impl Step {
    /// Barrier steps collapse every incoming traverser into one result.
    pub fn is_reducing(&self) -> bool {
        matches!(self, Step::Mean | Step::Group { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Traversal {
    source: Source,
    steps: Vec<Step>,
}

/// Start a traversal on the graph source, `g`.
pub fn g() -> Traversal {
    Traversal::new(Source::Graph)
}

/// Start an anonymous traversal, `__`.
pub fn anon() -> Traversal {
    Traversal::new(Source::Anonymous)
}

impl Traversal {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            steps: Vec::new(),
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    fn push(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn v(self) -> Self {
        self.push(Step::V)
    }

    pub fn e(self) -> Self {
        self.push(Step::E)
    }

    pub fn add_v(self, label: &str) -> Self {
        self.push(Step::AddV(label.into()))
    }

    pub fn add_e(self, label: &str) -> Self {
        self.push(Step::AddE {
            label: label.into(),
            from: None,
            to: None,
        })
    }

    /// `from()` modulator of the preceding `addE`.
    pub fn from(mut self, traversal: Traversal) -> Self {
        if let Some(Step::AddE { from, .. }) = self.steps.last_mut() {
            from.replace(traversal);
        }
        self
    }

    /// `to()` modulator of the preceding `addE`.
    pub fn to(mut self, traversal: Traversal) -> Self {
        if let Some(Step::AddE { to, .. }) = self.steps.last_mut() {
            to.replace(traversal);
        }
        self
    }

    pub fn property<V: Into<Value>>(self, key: &str, value: V) -> Self {
        self.push(Step::Property {
            key: key.into(),
            value: value.into(),
            single: false,
        })
    }

    /// Overwrite a property with `single` cardinality.
    pub fn property_single<V: Into<Value>>(self, key: &str, value: V) -> Self {
        self.push(Step::Property {
            key: key.into(),
            value: value.into(),
            single: true,
        })
    }

    pub fn has<V: Into<Value>>(self, key: &str, value: V) -> Self {
        self.has_pred(key, P::eq(value))
    }

    pub fn has_pred(self, key: &str, predicate: P) -> Self {
        self.push(Step::Has {
            label: None,
            key: key.into(),
            predicate,
        })
    }

    /// `has(label, key, value)`
    pub fn has_on<V: Into<Value>>(self, label: &str, key: &str, value: V) -> Self {
        self.has_on_pred(label, key, P::eq(value))
    }

    pub fn has_on_pred(self, label: &str, key: &str, predicate: P) -> Self {
        self.push(Step::Has {
            label: Some(label.into()),
            key: key.into(),
            predicate,
        })
    }

    pub fn has_label(self, label: &str) -> Self {
        self.push(Step::HasLabel(label.into()))
    }

    pub fn out(self, label: &str) -> Self {
        self.push(Step::Out(label.into()))
    }

    pub fn in_(self, label: &str) -> Self {
        self.push(Step::In(label.into()))
    }

    pub fn both(self, label: &str) -> Self {
        self.push(Step::Both(label.into()))
    }

    pub fn in_e(self, label: &str) -> Self {
        self.push(Step::InE(label.into()))
    }

    pub fn as_(self, label: &str) -> Self {
        self.push(Step::As(label.into()))
    }

    pub fn select(self, label: &str) -> Self {
        self.push(Step::Select(label.into()))
    }

    pub fn select_column(self, column: Column) -> Self {
        self.push(Step::SelectColumn(column))
    }

    pub fn identity(self) -> Self {
        self.push(Step::Identity)
    }

    pub fn drop(self) -> Self {
        self.push(Step::Drop)
    }

    pub fn dedup(self) -> Self {
        self.push(Step::Dedup)
    }

    pub fn unfold(self) -> Self {
        self.push(Step::Unfold)
    }

    pub fn mean(self) -> Self {
        self.push(Step::Mean)
    }

    pub fn simple_path(self) -> Self {
        self.push(Step::SimplePath)
    }

    pub fn values(self, key: &str) -> Self {
        self.push(Step::Values(key.into()))
    }

    pub fn element_map(self, keys: &[&str]) -> Self {
        self.push(Step::ElementMap(
            keys.iter().map(|key| key.to_string()).collect(),
        ))
    }

    pub fn where_(self, traversal: Traversal) -> Self {
        self.push(Step::Where(traversal))
    }

    pub fn optional(self, traversal: Traversal) -> Self {
        self.push(Step::Optional(traversal))
    }

    pub fn union(self, traversals: Vec<Traversal>) -> Self {
        self.push(Step::Union(traversals))
    }

    /// `until(until).repeat(body)`: the exit condition is tested before each
    /// pass, so a traverser already satisfying it is emitted unchanged.
    pub fn repeat_until(self, body: Traversal, until: Traversal) -> Self {
        self.push(Step::RepeatUntil { body, until })
    }

    pub fn path(self) -> Self {
        self.push(Step::Path(None))
    }

    pub fn path_by(self, by: Traversal) -> Self {
        self.push(Step::Path(Some(by)))
    }

    /// `group().by(key).by(value)`
    pub fn group(self, key: Traversal, value: Traversal) -> Self {
        self.push(Step::Group { key, value })
    }

    pub fn order(self, by: OrderBy, order: Order) -> Self {
        self.push(Step::Order { by, order })
    }

    pub fn limit(self, limit: usize) -> Self {
        self.push(Step::Limit(limit))
    }

    pub fn project(self, projections: Vec<(&str, Traversal)>) -> Self {
        self.push(Step::Project(
            projections
                .into_iter()
                .map(|(key, by)| (key.to_string(), by))
                .collect(),
        ))
    }
}

fn write_literal(f: &mut Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{}", b),
        Value::Number(n) if n.is_f64() => write!(f, "{}d", n),
        Value::Number(n) => write!(f, "{}", n),
        Value::String(s) => write_quoted(f, s),
        Value::Array(items) => {
            f.write_char('[')?;
            write_list(f, items)?;
            f.write_char(']')
        }
        Value::Object(map) => {
            if map.is_empty() {
                return f.write_str("[:]");
            }
            f.write_char('[')?;
            for (i, (key, value)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_char(',')?;
                }
                write_quoted(f, key)?;
                f.write_char(':')?;
                write_literal(f, value)?;
            }
            f.write_char(']')
        }
    }
}

fn write_list(f: &mut Formatter<'_>, values: &[Value]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_char(',')?;
        }
        write_literal(f, value)?;
    }
    Ok(())
}

fn write_quoted(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('\'')
}

impl Display for P {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            P::Eq(value) => write_literal(f, value),
            P::Neq(value) => {
                f.write_str("neq(")?;
                write_literal(f, value)?;
                f.write_char(')')
            }
            P::Gte(value) => {
                f.write_str("gte(")?;
                write_literal(f, value)?;
                f.write_char(')')
            }
            P::Within(values) => {
                f.write_str("within(")?;
                write_list(f, values)?;
                f.write_char(')')
            }
        }
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Column::Keys => f.write_str("keys"),
            Column::Values => f.write_str("values"),
        }
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Order::Asc => f.write_str("asc"),
            Order::Desc => f.write_str("desc"),
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Step::V => f.write_str("V()"),
            Step::E => f.write_str("E()"),
            Step::AddV(label) => {
                f.write_str("addV(")?;
                write_quoted(f, label)?;
                f.write_char(')')
            }
            Step::AddE { label, from, to } => {
                f.write_str("addE(")?;
                write_quoted(f, label)?;
                f.write_char(')')?;
                if let Some(from) = from {
                    write!(f, ".from({})", from)?;
                }
                if let Some(to) = to {
                    write!(f, ".to({})", to)?;
                }
                Ok(())
            }
            Step::Property { key, value, single } => {
                f.write_str("property(")?;
                if *single {
                    f.write_str("single,")?;
                }
                write_quoted(f, key)?;
                f.write_char(',')?;
                write_literal(f, value)?;
                f.write_char(')')
            }
            Step::Has {
                label,
                key,
                predicate,
            } => {
                f.write_str("has(")?;
                if let Some(label) = label {
                    write_quoted(f, label)?;
                    f.write_char(',')?;
                }
                write_quoted(f, key)?;
                write!(f, ",{})", predicate)
            }
            Step::HasLabel(label) => named(f, "hasLabel", label),
            Step::Out(label) => named(f, "out", label),
            Step::In(label) => named(f, "in", label),
            Step::Both(label) => named(f, "both", label),
            Step::InE(label) => named(f, "inE", label),
            Step::As(label) => named(f, "as", label),
            Step::Select(label) => named(f, "select", label),
            Step::SelectColumn(column) => write!(f, "select({})", column),
            Step::Identity => f.write_str("identity()"),
            Step::Drop => f.write_str("drop()"),
            Step::Dedup => f.write_str("dedup()"),
            Step::Unfold => f.write_str("unfold()"),
            Step::Mean => f.write_str("mean()"),
            Step::SimplePath => f.write_str("simplePath()"),
            Step::Values(key) => named(f, "values", key),
            Step::ElementMap(keys) => {
                f.write_str("elementMap(")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write_quoted(f, key)?;
                }
                f.write_char(')')
            }
            Step::Where(t) => write!(f, "where({})", t),
            Step::Optional(t) => write!(f, "optional({})", t),
            Step::Union(branches) => {
                f.write_str("union(")?;
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{}", branch)?;
                }
                f.write_char(')')
            }
            Step::RepeatUntil { body, until } => write!(f, "until({}).repeat({})", until, body),
            Step::Path(None) => f.write_str("path()"),
            Step::Path(Some(by)) => write!(f, "path().by({})", by),
            Step::Group { key, value } => write!(f, "group().by({}).by({})", key, value),
            Step::Order { by, order } => match by {
                OrderBy::Identity => write!(f, "order().by({})", order),
                OrderBy::Column(column) => write!(f, "order().by({},{})", column, order),
                OrderBy::Property(key) => {
                    f.write_str("order().by(")?;
                    write_quoted(f, key)?;
                    write!(f, ",{})", order)
                }
            },
            Step::Limit(n) => write!(f, "limit({})", n),
            Step::Project(projections) => {
                f.write_str("project(")?;
                for (i, (key, _)) in projections.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write_quoted(f, key)?;
                }
                f.write_char(')')?;
                for (_, by) in projections {
                    write!(f, ".by({})", by)?;
                }
                Ok(())
            }
        }
    }
}

fn named(f: &mut Formatter<'_>, step: &str, arg: &str) -> fmt::Result {
    f.write_str(step)?;
    f.write_char('(')?;
    write_quoted(f, arg)?;
    f.write_char(')')
}

impl Display for Traversal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.source {
            Source::Graph => f.write_char('g')?,
            Source::Anonymous => f.write_str("__")?,
        }
        for step in &self.steps {
            write!(f, ".{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_composite_write() {
        let t = g()
            .add_v("restaurant")
            .property("id", "r1")
            .property("name", "Pizza Pete's")
            .as_("r")
            .add_e("within")
            .to(anon().v().has_on("city", "id", "c1"))
            .select("r")
            .add_e("serves")
            .to(anon().v().has_on("cuisine", "id", "cu1"));

        assert_eq!(
            t.to_string(),
            "g.addV('restaurant').property('id','r1').property('name','Pizza Pete\\'s')\
             .as('r').addE('within').to(__.V().has('city','id','c1'))\
             .select('r').addE('serves').to(__.V().has('cuisine','id','cu1'))"
        );
    }

    #[test]
    fn renders_ranking_query() {
        let t = g()
            .v()
            .has_on("person", "id", "p1")
            .out("livesIn")
            .in_("within")
            .where_(anon().out("serves").has_pred("id", P::within(vec!["a", "b"])))
            .group(anon().identity(), anon().in_("about").values("rating").mean())
            .unfold()
            .order(OrderBy::Column(Column::Values), Order::Desc)
            .limit(1)
            .project(vec![
                ("id", anon().select_column(Column::Keys).values("id")),
                ("averageRating", anon().select_column(Column::Values)),
            ]);

        assert_eq!(
            t.to_string(),
            "g.V().has('person','id','p1').out('livesIn').in('within')\
             .where(__.out('serves').has('id',within('a','b')))\
             .group().by(__.identity()).by(__.in('about').values('rating').mean())\
             .unfold().order().by(values,desc).limit(1)\
             .project('id','averageRating')\
             .by(__.select(keys).values('id')).by(__.select(values))"
        );
    }

    #[test]
    fn renders_single_cardinality_and_numbers() {
        let t = g()
            .v()
            .has_on("review", "createdAt", 1_600_000_000)
            .property_single("rating", 4.5)
            .property("flag", true);

        assert_eq!(
            t.to_string(),
            "g.V().has('review','createdAt',1600000000).property(single,'rating',4.5d).property('flag',true)"
        );
    }

    #[test]
    fn renders_path_search() {
        let t = g()
            .v()
            .has_on("person", "id", "a")
            .repeat_until(
                anon().both("friends").simple_path(),
                anon().has_on("person", "id", "b"),
            )
            .path();

        assert_eq!(
            t.to_string(),
            "g.V().has('person','id','a').until(__.has('person','id','b'))\
             .repeat(__.both('friends').simplePath()).path()"
        );
    }

    #[test]
    fn modulators_only_attach_to_add_e() {
        let t = g().v().to(anon().v());
        assert_eq!(t.steps(), &[Step::V]);
    }
}
