//! Query model and the builder that parses `filter`/`sort` expressions
//!
//! A [`Query`] is store-independent: a resource type, a list of filters
//! (all must hold) and a list of sort orders. Pagination travels beside it
//! as a [`Page`].
//!
//! # Example
//! ```rust,ignore
//! // GET /Person/?filter=age >= 30&filter=name IN Ada,Grace&sort=age&limit=2
//! let params = QueryParams::from_pairs(&pairs);
//! let query = QueryBuilder::new(&uris).build(schema, Query::all("Person"), &params)?;
//! let page = params.page(settings.default_limit, settings.max_limit);
//! let records = store.fetch(&query, page.limit, page.offset).await?;
//! ```

use std::cmp::Ordering;

use crate::core::coercion::decode_text;
use crate::core::error::{QueryError, RestError};
use crate::core::field::{FieldValue, RecordKey};
use crate::core::schema::Schema;
use crate::core::store::Record;
use crate::core::uri::UriBuilder;

/// Name under which the record key can be filtered and sorted
pub const KEY_FIELD: &str = "key";

/// Comparison operators accepted in filter expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Le),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Ge),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }

    /// Whether `stored.cmp(operand)` satisfies the operator
    ///
    /// Incomparable values only satisfy `!=`.
    pub fn matches(&self, ordering: Option<Ordering>) -> bool {
        match self {
            Operator::Eq => ordering == Some(Ordering::Equal),
            Operator::Ne => ordering != Some(Ordering::Equal),
            Operator::Lt => ordering == Some(Ordering::Less),
            Operator::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Operator::Gt => ordering == Some(Ordering::Greater),
            Operator::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Condition on a single value
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<T> {
    Compare(Operator, T),
    In(Vec<T>),
}

impl<T> Predicate<T> {
    /// Evaluate with `cmp` comparing the stored value against an operand
    pub fn evaluate(&self, cmp: impl Fn(&T) -> Option<Ordering>) -> bool {
        match self {
            Predicate::Compare(op, operand) => op.matches(cmp(operand)),
            Predicate::In(operands) => operands
                .iter()
                .any(|operand| cmp(operand) == Some(Ordering::Equal)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Condition on the record key
    Key(Predicate<RecordKey>),
    /// Condition on a declared field
    Field {
        name: String,
        predicate: Predicate<FieldValue>,
    },
}

impl Filter {
    pub fn field(name: impl Into<String>, op: Operator, value: FieldValue) -> Self {
        Filter::Field {
            name: name.into(),
            predicate: Predicate::Compare(op, value),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Key(predicate) => predicate.evaluate(|k| Some(record.key.cmp(k))),
            Filter::Field { name, predicate } => {
                let stored = record.value(name);
                predicate.evaluate(|v| stored.compare(v))
            }
        }
    }
}

/// Ascending sort order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    Key,
    Field(String),
}

/// Unexecuted query over one resource type
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub kind: String,
    pub filters: Vec<Filter>,
    pub orders: Vec<Order>,
}

impl Query {
    /// Every record of `kind`
    pub fn all(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filters: Vec::new(),
            orders: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.kind == self.kind && self.filters.iter().all(|f| f.matches(record))
    }

    /// Ordering of two matching records; key order breaks ties
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.orders
            .iter()
            .map(|order| match order {
                Order::Key => a.key.cmp(&b.key),
                Order::Field(name) => a.value(name).sort_cmp(b.value(name)),
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| a.key.cmp(&b.key))
    }
}

/// Result window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// `None` means unbounded
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Raw query-string parameters of a collection request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// `filter` values, in request order
    pub filters: Vec<String>,
    /// `sort` values, in request order
    pub sorts: Vec<String>,
    /// First `limit`, when it is a decimal number
    pub limit: Option<usize>,
    /// First `offset`, when it is a decimal number
    pub offset: Option<usize>,
}

fn parse_count(raw: &str) -> Option<usize> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

impl QueryParams {
    /// Collect parameters from decoded query pairs; unrelated names are ignored
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut params = Self::default();
        let mut seen_limit = false;
        let mut seen_offset = false;

        for (name, value) in pairs {
            match name.as_str() {
                "filter" => params.filters.push(value.clone()),
                "sort" => params.sorts.push(value.clone()),
                "limit" if !seen_limit => {
                    seen_limit = true;
                    params.limit = parse_count(value);
                }
                "offset" if !seen_offset => {
                    seen_offset = true;
                    params.offset = parse_count(value);
                }
                _ => {}
            }
        }
        params
    }

    /// Window for listing: defaults applied, limit capped by `max_limit`
    pub fn page(&self, default_limit: usize, max_limit: Option<usize>) -> Page {
        let limit = self.limit.unwrap_or(default_limit);
        Page {
            limit: Some(max_limit.map_or(limit, |max| limit.min(max))),
            offset: self.offset.unwrap_or(0),
        }
    }

    /// Window for bulk deletes: only what the request stated
    pub fn explicit_page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset.unwrap_or(0),
        }
    }
}

/// Folds `filter` and `sort` parameters into a query
pub struct QueryBuilder<'a> {
    uris: &'a UriBuilder,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(uris: &'a UriBuilder) -> Self {
        Self { uris }
    }

    /// Filters first, in request order, then sorts
    pub fn build(
        &self,
        schema: &Schema,
        base: Query,
        params: &QueryParams,
    ) -> Result<Query, RestError> {
        let mut query = base;
        for expr in &params.filters {
            if let Some(filter) = self.parse_filter(schema, expr)? {
                query = query.filter(filter);
            }
        }
        for sort in &params.sorts {
            query = query.order(parse_sort(schema, sort)?);
        }
        Ok(query)
    }

    /// Parse `"<field> <op> <value>"`; anything not in three parts is ignored
    ///
    /// The field is resolved before the operator, so an unknown field is
    /// reported even when the operator is also bad. Each element of an `IN`
    /// list is decoded for the field's kind like any other filter value, so
    /// one element that does not fit the kind rejects the whole filter with
    /// `BadFilterValue`.
    pub fn parse_filter(&self, schema: &Schema, expr: &str) -> Result<Option<Filter>, RestError> {
        let parts: Vec<&str> = expr.splitn(3, ' ').collect();
        let [field, op, value] = parts.as_slice() else {
            tracing::debug!(resource = schema.name(), filter = expr, "ignoring malformed filter");
            return Ok(None);
        };
        let (field, op, value) = (*field, *op, *value);

        let descriptor = if field == KEY_FIELD {
            None
        } else {
            Some(
                schema
                    .get_field(field)
                    .ok_or_else(|| QueryError::BadFilterField {
                        resource: schema.name().to_string(),
                        field: field.to_string(),
                    })?,
            )
        };

        let operator = match op {
            "IN" => None,
            op => Some(Operator::from_token(op).ok_or_else(|| QueryError::BadOperator {
                operator: op.to_string(),
            })?),
        };

        let Some(descriptor) = descriptor else {
            let decode = |text: &str| {
                RecordKey::parse(text).map_err(|message| QueryError::BadFilterValue {
                    field: field.to_string(),
                    message,
                })
            };
            let predicate = match operator {
                Some(op) => Predicate::Compare(op, decode(value)?),
                None => Predicate::In(value.split(',').map(decode).collect::<Result<Vec<_>, _>>()?),
            };
            return Ok(Some(Filter::Key(predicate)));
        };

        let decode = |text: &str| {
            decode_text(&descriptor.kind, text, self.uris).map_err(|message| {
                QueryError::BadFilterValue {
                    field: field.to_string(),
                    message,
                }
            })
        };
        let predicate = match operator {
            Some(op) => Predicate::Compare(op, decode(value)?),
            None => Predicate::In(value.split(',').map(decode).collect::<Result<Vec<_>, _>>()?),
        };
        Ok(Some(Filter::Field {
            name: field.to_string(),
            predicate,
        }))
    }
}

/// Empty or `key` sorts by key; otherwise a declared field
fn parse_sort(schema: &Schema, sort: &str) -> Result<Order, RestError> {
    if sort.is_empty() || sort == KEY_FIELD {
        return Ok(Order::Key);
    }
    if schema.get_field(sort).is_some() {
        return Ok(Order::Field(sort.to_string()));
    }
    Err(QueryError::BadFilterField {
        resource: schema.name().to_string(),
        field: sort.to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{FieldDescriptor, ReverseRelationship};

    fn uris() -> UriBuilder {
        UriBuilder::new("http://api.test", "")
    }

    fn person() -> Schema {
        let mut schema = Schema::new("Person")
            .field("name", FieldDescriptor::string())
            .field("age", FieldDescriptor::integer());
        schema.add_relationship(ReverseRelationship {
            name: "pets".into(),
            source: "Pet".into(),
            field: "owner".into(),
        });
        schema
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn build(raw: &[(&str, &str)]) -> Result<Query, RestError> {
        let uris = uris();
        let params = QueryParams::from_pairs(&pairs(raw));
        QueryBuilder::new(&uris).build(&person(), Query::all("Person"), &params)
    }

    #[test]
    fn test_operator_tokens() {
        for token in ["==", "!=", "<", "<=", ">", ">="] {
            assert_eq!(Operator::from_token(token).unwrap().token(), token);
        }
        assert_eq!(Operator::from_token("IN"), None);
        assert_eq!(Operator::from_token("=~"), None);
    }

    #[test]
    fn test_filters_fold_in_order() {
        let query = build(&[
            ("filter", "age >= 30"),
            ("filter", "name == Ada Lovelace"),
            ("sort", "age"),
            ("sort", ""),
        ])
        .unwrap();

        assert_eq!(
            query.filters,
            vec![
                Filter::field("age", Operator::Ge, FieldValue::Integer(30)),
                Filter::field(
                    "name",
                    Operator::Eq,
                    FieldValue::String("Ada Lovelace".into())
                ),
            ]
        );
        assert_eq!(query.orders, vec![Order::Field("age".into()), Order::Key]);
    }

    #[test]
    fn test_malformed_filter_is_ignored() {
        let query = build(&[("filter", "age>=30"), ("filter", "age >=")]).unwrap();
        assert!(query.filters.is_empty());
    }

    #[test]
    fn test_unknown_field_and_operator() {
        let err = build(&[("filter", "shoe == 44")]).unwrap_err();
        assert!(matches!(
            err,
            RestError::Query(QueryError::BadFilterField { ref field, .. }) if field == "shoe"
        ));

        let err = build(&[("filter", "pets == 1")]).unwrap_err();
        assert!(matches!(err, RestError::Query(QueryError::BadFilterField { .. })));

        let err = build(&[("filter", "age =~ 3")]).unwrap_err();
        assert!(matches!(
            err,
            RestError::Query(QueryError::BadOperator { ref operator }) if operator == "=~"
        ));

        let err = build(&[("filter", "shoe =~ 3")]).unwrap_err();
        assert!(matches!(
            err,
            RestError::Query(QueryError::BadFilterField { ref field, .. }) if field == "shoe"
        ));

        let err = build(&[("sort", "shoe")]).unwrap_err();
        assert!(matches!(err, RestError::Query(QueryError::BadFilterField { .. })));
    }

    #[test]
    fn test_bad_value_is_rejected() {
        let err = build(&[("filter", "age > thirty")]).unwrap_err();
        assert!(matches!(
            err,
            RestError::Query(QueryError::BadFilterValue { ref field, .. }) if field == "age"
        ));

        let err = build(&[("filter", "age IN 10,ten,45")]).unwrap_err();
        assert!(matches!(
            err,
            RestError::Query(QueryError::BadFilterValue { ref field, .. }) if field == "age"
        ));
    }

    #[test]
    fn test_in_and_key_filters() {
        let query = build(&[("filter", "age IN 10,45"), ("filter", "key != 3")]).unwrap();
        assert_eq!(
            query.filters[0],
            Filter::Field {
                name: "age".into(),
                predicate: Predicate::In(vec![FieldValue::Integer(10), FieldValue::Integer(45)]),
            }
        );
        assert_eq!(
            query.filters[1],
            Filter::Key(Predicate::Compare(Operator::Ne, RecordKey::Id(3)))
        );
    }

    #[test]
    fn test_filter_matching() {
        let ada = Record::new("Person", RecordKey::Id(1)).with_value("age", FieldValue::Integer(36));
        let anon = Record::new("Person", RecordKey::Id(2));

        let adults = Filter::field("age", Operator::Ge, FieldValue::Integer(30));
        assert!(adults.matches(&ada));
        assert!(!adults.matches(&anon));

        let not_30 = Filter::field("age", Operator::Ne, FieldValue::Integer(30));
        assert!(not_30.matches(&anon));

        let first = Filter::Key(Predicate::In(vec![RecordKey::Id(1), RecordKey::Id(9)]));
        assert!(first.matches(&ada));
        assert!(!first.matches(&anon));
    }

    #[test]
    fn test_compare_falls_back_to_key() {
        let query = Query::all("Person").order(Order::Field("age".into()));
        let a = Record::new("Person", RecordKey::Id(2)).with_value("age", FieldValue::Integer(5));
        let b = Record::new("Person", RecordKey::Id(1)).with_value("age", FieldValue::Integer(5));
        let c = Record::new("Person", RecordKey::Id(3));

        assert_eq!(query.compare(&a, &b), Ordering::Greater);
        assert_eq!(query.compare(&c, &a), Ordering::Less);
    }

    #[test]
    fn test_limit_and_offset_defaults() {
        let params = QueryParams::from_pairs(&pairs(&[("limit", "two"), ("offset", "-1")]));
        assert_eq!(
            params.page(5, None),
            Page {
                limit: Some(5),
                offset: 0
            }
        );

        let params = QueryParams::from_pairs(&pairs(&[("limit", "50"), ("limit", "1")]));
        assert_eq!(params.page(5, Some(20)).limit, Some(20));
        assert_eq!(params.explicit_page().limit, Some(50));
        assert_eq!(QueryParams::default().explicit_page().limit, None);
    }
}
