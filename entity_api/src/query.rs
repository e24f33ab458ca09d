use sea_orm::strum::IntoEnumIterator;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select, Value};
use std::collections::HashMap;

/// How a filter value is compared against its column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gte,
    Lte,
}

/// `QueryFilterMap` bridges filter parameters between the web layer and the query layer.
/// Keys are column names; each key may carry several comparisons (for example a lower and an
/// upper bound on the same column). Every stored comparison is ANDed into the final query.
///
/// # Example
///
/// ```
/// use sea_orm::Value;
/// use entity_api::query::{Comparison, QueryFilterMap};
///
/// let mut query_filter_map = QueryFilterMap::new();
/// query_filter_map.insert_with("actualsales".to_string(), Comparison::Gte, Some(Value::Double(Some(10.0))));
/// query_filter_map.insert_with("actualsales".to_string(), Comparison::Lte, Some(Value::Double(Some(90.0))));
/// assert_eq!(query_filter_map.get("actualsales").len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct QueryFilterMap {
    map: HashMap<String, Vec<(Comparison, Value)>>,
}

impl QueryFilterMap {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// All comparisons registered for `key`, in insertion order.
    pub fn get(&self, key: &str) -> Vec<(Comparison, Value)> {
        self.map.get(key).cloned().unwrap_or_default()
    }

    /// Registers an equality filter. A `None` value is ignored.
    pub fn insert(&mut self, key: String, value: Option<Value>) {
        self.insert_with(key, Comparison::Eq, value);
    }

    /// Registers a filter with an explicit comparison. A `None` value is ignored so that
    /// optional request parameters can be passed straight through.
    pub fn insert_with(&mut self, key: String, comparison: Comparison, value: Option<Value>) {
        if let Some(value) = value {
            self.map.entry(key).or_default().push((comparison, value));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// `IntoQueryFilterMap` converts a parameter struct into a `QueryFilterMap`, defining how each of
/// its fields maps to a column comparison.
///
/// # Example
///
/// ```
/// use entity_api::query::{IntoQueryFilterMap, QueryFilterMap};
///
/// struct MyParams {
///     product: Option<String>,
/// }
///
/// impl IntoQueryFilterMap for MyParams {
///     fn into_query_filter_map(self) -> QueryFilterMap {
///         let mut query_filter_map = QueryFilterMap::new();
///         query_filter_map.insert(
///             "product".to_string(),
///             self.product.map(|product| sea_orm::Value::String(Some(Box::new(product)))),
///         );
///         query_filter_map
///     }
/// }
/// ```
pub trait IntoQueryFilterMap {
    fn into_query_filter_map(self) -> QueryFilterMap;
}

impl IntoQueryFilterMap for QueryFilterMap {
    fn into_query_filter_map(self) -> QueryFilterMap {
        self
    }
}

/// Applies every comparison in `query_filter_map` to `query`.
///
/// We iterate through the entity's defined columns so that we only attempt to filter by
/// columns that exist; unknown keys are ignored.
pub fn apply_filters<E, C>(mut query: Select<E>, query_filter_map: &QueryFilterMap) -> Select<E>
where
    E: EntityTrait,
    C: ColumnTrait + IntoEnumIterator,
{
    for column in C::iter() {
        for (comparison, value) in query_filter_map.get(&column.to_string()) {
            query = match comparison {
                Comparison::Eq => query.filter(column.eq(value)),
                Comparison::Gte => query.filter(column.gte(value)),
                Comparison::Lte => query.filter(column.lte(value)),
            };
        }
    }

    query
}
