pub(crate) mod valid_query;
