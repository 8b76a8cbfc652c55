mod find_operator;
pub use find_operator::{
    any, between, equal, ilike, in_list, is_null, less_than, less_than_or_equal, like,
    more_than, more_than_or_equal, not, raw, raw_fn, raw_with_params, FindOperand, FindOperator,
    OperatorKind, RawSql,
};

mod row;
pub use row::Row;

mod value;
pub use value::Value;
