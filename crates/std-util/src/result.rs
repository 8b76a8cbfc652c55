/// Unwraps the `Err` of a result, panicking with the `Ok` value otherwise.
///
/// An optional predicate may be given to check the error kind:
/// `assert_err!(res, Error::is_alias_not_found)`.
#[macro_export]
macro_rules! assert_err {
    ($e:expr) => {
        match $e {
            Err(e) => e,
            Ok(actual) => panic!("expected `Err`; actual=Ok({:?})", actual),
        }
    };
    ($e:expr, $pred:expr) => {{
        let err = $crate::assert_err!($e);
        assert!(
            ($pred)(&err),
            "error did not satisfy `{}`; actual={:?}",
            stringify!($pred),
            err
        );
        err
    }};
}

#[macro_export]
macro_rules! assert_ok {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(err) => panic!("expected `Ok`; actual=Err({:?})", err),
        }
    };
}
