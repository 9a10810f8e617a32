/// Build a [`Params`](crate::Params) mapping from `key => value` pairs.
///
/// Keys accept anything `String::from` does; values anything with an `Into<Value>`
/// conversion.
/// ```rust
/// use store_middleware::prelude::*;
///
/// let params = params! { "table" => "pg_class", "limit" => 10 };
/// assert_eq!(params.len(), 2);
/// assert_eq!(params["limit"], Value::Int(10));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::Params::new();
        $(
            params.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        params
    }};
}
