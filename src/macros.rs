// src/macros.rs
#[macro_export]
macro_rules! s {
    // String shorthand!

    // Zero-arg → String::new()
    () => {
        ::std::string::String::new()
    };
    // Any single expression — works for literals, consts, or vars
    ($expr:expr) => {
        ::std::string::String::from($expr)
    };
}

#[macro_export]
macro_rules! ymd {
    // Calendar date shorthand for literals known to be valid (tests, consts).
    ($y:expr, $m:expr, $d:expr) => {
        ::chrono::NaiveDate::from_ymd_opt($y, $m, $d).expect("valid calendar date literal")
    };
}
