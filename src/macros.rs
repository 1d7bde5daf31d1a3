macro_rules! emit {
    ($buffer:expr, $depth:expr, $($format:tt)*) => {
        $buffer.line($depth, format_args!($($format)*))
    };
}
