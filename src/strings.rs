//! String helpers.

/// True when `val` is empty or contains only whitespace.
pub fn is_empty(val: &str) -> bool {
    val.trim().is_empty()
}

pub fn is_not_empty(val: &str) -> bool {
    !is_empty(val)
}
