//! Column dtype vocabulary for tabular-frame schemas.

use crate::expr::TypeExpr;

/// The closed set of dtypes accepted on frame columns, indexes and levels
pub const VALID_DTYPES: &[&str] = &[
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "float",
    "float16",
    "float32",
    "float64",
    "str",
    "string",
    "bool",
    "boolean",
    "datetime",
    "datetime64",
    "datetime64[ns]",
    "timedelta",
    "timedelta64",
    "timedelta64[ns]",
    "object",
    "category",
];

/// Whether `dtype` is in the accepted vocabulary (case-insensitive)
#[must_use]
pub fn is_valid_dtype(dtype: &str) -> bool {
    let lower = dtype.to_ascii_lowercase();
    VALID_DTYPES.contains(&lower.as_str())
}

/// Infer the column dtype implied by a native type expression.
///
/// Used when a frame's row model seeds column rules: a model field typed
/// `builtins:int` produces an `int` column. Non-native and container
/// expressions have no columnar equivalent and return `None`.
#[must_use]
pub fn dtype_for_native(expr: &TypeExpr) -> Option<&'static str> {
    let TypeExpr::Native { module, name } = expr else {
        return None;
    };
    match (module.as_str(), name.as_str()) {
        ("builtins", "int") => Some("int"),
        ("builtins", "float") => Some("float"),
        ("builtins", "str") => Some("str"),
        ("builtins", "bool") => Some("bool"),
        ("datetime", "datetime") => Some("datetime"),
        ("datetime", "date") => Some("datetime"),
        ("datetime", "timedelta") => Some("timedelta"),
        ("decimal", "Decimal") => Some("float"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_dtypes() {
        assert!(is_valid_dtype("int"));
        assert!(is_valid_dtype("Float64"));
        assert!(is_valid_dtype("datetime64[ns]"));
        assert!(!is_valid_dtype("complex"));
        assert!(!is_valid_dtype(""));
    }

    #[test]
    fn test_dtype_for_native() {
        assert_eq!(
            dtype_for_native(&TypeExpr::native("builtins", "int")),
            Some("int")
        );
        assert_eq!(
            dtype_for_native(&TypeExpr::native("decimal", "Decimal")),
            Some("float")
        );
        assert_eq!(dtype_for_native(&TypeExpr::reference("Age")), None);
        assert_eq!(
            dtype_for_native(&TypeExpr::native("pathlib", "Path")),
            None
        );
    }
}
