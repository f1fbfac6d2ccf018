//! First-row classification and column naming.

use super::constants::FIELD_NAME_PREFIX;
use super::inference::ValueKind;
use super::options::HeaderMode;

/// Decide whether a sheet's first row names its columns.
///
/// Pure function of its inputs. With `HeaderMode::Auto` and no split hint,
/// the first row is a header when every first-row cell is declared `string`,
/// both rows have the same length, the second row is not all `string` and
/// the second row has at least one non-empty value.
pub fn detect_header(
    first_kinds: &[Option<ValueKind>],
    second_kinds: &[Option<ValueKind>],
    second_values: &[String],
    mode: HeaderMode,
    split_hint: bool,
) -> bool {
    match mode {
        HeaderMode::Force => return true,
        HeaderMode::Disable => return false,
        HeaderMode::Auto => {},
    }
    if split_hint {
        return true;
    }

    let first_all_text = first_kinds.iter().all(|k| ValueKind::is_string(*k));
    let second_text = second_kinds
        .iter()
        .filter(|k| ValueKind::is_string(**k))
        .count();
    let second_has_value = second_values.iter().any(|v| !v.is_empty());

    first_all_text
        && first_kinds.len() == second_kinds.len()
        && second_text != second_kinds.len()
        && second_has_value
}

/// Positional column name, 1-based.
///
/// ```
/// assert_eq!(odstab::ods::header::field_name(3), "Field3");
/// ```
pub fn field_name(position: usize) -> String {
    format!("{}{}", FIELD_NAME_PREFIX, position)
}

/// Column names taken from a header row; empty cells fall back to `FieldN`.
pub fn header_names(values: &[String]) -> Vec<String> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| if v.is_empty() { field_name(i + 1) } else { v.clone() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const S: Option<ValueKind> = Some(ValueKind::String);
    const F: Option<ValueKind> = Some(ValueKind::Float);

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_label_row_over_typed_row() {
        assert!(detect_header(&[S, S], &[S, F], &strings(&["Alice", "30"]), HeaderMode::Auto, false));
    }

    #[test]
    fn test_two_text_rows_are_data() {
        assert!(!detect_header(&[S, S], &[S, S], &strings(&["a", "b"]), HeaderMode::Auto, false));
    }

    #[test]
    fn test_length_mismatch_is_data() {
        assert!(!detect_header(&[S, S], &[S, F, F], &strings(&["a", "1", "2"]), HeaderMode::Auto, false));
    }

    #[test]
    fn test_numeric_first_row_is_data() {
        assert!(!detect_header(&[F, S], &[F, F], &strings(&["1", "2"]), HeaderMode::Auto, false));
        // an absent kind is not a string
        assert!(!detect_header(&[None, S], &[F, F], &strings(&["1", "2"]), HeaderMode::Auto, false));
    }

    #[test]
    fn test_overrides() {
        let second = strings(&["a", "b"]);
        assert!(detect_header(&[S, S], &[S, S], &second, HeaderMode::Force, false));
        assert!(detect_header(&[S, S], &[S, S], &second, HeaderMode::Auto, true));
        assert!(!detect_header(&[S, S], &[S, F], &second, HeaderMode::Disable, true));
    }

    #[test]
    fn test_header_names() {
        let names = header_names(&strings(&["Name", "", "Age"]));
        assert_eq!(names, vec!["Name", "Field2", "Age"]);
    }

    fn any_kind() -> impl Strategy<Value = Option<ValueKind>> {
        prop_oneof![
            Just(None),
            Just(Some(ValueKind::String)),
            Just(Some(ValueKind::Float)),
            Just(Some(ValueKind::Date)),
            Just(Some(ValueKind::Bool)),
        ]
    }

    fn any_mode() -> impl Strategy<Value = HeaderMode> {
        prop_oneof![Just(HeaderMode::Auto), Just(HeaderMode::Force), Just(HeaderMode::Disable)]
    }

    proptest! {
        #[test]
        fn prop_detection_is_deterministic(
            first in proptest::collection::vec(any_kind(), 0..6),
            second in proptest::collection::vec((any_kind(), "[a-z0-9]{0,3}"), 0..6),
            mode in any_mode(),
            hint in any::<bool>(),
        ) {
            let (kinds, values): (Vec<_>, Vec<_>) = second.into_iter().unzip();
            let a = detect_header(&first, &kinds, &values, mode, hint);
            let b = detect_header(&first, &kinds, &values, mode, hint);
            prop_assert_eq!(a, b);
            if mode == HeaderMode::Force {
                prop_assert!(a);
            }
            if mode == HeaderMode::Disable {
                prop_assert!(!a);
            }
        }
    }
}
