//! Small string helpers shared by configuration and the CLI.

/// Splits a comma separated list, trimming whitespace and dropping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Appends `items` to `list`, skipping names already present. Order is kept.
pub fn extend_unique(list: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        if !list.iter().any(|existing| *existing == item) {
            list.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_trims_and_skips_empty() {
        assert_eq!(
            split_list(" XR_EXT_hand_tracking, ,XR_FB_passthrough,"),
            vec!["XR_EXT_hand_tracking", "XR_FB_passthrough"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_extend_unique_keeps_order() {
        let mut list = vec!["a".to_string(), "b".to_string()];
        extend_unique(&mut list, vec!["b".to_string(), "c".to_string(), "a".to_string()]);
        assert_eq!(list, vec!["a", "b", "c"]);
    }
}
