use tracing::trace;

use crate::schema::{FilterFieldSchema, WidthHint};

/// Groups fields into presentation rows.
///
/// Half-width fields pair up in declaration order. A full-width field
/// flushes any pending half row first and then sits alone. Flattening the
/// result row by row yields `fields` in its original order.
pub fn group_fields_by_row(fields: &[FilterFieldSchema]) -> Vec<Vec<&FilterFieldSchema>> {
    let mut rows: Vec<Vec<&FilterFieldSchema>> = Vec::with_capacity(fields.len());
    let mut pending: Vec<&FilterFieldSchema> = Vec::with_capacity(2);

    for field in fields {
        match field.width {
            WidthHint::Full => {
                if !pending.is_empty() {
                    rows.push(std::mem::take(&mut pending));
                }
                rows.push(vec![field]);
            }
            WidthHint::Half => {
                pending.push(field);
                if pending.len() == 2 {
                    rows.push(std::mem::take(&mut pending));
                }
            }
        }
    }

    if !pending.is_empty() {
        rows.push(pending);
    }

    trace!(fields = fields.len(), rows = rows.len(), "grouped filter fields");
    rows
}

#[cfg(test)]
mod tests {
    use super::group_fields_by_row;
    use crate::schema::{FilterFieldSchema, SelectOption};

    fn keys(rows: &[Vec<&FilterFieldSchema>]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|field| field.key.clone()).collect())
            .collect()
    }

    fn field(key: &str, full: bool) -> FilterFieldSchema {
        let field = FilterFieldSchema::text(key, key);
        if full { field.full_width() } else { field }
    }

    #[test]
    fn pairs_half_fields_and_isolates_full_ones() {
        let fields = vec![
            FilterFieldSchema::text("search", "Search"),
            FilterFieldSchema::select(
                "status",
                "Status",
                vec![SelectOption::new("draft", "Draft")],
            ),
            FilterFieldSchema::date("dateFrom", "From").full_width(),
        ];

        assert_eq!(
            keys(&group_fields_by_row(&fields)),
            vec![vec!["search", "status"], vec!["dateFrom"]]
        );
    }

    #[test]
    fn full_field_flushes_single_pending_half() {
        let fields = vec![field("a", false), field("b", true), field("c", false)];
        assert_eq!(
            keys(&group_fields_by_row(&fields)),
            vec![vec!["a"], vec!["b"], vec!["c"]]
        );
    }

    #[test]
    fn trailing_half_field_gets_its_own_row() {
        let fields = vec![field("a", false), field("b", false), field("c", false)];
        assert_eq!(
            keys(&group_fields_by_row(&fields)),
            vec![vec!["a", "b"], vec!["c"]]
        );
    }

    #[test]
    fn empty_input_has_no_rows() {
        assert!(group_fields_by_row(&[]).is_empty());
    }

    #[test]
    fn flattening_preserves_order_for_every_width_pattern() {
        for len in 0..=7_usize {
            for mask in 0..(1_u32 << len) {
                let fields: Vec<_> = (0..len)
                    .map(|idx| field(&format!("f{idx}"), mask & (1 << idx) != 0))
                    .collect();
                let rows = group_fields_by_row(&fields);

                let flattened: Vec<&str> = rows
                    .iter()
                    .flat_map(|row| row.iter().map(|field| field.key.as_str()))
                    .collect();
                let expected: Vec<&str> = fields.iter().map(|field| field.key.as_str()).collect();
                assert_eq!(flattened, expected, "mask {mask:#b} len {len}");

                for row in &rows {
                    assert!(!row.is_empty() && row.len() <= 2);
                    if row.len() == 2 {
                        assert!(row.iter().all(|field| field.width == crate::schema::WidthHint::Half));
                    }
                }
            }
        }
    }
}
