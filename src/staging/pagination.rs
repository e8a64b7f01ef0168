/// Rows per page of the recipient view.
pub const PAGE_SIZE: i64 = 4;

/// Zero-based index of the first row on a one-based page.
pub fn first_row_offset(page_number: i64) -> i64 {
    page_number.saturating_mul(PAGE_SIZE) - PAGE_SIZE
}
