/// Column names of a row type, in declaration order.
///
/// Usually derived with `#[derive(FieldList)]`. Fields marked `#[field_list(skip)]` are
/// excluded, which is how auxiliary values filled in by joins stay out of plain selects.
pub trait FieldList {
    fn fields() -> &'static [&'static str];

    fn field_list() -> &'static str;

    fn qualified_field_list(table: &str) -> String {
        Self::fields()
            .iter()
            .map(|field| format!("{}.{}", table, field))
            .collect::<Vec<String>>()
            .join(",")
    }
}
