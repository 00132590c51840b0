use syn::{Data, Field, Fields, FieldsNamed};

pub fn extract_fields(data: &Data) -> &FieldsNamed {
    match *data {
        Data::Struct(ref data) => match data.fields {
            Fields::Named(ref fields) => fields,
            _ => panic!("all fields must be named."),
        },
        _ => panic!("struct expected, but got other item."),
    }
}

/// Returns true if the field carries `#[field_list(skip)]`.
pub fn is_skipped(field: &Field) -> bool {
    field
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("field_list"))
        .any(|attr| {
            let mut skip = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported field_list attribute"))
                }
            })
            .expect("couldn't parse field attribute");
            skip
        })
}
