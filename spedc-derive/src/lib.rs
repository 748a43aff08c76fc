use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Lit, LitStr, Meta, Type};

/// Derive macro that turns a struct into a SPED record layout.
///
/// The struct names the record types it describes with `#[sped(reg = "...")]`
/// (repeatable when several types share one layout). For each field, extracts:
/// - Field name (the ident upper-cased, or `#[sped(name = "...")]`)
/// - Required (true if not Option<T>)
/// - Description (from doc comments)
///
/// Generates an implementation of `crate::core::layout::SpedRecord`: the
/// `layout()` table, with the leading `REG` field prepended, and a
/// `from_record()` constructor that reads every field by name.
#[proc_macro_derive(SpedRecord, attributes(sped))]
pub fn derive_sped_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let regs = match get_record_types(&input.attrs) {
        Ok(regs) if !regs.is_empty() => regs,
        Ok(_) => panic!("SpedRecord requires at least one #[sped(reg = \"...\")]"),
        Err(err) => return err.to_compile_error().into(),
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => panic!("SpedRecord only supports structs with named fields"),
        },
        _ => panic!("SpedRecord only supports structs"),
    };

    let mut field_info = Vec::new();
    for field in fields {
        let ident = field.ident.clone().expect("named field");
        let layout_name = match get_field_name(&field.attrs) {
            Ok(Some(name)) => name,
            Ok(None) => ident.to_string().to_uppercase(),
            Err(err) => return err.to_compile_error().into(),
        };
        let is_optional = is_option_type(&field.ty);
        let doc = get_doc_comment(&field.attrs);
        field_info.push((ident, layout_name, !is_optional, doc));
    }

    let layout_entries = field_info.iter().map(|(_, name, required, desc)| {
        quote! {
            crate::core::layout::LayoutField {
                name: #name,
                required: #required,
                description: #desc,
            }
        }
    });

    let field_reads = field_info.iter().map(|(ident, name, _, _)| {
        quote! {
            #ident: crate::core::layout::FieldValue::from_field(
                record.field(Self::layout(), #name)
            )
        }
    });

    let expanded = quote! {
        impl crate::core::layout::SpedRecord for #name {
            const RECORD_TYPES: &'static [&'static str] = &[#(#regs),*];

            fn layout() -> &'static [crate::core::layout::LayoutField] {
                static LAYOUT: &[crate::core::layout::LayoutField] = &[
                    crate::core::layout::LayoutField {
                        name: "REG",
                        required: true,
                        description: "Record type code",
                    },
                    #(#layout_entries),*
                ];
                LAYOUT
            }

            fn from_record(record: &crate::core::record::FiscalRecord) -> Self {
                Self {
                    #(#field_reads),*
                }
            }
        }
    };

    TokenStream::from(expanded)
}

fn get_record_types(attrs: &[syn::Attribute]) -> syn::Result<Vec<String>> {
    let mut regs = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("sped") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("reg") {
                let value: LitStr = meta.value()?.parse()?;
                regs.push(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `reg = \"...\"`"))
            }
        })?;
    }
    Ok(regs)
}

fn get_field_name(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut name = None;
    for attr in attrs {
        if !attr.path().is_ident("sped") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(name)
}

fn get_doc_comment(attrs: &[syn::Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            if !attr.path().is_ident("doc") {
                return None;
            }
            if let Meta::NameValue(meta) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &meta.value {
                    if let Lit::Str(lit_str) = &expr_lit.lit {
                        return Some(lit_str.value().trim().to_string());
                    }
                }
            }
            None
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}
