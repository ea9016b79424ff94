use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Data, DeriveInput, Field, Fields, GenericArgument, Ident, LitInt, LitStr, Path, PathArguments,
    Token, Type, ext::IdentExt, parse_quote,
};

#[derive(Default)]
struct ModelAttrs {
    collection: Option<String>,
    max_rows: Option<usize>,
    validate: Option<Path>,
    krate: Option<Path>,
}

#[derive(Default)]
struct FieldAttrs {
    id: bool,
    required: bool,
    skip: bool,
    rename: Option<String>,
    serde_rename: Option<String>,
    reference: Option<Type>,
}

const ID_KEY: &str = "_id";

struct SchemaField {
    name: String,
    kind: Ident,
    required: bool,
    reference: Option<Type>,
}

pub fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Document cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Document can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Document can only be derived for structs",
            ));
        }
    };

    let name = &input.ident;
    let model = parse_model_attrs(&input)?;
    let krate = model
        .krate
        .unwrap_or_else(|| parse_quote!(::docrest));
    let collection = model
        .collection
        .unwrap_or_else(|| format!("{}s", to_snake_case(&name.to_string())));

    let parsed = fields
        .iter()
        .filter_map(|field| field.ident.as_ref().map(|ident| (ident, field)))
        .map(|(ident, field)| Ok((ident, field, parse_field_attrs(field)?)))
        .collect::<syn::Result<Vec<_>>>()?;
    // without an explicit marker, a field literally named `id` is the identity
    let marked = parsed.iter().any(|(_, _, attrs)| attrs.id);

    let mut identity = None;
    let mut schema_fields = Vec::new();

    for (ident, field, attrs) in parsed {
        if attrs.id || (!marked && ident == "id") {
            identity = Some((ident, attrs.serde_rename));
            continue;
        }
        if attrs.skip {
            continue;
        }

        schema_fields.push(SchemaField {
            name: attrs
                .rename
                .unwrap_or_else(|| ident.unraw().to_string()),
            kind: format_ident!("{}", infer_kind(&field.ty)),
            required: attrs.required,
            reference: attrs.reference,
        });
    }

    let (id_field, id_rename) = identity.ok_or_else(|| {
        syn::Error::new_spanned(name, "no field marked #[document(id)] and no field named `id`")
    })?;

    if id_rename.as_deref() != Some(ID_KEY) {
        return Err(syn::Error::new_spanned(
            id_field,
            "the identity field must carry #[serde(rename = \"_id\")]",
        ));
    }

    let field_specs = schema_fields.iter().map(|field| {
        let field_name = &field.name;
        let kind = &field.kind;

        let mut spec = quote! {
            #krate::schema::FieldSpec::new(#field_name, #krate::schema::ValueKind::#kind)
        };
        if field.required {
            spec = quote! { #spec.required() };
        }
        if let Some(target) = &field.reference {
            spec = quote! { #spec.references::<#target>() };
        }
        spec
    });

    let max_rows = model
        .max_rows
        .map(|max_rows| quote! { .max_rows(#max_rows) });

    let constraints = model.validate.map(|validate| {
        quote! {
            fn constraints(&self) -> ::std::vec::Vec<::std::string::String> {
                #validate(self)
            }
        }
    });

    Ok(quote! {
        impl #krate::document::Document for #name {
            fn id(&self) -> ::core::option::Option<&#krate::document::DocumentId> {
                self.#id_field.as_ref()
            }

            fn set_id(&mut self, id: #krate::document::DocumentId) {
                self.#id_field = ::core::option::Option::Some(id);
            }

            fn collection_name() -> &'static str {
                #collection
            }

            fn schema() -> &'static #krate::schema::Schema {
                static SCHEMA: ::std::sync::OnceLock<#krate::schema::Schema> = ::std::sync::OnceLock::new();

                SCHEMA.get_or_init(|| {
                    #krate::schema::Schema::builder::<Self>()
                        #(.field(#field_specs))*
                        #max_rows
                        .build()
                })
            }

            #constraints
        }
    })
}

fn parse_model_attrs(input: &DeriveInput) -> syn::Result<ModelAttrs> {
    let mut attrs = ModelAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("document") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.collection = Some(value.value());
            } else if meta.path.is_ident("max_rows") {
                let value: LitInt = meta.value()?.parse()?;
                attrs.max_rows = Some(value.base10_parse()?);
            } else if meta.path.is_ident("validate") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.validate = Some(value.parse()?);
            } else if meta.path.is_ident("crate") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.krate = Some(value.parse()?);
            } else {
                return Err(meta.error("unsupported document attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

fn parse_field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    let mut serde_rename = None;

    for attr in &field.attrs {
        if attr.path().is_ident("document") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    attrs.id = true;
                } else if meta.path.is_ident("required") {
                    attrs.required = true;
                } else if meta.path.is_ident("skip") {
                    attrs.skip = true;
                } else if meta.path.is_ident("rename") {
                    let value: LitStr = meta.value()?.parse()?;
                    attrs.rename = Some(value.value());
                } else if meta.path.is_ident("reference") {
                    attrs.reference = Some(meta.value()?.parse()?);
                } else {
                    return Err(meta.error("unsupported document field attribute"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            // only `rename = "..."` and `skip` matter here; everything else is consumed
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                    let value: LitStr = meta.value()?.parse()?;
                    serde_rename = Some(value.value());
                } else if meta.path.is_ident("skip") {
                    attrs.skip = true;
                } else if meta.input.peek(Token![=]) {
                    meta.value()?.parse::<syn::Expr>()?;
                } else if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|nested| {
                        if nested.input.peek(Token![=]) {
                            nested.value()?.parse::<syn::Expr>()?;
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        }
    }

    attrs.serde_rename = serde_rename.clone();
    if attrs.rename.is_none() {
        attrs.rename = serde_rename;
    }

    Ok(attrs)
}

fn infer_kind(ty: &Type) -> &'static str {
    match ty {
        Type::Reference(reference) => infer_kind(&reference.elem),
        Type::Path(path) => {
            let Some(segment) = path.path.segments.last() else {
                return "Any";
            };

            match segment.ident.to_string().as_str() {
                "String" | "str" => "Text",
                "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => "Integer",
                "f32" | "f64" => "Float",
                "bool" => "Boolean",
                "DocumentId" | "References" => "Identity",
                "Option" | "Vec" | "Box" => match &segment.arguments {
                    PathArguments::AngleBracketed(args) => args
                        .args
                        .iter()
                        .find_map(|arg| match arg {
                            GenericArgument::Type(inner) => Some(infer_kind(inner)),
                            _ => None,
                        })
                        .unwrap_or("Any"),
                    _ => "Any",
                },
                _ => "Any",
            }
        }
        _ => "Any",
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();

    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_of(input: DeriveInput) -> String {
        match expand(input) {
            Ok(_) => panic!("expected the derive to fail"),
            Err(err) => err.to_string(),
        }
    }

    #[test]
    fn identity_must_serialize_as_underscore_id() {
        let message = error_of(parse_quote! {
            struct Tag {
                id: Option<DocumentId>,
                label: String,
            }
        });

        assert!(message.contains("#[serde(rename = \"_id\")]"), "{message}");
    }

    #[test]
    fn marked_identity_must_serialize_as_underscore_id() {
        let message = error_of(parse_quote! {
            struct Tag {
                #[document(id)]
                #[serde(rename = "key")]
                key: Option<DocumentId>,
            }
        });

        assert!(message.contains("_id"), "{message}");
    }

    #[test]
    fn renamed_identity_is_accepted() {
        let tokens = expand(parse_quote! {
            struct Tag {
                #[serde(rename = "_id", default)]
                id: Option<DocumentId>,
                #[serde(default, skip_serializing_if = "Option::is_none")]
                #[document(required)]
                label: Option<String>,
            }
        })
        .unwrap()
        .to_string();

        assert!(tokens.contains("\"tags\""), "{tokens}");
        assert!(tokens.contains("\"label\""), "{tokens}");
    }

    #[test]
    fn malformed_serde_attributes_are_reported() {
        let message = error_of(parse_quote! {
            struct Tag {
                #[serde(rename = "_id", default = )]
                id: Option<DocumentId>,
            }
        });

        assert!(!message.is_empty());
    }

    #[test]
    fn missing_identity_is_reported() {
        let message = error_of(parse_quote! {
            struct Tag {
                label: String,
            }
        });

        assert!(message.contains("no field named `id`"), "{message}");
    }
}
