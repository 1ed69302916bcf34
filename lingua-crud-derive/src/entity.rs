use crate::attrs::{Embed, FieldAttrs, StructAttrs};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, GenericArgument, PathArguments, Type};

// derive_entity
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let type_name = ident.to_string();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new_spanned(
                ident,
                "Entity can only be derived for structs with named fields",
            ));
        }
    };

    let struct_attrs = StructAttrs::parse(&input.attrs)?;

    let mut steps = Vec::new();
    let mut contents = None;
    let mut language_source = None;

    for field in fields {
        let Some(field_ident) = field.ident.as_ref() else {
            return Err(Error::new_spanned(field, "expected a named field"));
        };
        let attrs = FieldAttrs::parse(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let ty = &field.ty;

        match attrs.embed() {
            Embed::Base | Embed::ContentBase => {
                if !attrs.serde_flatten {
                    return Err(Error::new_spanned(
                        field,
                        "embedded base fields must also be #[serde(flatten)]",
                    ));
                }
                if attrs.embed() == Embed::ContentBase {
                    if language_source.is_some() {
                        return Err(Error::new_spanned(
                            field,
                            "only one #[crud(content_base)] field is allowed",
                        ));
                    }
                    language_source = Some(field_ident.clone());
                }
                steps.push(quote! {
                    record.flatten(&<#ty as ::lingua_crud::schema::Record>::record_type())
                });
                continue;
            }
            Embed::None => {}
        }

        let name = field_ident.to_string();
        let key = attrs.rename.clone().unwrap_or_else(|| name.clone());
        let sql_type = opt_string(attrs.sql_type.as_deref());
        let default = opt_string(attrs.default.as_deref());
        let validate = opt_string(attrs.validate.as_deref());
        let index = attrs.index;

        if attrs.contents {
            if contents.is_some() {
                return Err(Error::new_spanned(
                    field,
                    "only one #[crud(contents)] field is allowed",
                ));
            }
            let element = vec_element(ty).ok_or_else(|| {
                Error::new_spanned(ty, "#[crud(contents)] must be a Vec<ContentType>")
            })?;
            let foreign_key = opt_string(attrs.foreign_key.as_deref());
            contents = Some(quote! {
                .with_contents(::lingua_crud::schema::ContentsRelation::of::<#element>(
                    #name,
                    #foreign_key,
                    #type_name,
                ))
            });
        }

        steps.push(quote! {
            record.field(
                ::lingua_crud::schema::Field::new(
                    #name,
                    <#ty as ::lingua_crud::schema::FieldKind>::field_type(),
                )
                .with_key(#key)
                .with_column(::lingua_crud::schema::ColumnOptions {
                    sql_type: #sql_type,
                    default: #default,
                    index: #index,
                })
                .with_validate(#validate)
            )
        });
    }

    let table = opt_string(struct_attrs.table.as_deref());
    let contents = contents.unwrap_or_default();

    let language_impl = language_source.map(|source| {
        quote! {
            impl ::lingua_crud::schema::LanguageTagged for #ident {
                fn language_id(&self) -> &str {
                    ::lingua_crud::schema::LanguageTagged::language_id(&self.#source)
                }
            }
        }
    });

    Ok(quote! {
        impl ::lingua_crud::schema::Record for #ident {
            fn record_type() -> ::std::sync::Arc<::lingua_crud::schema::RecordType> {
                static RECORD: ::std::sync::OnceLock<
                    ::std::sync::Arc<::lingua_crud::schema::RecordType>,
                > = ::std::sync::OnceLock::new();

                RECORD
                    .get_or_init(|| {
                        let record = ::lingua_crud::schema::RecordType::new(#type_name);
                        #(let record = #steps;)*
                        ::std::sync::Arc::new(record)
                    })
                    .clone()
            }
        }

        impl ::lingua_crud::schema::FieldKind for #ident {
            fn field_type() -> ::lingua_crud::schema::FieldType {
                ::lingua_crud::schema::FieldType::Record(
                    <Self as ::lingua_crud::schema::Record>::record_type(),
                )
            }
        }

        impl ::lingua_crud::schema::Entity for #ident {
            fn schema() -> &'static ::lingua_crud::schema::ModelSchema {
                static SCHEMA: ::std::sync::OnceLock<::lingua_crud::schema::ModelSchema> =
                    ::std::sync::OnceLock::new();

                SCHEMA.get_or_init(|| {
                    ::lingua_crud::schema::ModelSchema::new(
                        <Self as ::lingua_crud::schema::Record>::record_type(),
                        #table,
                    )
                    #contents
                })
            }
        }

        #language_impl
    })
}

fn opt_string(value: Option<&str>) -> TokenStream {
    match value {
        Some(s) => quote!(::core::option::Option::Some(::std::string::String::from(#s))),
        None => quote!(::core::option::Option::None),
    }
}

fn vec_element(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Vec" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
