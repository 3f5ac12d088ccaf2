use proc_macro_error2::{abort, emit_error};
use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, LitStr, Token, parse_quote};

use crate::rename::RenameRule;

/// Container-level configuration from `#[serde(...)]` and `#[json_shape(...)]`.
struct ContainerConfig {
    krate: syn::Path,
    label: Option<String>,
    rename_all: Option<RenameRule>,
    transparent: bool,
    /// Type named by `#[serde(from = "..")]` or `#[serde(try_from = "..")]`.
    from: Option<syn::Type>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            krate: parse_quote!(::httpjson_core),
            label: None,
            rename_all: None,
            transparent: false,
            from: None,
        }
    }
}

/// Field-level configuration.
#[derive(Default)]
struct FieldConfig {
    rename: Option<String>,
    aliases: Vec<String>,
    skip: bool,
    flatten: bool,
    opaque: bool,
}

#[allow(clippy::needless_pass_by_value)] // DeriveInput is consumed by proc-macro pattern
pub fn expand_derive_json_shape(input: DeriveInput) -> TokenStream {
    if let Some(lifetime) = input.generics.lifetimes().next() {
        abort!(
            lifetime.span(),
            "#[derive(JsonShape)] requires an owned type without lifetime parameters"
        );
    }

    let config = parse_container_attrs(&input);
    let krate = &config.krate;
    let ident = &input.ident;
    let label = config
        .label
        .clone()
        .unwrap_or_else(|| ident.unraw().to_string());

    let body = match (&config.from, &input.data) {
        // serde reads the wire through the conversion source.
        (Some(source), _) => quote! { #krate::Shape::wrapped(#label, #krate::shape_of::<#source>) },
        (None, Data::Struct(data)) => expand_struct(&data.fields, &config, &label),
        (None, Data::Enum(_)) => quote! { #krate::Shape::scalar(#label) },
        (None, Data::Union(_)) => abort!(
            input.span(),
            "#[derive(JsonShape)] can only be applied to structs and enums"
        ),
    };

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(#krate::JsonShape));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    quote! {
        impl #impl_generics #krate::JsonShape for #ident #ty_generics #where_clause {
            fn describe() -> #krate::Shape {
                #body
            }
        }
    }
}

fn expand_struct(fields: &Fields, config: &ContainerConfig, label: &str) -> TokenStream {
    let krate = &config.krate;
    if config.transparent {
        let visible: Vec<_> = fields
            .iter()
            .filter(|field| !parse_field_attrs(field).skip)
            .collect();
        let [field] = visible.as_slice() else {
            abort!(
                fields.span(),
                "#[serde(transparent)] requires exactly one field that is not skipped"
            );
        };
        let opaque = parse_field_attrs(field).opaque;
        let shape_ref = shape_ref(krate, &field.ty, opaque);
        return quote! { #krate::Shape::wrapped(#label, #shape_ref) };
    }

    match fields {
        Fields::Named(named) => {
            let entries = named.named.iter().map(|field| {
                let field_config = parse_field_attrs(field);
                let shape_ref = shape_ref(krate, &field.ty, field_config.opaque);
                if field_config.flatten {
                    return quote! { .flatten(#shape_ref) };
                }
                let name = field
                    .ident
                    .as_ref()
                    .map(|ident| ident.unraw().to_string())
                    .unwrap_or_default();
                let wire = field_config.rename.clone().or_else(|| {
                    config
                        .rename_all
                        .map(|rule| rule.apply_to_field(&name))
                        .filter(|renamed| *renamed != name)
                });
                let rename = wire.map(|wire| quote! { .rename(#wire) });
                let aliases = &field_config.aliases;
                let omit = field_config.skip.then(|| quote! { .omit() });
                quote! {
                    .field(
                        #krate::Field::new(#name, #shape_ref)
                            #rename
                            #( .alias(#aliases) )*
                            #omit
                    )
                }
            });
            quote! {
                #krate::Shape::structure(
                    #label,
                    #krate::StructShape::new() #( #entries )*,
                )
            }
        }
        Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
            let field = &unnamed.unnamed[0];
            let opaque = parse_field_attrs(field).opaque;
            let shape_ref = shape_ref(krate, &field.ty, opaque);
            quote! { #krate::Shape::wrapped(#label, #shape_ref) }
        }
        // Read from an array holding the fields that are not skipped.
        Fields::Unnamed(unnamed) => {
            let elements = unnamed.unnamed.iter().filter_map(|field| {
                let field_config = parse_field_attrs(field);
                (!field_config.skip).then(|| shape_ref(krate, &field.ty, field_config.opaque))
            });
            quote! {
                #krate::Shape::tuple(
                    #label,
                    ::std::vec![ #( #elements as #krate::ShapeRef ),* ],
                )
            }
        }
        Fields::Unit => quote! { #krate::Shape::scalar(#label) },
    }
}

fn shape_ref(krate: &syn::Path, ty: &syn::Type, opaque: bool) -> TokenStream {
    if opaque {
        quote! { #krate::shape::any }
    } else {
        quote! { #krate::shape_of::<#ty> }
    }
}

fn parse_container_attrs(input: &DeriveInput) -> ContainerConfig {
    let mut config = ContainerConfig::default();

    for attr in &input.attrs {
        let result = if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    if let Some(rule) = deserialize_value(&meta)? {
                        match RenameRule::from_name(&rule.value()) {
                            Some(parsed) => config.rename_all = Some(parsed),
                            None => emit_error!(
                                rule.span(),
                                "unknown rename rule `{}`",
                                rule.value()
                            ),
                        }
                    }
                } else if meta.path.is_ident("transparent") {
                    config.transparent = true;
                } else if meta.path.is_ident("from") || meta.path.is_ident("try_from") {
                    let source: LitStr = meta.value()?.parse()?;
                    config.from = Some(source.parse()?);
                } else {
                    skip_meta(&meta)?;
                }
                Ok(())
            })
        } else if attr.path().is_ident("json_shape") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("crate") {
                    let path: LitStr = meta.value()?.parse()?;
                    config.krate = path.parse()?;
                } else if meta.path.is_ident("label") {
                    let label: LitStr = meta.value()?.parse()?;
                    config.label = Some(label.value());
                } else {
                    return Err(meta.error("expected `crate` or `label`"));
                }
                Ok(())
            })
        } else {
            continue;
        };

        if let Err(e) = result {
            emit_error!(attr.span(), "Failed to parse attribute: {}", e);
        }
    }

    config
}

fn parse_field_attrs(field: &syn::Field) -> FieldConfig {
    let mut config = FieldConfig::default();

    for attr in &field.attrs {
        let result = if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    if let Some(wire) = deserialize_value(&meta)? {
                        config.rename = Some(wire.value());
                    }
                } else if meta.path.is_ident("alias") {
                    let alias: LitStr = meta.value()?.parse()?;
                    config.aliases.push(alias.value());
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                    config.skip = true;
                } else if meta.path.is_ident("flatten") {
                    config.flatten = true;
                } else if meta.path.is_ident("with") || meta.path.is_ident("deserialize_with") {
                    config.opaque = true;
                    skip_meta(&meta)?;
                } else {
                    skip_meta(&meta)?;
                }
                Ok(())
            })
        } else if attr.path().is_ident("json_shape") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("opaque") {
                    config.opaque = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `opaque`"))
                }
            })
        } else {
            continue;
        };

        if let Err(e) = result {
            emit_error!(attr.span(), "Failed to parse attribute: {}", e);
        }
    }

    config
}

/// Reads `key = "value"` or the `deserialize` half of
/// `key(serialize = "...", deserialize = "...")`.
fn deserialize_value(meta: &ParseNestedMeta) -> syn::Result<Option<LitStr>> {
    if meta.input.peek(Token![=]) {
        return Ok(Some(meta.value()?.parse()?));
    }
    let mut value = None;
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("deserialize") {
            value = Some(inner.value()?.parse()?);
        } else {
            skip_meta(&inner)?;
        }
        Ok(())
    })?;
    Ok(value)
}

/// Consumes a serde meta item this derive does not interpret.
fn skip_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta(&inner))?;
    }
    Ok(())
}
