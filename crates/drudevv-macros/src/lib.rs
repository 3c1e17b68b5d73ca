use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Error, Field, Fields, Ident, Result, Type, parse_macro_input};

/// Derives `Default` for a configuration struct from inline
/// `#[default(expr)]` attributes.
///
/// Fields typed `String` or `PathBuf` accept string literals; the literal is
/// converted with `Into`. Every other type takes the expression as written.
///
/// # Example
/// ```
/// use drudevv_macros::ConfigDefaults;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(ConfigDefaults, Serialize, Deserialize)]
/// #[serde(default)]
/// pub struct ThermostatConfig {
///     #[default(300.0)]
///     pub temperature: f64,
///
///     #[default(5.0)]
///     pub friction: f64,
///
///     #[default(1)]
///     pub loops_per_step: usize,
///
///     #[default("nose_hoover")]
///     pub kind: String,
/// }
///
/// let config = ThermostatConfig::default();
/// assert_eq!(config.temperature, 300.0);
/// assert_eq!(config.loops_per_step, 1);
/// assert_eq!(config.kind, "nose_hoover");
/// ```
///
/// # Errors
///
/// Compilation fails when the derive is applied to anything but a struct with
/// named fields, when a field has no `#[default(...)]`, or when the attribute
/// is empty.
#[proc_macro_derive(ConfigDefaults, attributes(default))]
pub fn config_defaults(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

struct FieldDefault<'a> {
    ident: &'a Ident,
    value: TokenStream2,
    convert: bool,
}

impl FieldDefault<'_> {
    fn initializer(&self) -> TokenStream2 {
        let ident = self.ident;
        let value = &self.value;
        if self.convert {
            quote! { #ident: ::std::convert::Into::into(#value) }
        } else {
            quote! { #ident: #value }
        }
    }
}

fn expand(input: &DeriveInput) -> Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let initializers = named_fields(input)?
        .iter()
        .map(|field| field_default(field).map(|default| default.initializer()))
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::std::default::Default for #name #ty_generics #where_clause {
            fn default() -> Self {
                Self {
                    #(#initializers),*
                }
            }
        }
    })
}

fn named_fields(input: &DeriveInput) -> Result<Vec<&Field>> {
    let message = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => return Ok(fields.named.iter().collect()),
            Fields::Unnamed(_) => "ConfigDefaults only supports structs with named fields",
            Fields::Unit => "ConfigDefaults cannot be derived for unit structs",
        },
        Data::Enum(_) => "ConfigDefaults can only be derived for structs, not enums",
        Data::Union(_) => "ConfigDefaults can only be derived for structs, not unions",
    };
    Err(Error::new_spanned(input, message))
}

fn field_default(field: &Field) -> Result<FieldDefault<'_>> {
    // Named fields always carry an identifier.
    let Some(ident) = field.ident.as_ref() else {
        return Err(Error::new_spanned(field, "ConfigDefaults requires named fields"));
    };

    let attr = field
        .attrs
        .iter()
        .find(|attr| attr.path().is_ident("default"))
        .ok_or_else(|| {
            Error::new_spanned(
                field,
                format!("Field '{ident}' must have a #[default(...)] attribute specifying its default value"),
            )
        })?;

    let value: TokenStream2 = attr.parse_args().map_err(|e| {
        Error::new_spanned(
            attr,
            format!("Failed to parse default attribute for field '{ident}': {e}"),
        )
    })?;

    if value.is_empty() {
        return Err(Error::new_spanned(
            attr,
            format!("Field '{ident}' has an empty #[default()] attribute. Please provide a default value."),
        ));
    }

    Ok(FieldDefault {
        ident,
        value,
        convert: is_into_convertible(&field.ty),
    })
}

/// `String` and `PathBuf` fields accept `&str` literals.
fn is_into_convertible(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "String" || segment.ident == "PathBuf"),
        _ => false,
    }
}
